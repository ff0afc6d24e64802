use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use oscbridge_core::{FactStore, Parameters};
use oscbridge_rules::params::{sanitize, ParamKind, ParameterDefinition};
use oscbridge_rules::{Configured, Task, TaskError, ValidationError};

pub const KIND: &str = "delay";

/// Pauses the action's task list.
#[derive(Debug, Default)]
pub struct DelayTask {
    debug: bool,
    delay: Configured<Duration>,
}

impl DelayTask {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            delay: Configured::default(),
        }
    }
}

#[async_trait]
impl Task for DelayTask {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn set_parameters(&mut self, parameters: &Parameters) {
        let parsed = sanitize(
            parameters,
            &[ParameterDefinition::required("delay_millis", &[ParamKind::Int])],
        )
        .and_then(|p| p.uint("delay_millis"))
        .map(Duration::from_millis)
        .map_err(|source| ValidationError::Parameter {
            path: KIND.to_string(),
            source,
        });
        self.delay.set(parsed);
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.delay.validate(KIND)
    }

    async fn execute(&self, _store: &FactStore) -> Result<(), TaskError> {
        let delay = *self.delay.get()?;
        info!(task = KIND, millis = delay.as_millis() as u64, "Executing task");
        tokio::time::sleep(delay).await;
        if self.debug {
            debug!(task = KIND, millis = delay.as_millis() as u64, "Waiting is over");
        }
        Ok(())
    }
}
