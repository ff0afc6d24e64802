use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use oscbridge_core::{Argument, FactStore, Message, Parameters};
use oscbridge_rules::params::{sanitize, ParamKind, ParameterDefinition};
use oscbridge_rules::{Configured, Task, TaskError, ValidationError};
use oscbridge_sources::Source;

pub const KIND: &str = "send_osc_message";

/// Source name → source, for tasks that push messages back out.
pub type Connections = Arc<HashMap<String, Arc<dyn Source>>>;

#[derive(Debug, Clone)]
struct SendParams {
    connection: String,
    message: Message,
}

/// Sends a fixed message through a named source.
pub struct SendOscMessageTask {
    debug: bool,
    connections: Connections,
    params: Configured<SendParams>,
}

impl std::fmt::Debug for SendOscMessageTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut connections: Vec<&String> = self.connections.keys().collect();
        connections.sort();
        f.debug_struct("SendOscMessageTask")
            .field("connections", &connections)
            .field("params", &self.params)
            .finish()
    }
}

impl SendOscMessageTask {
    pub fn new(connections: Connections, debug: bool) -> Self {
        Self {
            debug,
            connections,
            params: Configured::default(),
        }
    }

    fn parse(parameters: &Parameters) -> Result<SendParams, ValidationError> {
        let param_error = |source| ValidationError::Parameter {
            path: KIND.to_string(),
            source,
        };
        let sanitized = sanitize(
            parameters,
            &[
                ParameterDefinition::required("connection", &[ParamKind::String]),
                ParameterDefinition::required("address", &[ParamKind::String]),
                ParameterDefinition::optional("arguments", &[ParamKind::List], None),
            ],
        )
        .map_err(param_error)?;

        let arguments = sanitized
            .list("arguments")
            .map_err(param_error)?
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                serde_json::from_value::<Argument>(raw.clone()).map_err(|e| ValidationError::Invalid {
                    path: KIND.to_string(),
                    reason: format!("failed to parse argument[{}]: {}", i, e),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SendParams {
            connection: sanitized.string("connection").map_err(param_error)?,
            message: Message::new(sanitized.string("address").map_err(param_error)?, arguments),
        })
    }
}

#[async_trait]
impl Task for SendOscMessageTask {
    fn kind(&self) -> &'static str {
        KIND
    }

    fn set_parameters(&mut self, parameters: &Parameters) {
        self.params.set(Self::parse(parameters));
    }

    fn validate(&self) -> Result<(), ValidationError> {
        self.params.validate(KIND)
    }

    async fn execute(&self, _store: &FactStore) -> Result<(), TaskError> {
        let params = self.params.get()?;
        info!(task = KIND, connection = %params.connection, message = %params.message, "Executing task");

        let source = self.connections.get(&params.connection).ok_or_else(|| {
            TaskError::Other(anyhow::anyhow!(
                "there is no osc connection named '{}'",
                params.connection
            ))
        })?;
        source
            .send(params.message.clone())
            .await
            .map_err(|e| TaskError::Other(e.into()))?;

        if self.debug {
            debug!(task = KIND, connection = %params.connection, "Message sent");
        }
        Ok(())
    }
}
