//! Task trait and registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use oscbridge_core::{FactStore, Parameters};

use crate::error::{TaskError, ValidationError};

/// A side effect run when an action fires.
#[async_trait::async_trait]
pub trait Task: Send + Sync + fmt::Debug {
    /// Registered type name, e.g. `http_request`.
    fn kind(&self) -> &'static str;

    /// Apply raw config parameters. Problems are kept and surface in [`validate`](Self::validate).
    fn set_parameters(&mut self, parameters: &Parameters);

    fn validate(&self) -> Result<(), ValidationError>;

    /// Run the task. `store` is the snapshot the action matched on.
    async fn execute(&self, store: &FactStore) -> Result<(), TaskError>;
}

/// Parsed task parameters, or why they were rejected.
#[derive(Debug, Clone)]
pub struct Configured<P>(Option<Result<P, ValidationError>>);

impl<P> Default for Configured<P> {
    fn default() -> Self {
        Self(None)
    }
}

impl<P> Configured<P> {
    pub fn set(&mut self, parsed: Result<P, ValidationError>) {
        self.0 = Some(parsed);
    }

    pub fn validate(&self, kind: &str) -> Result<(), ValidationError> {
        match &self.0 {
            None => Err(ValidationError::Unconfigured {
                path: kind.to_string(),
            }),
            Some(Err(e)) => Err(e.clone()),
            Some(Ok(_)) => Ok(()),
        }
    }

    pub fn get(&self) -> Result<&P, TaskError> {
        match &self.0 {
            Some(Ok(params)) => Ok(params),
            _ => Err(TaskError::NotConfigured),
        }
    }
}

/// Builds an unconfigured task.
pub type TaskFactory = Arc<dyn Fn() -> Box<dyn Task> + Send + Sync>;

/// Task type name → factory.
pub type TaskRegistry = HashMap<String, TaskFactory>;
