use std::fmt;
use std::time::Duration;

use oscbridge_core::{EvaluationContext, FactStore};
use tracing::warn;

use crate::condition::Condition;
use crate::error::{EvaluationError, TaskError};
use crate::task::Task;

/// A compiled action: trigger chain plus the tasks to run when it matches.
pub struct Action {
    name: String,
    debounce_millis: u64,
    trigger_chain: Box<dyn Condition>,
    tasks: Vec<Box<dyn Task>>,
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("debounce_millis", &self.debounce_millis)
            .field("trigger_chain", &self.trigger_chain.path())
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

impl Action {
    pub fn new(
        name: impl Into<String>,
        trigger_chain: Box<dyn Condition>,
        tasks: Vec<Box<dyn Task>>,
        debounce_millis: u64,
    ) -> Self {
        Self {
            name: name.into(),
            debounce_millis,
            trigger_chain,
            tasks,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn debounce_millis(&self) -> u64 {
        self.debounce_millis
    }

    /// `None` when the action fires immediately.
    pub fn debounce(&self) -> Option<Duration> {
        (self.debounce_millis > 0).then(|| Duration::from_millis(self.debounce_millis))
    }

    pub fn trigger_chain(&self) -> &dyn Condition {
        self.trigger_chain.as_ref()
    }

    pub fn tasks(&self) -> &[Box<dyn Task>] {
        &self.tasks
    }

    pub fn evaluate(&self, ctx: &EvaluationContext) -> Result<bool, EvaluationError> {
        self.trigger_chain.evaluate(ctx)
    }

    /// Run every task in order. A failing task does not stop the ones after
    /// it; all failures are returned together.
    pub async fn execute(&self, store: &FactStore) -> Result<(), TaskError> {
        let mut failures = Vec::new();
        for (index, task) in self.tasks.iter().enumerate() {
            if let Err(e) = task.execute(store).await {
                warn!(action = %self.name, task = task.kind(), index, error = %e, "Task failed");
                failures.push((index, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TaskError::Multiple(failures))
        }
    }
}
