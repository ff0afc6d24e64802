use std::fmt;

use thiserror::Error;

/// A raw parameter failed a [`ParameterDefinition`](crate::params::ParameterDefinition) check.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParamError {
    #[error("parameter '{name}' is not specified")]
    Missing { name: String },

    #[error("parameter '{name}' is of a wrong type ({found}). Allowed types: {expected}")]
    WrongType {
        name: String,
        found: String,
        expected: String,
    },

    #[error("parameter '{name}' value does not match: {pattern}")]
    Mismatch { name: String, pattern: String },

    #[error("parameter '{name}' has an unusable value pattern: {pattern}")]
    BadPattern { name: String, pattern: String },
}

/// Configuration problem found in a single condition node or task.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{path}: parameters were never set")]
    Unconfigured { path: String },

    #[error("{path} failed to verify parameters: {source}")]
    Parameter {
        path: String,
        #[source]
        source: ParamError,
    },

    #[error("{path}: {reason}")]
    Invalid { path: String, reason: String },

    #[error("{path}: this node has no children")]
    NoChildren { path: String },

    #[error("{path}: this node needs exactly {expected} child(ren), found {found}")]
    Arity {
        path: String,
        expected: usize,
        found: usize,
    },

    #[error("{path}: this node can not have children")]
    UnexpectedChildren { path: String },
}

/// Turning the `actions` config into runnable [`Action`](crate::action::Action)s failed.
///
/// Composition is all-or-nothing, so any of these means no actions at all.
#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("action '{action}': there are no condition implementation for type '{kind}' (at {path})")]
    UnknownCondition {
        action: String,
        path: String,
        kind: String,
    },

    #[error("failed to validate {action}'s triggers: {source}")]
    InvalidTrigger {
        action: String,
        #[source]
        source: ValidationError,
    },

    #[error("action '{action}': no such task type registered: {kind} (task {index})")]
    UnknownTask {
        action: String,
        index: usize,
        kind: String,
    },

    #[error("failed to validate {action} action's [{index}-{kind}] task: {source}")]
    InvalidTask {
        action: String,
        index: usize,
        kind: String,
        #[source]
        source: ValidationError,
    },
}

/// A condition could not be evaluated against the current snapshot.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("{path}: {reason}")]
    Condition { path: String, reason: String },

    #[error("{path}: child {index} evaluation failed: {source}")]
    Child {
        path: String,
        index: usize,
        #[source]
        source: Box<EvaluationError>,
    },
}

/// A task failed while running.
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("task was executed without valid parameters")]
    NotConfigured,

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to execute task(s): {}", FailedTasks(.0))]
    Multiple(Vec<(usize, TaskError)>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

struct FailedTasks<'a>(&'a [(usize, TaskError)]);

impl fmt::Display for FailedTasks<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, (index, err)) in self.0.iter().enumerate() {
            if n > 0 {
                write!(f, "; ")?;
            }
            write!(f, "task {}: {}", index, err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_lists_every_failure() {
        let err = TaskError::Multiple(vec![
            (1, TaskError::Timeout { secs: 3 }),
            (2, TaskError::NotConfigured),
        ]);
        assert_eq!(
            err.to_string(),
            "failed to execute task(s): task 1: timed out after 3s; task 2: task was executed without valid parameters"
        );
    }
}
