use oscbridge_core::{EvaluationContext, Parameters};

use super::{validate_children, Condition};
use crate::error::{EvaluationError, ValidationError};
use crate::tracker::ConditionTracker;

/// Matches when any child matches. Stops at the first true or failing child.
#[derive(Debug)]
pub struct OrCondition {
    path: String,
    configured: bool,
    children: Vec<Box<dyn Condition>>,
    tracker: ConditionTracker,
}

impl OrCondition {
    pub fn new(path: String, tracker: ConditionTracker) -> Self {
        Self {
            path,
            configured: false,
            children: Vec::new(),
            tracker,
        }
    }
}

impl Condition for OrCondition {
    fn kind(&self) -> &'static str {
        "OR"
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn set_parameters(&mut self, _parameters: &Parameters) {
        self.configured = true;
    }

    fn add_child(&mut self, child: Box<dyn Condition>) {
        self.children.push(child);
    }

    fn evaluate(&self, ctx: &EvaluationContext) -> Result<bool, EvaluationError> {
        for (index, child) in self.children.iter().enumerate() {
            self.tracker.log(&self.path, format_args!("Checking on child {}...", index));
            match child.evaluate(ctx) {
                Err(e) => {
                    self.tracker.result(
                        false,
                        &self.path,
                        format_args!("child {} evaluation failed: {}", index, e),
                    );
                    return Err(EvaluationError::Child {
                        path: self.path.clone(),
                        index,
                        source: Box::new(e),
                    });
                }
                Ok(true) => {
                    return Ok(self.tracker.result(
                        true,
                        &self.path,
                        format_args!("child {} returned true", index),
                    ))
                }
                Ok(false) => {}
            }
        }
        Ok(self.tracker.result(false, &self.path, "all children returned false"))
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if !self.configured {
            return Err(ValidationError::Unconfigured {
                path: self.path.clone(),
            });
        }
        if self.children.is_empty() {
            return Err(ValidationError::NoChildren {
                path: self.path.clone(),
            });
        }
        validate_children(&self.children)
    }
}
