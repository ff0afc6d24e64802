use oscbridge_core::{EvaluationContext, Parameters};

use super::{validate_children, Condition};
use crate::error::{EvaluationError, ValidationError};
use crate::tracker::ConditionTracker;

/// Negates its single child.
#[derive(Debug)]
pub struct NotCondition {
    path: String,
    configured: bool,
    children: Vec<Box<dyn Condition>>,
    tracker: ConditionTracker,
}

impl NotCondition {
    pub fn new(path: String, tracker: ConditionTracker) -> Self {
        Self {
            path,
            configured: false,
            children: Vec::new(),
            tracker,
        }
    }
}

impl Condition for NotCondition {
    fn kind(&self) -> &'static str {
        "NOT"
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
        let [child] = self.children.as_slice() else {
            return Err(EvaluationError::Condition {
                path: self.path.clone(),
                reason: format!("expected exactly one child, found {}", self.children.len()),
            });
        };

        match child.evaluate(ctx) {
            Ok(matched) => Ok(self.tracker.result(
                !matched,
                &self.path,
                format_args!("child returned {}", matched),
            )),
            Err(e) => Err(EvaluationError::Child {
                path: self.path.clone(),
                index: 0,
                source: Box::new(e),
            }),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if !self.configured {
            return Err(ValidationError::Unconfigured {
                path: self.path.clone(),
            });
        }
        match self.children.len() {
            0 => Err(ValidationError::NoChildren {
                path: self.path.clone(),
            }),
            1 => validate_children(&self.children),
            found => Err(ValidationError::Arity {
                path: self.path.clone(),
                expected: 1,
                found,
            }),
        }
    }
}
