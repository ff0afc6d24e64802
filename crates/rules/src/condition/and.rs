use oscbridge_core::{EvaluationContext, Parameters};

use super::{validate_children, Condition};
use crate::error::{EvaluationError, ValidationError};
use crate::tracker::ConditionTracker;

/// Matches when every child matches. Stops at the first false or failing child.
#[derive(Debug)]
pub struct AndCondition {
    path: String,
    configured: bool,
    children: Vec<Box<dyn Condition>>,
    tracker: ConditionTracker,
}

impl AndCondition {
    pub fn new(path: String, tracker: ConditionTracker) -> Self {
        Self {
            path,
            configured: false,
            children: Vec::new(),
            tracker,
        }
    }
}

impl Condition for AndCondition {
    fn kind(&self) -> &'static str {
        "AND"
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
                Ok(false) => {
                    return Ok(self.tracker.result(
                        false,
                        &self.path,
                        format_args!("child {} returned false", index),
                    ))
                }
                Ok(true) => {}
            }
        }
        Ok(self.tracker.result(true, &self.path, "all children returned true"))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::testing::{ctx, Failing, Fixed};

    fn and_of(children: Vec<Box<dyn Condition>>) -> AndCondition {
        let mut node = AndCondition::new("a/and:0".into(), ConditionTracker::default());
        node.set_parameters(&Parameters::new());
        for child in children {
            node.add_child(child);
        }
        node
    }

    #[test]
    fn all_true_matches() {
        let node = and_of(vec![Box::new(Fixed::new(true)), Box::new(Fixed::new(true))]);
        assert!(node.evaluate(&ctx()).unwrap());
    }

    #[test]
    fn false_short_circuits_before_error() {
        let node = and_of(vec![Box::new(Fixed::new(false)), Box::new(Failing)]);
        assert!(!node.evaluate(&ctx()).unwrap());
    }

    #[test]
    fn stops_evaluating_after_first_false() {
        let last = Fixed::new(true);
        let node = and_of(vec![Box::new(Fixed::new(false)), Box::new(last.clone())]);
        node.evaluate(&ctx()).unwrap();
        assert_eq!(last.calls(), 0);
    }

    #[test]
    fn child_error_is_surfaced() {
        let node = and_of(vec![Box::new(Fixed::new(true)), Box::new(Failing)]);
        let err = node.evaluate(&ctx()).unwrap_err();
        assert!(matches!(err, EvaluationError::Child { index: 1, .. }));
    }

    #[test]
    fn needs_children_and_parameters() {
        let empty = and_of(vec![]);
        assert!(matches!(empty.validate(), Err(ValidationError::NoChildren { .. })));

        let mut unconfigured = AndCondition::new("a/and:0".into(), ConditionTracker::default());
        unconfigured.add_child(Box::new(Fixed::new(true)));
        assert!(matches!(unconfigured.validate(), Err(ValidationError::Unconfigured { .. })));
    }
}
