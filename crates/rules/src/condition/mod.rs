//! Condition tree nodes.
//!
//! A trigger chain is a tree of [`Condition`]s built once by the composer and
//! evaluated against a fresh [`EvaluationContext`] on every store change.
//! Node kinds are looked up by name in a [`ConditionRegistry`], so new kinds
//! plug in without touching the tree walk.

mod and;
mod not;
mod or;
mod osc_match;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use oscbridge_core::{EvaluationContext, Parameters};

use crate::error::{EvaluationError, ValidationError};
use crate::tracker::ConditionTracker;

pub use and::AndCondition;
pub use not::NotCondition;
pub use or::OrCondition;
pub use osc_match::{ArgumentCondition, MatchCondition, ValueMatch};

/// A node of a trigger chain.
pub trait Condition: Send + Sync + fmt::Debug {
    /// Short upper-case node name, e.g. `AND`.
    fn kind(&self) -> &'static str;

    /// Diagnostic location of this node inside its action.
    fn path(&self) -> &str;

    /// Apply raw config parameters. Problems are kept and surface in [`validate`](Self::validate).
    fn set_parameters(&mut self, parameters: &Parameters);

    fn add_child(&mut self, child: Box<dyn Condition>);

    fn evaluate(&self, ctx: &EvaluationContext) -> Result<bool, EvaluationError>;

    /// Check this node and its whole subtree.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Builds an unconfigured node for the given path.
pub type ConditionFactory = Arc<dyn Fn(String) -> Box<dyn Condition> + Send + Sync>;

/// Condition type name → factory.
pub type ConditionRegistry = HashMap<String, ConditionFactory>;

/// Registry with the built-in `and`, `or`, `not` and `osc_match` nodes.
pub fn default_conditions(tracker: ConditionTracker) -> ConditionRegistry {
    let mut registry = ConditionRegistry::new();
    registry.insert(
        "and".to_string(),
        Arc::new(move |path: String| Box::new(AndCondition::new(path, tracker)) as Box<dyn Condition>),
    );
    registry.insert(
        "or".to_string(),
        Arc::new(move |path: String| Box::new(OrCondition::new(path, tracker)) as Box<dyn Condition>),
    );
    registry.insert(
        "not".to_string(),
        Arc::new(move |path: String| Box::new(NotCondition::new(path, tracker)) as Box<dyn Condition>),
    );
    registry.insert(
        "osc_match".to_string(),
        Arc::new(move |path: String| Box::new(MatchCondition::new(path, tracker)) as Box<dyn Condition>),
    );
    registry
}

/// Validate every child in order.
fn validate_children(children: &[Box<dyn Condition>]) -> Result<(), ValidationError> {
    children.iter().try_for_each(|child| child.validate())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    /// Leaf with a switchable result that counts its evaluations.
    #[derive(Debug, Clone, Default)]
    pub struct Fixed {
        pub result: Arc<AtomicBool>,
        pub calls: Arc<AtomicUsize>,
    }

    impl Fixed {
        pub fn new(result: bool) -> Self {
            Self {
                result: Arc::new(AtomicBool::new(result)),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        pub fn set(&self, result: bool) {
            self.result.store(result, Ordering::SeqCst);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Condition for Fixed {
        fn kind(&self) -> &'static str {
            "FIXED"
        }
        fn path(&self) -> &str {
            "fixed"
        }
        fn set_parameters(&mut self, _parameters: &Parameters) {}
        fn add_child(&mut self, _child: Box<dyn Condition>) {}
        fn evaluate(&self, _ctx: &EvaluationContext) -> Result<bool, EvaluationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.result.load(Ordering::SeqCst))
        }
        fn validate(&self) -> Result<(), ValidationError> {
            Ok(())
        }
    }

    /// Leaf that always fails to evaluate.
    #[derive(Debug, Default)]
    pub struct Failing;

    impl Condition for Failing {
        fn kind(&self) -> &'static str {
            "FAILING"
        }
        fn path(&self) -> &str {
            "failing"
        }
        fn set_parameters(&mut self, _parameters: &Parameters) {}
        fn add_child(&mut self, _child: Box<dyn Condition>) {}
        fn evaluate(&self, _ctx: &EvaluationContext) -> Result<bool, EvaluationError> {
            Err(EvaluationError::Condition {
                path: "failing".to_string(),
                reason: "boom".to_string(),
            })
        }
        fn validate(&self) -> Result<(), ValidationError> {
            Ok(())
        }
    }

    pub fn ctx() -> EvaluationContext {
        EvaluationContext::new(oscbridge_core::FactStore::new())
    }
}
