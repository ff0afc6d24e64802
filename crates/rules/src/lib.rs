//! Rule engine for the OSC bridge.
//!
//! This crate provides:
//! - Trigger chains of AND/OR/NOT/`osc_match` condition nodes
//! - The task trait and task registry
//! - [`ActionComposer`], which turns the `actions` config into [`Action`]s
//! - Parameter sanitizing shared by conditions and tasks

pub mod action;
pub mod composer;
pub mod condition;
pub mod error;
pub mod params;
pub mod task;
pub mod tracker;

pub use action::Action;
pub use composer::ActionComposer;
pub use condition::{default_conditions, Condition, ConditionFactory, ConditionRegistry};
pub use error::{ComposeError, EvaluationError, ParamError, TaskError, ValidationError};
pub use task::{Configured, Task, TaskFactory, TaskRegistry};
pub use tracker::ConditionTracker;
