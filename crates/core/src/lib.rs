pub mod config;
pub mod error;
pub mod message;
pub mod snapshot;
pub mod store;
pub mod watch;

pub use config::{BridgeConfig, Parameters};
pub use error::*;
pub use message::{Argument, Message};
pub use store::{FactStore, Record};
pub use watch::EvaluationContext;
