//! Built-in tasks an action can run once its trigger chain matches.

pub mod delay;
pub mod http_request;
pub mod run_command;
pub mod send_osc_message;

use std::sync::Arc;

use oscbridge_rules::{Task, TaskFactory, TaskRegistry};

pub use delay::DelayTask;
pub use http_request::HttpRequestTask;
pub use run_command::RunCommandTask;
pub use send_osc_message::{Connections, SendOscMessageTask};

/// Registry of every built-in task type.
///
/// `connections` backs `send_osc_message`; HTTP tasks share one client.
pub fn default_tasks(debug_tasks: bool, connections: Connections) -> TaskRegistry {
    let client = reqwest::Client::new();
    let mut registry = TaskRegistry::new();

    let delay: TaskFactory = Arc::new(move || Box::new(DelayTask::new(debug_tasks)) as Box<dyn Task>);
    registry.insert(delay::KIND.to_string(), delay);

    let http: TaskFactory = Arc::new(move || {
        Box::new(HttpRequestTask::new(client.clone(), debug_tasks)) as Box<dyn Task>
    });
    registry.insert(http_request::KIND.to_string(), http);

    let command: TaskFactory = Arc::new(|| Box::new(RunCommandTask::new()) as Box<dyn Task>);
    registry.insert(run_command::KIND.to_string(), command);

    let send: TaskFactory = Arc::new(move || {
        Box::new(SendOscMessageTask::new(Arc::clone(&connections), debug_tasks)) as Box<dyn Task>
    });
    registry.insert(send_osc_message::KIND.to_string(), send);

    registry
}
