//! The sample configuration composes against the real task implementations.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use oscbridge_core::BridgeConfig;
use oscbridge_rules::{default_conditions, ActionComposer, ComposeError, ConditionTracker};
use oscbridge_sources::{build_sources, Source};
use oscbridge_tasks::default_tasks;

fn sample_config() -> BridgeConfig {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config.example.yml");
    BridgeConfig::from_file(&path).unwrap()
}

#[test]
fn sample_task_parameters_validate() {
    let config = sample_config();
    let connections: HashMap<String, Arc<dyn Source>> =
        build_sources(&config.osc_sources, &config.app.debug)
            .into_iter()
            .map(|handle| (handle.name, handle.source))
            .collect();

    let conditions = default_conditions(ConditionTracker::new(false));
    let tasks = default_tasks(false, Arc::new(connections));
    let actions = ActionComposer::new(&conditions, &tasks)
        .compose(&config.actions)
        .unwrap();
    assert_eq!(actions.len(), 2);
}

#[test]
fn one_bad_task_rejects_the_whole_config() {
    let mut config = sample_config();
    let muted = config.actions.get_mut("mic_muted").unwrap();
    muted.tasks[0].parameters.remove("delay_millis");

    let conditions = default_conditions(ConditionTracker::new(false));
    let tasks = default_tasks(false, Arc::new(HashMap::new()));
    let err = ActionComposer::new(&conditions, &tasks)
        .compose(&config.actions)
        .unwrap_err();

    assert!(matches!(err, ComposeError::InvalidTask { index: 0, .. }));
    assert!(err.to_string().contains("mic_muted"));
}
