//! Builds runnable actions from the `actions` config section.

use indexmap::IndexMap;
use tracing::info;

use oscbridge_core::config::{ActionConfig, ConditionConfig, TaskConfig};

use crate::action::Action;
use crate::condition::{Condition, ConditionRegistry};
use crate::error::ComposeError;
use crate::task::{Task, TaskRegistry};

/// Instantiates trigger chains and task lists through the registries.
pub struct ActionComposer<'a> {
    conditions: &'a ConditionRegistry,
    tasks: &'a TaskRegistry,
}

impl<'a> ActionComposer<'a> {
    pub fn new(conditions: &'a ConditionRegistry, tasks: &'a TaskRegistry) -> Self {
        Self { conditions, tasks }
    }

    /// Compose every action in declaration order.
    ///
    /// The first problem aborts composition; no partial list is returned.
    pub fn compose(&self, actions: &IndexMap<String, ActionConfig>) -> Result<Vec<Action>, ComposeError> {
        let mut composed = Vec::with_capacity(actions.len());

        for (name, config) in actions {
            let trigger_chain = self.convert_condition(name, &config.trigger_chain, name, 0)?;
            trigger_chain
                .validate()
                .map_err(|source| ComposeError::InvalidTrigger {
                    action: name.clone(),
                    source,
                })?;

            let tasks = self.convert_tasks(name, &config.tasks)?;

            info!(
                action = %name,
                tasks = tasks.len(),
                debounce_millis = config.debounce_millis,
                "Action composed"
            );
            composed.push(Action::new(name.clone(), trigger_chain, tasks, config.debounce_millis));
        }

        Ok(composed)
    }

    /// Depth-first instantiation. `parent_path` and `index` locate the node
    /// as `{parent_path}/{type}:{index}`.
    fn convert_condition(
        &self,
        action: &str,
        config: &ConditionConfig,
        parent_path: &str,
        index: usize,
    ) -> Result<Box<dyn Condition>, ComposeError> {
        let path = format!("{}/{}:{}", parent_path, config.kind, index);
        let factory = self
            .conditions
            .get(&config.kind)
            .ok_or_else(|| ComposeError::UnknownCondition {
                action: action.to_string(),
                path: path.clone(),
                kind: config.kind.clone(),
            })?;

        let mut condition = factory(path.clone());
        condition.set_parameters(&config.parameters);

        for (child_index, child) in config.children.iter().enumerate() {
            condition.add_child(self.convert_condition(action, child, &path, child_index)?);
        }
        Ok(condition)
    }

    fn convert_tasks(&self, action: &str, configs: &[TaskConfig]) -> Result<Vec<Box<dyn Task>>, ComposeError> {
        configs
            .iter()
            .enumerate()
            .map(|(index, config)| {
                let factory = self
                    .tasks
                    .get(&config.kind)
                    .ok_or_else(|| ComposeError::UnknownTask {
                        action: action.to_string(),
                        index,
                        kind: config.kind.clone(),
                    })?;

                let mut task = factory();
                task.set_parameters(&config.parameters);
                task.validate().map_err(|source| ComposeError::InvalidTask {
                    action: action.to_string(),
                    index,
                    kind: config.kind.clone(),
                    source,
                })?;
                Ok(task)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::condition::default_conditions;
    use crate::error::ValidationError;
    use crate::task::testing::Recording;
    use crate::tracker::ConditionTracker;
    use oscbridge_core::BridgeConfig;

    fn task_registry() -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        registry.insert(
            "record".to_string(),
            Arc::new(|| {
                Box::new(Recording::new("record", false, Arc::new(Mutex::new(Vec::new()))))
                    as Box<dyn Task>
            }),
        );
        registry
    }

    fn compose(yaml: &str) -> Result<Vec<Action>, ComposeError> {
        let config = BridgeConfig::from_yaml(yaml).unwrap();
        let conditions = default_conditions(ConditionTracker::default());
        let tasks = task_registry();
        ActionComposer::new(&conditions, &tasks).compose(&config.actions)
    }

    #[test]
    fn composes_in_declaration_order_with_paths() {
        let actions = compose(
            r#"
actions:
  mute_alert:
    debounce_millis: 100
    trigger_chain:
      type: and
      children:
        - type: osc_match
          parameters: {address: /ch/01/mix/on}
        - type: not
          children:
            - type: osc_match
              parameters: {address: /ch/02/mix/on}
    tasks:
      - type: record
      - type: record
  other:
    trigger_chain:
      type: osc_match
      parameters: {address: /x}
"#,
        )
        .unwrap();

        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].name(), "mute_alert");
        assert_eq!(actions[0].debounce_millis(), 100);
        assert_eq!(actions[0].tasks().len(), 2);
        assert_eq!(actions[0].trigger_chain().path(), "mute_alert/and:0");
        assert_eq!(actions[0].trigger_chain().kind(), "AND");
        assert_eq!(actions[1].name(), "other");
        assert_eq!(actions[1].trigger_chain().path(), "other/osc_match:0");
    }

    #[test]
    fn nested_paths_carry_sibling_index() {
        let err = compose(
            r#"
actions:
  nested:
    trigger_chain:
      type: and
      children:
        - type: osc_match
          parameters: {address: /ok}
        - type: or
          children:
            - type: osc_match
              parameters: {}
"#,
        )
        .unwrap_err();

        match err {
            ComposeError::InvalidTrigger { action, source } => {
                assert_eq!(action, "nested");
                match source {
                    ValidationError::Parameter { path, .. } => {
                        assert_eq!(path, "nested/and:0/or:1/osc_match:0")
                    }
                    other => panic!("unexpected validation error: {other}"),
                }
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_task_type_fails_whole_composition() {
        let err = compose(
            r#"
actions:
  fine:
    trigger_chain: {type: osc_match, parameters: {address: /a}}
    tasks: [{type: record}]
  broken:
    trigger_chain: {type: osc_match, parameters: {address: /b}}
    tasks: [{type: record}, {type: teleport}]
"#,
        )
        .unwrap_err();

        assert!(matches!(
            &err,
            ComposeError::UnknownTask { action, index: 1, kind } if action == "broken" && kind == "teleport"
        ));
        assert!(err.to_string().contains("no such task type registered: teleport"));
    }

    #[test]
    fn unknown_condition_type_is_reported() {
        let err = compose(
            r#"
actions:
  a:
    trigger_chain: {type: xor, children: []}
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ComposeError::UnknownCondition { ref kind, .. } if kind == "xor"));
    }

    #[test]
    fn empty_and_is_a_structural_error() {
        let err = compose(
            r#"
actions:
  a:
    trigger_chain: {type: and}
"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ComposeError::InvalidTrigger { source: ValidationError::NoChildren { .. }, .. }
        ));
    }
}
