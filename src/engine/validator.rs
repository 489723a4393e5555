use serde_json::Value;

use crate::models::workflow::{WorkflowAction, WorkflowTrigger};
use crate::registry::actions::action_metadata_by_key;
use crate::registry::triggers::trigger_metadata_by_key;

pub const MAX_DELAY_MINUTES: i64 = 1440;
pub const DELAY_BOUNDS_ERROR: &str = "Delay must be between 0 and 1440 minutes (24 hours)";

/// Result of a validation pass. `valid` is true iff `errors` is empty.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationOutcome {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Structural validation of a single action: known type, required config
/// fields present and non-empty, delay within bounds. All checks run, so one
/// call can surface several errors at once. Pure and stateless; the same
/// function backs inline builder feedback and the pre-save server gate.
pub fn validate_action_config(action: &WorkflowAction) -> ValidationOutcome {
    let mut errors = Vec::new();

    match action_metadata_by_key(&action.action_type) {
        None => {
            errors.push(format!("Unknown action type: {}", action.action_type));
        }
        Some(meta) => {
            for field in meta.config_schema.iter().filter(|f| f.required) {
                if is_missing(action.config.get(field.name)) {
                    errors.push(format!("Missing required field: {}", field.name));
                }
            }
        }
    }

    if action.delay_minutes < 0 || action.delay_minutes > MAX_DELAY_MINUTES {
        errors.push(DELAY_BOUNDS_ERROR.to_string());
    }

    ValidationOutcome::from_errors(errors)
}

/// Missing key, empty string, and empty array all count as missing.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Save-time gate for the builder: a workflow needs a name, at least one
/// trigger and one action, known trigger types, and every action valid.
pub fn validate_workflow(
    name: &str,
    triggers: &[WorkflowTrigger],
    actions: &[WorkflowAction],
) -> ValidationOutcome {
    let mut errors = Vec::new();

    if name.trim().is_empty() {
        errors.push("Workflow name is required".to_string());
    }
    if triggers.is_empty() {
        errors.push("Workflow needs at least one trigger".to_string());
    }
    if actions.is_empty() {
        errors.push("Workflow needs at least one action".to_string());
    }

    for trigger in triggers {
        if trigger_metadata_by_key(&trigger.trigger_type).is_none() {
            errors.push(format!("Unknown trigger type: {}", trigger.trigger_type));
        }
    }

    for action in actions {
        errors.extend(validate_action_config(action).errors);
    }

    ValidationOutcome::from_errors(errors)
}

/// Update-time gate: only the parts present in the payload are checked, but
/// a provided part must stand on its own (a present-but-empty trigger list is
/// still an error).
pub fn validate_workflow_update(
    name: Option<&str>,
    triggers: Option<&[WorkflowTrigger]>,
    actions: Option<&[WorkflowAction]>,
) -> ValidationOutcome {
    let mut errors = Vec::new();

    if let Some(name) = name {
        if name.trim().is_empty() {
            errors.push("Workflow name is required".to_string());
        }
    }

    if let Some(triggers) = triggers {
        if triggers.is_empty() {
            errors.push("Workflow needs at least one trigger".to_string());
        }
        for trigger in triggers {
            if trigger_metadata_by_key(&trigger.trigger_type).is_none() {
                errors.push(format!("Unknown trigger type: {}", trigger.trigger_type));
            }
        }
    }

    if let Some(actions) = actions {
        if actions.is_empty() {
            errors.push("Workflow needs at least one action".to_string());
        }
        for action in actions {
            errors.extend(validate_action_config(action).errors);
        }
    }

    ValidationOutcome::from_errors(errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(action_type: &str, config: Value, delay_minutes: i64) -> WorkflowAction {
        WorkflowAction {
            id: "a1".into(),
            action_type: action_type.into(),
            name: String::new(),
            config,
            delay_minutes,
        }
    }

    fn trigger(trigger_type: &str, config: Value) -> WorkflowTrigger {
        WorkflowTrigger {
            id: "t1".into(),
            trigger_type: trigger_type.into(),
            config,
        }
    }

    #[test]
    fn unknown_action_type_is_the_only_error() {
        let outcome = validate_action_config(&action("teleport", json!({"x": 1}), 0));
        assert_eq!(outcome.valid, false);
        assert_eq!(outcome.errors, vec!["Unknown action type: teleport"]);
    }

    #[test]
    fn create_task_requires_title() {
        let missing = validate_action_config(&action("create_task", json!({}), 0));
        assert!(!missing.valid);
        assert!(missing.errors.iter().any(|e| e.contains("title")));

        let empty = validate_action_config(&action("create_task", json!({"title": "  "}), 0));
        assert!(!empty.valid);

        let ok = validate_action_config(&action("create_task", json!({"title": "Call"}), 0));
        assert!(ok.valid);
        assert!(ok.errors.is_empty());
    }

    #[test]
    fn send_notification_requires_message_and_recipients() {
        let outcome = validate_action_config(&action(
            "send_notification",
            json!({"message": "", "recipients": []}),
            0,
        ));
        assert!(!outcome.valid);
        assert!(outcome.errors.iter().any(|e| e.contains("message")));
        assert!(outcome.errors.iter().any(|e| e.contains("recipients")));

        let ok = validate_action_config(&action(
            "send_notification",
            json!({"message": "hi", "recipients": ["ops"]}),
            0,
        ));
        assert!(ok.valid);
    }

    #[test]
    fn update_client_requires_field_and_value() {
        let outcome = validate_action_config(&action("update_client", json!({"field": "owner"}), 0));
        assert_eq!(outcome.errors, vec!["Missing required field: value"]);
    }

    #[test]
    fn delay_bounds_are_inclusive() {
        for delay in [0, 1, 1440] {
            let outcome =
                validate_action_config(&action("create_task", json!({"title": "x"}), delay));
            assert!(outcome.valid, "delay {delay} should be valid");
        }
        for delay in [-1, 1441] {
            let outcome =
                validate_action_config(&action("create_task", json!({"title": "x"}), delay));
            assert_eq!(outcome.errors, vec![DELAY_BOUNDS_ERROR.to_string()]);
        }
    }

    #[test]
    fn checks_accumulate_rather_than_short_circuit() {
        let outcome = validate_action_config(&action("send_notification", json!({}), 9999));
        assert_eq!(outcome.errors.len(), 3);
    }

    #[test]
    fn validator_is_pure() {
        let subject = action("create_task", json!({}), -5);
        let first = validate_action_config(&subject);
        let second = validate_action_config(&subject);
        assert_eq!(first, second);
    }

    #[test]
    fn workflow_gate_rejects_empty_shapes() {
        let outcome = validate_workflow("", &[], &[]);
        assert!(!outcome.valid);
        assert_eq!(outcome.errors.len(), 3);

        let ok = validate_workflow(
            "Onboarding",
            &[trigger("stage_change", json!({"toStage": "Live"}))],
            &[action("create_task", json!({"title": "Welcome call"}), 0)],
        );
        assert!(ok.valid);
    }

    #[test]
    fn update_gate_only_checks_provided_parts() {
        let untouched = validate_workflow_update(None, None, None);
        assert!(untouched.valid);

        let renamed_blank = validate_workflow_update(Some("   "), None, None);
        assert_eq!(renamed_blank.errors, vec!["Workflow name is required"]);

        let emptied = validate_workflow_update(None, Some(&[]), Some(&[]));
        assert_eq!(emptied.errors.len(), 2);

        let bad_action = [action("create_task", json!({}), 0)];
        let outcome = validate_workflow_update(None, None, Some(&bad_action));
        assert_eq!(outcome.errors, vec!["Missing required field: title"]);
    }

    #[test]
    fn workflow_gate_flags_unknown_trigger_types() {
        let outcome = validate_workflow(
            "Onboarding",
            &[trigger("full_moon", json!({}))],
            &[action("create_task", json!({"title": "x"}), 0)],
        );
        assert_eq!(outcome.errors, vec!["Unknown trigger type: full_moon"]);
    }
}
