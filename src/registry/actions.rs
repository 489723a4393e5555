use serde::{Deserialize, Serialize};

/// Closed set of action types. There is no runtime registration: the catalog
/// is fixed at compile time and lookups for unknown keys return None rather
/// than panicking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    CreateTask,
    SendNotification,
    DraftCommunication,
    CreateTicket,
    UpdateClient,
    CreateAlert,
}

impl ActionType {
    pub const ALL: [ActionType; 6] = [
        ActionType::CreateTask,
        ActionType::SendNotification,
        ActionType::DraftCommunication,
        ActionType::CreateTicket,
        ActionType::UpdateClient,
        ActionType::CreateAlert,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ActionType::CreateTask => "create_task",
            ActionType::SendNotification => "send_notification",
            ActionType::DraftCommunication => "draft_communication",
            ActionType::CreateTicket => "create_ticket",
            ActionType::UpdateClient => "update_client",
            ActionType::CreateAlert => "create_alert",
        }
    }

    pub fn from_key(key: &str) -> Option<ActionType> {
        match key {
            "create_task" => Some(ActionType::CreateTask),
            "send_notification" => Some(ActionType::SendNotification),
            "draft_communication" => Some(ActionType::DraftCommunication),
            "create_ticket" => Some(ActionType::CreateTicket),
            "update_client" => Some(ActionType::UpdateClient),
            "create_alert" => Some(ActionType::CreateAlert),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Task,
    Communication,
    Data,
    Alert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Textarea,
    Select,
    List,
}

/// Declarative config field used both for builder form rendering and for the
/// validator's required-field checks.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigField {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionTypeMetadata {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub category: ActionCategory,
    pub supports_approval: bool,
    pub config_schema: &'static [ConfigField],
}

const CREATE_TASK_SCHEMA: &[ConfigField] = &[
    ConfigField {
        name: "title",
        label: "Task title",
        kind: FieldKind::Text,
        required: true,
    },
    ConfigField {
        name: "description",
        label: "Description",
        kind: FieldKind::Textarea,
        required: false,
    },
    ConfigField {
        name: "assignee",
        label: "Assignee",
        kind: FieldKind::Select,
        required: false,
    },
];

const SEND_NOTIFICATION_SCHEMA: &[ConfigField] = &[
    ConfigField {
        name: "message",
        label: "Message",
        kind: FieldKind::Textarea,
        required: true,
    },
    ConfigField {
        name: "recipients",
        label: "Recipients",
        kind: FieldKind::List,
        required: true,
    },
];

const DRAFT_COMMUNICATION_SCHEMA: &[ConfigField] = &[
    ConfigField {
        name: "subject",
        label: "Subject",
        kind: FieldKind::Text,
        required: true,
    },
    ConfigField {
        name: "body",
        label: "Body",
        kind: FieldKind::Textarea,
        required: true,
    },
    ConfigField {
        name: "channel",
        label: "Channel",
        kind: FieldKind::Select,
        required: false,
    },
];

const CREATE_TICKET_SCHEMA: &[ConfigField] = &[
    ConfigField {
        name: "subject",
        label: "Subject",
        kind: FieldKind::Text,
        required: true,
    },
    ConfigField {
        name: "priority",
        label: "Priority",
        kind: FieldKind::Select,
        required: false,
    },
];

const UPDATE_CLIENT_SCHEMA: &[ConfigField] = &[
    ConfigField {
        name: "field",
        label: "Field to update",
        kind: FieldKind::Select,
        required: true,
    },
    ConfigField {
        name: "value",
        label: "New value",
        kind: FieldKind::Text,
        required: true,
    },
];

const CREATE_ALERT_SCHEMA: &[ConfigField] = &[
    ConfigField {
        name: "message",
        label: "Alert message",
        kind: FieldKind::Textarea,
        required: true,
    },
    ConfigField {
        name: "severity",
        label: "Severity",
        kind: FieldKind::Select,
        required: false,
    },
];

static ACTION_TYPES: [ActionTypeMetadata; 6] = [
    ActionTypeMetadata {
        action_type: ActionType::CreateTask,
        name: "Create Task",
        description: "Add a task to the team's queue",
        icon: "check-square",
        category: ActionCategory::Task,
        supports_approval: false,
        config_schema: CREATE_TASK_SCHEMA,
    },
    ActionTypeMetadata {
        action_type: ActionType::SendNotification,
        name: "Send Notification",
        description: "Notify one or more team members",
        icon: "bell",
        category: ActionCategory::Communication,
        supports_approval: false,
        config_schema: SEND_NOTIFICATION_SCHEMA,
    },
    ActionTypeMetadata {
        action_type: ActionType::DraftCommunication,
        name: "Draft Communication",
        description: "Prepare an outbound message for review",
        icon: "mail",
        category: ActionCategory::Communication,
        supports_approval: true,
        config_schema: DRAFT_COMMUNICATION_SCHEMA,
    },
    ActionTypeMetadata {
        action_type: ActionType::CreateTicket,
        name: "Create Ticket",
        description: "Open a support ticket for the client",
        icon: "life-buoy",
        category: ActionCategory::Task,
        supports_approval: false,
        config_schema: CREATE_TICKET_SCHEMA,
    },
    ActionTypeMetadata {
        action_type: ActionType::UpdateClient,
        name: "Update Client",
        description: "Change a field on the client record",
        icon: "user-check",
        category: ActionCategory::Data,
        supports_approval: true,
        config_schema: UPDATE_CLIENT_SCHEMA,
    },
    ActionTypeMetadata {
        action_type: ActionType::CreateAlert,
        name: "Create Alert",
        description: "Raise an alert on the agency dashboard",
        icon: "alert-triangle",
        category: ActionCategory::Alert,
        supports_approval: false,
        config_schema: CREATE_ALERT_SCHEMA,
    },
];

/// All registered action types in registry order.
pub fn action_types() -> &'static [ActionTypeMetadata] {
    &ACTION_TYPES
}

/// Registry-order subset for one category.
pub fn action_types_by_category(category: ActionCategory) -> Vec<&'static ActionTypeMetadata> {
    ACTION_TYPES
        .iter()
        .filter(|meta| meta.category == category)
        .collect()
}

pub fn action_metadata(action_type: ActionType) -> &'static ActionTypeMetadata {
    // ACTION_TYPES is declared in variant order.
    &ACTION_TYPES[action_type as usize]
}

/// String-keyed lookup for configs coming out of storage. Unknown keys yield
/// None, never a panic.
pub fn action_metadata_by_key(key: &str) -> Option<&'static ActionTypeMetadata> {
    ActionType::from_key(key).map(action_metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_type_is_registered_once_in_stable_order() {
        let keys: Vec<&str> = action_types()
            .iter()
            .map(|meta| meta.action_type.key())
            .collect();
        assert_eq!(
            keys,
            vec![
                "create_task",
                "send_notification",
                "draft_communication",
                "create_ticket",
                "update_client",
                "create_alert",
            ]
        );
    }

    #[test]
    fn task_category_filter_returns_only_task_types() {
        let tasks = action_types_by_category(ActionCategory::Task);
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|m| m.category == ActionCategory::Task));
        assert_eq!(tasks[0].action_type, ActionType::CreateTask);
        assert_eq!(tasks[1].action_type, ActionType::CreateTicket);
    }

    #[test]
    fn approval_flag_covers_exactly_the_reviewable_actions() {
        let approvable: Vec<ActionType> = action_types()
            .iter()
            .filter(|m| m.supports_approval)
            .map(|m| m.action_type)
            .collect();
        assert_eq!(
            approvable,
            vec![ActionType::DraftCommunication, ActionType::UpdateClient]
        );
    }

    #[test]
    fn unknown_key_lookup_is_none() {
        assert!(action_metadata_by_key("teleport").is_none());
        assert!(ActionType::from_key("").is_none());
    }

    #[test]
    fn key_round_trips() {
        for action_type in ActionType::ALL {
            assert_eq!(ActionType::from_key(action_type.key()), Some(action_type));
            assert_eq!(action_metadata(action_type).action_type, action_type);
        }
    }
}
