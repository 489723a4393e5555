use serde::{Deserialize, Serialize};

use super::actions::{ConfigField, FieldKind};

/// Closed set of trigger types, mirroring the action registry shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    StageChange,
    NewCommunication,
    Schedule,
    KeywordMatch,
    Inactivity,
}

impl TriggerType {
    pub const ALL: [TriggerType; 5] = [
        TriggerType::StageChange,
        TriggerType::NewCommunication,
        TriggerType::Schedule,
        TriggerType::KeywordMatch,
        TriggerType::Inactivity,
    ];

    pub fn key(self) -> &'static str {
        match self {
            TriggerType::StageChange => "stage_change",
            TriggerType::NewCommunication => "new_communication",
            TriggerType::Schedule => "schedule",
            TriggerType::KeywordMatch => "keyword_match",
            TriggerType::Inactivity => "inactivity",
        }
    }

    pub fn from_key(key: &str) -> Option<TriggerType> {
        match key {
            "stage_change" => Some(TriggerType::StageChange),
            "new_communication" => Some(TriggerType::NewCommunication),
            "schedule" => Some(TriggerType::Schedule),
            "keyword_match" => Some(TriggerType::KeywordMatch),
            "inactivity" => Some(TriggerType::Inactivity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerTypeMetadata {
    #[serde(rename = "type")]
    pub trigger_type: TriggerType,
    pub name: &'static str,
    pub icon: &'static str,
    pub config_schema: &'static [ConfigField],
}

const STAGE_CHANGE_SCHEMA: &[ConfigField] = &[
    ConfigField {
        name: "fromStage",
        label: "From stage",
        kind: FieldKind::Select,
        required: false,
    },
    ConfigField {
        name: "toStage",
        label: "To stage",
        kind: FieldKind::Select,
        required: false,
    },
    ConfigField {
        name: "anyStage",
        label: "Any stage movement",
        kind: FieldKind::Select,
        required: false,
    },
];

const NEW_COMMUNICATION_SCHEMA: &[ConfigField] = &[ConfigField {
    name: "channel",
    label: "Channel",
    kind: FieldKind::Select,
    required: false,
}];

const SCHEDULE_SCHEMA: &[ConfigField] = &[ConfigField {
    name: "time",
    label: "Time of day",
    kind: FieldKind::Text,
    required: true,
}];

const KEYWORD_MATCH_SCHEMA: &[ConfigField] = &[ConfigField {
    name: "keywords",
    label: "Keywords",
    kind: FieldKind::List,
    required: true,
}];

const INACTIVITY_SCHEMA: &[ConfigField] = &[ConfigField {
    name: "days",
    label: "Days without contact",
    kind: FieldKind::Text,
    required: true,
}];

static TRIGGER_TYPES: [TriggerTypeMetadata; 5] = [
    TriggerTypeMetadata {
        trigger_type: TriggerType::StageChange,
        name: "Client Stage Changed",
        icon: "git-branch",
        config_schema: STAGE_CHANGE_SCHEMA,
    },
    TriggerTypeMetadata {
        trigger_type: TriggerType::NewCommunication,
        name: "New Communication Received",
        icon: "inbox",
        config_schema: NEW_COMMUNICATION_SCHEMA,
    },
    TriggerTypeMetadata {
        trigger_type: TriggerType::Schedule,
        name: "On a Schedule",
        icon: "clock",
        config_schema: SCHEDULE_SCHEMA,
    },
    TriggerTypeMetadata {
        trigger_type: TriggerType::KeywordMatch,
        name: "Message Contains Keyword",
        icon: "search",
        config_schema: KEYWORD_MATCH_SCHEMA,
    },
    TriggerTypeMetadata {
        trigger_type: TriggerType::Inactivity,
        name: "Client Inactive",
        icon: "moon",
        config_schema: INACTIVITY_SCHEMA,
    },
];

pub fn trigger_types() -> &'static [TriggerTypeMetadata] {
    &TRIGGER_TYPES
}

pub fn trigger_metadata(trigger_type: TriggerType) -> &'static TriggerTypeMetadata {
    // TRIGGER_TYPES is declared in variant order.
    &TRIGGER_TYPES[trigger_type as usize]
}

pub fn trigger_metadata_by_key(key: &str) -> Option<&'static TriggerTypeMetadata> {
    TriggerType::from_key(key).map(trigger_metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_round_trips() {
        for trigger_type in TriggerType::ALL {
            assert_eq!(
                TriggerType::from_key(trigger_type.key()),
                Some(trigger_type)
            );
            assert_eq!(
                trigger_metadata(trigger_type).trigger_type,
                trigger_type
            );
        }
    }

    #[test]
    fn unknown_key_lookup_is_none() {
        assert!(trigger_metadata_by_key("full_moon").is_none());
    }

    #[test]
    fn schedule_requires_a_time() {
        let meta = trigger_metadata(TriggerType::Schedule);
        assert!(meta
            .config_schema
            .iter()
            .any(|field| field.name == "time" && field.required));
    }
}
