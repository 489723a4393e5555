use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The typed portion of an inbound domain event. Each variant corresponds to
/// a trigger family in the trigger registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    StageChange {
        from_stage: String,
        to_stage: String,
    },
    NewCommunication {
        #[serde(default)]
        channel: Option<String>,
        #[serde(default)]
        body: String,
    },
    ScheduleTick {
        /// Local wall-clock time of the tick, "HH:MM".
        time: String,
    },
    InactivityTick {
        days_inactive: i64,
    },
}

impl DomainEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::StageChange { .. } => "stage_change",
            DomainEvent::NewCommunication { .. } => "new_communication",
            DomainEvent::ScheduleTick { .. } => "schedule_tick",
            DomainEvent::InactivityTick { .. } => "inactivity_tick",
        }
    }
}

/// A full event as delivered to the coordinator: the typed event plus an
/// optional client snapshot and any extra fields the producer wants exposed
/// to variable substitution under the `trigger` namespace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationEvent {
    #[serde(flatten)]
    pub event: DomainEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<Value>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stage_change_round_trips_with_extras() {
        let event: AutomationEvent = serde_json::from_value(json!({
            "type": "stage_change",
            "from_stage": "Onboarding",
            "to_stage": "Live",
            "client": {"name": "Acme", "stage": "Live"},
            "data": {"movedBy": "jordan"}
        }))
        .unwrap();

        assert_eq!(
            event.event,
            DomainEvent::StageChange {
                from_stage: "Onboarding".into(),
                to_stage: "Live".into(),
            }
        );
        assert_eq!(event.event.kind(), "stage_change");
        assert_eq!(event.data.get("movedBy"), Some(&json!("jordan")));
    }

    #[test]
    fn unknown_event_type_is_rejected() {
        let parsed: Result<AutomationEvent, _> =
            serde_json::from_value(json!({"type": "solar_flare"}));
        assert!(parsed.is_err());
    }
}
