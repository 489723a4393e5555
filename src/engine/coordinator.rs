use std::time::Duration;

use serde_json::{Map, Value};
use thiserror::Error;
use time::OffsetDateTime;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::models::event::{AutomationEvent, DomainEvent};
use crate::models::workflow::{Workflow, WorkflowTrigger};
use crate::models::workflow_run::{run_status, ActionResult};
use crate::registry::actions::ActionType;
use crate::registry::triggers::TriggerType;
use crate::state::AppState;

use super::effects::EffectError;
use super::templating::{substitute_config, RunContext};
use super::validator::validate_action_config;

const PERSISTENCE_MAX_ATTEMPTS: usize = 3;
#[cfg(test)]
const PERSISTENCE_INITIAL_BACKOFF: Duration = Duration::from_millis(5);
#[cfg(not(test))]
const PERSISTENCE_INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Wall-clock length of one delay minute. Delays are in-memory waits, not
/// durable schedule entries; shortened under test so delayed actions can be
/// exercised quickly.
#[cfg(test)]
const DELAY_MINUTE: Duration = Duration::from_millis(2);
#[cfg(not(test))]
const DELAY_MINUTE: Duration = Duration::from_secs(60);

/// Hard deadline per action dispatch so a hung collaborator cannot leave a
/// run non-terminal forever.
#[cfg(test)]
const ACTION_DEADLINE: Duration = Duration::from_millis(50);
#[cfg(not(test))]
const ACTION_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(
        "coordinator persistence operation `{operation}` failed for workflow {workflow_id} after {attempts} attempts: {source}"
    )]
    Persistence {
        workflow_id: Uuid,
        operation: &'static str,
        attempts: usize,
        #[source]
        source: sqlx::Error,
    },
}

impl CoordinatorError {
    pub fn operation(&self) -> &'static str {
        match self {
            CoordinatorError::Persistence { operation, .. } => operation,
        }
    }

    pub fn attempts(&self) -> usize {
        match self {
            CoordinatorError::Persistence { attempts, .. } => *attempts,
        }
    }
}

/// Entry point for an inbound domain event: matches it against the tenant's
/// active workflows and starts a run for every match. Run rows are created
/// before returning so callers get their ids; the actions themselves execute
/// on detached tasks, so a caller that goes away (a dropped HTTP request
/// future) cannot strand a run mid-delay. Effect failures are recorded inside
/// the run records; only the initial workflow listing error reaches the
/// caller.
pub async fn handle_event(
    state: &AppState,
    agency_id: Uuid,
    event: &AutomationEvent,
) -> Result<Vec<Uuid>, sqlx::Error> {
    let workflows = state.workflow_repo.list_active_workflows(agency_id).await?;

    let mut run_ids = Vec::new();
    for workflow in workflows {
        // Triggers are OR'd, and a workflow fires at most once per event
        // even when several of its triggers match.
        if !workflow
            .triggers
            .iter()
            .any(|trigger| trigger_matches(trigger, event))
        {
            continue;
        }

        debug!(
            workflow_id = %workflow.id,
            agency_id = %agency_id,
            event_kind = event.event.kind(),
            "Workflow matched event"
        );

        match start_run(state, &workflow, event).await {
            Ok(run_id) => {
                run_ids.push(run_id);
                let state = state.clone();
                let event = event.clone();
                // No await between creating the run and spawning, so once the
                // id is visible the run is guaranteed to be driven.
                tokio::spawn(async move {
                    if let Err(err) = drive_run(&state, &workflow, &event, run_id).await {
                        error!(
                            run_id = %run_id,
                            workflow_id = %workflow.id,
                            ?err,
                            "Workflow run could not be finalized"
                        );
                    }
                });
            }
            Err(err) => {
                error!(
                    workflow_id = %workflow.id,
                    agency_id = %agency_id,
                    ?err,
                    "Workflow run could not be persisted"
                );
            }
        }
    }

    Ok(run_ids)
}

/// Type-specific match logic for one trigger against one event. Unknown
/// trigger types never match.
pub(crate) fn trigger_matches(trigger: &WorkflowTrigger, event: &AutomationEvent) -> bool {
    let Some(trigger_type) = TriggerType::from_key(&trigger.trigger_type) else {
        return false;
    };
    let config = &trigger.config;

    match (trigger_type, &event.event) {
        (
            TriggerType::StageChange,
            DomainEvent::StageChange {
                from_stage,
                to_stage,
            },
        ) => {
            if config
                .get("anyStage")
                .and_then(|v| v.as_bool())
                .unwrap_or(false)
            {
                return true;
            }
            let from_ok = match config.get("fromStage").and_then(|v| v.as_str()) {
                Some(want) if !want.is_empty() => want == from_stage,
                _ => true,
            };
            let to_ok = match config.get("toStage").and_then(|v| v.as_str()) {
                Some(want) if !want.is_empty() => want == to_stage,
                _ => true,
            };
            from_ok && to_ok
        }
        (TriggerType::NewCommunication, DomainEvent::NewCommunication { channel, .. }) => {
            match config.get("channel").and_then(|v| v.as_str()) {
                Some(want) if !want.is_empty() => channel.as_deref() == Some(want),
                _ => true,
            }
        }
        (TriggerType::KeywordMatch, DomainEvent::NewCommunication { body, .. }) => {
            let haystack = body.to_lowercase();
            config_keywords(config)
                .iter()
                .any(|keyword| haystack.contains(&keyword.to_lowercase()))
        }
        (TriggerType::Schedule, DomainEvent::ScheduleTick { time }) => {
            match config.get("time").and_then(|v| v.as_str()) {
                Some(want) => want == time,
                None => false,
            }
        }
        (TriggerType::Inactivity, DomainEvent::InactivityTick { days_inactive }) => {
            match config.get("days").and_then(value_as_i64) {
                Some(days) => *days_inactive >= days,
                None => false,
            }
        }
        _ => false,
    }
}

/// Keywords may arrive as a JSON array or a comma-separated string.
fn config_keywords(config: &Value) -> Vec<String> {
    match config.get("keywords") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(raw)) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Creates the pending run row for one matched workflow, snapshotting the
/// event as `trigger_data`.
pub(crate) async fn start_run(
    state: &AppState,
    workflow: &Workflow,
    event: &AutomationEvent,
) -> Result<Uuid, CoordinatorError> {
    let trigger_data = serde_json::to_value(event).unwrap_or(Value::Null);

    let repo = state.workflow_repo.clone();
    let agency_id = workflow.agency_id;
    let workflow_id = workflow.id;
    let run = retry_with_backoff(workflow_id, "create_workflow_run", || {
        let repo = repo.clone();
        let trigger_data = trigger_data.clone();
        async move {
            repo.create_workflow_run(agency_id, workflow_id, trigger_data)
                .await
        }
    })
    .await?;

    Ok(run.id)
}

/// Drives a created run to a terminal state: running -> {completed | failed},
/// executing actions strictly in declared order. Per-action delays are
/// relative to run start, not to the previous action. A recoverable effect
/// failure is recorded and execution continues; a misconfigured action or a
/// fatal effect error aborts the remaining actions and fails the run.
pub(crate) async fn drive_run(
    state: &AppState,
    workflow: &Workflow,
    event: &AutomationEvent,
    run_id: Uuid,
) -> Result<(), CoordinatorError> {
    let agency_id = workflow.agency_id;
    let workflow_id = workflow.id;

    let repo = state.workflow_repo.clone();
    retry_with_backoff(workflow_id, "mark_run_running", || {
        let repo = repo.clone();
        async move { repo.mark_run_running(run_id).await }
    })
    .await?;

    let context = RunContext::new(event.client.clone(), trigger_context(event));
    let started = Instant::now();
    let mut results: Vec<ActionResult> = Vec::new();
    let mut fatal_error: Option<String> = None;

    for action in workflow.actions.iter() {
        // Persisted rows normally passed the save-time gate, but legacy or
        // hand-edited configs can still be malformed. Misconfiguration is
        // the one error that halts the whole run.
        let outcome = validate_action_config(action);
        let action_type = match ActionType::from_key(&action.action_type) {
            Some(action_type) if outcome.valid => action_type,
            _ => {
                let message = if outcome.errors.is_empty() {
                    format!("Unknown action type: {}", action.action_type)
                } else {
                    outcome.errors.join("; ")
                };
                warn!(
                    run_id = %run_id,
                    workflow_id = %workflow_id,
                    action_id = %action.id,
                    %message,
                    "Aborting run on misconfigured action"
                );
                results.push(ActionResult::err(&action.id, message.clone()));
                fatal_error = Some(message);
                break;
            }
        };

        if action.delay_minutes > 0 {
            let due = DELAY_MINUTE * action.delay_minutes.clamp(0, 1440) as u32;
            let elapsed = started.elapsed();
            if due > elapsed {
                sleep(due - elapsed).await;
            }
        }

        let config = substitute_config(&action.config, &context);
        debug!(
            run_id = %run_id,
            workflow_id = %workflow_id,
            action_id = %action.id,
            action_type = action_type.key(),
            "Executing workflow action"
        );

        match timeout(
            ACTION_DEADLINE,
            dispatch_action(state, agency_id, action_type, config),
        )
        .await
        {
            Ok(Ok(output)) => {
                results.push(ActionResult::ok(&action.id, output));
            }
            Ok(Err(EffectError::Failed(message))) => {
                warn!(
                    run_id = %run_id,
                    workflow_id = %workflow_id,
                    action_id = %action.id,
                    %message,
                    "Action failed; continuing with remaining actions"
                );
                results.push(ActionResult::err(&action.id, message));
            }
            Ok(Err(EffectError::Fatal(message))) => {
                error!(
                    run_id = %run_id,
                    workflow_id = %workflow_id,
                    action_id = %action.id,
                    %message,
                    "Action raised an unrecoverable error; aborting run"
                );
                results.push(ActionResult::err(&action.id, message.clone()));
                fatal_error = Some(message);
                break;
            }
            Err(_) => {
                let message = format!(
                    "Action timed out after {} seconds",
                    ACTION_DEADLINE.as_secs_f64()
                );
                warn!(
                    run_id = %run_id,
                    workflow_id = %workflow_id,
                    action_id = %action.id,
                    "Action dispatch hit the execution deadline"
                );
                results.push(ActionResult::err(&action.id, message));
            }
        }
    }

    let all_succeeded = fatal_error.is_none() && results.iter().all(|r| r.success);
    let status = if fatal_error.is_some() {
        run_status::FAILED
    } else {
        run_status::COMPLETED
    };
    let completed_at = OffsetDateTime::now_utc();
    let results_json = serde_json::to_value(&results).unwrap_or_else(|_| Value::Array(vec![]));

    let repo = state.workflow_repo.clone();
    let error_message = fatal_error.clone();
    retry_with_backoff(workflow_id, "complete_workflow_run", move || {
        let repo = repo.clone();
        let results_json = results_json.clone();
        let error_message = error_message.clone();
        async move {
            repo.complete_workflow_run(run_id, status, results_json, error_message, completed_at)
                .await
        }
    })
    .await?;

    let repo = state.workflow_repo.clone();
    retry_with_backoff(workflow_id, "record_run_outcome", move || {
        let repo = repo.clone();
        async move {
            repo.record_run_outcome(workflow_id, all_succeeded, completed_at)
                .await
        }
    })
    .await?;

    info!(
        run_id = %run_id,
        workflow_id = %workflow_id,
        status,
        actions = results.len(),
        succeeded = all_succeeded,
        "Workflow run finished"
    );

    Ok(())
}

/// The `trigger` namespace for variable substitution: the typed event fields
/// plus any custom fields the producer attached.
fn trigger_context(event: &AutomationEvent) -> Value {
    let mut map = match serde_json::to_value(&event.event) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for (key, value) in &event.data {
        map.insert(key.clone(), value.clone());
    }
    Value::Object(map)
}

async fn dispatch_action(
    state: &AppState,
    agency_id: Uuid,
    action_type: ActionType,
    config: Value,
) -> Result<Value, EffectError> {
    match action_type {
        ActionType::CreateTask => state.effects.create_task(agency_id, config).await,
        ActionType::SendNotification => state.effects.send_notification(agency_id, config).await,
        ActionType::DraftCommunication => {
            state.effects.draft_communication(agency_id, config).await
        }
        ActionType::CreateTicket => state.effects.create_ticket(agency_id, config).await,
        ActionType::UpdateClient => state.effects.update_client(agency_id, config).await,
        ActionType::CreateAlert => state.effects.create_alert(agency_id, config).await,
    }
}

async fn retry_with_backoff<T, Fut, F>(
    workflow_id: Uuid,
    operation: &'static str,
    mut op: F,
) -> Result<T, CoordinatorError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 0usize;
    let mut backoff = PERSISTENCE_INITIAL_BACKOFF;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < PERSISTENCE_MAX_ATTEMPTS => {
                warn!(
                    %workflow_id,
                    operation,
                    attempt,
                    ?err,
                    "coordinator persistence operation failed; retrying"
                );
                sleep(backoff).await;
                backoff = backoff.saturating_mul(2);
            }
            Err(err) => {
                error!(
                    %workflow_id,
                    operation,
                    attempt,
                    ?err,
                    "coordinator persistence operation exhausted retries"
                );
                return Err(CoordinatorError::Persistence {
                    workflow_id,
                    operation,
                    attempts: attempt,
                    source: err,
                });
            }
        }
    }
}
