use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;
use uuid::Uuid;

/// Failure modes of an action's side effect. `Failed` is recoverable: the
/// coordinator records it and moves on to the next action. `Fatal` aborts the
/// remaining actions and fails the run.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("{0}")]
    Failed(String),
    #[error("{0}")]
    Fatal(String),
}

/// The side-effecting collaborators behind each action type. Task rows,
/// notifications, drafts, tickets, client mutations, and alerts all live in
/// other services; the engine only calls into them. Config values arrive
/// with variables already substituted.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EffectSink: Send + Sync {
    async fn create_task(&self, agency_id: Uuid, config: Value) -> Result<Value, EffectError>;
    async fn send_notification(&self, agency_id: Uuid, config: Value)
        -> Result<Value, EffectError>;
    async fn draft_communication(
        &self,
        agency_id: Uuid,
        config: Value,
    ) -> Result<Value, EffectError>;
    async fn create_ticket(&self, agency_id: Uuid, config: Value) -> Result<Value, EffectError>;
    async fn update_client(&self, agency_id: Uuid, config: Value) -> Result<Value, EffectError>;
    async fn create_alert(&self, agency_id: Uuid, config: Value) -> Result<Value, EffectError>;
}

/// Default sink: forwards each effect to the internal operations service
/// over HTTP. Non-2xx responses and transport errors are recoverable.
pub struct HttpEffectSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpEffectSink {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post(
        &self,
        path: &str,
        agency_id: Uuid,
        config: Value,
    ) -> Result<Value, EffectError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "agency_id": agency_id, "config": config }))
            .send()
            .await
            .map_err(|err| EffectError::Failed(format!("{path} request failed: {err}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EffectError::Failed(format!(
                "{path} request returned {status}"
            )));
        }

        response
            .json::<Value>()
            .await
            .or_else(|_| Ok(json!({ "delivered": true })))
    }
}

#[async_trait]
impl EffectSink for HttpEffectSink {
    async fn create_task(&self, agency_id: Uuid, config: Value) -> Result<Value, EffectError> {
        self.post("tasks", agency_id, config).await
    }

    async fn send_notification(
        &self,
        agency_id: Uuid,
        config: Value,
    ) -> Result<Value, EffectError> {
        self.post("notifications", agency_id, config).await
    }

    async fn draft_communication(
        &self,
        agency_id: Uuid,
        config: Value,
    ) -> Result<Value, EffectError> {
        self.post("communications/drafts", agency_id, config).await
    }

    async fn create_ticket(&self, agency_id: Uuid, config: Value) -> Result<Value, EffectError> {
        self.post("tickets", agency_id, config).await
    }

    async fn update_client(&self, agency_id: Uuid, config: Value) -> Result<Value, EffectError> {
        self.post("clients/updates", agency_id, config).await
    }

    async fn create_alert(&self, agency_id: Uuid, config: Value) -> Result<Value, EffectError> {
        self.post("alerts", agency_id, config).await
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every dispatched effect; individual action types can be
    /// primed to fail or hang.
    #[derive(Default)]
    pub struct RecordingEffectSink {
        pub calls: Mutex<Vec<(String, Value)>>,
        pub fail_recoverable: Mutex<Vec<String>>,
        pub fail_fatal: Mutex<Vec<String>>,
        pub hang: Mutex<Vec<String>>,
    }

    impl RecordingEffectSink {
        pub fn call_kinds(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(kind, _)| kind.clone())
                .collect()
        }

        async fn record(&self, kind: &str, config: Value) -> Result<Value, EffectError> {
            if self.hang.lock().unwrap().iter().any(|k| k == kind) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.calls
                .lock()
                .unwrap()
                .push((kind.to_string(), config.clone()));
            if self.fail_fatal.lock().unwrap().iter().any(|k| k == kind) {
                return Err(EffectError::Fatal(format!("{kind} exploded")));
            }
            if self
                .fail_recoverable
                .lock()
                .unwrap()
                .iter()
                .any(|k| k == kind)
            {
                return Err(EffectError::Failed(format!("{kind} unavailable")));
            }
            Ok(json!({ "kind": kind }))
        }
    }

    #[async_trait]
    impl EffectSink for RecordingEffectSink {
        async fn create_task(&self, _: Uuid, config: Value) -> Result<Value, EffectError> {
            self.record("create_task", config).await
        }

        async fn send_notification(&self, _: Uuid, config: Value) -> Result<Value, EffectError> {
            self.record("send_notification", config).await
        }

        async fn draft_communication(&self, _: Uuid, config: Value) -> Result<Value, EffectError> {
            self.record("draft_communication", config).await
        }

        async fn create_ticket(&self, _: Uuid, config: Value) -> Result<Value, EffectError> {
            self.record("create_ticket", config).await
        }

        async fn update_client(&self, _: Uuid, config: Value) -> Result<Value, EffectError> {
            self.record("update_client", config).await
        }

        async fn create_alert(&self, _: Uuid, config: Value) -> Result<Value, EffectError> {
            self.record("create_alert", config).await
        }
    }
}
