use std::sync::Arc;

use reqwest::Client;

use crate::config::Config;
use crate::db::workflow_repository::WorkflowRepository;
use crate::engine::effects::EffectSink;

#[derive(Clone)]
pub struct AppState {
    pub workflow_repo: Arc<dyn WorkflowRepository>,
    pub effects: Arc<dyn EffectSink>,
    pub http_client: Arc<Client>,
    pub config: Arc<Config>,
}
