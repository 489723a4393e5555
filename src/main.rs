use std::{net::SocketAddr, sync::Arc};

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::{
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Router,
};
use reqwest::Client;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use agencyflow_backend::config::Config;
use agencyflow_backend::db::postgres_workflow_repository::PostgresWorkflowRepository;
use agencyflow_backend::db::workflow_repository::WorkflowRepository;
use agencyflow_backend::engine::effects::{EffectSink, HttpEffectSink};
use agencyflow_backend::responses::JsonResponse;
use agencyflow_backend::routes::{
    events::ingest_event,
    registry::{list_action_types, list_trigger_types},
    workflows::{
        create_workflow, delete_workflow, get_run, get_workflow, list_runs, list_runs_for_workflow,
        list_workflows, toggle_workflow, update_workflow,
    },
};
use agencyflow_backend::AppState;

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(20);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    // Cleanup of stale per-IP limiter state.
    let governor_limiter = governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let config = Config::from_env();

    let pg_pool = establish_connection(&config.database_url).await;
    let workflow_repo = Arc::new(PostgresWorkflowRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn WorkflowRepository>;

    let http_client = Client::new();
    let effects = Arc::new(HttpEffectSink::new(
        http_client.clone(),
        config.effects_base_url.clone(),
    )) as Arc<dyn EffectSink>;

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let state = AppState {
        workflow_repo,
        effects,
        http_client: Arc::new(http_client),
        config: Arc::new(config),
    };

    let workflow_routes = Router::new()
        .route("/", post(create_workflow).get(list_workflows))
        .route(
            "/{workflow_id}",
            get(get_workflow)
                .patch(update_workflow)
                .delete(delete_workflow),
        )
        .route("/{workflow_id}/toggle", patch(toggle_workflow))
        .route("/{workflow_id}/runs", get(list_runs_for_workflow));

    let run_routes = Router::new()
        .route("/", get(list_runs))
        .route("/{run_id}", get(get_run));

    let registry_routes = Router::new()
        .route("/actions", get(list_action_types))
        .route("/triggers", get(list_trigger_types));

    let app = Router::new()
        .route("/", get(root))
        .nest("/api/workflows", workflow_routes)
        .nest("/api/runs", run_routes)
        .nest("/api/registry", registry_routes)
        .route("/api/events", post(ingest_event))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: governor_conf,
        })
        .layer(cors);

    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));
    let listener = TcpListener::bind(addr).await.unwrap();
    info!("Listening on http://{}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}

async fn root() -> Response {
    JsonResponse::success("AgencyFlow automation API").into_response()
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> PgPool {
    let pool = PgPool::connect(database_url)
        .await
        .expect("Failed to connect to the database");

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .expect("Failed to verify database connection");

    info!("Successfully connected to the database");
    pool
}
