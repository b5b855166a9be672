#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use mpc_api::catalog::MemoryCatalog;
use mpc_api::config::ServerConfig;
use mpc_api::dispatch::Dispatcher;
use mpc_api::ledger::Ledger;
use mpc_api::registry::Registry;
use mpc_api::signals::Signals;
use mpc_api::state::AppState;
use mpc_api::{metrics, routes};
use mpc_broker::{BrokerConfig, MemoryBroker};
use mpc_core::artifact::KeyLayout;
use mpc_core::entity::Entity;
use mpc_db::models::controller::ControllerRow;
use mpc_jobs::admission::AdmissionGate;
use mpc_jobs::computation::{Computation, ComputationError, PredictOutput, TrainOutput};
use mpc_jobs::executor::LocalExecutor;
use mpc_jobs::launcher::{ChildLauncher, TaskLauncher};
use mpc_jobs::memory::{MemoryInfo, MemoryProbe};
use mpc_jobs::JobContext;
use mpc_store::{ArtifactStore, MemoryObjectStore};

pub const TASK_QUEUE: &str = "task_queue";
pub const TRAINING_QUEUE: &str = "training_task_queue";

/// Reports a fixed, low memory utilisation.
pub struct QuietProbe;

impl MemoryProbe for QuietProbe {
    fn sample(&self, root_pid: u32) -> MemoryInfo {
        MemoryInfo {
            total_bytes: 1_000,
            processes: vec![(root_pid, 100)],
        }
    }
}

/// Computation double that succeeds and records what it was asked to do.
#[derive(Default)]
pub struct RecordingComputation {
    pub beats: Mutex<Vec<(String, bool)>>,
    pub controlled: Mutex<Vec<String>>,
}

#[async_trait]
impl Computation for RecordingComputation {
    async fn train(&self, _entity: &Entity, _retrain: bool) -> Result<TrainOutput, ComputationError> {
        Ok(TrainOutput {
            parameters: serde_json::json!({ "weights": [1.0] }),
            specific: None,
        })
    }

    async fn predict(&self, _entity: &Entity) -> Result<PredictOutput, ComputationError> {
        Ok(PredictOutput::default())
    }

    async fn heartbeat(&self, entity: &Entity, beat: bool) -> Result<(), ComputationError> {
        self.beats.lock().unwrap().push((entity.id().to_string(), beat));
        Ok(())
    }

    async fn control(&self, entity: &Entity) -> Result<(), ComputationError> {
        self.controlled.lock().unwrap().push(entity.id().to_string());
        Ok(())
    }
}

/// Everything a test needs to drive the coordinator without live services.
pub struct TestApp {
    pub state: AppState,
    pub catalog: Arc<MemoryCatalog>,
    pub backend: Arc<MemoryObjectStore>,
    pub broker: MemoryBroker,
    pub computation: Arc<RecordingComputation>,
    pub executor: Arc<LocalExecutor>,
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.state.dispatcher
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

pub fn broker_config() -> BrokerConfig {
    BrokerConfig {
        url: "amqp://unused".to_string(),
        task_queue: TASK_QUEUE.to_string(),
        training_queue: TRAINING_QUEUE.to_string(),
    }
}

/// Wire up a coordinator over in-memory catalog, store and broker.
pub fn build_test_app(rows: Vec<ControllerRow>, lease: Option<Duration>) -> TestApp {
    let catalog = Arc::new(MemoryCatalog::with_rows(rows));
    let backend = Arc::new(MemoryObjectStore::new());
    let store = ArtifactStore::new(backend.clone(), KeyLayout::default());
    let broker = MemoryBroker::new();
    let computation = Arc::new(RecordingComputation::default());
    let ctx = JobContext::new(store.clone(), computation.clone());

    let gate = AdmissionGate::new(Arc::new(QuietProbe), std::process::id());
    let launcher: Arc<dyn ChildLauncher> = Arc::new(TaskLauncher::new(ctx));
    let executor = Arc::new(LocalExecutor::new(gate, launcher.clone(), 4, launcher, 2));

    let registry = Arc::new(Registry::new());
    let ledger = Arc::new(Ledger::new(lease));
    let signals = Arc::new(Signals::new());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&ledger),
        Arc::new(broker.clone()),
        Arc::clone(&executor),
        Arc::clone(&signals),
        &broker_config(),
        Duration::from_secs(5),
    ));

    let state = AppState {
        config: Arc::new(test_config()),
        catalog: catalog.clone(),
        registry,
        ledger,
        store,
        dispatcher,
        signals,
        metrics: metrics::init_metrics(),
    };

    TestApp {
        state,
        catalog,
        backend,
        broker,
        computation,
        executor,
    }
}

/// Build the application router with the production middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .merge(routes::router())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state)
}

/// A catalog row with sensible defaults.
pub fn row(id: &str, kind: &str) -> ControllerRow {
    ControllerRow {
        id: id.to_string(),
        kind: kind.to_string(),
        project_id: "project-1".to_string(),
        name: format!("controller {id}"),
        weather_site_id: Some("site-1".to_string()),
        settings: serde_json::json!({}),
        favorite: false,
        created_at: chrono::Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn delete(app: Router, uri: &str) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

pub async fn body_bytes(response: Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
