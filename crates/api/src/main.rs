use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mpc_api::catalog::{EntityCatalog, MemoryCatalog, PgCatalog};
use mpc_api::config::{CoordinatorConfig, ServerConfig};
use mpc_api::dispatch::Dispatcher;
use mpc_api::ledger::Ledger;
use mpc_api::registry::Registry;
use mpc_api::signals::Signals;
use mpc_api::{metrics, routes, schedule, state};
use mpc_broker::{AmqpBroker, Broker, BrokerConfig};
use mpc_jobs::admission::AdmissionGate;
use mpc_jobs::executor::LocalExecutor;
use mpc_jobs::launcher::{ChildLauncher, Isolation, ProcessLauncher, TaskLauncher};
use mpc_jobs::memory::SysinfoProbe;
use mpc_jobs::JobContext;

use state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mpc_api=debug,mpc_jobs=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Child mode: run a single job and exit ---
    let argv: Vec<String> = std::env::args().collect();
    if let Some(args) = mpc_jobs::child::child_args(&argv) {
        let code = mpc_jobs::child::run_from_args(args).await;
        std::process::exit(code);
    }

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let coordinator = CoordinatorConfig::from_env();
    let broker_config = BrokerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Metrics (before anything that records them) ---
    let metrics_handle = metrics::init_metrics();

    // --- Catalog ---
    let catalog: Arc<dyn EntityCatalog> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = mpc_db::create_pool(&database_url)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            mpc_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            mpc_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Arc::new(PgCatalog::new(pool))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set, using an empty in-memory catalog");
            Arc::new(MemoryCatalog::new())
        }
    };

    // --- Job context (artifact store + computation client) ---
    let ctx = JobContext::from_env()
        .await
        .expect("Failed to build job context");

    // --- Registry ---
    let registry = Arc::new(Registry::new());
    registry
        .load_all(catalog.as_ref(), &ctx.store, coordinator.registry_load_concurrency)
        .await
        .expect("Failed to read controller catalog");

    // --- Broker ---
    let broker: Arc<dyn Broker> = Arc::new(
        AmqpBroker::connect(broker_config.url.clone())
            .await
            .expect("Failed to connect to broker"),
    );
    tracing::info!("Broker connection established");

    // --- Local executor ---
    let gate = AdmissionGate::new(Arc::new(SysinfoProbe), std::process::id())
        .with_threshold(coordinator.memory_threshold)
        .with_poll_interval(coordinator.admission_poll);
    let thread_launcher: Arc<dyn ChildLauncher> = Arc::new(TaskLauncher::new(ctx.clone()));
    let process_launcher: Arc<dyn ChildLauncher> = match Isolation::from_env() {
        Isolation::Process => Arc::new(
            ProcessLauncher::current_exe().expect("Failed to resolve the current executable"),
        ),
        Isolation::Task => Arc::clone(&thread_launcher),
    };
    let executor = Arc::new(LocalExecutor::new(
        gate,
        thread_launcher,
        coordinator.thread_workers,
        process_launcher,
        coordinator.process_workers,
    ));

    // --- Dispatcher ---
    let ledger = Arc::new(Ledger::new(coordinator.ledger_lease));
    let signals = Arc::new(Signals::new());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&ledger),
        Arc::clone(&broker),
        Arc::clone(&executor),
        Arc::clone(&signals),
        &broker_config,
        coordinator.direct_job_timeout,
    ));

    // Jobs left in the queues by a previous run have no ledger entries.
    dispatcher
        .purge_queues()
        .await
        .expect("Failed to purge job queues");

    // --- Scheduler ---
    let plans = schedule::default_plans(&coordinator.schedule).expect("Invalid schedule configuration");
    let schedule_cancel = CancellationToken::new();
    let schedule_handles = schedule::spawn(plans, Arc::clone(&dispatcher), schedule_cancel.clone());
    tracing::info!(plans = schedule_handles.len(), "Scheduler started");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        catalog,
        registry,
        ledger,
        store: ctx.store.clone(),
        dispatcher,
        signals,
        metrics: metrics_handle,
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        .merge(routes::router())
        // -- Middleware stack (applied bottom-up) --
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(build_cors_layer(&config))
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    schedule_cancel.cancel();
    let grace = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(grace, futures::future::join_all(schedule_handles))
        .await
        .is_err()
    {
        tracing::warn!(grace_secs = grace.as_secs(), "Scheduler did not stop in time");
    }
    tracing::info!("Scheduler stopped");

    executor.shutdown();

    if let Err(e) = broker.close().await {
        tracing::warn!(error = %e, "Failed to close broker connection");
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
