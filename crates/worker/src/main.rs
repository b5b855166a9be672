use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mpc_broker::{AmqpBroker, Broker};
use mpc_jobs::launcher::{ChildLauncher, Isolation, ProcessLauncher, TaskLauncher};
use mpc_jobs::JobContext;
use mpc_worker::{HttpNotifier, Worker, WorkerConfig};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mpc_worker=debug,mpc_jobs=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Child mode: run a single job and exit ---
    let argv: Vec<String> = std::env::args().collect();
    if let Some(args) = mpc_jobs::child::child_args(&argv) {
        let code = mpc_jobs::child::run_from_args(args).await;
        std::process::exit(code);
    }

    let config = WorkerConfig::from_env();
    tracing::info!(queue = %config.queue, coordinator = %config.coordinator_url, "Loaded worker configuration");

    let launcher: Arc<dyn ChildLauncher> = match Isolation::from_env() {
        Isolation::Process => Arc::new(
            ProcessLauncher::current_exe().expect("Failed to resolve the worker executable"),
        ),
        Isolation::Task => {
            let ctx = JobContext::from_env()
                .await
                .expect("Failed to build job context");
            Arc::new(TaskLauncher::new(ctx))
        }
    };

    let notifier = HttpNotifier::new(&config.coordinator_url, config.callback_timeout)
        .expect("Failed to build callback client");

    let broker = Arc::new(
        AmqpBroker::connect(config.amqp_url.clone())
            .await
            .expect("Failed to connect to the message broker"),
    );
    tracing::info!("Started worker");

    let worker = Worker::new(
        broker.clone(),
        config.queue.clone(),
        launcher,
        Arc::new(notifier),
        config.job_timeout,
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
    });

    match worker.run(cancel).await {
        Ok(handled) => tracing::info!(handled, "Worker stopped"),
        Err(e) => tracing::error!(error = %e, "Worker stopped on a broker error"),
    }

    if let Err(e) = broker.close().await {
        tracing::warn!(error = %e, "Failed to close broker connection");
    }
    tracing::info!("Worker shut down");
}

/// Wait for a shutdown signal. A job in flight finishes before the worker
/// exits.
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
            tracing::info!("Received SIGINT (Ctrl-C), waiting for the current job");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, waiting for the current job");
        }
    }
}
