use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;

use crate::metrics;
use crate::state::AppState;

/// GET /metrics
///
/// Refreshes the gauges, then renders every metric in the Prometheus text
/// format.
pub async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let memory = state.dispatcher.memory_sample().await;
    metrics::observe_memory(std::process::id(), memory.utilization());
    metrics::observe_running_jobs(state.ledger.len());
    metrics::observe_elapsed(
        state.signals.heartbeat_elapsed(),
        state.signals.control_elapsed(),
    );

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
