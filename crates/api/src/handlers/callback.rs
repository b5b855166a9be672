//! Completion callbacks from workers.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use mpc_core::job::parse_job_id;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CallbackRequest {
    pub job_id: String,
}

/// POST /callback
///
/// Clears the job's ledger entry and records how long it ran. An id the
/// ledger does not hold is a bad request.
pub async fn job_completed(
    State(state): State<AppState>,
    payload: Result<Json<CallbackRequest>, JsonRejection>,
) -> AppResult<StatusCode> {
    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let elapsed = state
        .ledger
        .complete(&input.job_id)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown job id: {}", input.job_id)))?;

    if let Some((job_name, entity_id)) = parse_job_id(&input.job_id) {
        metrics::record_job_duration(job_name, entity_id, elapsed);
    }
    tracing::info!(
        job_id = %input.job_id,
        elapsed_secs = elapsed.as_secs_f64(),
        "Job completed",
    );

    Ok(StatusCode::OK)
}
