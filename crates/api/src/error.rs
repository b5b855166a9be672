use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mpc_broker::BrokerError;
use mpc_core::error::CoreError;
use mpc_store::StoreError;
use serde_json::json;

use crate::catalog::CatalogError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and the infrastructure errors of the
/// catalog, artifact store and broker. Implements [`IntoResponse`] to produce
/// consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `mpc_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),

    #[error("Broker error: {0}")]
    Broker(#[from] BrokerError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
                CoreError::Validation(msg) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
                }
                CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                CoreError::Internal(msg) => internal(msg),
            },

            // --- Infrastructure ---
            AppError::Catalog(CatalogError::Duplicate(id)) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("Controller {id} already exists"),
            ),
            AppError::Catalog(CatalogError::Database(err)) => classify_sqlx_error(err),
            AppError::Store(StoreError::NotFound { key }) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("Artifact {key} not found"),
            ),
            AppError::Store(err) => unavailable("artifact store", err),
            AppError::Broker(err) => unavailable("broker", err),

            // --- HTTP-specific errors ---
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal(msg: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %msg, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

fn unavailable(
    dependency: &'static str,
    err: &dyn std::error::Error,
) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %err, dependency, "Dependency unavailable");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        format!("The {dependency} is unavailable"),
    )
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        // PostgreSQL unique constraint violation: error code 23505
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!(
                "Duplicate value violates unique constraint: {}",
                db_err.constraint().unwrap_or("unknown")
            ),
        ),
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
