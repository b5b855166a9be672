use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{callback, controllers, health, metrics};
use crate::state::AppState;

/// Build the coordinator's route tree.
///
/// ```text
/// GET    /health                               -> health_check
/// GET    /metrics                              -> render_metrics (Prometheus text)
/// POST   /callback                             -> job_completed (workers)
///
/// POST   /controllers                          -> create_controller
/// GET    /controllers/{id}                     -> get_controller
/// DELETE /controllers/{id}                     -> delete_controller
/// GET    /projects/{project_id}/controllers    -> list_project_controllers
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::render_metrics))
        .route("/callback", post(callback::job_completed))
        .route("/controllers", post(controllers::create_controller))
        .route(
            "/controllers/{id}",
            get(controllers::get_controller).delete(controllers::delete_controller),
        )
        .route(
            "/projects/{project_id}/controllers",
            get(controllers::list_project_controllers),
        )
}
