//! Handlers for registering, inspecting and removing controllers.
//!
//! A controller lives in three places: the catalog row, its artifacts in the
//! object store and the in-memory registry that drives scheduling. Creation
//! writes them in that order; deletion removes artifacts first and the
//! registry entry last.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use mpc_core::artifact::StoreMode;
use mpc_core::entity::{Entity, EntityConfig};
use mpc_core::error::CoreError;
use mpc_core::job::{JobName, JobQueue};
use mpc_core::status::Status;
use mpc_db::models::controller::{ControllerRow, CreateControllerRow};
use mpc_store::SlotWrites;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::registry::{config_from_row, RegistryEntry};
use crate::response::DataResponse;
use crate::state::AppState;

/// Configuration and status of one controller.
#[derive(Debug, Serialize)]
pub struct ControllerView {
    pub config: EntityConfig,
    pub status: Status,
}

#[derive(Debug, Serialize)]
pub struct CreatedController {
    #[serde(flatten)]
    pub view: ControllerView,
    /// Whether the initial training job reached the queue.
    pub training_published: bool,
}

#[derive(Debug, Serialize)]
pub struct ProjectControllers {
    pub project_id: String,
    pub controllers: Vec<String>,
}

fn not_found(id: &str) -> AppError {
    AppError::Core(CoreError::NotFound {
        entity: "Controller",
        id: id.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /controllers
///
/// Validate the kind and its weather-site dependency, then register the
/// controller and queue its first training.
pub async fn create_controller(
    State(state): State<AppState>,
    Json(input): Json<CreateControllerRow>,
) -> AppResult<impl IntoResponse> {
    // Validate before anything is written.
    config_from_row(ControllerRow {
        id: input.id.clone(),
        kind: input.kind.clone(),
        project_id: input.project_id.clone(),
        name: input.name.clone(),
        weather_site_id: input.weather_site_id.clone(),
        settings: input.settings.clone(),
        favorite: input.favorite,
        created_at: chrono::Utc::now(),
    })?;

    let row = state.catalog.insert_row(&input).await?;
    let config = config_from_row(row)?;
    let entity = Entity::from_config(config);

    if let Err(e) = state
        .store
        .store_entity(&entity, SlotWrites::all(StoreMode::CreateAndUpdate))
        .await
    {
        if let Err(rollback) = state.catalog.delete_row(entity.id()).await {
            tracing::error!(entity_id = %entity.id(), error = %rollback, "Failed to roll back catalog row");
        }
        return Err(e.into());
    }

    state
        .registry
        .put(
            entity.id(),
            RegistryEntry {
                kind: entity.kind(),
                project_id: entity.config.project_id.clone(),
            },
        )
        .await;

    let training_published = match state
        .dispatcher
        .publish_one(JobName::TrainModel, entity.id(), entity.kind(), JobQueue::Training)
        .await
    {
        Ok(published) => published,
        Err(e) => {
            tracing::error!(entity_id = %entity.id(), error = %e, "Failed to queue initial training");
            false
        }
    };

    tracing::info!(entity_id = %entity.id(), kind = %entity.kind(), "Controller created");

    let Entity { config, status, .. } = entity;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: CreatedController {
                view: ControllerView { config, status },
                training_published,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Read
// ---------------------------------------------------------------------------

/// GET /controllers/{id}
pub async fn get_controller(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    if state.registry.get(&id).await.is_none() {
        return Err(not_found(&id));
    }

    let config = state.store.load_config(&id).await?;
    let status = state.store.load_status(&id).await?;

    Ok(Json(DataResponse {
        data: ControllerView { config, status },
    }))
}

/// GET /projects/{project_id}/controllers
pub async fn list_project_controllers(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let controllers = state
        .registry
        .project_mappings()
        .await
        .remove(&project_id)
        .unwrap_or_default();

    Ok(Json(DataResponse {
        data: ProjectControllers {
            project_id,
            controllers,
        },
    }))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /controllers/{id}
///
/// Removes the artifacts (including the kind's ancillary folder), then the
/// catalog row, then the registry entry.
pub async fn delete_controller(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let entry = state.registry.get(&id).await.ok_or_else(|| not_found(&id))?;

    let deleted_keys = state.store.delete_entity(&id, entry.kind).await?;
    if !state.catalog.delete_row(&id).await? {
        tracing::warn!(entity_id = %id, "Controller had no catalog row");
    }
    state.registry.remove(&id).await;

    tracing::info!(entity_id = %id, deleted_keys, "Controller deleted");

    Ok(StatusCode::NO_CONTENT)
}
