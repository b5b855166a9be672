//! Integration tests for the controller endpoints.

mod common;

use assert_matches::assert_matches;
use axum::http::StatusCode;
use common::{body_json, build_test_app, delete, get, post_json, row, TestApp, TRAINING_QUEUE};
use mpc_api::registry::RegistryEntry;
use mpc_core::artifact::StoreMode;
use mpc_core::kind::EntityKind;
use mpc_store::{LoadOptions, ObjectStore, SlotWrites};
use serde_json::json;

async fn loaded_app(rows: Vec<mpc_db::models::controller::ControllerRow>) -> TestApp {
    let app = build_test_app(rows, None);
    app.state
        .registry
        .load_all(app.catalog.as_ref(), &app.state.store, 4)
        .await
        .unwrap();
    app
}

fn new_controller(id: &str, kind: &str) -> serde_json::Value {
    json!({
        "id": id,
        "kind": kind,
        "project_id": "project-7",
        "name": "Plant room",
        "weather_site_id": "site-3",
        "settings": { "max_power_kw": 12.5 },
    })
}

// ---------------------------------------------------------------------------
// Test: POST /controllers
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_controller_registers_and_queues_training() {
    let app = build_test_app(vec![], None);

    let response = post_json(app.router(), "/controllers", new_controller("100", "ems")).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["config"]["kind"], "ems");
    assert_eq!(json["data"]["status"]["common"]["ready"], 0);
    assert_eq!(json["data"]["status"]["common"]["training"], true);
    assert_eq!(json["data"]["training_published"], true);

    assert!(app.catalog.contains("100").await);
    assert_matches!(
        app.state.registry.get("100").await,
        Some(RegistryEntry { kind: EntityKind::Ems, .. })
    );
    let stored = app.state.store.load_entity("100", LoadOptions::FULL).await.unwrap();
    assert_eq!(stored.config.settings["max_power_kw"], 12.5);

    let queued = app.broker.peek(TRAINING_QUEUE).await;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].job_id, "train_model:100");
    assert!(app.state.ledger.contains("train_model:100"));
}

#[tokio::test]
async fn create_rejects_unknown_kind() {
    let app = build_test_app(vec![], None);

    let response = post_json(app.router(), "/controllers", new_controller("101", "heat_pump")).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
    assert!(!app.catalog.contains("101").await);
    assert!(app.backend.is_empty().await);
}

#[tokio::test]
async fn create_rejects_missing_weather_site() {
    let app = build_test_app(vec![], None);
    let mut body = new_controller("102", "pv_production_service");
    body.as_object_mut().unwrap().remove("weather_site_id");

    let response = post_json(app.router(), "/controllers", body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(app.state.registry.get("102").await.is_none());
}

#[tokio::test]
async fn create_rejects_ids_with_key_separators() {
    let app = build_test_app(vec![], None);

    for id in ["7/setpoint_optimizer", "7:1", "..", " "] {
        let response = post_json(app.router(), "/controllers", new_controller(id, "ems")).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{id:?}");
        assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
        assert!(!app.catalog.contains(id).await);
    }
    assert!(app.backend.is_empty().await);
    assert!(app.broker.peek(TRAINING_QUEUE).await.is_empty());
}

#[tokio::test]
async fn nested_id_cannot_reach_into_another_controller() {
    let app = loaded_app(vec![row("7", "setpoint_optimizer")]).await;

    let response = post_json(
        app.router(),
        "/controllers",
        new_controller("7/setpoint_optimizer", "ems"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let config = app.state.store.load_config("7").await.unwrap();
    assert_eq!(config.kind, EntityKind::SetpointOptimizer);
    assert_eq!(app.state.registry.len().await, 1);
}

#[tokio::test]
async fn create_accepts_anomaly_detection_without_weather_site() {
    let app = build_test_app(vec![], None);
    let mut body = new_controller("103", "stream_anomaly_detection");
    body.as_object_mut().unwrap().remove("weather_site_id");

    let response = post_json(app.router(), "/controllers", body).await;

    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn duplicate_create_conflicts_and_keeps_existing_artifacts() {
    let app = loaded_app(vec![row("104", "ems")]).await;
    let mut entity = app.state.store.load_entity("104", LoadOptions::FULL).await.unwrap();
    entity.model.version = 3;
    app.state
        .store
        .store_entity(&entity, SlotWrites::none().with(mpc_core::artifact::ArtifactSlot::Model, StoreMode::UpdateOnly))
        .await
        .unwrap();

    let response = post_json(app.router(), "/controllers", new_controller("104", "ems")).await;

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(app.state.store.load_model("104").await.unwrap().version, 3);
}

// ---------------------------------------------------------------------------
// Test: GET /controllers/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_controller_returns_config_and_status() {
    let app = loaded_app(vec![row("200", "load_monitor")]).await;

    let response = get(app.router(), "/controllers/200").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["config"]["id"], "200");
    assert_eq!(json["data"]["status"]["common"]["status"], "training");
    assert_eq!(json["data"]["status"]["specific"], json!({}));
}

#[tokio::test]
async fn get_unknown_controller_returns_404() {
    let app = build_test_app(vec![], None);

    let response = get(app.router(), "/controllers/nope").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn project_listing_groups_registered_controllers() {
    let mut other = row("302", "ems");
    other.project_id = "project-2".into();
    let app = loaded_app(vec![row("300", "ems"), row("301", "load_monitor"), other]).await;

    let response = get(app.router(), "/projects/project-1/controllers").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["controllers"], json!(["300", "301"]));
}

// ---------------------------------------------------------------------------
// Test: DELETE /controllers/{id}
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_removes_artifacts_catalog_row_and_registry_entry() {
    let app = loaded_app(vec![row("400", "setpoint_optimizer"), row("4000", "ems")]).await;
    let ancillary = format!(
        "{}curve.json",
        app.state
            .store
            .layout()
            .ancillary_prefix("400", EntityKind::SetpointOptimizer)
            .unwrap()
    );
    app.backend.put(&ancillary, b"{}".to_vec()).await.unwrap();

    let response = delete(app.router(), "/controllers/400").await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(app.state.registry.get("400").await.is_none());
    assert!(!app.catalog.contains("400").await);
    assert!(!app.backend.exists(&ancillary).await.unwrap());
    assert!(app.state.store.load_config("400").await.is_err());
    // Neighbouring ids sharing a prefix are untouched.
    assert!(app.state.store.load_config("4000").await.is_ok());
}

#[tokio::test]
async fn delete_unknown_controller_returns_404() {
    let app = build_test_app(vec![], None);

    let response = delete(app.router(), "/controllers/nope").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleted_controller_is_not_scheduled() {
    let app = loaded_app(vec![row("500", "load_monitor")]).await;

    delete(app.router(), "/controllers/500").await;
    let report = app
        .dispatcher()
        .publish(
            mpc_core::job::JobName::Predict,
            mpc_core::kind::KindFilter::All,
            mpc_core::job::JobQueue::Task,
        )
        .await;

    assert_eq!(report.published, 0);
}
