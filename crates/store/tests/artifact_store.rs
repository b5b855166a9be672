//! Integration tests for `ArtifactStore` over the in-memory backend.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::Utc;
use mpc_core::artifact::{ArtifactSlot, KeyLayout, StoreMode};
use mpc_core::entity::{Entity, EntityConfig};
use mpc_core::kind::EntityKind;
use mpc_core::status::{ErrorLevel, Readiness};
use mpc_store::{ArtifactStore, LoadOptions, MemoryObjectStore, ObjectStore, SlotWrites, StoreError, StoreOutcome};

fn setup() -> (Arc<MemoryObjectStore>, ArtifactStore) {
    let backend = Arc::new(MemoryObjectStore::new());
    let store = ArtifactStore::new(backend.clone(), KeyLayout::default());
    (backend, store)
}

fn entity(id: &str, kind: EntityKind) -> Entity {
    Entity::from_config(EntityConfig {
        id: id.to_string(),
        kind,
        project_id: "p1".into(),
        name: format!("controller {id}"),
        weather_site_id: Some("w1".into()),
        settings: serde_json::json!({ "horizon": 24 }),
        favorite: false,
        created_at: Utc::now(),
    })
}

// ---------------------------------------------------------------------------
// Test: store modes
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_only_keeps_first_value() {
    let (_, store) = setup();

    let first = store.store("k", &1u32, StoreMode::CreateOnly).await.unwrap();
    let second = store.store("k", &2u32, StoreMode::CreateOnly).await.unwrap();

    assert_eq!(first, StoreOutcome::Written);
    assert_eq!(second, StoreOutcome::Skipped);
    assert_eq!(store.load::<u32>("k").await.unwrap(), 1);
}

#[tokio::test]
async fn update_only_on_missing_key_is_a_noop() {
    let (_, store) = setup();

    let outcome = store.store("k", &1u32, StoreMode::UpdateOnly).await.unwrap();

    assert_eq!(outcome, StoreOutcome::Skipped);
    assert_matches!(store.load::<u32>("k").await, Err(StoreError::NotFound { .. }));
}

#[tokio::test]
async fn create_and_update_overwrites() {
    let (_, store) = setup();

    store.store("k", &1u32, StoreMode::CreateAndUpdate).await.unwrap();
    store.store("k", &2u32, StoreMode::CreateAndUpdate).await.unwrap();

    assert_eq!(store.load::<u32>("k").await.unwrap(), 2);
}

#[tokio::test]
async fn store_creates_bucket_on_demand() {
    let (backend, store) = setup();
    assert!(!backend.bucket_ready());

    store.store("k", &1u32, StoreMode::CreateOnly).await.unwrap();

    assert!(backend.bucket_ready());
}

// ---------------------------------------------------------------------------
// Test: entity round-trip
// ---------------------------------------------------------------------------

#[tokio::test]
async fn entity_round_trips_through_all_slots() {
    let (_, store) = setup();
    let mut original = entity("7", EntityKind::ConsumptionService);
    original.status.common.ready = Readiness::Producing;
    original.status.common.error = ErrorLevel::None;
    original.status.specific = serde_json::json!({ "last_forecast": [1.0, 2.5] });
    original.model.version = 3;

    store
        .store_entity(&original, SlotWrites::all(StoreMode::CreateAndUpdate))
        .await
        .unwrap();
    let loaded = store.load_entity("7", LoadOptions::FULL).await.unwrap();

    assert_eq!(loaded, original);
}

#[tokio::test]
async fn unselected_slots_are_not_written() {
    let (backend, store) = setup();
    let e = entity("8", EntityKind::Ems);

    store
        .store_entity(
            &e,
            SlotWrites::none().with(ArtifactSlot::Config, StoreMode::CreateAndUpdate),
        )
        .await
        .unwrap();

    assert_eq!(backend.len().await, 1);
    assert_matches!(store.load_model("8").await, Err(StoreError::NotFound { .. }));
}

#[tokio::test]
async fn load_without_model_uses_default() {
    let (_, store) = setup();
    let mut e = entity("9", EntityKind::Ems);
    e.model.version = 5;
    store
        .store_entity(&e, SlotWrites::all(StoreMode::CreateAndUpdate))
        .await
        .unwrap();

    let loaded = store.load_entity("9", LoadOptions::WITHOUT_MODEL).await.unwrap();

    assert_eq!(loaded.model.version, 0);
    assert_eq!(loaded.status, e.status);
}

// ---------------------------------------------------------------------------
// Test: deletion completeness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_entity_removes_slots_and_ancillary_keys() {
    let (backend, store) = setup();
    let e = entity("11", EntityKind::SetpointOptimizer);
    store
        .store_entity(&e, SlotWrites::all(StoreMode::CreateAndUpdate))
        .await
        .unwrap();
    let prefix = store
        .layout()
        .ancillary_prefix("11", EntityKind::SetpointOptimizer)
        .unwrap();
    for name in ["study", "best_params", "trials/0"] {
        backend.put(&format!("{prefix}{name}"), b"{}".to_vec()).await.unwrap();
    }
    // A neighbouring entity must survive.
    let other = entity("110", EntityKind::SetpointOptimizer);
    store
        .store_entity(&other, SlotWrites::all(StoreMode::CreateAndUpdate))
        .await
        .unwrap();

    let deleted = store
        .delete_entity("11", EntityKind::SetpointOptimizer)
        .await
        .unwrap();

    assert_eq!(deleted, 7);
    assert!(store
        .list_keys(&store.layout().entity_prefix("11"))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        store
            .list_keys(&store.layout().entity_prefix("110"))
            .await
            .unwrap()
            .len(),
        4
    );
}

// ---------------------------------------------------------------------------
// Test: outage surfaces as Unavailable
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backend_outage_surfaces_as_unavailable() {
    let (backend, store) = setup();
    backend.set_available(false);

    assert_matches!(
        store.store("k", &1u32, StoreMode::CreateAndUpdate).await,
        Err(StoreError::Unavailable(_))
    );
    assert_matches!(store.load_config("1").await, Err(StoreError::Unavailable(_)));
}
