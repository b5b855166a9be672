//! In-memory index of the controllers the coordinator schedules for.
//!
//! The registry is a shared service handed around by `Arc`. Changes made via
//! [`Registry::put`] and [`Registry::remove`] are visible to the next
//! enumeration immediately.

use std::collections::BTreeMap;

use futures::stream::{self, StreamExt};
use mpc_core::artifact::{validate_entity_id, StoreMode};
use mpc_core::entity::{Entity, EntityConfig};
use mpc_core::error::CoreError;
use mpc_core::kind::{EntityKind, KindFilter};
use mpc_core::types::EntityId;
use mpc_db::models::controller::ControllerRow;
use mpc_store::{ArtifactStore, SlotWrites, StoreError};
use tokio::sync::RwLock;

use crate::catalog::{CatalogError, EntityCatalog};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub kind: EntityKind,
    pub project_id: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

#[derive(Debug, thiserror::Error)]
enum MaterializeError {
    #[error(transparent)]
    Invalid(#[from] CoreError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Default)]
pub struct Registry {
    entries: RwLock<BTreeMap<EntityId, RegistryEntry>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, id: impl Into<EntityId>, entry: RegistryEntry) {
        self.entries.write().await.insert(id.into(), entry);
    }

    pub async fn remove(&self, id: &str) -> Option<RegistryEntry> {
        self.entries.write().await.remove(id)
    }

    pub async fn get(&self, id: &str) -> Option<RegistryEntry> {
        self.entries.read().await.get(id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Entities whose kind passes `filter`, in id order.
    pub async fn matching(&self, filter: KindFilter) -> Vec<(EntityId, EntityKind)> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|(_, entry)| filter.matches(entry.kind))
            .map(|(id, entry)| (id.clone(), entry.kind))
            .collect()
    }

    /// Entity ids grouped by project.
    pub async fn project_mappings(&self) -> BTreeMap<String, Vec<EntityId>> {
        let mut mappings: BTreeMap<String, Vec<EntityId>> = BTreeMap::new();
        for (id, entry) in self.entries.read().await.iter() {
            mappings
                .entry(entry.project_id.clone())
                .or_default()
                .push(id.clone());
        }
        mappings
    }

    /// Populate the registry from the catalog. Each row is materialised in
    /// the artifact store (configuration refreshed, model and status only
    /// created when missing); rows that fail are logged and skipped.
    pub async fn load_all(
        &self,
        catalog: &dyn EntityCatalog,
        store: &ArtifactStore,
        concurrency: usize,
    ) -> Result<LoadReport, CatalogError> {
        let rows = catalog.list_rows().await?;
        tracing::info!(rows = rows.len(), concurrency, "Loading controllers");

        let results: Vec<_> = stream::iter(rows)
            .map(|row| async move {
                let id = row.id.clone();
                (id, materialize(store, row).await)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut report = LoadReport::default();
        for (id, result) in results {
            match result {
                Ok(entry) => {
                    self.put(id, entry).await;
                    report.loaded += 1;
                }
                Err(e) => {
                    tracing::error!(entity_id = %id, error = %e, "Skipping controller");
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(loaded = report.loaded, skipped = report.skipped, "Controllers loaded");
        Ok(report)
    }
}

/// Validate a catalog row and turn it into a configuration slot.
pub fn config_from_row(row: ControllerRow) -> Result<EntityConfig, CoreError> {
    validate_entity_id(&row.id)?;
    let kind: EntityKind = row.kind.parse()?;
    if kind.spec().requires_weather_site && row.weather_site_id.is_none() {
        return Err(CoreError::Validation(format!(
            "{kind} controller {} has no weather site",
            row.id
        )));
    }
    Ok(EntityConfig {
        id: row.id,
        kind,
        project_id: row.project_id,
        name: row.name,
        weather_site_id: row.weather_site_id,
        settings: row.settings,
        favorite: row.favorite,
        created_at: row.created_at,
    })
}

async fn materialize(store: &ArtifactStore, row: ControllerRow) -> Result<RegistryEntry, MaterializeError> {
    let config = config_from_row(row)?;
    let entry = RegistryEntry {
        kind: config.kind,
        project_id: config.project_id.clone(),
    };
    let entity = Entity::from_config(config);

    let writes = SlotWrites {
        config: Some(StoreMode::CreateAndUpdate),
        ..SlotWrites::all(StoreMode::CreateOnly)
    };
    store.store_entity(&entity, writes).await?;
    Ok(entry)
}
