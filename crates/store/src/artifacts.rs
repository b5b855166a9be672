//! Typed artifact slots on top of an [`ObjectStore`].

use std::sync::Arc;

use mpc_core::artifact::{ArtifactSlot, KeyLayout, StoreMode};
use mpc_core::entity::{Entity, EntityConfig, ModelArtifact};
use mpc_core::kind::EntityKind;
use mpc_core::status::{CommonStatus, Status};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::backend::ObjectStore;
use crate::error::StoreError;

/// Result of a single store call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Written,
    /// The store mode did not permit the write; nothing changed.
    Skipped,
}

/// Which optional slots to read when loading an entity. Slots not read are
/// filled from the kind's defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadOptions {
    pub model: bool,
    pub status: bool,
}

impl LoadOptions {
    pub const FULL: LoadOptions = LoadOptions {
        model: true,
        status: true,
    };

    pub const WITHOUT_MODEL: LoadOptions = LoadOptions {
        model: false,
        status: true,
    };
}

/// Per-slot write selection. A slot without a mode is not written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlotWrites {
    pub config: Option<StoreMode>,
    pub model: Option<StoreMode>,
    pub common_status: Option<StoreMode>,
    pub specific_status: Option<StoreMode>,
}

impl SlotWrites {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all(mode: StoreMode) -> Self {
        Self {
            config: Some(mode),
            model: Some(mode),
            common_status: Some(mode),
            specific_status: Some(mode),
        }
    }

    pub fn with(mut self, slot: ArtifactSlot, mode: StoreMode) -> Self {
        *self.slot_mut(slot) = Some(mode);
        self
    }

    pub fn mode(&self, slot: ArtifactSlot) -> Option<StoreMode> {
        match slot {
            ArtifactSlot::Config => self.config,
            ArtifactSlot::Model => self.model,
            ArtifactSlot::CommonStatus => self.common_status,
            ArtifactSlot::SpecificStatus => self.specific_status,
        }
    }

    fn slot_mut(&mut self, slot: ArtifactSlot) -> &mut Option<StoreMode> {
        match slot {
            ArtifactSlot::Config => &mut self.config,
            ArtifactSlot::Model => &mut self.model,
            ArtifactSlot::CommonStatus => &mut self.common_status,
            ArtifactSlot::SpecificStatus => &mut self.specific_status,
        }
    }
}

/// Artifact store handle. Cheap to clone.
#[derive(Clone)]
pub struct ArtifactStore {
    backend: Arc<dyn ObjectStore>,
    layout: KeyLayout,
}

impl ArtifactStore {
    pub fn new(backend: Arc<dyn ObjectStore>, layout: KeyLayout) -> Self {
        Self { backend, layout }
    }

    pub fn layout(&self) -> &KeyLayout {
        &self.layout
    }

    // -----------------------------------------------------------------------
    // Key-level operations
    // -----------------------------------------------------------------------

    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<T, StoreError> {
        let bytes = self
            .backend
            .get(key)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Persist `value` under `key` if `mode` allows it given the key's current
    /// existence. The bucket is created on demand.
    pub async fn store<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        mode: StoreMode,
    ) -> Result<StoreOutcome, StoreError> {
        self.backend.ensure_bucket().await?;

        let exists = self.backend.exists(key).await?;
        if !mode.allows(exists) {
            tracing::debug!(key, ?mode, exists, "Store skipped by mode");
            return Ok(StoreOutcome::Skipped);
        }

        let bytes = serde_json::to_vec(value)?;
        self.backend.put(key, bytes).await?;
        Ok(StoreOutcome::Written)
    }

    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.backend.delete(key).await
    }

    pub async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.backend.list(prefix).await
    }

    // -----------------------------------------------------------------------
    // Slot-level operations
    // -----------------------------------------------------------------------

    pub async fn load_config(&self, entity_id: &str) -> Result<EntityConfig, StoreError> {
        self.load(&self.layout.slot_key(entity_id, ArtifactSlot::Config))
            .await
    }

    pub async fn load_model(&self, entity_id: &str) -> Result<ModelArtifact, StoreError> {
        self.load(&self.layout.slot_key(entity_id, ArtifactSlot::Model))
            .await
    }

    pub async fn load_common_status(&self, entity_id: &str) -> Result<CommonStatus, StoreError> {
        self.load(&self.layout.slot_key(entity_id, ArtifactSlot::CommonStatus))
            .await
    }

    /// Load both status halves. A missing specific payload reads as empty.
    pub async fn load_status(&self, entity_id: &str) -> Result<Status, StoreError> {
        let common = self.load_common_status(entity_id).await?;
        let specific = match self
            .load(&self.layout.slot_key(entity_id, ArtifactSlot::SpecificStatus))
            .await
        {
            Ok(value) => value,
            Err(StoreError::NotFound { .. }) => serde_json::Value::Object(Default::default()),
            Err(e) => return Err(e),
        };
        Ok(Status { common, specific })
    }

    // -----------------------------------------------------------------------
    // Entity-level operations
    // -----------------------------------------------------------------------

    pub async fn load_entity(
        &self,
        entity_id: &str,
        options: LoadOptions,
    ) -> Result<Entity, StoreError> {
        let config = self.load_config(entity_id).await?;
        let mut entity = Entity::from_config(config);

        if options.model {
            entity.model = self.load_model(entity_id).await?;
        }
        if options.status {
            entity.status = self.load_status(entity_id).await?;
        }
        Ok(entity)
    }

    /// Write the selected slots of `entity`, each with its own mode.
    pub async fn store_entity(&self, entity: &Entity, writes: SlotWrites) -> Result<(), StoreError> {
        let id = entity.id();
        for slot in ArtifactSlot::ALL {
            let Some(mode) = writes.mode(slot) else {
                continue;
            };
            let key = self.layout.slot_key(id, slot);
            match slot {
                ArtifactSlot::Config => self.store(&key, &entity.config, mode).await?,
                ArtifactSlot::Model => self.store(&key, &entity.model, mode).await?,
                ArtifactSlot::CommonStatus => self.store(&key, &entity.status.common, mode).await?,
                ArtifactSlot::SpecificStatus => {
                    self.store(&key, &entity.status.specific, mode).await?
                }
            };
        }
        Ok(())
    }

    /// Delete the four fixed slots and every key under the kind's ancillary
    /// prefix. Returns the number of delete calls issued.
    pub async fn delete_entity(&self, entity_id: &str, kind: EntityKind) -> Result<usize, StoreError> {
        let mut deleted = 0;
        for slot in ArtifactSlot::ALL {
            self.delete(&self.layout.slot_key(entity_id, slot)).await?;
            deleted += 1;
        }

        if let Some(prefix) = self.layout.ancillary_prefix(entity_id, kind) {
            for key in self.list_keys(&prefix).await? {
                self.delete(&key).await?;
                deleted += 1;
            }
        }

        tracing::info!(entity_id, kind = %kind, deleted, "Deleted entity artifacts");
        Ok(deleted)
    }
}
