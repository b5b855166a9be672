//! Controller entity: configuration, model artifact and status.

use serde::{Deserialize, Serialize};

use crate::kind::EntityKind;
use crate::status::Status;
use crate::types::{EntityId, Timestamp};

/// Configuration slot. Mirrors the relational catalog row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub id: EntityId,
    pub kind: EntityKind,
    pub project_id: String,
    pub name: String,
    pub weather_site_id: Option<String>,
    #[serde(default)]
    pub settings: serde_json::Value,
    #[serde(default)]
    pub favorite: bool,
    pub created_at: Timestamp,
}

/// Model slot. The parameters are produced by the computation service and are
/// opaque here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub kind: EntityKind,
    pub version: u32,
    pub trained_at: Option<Timestamp>,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ModelArtifact {
    pub fn untrained(kind: EntityKind) -> Self {
        Self {
            kind,
            version: 0,
            trained_at: None,
            parameters: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub config: EntityConfig,
    pub model: ModelArtifact,
    pub status: Status,
}

impl Entity {
    /// Build a new entity with an untrained model and the initial status.
    pub fn from_config(config: EntityConfig) -> Self {
        let kind = config.kind;
        Self {
            config,
            model: ModelArtifact::untrained(kind),
            status: Status::initial(),
        }
    }

    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn kind(&self) -> EntityKind {
        self.config.kind
    }
}
