//! Artifact slots, write modes and the object key layout.

use crate::error::CoreError;
use crate::kind::EntityKind;

/// Controls whether a store call may create a missing key, overwrite an
/// existing one, or both. A disallowed write is a silent no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    CreateOnly,
    UpdateOnly,
    CreateAndUpdate,
}

impl StoreMode {
    /// Whether a write may proceed given the current existence of the key.
    pub fn allows(self, key_exists: bool) -> bool {
        match self {
            StoreMode::CreateOnly => !key_exists,
            StoreMode::UpdateOnly => key_exists,
            StoreMode::CreateAndUpdate => true,
        }
    }
}

/// The four fixed per-entity slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactSlot {
    Config,
    Model,
    CommonStatus,
    SpecificStatus,
}

impl ArtifactSlot {
    pub const ALL: [ArtifactSlot; 4] = [
        ArtifactSlot::Config,
        ArtifactSlot::Model,
        ArtifactSlot::CommonStatus,
        ArtifactSlot::SpecificStatus,
    ];

    pub fn path(self) -> &'static str {
        match self {
            ArtifactSlot::Config => "config",
            ArtifactSlot::Model => "model",
            ArtifactSlot::CommonStatus => "status/common",
            ArtifactSlot::SpecificStatus => "status/specific",
        }
    }
}

/// Deterministic key layout: `<namespace>/<entities_folder>/<entity_id>/<slot>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    pub namespace: String,
    pub entities_folder: String,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self {
            namespace: "mpc".to_string(),
            entities_folder: "controllers".to_string(),
        }
    }
}

/// Entity ids become one path segment of every object key and the tail of
/// every job id, so they may not contain either separator.
pub fn validate_entity_id(id: &str) -> Result<(), CoreError> {
    if id.trim().is_empty() {
        return Err(CoreError::Validation("Controller id must not be empty".into()));
    }
    if id == "." || id == ".." {
        return Err(CoreError::Validation(format!("Controller id `{id}` is reserved")));
    }
    if let Some(c) = id
        .chars()
        .find(|c| matches!(c, '/' | '\\' | ':') || c.is_whitespace() || c.is_control())
    {
        return Err(CoreError::Validation(format!(
            "Controller id `{id}` must not contain {c:?}"
        )));
    }
    Ok(())
}

impl KeyLayout {
    pub fn entity_prefix(&self, entity_id: &str) -> String {
        format!("{}/{}/{}/", self.namespace, self.entities_folder, entity_id)
    }

    pub fn slot_key(&self, entity_id: &str, slot: ArtifactSlot) -> String {
        format!("{}{}", self.entity_prefix(entity_id), slot.path())
    }

    /// Prefix of the kind's ancillary sub-resources, if it owns any.
    pub fn ancillary_prefix(&self, entity_id: &str, kind: EntityKind) -> Option<String> {
        kind.spec()
            .ancillary_folder
            .map(|folder| format!("{}{}/", self.entity_prefix(entity_id), folder))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_stay_inside_their_prefix() {
        for id in ["7", "site-3", "ems_12", "A.b"] {
            assert!(validate_entity_id(id).is_ok(), "{id}");
        }
        for id in ["", " ", "7/setpoint_optimizer", "..", ".", "7:1", "a\\b", "7 1", "7\n"] {
            assert!(validate_entity_id(id).is_err(), "{id:?}");
        }
    }

    #[test]
    fn store_mode_matrix() {
        assert!(StoreMode::CreateOnly.allows(false));
        assert!(!StoreMode::CreateOnly.allows(true));
        assert!(!StoreMode::UpdateOnly.allows(false));
        assert!(StoreMode::UpdateOnly.allows(true));
        assert!(StoreMode::CreateAndUpdate.allows(false));
        assert!(StoreMode::CreateAndUpdate.allows(true));
    }

    #[test]
    fn slot_keys_follow_layout() {
        let layout = KeyLayout {
            namespace: "ai".into(),
            entities_folder: "holders".into(),
        };
        assert_eq!(layout.slot_key("42", ArtifactSlot::Config), "ai/holders/42/config");
        assert_eq!(
            layout.slot_key("42", ArtifactSlot::SpecificStatus),
            "ai/holders/42/status/specific"
        );
    }

    #[test]
    fn ancillary_prefix_only_for_owning_kinds() {
        let layout = KeyLayout::default();
        assert_eq!(
            layout.ancillary_prefix("7", EntityKind::SetpointOptimizer).as_deref(),
            Some("mpc/controllers/7/setpoint_optimizer/")
        );
        assert_eq!(layout.ancillary_prefix("7", EntityKind::Ems), None);
    }
}
