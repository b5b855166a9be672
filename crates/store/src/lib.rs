//! Artifact persistence for controller entities.
//!
//! [`ObjectStore`] is the raw key/value seam (S3 in production, in-memory for
//! development and tests); [`ArtifactStore`] layers the slot layout, store
//! modes and entity-level load/store/delete on top of it.

pub mod artifacts;
pub mod backend;
pub mod config;
pub mod error;
pub mod memory;
pub mod s3;

pub use artifacts::{ArtifactStore, LoadOptions, SlotWrites, StoreOutcome};
pub use backend::ObjectStore;
pub use config::{StoreBackend, StoreConfig};
pub use error::StoreError;
pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

/// Build the configured object-store backend.
pub async fn connect(config: &StoreConfig) -> std::sync::Arc<dyn ObjectStore> {
    match config.backend {
        StoreBackend::S3 => std::sync::Arc::new(S3ObjectStore::from_config(config).await),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory artifact store; artifacts are lost on restart");
            std::sync::Arc::new(MemoryObjectStore::new())
        }
    }
}
