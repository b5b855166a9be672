use std::sync::Arc;

use mpc_store::{ArtifactStore, StoreConfig};

use crate::computation::{Computation, ComputationConfig, ComputationError, RemoteComputation};

/// Everything a job body needs. Cheap to clone.
#[derive(Clone)]
pub struct JobContext {
    pub store: ArtifactStore,
    pub computation: Arc<dyn Computation>,
}

impl JobContext {
    pub fn new(store: ArtifactStore, computation: Arc<dyn Computation>) -> Self {
        Self { store, computation }
    }

    /// Build a context from `StoreConfig` and `ComputationConfig` environment
    /// variables.
    pub async fn from_env() -> Result<Self, ComputationError> {
        let store_config = StoreConfig::from_env();
        let backend = mpc_store::connect(&store_config).await;
        let store = ArtifactStore::new(backend, store_config.layout.clone());
        let computation = RemoteComputation::new(&ComputationConfig::from_env())?;
        Ok(Self::new(store, Arc::new(computation)))
    }
}
