use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;
use mpc_store::ArtifactStore;

use crate::catalog::EntityCatalog;
use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::ledger::Ledger;
use crate::registry::Registry;
use crate::signals::Signals;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Relational list of controllers.
    pub catalog: Arc<dyn EntityCatalog>,
    /// Controllers the scheduler currently knows about.
    pub registry: Arc<Registry>,
    /// Published jobs waiting for their completion callback.
    pub ledger: Arc<Ledger>,
    pub store: ArtifactStore,
    pub dispatcher: Arc<Dispatcher>,
    pub signals: Arc<Signals>,
    pub metrics: PrometheusHandle,
}
