use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mpc_core::artifact::{KeyLayout, StoreMode};
use mpc_core::entity::{Entity, EntityConfig};
use mpc_core::kind::EntityKind;
use mpc_jobs::computation::{Computation, ComputationError, PredictOutput, TrainOutput};
use mpc_jobs::JobContext;
use mpc_store::{ArtifactStore, MemoryObjectStore, SlotWrites};

/// What the scripted computation does on its next call.
#[derive(Debug, Clone, Default)]
pub enum Script {
    #[default]
    Succeed,
    Warn(&'static str),
    Reject(&'static str),
    Fail(&'static str),
    Panic,
    Delay(Duration),
}

#[derive(Default)]
pub struct ScriptedComputation {
    script: Mutex<Script>,
    pub calls: AtomicUsize,
    pub last_beat: Mutex<Option<bool>>,
}

impl ScriptedComputation {
    pub fn set(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn step(&self) -> Result<Option<&'static str>, ComputationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock().unwrap().clone();
        match script {
            Script::Succeed => Ok(None),
            Script::Warn(w) => Ok(Some(w)),
            Script::Reject(msg) => Err(ComputationError::Rejected(msg.into())),
            Script::Fail(msg) => Err(ComputationError::Failed(msg.into())),
            Script::Panic => panic!("solver exploded"),
            Script::Delay(d) => {
                tokio::time::sleep(d).await;
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl Computation for ScriptedComputation {
    async fn train(&self, _entity: &Entity, retrain: bool) -> Result<TrainOutput, ComputationError> {
        self.step().await?;
        Ok(TrainOutput {
            parameters: serde_json::json!({ "weights": [0.1, 0.2], "retrain": retrain }),
            specific: None,
        })
    }

    async fn predict(&self, _entity: &Entity) -> Result<PredictOutput, ComputationError> {
        let warning = self.step().await?;
        Ok(PredictOutput {
            parameters: Some(serde_json::json!({ "updated": true })),
            specific: serde_json::json!({ "forecast": [1.0, 2.0] }),
            warning: warning.map(str::to_string),
        })
    }

    async fn heartbeat(&self, _entity: &Entity, beat: bool) -> Result<(), ComputationError> {
        *self.last_beat.lock().unwrap() = Some(beat);
        self.step().await?;
        Ok(())
    }

    async fn control(&self, _entity: &Entity) -> Result<(), ComputationError> {
        self.step().await?;
        Ok(())
    }
}

pub struct Harness {
    pub backend: Arc<MemoryObjectStore>,
    pub computation: Arc<ScriptedComputation>,
    pub ctx: JobContext,
}

pub fn harness() -> Harness {
    let backend = Arc::new(MemoryObjectStore::new());
    let computation = Arc::new(ScriptedComputation::default());
    let store = ArtifactStore::new(backend.clone(), KeyLayout::default());
    let ctx = JobContext::new(store, computation.clone());
    Harness {
        backend,
        computation,
        ctx,
    }
}

pub fn entity(id: &str, kind: EntityKind) -> Entity {
    Entity::from_config(EntityConfig {
        id: id.to_string(),
        kind,
        project_id: "p1".into(),
        name: format!("controller {id}"),
        weather_site_id: Some("w1".into()),
        settings: serde_json::json!({}),
        favorite: false,
        created_at: Utc::now(),
    })
}

/// Persist `entity` in all slots.
pub async fn seed(ctx: &JobContext, entity: &Entity) {
    ctx.store
        .store_entity(entity, SlotWrites::all(StoreMode::CreateAndUpdate))
        .await
        .unwrap();
}
