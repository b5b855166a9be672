//! Job bodies.

use async_trait::async_trait;
use chrono::Utc;
use mpc_core::artifact::{ArtifactSlot, StoreMode};
use mpc_core::entity::Entity;
use mpc_core::job::JobName;
use mpc_core::kind::EntityKind;
use mpc_core::status::{ErrorLevel, Readiness, StatusUpdate};
use mpc_store::{LoadOptions, SlotWrites};

use crate::context::JobContext;
use crate::error::JobError;
use crate::wrapper::{Completion, JobBody};

/// Job results only ever update existing slots, so a job racing an entity
/// deletion cannot bring the entity back.
const JOB_WRITE: StoreMode = StoreMode::UpdateOnly;

fn status_writes() -> SlotWrites {
    SlotWrites {
        common_status: Some(JOB_WRITE),
        specific_status: Some(JOB_WRITE),
        ..SlotWrites::none()
    }
}

fn common_status_writes() -> SlotWrites {
    SlotWrites {
        common_status: Some(JOB_WRITE),
        ..SlotWrites::none()
    }
}

/// Models that learn while predicting must not be retrained from scratch once
/// they are producing.
fn trained_by_predictions(entity: &Entity) -> bool {
    entity.kind().spec().updates_model_in_prediction
        && entity.status.common.ready == Readiness::Producing
}

async fn train(ctx: &JobContext, entity: &mut Entity, retrain: bool) -> Result<Completion, JobError> {
    let output = ctx.computation.train(entity, retrain).await?;

    entity.model.parameters = output.parameters;
    entity.model.version += 1;
    entity.model.trained_at = Some(Utc::now());
    if let Some(specific) = output.specific {
        entity.status.specific = specific;
    }

    let message = if retrain { "running, updated" } else { "running" };
    entity.status.apply(
        StatusUpdate::new()
            .status(message)
            .ready(Readiness::Trained)
            .error(ErrorLevel::None)
            .training(false),
    );
    Ok(Completion::Done)
}

// ---------------------------------------------------------------------------
// Training
// ---------------------------------------------------------------------------

/// First training of a controller, queued on creation and at startup.
pub struct TrainModel;

#[async_trait]
impl JobBody for TrainModel {
    fn name(&self) -> JobName {
        JobName::TrainModel
    }

    fn writes(&self, _kind: EntityKind) -> SlotWrites {
        status_writes().with(ArtifactSlot::Model, JOB_WRITE)
    }

    async fn run(&self, ctx: &JobContext, entity: &mut Entity) -> Result<Completion, JobError> {
        if trained_by_predictions(entity) {
            return Ok(Completion::Skipped("model is trained by its predictions"));
        }
        train(ctx, entity, false).await
    }

    /// Leaves `ready` alone: a model that already produces keeps serving
    /// predictions when a retrain attempt fails.
    fn failure_update(&self, error: &JobError) -> StatusUpdate {
        StatusUpdate::new()
            .status(format!("error training: {error}"))
            .error(error.level())
            .training(false)
    }
}

/// Nightly retrain. Marks the controller as training before the long call
/// so concurrent sweeps skip it.
pub struct TrainModelDaily;

#[async_trait]
impl JobBody for TrainModelDaily {
    fn name(&self) -> JobName {
        JobName::TrainModelDaily
    }

    fn writes(&self, _kind: EntityKind) -> SlotWrites {
        status_writes().with(ArtifactSlot::Model, JOB_WRITE)
    }

    async fn run(&self, ctx: &JobContext, entity: &mut Entity) -> Result<Completion, JobError> {
        if entity.status.common.training {
            return Ok(Completion::Skipped("training already in progress"));
        }
        if trained_by_predictions(entity) {
            return Ok(Completion::Skipped("model is trained by its predictions"));
        }

        entity
            .status
            .apply(StatusUpdate::new().status("updating").training(true));
        ctx.store.store_entity(entity, common_status_writes()).await?;

        train(ctx, entity, true).await
    }

    fn failure_update(&self, error: &JobError) -> StatusUpdate {
        StatusUpdate::new()
            .status(format!("(error update) training model: {error}"))
            .error(ErrorLevel::Error)
            .ready(Readiness::Untrained)
            .training(false)
    }
}

// ---------------------------------------------------------------------------
// Prediction
// ---------------------------------------------------------------------------

pub struct Predict;

#[async_trait]
impl JobBody for Predict {
    fn name(&self) -> JobName {
        JobName::Predict
    }

    fn writes(&self, kind: EntityKind) -> SlotWrites {
        let writes = status_writes();
        if kind.spec().updates_model_in_prediction {
            writes.with(ArtifactSlot::Model, JOB_WRITE)
        } else {
            writes
        }
    }

    async fn run(&self, ctx: &JobContext, entity: &mut Entity) -> Result<Completion, JobError> {
        if entity.status.common.ready == Readiness::Untrained {
            return Ok(Completion::Skipped("model not trained"));
        }

        let output = ctx.computation.predict(entity).await?;

        if let Some(parameters) = output.parameters {
            if entity.kind().spec().updates_model_in_prediction {
                entity.model.parameters = parameters;
            }
        }
        entity.status.specific = output.specific;
        entity.status.apply(StatusUpdate::new().ready(Readiness::Producing));

        match output.warning {
            Some(warning) => Err(JobError::Warning(warning)),
            None => {
                entity
                    .status
                    .apply(StatusUpdate::new().status("running").error(ErrorLevel::None));
                Ok(Completion::Done)
            }
        }
    }

    fn failure_update(&self, error: &JobError) -> StatusUpdate {
        let update = StatusUpdate::new()
            .status(format!("(error prediction) {error}"))
            .error(error.level());
        match error.level() {
            ErrorLevel::Error => update.ready(Readiness::Untrained),
            _ => update,
        }
    }
}

// ---------------------------------------------------------------------------
// Site communication
// ---------------------------------------------------------------------------

/// Liveness signal towards the controlled site. `beat` alternates between
/// sweeps.
pub struct Heartbeat {
    pub beat: bool,
}

#[async_trait]
impl JobBody for Heartbeat {
    fn name(&self) -> JobName {
        JobName::Heartbeat
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions::WITHOUT_MODEL
    }

    fn writes(&self, _kind: EntityKind) -> SlotWrites {
        common_status_writes()
    }

    async fn run(&self, ctx: &JobContext, entity: &mut Entity) -> Result<Completion, JobError> {
        ctx.computation.heartbeat(entity, self.beat).await?;
        Ok(Completion::Done)
    }

    fn failure_update(&self, error: &JobError) -> StatusUpdate {
        StatusUpdate::new()
            .status(format!("error heartbeat: {error}"))
            .error(error.level())
    }
}

/// Pushes the current schedule to the site.
pub struct Control;

#[async_trait]
impl JobBody for Control {
    fn name(&self) -> JobName {
        JobName::Control
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions::WITHOUT_MODEL
    }

    fn writes(&self, _kind: EntityKind) -> SlotWrites {
        common_status_writes()
    }

    async fn run(&self, ctx: &JobContext, entity: &mut Entity) -> Result<Completion, JobError> {
        if entity.status.common.ready != Readiness::Producing {
            return Ok(Completion::Skipped("no schedule produced yet"));
        }
        ctx.computation.control(entity).await?;
        Ok(Completion::Done)
    }

    fn failure_update(&self, error: &JobError) -> StatusUpdate {
        StatusUpdate::new()
            .status(format!("error control: {error}"))
            .error(error.level())
    }
}
