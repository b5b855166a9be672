//! Static job name → body table.

use mpc_core::job::JobName;
use mpc_core::kind::EntityKind;
use mpc_core::status::ErrorLevel;
use tracing::Instrument;

use crate::bodies::{Control, Heartbeat, Predict, TrainModel, TrainModelDaily};
use crate::context::JobContext;
use crate::wrapper::{run_job, JobBody};

/// Extra per-run arguments. Only the heartbeat uses one today.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobArgs {
    pub beat: bool,
}

/// One job for one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub name: JobName,
    pub entity_id: String,
    pub kind: EntityKind,
    pub args: JobArgs,
}

impl JobRequest {
    pub fn new(name: JobName, entity_id: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            name,
            entity_id: entity_id.into(),
            kind,
            args: JobArgs::default(),
        }
    }

    pub fn with_args(mut self, args: JobArgs) -> Self {
        self.args = args;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Succeeded,
    Skipped,
    Failed(ErrorLevel),
    /// The entity could not be loaded, so nothing ran and nothing was persisted.
    EntityUnavailable,
}

pub fn body_for(name: JobName, args: JobArgs) -> Box<dyn JobBody> {
    match name {
        JobName::TrainModel => Box::new(TrainModel),
        JobName::TrainModelDaily => Box::new(TrainModelDaily),
        JobName::Predict => Box::new(Predict),
        JobName::Heartbeat => Box::new(Heartbeat { beat: args.beat }),
        JobName::Control => Box::new(Control),
    }
}

/// Run a job in the current process.
pub async fn execute(ctx: &JobContext, request: &JobRequest) -> JobOutcome {
    let span = tracing::info_span!(
        "job",
        job = %request.name,
        entity_id = %request.entity_id,
        kind = %request.kind,
    );
    let body = body_for(request.name, request.args);
    run_job(ctx, &request.entity_id, request.kind, body.as_ref())
        .instrument(span)
        .await
}
