//! Failure-containing job wrapper.
//!
//! Loads the entity, runs the body behind a panic boundary, folds any failure
//! into the entity's status and then persists the body's slots no matter how
//! the body ended. A persistence failure is logged and does not change the
//! reported outcome.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use mpc_core::entity::Entity;
use mpc_core::job::JobName;
use mpc_core::kind::EntityKind;
use mpc_core::status::{ErrorLevel, Readiness, StatusUpdate};
use mpc_store::{LoadOptions, SlotWrites};

use crate::context::JobContext;
use crate::error::JobError;
use crate::table::JobOutcome;

/// How a body finished when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Done,
    Skipped(&'static str),
}

#[async_trait]
pub trait JobBody: Send + Sync {
    fn name(&self) -> JobName;

    fn load_options(&self) -> LoadOptions {
        LoadOptions::FULL
    }

    /// Slots persisted after the body has run.
    fn writes(&self, kind: EntityKind) -> SlotWrites;

    async fn run(&self, ctx: &JobContext, entity: &mut Entity) -> Result<Completion, JobError>;

    /// Status change recorded when the body fails. Errors also drop the
    /// model out of production.
    fn failure_update(&self, error: &JobError) -> StatusUpdate {
        let update = StatusUpdate::new()
            .status(format!("(error {}) {error}", self.name()))
            .error(error.level());
        match error.level() {
            ErrorLevel::Error => update.ready(Readiness::Untrained),
            _ => update,
        }
    }
}

/// Run `body` for `entity_id` and persist the outcome. The stored entity
/// must be of `kind`; otherwise nothing runs and nothing is persisted.
pub async fn run_job(
    ctx: &JobContext,
    entity_id: &str,
    kind: EntityKind,
    body: &dyn JobBody,
) -> JobOutcome {
    let name = body.name();

    let mut entity = match ctx.store.load_entity(entity_id, body.load_options()).await {
        Ok(entity) => entity,
        Err(e) => {
            tracing::error!(job = %name, entity_id, error = %e, "Failed to load entity for job");
            return JobOutcome::EntityUnavailable;
        }
    };

    if entity.kind() != kind {
        tracing::warn!(
            job = %name,
            entity_id,
            requested = %kind,
            stored = %entity.kind(),
            "Job requested for the wrong kind, not running",
        );
        return JobOutcome::EntityUnavailable;
    }

    let result = AssertUnwindSafe(body.run(ctx, &mut entity))
        .catch_unwind()
        .await;

    let outcome = match result {
        Ok(Ok(Completion::Done)) => {
            tracing::debug!(job = %name, entity_id, "Job succeeded");
            JobOutcome::Succeeded
        }
        Ok(Ok(Completion::Skipped(reason))) => {
            tracing::info!(job = %name, entity_id, reason, "Job skipped");
            JobOutcome::Skipped
        }
        Ok(Err(e)) => {
            let level = e.level();
            tracing::error!(job = %name, entity_id, error = %e, ?level, "Job failed");
            entity.status.apply(body.failure_update(&e));
            JobOutcome::Failed(level)
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(job = %name, entity_id, panic = %message, "Job panicked");
            let e = JobError::Failed(format!("unexpected failure: {message}"));
            entity.status.apply(body.failure_update(&e));
            JobOutcome::Failed(ErrorLevel::Error)
        }
    };

    if let Err(e) = ctx
        .store
        .store_entity(&entity, body.writes(entity.kind()))
        .await
    {
        tracing::warn!(job = %name, entity_id, error = %e, "Failed to persist job result");
    }

    outcome
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
