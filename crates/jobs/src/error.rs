use std::time::Duration;

use mpc_core::status::ErrorLevel;
use mpc_store::StoreError;

use crate::computation::ComputationError;

/// Failure of a job body. The wrapper turns it into a status update.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Degraded but usable result.
    #[error("{0}")]
    Warning(String),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Computation(#[from] ComputationError),
}

impl JobError {
    pub fn level(&self) -> ErrorLevel {
        match self {
            JobError::Warning(_) => ErrorLevel::Warning,
            JobError::Computation(ComputationError::Rejected(_)) => ErrorLevel::Warning,
            JobError::Failed(_) | JobError::Store(_) | JobError::Computation(_) => ErrorLevel::Error,
        }
    }
}

/// Failure to run a job at all, as opposed to a job that ran and failed.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Job timed out after {after:?}")]
    Timeout { after: Duration },

    #[error("Failed to spawn job process: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Job process exited abnormally (code {code:?})")]
    ChildFailed { code: Option<i32> },

    #[error("Job task panicked: {0}")]
    Panicked(String),

    #[error("Executor is shutting down")]
    Shutdown,
}
