//! Isolated execution of a single job.
//!
//! [`ProcessLauncher`] runs the job in a child OS process (`run-job` mode of
//! the current executable), so a crash or leak cannot take the caller down and
//! a timed-out job can be killed outright. [`TaskLauncher`] runs it as a
//! supervised tokio task for setups where one process is enough.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::child::{outcome_from_exit, request_to_args, RUN_JOB_COMMAND};
use crate::context::JobContext;
use crate::error::ExecError;
use crate::table::{execute, JobOutcome, JobRequest};
use crate::wrapper::panic_message;

#[async_trait]
pub trait ChildLauncher: Send + Sync {
    /// Run `request` to completion, killing it after `timeout` if set.
    async fn launch(
        &self,
        request: &JobRequest,
        timeout: Option<Duration>,
    ) -> Result<JobOutcome, ExecError>;
}

/// How jobs are isolated from the process that schedules them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Isolation {
    Process,
    Task,
}

impl Isolation {
    /// Read `JOB_ISOLATION` (`process` or `task`, default `process`).
    pub fn from_env() -> Self {
        match std::env::var("JOB_ISOLATION")
            .unwrap_or_else(|_| "process".into())
            .to_ascii_lowercase()
            .as_str()
        {
            "task" => Isolation::Task,
            "process" => Isolation::Process,
            other => panic!("JOB_ISOLATION must be `process` or `task`, got `{other}`"),
        }
    }
}

// ---------------------------------------------------------------------------
// Child process
// ---------------------------------------------------------------------------

pub struct ProcessLauncher {
    program: PathBuf,
    leading_args: Vec<String>,
}

impl ProcessLauncher {
    /// Launch `program [leading_args..] run-job <name> <entity> <kind> [beat]`.
    pub fn new(program: impl Into<PathBuf>, leading_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            leading_args,
        }
    }

    /// Re-execute the running binary.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, Vec::new()))
    }
}

#[async_trait]
impl ChildLauncher for ProcessLauncher {
    async fn launch(
        &self,
        request: &JobRequest,
        timeout: Option<Duration>,
    ) -> Result<JobOutcome, ExecError> {
        let mut child = Command::new(&self.program)
            .args(&self.leading_args)
            .arg(RUN_JOB_COMMAND)
            .args(request_to_args(request))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        tracing::debug!(
            job = %request.name,
            entity_id = %request.entity_id,
            pid = child.id(),
            "Job process started",
        );

        let status = match timeout {
            Some(after) => match tokio::time::timeout(after, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    if let Err(e) = child.kill().await {
                        tracing::warn!(error = %e, "Failed to kill timed-out job process");
                    }
                    tracing::warn!(
                        job = %request.name,
                        entity_id = %request.entity_id,
                        timeout_secs = after.as_secs_f64(),
                        "Job process timed out and was killed",
                    );
                    return Err(ExecError::Timeout { after });
                }
            },
            None => child.wait().await?,
        };

        status
            .code()
            .and_then(outcome_from_exit)
            .ok_or(ExecError::ChildFailed {
                code: status.code(),
            })
    }
}

// ---------------------------------------------------------------------------
// Supervised task
// ---------------------------------------------------------------------------

pub struct TaskLauncher {
    ctx: JobContext,
}

impl TaskLauncher {
    pub fn new(ctx: JobContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl ChildLauncher for TaskLauncher {
    async fn launch(
        &self,
        request: &JobRequest,
        timeout: Option<Duration>,
    ) -> Result<JobOutcome, ExecError> {
        let ctx = self.ctx.clone();
        let owned = request.clone();
        let mut handle = tokio::spawn(async move { execute(&ctx, &owned).await });

        let joined = match timeout {
            Some(after) => match tokio::time::timeout(after, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    tracing::warn!(
                        job = %request.name,
                        entity_id = %request.entity_id,
                        timeout_secs = after.as_secs_f64(),
                        "Job task timed out and was aborted",
                    );
                    return Err(ExecError::Timeout { after });
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(outcome) => {
                if outcome == JobOutcome::EntityUnavailable {
                    tracing::warn!(job = %request.name, entity_id = %request.entity_id, "Job did not run");
                }
                Ok(outcome)
            }
            Err(e) if e.is_panic() => Err(ExecError::Panicked(panic_message(e.into_panic().as_ref()))),
            Err(_) => Err(ExecError::Shutdown),
        }
    }
}
