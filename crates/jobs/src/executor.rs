//! Coordinator-local executor.
//!
//! Submissions first pass the [`AdmissionGate`]. Admitted jobs then queue for
//! a slot in one of two bounded pools: the thread pool runs bodies as tokio
//! tasks in-process, the process pool runs each job in a child process and
//! can enforce a hard timeout.

use std::sync::Arc;
use std::time::Duration;

use mpc_core::job::Priority;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::admission::AdmissionGate;
use crate::error::ExecError;
use crate::launcher::ChildLauncher;
use crate::table::{JobOutcome, JobRequest};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Thread,
    Process,
}

struct Pool {
    launcher: Arc<dyn ChildLauncher>,
    slots: Arc<Semaphore>,
}

impl Pool {
    fn new(launcher: Arc<dyn ChildLauncher>, size: usize) -> Self {
        Self {
            launcher,
            slots: Arc::new(Semaphore::new(size.max(1))),
        }
    }
}

pub struct LocalExecutor {
    gate: AdmissionGate,
    thread: Pool,
    process: Pool,
}

impl LocalExecutor {
    pub fn new(
        gate: AdmissionGate,
        thread_launcher: Arc<dyn ChildLauncher>,
        thread_workers: usize,
        process_launcher: Arc<dyn ChildLauncher>,
        process_workers: usize,
    ) -> Self {
        Self {
            gate,
            thread: Pool::new(thread_launcher, thread_workers),
            process: Pool::new(process_launcher, process_workers),
        }
    }

    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }

    /// Wait for admission, then hand the job to `pool`. The returned handle
    /// resolves to the job's outcome once it has finished; a job killed by
    /// `timeout` resolves to [`ExecError::Timeout`].
    pub async fn submit(
        &self,
        request: JobRequest,
        priority: Priority,
        pool: PoolKind,
        timeout: Option<Duration>,
    ) -> JoinHandle<Result<JobOutcome, ExecError>> {
        let waits = self.gate.admit(priority).await;
        if waits > 0 {
            tracing::info!(job = %request.name, entity_id = %request.entity_id, waits, "Job admitted");
        }

        let pool = match pool {
            PoolKind::Thread => &self.thread,
            PoolKind::Process => &self.process,
        };
        let launcher = Arc::clone(&pool.launcher);
        let slots = Arc::clone(&pool.slots);

        tokio::spawn(async move {
            let _permit = slots.acquire_owned().await.map_err(|_| ExecError::Shutdown)?;
            launcher.launch(&request, timeout).await
        })
    }

    /// Stop handing out slots. Queued submissions resolve to
    /// [`ExecError::Shutdown`]; running jobs are not interrupted.
    pub fn shutdown(&self) {
        self.thread.slots.close();
        self.process.slots.close();
    }
}
