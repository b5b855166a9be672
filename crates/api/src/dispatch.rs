//! Turns trigger fires into work: queued jobs go to the broker guarded by the
//! ledger, direct jobs go to the local executor.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use mpc_broker::{Broker, BrokerConfig, BrokerError};
use mpc_core::job::{JobMessage, JobName, JobQueue, Priority};
use mpc_core::kind::{EntityKind, KindFilter};
use mpc_jobs::executor::{LocalExecutor, PoolKind};
use mpc_jobs::memory::MemoryInfo;
use mpc_jobs::{JobArgs, JobRequest};

use crate::ledger::Ledger;
use crate::metrics;
use crate::registry::Registry;
use crate::signals::Signals;

/// Result of one publish sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub published: usize,
    /// Entities whose job was still running.
    pub skipped: usize,
    /// The broker failed and the rest of the sweep was dropped.
    pub abandoned: bool,
}

/// Bookkeeping run once every job of a direct sweep has finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterRun {
    Heartbeat,
    Control,
}

/// A job run on the coordinator itself instead of a worker.
#[derive(Debug, Clone, Copy)]
pub struct DirectRun {
    pub job: JobName,
    pub filter: KindFilter,
    pub priority: Priority,
    pub pool: PoolKind,
    pub after: Option<AfterRun>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DirectReport {
    pub ran: usize,
    pub failed: usize,
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    ledger: Arc<Ledger>,
    broker: Arc<dyn Broker>,
    executor: Arc<LocalExecutor>,
    signals: Arc<Signals>,
    task_queue: String,
    training_queue: String,
    process_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<Registry>,
        ledger: Arc<Ledger>,
        broker: Arc<dyn Broker>,
        executor: Arc<LocalExecutor>,
        signals: Arc<Signals>,
        broker_config: &BrokerConfig,
        process_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            ledger,
            broker,
            executor,
            signals,
            task_queue: broker_config.queue_name(JobQueue::Task).to_string(),
            training_queue: broker_config.queue_name(JobQueue::Training).to_string(),
            process_timeout,
        }
    }

    pub fn queue_name(&self, queue: JobQueue) -> &str {
        match queue {
            JobQueue::Task => &self.task_queue,
            JobQueue::Training => &self.training_queue,
        }
    }

    /// Declare both queues and drop anything left over from a previous run.
    /// Must complete before the first publish.
    pub async fn purge_queues(&self) -> Result<(), BrokerError> {
        for queue in JobQueue::ALL {
            let name = self.queue_name(queue);
            self.broker.declare(name).await?;
            let purged = self.broker.purge(name).await?;
            tracing::info!(queue = name, purged, "Queue purged");
        }
        Ok(())
    }

    /// Publish `job` for one entity unless it is already running. Returns
    /// `false` when the ledger still holds the job.
    pub async fn publish_one(
        &self,
        job: JobName,
        entity_id: &str,
        kind: EntityKind,
        queue: JobQueue,
    ) -> Result<bool, BrokerError> {
        let message = JobMessage::new(job, entity_id, kind);
        if !self.ledger.try_insert(&message.job_id) {
            tracing::info!(job_id = %message.job_id, "Job still running, not publishing");
            return Ok(false);
        }

        if let Err(e) = self.broker.publish(self.queue_name(queue), &message).await {
            self.ledger.complete(&message.job_id);
            return Err(e);
        }
        tracing::debug!(job_id = %message.job_id, queue = self.queue_name(queue), "Job published");
        Ok(true)
    }

    /// Publish `job` for every registered entity matching `filter`.
    pub async fn publish(&self, job: JobName, filter: KindFilter, queue: JobQueue) -> PublishReport {
        let mut report = PublishReport::default();

        for (entity_id, kind) in self.registry.matching(filter).await {
            match self.publish_one(job, &entity_id, kind, queue).await {
                Ok(true) => report.published += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    tracing::error!(
                        job = %job,
                        entity_id = %entity_id,
                        error = %e,
                        "Broker unavailable, abandoning publish sweep",
                    );
                    report.abandoned = true;
                    break;
                }
            }
        }

        tracing::info!(
            job = %job,
            published = report.published,
            skipped = report.skipped,
            abandoned = report.abandoned,
            "Publish sweep finished",
        );
        report
    }

    /// Run `run.job` for every matching entity on the local executor, wait
    /// for all of them, then apply the sweep's bookkeeping.
    pub async fn run_direct(&self, run: DirectRun) -> DirectReport {
        let args = JobArgs {
            beat: self.signals.beat(),
        };
        let timeout = match run.pool {
            PoolKind::Process => Some(self.process_timeout),
            PoolKind::Thread => None,
        };

        let mut handles = Vec::new();
        for (entity_id, kind) in self.registry.matching(run.filter).await {
            let request = JobRequest::new(run.job, entity_id, kind).with_args(args);
            handles.push(self.executor.submit(request, run.priority, run.pool, timeout).await);
        }

        let mut report = DirectReport::default();
        for joined in join_all(handles).await {
            report.ran += 1;
            let failure = match joined {
                Ok(Ok(outcome)) => {
                    tracing::debug!(job = %run.job, ?outcome, "Direct job finished");
                    None
                }
                Ok(Err(e)) => Some(e.to_string()),
                Err(e) => Some(e.to_string()),
            };
            if let Some(error) = failure {
                report.failed += 1;
                tracing::warn!(job = %run.job, error = %error, "Direct job did not finish cleanly");
            }
        }

        match run.after {
            Some(AfterRun::Heartbeat) => self.signals.heartbeat_completed(),
            Some(AfterRun::Control) => self.signals.control_completed(),
            None => {}
        }

        tracing::info!(job = %run.job, ran = report.ran, failed = report.failed, "Direct sweep finished");
        report
    }

    pub async fn memory_sample(&self) -> MemoryInfo {
        self.executor.gate().sample().await
    }

    /// Log the memory use of the coordinator's process tree and update its gauge.
    pub async fn report_memory(&self) {
        let info = self.memory_sample().await;
        let utilization = info.utilization();
        metrics::observe_memory(std::process::id(), utilization);
        tracing::info!(
            used_bytes = info.used_bytes(),
            total_bytes = info.total_bytes,
            processes = info.processes.len(),
            utilization,
            "Memory usage",
        );
    }
}
