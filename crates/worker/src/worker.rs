//! The consume → run → ack → callback loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mpc_broker::{Broker, BrokerError, Delivery};
use mpc_core::job::{JobMessage, JobName};
use mpc_core::kind::EntityKind;
use mpc_jobs::launcher::ChildLauncher;
use mpc_jobs::JobRequest;
use tokio_util::sync::CancellationToken;

use crate::notifier::CompletionNotifier;

/// What happened to one delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handled {
    /// The job ran to completion in its child.
    Ran { job_id: String },
    /// The child could not be started, crashed or timed out.
    Failed { job_id: String },
    /// Valid JSON naming a job or kind this worker does not know.
    Rejected { job_id: String },
    /// Not a job message at all. Acked and dropped.
    Malformed,
}

impl Handled {
    pub fn job_id(&self) -> Option<&str> {
        match self {
            Handled::Ran { job_id } | Handled::Failed { job_id } | Handled::Rejected { job_id } => {
                Some(job_id)
            }
            Handled::Malformed => None,
        }
    }
}

pub struct Worker {
    broker: Arc<dyn Broker>,
    queue: String,
    launcher: Arc<dyn ChildLauncher>,
    notifier: Arc<dyn CompletionNotifier>,
    job_timeout: Option<Duration>,
}

impl Worker {
    pub fn new(
        broker: Arc<dyn Broker>,
        queue: impl Into<String>,
        launcher: Arc<dyn ChildLauncher>,
        notifier: Arc<dyn CompletionNotifier>,
        job_timeout: Option<Duration>,
    ) -> Self {
        Self {
            broker,
            queue: queue.into(),
            launcher,
            notifier,
            job_timeout,
        }
    }

    /// Consume until `cancel` fires or the broker closes the consumer.
    ///
    /// Cancellation is only observed while waiting for a delivery: a job
    /// already received is run, acked and reported before this returns.
    /// Returns the number of deliveries handled.
    pub async fn run(&self, cancel: CancellationToken) -> Result<u64, BrokerError> {
        self.broker.declare(&self.queue).await?;
        let mut consumer = self.broker.consume(&self.queue).await?;
        tracing::info!(queue = %self.queue, "Waiting for messages");

        let mut handled = 0;
        loop {
            let delivery = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::info!("Shutdown requested, no further messages will be taken");
                    break;
                }
                next = consumer.next() => match next {
                    Some(delivery) => delivery?,
                    None => {
                        tracing::warn!(queue = %self.queue, "Consumer closed by the broker");
                        break;
                    }
                },
            };
            // Ack failures are logged in `handle`; the broker redelivers.
            let _ = self.handle(delivery).await;
            handled += 1;
        }

        Ok(handled)
    }

    /// Run one delivery. Every delivery is acked exactly once; every one that
    /// carries a job id is reported to the coordinator after the ack, even
    /// when the ack itself failed. An ack failure is returned after the
    /// callback has been sent.
    pub async fn handle(&self, delivery: Delivery) -> Result<Handled, BrokerError> {
        let message = match delivery.decode() {
            Ok(message) => message,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    payload = %String::from_utf8_lossy(delivery.payload()),
                    "Dropping malformed message",
                );
                self.ack(delivery, None).await?;
                return Ok(Handled::Malformed);
            }
        };

        let request = match resolve(&message) {
            Ok(request) => request,
            Err(reason) => {
                tracing::error!(job_id = %message.job_id, error = %reason, "Rejecting message");
                let acked = self.ack(delivery, Some(&message.job_id)).await;
                self.notify(&message.job_id).await;
                acked?;
                return Ok(Handled::Rejected {
                    job_id: message.job_id,
                });
            }
        };

        tracing::info!(
            job = %request.name,
            entity_id = %request.entity_id,
            kind = %request.kind,
            "Starting job",
        );
        let started = Instant::now();
        let result = self.launcher.launch(&request, self.job_timeout).await;

        let acked = self.ack(delivery, Some(&message.job_id)).await;
        let handled = match result {
            Ok(outcome) => {
                tracing::info!(
                    job = %request.name,
                    entity_id = %request.entity_id,
                    ?outcome,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "Finished job",
                );
                Handled::Ran {
                    job_id: message.job_id,
                }
            }
            Err(e) => {
                tracing::error!(
                    job = %request.name,
                    entity_id = %request.entity_id,
                    error = %e,
                    "Job did not complete",
                );
                Handled::Failed {
                    job_id: message.job_id,
                }
            }
        };

        if let Some(job_id) = handled.job_id() {
            self.notify(job_id).await;
        }
        acked?;
        Ok(handled)
    }

    async fn ack(&self, delivery: Delivery, job_id: Option<&str>) -> Result<(), BrokerError> {
        delivery.ack().await.inspect_err(|e| {
            tracing::error!(queue = %self.queue, job_id, error = %e, "Failed to acknowledge delivery");
        })
    }

    async fn notify(&self, job_id: &str) {
        if let Err(e) = self.notifier.job_completed(job_id).await {
            tracing::error!(job_id, error = %e, "Failed to send completion callback");
        }
    }
}

/// Map a wire message onto a job request.
pub fn resolve(message: &JobMessage) -> Result<JobRequest, String> {
    let name = JobName::from_name(&message.name)
        .ok_or_else(|| format!("unknown job `{}`", message.name))?;
    let kind = EntityKind::from_name(&message.holder_type)
        .ok_or_else(|| format!("unknown kind `{}`", message.holder_type))?;
    if message.model_id.is_empty() {
        return Err("empty model id".into());
    }
    Ok(JobRequest::new(name, message.model_id.clone(), kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(name: &str, holder_type: &str) -> JobMessage {
        JobMessage {
            name: name.into(),
            model_id: "8".into(),
            holder_type: holder_type.into(),
            job_id: format!("{name}:8"),
        }
    }

    #[test]
    fn resolves_known_job() {
        let request = resolve(&message("train_model_daily", "consumption_service")).unwrap();
        assert_eq!(request.name, JobName::TrainModelDaily);
        assert_eq!(request.entity_id, "8");
        assert_eq!(request.kind, EntityKind::ConsumptionService);
        assert!(!request.args.beat);
    }

    #[test]
    fn unknown_job_name_is_rejected() {
        let err = resolve(&message("ems_prediction_thread", "ems")).unwrap_err();
        assert!(err.contains("ems_prediction_thread"));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let err = resolve(&message("predict", "EmsModelHolder")).unwrap_err();
        assert!(err.contains("EmsModelHolder"));
    }
}
