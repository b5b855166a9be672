//! Trigger-driven scheduler.
//!
//! Each [`JobPlan`] gets its own task. A fire runs to completion before the
//! next fire time is computed, so a plan never overlaps itself and fires
//! missed while busy are skipped.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule;
use mpc_core::job::{JobName, JobQueue, Priority};
use mpc_core::kind::{Cadence, KindFilter};
use mpc_jobs::executor::PoolKind;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ScheduleConfig;
use crate::dispatch::{AfterRun, DirectRun, Dispatcher};

#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expr}': {source}")]
    InvalidCron {
        expr: String,
        #[source]
        source: cron::error::Error,
    },
}

#[derive(Debug, Clone)]
pub enum Trigger {
    /// Six-field cron expression evaluated in `tz`.
    Cron { schedule: Box<Schedule>, tz: Tz },
    /// Fixed delay between the end of one fire and the next.
    Interval(Duration),
    /// Fire once, immediately.
    Once,
}

impl Trigger {
    pub fn cron(expr: &str, tz: Tz) -> Result<Self, ScheduleError> {
        let schedule = Schedule::from_str(expr).map_err(|source| ScheduleError::InvalidCron {
            expr: expr.to_string(),
            source,
        })?;
        Ok(Self::Cron {
            schedule: Box::new(schedule),
            tz,
        })
    }

    /// How long to wait from `now` until the next fire. `fired` tells whether
    /// the plan has fired before; `None` means the trigger is exhausted.
    pub fn next_delay(&self, now: DateTime<Utc>, fired: bool) -> Option<Duration> {
        match self {
            Self::Once => (!fired).then_some(Duration::ZERO),
            Self::Interval(every) => Some(*every),
            Self::Cron { schedule, tz } => {
                let next = schedule.after(&now.with_timezone(tz)).next()?;
                Some(
                    next.with_timezone(&Utc)
                        .signed_duration_since(now)
                        .to_std()
                        .unwrap_or(Duration::ZERO),
                )
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    /// Hand the job to the workers through a queue.
    Publish {
        job: JobName,
        filter: KindFilter,
        queue: JobQueue,
    },
    /// Run the job on the coordinator's local executor.
    Direct(DirectRun),
    MemoryReport,
}

#[derive(Debug, Clone)]
pub struct JobPlan {
    pub name: &'static str,
    pub trigger: Trigger,
    pub action: Action,
}

/// The coordinator's standard trigger set.
pub fn default_plans(config: &ScheduleConfig) -> Result<Vec<JobPlan>, ScheduleError> {
    let tz = config.timezone;
    let mut plans = Vec::new();

    if config.train_on_startup {
        plans.push(JobPlan {
            name: "train_all_once",
            trigger: Trigger::Once,
            action: Action::Publish {
                job: JobName::TrainModel,
                filter: KindFilter::All,
                queue: JobQueue::Training,
            },
        });
    }

    let predictions = [
        ("predict_every_minute", Cadence::EveryMinute, &config.every_minute),
        ("predict_every_five_minutes", Cadence::EveryFiveMinutes, &config.every_five_minutes),
        ("predict_quarter_hourly", Cadence::QuarterHourly, &config.quarter_hourly),
    ];
    for (name, cadence, expr) in predictions {
        plans.push(JobPlan {
            name,
            trigger: Trigger::cron(expr, tz)?,
            action: Action::Publish {
                job: JobName::Predict,
                filter: KindFilter::PredictsEvery(cadence),
                queue: JobQueue::Task,
            },
        });
    }

    plans.push(JobPlan {
        name: "train_model_daily",
        trigger: Trigger::cron(&config.daily_retrain, tz)?,
        action: Action::Publish {
            job: JobName::TrainModelDaily,
            filter: KindFilter::RetrainsDaily,
            queue: JobQueue::Training,
        },
    });

    plans.push(JobPlan {
        name: "heartbeat",
        trigger: Trigger::cron(&config.heartbeat, tz)?,
        action: Action::Direct(DirectRun {
            job: JobName::Heartbeat,
            filter: KindFilter::All,
            priority: Priority::High,
            pool: PoolKind::Thread,
            after: Some(AfterRun::Heartbeat),
        }),
    });

    plans.push(JobPlan {
        name: "control",
        trigger: Trigger::cron(&config.control, tz)?,
        action: Action::Direct(DirectRun {
            job: JobName::Control,
            filter: KindFilter::HasControlJob,
            priority: Priority::High,
            pool: PoolKind::Process,
            after: Some(AfterRun::Control),
        }),
    });

    plans.push(JobPlan {
        name: "memory_report",
        trigger: Trigger::Interval(config.memory_report),
        action: Action::MemoryReport,
    });

    Ok(plans)
}

/// Start one task per plan. The tasks stop when `cancel` fires; a fire that
/// is already running is allowed to finish first.
pub fn spawn(
    plans: Vec<JobPlan>,
    dispatcher: Arc<Dispatcher>,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    plans
        .into_iter()
        .map(|plan| tokio::spawn(run_plan(plan, Arc::clone(&dispatcher), cancel.clone())))
        .collect()
}

async fn run_plan(plan: JobPlan, dispatcher: Arc<Dispatcher>, cancel: CancellationToken) {
    tracing::info!(plan = plan.name, "Schedule started");
    let mut fired = false;

    loop {
        let Some(delay) = plan.trigger.next_delay(Utc::now(), fired) else {
            break;
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        fire(&plan, &dispatcher).await;
        fired = true;
    }

    tracing::info!(plan = plan.name, "Schedule stopped");
}

async fn fire(plan: &JobPlan, dispatcher: &Dispatcher) {
    tracing::debug!(plan = plan.name, "Schedule fired");
    match &plan.action {
        Action::Publish { job, filter, queue } => {
            dispatcher.publish(*job, *filter, *queue).await;
        }
        Action::Direct(run) => {
            dispatcher.run_direct(*run).await;
        }
        Action::MemoryReport => dispatcher.report_memory().await,
    }
}
