//! Integration tests for admission control, launchers and the local executor.

mod common;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use common::{entity, harness, seed, Script};
use mpc_core::job::{JobName, Priority};
use mpc_core::kind::EntityKind;
use mpc_core::status::{ErrorLevel, Readiness};
use mpc_jobs::admission::AdmissionGate;
use mpc_jobs::executor::{LocalExecutor, PoolKind};
use mpc_jobs::launcher::{ChildLauncher, ProcessLauncher, TaskLauncher};
use mpc_jobs::memory::{MemoryInfo, MemoryProbe};
use mpc_jobs::{ExecError, JobOutcome, JobRequest};

/// Replays a fixed sequence of utilisation readings, then repeats the last.
struct ScriptedProbe {
    readings: Mutex<VecDeque<f64>>,
    samples: Mutex<usize>,
}

impl ScriptedProbe {
    fn new(readings: &[f64]) -> Self {
        Self {
            readings: Mutex::new(readings.iter().copied().collect()),
            samples: Mutex::new(0),
        }
    }

    fn samples(&self) -> usize {
        *self.samples.lock().unwrap()
    }
}

impl MemoryProbe for ScriptedProbe {
    fn sample(&self, root_pid: u32) -> MemoryInfo {
        *self.samples.lock().unwrap() += 1;
        let mut readings = self.readings.lock().unwrap();
        let reading = if readings.len() > 1 {
            readings.pop_front().unwrap()
        } else {
            readings[0]
        };
        MemoryInfo {
            total_bytes: 1_000,
            processes: vec![(root_pid, (reading * 1_000.0) as u64)],
        }
    }
}

fn gate(probe: Arc<ScriptedProbe>) -> AdmissionGate {
    AdmissionGate::new(probe, std::process::id())
        .with_threshold(0.9)
        .with_poll_interval(Duration::from_millis(10))
}

// ---------------------------------------------------------------------------
// Test: admission gating
// ---------------------------------------------------------------------------

#[tokio::test]
async fn medium_priority_waits_until_memory_drops() {
    let probe = Arc::new(ScriptedProbe::new(&[0.95, 0.95, 0.85]));

    let waits = gate(probe.clone()).admit(Priority::Medium).await;

    assert_eq!(waits, 2);
    assert_eq!(probe.samples(), 3);
}

#[tokio::test]
async fn medium_priority_stays_blocked_above_threshold() {
    let probe = Arc::new(ScriptedProbe::new(&[0.95]));
    let gate = gate(probe);

    let blocked = tokio::time::timeout(Duration::from_millis(100), gate.admit(Priority::Medium)).await;

    assert!(blocked.is_err());
}

#[tokio::test]
async fn critical_priority_bypasses_gate() {
    let probe = Arc::new(ScriptedProbe::new(&[0.95]));

    let waits = gate(probe.clone()).admit(Priority::Critical).await;

    assert_eq!(waits, 0);
    assert_eq!(probe.samples(), 0);
}

// ---------------------------------------------------------------------------
// Test: task launcher
// ---------------------------------------------------------------------------

#[tokio::test]
async fn task_launcher_times_out_slow_job() {
    let h = harness();
    let mut e = entity("1", EntityKind::Ems);
    e.status.common.ready = Readiness::Trained;
    seed(&h.ctx, &e).await;
    h.computation.set(Script::Delay(Duration::from_secs(5)));

    let launcher = TaskLauncher::new(h.ctx.clone());
    let result = launcher
        .launch(
            &JobRequest::new(JobName::Predict, "1", EntityKind::Ems),
            Some(Duration::from_millis(50)),
        )
        .await;

    assert_matches!(result, Err(ExecError::Timeout { .. }));
}

// ---------------------------------------------------------------------------
// Test: process launcher
// ---------------------------------------------------------------------------

#[cfg(unix)]
#[tokio::test]
async fn process_launcher_kills_on_timeout() {
    // `sh -c '<script>' run-job ...`: the job arguments become $0.. and are ignored.
    let launcher = ProcessLauncher::new("sh", vec!["-c".into(), "sleep 10".into()]);

    let started = std::time::Instant::now();
    let result = launcher
        .launch(
            &JobRequest::new(JobName::TrainModel, "1", EntityKind::Ems),
            Some(Duration::from_millis(100)),
        )
        .await;

    assert_matches!(result, Err(ExecError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(unix)]
#[tokio::test]
async fn process_launcher_reports_crash_exit_code() {
    let launcher = ProcessLauncher::new("sh", vec!["-c".into(), "exit 70".into()]);

    let result = launcher
        .launch(&JobRequest::new(JobName::Predict, "1", EntityKind::Ems), None)
        .await;

    assert_matches!(result, Err(ExecError::ChildFailed { code: Some(70) }));
}

#[cfg(unix)]
#[tokio::test]
async fn process_launcher_reads_outcome_from_exit_code() {
    let code = mpc_jobs::child::exit_code(JobOutcome::Failed(ErrorLevel::Warning));
    let launcher = ProcessLauncher::new("sh", vec!["-c".into(), format!("exit {code}")]);

    let result = launcher
        .launch(&JobRequest::new(JobName::Predict, "1", EntityKind::Ems), None)
        .await;

    assert_matches!(result, Ok(JobOutcome::Failed(ErrorLevel::Warning)));
}

#[cfg(unix)]
#[tokio::test]
async fn process_launcher_passes_job_arguments() {
    let launcher = ProcessLauncher::new(
        "sh",
        vec![
            "-c".into(),
            r#"[ "$0" = run-job ] && [ "$1" = predict ] && [ "$2" = 42 ] && [ "$3" = ems ]"#.into(),
        ],
    );

    let result = launcher
        .launch(&JobRequest::new(JobName::Predict, "42", EntityKind::Ems), None)
        .await;

    assert_matches!(result, Ok(JobOutcome::Succeeded));
}

// ---------------------------------------------------------------------------
// Test: executor
// ---------------------------------------------------------------------------

#[tokio::test]
async fn executor_runs_thread_pool_jobs() {
    let h = harness();
    seed(&h.ctx, &entity("2", EntityKind::ConsumptionService)).await;
    let launcher: Arc<dyn ChildLauncher> = Arc::new(TaskLauncher::new(h.ctx.clone()));
    let executor = LocalExecutor::new(
        gate(Arc::new(ScriptedProbe::new(&[0.1]))),
        launcher.clone(),
        2,
        launcher,
        1,
    );

    let handle = executor
        .submit(
            JobRequest::new(JobName::TrainModel, "2", EntityKind::ConsumptionService),
            Priority::Medium,
            PoolKind::Thread,
            None,
        )
        .await;

    assert_matches!(handle.await.unwrap(), Ok(JobOutcome::Succeeded));
    let status = h.ctx.store.load_common_status("2").await.unwrap();
    assert_eq!(status.ready, Readiness::Trained);
}

#[tokio::test]
async fn executor_rejects_after_shutdown() {
    let h = harness();
    let launcher: Arc<dyn ChildLauncher> = Arc::new(TaskLauncher::new(h.ctx.clone()));
    let executor = LocalExecutor::new(
        gate(Arc::new(ScriptedProbe::new(&[0.1]))),
        launcher.clone(),
        1,
        launcher,
        1,
    );
    executor.shutdown();

    let handle = executor
        .submit(
            JobRequest::new(JobName::Predict, "3", EntityKind::Ems),
            Priority::Critical,
            PoolKind::Process,
            None,
        )
        .await;

    assert_matches!(handle.await.unwrap(), Err(ExecError::Shutdown));
}
