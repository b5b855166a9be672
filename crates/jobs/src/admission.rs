//! Memory-based admission control for locally executed jobs.

use std::sync::Arc;
use std::time::Duration;

use mpc_core::job::Priority;

use crate::memory::{MemoryInfo, MemoryProbe};

pub const DEFAULT_THRESHOLD: f64 = 0.9;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Holds back non-critical jobs while the coordinator's process tree uses
/// too much memory.
pub struct AdmissionGate {
    probe: Arc<dyn MemoryProbe>,
    root_pid: u32,
    threshold: f64,
    poll_interval: Duration,
}

impl AdmissionGate {
    pub fn new(probe: Arc<dyn MemoryProbe>, root_pid: u32) -> Self {
        Self {
            probe,
            root_pid,
            threshold: DEFAULT_THRESHOLD,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub async fn sample(&self) -> MemoryInfo {
        let probe = Arc::clone(&self.probe);
        let root_pid = self.root_pid;
        match tokio::task::spawn_blocking(move || probe.sample(root_pid)).await {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(error = %e, "Memory sampling task failed");
                MemoryInfo::default()
            }
        }
    }

    /// Wait until a job of `priority` may start. Returns how many samples were
    /// over the threshold before admission.
    pub async fn admit(&self, priority: Priority) -> u32 {
        if priority.bypasses_admission() {
            return 0;
        }

        let mut waits = 0;
        loop {
            let utilization = self.sample().await.utilization();
            if utilization < self.threshold {
                return waits;
            }
            waits += 1;
            tracing::info!(
                utilization,
                threshold = self.threshold,
                ?priority,
                "Memory above threshold, holding job back",
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}
