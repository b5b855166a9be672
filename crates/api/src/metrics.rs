//! Prometheus instrumentation for the coordinator.
//!
//! Gauges are refreshed when `/metrics` is scraped; job durations are
//! recorded as completion callbacks arrive.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use mpc_core::metric_names::{
    CONTROL_ELAPSED, HEARTBEAT_ELAPSED, JOB_DURATION, JOB_DURATION_BUCKETS, LABEL_ENTITY_ID,
    LABEL_JOB_NAME, LABEL_PROCESS_ID, MEMORY_USAGE, RUNNING_JOBS,
};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder.
///
/// Safe to call multiple times; subsequent calls return the same handle.
///
/// # Panics
///
/// Panics if the recorder cannot be installed. The coordinator should not
/// start without it.
#[allow(clippy::panic)]
pub fn init_metrics() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .set_buckets_for_metric(
                    Matcher::Full(JOB_DURATION.to_string()),
                    &JOB_DURATION_BUCKETS,
                )
                .and_then(|builder| builder.install_recorder())
                .unwrap_or_else(|e| panic!("failed to install prometheus recorder: {e}"));

            describe_gauge!(MEMORY_USAGE, "Used memory of the coordinator process tree, as a fraction");
            describe_gauge!(RUNNING_JOBS, "Published jobs waiting for a completion callback");
            describe_gauge!(HEARTBEAT_ELAPSED, "Seconds elapsed since the last heartbeat run");
            describe_gauge!(CONTROL_ELAPSED, "Seconds elapsed since the last control run");
            describe_histogram!(JOB_DURATION, "Seconds from publish to completion callback");

            tracing::info!("Prometheus metrics recorder initialized");
            handle
        })
        .clone()
}

pub fn record_job_duration(job_name: &str, entity_id: &str, elapsed: Duration) {
    histogram!(
        JOB_DURATION,
        LABEL_JOB_NAME => job_name.to_string(),
        LABEL_ENTITY_ID => entity_id.to_string(),
    )
    .record(elapsed.as_secs_f64());
}

pub fn observe_memory(process_id: u32, utilization: f64) {
    gauge!(MEMORY_USAGE, LABEL_PROCESS_ID => process_id.to_string()).set(utilization);
}

pub fn observe_running_jobs(running: usize) {
    gauge!(RUNNING_JOBS).set(running as f64);
}

pub fn observe_elapsed(heartbeat: Duration, control: Duration) {
    gauge!(HEARTBEAT_ELAPSED).set(heartbeat.as_secs_f64());
    gauge!(CONTROL_ELAPSED).set(control.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauges_recorded_after_install_are_rendered() {
        let handle = init_metrics();

        observe_memory(4242, 0.25);

        let rendered = handle.render();
        assert!(rendered.contains(MEMORY_USAGE));
        assert!(rendered.contains("4242"));
    }
}
