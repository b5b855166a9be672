//! Canonical Prometheus metric and label names.
//!
//! Shared by the coordinator's exporter and anything that records job
//! durations, so label sets never drift apart.

/// Resident memory of the coordinator process tree as a fraction of total
/// system memory. Labelled with [`LABEL_PROCESS_ID`].
pub const MEMORY_USAGE: &str = "mpc_memory_usage";

/// Number of published jobs still waiting for a completion callback.
pub const RUNNING_JOBS: &str = "mpc_running_jobs";

/// Seconds since the last completed heartbeat sweep.
pub const HEARTBEAT_ELAPSED: &str = "mpc_heartbeat_elapsed_seconds";

/// Seconds since the last completed control sweep.
pub const CONTROL_ELAPSED: &str = "mpc_control_elapsed_seconds";

/// Wall-clock duration from publish to completion callback.
pub const JOB_DURATION: &str = "mpc_job_duration_seconds";

pub const LABEL_PROCESS_ID: &str = "process_id";
pub const LABEL_JOB_NAME: &str = "job_name";
pub const LABEL_ENTITY_ID: &str = "entity_id";

/// Histogram buckets for [`JOB_DURATION`], in seconds.
pub const JOB_DURATION_BUCKETS: [f64; 13] = [
    0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 90.0, 120.0, 300.0, 600.0, 1800.0, 3600.0,
];
