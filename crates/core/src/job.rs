//! Job names, queue selection, priorities and the broker message format.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kind::EntityKind;

// ---------------------------------------------------------------------------
// Job names
// ---------------------------------------------------------------------------

/// Closed set of job bodies a worker knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobName {
    TrainModel,
    TrainModelDaily,
    Predict,
    Heartbeat,
    Control,
}

impl JobName {
    pub const ALL: [JobName; 5] = [
        JobName::TrainModel,
        JobName::TrainModelDaily,
        JobName::Predict,
        JobName::Heartbeat,
        JobName::Control,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobName::TrainModel => "train_model",
            JobName::TrainModelDaily => "train_model_daily",
            JobName::Predict => "predict",
            JobName::Heartbeat => "heartbeat",
            JobName::Control => "control",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|j| j.as_str() == name)
    }
}

impl fmt::Display for JobName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger key for a (job, entity) pair: `"<job_name>:<entity_id>"`.
pub fn job_id(name: &str, entity_id: &str) -> String {
    format!("{name}:{entity_id}")
}

/// Split a ledger key into job name and entity id. Job names never contain
/// `:`, so the first separator is the boundary.
pub fn parse_job_id(job_id: &str) -> Option<(&str, &str)> {
    job_id
        .split_once(':')
        .filter(|(name, entity)| !name.is_empty() && !entity.is_empty())
}

// ---------------------------------------------------------------------------
// Queues and priorities
// ---------------------------------------------------------------------------

/// Which durable queue a job is published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobQueue {
    Task,
    Training,
}

impl JobQueue {
    pub const ALL: [JobQueue; 2] = [JobQueue::Task, JobQueue::Training];

    pub fn default_name(self) -> &'static str {
        match self {
            JobQueue::Task => "task_queue",
            JobQueue::Training => "training_task_queue",
        }
    }
}

/// Admission priority for locally executed jobs. Only `Critical` bypasses the
/// memory gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn bypasses_admission(self) -> bool {
        self == Priority::Critical
    }
}

// ---------------------------------------------------------------------------
// Wire message
// ---------------------------------------------------------------------------

/// Message published to a job queue. Field names are part of the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMessage {
    pub name: String,
    pub model_id: String,
    pub holder_type: String,
    pub job_id: String,
}

impl JobMessage {
    pub fn new(name: JobName, entity_id: &str, kind: EntityKind) -> Self {
        Self {
            name: name.as_str().to_string(),
            model_id: entity_id.to_string(),
            holder_type: kind.as_str().to_string(),
            job_id: job_id(name.as_str(), entity_id),
        }
    }
}
