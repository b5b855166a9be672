//! Operational status of a controller.
//!
//! The common part (`ready`, `error`, `status`, `training`) is small and
//! written on almost every job; the kind-specific part is an opaque payload
//! persisted separately so that frequent status writes stay cheap.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

/// Readiness of a controller's model. Serialised as `0`, `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Readiness {
    Untrained = 0,
    Trained = 1,
    Producing = 2,
}

impl From<Readiness> for u8 {
    fn from(r: Readiness) -> u8 {
        r as u8
    }
}

impl TryFrom<u8> for Readiness {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Readiness::Untrained),
            1 => Ok(Readiness::Trained),
            2 => Ok(Readiness::Producing),
            other => Err(format!("invalid readiness level {other}")),
        }
    }
}

/// Severity of the last recorded problem. Serialised as `0`, `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ErrorLevel {
    None = 0,
    Warning = 1,
    Error = 2,
}

impl From<ErrorLevel> for u8 {
    fn from(e: ErrorLevel) -> u8 {
        e as u8
    }
}

impl TryFrom<u8> for ErrorLevel {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, <Self as TryFrom<u8>>::Error> {
        match v {
            0 => Ok(ErrorLevel::None),
            1 => Ok(ErrorLevel::Warning),
            2 => Ok(ErrorLevel::Error),
            other => Err(format!("invalid error level {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonStatus {
    pub ready: Readiness,
    pub error: ErrorLevel,
    pub status: String,
    pub training: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub common: CommonStatus,
    /// Kind-specific payload, opaque to the orchestration layer.
    pub specific: serde_json::Value,
}

impl Status {
    /// State of a freshly created controller: queued for its first training,
    /// flagged as a warning until a training run succeeds.
    pub fn initial() -> Self {
        Self {
            common: CommonStatus {
                ready: Readiness::Untrained,
                error: ErrorLevel::Warning,
                status: "training".to_string(),
                training: true,
            },
            specific: serde_json::Value::Object(Default::default()),
        }
    }

    pub fn apply(&mut self, update: StatusUpdate) {
        let StatusUpdate {
            status,
            error,
            ready,
            training,
        } = update;
        if let Some(status) = status {
            self.common.status = status;
        }
        if let Some(error) = error {
            self.common.error = error;
        }
        if let Some(ready) = ready {
            self.common.ready = ready;
        }
        if let Some(training) = training {
            self.common.training = training;
        }
    }
}

/// Partial status change. Fields left as `None` are unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: Option<String>,
    pub error: Option<ErrorLevel>,
    pub ready: Option<Readiness>,
    pub training: Option<bool>,
}

impl StatusUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn error(mut self, error: ErrorLevel) -> Self {
        self.error = Some(error);
        self
    }

    pub fn ready(mut self, ready: Readiness) -> Self {
        self.ready = Some(ready);
        self
    }

    pub fn training(mut self, training: bool) -> Self {
        self.training = Some(training);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_serialise_as_integers() {
        let common = CommonStatus {
            ready: Readiness::Producing,
            error: ErrorLevel::Warning,
            status: "running".into(),
            training: false,
        };
        let json = serde_json::to_value(&common).unwrap();
        assert_eq!(json["ready"], 2);
        assert_eq!(json["error"], 1);
    }

    #[test]
    fn out_of_range_level_is_rejected() {
        let raw = r#"{"ready":3,"error":0,"status":"","training":false}"#;
        assert!(serde_json::from_str::<CommonStatus>(raw).is_err());
    }

    #[test]
    fn initial_status_waits_for_training() {
        let status = Status::initial();
        assert_eq!(status.common.ready, Readiness::Untrained);
        assert_eq!(status.common.error, ErrorLevel::Warning);
        assert!(status.common.training);
    }

    #[test]
    fn update_leaves_unset_fields_alone() {
        let mut status = Status::initial();
        status.apply(StatusUpdate::new().ready(Readiness::Trained).training(false));
        assert_eq!(status.common.ready, Readiness::Trained);
        assert!(!status.common.training);
        assert_eq!(status.common.status, "training");
        assert_eq!(status.common.error, ErrorLevel::Warning);
    }
}
