//! Controller kinds and their static dispatch table.
//!
//! Every kind-dependent decision (which cadence a kind predicts on, whether it
//! is retrained nightly, which ancillary folder it owns) is answered by the
//! [`KindSpec`] looked up once per kind. Call sites never match on kind names.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Kind
// ---------------------------------------------------------------------------

/// The closed set of controller kinds managed by the fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Ems,
    PvProductionService,
    PvMonitoringService,
    ConsumptionService,
    SetpointOptimizer,
    HistoryAnomalyDetection,
    StreamAnomalyDetection,
    LoadMonitor,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::Ems,
        EntityKind::PvProductionService,
        EntityKind::PvMonitoringService,
        EntityKind::ConsumptionService,
        EntityKind::SetpointOptimizer,
        EntityKind::HistoryAnomalyDetection,
        EntityKind::StreamAnomalyDetection,
        EntityKind::LoadMonitor,
    ];

    /// Wire tag, used as `holder_type` in job messages and as the catalog `kind` column.
    pub fn as_str(self) -> &'static str {
        self.spec().name
    }

    /// Resolve a wire tag. Returns `None` for unknown tags.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub fn spec(self) -> &'static KindSpec {
        match self {
            EntityKind::Ems => &EMS,
            EntityKind::PvProductionService => &PV_PRODUCTION,
            EntityKind::PvMonitoringService => &PV_MONITORING,
            EntityKind::ConsumptionService => &CONSUMPTION,
            EntityKind::SetpointOptimizer => &SETPOINT_OPTIMIZER,
            EntityKind::HistoryAnomalyDetection => &HISTORY_ANOMALY,
            EntityKind::StreamAnomalyDetection => &STREAM_ANOMALY,
            EntityKind::LoadMonitor => &LOAD_MONITOR,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| CoreError::Validation(format!("Unknown controller kind: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Dispatch table
// ---------------------------------------------------------------------------

/// How often the prediction job of a kind is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cadence {
    EveryMinute,
    EveryFiveMinutes,
    QuarterHourly,
}

/// Static per-kind behaviour.
#[derive(Debug)]
pub struct KindSpec {
    pub name: &'static str,
    pub prediction_cadence: Cadence,
    /// Included in the nightly retrain sweep.
    pub retrains_daily: bool,
    /// Prediction mutates the model slot, so predictions persist it and a
    /// producing model is never retrained from scratch.
    pub updates_model_in_prediction: bool,
    /// Cannot be materialised without a weather site reference.
    pub requires_weather_site: bool,
    /// Runs the quarter-hourly control push.
    pub has_control_job: bool,
    /// Sub-resource folder under the entity prefix, removed by prefix on delete.
    pub ancillary_folder: Option<&'static str>,
}

static EMS: KindSpec = KindSpec {
    name: "ems",
    prediction_cadence: Cadence::EveryFiveMinutes,
    retrains_daily: true,
    updates_model_in_prediction: false,
    requires_weather_site: true,
    has_control_job: true,
    ancillary_folder: None,
};

static PV_PRODUCTION: KindSpec = KindSpec {
    name: "pv_production_service",
    prediction_cadence: Cadence::QuarterHourly,
    retrains_daily: true,
    updates_model_in_prediction: false,
    requires_weather_site: true,
    has_control_job: false,
    ancillary_folder: None,
};

static PV_MONITORING: KindSpec = KindSpec {
    name: "pv_monitoring_service",
    prediction_cadence: Cadence::QuarterHourly,
    retrains_daily: false,
    updates_model_in_prediction: false,
    requires_weather_site: true,
    has_control_job: false,
    ancillary_folder: None,
};

static CONSUMPTION: KindSpec = KindSpec {
    name: "consumption_service",
    prediction_cadence: Cadence::EveryMinute,
    retrains_daily: true,
    updates_model_in_prediction: false,
    requires_weather_site: true,
    has_control_job: false,
    ancillary_folder: None,
};

static SETPOINT_OPTIMIZER: KindSpec = KindSpec {
    name: "setpoint_optimizer",
    prediction_cadence: Cadence::EveryMinute,
    retrains_daily: false,
    updates_model_in_prediction: true,
    requires_weather_site: true,
    has_control_job: false,
    ancillary_folder: Some("setpoint_optimizer"),
};

static HISTORY_ANOMALY: KindSpec = KindSpec {
    name: "history_anomaly_detection",
    prediction_cadence: Cadence::EveryMinute,
    retrains_daily: false,
    updates_model_in_prediction: false,
    requires_weather_site: false,
    has_control_job: false,
    ancillary_folder: None,
};

static STREAM_ANOMALY: KindSpec = KindSpec {
    name: "stream_anomaly_detection",
    prediction_cadence: Cadence::EveryMinute,
    retrains_daily: false,
    updates_model_in_prediction: true,
    requires_weather_site: false,
    has_control_job: false,
    ancillary_folder: None,
};

static LOAD_MONITOR: KindSpec = KindSpec {
    name: "load_monitor",
    prediction_cadence: Cadence::EveryMinute,
    retrains_daily: false,
    updates_model_in_prediction: false,
    requires_weather_site: true,
    has_control_job: false,
    ancillary_folder: None,
};

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Selects which registered entities a scheduled job applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindFilter {
    All,
    PredictsEvery(Cadence),
    RetrainsDaily,
    HasControlJob,
}

impl KindFilter {
    pub fn matches(self, kind: EntityKind) -> bool {
        let spec = kind.spec();
        match self {
            KindFilter::All => true,
            KindFilter::PredictsEvery(cadence) => spec.prediction_cadence == cadence,
            KindFilter::RetrainsDaily => spec.retrains_daily,
            KindFilter::HasControlJob => spec.has_control_job,
        }
    }
}
