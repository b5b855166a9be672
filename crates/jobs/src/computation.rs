//! Seam to the numeric computation service.
//!
//! Training, forecasting and optimisation run elsewhere; job bodies only send
//! the entity and apply what comes back.

use std::time::Duration;

use async_trait::async_trait;
use mpc_core::entity::Entity;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ComputationError {
    /// The service refused the input (missing data, implausible values).
    #[error("Input rejected: {0}")]
    Rejected(String),

    #[error("Computation failed: {0}")]
    Failed(String),

    #[error("Computation service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainOutput {
    pub parameters: serde_json::Value,
    #[serde(default)]
    pub specific: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictOutput {
    /// Updated model parameters, for kinds that learn while predicting.
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    pub specific: serde_json::Value,
    /// Non-fatal problem the prediction worked around.
    #[serde(default)]
    pub warning: Option<String>,
}

#[async_trait]
pub trait Computation: Send + Sync {
    async fn train(&self, entity: &Entity, retrain: bool) -> Result<TrainOutput, ComputationError>;

    async fn predict(&self, entity: &Entity) -> Result<PredictOutput, ComputationError>;

    /// Send the alternating liveness bit to the controlled site.
    async fn heartbeat(&self, entity: &Entity, beat: bool) -> Result<(), ComputationError>;

    /// Push the current control schedule to the controlled site.
    async fn control(&self, entity: &Entity) -> Result<(), ComputationError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Computation service client configuration.
#[derive(Debug, Clone)]
pub struct ComputationConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl ComputationConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `COMPUTATION_URL`          | `http://localhost:8500` |
    /// | `COMPUTATION_TIMEOUT_SECS` | `1800`                  |
    pub fn from_env() -> Self {
        let timeout_secs: u64 = std::env::var("COMPUTATION_TIMEOUT_SECS")
            .unwrap_or_else(|_| "1800".into())
            .parse()
            .expect("COMPUTATION_TIMEOUT_SECS must be a valid u64");

        Self {
            base_url: std::env::var("COMPUTATION_URL")
                .unwrap_or_else(|_| "http://localhost:8500".into()),
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

#[derive(Serialize)]
struct ComputationRequest<'a> {
    entity: &'a Entity,
    #[serde(skip_serializing_if = "Option::is_none")]
    retrain: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    beat: Option<bool>,
}

/// Reaches the computation service over HTTP: `POST {base}/{operation}` with
/// the entity as JSON. `422` means the input was rejected.
pub struct RemoteComputation {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteComputation {
    pub fn new(config: &ComputationConfig) -> Result<Self, ComputationError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn call(
        &self,
        operation: &str,
        request: &ComputationRequest<'_>,
    ) -> Result<reqwest::Response, ComputationError> {
        let url = format!("{}/{operation}", self.base_url);
        let response = self.client.post(&url).json(request).send().await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            Err(ComputationError::Rejected(body))
        } else {
            Err(ComputationError::Failed(format!("{operation} returned {status}: {body}")))
        }
    }
}

#[async_trait]
impl Computation for RemoteComputation {
    async fn train(&self, entity: &Entity, retrain: bool) -> Result<TrainOutput, ComputationError> {
        let request = ComputationRequest {
            entity,
            retrain: Some(retrain),
            beat: None,
        };
        Ok(self.call("train", &request).await?.json().await?)
    }

    async fn predict(&self, entity: &Entity) -> Result<PredictOutput, ComputationError> {
        let request = ComputationRequest {
            entity,
            retrain: None,
            beat: None,
        };
        Ok(self.call("predict", &request).await?.json().await?)
    }

    async fn heartbeat(&self, entity: &Entity, beat: bool) -> Result<(), ComputationError> {
        let request = ComputationRequest {
            entity,
            retrain: None,
            beat: Some(beat),
        };
        self.call("heartbeat", &request).await?;
        Ok(())
    }

    async fn control(&self, entity: &Entity) -> Result<(), ComputationError> {
        let request = ComputationRequest {
            entity,
            retrain: None,
            beat: None,
        };
        self.call("control", &request).await?;
        Ok(())
    }
}
