//! Completion callbacks to the coordinator.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Callback request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Coordinator answered {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    /// Tell the coordinator that `job_id` is no longer running.
    async fn job_completed(&self, job_id: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct CallbackBody<'a> {
    job_id: &'a str,
}

/// `POST {coordinator}/callback {"job_id": ...}`.
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(coordinator_url: &str, timeout: Duration) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: format!("{}/callback", coordinator_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl CompletionNotifier for HttpNotifier {
    async fn job_completed(&self, job_id: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .json(&CallbackBody { job_id })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        })
    }
}
