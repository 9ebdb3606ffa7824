//! Job status endpoint client

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Opaque identifier of a generation job
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    /// Parse a stored identifier; blank values are treated as absent
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() { None } else { Some(Self(trimmed.to_string())) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Body of `GET /jobs/{jobId}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job_id: String,
    #[serde(default)]
    pub result_ready: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

/// Errors from a single status check
#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Status endpoint returned {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Job {0} not found")]
    NotFound(String),

    #[error("Not authorized to read job status ({0})")]
    Unauthorized(u16),

    #[error("Status check timed out after {0:?}")]
    Timeout(Duration),
}

impl StatusError {
    /// Fatal errors end the run; everything else is retried on the next tick
    pub fn is_fatal(&self) -> bool {
        matches!(self, StatusError::NotFound(_) | StatusError::Unauthorized(_))
    }
}

/// Source of job readiness reports
#[async_trait]
pub trait JobStatusSource: Send + Sync {
    /// Query the current status of `job_id`
    async fn check(&self, job_id: &JobId, auth_token: Option<&str>) -> Result<JobStatus, StatusError>;
}

/// `JobStatusSource` backed by the generation backend's HTTP API
pub struct HttpJobStatusSource {
    base_url: String,
    http: Client,
    timeout: Duration,
}

impl HttpJobStatusSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StatusError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(%base_url, ?timeout, "HttpJobStatusSource::new: called");
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url,
            http,
            timeout,
        })
    }

    fn job_url(&self, job_id: &JobId) -> String {
        format!("{}/jobs/{}", self.base_url, job_id)
    }
}

#[async_trait]
impl JobStatusSource for HttpJobStatusSource {
    async fn check(&self, job_id: &JobId, auth_token: Option<&str>) -> Result<JobStatus, StatusError> {
        debug!(%job_id, has_token = auth_token.is_some(), "HttpJobStatusSource::check: called");
        let mut request = self.http.get(self.job_url(job_id));
        if let Some(token) = auth_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                StatusError::Timeout(self.timeout)
            } else {
                StatusError::Transport(e)
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StatusError::NotFound(job_id.to_string())),
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Err(StatusError::Unauthorized(status.as_u16()))
            }
            status if !status.is_success() => {
                let message = response.text().await.unwrap_or_default();
                Err(StatusError::Http {
                    status: status.as_u16(),
                    message,
                })
            }
            _ => {
                let status: JobStatus = response.json().await?;
                debug!(%job_id, result_ready = status.result_ready, "HttpJobStatusSource::check: decoded");
                Ok(status)
            }
        }
    }
}
