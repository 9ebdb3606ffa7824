//! Poller error types

use thiserror::Error;

use super::state::PollPhase;
use super::status::StatusError;

/// Errors that end a poller run
#[derive(Debug, Error)]
pub enum PollError {
    /// No job identifier was stored; nothing to poll
    #[error("No campaign generation job was found. Start a new generation first.")]
    MissingJob,

    /// The attempt budget ran out before the result was ready
    #[error("Job not ready after {attempts} status checks")]
    TimedOut { attempts: u32 },

    /// The backend refused the job or the credentials
    #[error("Status endpoint rejected the job: {0}")]
    Rejected(#[source] StatusError),

    #[error("Failed to set up status client: {0}")]
    Setup(String),
}

impl PollError {
    /// Message suitable for showing to the end user
    pub fn user_message(&self) -> &'static str {
        match self {
            PollError::MissingJob => "No campaign generation job was found. Start a new generation first.",
            PollError::TimedOut { .. } => PollPhase::TimedOut.status_text(),
            PollError::Rejected(_) | PollError::Setup(_) => PollPhase::Errored.status_text(),
        }
    }

    /// Whether the user can retry the same job
    pub fn is_retryable(&self) -> bool {
        matches!(self, PollError::TimedOut { .. })
    }
}
