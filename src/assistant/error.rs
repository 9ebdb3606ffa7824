//! Assistant error types

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;

/// Reply for blank input
pub const EMPTY_INPUT_REPLY: &str = "Please type a message so I can help with your campaign.";

/// Reply when the model cannot answer
pub const APOLOGY_REPLY: &str = "Sorry, I'm having trouble responding right now. Please try again in a moment.";

/// Errors from a single assistant turn
#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("Empty user message")]
    EmptyInput,

    #[error("Model call failed: {0}")]
    ModelCall(#[from] LlmError),

    #[error("Model returned no text")]
    EmptyReply,

    #[error("Model call timed out after {0:?}")]
    Timeout(Duration),
}

impl AssistantError {
    /// Canned reply handed to the caller in place of a model answer
    pub fn fallback_reply(&self) -> &'static str {
        match self {
            AssistantError::EmptyInput => EMPTY_INPUT_REPLY,
            AssistantError::ModelCall(_) | AssistantError::EmptyReply | AssistantError::Timeout(_) => APOLOGY_REPLY,
        }
    }

    /// True when the model was contacted (or attempted) and failed
    pub fn is_model_failure(&self) -> bool {
        !matches!(self, AssistantError::EmptyInput)
    }
}
