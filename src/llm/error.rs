//! LLM error types

use std::time::Duration;
use thiserror::Error;

/// Errors from a completion request
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Missing API key: {0}")]
    MissingApiKey(String),
}

impl LlmError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }

    /// Worth another attempt: rate limits, overload, 408/5xx and transport failures
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } | LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::ApiError { status, .. } => matches!(status, 408 | 500..=599),
            LlmError::InvalidResponse(_) | LlmError::Json(_) | LlmError::MissingApiKey(_) => false,
        }
    }

    /// Server-requested wait before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            LlmError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> LlmError {
        LlmError::ApiError {
            status,
            message: String::new(),
        }
    }

    #[test]
    fn test_retryable_classification() {
        for status in [408, 500, 502, 503, 504, 529] {
            assert!(api(status).is_retryable(), "{} should be retried", status);
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!api(status).is_retryable(), "{} should not be retried", status);
        }

        assert!(LlmError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(!LlmError::InvalidResponse("empty".to_string()).is_retryable());
        assert!(!LlmError::MissingApiKey("ANTHROPIC_API_KEY".to_string()).is_retryable());
    }

    #[test]
    fn test_rate_limit_carries_delay() {
        let err = LlmError::RateLimited {
            retry_after: Duration::from_secs(42),
        };
        assert!(err.is_rate_limit());
        assert!(err.is_retryable());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(42)));

        assert!(!api(503).is_rate_limit());
        assert_eq!(api(503).retry_after(), None);
    }
}
