//! Error types for the external completion call.

use std::time::Duration;

use thiserror::Error;

/// Failures talking to the completion API.
#[derive(Debug, Error)]
pub enum ExternalCallError {
    /// Transport-level failure.
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// HTTP client could not be configured.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// Non-success status other than rate limiting.
    #[error("completion API returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// HTTP 429, with the server's `retry-after` hint when present.
    #[error("Rate limit exceeded, retry after {0:?} seconds")]
    RateLimited(Option<u64>),

    /// The call did not finish within the configured deadline.
    #[error("completion call timed out after {0:?}")]
    Timeout(Duration),

    /// The response body could not be decoded.
    #[error("malformed completion response: {0}")]
    Malformed(String),
}

impl ExternalCallError {
    /// Check if this error is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_) | Self::RateLimited(_) => true,
            Self::HttpRequest(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::Status { status, .. } => *status >= 500,
            Self::HttpClient(_) | Self::Malformed(_) => false,
        }
    }

    /// Server-mandated delay before retrying, if any.
    #[must_use]
    pub const fn retry_delay(&self) -> Option<Duration> {
        match self {
            Self::RateLimited(Some(seconds)) => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }

    /// Whether the upstream is temporarily unavailable rather than broken.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited(_) | Self::Timeout(_) | Self::Status { status: 503 | 529, .. }
        )
    }
}

/// Convenience result alias for completion calls.
pub type ExternalCallResult<T> = Result<T, ExternalCallError>;
