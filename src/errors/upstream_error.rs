//! Transport-level failures raised by the credential refresher, the
//! authenticated executor and the Last.fm client.

use thiserror::Error;

/// A failed call to one of the upstream services.
///
/// `Clone` is required because a single refresh failure is handed to every
/// caller waiting on the same in-flight exchange.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The refresh-token exchange failed. `status` is `None` when no HTTP
    /// response was received at all.
    #[error("token refresh failed{}: {body}", status_suffix(.status))]
    AuthRefresh { status: Option<u16>, body: String },

    /// A product endpoint answered with a non-2xx status.
    #[error("upstream returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The bounded wait for the upstream response elapsed.
    #[error("upstream request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("upstream request failed: {0}")]
    Transport(String),

    /// A 2xx response whose body could not be read as JSON.
    #[error("upstream response is not valid JSON: {0}")]
    Decode(String),

    /// The upstream reported an application-level error inside a 2xx body.
    #[error("upstream rejected the request ({code}): {message}")]
    Rejected { code: i64, message: String },
}

impl UpstreamError {
    pub fn status(&self) -> Option<u16> {
        match self {
            UpstreamError::AuthRefresh { status, .. } => *status,
            UpstreamError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            UpstreamError::AuthRefresh { .. } => "AUTH_REFRESH_FAILED",
            UpstreamError::Status { .. } => "UPSTREAM_ERROR",
            UpstreamError::Timeout { .. } => "UPSTREAM_TIMEOUT",
            UpstreamError::Transport(_) => "UPSTREAM_TRANSPORT",
            UpstreamError::Decode(_) => "UPSTREAM_DECODE",
            UpstreamError::Rejected { .. } => "UPSTREAM_REJECTED",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            UpstreamError::Timeout { .. } | UpstreamError::Transport(_) => true,
            UpstreamError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}
