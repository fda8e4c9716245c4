//! Twitter-specific error types.

use thiserror::Error;

/// HTTP status Twitter uses to signal that the client is being rate limited.
pub const RATE_LIMITED_STATUS: u16 = 420;

/// Twitter-specific errors.
#[derive(Error, Debug)]
pub enum TwitterError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A line on the stream was not valid JSON
    #[error("Malformed stream message {line:?}: {source}")]
    Decode {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    /// OAuth signature generation failed
    #[error("OAuth error: {0}")]
    OAuth(String),

    /// Twitter API returned a non-200 status
    #[error("Twitter API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Rate limited (HTTP 420)
    #[error("Rate limited by Twitter (HTTP {status})")]
    RateLimited { status: u16 },

    /// The connection closed without confirming the whole body was received
    #[error("Connection closed with potential data loss")]
    PotentialDataLoss,

    /// Stream transport error
    #[error("Stream error: {0}")]
    Stream(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A request parameter was rejected before sending
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParam { name: String, reason: String },

    /// `start()` called on a service that is already running
    #[error("Stream service is already running")]
    AlreadyRunning,

    /// A stream message did not have the expected shape
    #[error("Unexpected message shape: {0}")]
    MessageShape(String),
}

impl TwitterError {
    /// Build the error for a non-200 streaming response.
    ///
    /// HTTP 420 becomes [`TwitterError::RateLimited`], everything else an
    /// [`TwitterError::Api`] carrying the status code.
    #[must_use]
    pub fn from_status(status: u16) -> Self {
        if status == RATE_LIMITED_STATUS {
            return Self::RateLimited { status };
        }

        let message = reqwest::StatusCode::from_u16(status)
            .ok()
            .and_then(|code| code.canonical_reason())
            .unwrap_or("Unknown status")
            .to_string();

        Self::Api { status, message }
    }

    /// HTTP status code carried by API and rate-limit errors.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } | Self::RateLimited { status } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Check if this is the rate-limit specialisation of an API error.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Check if this error is retryable.
    ///
    /// The stream service retries everything; this is for callers deciding
    /// what to do from a disconnect callback.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_)
            | Self::RateLimited { .. }
            | Self::Stream(_)
            | Self::PotentialDataLoss
            | Self::Decode { .. } => true,
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

/// Result type for Twitter operations.
pub type TwitterResult<T> = Result<T, TwitterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_rate_limited() {
        let err = TwitterError::from_status(420);
        assert!(err.is_rate_limited());
        assert_eq!(err.status_code(), Some(420));
    }

    #[test]
    fn test_from_status_api_error() {
        let err = TwitterError::from_status(503);
        assert!(!err.is_rate_limited());
        assert_eq!(err.status_code(), Some(503));
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "Twitter API error 503: Service Unavailable");
    }

    #[test]
    fn test_client_errors_not_retryable() {
        assert!(!TwitterError::from_status(401).is_retryable());
        assert!(!TwitterError::AlreadyRunning.is_retryable());
        assert_eq!(TwitterError::Config("x".into()).status_code(), None);
    }
}
