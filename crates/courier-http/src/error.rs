//! Error types for HTTP dispatch.

use std::time::Duration;

use crate::response::ResponseError;

/// Message carried by [`HttpError::RetryLimitExceeded`].
pub const RETRY_LIMIT_MESSAGE: &str = "Retry limit has been exceeded. Try again later.";

/// Failure of a single transport attempt.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),

    #[error("request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("server error: {status}")]
    ServerError { status: u16, body: String },

    #[error("client error: {status}")]
    ClientError { status: u16, body: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("transport failure: {0}")]
    Other(String),
}

impl TransportError {
    /// HTTP status behind the error, when there was a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::ServerError { status, .. } | TransportError::ClientError { status, .. } => {
                Some(*status)
            }
            TransportError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Request(e)
        }
    }
}

/// Terminal error delivered for one logical send.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The only (or final, under `NoRetry`) attempt failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Every attempt permitted by a `RetryUpTo` policy failed.
    #[error("Retry limit has been exceeded. Try again later.")]
    RetryLimitExceeded { attempts: u32 },

    /// The body arrived but was not the structure the caller expected.
    #[error(transparent)]
    Parse(#[from] ResponseError),
}

impl HttpError {
    /// Whether retries were exhausted.
    pub fn is_retry_limit(&self) -> bool {
        matches!(self, HttpError::RetryLimitExceeded { .. })
    }
}
