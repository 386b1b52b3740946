use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
    Stream,
    /// The backend answered but reported an error.
    Business,
    Decode,
    Cancelled,
}

impl FailureKind {
    /// Transport failures leave the outcome of a request unknown.
    pub fn is_transport(self) -> bool {
        matches!(
            self,
            FailureKind::Timeout | FailureKind::Network | FailureKind::Stream
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Stream => write!(f, "stream error"),
            FailureKind::Business => write!(f, "backend error"),
            FailureKind::Decode => write!(f, "decode error"),
            FailureKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    /// Non-success HTTP status. `message` is the backend's `error` field
    /// when it sent one.
    #[error("{message}")]
    HttpStatus { status: u16, message: String },
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("{0}")]
    Business(String),
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("cancelled")]
    Cancelled,
}

impl ClientError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ClientError::InvalidUrl(_) => FailureKind::InvalidUrl,
            ClientError::HttpStatus { status, .. } => FailureKind::HttpStatus(*status),
            ClientError::Timeout(_) => FailureKind::Timeout,
            ClientError::Network(_) => FailureKind::Network,
            ClientError::Stream(_) => FailureKind::Stream,
            ClientError::Business(_) => FailureKind::Business,
            ClientError::Decode(_) => FailureKind::Decode,
            ClientError::Cancelled => FailureKind::Cancelled,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return ClientError::Timeout(err.to_string());
        }
        if err.is_decode() {
            return ClientError::Decode(err.to_string());
        }
        ClientError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}
