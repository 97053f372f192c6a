//! Error types for fitforum

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Identity Errors ===
    #[error("Not signed in: a member identity is required to vote")]
    Unauthenticated,

    // === Forum Errors ===
    #[error("Post not found: {0}")]
    NotFound(String),

    // === Network Errors ===
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout: {0}")]
    Timeout(String),

    #[error("Malformed response: {0}")]
    Decode(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // === Generic ===
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Is this a retryable error?
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Timeout(_) | Error::ConnectionFailed(_) => true,
            Error::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Map a non-success HTTP status to an error
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => Error::Unauthenticated,
            404 => Error::NotFound(message),
            _ => Error::Http { status, message },
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Error::Timeout(e.to_string())
        } else if e.is_decode() {
            Error::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Error::from_status(status.as_u16(), e.to_string())
        } else {
            Error::ConnectionFailed(e.to_string())
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(e: config::ConfigError) -> Self {
        Error::InvalidConfig(e.to_string())
    }
}

// Implement From for common error types
impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Other(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert!(matches!(Error::from_status(401, "x"), Error::Unauthenticated));
        assert!(matches!(Error::from_status(404, "p1"), Error::NotFound(ref id) if id == "p1"));
        assert!(matches!(
            Error::from_status(409, "duplicate vote"),
            Error::Http { status: 409, .. }
        ));
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::Timeout("slow".into()).is_retryable());
        assert!(Error::from_status(503, "busy").is_retryable());
        assert!(!Error::from_status(409, "conflict").is_retryable());
        assert!(!Error::Unauthenticated.is_retryable());
    }
}
