use std::io;
use thiserror::Error;

/// Custom error types for apcmetrics
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Unable to parse {key} {value:?}: {reason}")]
    Field {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unable to parse event {line:?}: {reason}")]
    Event { line: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new network error
    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(msg.into())
    }

    /// Creates a new timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Error::Timeout(msg.into())
    }

    /// Creates a new protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Error::Protocol(msg.into())
    }

    /// Creates a new status field decode error
    pub fn field(key: impl Into<String>, value: impl Into<String>, reason: impl ToString) -> Self {
        Error::Field {
            key: key.into(),
            value: value.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new event line decode error
    pub fn event(line: impl Into<String>, reason: impl ToString) -> Self {
        Error::Event {
            line: line.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Whether this error came from talking to the daemon
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            Error::Io(_) | Error::Network(_) | Error::Timeout(_) | Error::Protocol(_)
        )
    }

    /// Whether this error came from interpreting a response
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Field { .. } | Error::Event { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::protocol("short write");
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(err.to_string(), "Protocol error: short write");
    }

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_network());
    }

    #[test]
    fn test_field_error_names_key_and_value() {
        let err = Error::field("TIMELEFT", "12.0 fortnights", "unexpected unit");
        assert!(err.is_decode());
        assert!(!err.is_network());
        assert_eq!(
            err.to_string(),
            "Unable to parse TIMELEFT \"12.0 fortnights\": unexpected unit"
        );
    }
}
