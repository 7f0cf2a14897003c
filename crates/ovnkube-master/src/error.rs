//! Error types for ovnkube-master

use ovsdb_client::OvsdbError;
use thiserror::Error;

/// Master controller errors
#[derive(Error, Debug)]
pub enum MasterError {
    /// Database access error
    #[error(transparent)]
    Ovsdb(#[from] OvsdbError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MasterError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if retrying the same call later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            MasterError::Ovsdb(e) => e.is_retryable(),
            MasterError::Io(_) => true,
            MasterError::Config(_) | MasterError::Metrics(_) => false,
        }
    }
}

/// Result type for ovnkube-master operations
pub type Result<T> = std::result::Result<T, MasterError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ovsdb_error_is_transparent() {
        let err: MasterError = OvsdbError::not_found("NB_Global").into();
        assert_eq!(err.to_string(), "No row found in NB_Global table");
        assert!(err.is_retryable());
    }

    #[test]
    fn test_config_error() {
        let err = MasterError::config("period_secs must be > 0");
        assert_eq!(err.to_string(), "Configuration error: period_secs must be > 0");
        assert!(!err.is_retryable());
    }
}
