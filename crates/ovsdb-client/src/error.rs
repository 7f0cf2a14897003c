//! Error types for OVSDB client operations.
//!
//! Every failure in the cache, command builder and executor is reported
//! through [`OvsdbError`]; nothing in this crate panics on bad data.

use thiserror::Error;

/// Result type alias for OVSDB client operations.
pub type Result<T> = std::result::Result<T, OvsdbError>;

/// Errors that can occur while reading the mirror or running transactions.
#[derive(Debug, Error)]
pub enum OvsdbError {
    /// The table is not part of the mirrored schema, or the mirror violates
    /// a schema invariant (e.g. two rows in a singleton table).
    #[error("Schema error for table {table}: {message}")]
    Schema {
        /// The table name.
        table: String,
        /// Error message.
        message: String,
    },

    /// An expected row is absent (usually before the first sync).
    #[error("No row found in {table} table")]
    NotFound {
        /// The table name.
        table: String,
    },

    /// A column is present but has the wrong shape.
    #[error("Unsupported type for {column} column of the {table} table: {message}")]
    TypeMismatch {
        /// The table name.
        table: String,
        /// The column name.
        column: String,
        /// Error message.
        message: String,
    },

    /// The caller passed arguments that can never succeed.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The connection to the database failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The database replied with something that is not valid OVSDB.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The database rejected the transaction; none of its operations applied.
    #[error("Transaction failed at operation {index}: {error}{}", fmt_details(.details))]
    TransactionFailed {
        /// Index of the failing operation (or of the commit, past the end).
        index: usize,
        /// Error tag from the server, e.g. "constraint violation".
        error: String,
        /// Optional human readable details.
        details: Option<String>,
    },

    /// TLS material could not be loaded.
    #[error("TLS error: {0}")]
    Tls(String),
}

fn fmt_details(details: &Option<String>) -> String {
    details
        .as_deref()
        .map(|d| format!(" ({})", d))
        .unwrap_or_default()
}

impl OvsdbError {
    /// Creates a schema error.
    pub fn schema(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Schema {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(table: impl Into<String>) -> Self {
        Self::NotFound {
            table: table.into(),
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            table: table.into(),
            column: column.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OvsdbError::NotFound { .. }
                | OvsdbError::Transport(_)
                | OvsdbError::Protocol(_)
                | OvsdbError::TransactionFailed { .. }
        )
    }
}
