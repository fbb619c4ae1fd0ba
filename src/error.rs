//! Error types for the persistence layer.
//!
//! This module defines all error types using `thiserror` for ergonomic error
//! handling. Variants carry actionable messages so callers can understand and
//! recover from failure conditions.

use thiserror::Error;

/// A single validation rule failure.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Violation {
    /// Field the rule was declared on.
    pub field: String,
    /// Rule identifier, e.g. "format" or "unique".
    pub rule: String,
    /// Human-readable description of the failure.
    pub message: String,
}

impl Violation {
    pub fn new(
        field: impl Into<String>,
        rule: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            rule: rule.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.field, self.rule, self.message)
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Not connected: cannot {operation} on a closed adapter")]
    NotConnected { operation: String },

    #[error("Connection '{name}' not found: {suggestion}")]
    ConnectionNotFound { name: String, suggestion: String },

    #[error(
        "No config loader registered: call set_config_loader() or initialize with init_database() first"
    )]
    ConfigLoaderNotSet,

    #[error("Integrity violation: {message}")]
    Integrity {
        message: String,
        /// Constraint name or native error code when the driver exposes one.
        constraint: Option<String>,
    },

    #[error("Validation failed with {} violation(s)", violations.len())]
    Validation { violations: Vec<Violation> },

    #[error("Transaction failed: {message}")]
    Transaction {
        message: String,
        /// Set when the rollback itself also failed.
        rollback_error: Option<String>,
        #[source]
        source: Option<Box<StoreError>>,
    },

    #[error("Database error: {message}")]
    Database {
        message: String,
        /// e.g. "42P01" for undefined table
        code: Option<String>,
        suggestion: String,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl StoreError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a not-connected error for the given operation.
    pub fn not_connected(operation: impl Into<String>) -> Self {
        Self::NotConnected {
            operation: operation.into(),
        }
    }

    /// Create a connection-not-found error.
    pub fn connection_not_found(name: impl Into<String>) -> Self {
        Self::ConnectionNotFound {
            name: name.into(),
            suggestion: "call connect() with this name first".to_string(),
        }
    }

    /// Create a connection-not-found error with a custom suggestion.
    pub fn connection_not_found_with(
        name: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::ConnectionNotFound {
            name: name.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an integrity error.
    pub fn integrity(message: impl Into<String>, constraint: Option<String>) -> Self {
        Self::Integrity {
            message: message.into(),
            constraint,
        }
    }

    /// Create an aggregated validation error.
    pub fn validation(violations: Vec<Violation>) -> Self {
        Self::Validation { violations }
    }

    /// Create a transaction error wrapping the callback failure.
    pub fn transaction(
        message: impl Into<String>,
        source: StoreError,
        rollback_error: Option<String>,
    ) -> Self {
        Self::Transaction {
            message: message.into(),
            rollback_error,
            source: Some(Box::new(source)),
        }
    }

    /// Create a database error with optional native code.
    pub fn database(
        message: impl Into<String>,
        code: Option<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::Database {
            message: message.into(),
            code,
            suggestion: suggestion.into(),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::Database { suggestion, .. } => Some(suggestion),
            Self::ConnectionNotFound { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }

    /// The aggregated violations when this is a validation error.
    pub fn violations(&self) -> Option<&[Violation]> {
        match self {
            Self::Validation { violations } => Some(violations),
            _ => None,
        }
    }

    /// Check if this error is retryable. Only connect-phase failures are;
    /// writes are never retried to avoid duplicate side effects.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

/// Convert sqlx errors to StoreError.
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => StoreError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                use sqlx::error::ErrorKind;
                let code = db_err.code().map(|c| c.to_string());
                match db_err.kind() {
                    ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation => StoreError::integrity(db_err.message(), code),
                    _ => StoreError::database(
                        db_err.message(),
                        code,
                        "Check the statement and referenced objects",
                    ),
                }
            }
            sqlx::Error::RowNotFound => StoreError::database(
                "No rows returned",
                None,
                "Verify the query conditions match existing data",
            ),
            sqlx::Error::PoolTimedOut => StoreError::connection(
                "Timed out acquiring a connection from the pool",
                "Increase acquire_timeout_secs or max_connections",
            ),
            sqlx::Error::PoolClosed => {
                StoreError::not_connected("acquire a connection from a closed pool")
            }
            sqlx::Error::Io(io_err) => StoreError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => StoreError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => StoreError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                StoreError::database(format!("Column not found: {}", col), None, col)
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => StoreError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                StoreError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => StoreError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => StoreError::internal("Database worker crashed"),
            _ => StoreError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Convert MongoDB driver errors to StoreError.
impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        // Duplicate key error code across server versions.
        const DUPLICATE_KEY: i32 = 11000;

        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == DUPLICATE_KEY => {
                StoreError::integrity(we.message.clone(), Some(we.code.to_string()))
            }
            ErrorKind::Write(WriteFailure::WriteError(we)) => StoreError::database(
                we.message.clone(),
                Some(we.code.to_string()),
                "Check the document against the collection's constraints",
            ),
            ErrorKind::Command(ce) if ce.code == DUPLICATE_KEY => {
                StoreError::integrity(ce.message.clone(), Some(ce.code.to_string()))
            }
            ErrorKind::Command(ce) => StoreError::database(
                ce.message.clone(),
                Some(ce.code.to_string()),
                "Check the command arguments",
            ),
            ErrorKind::ServerSelection { message, .. } => StoreError::connection(
                message.clone(),
                "Check that the MongoDB server is running and reachable",
            ),
            ErrorKind::Authentication { message, .. } => StoreError::connection(
                message.clone(),
                "Verify the username and password in the connection config",
            ),
            ErrorKind::DnsResolve { message, .. } => StoreError::connection(
                message.clone(),
                "Check the host name in the connection config",
            ),
            ErrorKind::Io(io_err) => StoreError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            ErrorKind::Shutdown => StoreError::not_connected("use a shut-down client"),
            ErrorKind::Transaction { message, .. } => StoreError::database(
                message.clone(),
                None,
                "Transactions require a replica set or sharded cluster",
            ),
            _ => StoreError::database(err.to_string(), None, "Check the MongoDB operation"),
        }
    }
}

/// Result type alias for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;
