//! # Error Handling Module
//!
//! Provides structured error types for Bazaar data operations.
//! Every error carries a machine-readable code that is logged alongside the message.

use thiserror::Error;

/// Result type alias for Bazaar data operations
pub type BazaarResult<T> = Result<T, BazaarError>;

/// Comprehensive error type for all Bazaar data operations
#[derive(Error, Debug)]
pub enum BazaarError {
    /// Local database connection or query errors
    #[error("Database error: {0}")]
    Database(String),

    /// JSON parsing or serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid table or column name
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// A document failed schema validation
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Invalid payload structure (fixtures, raw writes)
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Unique index violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Record or collection not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backend reports that a column does not exist
    #[error("Column {table}.{column} does not exist")]
    UndefinedColumn { table: String, column: String },

    /// Error reported by the remote backend
    #[error("Remote error ({status}){}: {message}", code.as_deref().map(|c| format!(" [{c}]")).unwrap_or_default())]
    Remote {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Transport failure talking to the remote backend
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl BazaarError {
    /// Returns a machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            BazaarError::Database(_) => "DATABASE_ERROR",
            BazaarError::Json(_) => "JSON_ERROR",
            BazaarError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            BazaarError::Validation(_) => "VALIDATION_ERROR",
            BazaarError::InvalidPayload(_) => "INVALID_PAYLOAD",
            BazaarError::Conflict(_) => "CONFLICT",
            BazaarError::NotFound(_) => "NOT_FOUND",
            BazaarError::UndefinedColumn { .. } => "UNDEFINED_COLUMN",
            BazaarError::Remote { .. } => "REMOTE_ERROR",
            BazaarError::Http(_) => "HTTP_ERROR",
            BazaarError::Config(_) => "CONFIG_ERROR",
            BazaarError::Io(_) => "IO_ERROR",
            BazaarError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        BazaarError::NotFound(msg.into())
    }
}

/// Convert rusqlite errors, lifting unique violations into `Conflict`
impl From<rusqlite::Error> for BazaarError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
            {
                BazaarError::Conflict(err.to_string())
            }
            _ => BazaarError::Database(err.to_string()),
        }
    }
}

/// Convert tokio-rusqlite errors to BazaarError
impl From<tokio_rusqlite::Error> for BazaarError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => e.into(),
            other => BazaarError::Database(other.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for BazaarError {
    fn from(err: validator::ValidationErrors) -> Self {
        BazaarError::Validation(err.to_string())
    }
}
