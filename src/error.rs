//! Error types for PostVault
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using VaultError
pub type Result<T> = std::result::Result<T, VaultError>;

/// Unified error type for PostVault operations
#[derive(Debug, Error)]
pub enum VaultError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Protocol Errors (answered with 400 before the connection is closed)
    // -------------------------------------------------------------------------
    #[error("Line exceeds {limit} bytes")]
    LineTooLong { limit: usize },

    #[error("More than {limit} header lines")]
    TooManyHeaders { limit: usize },

    #[error("Malformed request line: {0:?}")]
    MalformedRequestLine(String),

    #[error("Malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error("Missing or unexpected Host header: {0:?}")]
    HostMismatch(Option<String>),

    #[error("Invalid Content-Length: {0:?}")]
    InvalidContentLength(String),

    #[error("Body of {length} bytes exceeds limit of {limit}")]
    BodyTooLarge { length: usize, limit: usize },

    #[error("Body truncated: expected {expected} bytes, got {received}")]
    BodyTruncated { expected: usize, received: usize },

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Document journal corruption detected: {0}")]
    JournalCorruption(String),

    #[error("Duplicate key in {collection}: {key}")]
    DuplicateKey { collection: String, key: String },

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Scheduler Errors
    // -------------------------------------------------------------------------
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Handle {token} already has a {direction} waiter")]
    WaiterConflict { token: usize, direction: &'static str },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl VaultError {
    /// Whether this error came from malformed or hostile client input
    /// on the wire, as opposed to a server-side failure.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            VaultError::LineTooLong { .. }
                | VaultError::TooManyHeaders { .. }
                | VaultError::MalformedRequestLine(_)
                | VaultError::MalformedHeader(_)
                | VaultError::HostMismatch(_)
                | VaultError::InvalidContentLength(_)
                | VaultError::BodyTooLarge { .. }
                | VaultError::BodyTruncated { .. }
        )
    }
}
