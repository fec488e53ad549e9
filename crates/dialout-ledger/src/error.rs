//! Error types for the ledger.

/// Errors that can occur during ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// A database operation failed.
    #[error("ledger database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// JSON serialization or deserialization failed.
    #[error("ledger serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A sink or mirror file operation failed.
    #[error("ledger io error: {0}")]
    Io(#[from] std::io::Error),

    /// No session exists for the given id.
    #[error("call session not found: {0}")]
    SessionNotFound(String),
}
