//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Record or object not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The content store refused or failed an upload.
    #[error("upload failed: {0}")]
    Upload(String),

    /// The content store could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// The gateway answered with an unexpected status.
    #[error("gateway returned {status} for {url}")]
    Http { status: u16, url: String },

    /// Conditional update lost against a newer revision.
    #[error("conflict on file {file_id}: expected revision {expected}, found {actual}")]
    Conflict {
        file_id: String,
        expected: u64,
        actual: u64,
    },

    /// Username already registered to a different address.
    #[error("username {0} is already taken")]
    UsernameTaken(String),

    /// A response or record that does not deserialize.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage or in a request.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] iryshare_core::CoreError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
