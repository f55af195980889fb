//! Error types for Iryshare Core.

use thiserror::Error;

/// Errors raised while parsing or validating core data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("invalid address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: &'static str },

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("invalid access policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid locator {input:?}: {reason}")]
    InvalidLocator { input: String, reason: String },

    #[error("invalid object id {0:?}")]
    InvalidObjectId(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
