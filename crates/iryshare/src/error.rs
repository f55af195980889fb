//! Error types for Iryshare.

use iryshare_core::Address;
use iryshare_store::{FileId, StoreError};
use thiserror::Error;

use crate::config::ConfigError;

/// Failures of the publish, republish and open pipelines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SharingError {
    /// The network could not encrypt, or the signer was unavailable.
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// The content store did not accept the envelope.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// Nothing could be fetched at the locator.
    #[error("envelope not found: {0}")]
    EnvelopeNotFound(String),

    /// The fetched object is not a valid envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// The network evaluated the policy and refused the session.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Decryption or integrity verification failed.
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// The wallet holder declined to sign.
    #[error("signing rejected: {0}")]
    SigningRejected(String),

    /// A republish named someone other than the envelope's owner.
    #[error("envelope is owned by {recorded}, not {claimed}")]
    OwnerMismatch { recorded: Address, claimed: Address },

    /// The caller gave up while waiting for the signature.
    #[error("cancelled while waiting for a signature")]
    Cancelled,
}

/// Errors that can occur during Iryshare operations.
#[derive(Debug, Error)]
pub enum IryshareError {
    /// Pipeline error.
    #[error(transparent)]
    Sharing(#[from] SharingError),

    /// Metadata or content store error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No file record with this id.
    #[error("file not found: {0}")]
    FileNotFound(FileId),

    /// Only the owner may share a file.
    #[error("{caller} does not own file {file_id}")]
    NotOwner { file_id: FileId, caller: Address },

    /// A `@username` reference that is not registered.
    #[error("unknown recipient: {0}")]
    UnknownRecipient(String),

    /// A recipient reference that looks like an address but is not one.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The upload would take the owner past the storage quota.
    #[error("storage quota exceeded: {used} bytes used + {requested} requested > {quota} allowed")]
    QuotaExceeded { used: u64, requested: u64, quota: u64 },

    /// Another share updated the file first.
    #[error("file {file_id} changed concurrently: expected revision {expected}, found {actual}")]
    Conflict {
        file_id: String,
        expected: u64,
        actual: u64,
    },
}

impl IryshareError {
    /// Lift a store error, surfacing revision conflicts as [`IryshareError::Conflict`].
    pub(crate) fn from_store(err: StoreError) -> Self {
        match err {
            StoreError::Conflict {
                file_id,
                expected,
                actual,
            } => IryshareError::Conflict {
                file_id,
                expected,
                actual,
            },
            other => IryshareError::Store(other),
        }
    }
}

/// Result type for Iryshare operations.
pub type Result<T> = std::result::Result<T, IryshareError>;
