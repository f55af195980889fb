//! Error types for the access-control module.

use thiserror::Error;

/// Errors that can occur while signing, encrypting or decrypting.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The wallet holder declined the signature prompt.
    #[error("signature request rejected: {0}")]
    SigningRejected(String),

    /// The wallet could not be reached or failed to sign.
    #[error("signer unavailable: {0}")]
    SignerUnavailable(String),

    /// A session signature did not verify.
    #[error("invalid session: {0}")]
    InvalidSession(String),

    /// The policy was evaluated and the signer does not satisfy it.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// The policy could not be evaluated.
    #[error("invalid access policy: {0}")]
    InvalidPolicy(String),

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption error, including integrity hash mismatches.
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// Balance lookup failed.
    #[error("balance oracle error: {0}")]
    Oracle(String),

    /// Core error.
    #[error("core error: {0}")]
    Core(#[from] iryshare_core::CoreError),
}

/// Result type for access-control operations.
pub type Result<T> = std::result::Result<T, AccessError>;
