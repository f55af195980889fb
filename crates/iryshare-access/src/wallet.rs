//! Wallet signers.
//!
//! A [`Signer`] is whatever holds the user's key: a browser wallet behind a
//! prompt, a hardware device, or the in-process [`LocalWallet`]. Signing is an
//! interactive step for real wallets and may never complete; callers decide
//! how long to wait.

use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};

use iryshare_core::Address;

use crate::error::Result;
use crate::session::{address_for_key, AuthSig, SessionRequest, DERIVED_VIA};

/// The wallet/signing provider.
#[async_trait]
pub trait Signer: Send + Sync {
    /// The address this signer signs as.
    fn address(&self) -> Address;

    /// Sign a message.
    ///
    /// Fails with [`AccessError::SigningRejected`](crate::AccessError::SigningRejected)
    /// when the holder declines.
    async fn sign_message(&self, message: &str) -> Result<AuthSig>;
}

/// Ask `signer` to sign a session message for `request`.
pub async fn request_session(signer: &dyn Signer, request: &SessionRequest) -> Result<AuthSig> {
    let message = request.message(&signer.address());
    signer.sign_message(&message).await
}

/// An Ed25519 key held in process.
pub struct LocalWallet {
    key: SigningKey,
    address: Address,
}

impl LocalWallet {
    /// Generate a new random wallet.
    pub fn generate() -> Self {
        Self::from_key(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    /// Create a deterministic wallet from seed bytes.
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self::from_key(SigningKey::from_bytes(&seed))
    }

    fn from_key(key: SigningKey) -> Self {
        let address = address_for_key(&key.verifying_key());
        Self { key, address }
    }

    /// Hex-encoded verifying key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.key.verifying_key().as_bytes())
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Signer for LocalWallet {
    fn address(&self) -> Address {
        self.address.clone()
    }

    async fn sign_message(&self, message: &str) -> Result<AuthSig> {
        let signature = self.key.sign(message.as_bytes());
        Ok(AuthSig {
            sig: hex::encode(signature.to_bytes()),
            derived_via: DERIVED_VIA.to_string(),
            signed_message: message.to_string(),
            address: self.address.clone(),
            public_key: self.public_key_hex(),
        })
    }
}
