//! Session signatures.
//!
//! Every call to the access-control network carries an [`AuthSig`]: a
//! sign-in message naming the wallet address, signed by that wallet. The
//! network verifies it and treats `address` as the authenticated identity
//! when evaluating policies.

use chrono::{DateTime, SecondsFormat, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use iryshare_core::Address;

use crate::error::{AccessError, Result};

/// Value of `derivedVia` for signatures produced by [`LocalWallet`](crate::LocalWallet).
pub const DERIVED_VIA: &str = "iryshare.ed25519";

/// A signed session proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSig {
    /// Hex-encoded signature over `signed_message`.
    pub sig: String,
    pub derived_via: String,
    pub signed_message: String,
    pub address: Address,
    /// Hex-encoded verifying key.
    pub public_key: String,
}

impl AuthSig {
    /// Check the signature and that it binds `address`.
    ///
    /// The `Issued At` line is not checked: a session never expires, so a
    /// captured one can be replayed for as long as its signer is admitted.
    pub fn verify(&self) -> Result<()> {
        let invalid = |msg: String| AccessError::InvalidSession(msg);

        if self.derived_via != DERIVED_VIA {
            return Err(invalid(format!("unsupported derivation {:?}", self.derived_via)));
        }

        let key_bytes: [u8; 32] = hex::decode(&self.public_key)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| invalid("malformed public key".to_string()))?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|_| invalid("malformed public key".to_string()))?;

        if address_for_key(&key) != self.address {
            return Err(invalid("address does not match signing key".to_string()));
        }
        if message_address(&self.signed_message) != Some(self.address.as_str()) {
            return Err(invalid("signed message does not name the address".to_string()));
        }

        let sig_bytes: [u8; 64] = hex::decode(&self.sig)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| invalid("malformed signature".to_string()))?;
        key.verify(self.signed_message.as_bytes(), &Signature::from_bytes(&sig_bytes))
            .map_err(|_| invalid("signature does not verify".to_string()))
    }
}

/// Derive the wallet address for a verifying key: the first 20 bytes of its
/// Blake3 hash.
pub fn address_for_key(key: &VerifyingKey) -> Address {
    let hash = blake3::hash(key.as_bytes());
    let mut account = [0u8; 20];
    account.copy_from_slice(&hash.as_bytes()[..20]);
    Address::from_bytes(&account)
}

/// The address line of a sign-in message (its second line).
fn message_address(message: &str) -> Option<&str> {
    message.lines().nth(1).map(str::trim)
}

/// Parameters of a sign-in message.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub domain: String,
    pub uri: String,
    pub statement: String,
    pub issued_at: DateTime<Utc>,
}

impl SessionRequest {
    /// A request issued now.
    pub fn new(domain: impl Into<String>, uri: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            uri: uri.into(),
            statement: statement.into(),
            issued_at: Utc::now(),
        }
    }

    /// Render the message the wallet is asked to sign.
    pub fn message(&self, address: &Address) -> String {
        format!(
            "{domain} wants you to sign in with your wallet:\n{address}\n\n{statement}\n\nURI: {uri}\nIssued At: {issued}",
            domain = self.domain,
            statement = self.statement,
            uri = self.uri,
            issued = self.issued_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::{LocalWallet, Signer};

    fn request() -> SessionRequest {
        SessionRequest::new("iryshare", "https://iryshare.app", "Unlock shared files.")
    }

    #[tokio::test]
    async fn test_signed_session_verifies() {
        let wallet = LocalWallet::from_seed([1u8; 32]);
        let session = wallet.sign_message(&request().message(&wallet.address())).await.unwrap();

        assert_eq!(session.address, wallet.address());
        session.verify().unwrap();
    }

    #[tokio::test]
    async fn test_tampered_message_fails() {
        let wallet = LocalWallet::from_seed([1u8; 32]);
        let mut session = wallet.sign_message(&request().message(&wallet.address())).await.unwrap();
        session.signed_message.push_str("\nextra");

        assert!(matches!(session.verify(), Err(AccessError::InvalidSession(_))));
    }

    #[tokio::test]
    async fn test_claimed_address_must_match_key() {
        let wallet = LocalWallet::from_seed([1u8; 32]);
        let other = LocalWallet::from_seed([2u8; 32]);

        // Sign a message naming someone else, then claim to be them.
        let mut session = wallet.sign_message(&request().message(&other.address())).await.unwrap();
        session.address = other.address();

        assert!(session.verify().is_err());
    }

    #[tokio::test]
    async fn test_message_must_name_signer() {
        let wallet = LocalWallet::from_seed([1u8; 32]);
        let other = LocalWallet::from_seed([2u8; 32]);
        let session = wallet.sign_message(&request().message(&other.address())).await.unwrap();

        assert!(session.verify().is_err());
    }

    #[tokio::test]
    async fn test_old_session_still_verifies() {
        let wallet = LocalWallet::from_seed([1u8; 32]);
        let mut stale = request();
        stale.issued_at = Utc::now() - chrono::Duration::days(365);
        let session = wallet.sign_message(&stale.message(&wallet.address())).await.unwrap();

        session.verify().unwrap();
    }

    #[test]
    fn test_message_layout() {
        let address = Address::parse("0xaaa").unwrap();
        let msg = request().message(&address);

        assert!(msg.starts_with("iryshare wants you to sign in with your wallet:\n0xaaa\n"));
        assert_eq!(message_address(&msg), Some("0xaaa"));
        assert!(msg.contains("URI: https://iryshare.app"));
    }
}
