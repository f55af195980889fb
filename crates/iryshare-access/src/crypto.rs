//! Cryptographic utilities for the access-control network.
//!
//! Provides content hashing (SHA-256), key derivation (Blake3) and
//! ChaCha20-Poly1305 authenticated encryption.

use base64ct::{Base64, Encoding};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::{AccessError, Result};

const NONCE_LEN: usize = 12;

/// SHA-256 of the plaintext, published as `dataToEncryptHash`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash plaintext bytes.
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Parse a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|e| AccessError::DecryptionError(format!("invalid hash encoding: {e}")))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            AccessError::DecryptionError(format!("invalid hash length: expected 32, got {}", b.len()))
        })?;
        Ok(Self(arr))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// A 256-bit secret held by the access-control network.
#[derive(Clone)]
pub struct NetworkSecret([u8; 32]);

impl NetworkSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the content key for a given plaintext hash.
    ///
    /// The key depends only on the hash, not on the policy, so a republished
    /// envelope with a new policy still decrypts.
    pub fn derive_content_key(&self, hash: &ContentHash) -> EncryptionKey {
        let mut hasher = blake3::Hasher::new_derive_key("iryshare-access-v1 content key");
        hasher.update(&self.0);
        hasher.update(hash.as_bytes());
        EncryptionKey(*hasher.finalize().as_bytes())
    }
}

/// A 256-bit symmetric encryption key for ChaCha20-Poly1305.
#[derive(Clone)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Encrypt under a fresh random nonce and return `base64(nonce || ciphertext)`.
    pub fn seal(&self, plaintext: &[u8]) -> Result<String> {
        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| AccessError::EncryptionError(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| AccessError::EncryptionError(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(Base64::encode_string(&sealed))
    }

    /// Reverse of [`seal`](Self::seal).
    pub fn open(&self, sealed: &str) -> Result<Vec<u8>> {
        let raw = Base64::decode_vec(sealed)
            .map_err(|e| AccessError::DecryptionError(format!("invalid ciphertext encoding: {e}")))?;
        if raw.len() < NONCE_LEN {
            return Err(AccessError::DecryptionError(
                "ciphertext shorter than nonce".to_string(),
            ));
        }
        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);

        let cipher = ChaCha20Poly1305::new_from_slice(&self.0)
            .map_err(|e| AccessError::DecryptionError(e.to_string()))?;
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AccessError::DecryptionError("integrity check failed".to_string()))
    }
}
