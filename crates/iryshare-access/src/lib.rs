//! # Iryshare Access
//!
//! Wallet sessions and the access-control network.
//!
//! ## Overview
//!
//! Content is never encrypted to a recipient's key directly. Instead the
//! access-control network encrypts it under a policy, and at decrypt time
//! checks the policy against the identity proven by a signed session. A
//! policy can be rewritten later without touching the ciphertext, which is
//! how recipients are added after upload.
//!
//! ## Key Concepts
//!
//! - **Signer**: The wallet that proves an identity by signing a message
//! - **AuthSig**: A signed sign-in message, carried with every network call
//! - **AccessControlNetwork**: Encrypts under a policy, decrypts if satisfied
//! - **BalanceOracle**: Supplies chain balances to balance predicates
//!
//! ## Encryption Model
//!
//! The network derives a content key from its secret and the SHA-256 of the
//! plaintext (`dataToEncryptHash`). The key does not depend on the policy, so
//! an envelope republished with a new policy keeps decrypting. After
//! decryption the plaintext hash is checked against `dataToEncryptHash`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use iryshare_access::{
//!     request_session, AccessControlNetwork, LocalAccessNode, LocalWallet, SessionRequest, Signer,
//! };
//! use iryshare_core::compile_policy;
//!
//! # async fn demo() -> iryshare_access::Result<()> {
//! let node = LocalAccessNode::generate();
//! let wallet = LocalWallet::generate();
//! let request = SessionRequest::new("iryshare", "https://iryshare.app", "Unlock shared files.");
//! let session = request_session(&wallet, &request).await?;
//!
//! let policy = compile_policy(&[], &wallet.address());
//! let sealed = node.encrypt(b"hello", &policy, &session).await?;
//! let plain = node
//!     .decrypt(&sealed.ciphertext, &sealed.data_to_encrypt_hash, &policy, &session)
//!     .await?;
//! assert_eq!(plain, b"hello");
//! # Ok(())
//! # }
//! ```

pub mod crypto;
pub mod error;
pub mod network;
pub mod oracle;
pub mod session;
pub mod wallet;

pub use crypto::{ContentHash, EncryptionKey, NetworkSecret};
pub use error::{AccessError, Result};
pub use network::{AccessControlNetwork, EncryptedData, LocalAccessNode};
pub use oracle::{BalanceOracle, StaticBalances};
pub use session::{address_for_key, AuthSig, SessionRequest, DERIVED_VIA};
pub use wallet::{request_session, LocalWallet, Signer};
