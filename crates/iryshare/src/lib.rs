//! # Iryshare
//!
//! Encrypted file sharing between wallet identities, on top of a permanent
//! content store and a policy-based access-control network.
//!
//! ## Overview
//!
//! - **Publish**: Encrypt a file under an access policy and upload it as a
//!   self-describing JSON envelope
//! - **Share**: Publish a new envelope over the same ciphertext with a
//!   widened policy, and move the file's locator to it
//! - **Open**: Fetch an envelope and ask the network to decrypt it for a
//!   signed-in wallet
//!
//! Envelopes are immutable. Adding a recipient never touches the old
//! envelope; it produces a new locator, and the metadata store tracks which
//! locator is current.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bytes::Bytes;
//! use iryshare::access::{LocalAccessNode, LocalWallet, Signer};
//! use iryshare::store::{MemoryContentStore, MemoryMetadataStore};
//! use iryshare::{no_progress, Iryshare, IryshareConfig, UploadRequest};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> iryshare::Result<()> {
//! let service = Iryshare::new(
//!     Arc::new(MemoryContentStore::new()),
//!     Arc::new(LocalAccessNode::generate()),
//!     Arc::new(MemoryMetadataStore::new()),
//!     IryshareConfig::default(),
//! );
//!
//! let alice = LocalWallet::generate();
//! let bob = LocalWallet::generate();
//! service.register_username("bob", &bob.address()).await?;
//!
//! let record = service
//!     .upload_file(
//!         &alice,
//!         UploadRequest {
//!             bytes: Bytes::from_static(b"quarterly report"),
//!             file_name: "report.txt".into(),
//!             content_type: "text/plain".into(),
//!             recipients: vec!["@bob".into()],
//!             encrypt: true,
//!             is_public: false,
//!         },
//!         &no_progress,
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//!
//! let opened = service
//!     .open_file(&bob, &record.id, &no_progress, &CancellationToken::new())
//!     .await?;
//! assert_eq!(opened.bytes, b"quarterly report");
//! # Ok(())
//! # }
//! ```
//!
//! ## Re-exports
//!
//! - `iryshare::core` - Addresses, policies, envelopes and locators
//! - `iryshare::access` - Wallet sessions and the access-control network
//! - `iryshare::store` - Content and metadata stores

pub mod config;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod telemetry;

// Re-export component crates
pub use iryshare_access as access;
pub use iryshare_core as core;
pub use iryshare_store as store;

pub use config::{ConfigError, FetchRetryConfig, IryshareConfig, LogFormat};
pub use error::{IryshareError, Result, SharingError};
pub use pipeline::{no_progress, OpenedFile, Progress, PublishRequest, Sharing};
pub use service::{Iryshare, Recipient, ShareOutcome, UploadRequest};

pub use iryshare_core::{Address, Envelope, Locator, PolicyMode};
pub use iryshare_store::{FileId, FileRecord, ShareGrant};
