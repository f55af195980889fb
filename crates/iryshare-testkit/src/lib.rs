//! # Iryshare Testkit
//!
//! Testing utilities for Iryshare.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden envelopes**: Wire documents with their expected decoding, so the
//!   envelope format stays readable across releases
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Deterministic wallets, misbehaving signers, and a service
//!   harness over in-memory collaborators
//!
//! ## Golden Envelopes
//!
//! ```rust
//! use iryshare_testkit::vectors::{all_envelopes, check_envelope};
//!
//! for vector in all_envelopes() {
//!     check_envelope(&vector).unwrap();
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use iryshare_testkit::fixtures::{wallet, Harness};
//!
//! # async fn demo() -> iryshare::Result<()> {
//! let harness = Harness::new();
//! let alice = wallet(1);
//! let record = harness.upload(&alice, b"hello", &[]).await?;
//! let opened = harness.open(&alice, &record.id).await?;
//! assert_eq!(opened.bytes, b"hello");
//! # Ok(())
//! # }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    members_config, test_config, text_upload, wallet, wallets, DecliningSigner, Harness,
    MemoryIryshare, PendingSigner,
};
pub use vectors::{all_envelopes, check_envelope, verify_all_envelopes, Expected, GoldenEnvelope};
