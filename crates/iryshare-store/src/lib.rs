//! # Iryshare Store
//!
//! Storage abstractions for Iryshare. Two kinds of storage sit behind
//! async traits:
//!
//! - [`ContentStore`] - the append-only, content-addressed object store that
//!   holds envelopes. Objects are never mutated; a republish is a new object.
//! - [`MetadataStore`] - the mutable system of record: file records, their
//!   current locator, share grants and usernames.
//!
//! ## Key Types
//!
//! - [`MemoryContentStore`] - In-memory content store for tests
//! - [`HttpContentStore`] - Content store behind an HTTP gateway
//! - [`SqliteMetadataStore`] - SQLite-based persistent metadata
//! - [`MemoryMetadataStore`] - In-memory metadata for tests
//! - [`Precondition`] - Conditional locator updates keyed on `revision`
//!
//! ## Usage
//!
//! ```rust,no_run
//! use iryshare_store::{MetadataStore, SqliteMetadataStore};
//!
//! async fn example() {
//!     // Open a SQLite database
//!     let store = SqliteMetadataStore::open("iryshare.db").unwrap();
//!
//!     // Or use an in-memory database for testing
//!     let store = SqliteMetadataStore::open_memory().unwrap();
//!
//!     // let files = store.files_owned_by(&owner).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent share inserts**: Granting the same recipient twice returns `AlreadyExists`
//! - **Revision tokens**: Locator updates bump `revision`; stale conditional updates return `Conflict`
//! - **Append-only content**: Superseded envelopes stay fetchable at their old locators

pub mod content;
pub mod error;
pub mod http_content;
pub mod memory;
pub mod memory_content;
pub mod metadata;
pub mod migration;
pub mod records;
pub mod sqlite;

pub use content::{tag_value, ContentStore, Tag};
pub use error::{Result, StoreError};
pub use http_content::HttpContentStore;
pub use memory::MemoryMetadataStore;
pub use memory_content::{content_id, MemoryContentStore, DEFAULT_GATEWAY};
pub use metadata::MetadataStore;
pub use records::{
    normalize_username, FileId, FileRecord, InsertResult, NewFileRecord, Precondition, ShareGrant,
};
pub use sqlite::SqliteMetadataStore;
