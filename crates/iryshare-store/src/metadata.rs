//! MetadataStore trait: the abstract interface for file, share and username
//! bookkeeping.
//!
//! Implementations include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;

use iryshare_core::{Address, Locator};

use crate::error::Result;
use crate::records::{FileId, FileRecord, InsertResult, NewFileRecord, Precondition, ShareGrant};

/// Async interface for metadata persistence.
///
/// # Design Notes
///
/// - **Idempotent share inserts**: Inserting an existing `(file, recipient)`
///   grant returns `AlreadyExists`.
/// - **Revisions**: Every locator update bumps `revision`. Passing
///   [`Precondition::Revision`] makes the update fail with `Conflict` if
///   another writer got there first.
/// - **Ordering**: Listings come back in insertion order.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Files
    // ─────────────────────────────────────────────────────────────────────────

    /// Insert a file record, assigning its id.
    async fn insert_file(&self, file: NewFileRecord) -> Result<FileRecord>;

    /// Get a file by id.
    async fn get_file(&self, id: &FileId) -> Result<Option<FileRecord>>;

    /// Files owned by `owner`.
    async fn files_owned_by(&self, owner: &Address) -> Result<Vec<FileRecord>>;

    /// Point a file at a new locator and bump its revision.
    ///
    /// # Returns
    /// - The updated record.
    /// - `NotFound` if the file does not exist.
    /// - `Conflict` if `precondition` names a stale revision.
    async fn update_locator(
        &self,
        id: &FileId,
        locator: &Locator,
        precondition: Precondition,
    ) -> Result<FileRecord>;

    /// Total `size_bytes` over the owner's files.
    async fn storage_usage(&self, owner: &Address) -> Result<u64>;

    // ─────────────────────────────────────────────────────────────────────────
    // Shares
    // ─────────────────────────────────────────────────────────────────────────

    /// Record a share grant.
    async fn insert_share(&self, grant: &ShareGrant) -> Result<InsertResult>;

    /// Grants on a file.
    async fn shares_for(&self, file_id: &FileId) -> Result<Vec<ShareGrant>>;

    /// Files `recipient` holds a grant on.
    async fn files_shared_with(&self, recipient: &Address) -> Result<Vec<FileRecord>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Usernames
    // ─────────────────────────────────────────────────────────────────────────

    /// Bind a username to an address.
    ///
    /// Re-registering the same binding returns `AlreadyExists`; a username
    /// bound to a different address fails with `UsernameTaken`.
    async fn register_username(&self, username: &str, address: &Address) -> Result<InsertResult>;

    /// Look up a username (case-insensitive, leading `@` ignored).
    async fn resolve_username(&self, username: &str) -> Result<Option<Address>>;
}
