//! In-memory implementation of the MetadataStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use iryshare_core::{Address, Locator};

use crate::error::{Result, StoreError};
use crate::metadata::MetadataStore;
use crate::records::{
    normalize_username, now, FileId, FileRecord, InsertResult, NewFileRecord, Precondition,
    ShareGrant,
};

/// In-memory metadata store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryMetadataStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    /// Files indexed by id.
    files: HashMap<FileId, FileRecord>,

    /// Insertion order of files.
    file_order: Vec<FileId>,

    /// Grants in insertion order.
    shares: Vec<ShareGrant>,

    /// username -> address.
    usernames: HashMap<String, Address>,
}

impl Inner {
    fn ordered_files(&self) -> impl Iterator<Item = &FileRecord> {
        self.file_order.iter().filter_map(|id| self.files.get(id))
    }
}

impl MemoryMetadataStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn insert_file(&self, file: NewFileRecord) -> Result<FileRecord> {
        let record = file.into_record(now());
        let mut inner = self.inner.write().unwrap();
        inner.file_order.push(record.id);
        inner.files.insert(record.id, record.clone());
        Ok(record)
    }

    async fn get_file(&self, id: &FileId) -> Result<Option<FileRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner.files.get(id).cloned())
    }

    async fn files_owned_by(&self, owner: &Address) -> Result<Vec<FileRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .ordered_files()
            .filter(|f| &f.owner == owner)
            .cloned()
            .collect())
    }

    async fn update_locator(
        &self,
        id: &FileId,
        locator: &Locator,
        precondition: Precondition,
    ) -> Result<FileRecord> {
        let mut inner = self.inner.write().unwrap();
        let record = inner
            .files
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("file {id}")))?;

        precondition.check(id, record.revision)?;

        record.locator = locator.clone();
        record.revision += 1;
        record.updated_at = now();
        Ok(record.clone())
    }

    async fn storage_usage(&self, owner: &Address) -> Result<u64> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .files
            .values()
            .filter(|f| &f.owner == owner)
            .map(|f| f.size_bytes)
            .sum())
    }

    async fn insert_share(&self, grant: &ShareGrant) -> Result<InsertResult> {
        let mut inner = self.inner.write().unwrap();

        if !inner.files.contains_key(&grant.file_id) {
            return Err(StoreError::NotFound(format!("file {}", grant.file_id)));
        }
        if inner
            .shares
            .iter()
            .any(|s| s.file_id == grant.file_id && s.recipient == grant.recipient)
        {
            return Ok(InsertResult::AlreadyExists);
        }

        inner.shares.push(grant.clone());
        Ok(InsertResult::Inserted)
    }

    async fn shares_for(&self, file_id: &FileId) -> Result<Vec<ShareGrant>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .shares
            .iter()
            .filter(|s| &s.file_id == file_id)
            .cloned()
            .collect())
    }

    async fn files_shared_with(&self, recipient: &Address) -> Result<Vec<FileRecord>> {
        let inner = self.inner.read().unwrap();
        Ok(inner
            .shares
            .iter()
            .filter(|s| &s.recipient == recipient)
            .filter_map(|s| inner.files.get(&s.file_id).cloned())
            .collect())
    }

    async fn register_username(&self, username: &str, address: &Address) -> Result<InsertResult> {
        let username = normalize_username(username)?;
        let mut inner = self.inner.write().unwrap();

        match inner.usernames.get(&username) {
            Some(existing) if existing == address => Ok(InsertResult::AlreadyExists),
            Some(_) => Err(StoreError::UsernameTaken(username)),
            None => {
                inner.usernames.insert(username, address.clone());
                Ok(InsertResult::Inserted)
            }
        }
    }

    async fn resolve_username(&self, username: &str) -> Result<Option<Address>> {
        let username = normalize_username(username)?;
        let inner = self.inner.read().unwrap();
        Ok(inner.usernames.get(&username).cloned())
    }
}
