//! SQLite implementation of the MetadataStore trait.
//!
//! This is the primary metadata backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use iryshare_core::{Address, Locator};

use crate::error::{Result, StoreError};
use crate::metadata::MetadataStore;
use crate::migration;
use crate::records::{
    normalize_username, now, FileId, FileRecord, InsertResult, NewFileRecord, Precondition,
    ShareGrant,
};

const FILE_COLUMNS: &str = "file_id, owner, file_name, content_type, size_bytes, locator,
                            encrypted, is_public, revision, created_at, updated_at";

/// SQLite-based metadata store.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteMetadataStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteMetadataStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a blocking operation on the connection off the async runtime.
    async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {e}")),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| {
            StoreError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("spawn_blocking failed: {e}")),
            ))
        })?
    }
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn timestamp(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis).ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

// Helper to convert a row to FileRecord
fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    let id: String = row.get("file_id")?;
    let owner: String = row.get("owner")?;
    let locator: String = row.get("locator")?;

    Ok(FileRecord {
        id: id.parse().map_err(|e| conversion_error(0, e))?,
        owner: Address::parse(&owner).map_err(|e| conversion_error(1, e))?,
        file_name: row.get("file_name")?,
        content_type: row.get("content_type")?,
        size_bytes: row.get("size_bytes")?,
        locator: Locator::parse(&locator).map_err(|e| conversion_error(5, e))?,
        encrypted: row.get("encrypted")?,
        is_public: row.get("is_public")?,
        revision: row.get("revision")?,
        created_at: timestamp(9, row.get("created_at")?)?,
        updated_at: timestamp(10, row.get("updated_at")?)?,
    })
}

// Helper to convert a row to ShareGrant
fn row_to_share(row: &rusqlite::Row<'_>) -> rusqlite::Result<ShareGrant> {
    let file_id: String = row.get("file_id")?;
    let recipient: String = row.get("recipient")?;

    Ok(ShareGrant {
        file_id: file_id.parse().map_err(|e| conversion_error(0, e))?,
        recipient: Address::parse(&recipient).map_err(|e| conversion_error(1, e))?,
        recipient_label: row.get("recipient_label")?,
        created_at: timestamp(3, row.get("created_at")?)?,
    })
}

fn load_file(conn: &Connection, id: &FileId) -> Result<Option<FileRecord>> {
    conn.query_row(
        &format!("SELECT {FILE_COLUMNS} FROM files WHERE file_id = ?1"),
        params![id.to_string()],
        row_to_file,
    )
    .optional()
    .map_err(StoreError::from)
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn insert_file(&self, file: NewFileRecord) -> Result<FileRecord> {
        let record = file.into_record(now());

        self.run(move |conn| {
            conn.execute(
                &format!("INSERT INTO files ({FILE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"),
                params![
                    record.id.to_string(),
                    record.owner.as_str(),
                    record.file_name,
                    record.content_type,
                    record.size_bytes,
                    record.locator.as_str(),
                    record.encrypted,
                    record.is_public,
                    record.revision,
                    record.created_at.timestamp_millis(),
                    record.updated_at.timestamp_millis(),
                ],
            )?;
            debug!(file_id = %record.id, owner = %record.owner, "inserted file");
            Ok(record)
        })
        .await
    }

    async fn get_file(&self, id: &FileId) -> Result<Option<FileRecord>> {
        let id = *id;
        self.run(move |conn| load_file(conn, &id)).await
    }

    async fn files_owned_by(&self, owner: &Address) -> Result<Vec<FileRecord>> {
        let owner = owner.clone();

        self.run(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {FILE_COLUMNS} FROM files WHERE owner = ?1 ORDER BY rowid"
            ))?;
            let files = stmt
                .query_map(params![owner.as_str()], row_to_file)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(files)
        })
        .await
    }

    async fn update_locator(
        &self,
        id: &FileId,
        locator: &Locator,
        precondition: Precondition,
    ) -> Result<FileRecord> {
        let id = *id;
        let locator = locator.clone();

        self.run(move |conn| {
            let tx = conn.transaction()?;

            let current: Option<u64> = tx
                .query_row(
                    "SELECT revision FROM files WHERE file_id = ?1",
                    params![id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            let current = current.ok_or_else(|| StoreError::NotFound(format!("file {id}")))?;

            precondition.check(&id, current)?;

            tx.execute(
                "UPDATE files SET locator = ?1, revision = ?2, updated_at = ?3
                 WHERE file_id = ?4 AND revision = ?5",
                params![
                    locator.as_str(),
                    current + 1,
                    now().timestamp_millis(),
                    id.to_string(),
                    current,
                ],
            )?;

            let record = load_file(&tx, &id)?
                .ok_or_else(|| StoreError::NotFound(format!("file {id}")))?;
            tx.commit()?;

            debug!(file_id = %id, revision = record.revision, "updated locator");
            Ok(record)
        })
        .await
    }

    async fn storage_usage(&self, owner: &Address) -> Result<u64> {
        let owner = owner.clone();

        self.run(move |conn| {
            let total: u64 = conn.query_row(
                "SELECT COALESCE(SUM(size_bytes), 0) FROM files WHERE owner = ?1",
                params![owner.as_str()],
                |row| row.get(0),
            )?;
            Ok(total)
        })
        .await
    }

    async fn insert_share(&self, grant: &ShareGrant) -> Result<InsertResult> {
        let grant = grant.clone();

        self.run(move |conn| {
            if load_file(conn, &grant.file_id)?.is_none() {
                return Err(StoreError::NotFound(format!("file {}", grant.file_id)));
            }

            let inserted = conn.execute(
                "INSERT OR IGNORE INTO shares (file_id, recipient, recipient_label, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    grant.file_id.to_string(),
                    grant.recipient.as_str(),
                    grant.recipient_label,
                    grant.created_at.timestamp_millis(),
                ],
            )?;

            Ok(if inserted == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn shares_for(&self, file_id: &FileId) -> Result<Vec<ShareGrant>> {
        let file_id = *file_id;

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT file_id, recipient, recipient_label, created_at
                 FROM shares WHERE file_id = ?1 ORDER BY rowid",
            )?;
            let shares = stmt
                .query_map(params![file_id.to_string()], row_to_share)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(shares)
        })
        .await
    }

    async fn files_shared_with(&self, recipient: &Address) -> Result<Vec<FileRecord>> {
        let recipient = recipient.clone();

        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT f.file_id, f.owner, f.file_name, f.content_type, f.size_bytes, f.locator,
                        f.encrypted, f.is_public, f.revision, f.created_at, f.updated_at
                 FROM shares s JOIN files f ON f.file_id = s.file_id
                 WHERE s.recipient = ?1
                 ORDER BY s.rowid",
            )?;
            let files = stmt
                .query_map(params![recipient.as_str()], row_to_file)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(files)
        })
        .await
    }

    async fn register_username(&self, username: &str, address: &Address) -> Result<InsertResult> {
        let username = normalize_username(username)?;
        let address = address.clone();

        self.run(move |conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT address FROM usernames WHERE username = ?1",
                    params![username],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                Some(existing) if existing == address.as_str() => Ok(InsertResult::AlreadyExists),
                Some(_) => Err(StoreError::UsernameTaken(username)),
                None => {
                    conn.execute(
                        "INSERT INTO usernames (username, address, created_at) VALUES (?1, ?2, ?3)",
                        params![username, address.as_str(), now().timestamp_millis()],
                    )?;
                    Ok(InsertResult::Inserted)
                }
            }
        })
        .await
    }

    async fn resolve_username(&self, username: &str) -> Result<Option<Address>> {
        let username = normalize_username(username)?;

        self.run(move |conn| {
            let address: Option<String> = conn
                .query_row(
                    "SELECT address FROM usernames WHERE username = ?1",
                    params![username],
                    |row| row.get(0),
                )
                .optional()?;
            address
                .map(|a| Address::parse(&a).map_err(StoreError::from))
                .transpose()
        })
        .await
    }
}
