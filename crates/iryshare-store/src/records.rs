//! Metadata records: files, share grants and usernames.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use iryshare_core::{Address, Locator};

use crate::error::{Result, StoreError};

/// Identifier of a file record.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(Uuid);

impl FileId {
    /// A fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0)
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for FileId {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| StoreError::InvalidData(format!("invalid file id {s:?}: {e}")))
    }
}

/// A stored file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub owner: Address,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// Current envelope (or plain object, when not encrypted).
    pub locator: Locator,
    pub encrypted: bool,
    pub is_public: bool,
    /// Bumped on every locator update; used for conditional updates.
    pub revision: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when inserting a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewFileRecord {
    pub owner: Address,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub locator: Locator,
    pub encrypted: bool,
    pub is_public: bool,
}

impl NewFileRecord {
    /// Assign an id and timestamps; revision starts at 1.
    pub fn into_record(self, now: DateTime<Utc>) -> FileRecord {
        FileRecord {
            id: FileId::new(),
            owner: self.owner,
            file_name: self.file_name,
            content_type: self.content_type,
            size_bytes: self.size_bytes,
            locator: self.locator,
            encrypted: self.encrypted,
            is_public: self.is_public,
            revision: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One recipient's access to one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareGrant {
    pub file_id: FileId,
    pub recipient: Address,
    /// How the sharer referred to the recipient (e.g. `@alice`).
    pub recipient_label: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertResult {
    /// Row was inserted.
    Inserted,
    /// An identical row already exists (not an error).
    AlreadyExists,
}

/// Condition attached to a locator update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precondition {
    /// Unconditional; last write wins.
    Any,
    /// Only if the record is still at this revision.
    Revision(u64),
}

impl Precondition {
    /// Check against the stored revision.
    pub fn check(self, file_id: &FileId, actual: u64) -> Result<()> {
        match self {
            Precondition::Revision(expected) if expected != actual => Err(StoreError::Conflict {
                file_id: file_id.to_string(),
                expected,
                actual,
            }),
            _ => Ok(()),
        }
    }
}

/// Canonical form of a username: `@` stripped, trimmed, lower-cased.
///
/// Usernames are 1 to 32 characters of ASCII letters, digits, `_`, `-`, `.`.
pub fn normalize_username(input: &str) -> Result<String> {
    let name = input.trim();
    let name = name.strip_prefix('@').unwrap_or(name);

    let valid = !name.is_empty()
        && name.len() <= 32
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if !valid {
        return Err(StoreError::InvalidData(format!("invalid username {input:?}")));
    }
    Ok(name.to_ascii_lowercase())
}

/// Current time at millisecond precision, the resolution records are stored
/// with.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
