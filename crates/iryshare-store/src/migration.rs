//! SQLite schema for file records, share grants and usernames.
//!
//! Applied versions are recorded in `schema_migrations`; each step moves the
//! schema up by one and all pending steps run in one transaction.

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// Schema version this build reads and writes.
pub const CURRENT_VERSION: u32 = 1;

/// Bring the schema up to [`CURRENT_VERSION`].
///
/// Safe to call on every open. Fails on a schema written by a newer build.
pub fn migrate(conn: &mut Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let current: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )?;

    if current > CURRENT_VERSION {
        return Err(StoreError::Migration(format!(
            "database schema version {current} is newer than supported version {CURRENT_VERSION}"
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, chrono::Utc::now().timestamp_millis()],
            )?;
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {version}"
        ))),
    }
}

/// v1: files, shares, usernames.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        -- One row per uploaded file
        CREATE TABLE files (
            file_id TEXT PRIMARY KEY,         -- UUID
            owner TEXT NOT NULL,              -- lower-cased address
            file_name TEXT NOT NULL,
            content_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            locator TEXT NOT NULL,            -- current envelope URL
            encrypted INTEGER NOT NULL,
            is_public INTEGER NOT NULL,
            revision INTEGER NOT NULL,        -- bumped on every locator update
            created_at INTEGER NOT NULL,      -- Unix ms
            updated_at INTEGER NOT NULL       -- Unix ms
        );

        -- One row per (file, recipient)
        CREATE TABLE shares (
            file_id TEXT NOT NULL REFERENCES files(file_id),
            recipient TEXT NOT NULL,          -- lower-cased address
            recipient_label TEXT,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (file_id, recipient)
        );

        -- Username directory
        CREATE TABLE usernames (
            username TEXT PRIMARY KEY,        -- lower-cased, no leading @
            address TEXT NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX idx_files_owner ON files(owner);
        CREATE INDEX idx_shares_recipient ON shares(recipient);
        "#,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migration_creates_tables() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();

        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert!(tables.contains(&"files".to_string()));
        assert!(tables.contains(&"shares".to_string()));
        assert!(tables.contains(&"usernames".to_string()));
        assert!(tables.contains(&"schema_migrations".to_string()));
    }

    #[test]
    fn test_migration_idempotent() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();
        migrate(&mut conn).unwrap();

        let version: u32 = conn
            .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let mut conn = Connection::open_in_memory().unwrap();
        migrate(&mut conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, applied_at) VALUES (99, 0)",
            [],
        )
        .unwrap();

        assert!(matches!(migrate(&mut conn), Err(StoreError::Migration(_))));
    }
}
