//! Database schema migrations for SQLite.
//!
//! Each migration transforms the schema from version N to N+1. Applied
//! versions are recorded in `schema_migrations`.

use rusqlite::Connection;

use knowledge_core::now_millis;

use crate::error::{Result, StoreError};

/// Current schema version.
pub const CURRENT_VERSION: u32 = 2;

/// Initialize or migrate the database schema.
///
/// Idempotent: running it against an up-to-date database is a no-op.
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
            "database schema v{} is newer than supported v{}",
            current, CURRENT_VERSION
        )));
    }

    if current < CURRENT_VERSION {
        let tx = conn.transaction()?;

        for version in (current + 1)..=CURRENT_VERSION {
            apply_migration(&tx, version)?;

            tx.execute(
                "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![version, now_millis()],
            )?;
            tracing::debug!(version, "applied schema migration");
        }

        tx.commit()?;
    }

    Ok(())
}

fn apply_migration(conn: &Connection, version: u32) -> Result<()> {
    match version {
        1 => apply_v1(conn),
        2 => apply_v2(conn),
        _ => Err(StoreError::Migration(format!(
            "unknown migration version: {}",
            version
        ))),
    }
}

/// Migration v1: documents, versions, permissions, users.
fn apply_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE documents (
            document_id TEXT PRIMARY KEY,     -- hyphenated uuid
            seq INTEGER NOT NULL UNIQUE,      -- insertion order
            name TEXT NOT NULL,
            owner TEXT NOT NULL,
            document_type TEXT NOT NULL,
            department_id TEXT NOT NULL,
            tags BLOB NOT NULL,               -- CBOR array of strings
            category TEXT NOT NULL,
            description TEXT NOT NULL,
            university TEXT NOT NULL,
            additional TEXT,                  -- JSON, nullable
            current_version INTEGER NOT NULL
        );

        CREATE TABLE document_versions (
            document_id TEXT NOT NULL REFERENCES documents(document_id) ON DELETE CASCADE,
            version_number INTEGER NOT NULL,
            modified_by TEXT NOT NULL,
            modified_at INTEGER NOT NULL,     -- Unix ms
            content_size INTEGER NOT NULL,
            PRIMARY KEY (document_id, version_number)
        );

        CREATE TABLE permissions (
            user_id TEXT NOT NULL,
            document_id TEXT NOT NULL,
            capabilities INTEGER NOT NULL,    -- CapabilitySet bits, never 0
            PRIMARY KEY (user_id, document_id)
        );

        CREATE TABLE users (
            user_id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            department_id TEXT NOT NULL,
            roles BLOB NOT NULL               -- CBOR array of roles
        );

        CREATE TABLE contents (
            object_name TEXT PRIMARY KEY,     -- "{document_id}/v{n}"
            bytes BLOB NOT NULL,
            content_type TEXT NOT NULL,
            size INTEGER NOT NULL
        );

        CREATE INDEX idx_documents_name ON documents(name);
        CREATE INDEX idx_documents_owner ON documents(owner);
        CREATE INDEX idx_permissions_document ON permissions(document_id);
        "#,
    )?;

    Ok(())
}

/// Migration v2: activity log.
fn apply_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE activity_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            document_id TEXT NOT NULL,
            action TEXT NOT NULL,
            description TEXT NOT NULL,
            at INTEGER NOT NULL               -- Unix ms
        );

        CREATE INDEX idx_activity_document ON activity_log(document_id);
        CREATE INDEX idx_activity_user ON activity_log(user_id);
        "#,
    )?;

    Ok(())
}
