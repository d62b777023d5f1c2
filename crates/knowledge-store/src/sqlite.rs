//! SQLite implementation of the store traits.
//!
//! This is the primary storage backend. One database file holds both the
//! document database tables and the content blobs. It uses rusqlite with
//! bundled SQLite, wrapped in async via `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use serde::{de::DeserializeOwned, Serialize};

use knowledge_core::{
    validate_document, Action, ActivityEntry, CapabilitySet, ContentKey, Document, DocumentId,
    Permission, Role, User, UserId, Version,
};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::signer::UrlSigner;
use crate::traits::{
    ActivityStore, AppendResult, ContentInfo, ContentStore, InsertResult, MetadataStore,
    PermissionStore, UserStore,
};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    signer: Option<UrlSigner>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory SQLite database.
    ///
    /// Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
            signer: None,
        }
    }

    /// Hand out signed retrieval URLs for stored content.
    pub fn with_signer(mut self, signer: UrlSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Run a closure against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {}", e)))?
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row helpers
// ─────────────────────────────────────────────────────────────────────────────

fn encode_cbor<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode_cbor<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn parse_user_id(s: &str) -> Result<UserId> {
    s.parse()
        .map_err(|e: knowledge_core::CoreError| StoreError::InvalidData(e.to_string()))
}

fn parse_document_id(s: &str) -> Result<DocumentId> {
    s.parse()
        .map_err(|e: knowledge_core::CoreError| StoreError::InvalidData(e.to_string()))
}

const DOCUMENT_COLUMNS: &str = "document_id, name, owner, document_type, department_id, tags, \
     category, description, university, additional, current_version";

/// A `documents` row before its ids and encoded columns are decoded.
struct DocumentRow {
    document_id: String,
    name: String,
    owner: String,
    document_type: String,
    department_id: String,
    tags: Vec<u8>,
    category: String,
    description: String,
    university: String,
    additional: Option<String>,
    current_version: u32,
}

impl DocumentRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            document_id: row.get(0)?,
            name: row.get(1)?,
            owner: row.get(2)?,
            document_type: row.get(3)?,
            department_id: row.get(4)?,
            tags: row.get(5)?,
            category: row.get(6)?,
            description: row.get(7)?,
            university: row.get(8)?,
            additional: row.get(9)?,
            current_version: row.get(10)?,
        })
    }

    fn into_document(self, versions: Vec<Version>) -> Result<Document> {
        let additional: Option<serde_json::Value> = self
            .additional
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        Ok(Document {
            document_id: parse_document_id(&self.document_id)?,
            name: self.name,
            owner: parse_user_id(&self.owner)?,
            document_type: self.document_type,
            department_id: self.department_id,
            tags: decode_cbor(&self.tags)?,
            category: self.category,
            description: self.description,
            university: self.university,
            additional,
            current_version: self.current_version,
            versions,
        })
    }
}

fn load_versions(conn: &Connection, document_id: &str) -> Result<Vec<Version>> {
    let mut stmt = conn.prepare(
        "SELECT version_number, modified_by, modified_at, content_size
         FROM document_versions WHERE document_id = ?1
         ORDER BY version_number",
    )?;

    let rows = stmt
        .query_map(params![document_id], |row| {
            Ok((
                row.get::<_, u32>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(number, by, at, size)| Ok(Version::new(number, parse_user_id(&by)?, at, size as u64)))
        .collect()
}

/// Load documents matching `filter` (a WHERE clause or empty), in insertion order.
fn query_documents<P: Params>(conn: &Connection, filter: &str, params: P) -> Result<Vec<Document>> {
    let sql = format!(
        "SELECT {} FROM documents {} ORDER BY seq",
        DOCUMENT_COLUMNS, filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params, DocumentRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|row| {
            let versions = load_versions(conn, &row.document_id)?;
            row.into_document(versions)
        })
        .collect()
}

fn insert_version(conn: &Connection, document_id: &str, version: &Version) -> Result<()> {
    conn.execute(
        "INSERT INTO document_versions (
            document_id, version_number, modified_by, modified_at, content_size
        ) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            document_id,
            version.version_number,
            version.modified_by.to_string_id(),
            version.modified_at,
            version.content_size as i64,
        ],
    )?;
    Ok(())
}

fn encode_additional(doc: &Document) -> Result<Option<String>> {
    doc.additional
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn load_capabilities(conn: &Connection, user: &str, document: &str) -> Result<CapabilitySet> {
    let bits: Option<u8> = conn
        .query_row(
            "SELECT capabilities FROM permissions WHERE user_id = ?1 AND document_id = ?2",
            params![user, document],
            |row| row.get(0),
        )
        .optional()?;
    Ok(bits.map(CapabilitySet::from_bits_truncate).unwrap_or_default())
}

fn query_permissions<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<Permission>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, u8>(2)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(user, doc, bits)| {
            Ok(Permission::new(
                parse_user_id(&user)?,
                parse_document_id(&doc)?,
                CapabilitySet::from_bits_truncate(bits),
            ))
        })
        .collect()
}

fn row_to_user(
    conn: &Connection,
    filter: &str,
    key: &str,
) -> Result<Option<User>> {
    let sql = format!(
        "SELECT user_id, name, email, password_hash, department_id, roles FROM users WHERE {} = ?1",
        filter
    );
    let row = conn
        .query_row(&sql, params![key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Vec<u8>>(5)?,
            ))
        })
        .optional()?;

    row.map(|(id, name, email, password_hash, department_id, roles)| {
        let roles: Vec<Role> = decode_cbor(&roles)?;
        Ok(User {
            user_id: parse_user_id(&id)?,
            name,
            email,
            password_hash,
            department_id,
            roles,
        })
    })
    .transpose()
}

fn query_activity(conn: &Connection, column: &str, key: &str) -> Result<Vec<ActivityEntry>> {
    let sql = format!(
        "SELECT user_id, document_id, action, description, at
         FROM activity_log WHERE {} = ?1 ORDER BY id",
        column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    rows.into_iter()
        .map(|(user, doc, action, description, at)| {
            let action = Action::from_name(&action)
                .ok_or_else(|| StoreError::InvalidData(format!("unknown action: {}", action)))?;
            Ok(ActivityEntry::new(
                parse_user_id(&user)?,
                parse_document_id(&doc)?,
                action,
                description,
                at,
            ))
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn insert_document(&self, doc: &Document) -> Result<InsertResult> {
        validate_document(doc).map_err(|e| StoreError::InvalidData(e.to_string()))?;

        let doc = doc.clone();
        let tags = encode_cbor(&doc.tags)?;
        let additional = encode_additional(&doc)?;

        self.blocking(move |conn| {
            let id = doc.document_id.to_string_id();
            let tx = conn.transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE document_id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if exists {
                return Ok(InsertResult::AlreadyExists);
            }

            let seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(seq), 0) + 1 FROM documents",
                [],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO documents (
                    document_id, seq, name, owner, document_type, department_id, tags,
                    category, description, university, additional, current_version
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    id,
                    seq,
                    doc.name,
                    doc.owner.to_string_id(),
                    doc.document_type,
                    doc.department_id,
                    tags,
                    doc.category,
                    doc.description,
                    doc.university,
                    additional,
                    doc.current_version,
                ],
            )?;

            for version in &doc.versions {
                insert_version(&tx, &id, version)?;
            }

            tx.commit()?;
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_document(&self, id: &DocumentId) -> Result<Option<Document>> {
        let id = id.to_string_id();
        self.blocking(move |conn| {
            let docs = query_documents(conn, "WHERE document_id = ?1", params![id])?;
            Ok(docs.into_iter().next())
        })
        .await
    }

    async fn find_by_name(&self, name: &str) -> Result<Vec<Document>> {
        let name = name.to_string();
        self.blocking(move |conn| query_documents(conn, "WHERE name = ?1", params![name]))
            .await
    }

    async fn find_by_owner(&self, owner: &UserId) -> Result<Vec<Document>> {
        let owner = owner.to_string_id();
        self.blocking(move |conn| query_documents(conn, "WHERE owner = ?1", params![owner]))
            .await
    }

    async fn list_documents(&self) -> Result<Vec<Document>> {
        self.blocking(|conn| query_documents(conn, "", [])).await
    }

    async fn update_metadata(&self, doc: &Document) -> Result<bool> {
        let doc = doc.clone();
        let tags = encode_cbor(&doc.tags)?;
        let additional = encode_additional(&doc)?;

        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE documents SET
                    name = ?2, owner = ?3, document_type = ?4, department_id = ?5, tags = ?6,
                    category = ?7, description = ?8, university = ?9, additional = ?10
                 WHERE document_id = ?1",
                params![
                    doc.document_id.to_string_id(),
                    doc.name,
                    doc.owner.to_string_id(),
                    doc.document_type,
                    doc.department_id,
                    tags,
                    doc.category,
                    doc.description,
                    doc.university,
                    additional,
                ],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn append_version(&self, id: &DocumentId, version: &Version) -> Result<AppendResult> {
        let id = id.to_string_id();
        let version = version.clone();

        self.blocking(move |conn| {
            let tx = conn.transaction()?;

            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM documents WHERE document_id = ?1)",
                params![id],
                |row| row.get(0),
            )?;
            if !exists {
                return Ok(AppendResult::NotFound);
            }

            let latest: u32 = tx.query_row(
                "SELECT COALESCE(MAX(version_number), 0) FROM document_versions
                 WHERE document_id = ?1",
                params![id],
                |row| row.get(0),
            )?;
            if version.version_number != latest + 1 {
                return Ok(AppendResult::Conflict { latest });
            }

            insert_version(&tx, &id, &version)?;
            tx.execute(
                "UPDATE documents SET current_version = ?2 WHERE document_id = ?1",
                params![id, version.version_number],
            )?;

            tx.commit()?;
            Ok(AppendResult::Appended)
        })
        .await
    }

    async fn set_current_version(&self, id: &DocumentId, version_number: u32) -> Result<bool> {
        let id = id.to_string_id();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "UPDATE documents SET current_version = ?2
                 WHERE document_id = ?1 AND EXISTS(
                     SELECT 1 FROM document_versions
                     WHERE document_id = ?1 AND version_number = ?2
                 )",
                params![id, version_number],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn delete_document(&self, id: &DocumentId) -> Result<bool> {
        let id = id.to_string_id();
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM document_versions WHERE document_id = ?1",
                params![id],
            )?;
            let changed = tx.execute("DELETE FROM documents WHERE document_id = ?1", params![id])?;
            tx.commit()?;
            Ok(changed > 0)
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Permissions
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PermissionStore for SqliteStore {
    async fn get_permission(
        &self,
        user: &UserId,
        document: &DocumentId,
    ) -> Result<Option<Permission>> {
        let (user, document) = (*user, *document);
        self.blocking(move |conn| {
            let caps = load_capabilities(conn, &user.to_string_id(), &document.to_string_id())?;
            Ok((!caps.is_empty()).then(|| Permission::new(user, document, caps)))
        })
        .await
    }

    async fn insert_permission(&self, permission: &Permission) -> Result<InsertResult> {
        let permission = permission.clone();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO permissions (user_id, document_id, capabilities)
                 VALUES (?1, ?2, ?3)",
                params![
                    permission.user_id.to_string_id(),
                    permission.document_id.to_string_id(),
                    permission.capabilities.bits(),
                ],
            )?;
            Ok(if changed > 0 {
                InsertResult::Inserted
            } else {
                InsertResult::AlreadyExists
            })
        })
        .await
    }

    async fn grant(
        &self,
        user: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<CapabilitySet> {
        let (user, document) = (user.to_string_id(), document.to_string_id());
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let held = load_capabilities(&tx, &user, &document)?;
            let updated = held.union(capabilities);

            if !updated.is_empty() {
                tx.execute(
                    "INSERT INTO permissions (user_id, document_id, capabilities)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(user_id, document_id) DO UPDATE SET capabilities = excluded.capabilities",
                    params![user, document, updated.bits()],
                )?;
            }

            tx.commit()?;
            Ok(updated)
        })
        .await
    }

    async fn revoke(
        &self,
        user: &UserId,
        document: &DocumentId,
        capabilities: CapabilitySet,
    ) -> Result<CapabilitySet> {
        let (user, document) = (user.to_string_id(), document.to_string_id());
        self.blocking(move |conn| {
            let tx = conn.transaction()?;
            let held = load_capabilities(&tx, &user, &document)?;
            let removed = held.intersection(capabilities);
            let remaining = held.difference(capabilities);

            if remaining.is_empty() {
                tx.execute(
                    "DELETE FROM permissions WHERE user_id = ?1 AND document_id = ?2",
                    params![user, document],
                )?;
            } else if !removed.is_empty() {
                tx.execute(
                    "UPDATE permissions SET capabilities = ?3
                     WHERE user_id = ?1 AND document_id = ?2",
                    params![user, document, remaining.bits()],
                )?;
            }

            tx.commit()?;
            Ok(removed)
        })
        .await
    }

    async fn delete_permission(&self, user: &UserId, document: &DocumentId) -> Result<bool> {
        let (user, document) = (user.to_string_id(), document.to_string_id());
        self.blocking(move |conn| {
            let changed = conn.execute(
                "DELETE FROM permissions WHERE user_id = ?1 AND document_id = ?2",
                params![user, document],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn permissions_for_user(&self, user: &UserId) -> Result<Vec<Permission>> {
        let user = user.to_string_id();
        self.blocking(move |conn| {
            query_permissions(
                conn,
                "SELECT user_id, document_id, capabilities FROM permissions
                 WHERE user_id = ?1 ORDER BY document_id",
                params![user],
            )
        })
        .await
    }

    async fn permissions_for_document(&self, document: &DocumentId) -> Result<Vec<Permission>> {
        let document = document.to_string_id();
        self.blocking(move |conn| {
            query_permissions(
                conn,
                "SELECT user_id, document_id, capabilities FROM permissions
                 WHERE document_id = ?1 ORDER BY user_id",
                params![document],
            )
        })
        .await
    }

    async fn delete_document_permissions(&self, document: &DocumentId) -> Result<usize> {
        let document = document.to_string_id();
        self.blocking(move |conn| {
            let removed = conn.execute(
                "DELETE FROM permissions WHERE document_id = ?1",
                params![document],
            )?;
            Ok(removed)
        })
        .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Users and activity
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl UserStore for SqliteStore {
    async fn insert_user(&self, user: &User) -> Result<InsertResult> {
        let user = user.clone();
        let roles = encode_cbor(&user.roles)?;

        self.blocking(move |conn| {
            let taken: bool = conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE user_id = ?1 OR email = ?2)",
                params![user.user_id.to_string_id(), user.email],
                |row| row.get(0),
            )?;
            if taken {
                return Ok(InsertResult::AlreadyExists);
            }

            conn.execute(
                "INSERT INTO users (user_id, name, email, password_hash, department_id, roles)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.user_id.to_string_id(),
                    user.name,
                    user.email,
                    user.password_hash,
                    user.department_id,
                    roles,
                ],
            )?;
            Ok(InsertResult::Inserted)
        })
        .await
    }

    async fn get_user(&self, id: &UserId) -> Result<Option<User>> {
        let id = id.to_string_id();
        self.blocking(move |conn| row_to_user(conn, "user_id", &id)).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_string();
        self.blocking(move |conn| row_to_user(conn, "email", &email)).await
    }
}

#[async_trait]
impl ActivityStore for SqliteStore {
    async fn record_activity(&self, entry: &ActivityEntry) -> Result<()> {
        let entry = entry.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO activity_log (user_id, document_id, action, description, at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.user_id.to_string_id(),
                    entry.document_id.to_string_id(),
                    entry.action.as_str(),
                    entry.description,
                    entry.at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn activity_for_document(&self, document: &DocumentId) -> Result<Vec<ActivityEntry>> {
        let document = document.to_string_id();
        self.blocking(move |conn| query_activity(conn, "document_id", &document))
            .await
    }

    async fn activity_for_user(&self, user: &UserId) -> Result<Vec<ActivityEntry>> {
        let user = user.to_string_id();
        self.blocking(move |conn| query_activity(conn, "user_id", &user))
            .await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Content
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ContentStore for SqliteStore {
    async fn put(
        &self,
        key: &ContentKey,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<InsertResult> {
        let object = key.object_name();
        let content_type = content_type.to_string();
        self.blocking(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO contents (object_name, bytes, content_type, size)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(object_name) DO NOTHING",
                params![object, bytes.as_ref(), content_type, bytes.len() as i64],
            )?;
            Ok(if inserted == 0 {
                InsertResult::AlreadyExists
            } else {
                InsertResult::Inserted
            })
        })
        .await
    }

    async fn get(&self, key: &ContentKey) -> Result<Option<Bytes>> {
        let object = key.object_name();
        self.blocking(move |conn| {
            let bytes: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT bytes FROM contents WHERE object_name = ?1",
                    params![object],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(bytes.map(Bytes::from))
        })
        .await
    }

    async fn stat(&self, key: &ContentKey) -> Result<Option<ContentInfo>> {
        let object = key.object_name();
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT size, content_type FROM contents WHERE object_name = ?1",
                params![object],
                |row| {
                    Ok(ContentInfo {
                        size: row.get::<_, i64>(0)? as u64,
                        content_type: row.get(1)?,
                    })
                },
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn delete(&self, key: &ContentKey) -> Result<bool> {
        let object = key.object_name();
        self.blocking(move |conn| {
            let changed = conn.execute(
                "DELETE FROM contents WHERE object_name = ?1",
                params![object],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    fn url_for(&self, key: &ContentKey, expires_in: Duration) -> Option<String> {
        self.signer.as_ref().map(|s| s.sign_for(key, expires_in))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_core::{Capability, DocumentDraft};

    fn make_doc(owner: UserId) -> Document {
        Document::create(
            DocumentId::new(),
            DocumentDraft::new("syllabus.pdf", "application/pdf")
                .tag("cs101")
                .tag("fall")
                .department("cs")
                .additional(serde_json::json!({"pages": 12})),
            owner,
            100,
            1_000,
        )
    }

    #[tokio::test]
    async fn test_document_roundtrip() {
        let store = SqliteStore::open_memory().unwrap();
        let doc = make_doc(UserId::new());

        assert_eq!(store.insert_document(&doc).await.unwrap(), InsertResult::Inserted);
        assert_eq!(
            store.insert_document(&doc).await.unwrap(),
            InsertResult::AlreadyExists
        );

        let loaded = store.get_document(&doc.document_id).await.unwrap().unwrap();
        assert_eq!(loaded, doc);
    }

    #[tokio::test]
    async fn test_append_version_is_compare_and_set() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = UserId::new();
        let doc = make_doc(owner);
        let id = doc.document_id;
        store.insert_document(&doc).await.unwrap();

        let v2 = Version::new(2, owner, 2_000, 50);
        assert_eq!(store.append_version(&id, &v2).await.unwrap(), AppendResult::Appended);
        assert_eq!(
            store.append_version(&id, &v2).await.unwrap(),
            AppendResult::Conflict { latest: 2 }
        );
        assert_eq!(
            store.append_version(&DocumentId::new(), &v2).await.unwrap(),
            AppendResult::NotFound
        );

        let loaded = store.get_document(&id).await.unwrap().unwrap();
        assert_eq!(loaded.current_version, 2);
        assert_eq!(loaded.versions, vec![doc.versions[0].clone(), v2]);

        assert!(store.set_current_version(&id, 1).await.unwrap());
        assert!(!store.set_current_version(&id, 3).await.unwrap());
    }

    #[tokio::test]
    async fn test_update_and_delete_document() {
        let store = SqliteStore::open_memory().unwrap();
        let doc = make_doc(UserId::new());
        let id = doc.document_id;
        store.insert_document(&doc).await.unwrap();

        let mut renamed = doc.clone();
        renamed.name = "syllabus-v2.pdf".into();
        renamed.tags.clear();
        assert!(store.update_metadata(&renamed).await.unwrap());

        let found = store.find_by_name("syllabus-v2.pdf").await.unwrap().remove(0);
        assert_eq!(found.document_id, id);
        assert!(found.tags.is_empty());
        assert_eq!(found.versions.len(), 1);

        assert!(store.delete_document(&id).await.unwrap());
        assert!(!store.delete_document(&id).await.unwrap());
        assert!(store.get_document(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listing_keeps_insertion_order() {
        let store = SqliteStore::open_memory().unwrap();
        let owner = UserId::new();
        let first = make_doc(owner);
        let second = make_doc(UserId::new());
        let third = make_doc(owner);
        for doc in [&first, &second, &third] {
            store.insert_document(doc).await.unwrap();
        }

        let ids: Vec<_> = store
            .list_documents()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.document_id)
            .collect();
        assert_eq!(ids, vec![first.document_id, second.document_id, third.document_id]);

        let owned = store.find_by_owner(&owner).await.unwrap();
        assert_eq!(owned.len(), 2);
        assert_eq!(owned[1].document_id, third.document_id);
    }

    #[tokio::test]
    async fn test_permission_grant_revoke() {
        let store = SqliteStore::open_memory().unwrap();
        let user = UserId::new();
        let doc = DocumentId::new();

        let caps = store
            .grant(&user, &doc, CapabilitySet::parse(["read", "share"]).unwrap())
            .await
            .unwrap();
        assert!(caps.contains(Capability::Share));

        let removed = store
            .revoke(&user, &doc, CapabilitySet::only(Capability::Share))
            .await
            .unwrap();
        assert_eq!(removed, CapabilitySet::only(Capability::Share));

        let perm = store.get_permission(&user, &doc).await.unwrap().unwrap();
        assert_eq!(perm.capabilities, CapabilitySet::only(Capability::Read));

        store
            .revoke(&user, &doc, CapabilitySet::only(Capability::Read))
            .await
            .unwrap();
        assert!(store.get_permission(&user, &doc).await.unwrap().is_none());
        assert!(store.permissions_for_user(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_insert_permission_and_cascade() {
        let store = SqliteStore::open_memory().unwrap();
        let doc = DocumentId::new();
        let (a, b) = (UserId::new(), UserId::new());

        assert_eq!(
            store.insert_permission(&Permission::owner(a, doc)).await.unwrap(),
            InsertResult::Inserted
        );
        assert_eq!(
            store.insert_permission(&Permission::owner(a, doc)).await.unwrap(),
            InsertResult::AlreadyExists
        );
        store
            .grant(&b, &doc, CapabilitySet::only(Capability::Read))
            .await
            .unwrap();

        assert_eq!(store.permissions_for_document(&doc).await.unwrap().len(), 2);
        assert_eq!(store.delete_document_permissions(&doc).await.unwrap(), 2);
        assert!(!store.delete_permission(&a, &doc).await.unwrap());
    }

    #[tokio::test]
    async fn test_users_and_activity() {
        let store = SqliteStore::open_memory().unwrap();
        let user = User {
            user_id: UserId::new(),
            name: "Grace".into(),
            email: "grace@example.edu".into(),
            password_hash: "hash".into(),
            department_id: "math".into(),
            roles: vec![Role::new("faculty")],
        };
        assert_eq!(store.insert_user(&user).await.unwrap(), InsertResult::Inserted);
        assert_eq!(
            store.insert_user(&user).await.unwrap(),
            InsertResult::AlreadyExists
        );
        assert_eq!(store.get_user(&user.user_id).await.unwrap(), Some(user.clone()));
        assert_eq!(
            store.find_user_by_email("grace@example.edu").await.unwrap(),
            Some(user.clone())
        );

        let doc = DocumentId::new();
        store
            .record_activity(&ActivityEntry::new(user.user_id, doc, Action::Share, "shared", 5))
            .await
            .unwrap();
        let log = store.activity_for_document(&doc).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, Action::Share);
    }

    #[tokio::test]
    async fn test_content_blobs() {
        let store = SqliteStore::open_memory()
            .unwrap()
            .with_signer(UrlSigner::new("http://files", [3; 32]));
        let key = ContentKey::new(DocumentId::new(), 1);

        store
            .put(&key, Bytes::from_static(b"%PDF-1.7"), "application/pdf")
            .await
            .unwrap();
        assert_eq!(
            store.get(&key).await.unwrap(),
            Some(Bytes::from_static(b"%PDF-1.7"))
        );
        assert_eq!(store.stat(&key).await.unwrap().unwrap().size, 8);
        assert!(store.url_for(&key, Duration::from_secs(5)).is_some());

        assert_eq!(
            store
                .put(&key, Bytes::from_static(b"other"), "text/plain")
                .await
                .unwrap(),
            InsertResult::AlreadyExists
        );
        assert_eq!(
            store.get(&key).await.unwrap(),
            Some(Bytes::from_static(b"%PDF-1.7"))
        );

        assert!(store.delete(&key).await.unwrap());
        assert!(store.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("knowledge.db");
        let doc = make_doc(UserId::new());

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_document(&doc).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_document(&doc.document_id).await.unwrap(), Some(doc));
    }
}
