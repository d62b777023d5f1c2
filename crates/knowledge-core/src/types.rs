//! Strong identifier types.
//!
//! All identifiers are newtypes to prevent mixing a user id with a document id
//! at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CoreError;

/// Opaque identifier of a user.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a fresh random user id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Build a deterministic id from raw bytes (tests and fixtures).
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Hyphenated string form.
    pub fn to_string_id(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0.hyphenated())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for UserId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::MalformedId(s.to_string()))
    }
}

/// Opaque identifier of a document, generated at creation and never changed.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    /// Generate a fresh random document id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Build a deterministic id from raw bytes (tests and fixtures).
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Hyphenated string form.
    pub fn to_string_id(&self) -> String {
        self.0.hyphenated().to_string()
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.0.hyphenated())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DocumentId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| CoreError::MalformedId(s.to_string()))
    }
}

/// Key of one content blob: a (document, version) pair.
///
/// The object-store name is `"{document_id}/v{version}"`. The content store
/// holds no other back-reference to the metadata record.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentKey {
    pub document_id: DocumentId,
    pub version: u32,
}

impl ContentKey {
    pub const fn new(document_id: DocumentId, version: u32) -> Self {
        Self {
            document_id,
            version,
        }
    }

    /// The object name used by the backing object store.
    pub fn object_name(&self) -> String {
        format!("{}/v{}", self.document_id, self.version)
    }

    /// Parse an object name of the form `"{document_id}/v{version}"`.
    pub fn parse(object_name: &str) -> Result<Self, CoreError> {
        let malformed = || CoreError::MalformedId(object_name.to_string());

        let (doc, version) = object_name.split_once("/v").ok_or_else(malformed)?;
        let document_id = doc.parse::<DocumentId>().map_err(|_| malformed())?;
        let version = version.parse::<u32>().map_err(|_| malformed())?;
        if version == 0 {
            return Err(malformed());
        }

        Ok(Self::new(document_id, version))
    }
}

impl fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentKey({})", self.object_name())
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.object_name())
    }
}

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
