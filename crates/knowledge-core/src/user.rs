//! User accounts as read by the knowledge core.
//!
//! Account creation and password hashing are owned by the auth layer; the
//! core only reads these records.

use serde::{Deserialize, Serialize};

use crate::types::UserId;

/// A named role attached to a user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
        }
    }
}

/// A stored user account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    pub name: String,
    /// Unique across all users.
    pub email: String,
    /// Opaque output of the password hasher.
    pub password_hash: String,
    pub department_id: String,
    pub roles: Vec<Role>,
}

impl User {
    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|r| r.name == name)
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("user_id", &self.user_id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("department_id", &self.department_id)
            .field("roles", &self.roles)
            .finish()
    }
}

/// Sign-up request fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub department_id: String,
    pub roles: Vec<Role>,
}
