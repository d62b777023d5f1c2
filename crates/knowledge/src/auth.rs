//! Account lookup, sign-up and credential checks.
//!
//! [`AuthStore`] is the seam the facade authenticates through. The default
//! [`StoreAuth`] keeps accounts in any [`UserStore`] and hashes passwords
//! with a [`PasswordHasher`], Argon2id by default.

use argon2::password_hash::{PasswordHash, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHasher as _, Version};
use async_trait::async_trait;
use rand::RngCore;
use tracing::{debug, info};

use knowledge_core::{NewUser, User, UserId, ValidationError};
use knowledge_store::{InsertResult, UserStore};

use crate::error::{KnowledgeError, Result};

/// Account operations consumed by the facade.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>>;

    /// Create an account. Returns `None` if the email is already taken.
    async fn create_user(&self, new_user: &NewUser, password: &str) -> Result<Option<User>>;

    /// True if `password` matches the account registered under `email`.
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<bool>;
}

/// Turns plaintext passwords into stored hashes and back into verdicts.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;

    /// False for a mismatch and for an encoding this hasher cannot read.
    fn verify(&self, password: &str, encoded: &str) -> bool;
}

const SALT_LEN: usize = 16;

/// Argon2id, stored as a PHC string (`$argon2id$v=19$m=..,t=..,p=..$salt$hash`).
///
/// Verification reads the parameters from the stored string, so hashes made
/// under older parameters keep working after the defaults change.
#[derive(Debug, Clone)]
pub struct Argon2PasswordHasher {
    params: Params,
}

impl Argon2PasswordHasher {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl Default for Argon2PasswordHasher {
    fn default() -> Self {
        Self::new(Params::default())
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, password: &str) -> Result<String> {
        let mut bytes = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        let salt = SaltString::encode_b64(&bytes).map_err(hashing)?;

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(hashing)?;
        Ok(hash.to_string())
    }

    fn verify(&self, password: &str, encoded: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(encoded) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    }
}

fn hashing(e: argon2::password_hash::Error) -> KnowledgeError {
    KnowledgeError::Hashing(e.to_string())
}

/// [`AuthStore`] over a [`UserStore`].
pub struct StoreAuth<U, H = Argon2PasswordHasher> {
    users: U,
    hasher: H,
}

impl<U: UserStore> StoreAuth<U> {
    pub fn new(users: U) -> Self {
        Self::with_hasher(users, Argon2PasswordHasher::default())
    }
}

impl<U: UserStore, H: PasswordHasher> StoreAuth<U, H> {
    pub fn with_hasher(users: U, hasher: H) -> Self {
        Self { users, hasher }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_new_user(new_user: &NewUser, password: &str) -> std::result::Result<(), ValidationError> {
    let email = new_user.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ValidationError::EmptyField("email"));
    }
    if new_user.name.trim().is_empty() {
        return Err(ValidationError::EmptyField("name"));
    }
    if password.is_empty() {
        return Err(ValidationError::EmptyField("password"));
    }
    Ok(())
}

#[async_trait]
impl<U: UserStore, H: PasswordHasher> AuthStore for StoreAuth<U, H> {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.find_user_by_email(&normalize_email(email)).await?)
    }

    async fn find_user_by_id(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.users.get_user(id).await?)
    }

    async fn create_user(&self, new_user: &NewUser, password: &str) -> Result<Option<User>> {
        validate_new_user(new_user, password)?;

        let user = User {
            user_id: UserId::new(),
            name: new_user.name.trim().to_string(),
            email: normalize_email(&new_user.email),
            password_hash: self.hasher.hash(password)?,
            department_id: new_user.department_id.clone(),
            roles: new_user.roles.clone(),
        };

        match self.users.insert_user(&user).await? {
            InsertResult::Inserted => {
                info!(user_id = %user.user_id, "created user");
                Ok(Some(user))
            }
            InsertResult::AlreadyExists => {
                debug!(email = %user.email, "email already registered");
                Ok(None)
            }
        }
    }

    async fn verify_credentials(&self, email: &str, password: &str) -> Result<bool> {
        let Some(user) = self.find_user_by_email(email).await? else {
            return Ok(false);
        };
        Ok(self.hasher.verify(password, &user.password_hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_core::Role;
    use knowledge_store::MemoryStore;

    fn fast() -> Argon2PasswordHasher {
        Argon2PasswordHasher::new(Params::new(8, 1, 1, None).unwrap())
    }

    fn ada() -> NewUser {
        NewUser {
            email: "Ada@Example.edu".into(),
            name: "Ada".into(),
            department_id: "cs".into(),
            roles: vec![Role::new("staff")],
        }
    }

    #[test]
    fn test_hash_is_salted_phc() {
        let hasher = fast();
        let a = hasher.hash("hunter2").unwrap();
        let b = hasher.hash("hunter2").unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2id$v=19$m=8,t=1,p=1$"));
        assert!(hasher.verify("hunter2", &a));
        assert!(hasher.verify("hunter2", &b));
        assert!(!hasher.verify("hunter3", &a));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let hasher = fast();
        assert!(!hasher.verify("x", ""));
        assert!(!hasher.verify("x", "not a phc string"));
        assert!(!hasher.verify("x", "$argon2id$v=19$m=8,t=1,p=1$!!$!!"));
    }

    #[test]
    fn test_parameters_come_from_the_stored_hash() {
        let stored = fast().hash("pw").unwrap();
        // A hasher configured with the defaults still reads it.
        assert!(Argon2PasswordHasher::default().verify("pw", &stored));
    }

    #[tokio::test]
    async fn test_sign_up_and_verify() {
        let auth = StoreAuth::with_hasher(MemoryStore::new(), fast());

        let user = auth.create_user(&ada(), "hunter2").await.unwrap().unwrap();
        assert_eq!(user.email, "ada@example.edu");
        assert_ne!(user.password_hash, "hunter2");

        assert!(auth.verify_credentials("ADA@example.edu ", "hunter2").await.unwrap());
        assert!(!auth.verify_credentials("ada@example.edu", "wrong").await.unwrap());
        assert!(!auth.verify_credentials("bob@example.edu", "hunter2").await.unwrap());

        let found = auth.find_user_by_id(&user.user_id).await.unwrap().unwrap();
        assert_eq!(found.email, user.email);
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let auth = StoreAuth::with_hasher(MemoryStore::new(), fast());
        assert!(auth.create_user(&ada(), "a").await.unwrap().is_some());
        assert!(auth.create_user(&ada(), "b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sign_up_validation() {
        let auth = StoreAuth::with_hasher(MemoryStore::new(), fast());

        let mut no_email = ada();
        no_email.email = "nobody".into();
        assert!(auth.create_user(&no_email, "pw").await.is_err());
        assert!(auth.create_user(&ada(), "").await.is_err());
    }
}
