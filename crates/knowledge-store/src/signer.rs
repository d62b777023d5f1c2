//! Time-bounded content URLs.
//!
//! A signed URL has the shape
//!
//! ```text
//! {base}/{document_id}/v{version}?expires={unix_secs}&sig={hex}
//! ```
//!
//! where `sig` is a keyed BLAKE3 MAC over the object name and expiry. The
//! content store hands these out; whatever serves the bytes checks them with
//! [`UrlSigner::verify`].

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::RngCore;

use knowledge_core::ContentKey;

use crate::error::{StoreError, UrlError};

const MAC_CONTEXT: &[u8] = b"knowledge-content-url-v1:";

/// Signs and verifies content URLs with a 32-byte secret.
#[derive(Clone)]
pub struct UrlSigner {
    base: String,
    secret: [u8; 32],
}

impl UrlSigner {
    /// Create a signer with an explicit secret.
    pub fn new(base: impl Into<String>, secret: [u8; 32]) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self { base, secret }
    }

    /// Create a signer with a random secret (URLs die with the process).
    pub fn generate(base: impl Into<String>) -> Self {
        let mut secret = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut secret);
        Self::new(base, secret)
    }

    /// Create a signer from a hex-encoded 32-byte secret.
    pub fn from_hex(base: impl Into<String>, secret_hex: &str) -> Result<Self, StoreError> {
        let bytes = hex::decode(secret_hex.trim())
            .map_err(|e| StoreError::InvalidData(format!("url secret: {}", e)))?;
        let secret: [u8; 32] = bytes
            .try_into()
            .map_err(|_| StoreError::InvalidData("url secret must be 32 bytes".into()))?;
        Ok(Self::new(base, secret))
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Sign a URL that expires at `expires_at` (Unix seconds).
    pub fn sign(&self, key: &ContentKey, expires_at: u64) -> String {
        let object = key.object_name();
        let mac = self.mac(&object, expires_at);
        format!(
            "{}/{}?expires={}&sig={}",
            self.base,
            object,
            expires_at,
            mac.to_hex()
        )
    }

    /// Sign a URL valid for `ttl` from now.
    pub fn sign_for(&self, key: &ContentKey, ttl: Duration) -> String {
        self.sign(key, now_secs().saturating_add(ttl.as_secs()))
    }

    /// Check a URL produced by this signer at time `now` (Unix seconds).
    pub fn verify(&self, url: &str, now: u64) -> Result<ContentKey, UrlError> {
        let rest = url
            .strip_prefix(self.base.as_str())
            .and_then(|r| r.strip_prefix('/'))
            .ok_or(UrlError::Malformed)?;
        let (object, query) = rest.split_once('?').ok_or(UrlError::Malformed)?;

        let mut expires = None;
        let mut sig = None;
        for pair in query.split('&') {
            match pair.split_once('=') {
                Some(("expires", v)) => expires = v.parse::<u64>().ok(),
                Some(("sig", v)) => sig = Some(v),
                _ => return Err(UrlError::Malformed),
            }
        }
        let expires = expires.ok_or(UrlError::Malformed)?;
        let sig = sig.ok_or(UrlError::Malformed)?;

        let key = ContentKey::parse(object).map_err(|_| UrlError::Malformed)?;

        let claimed = blake3::Hash::from_hex(sig).map_err(|_| UrlError::BadSignature)?;
        // blake3::Hash equality is constant-time.
        if claimed != self.mac(object, expires) {
            return Err(UrlError::BadSignature);
        }
        if now > expires {
            return Err(UrlError::Expired(expires));
        }

        Ok(key)
    }

    fn mac(&self, object: &str, expires_at: u64) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new_keyed(&self.secret);
        hasher.update(MAC_CONTEXT);
        hasher.update(object.as_bytes());
        hasher.update(b"\n");
        hasher.update(&expires_at.to_be_bytes());
        hasher.finalize()
    }
}

impl fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlSigner")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

/// Current time in Unix seconds.
pub(crate) fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use knowledge_core::DocumentId;

    fn key() -> ContentKey {
        ContentKey::new(DocumentId::from_bytes([5; 16]), 2)
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = UrlSigner::new("https://files.example.edu/", [9; 32]);
        let url = signer.sign(&key(), 2_000);

        assert!(url.starts_with("https://files.example.edu/05050505-"));
        assert!(url.contains("/v2?expires=2000&sig="));
        assert_eq!(signer.verify(&url, 1_999).unwrap(), key());
    }

    #[test]
    fn test_expired_url_rejected() {
        let signer = UrlSigner::new("http://localhost", [9; 32]);
        let url = signer.sign(&key(), 100);
        assert_eq!(signer.verify(&url, 101), Err(UrlError::Expired(100)));
    }

    #[test]
    fn test_tampered_url_rejected() {
        let signer = UrlSigner::new("http://localhost", [9; 32]);
        let url = signer.sign(&key(), 100).replace("/v2?", "/v1?");
        assert_eq!(signer.verify(&url, 50), Err(UrlError::BadSignature));

        let other = UrlSigner::new("http://localhost", [7; 32]);
        let url = signer.sign(&key(), 100);
        assert_eq!(other.verify(&url, 50), Err(UrlError::BadSignature));
    }

    #[test]
    fn test_from_hex_requires_32_bytes() {
        assert!(UrlSigner::from_hex("http://x", "abcd").is_err());
        assert!(UrlSigner::from_hex("http://x", &"ab".repeat(32)).is_ok());
    }
}
