//! Facade configuration, loadable from TOML.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use knowledge_lifecycle::LifecycleSettings;
use knowledge_store::UrlSigner;

use crate::error::{KnowledgeError, Result};

/// Configuration for a [`crate::Knowledge`] instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Lifetime of content URLs, in seconds.
    pub content_url_ttl_secs: u64,
    /// Upload and update size limit. Unlimited when absent.
    pub max_content_bytes: Option<u64>,
    /// Content type stored for documents with an empty type.
    pub default_content_type: String,
    pub storage: StorageConfig,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            content_url_ttl_secs: 24 * 60 * 60,
            max_content_bytes: None,
            default_content_type: "application/octet-stream".to_string(),
            storage: StorageConfig::default(),
        }
    }
}

/// Where documents and blobs live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `":memory:"` or a file path.
    pub database: String,
    /// Base of signed content URLs. No URLs are issued when unset.
    pub url_base: Option<String>,
    /// Hex-encoded 32-byte signing key. A random key is generated when unset.
    pub url_secret: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: ":memory:".to_string(),
            url_base: None,
            url_secret: None,
        }
    }
}

impl StorageConfig {
    pub fn is_memory(&self) -> bool {
        self.database == ":memory:"
    }
}

impl KnowledgeConfig {
    /// Parse a configuration. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| KnowledgeError::Config(e.to_string()))
    }

    pub fn url_ttl(&self) -> Duration {
        Duration::from_secs(self.content_url_ttl_secs)
    }

    pub fn lifecycle_settings(&self) -> LifecycleSettings {
        LifecycleSettings {
            url_ttl: self.url_ttl(),
            max_content_bytes: self.max_content_bytes,
            default_content_type: self.default_content_type.clone(),
        }
    }

    /// The URL signer described by the storage section, if any.
    pub fn url_signer(&self) -> Result<Option<UrlSigner>> {
        let Some(base) = &self.storage.url_base else {
            return Ok(None);
        };
        let signer = match &self.storage.url_secret {
            Some(secret) => UrlSigner::from_hex(base.as_str(), secret)
                .map_err(|e| KnowledgeError::Config(format!("url_secret: {}", e)))?,
            None => UrlSigner::generate(base.as_str()),
        };
        Ok(Some(signer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KnowledgeConfig::default();
        assert_eq!(config.url_ttl(), Duration::from_secs(86_400));
        assert!(config.storage.is_memory());
        assert!(config.url_signer().unwrap().is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config = KnowledgeConfig::from_toml_str(
            r#"
            max_content_bytes = 1048576

            [storage]
            database = "/var/lib/knowledge/db.sqlite"
            url_base = "https://files.example.edu/content"
            url_secret = "2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a2a"
            "#,
        )
        .unwrap();

        assert_eq!(config.max_content_bytes, Some(1 << 20));
        assert_eq!(config.content_url_ttl_secs, 86_400);
        assert!(!config.storage.is_memory());

        let signer = config.url_signer().unwrap().unwrap();
        assert_eq!(signer.base(), "https://files.example.edu/content");
    }

    #[test]
    fn test_bad_secret_is_config_error() {
        let config = KnowledgeConfig::from_toml_str(
            r#"
            [storage]
            url_base = "http://localhost/content"
            url_secret = "not hex"
            "#,
        )
        .unwrap();
        assert!(matches!(config.url_signer(), Err(KnowledgeError::Config(_))));
    }

    #[test]
    fn test_unparseable_toml() {
        assert!(matches!(
            KnowledgeConfig::from_toml_str("content_url_ttl_secs = \"soon\""),
            Err(KnowledgeError::Config(_))
        ));
    }
}
