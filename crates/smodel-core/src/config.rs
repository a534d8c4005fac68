//! Configuration structures for the fetch and cache layers.

use serde::{Deserialize, Serialize};

/// Main configuration for smodel.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SmodelConfig {
    /// HTTP transport configuration.
    pub fetch: FetchConfig,

    /// Document cache configuration.
    pub cache: CacheConfig,
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Request timeout in seconds, enforced by the transport.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("smodel/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }
}

/// Which cache backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    /// Never store anything.
    #[default]
    None,
    /// Redis server at `redis_url`.
    Redis,
}

/// Document cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Consult and fill the cache on fetch.
    pub enabled: bool,

    /// Backend implementation.
    pub backend: CacheBackend,

    /// Redis connection URL.
    pub redis_url: String,

    /// Expiry for cached documents in seconds (none = no expiry).
    pub expire_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: CacheBackend::None,
            redis_url: "redis://127.0.0.1:6379/".to_string(),
            expire_secs: None,
        }
    }
}

impl SmodelConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }

    /// Cache expiry as a duration.
    pub fn cache_expiry(&self) -> Option<std::time::Duration> {
        self.cache.expire_secs.map(std::time::Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SmodelConfig =
            serde_json::from_str(r#"{"cache": {"enabled": true, "expire_secs": 1800}}"#).unwrap();

        assert!(config.cache.enabled);
        assert_eq!(config.cache.backend, CacheBackend::None);
        assert_eq!(config.cache_expiry(), Some(std::time::Duration::from_secs(1800)));
        assert_eq!(config.fetch.timeout_secs, 30);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = SmodelConfig::default();
        config.cache.backend = CacheBackend::Redis;
        config.save(&path).unwrap();

        let loaded = SmodelConfig::from_file(&path).unwrap();
        assert_eq!(loaded.cache.backend, CacheBackend::Redis);
        assert_eq!(loaded.cache.redis_url, "redis://127.0.0.1:6379/");
    }
}
