//! Cache-aware document source.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::{Fetcher, Result};
use crate::cache::{Cache, NoCache};

/// Resolves a URL to document content, consulting a cache first when enabled.
#[derive(Clone)]
pub struct DocumentSource {
    fetcher: Arc<dyn Fetcher>,
    cache: Arc<dyn Cache>,
    cache_enabled: bool,
    expiry: Option<Duration>,
}

impl DocumentSource {
    /// Create a source that always fetches directly.
    pub fn new(fetcher: impl Fetcher + 'static) -> Self {
        Self::from_shared(Arc::new(fetcher))
    }

    /// Create a source around a shared fetcher.
    pub fn from_shared(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            cache: Arc::new(NoCache),
            cache_enabled: false,
            expiry: None,
        }
    }

    /// Use `cache` for every fetch. Enables caching.
    pub fn with_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = cache;
        self.cache_enabled = true;
        self
    }

    /// Turn cache lookups and write-backs on or off.
    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// Set the expiry used for cache write-backs.
    pub fn with_expiry(mut self, expiry: Option<Duration>) -> Self {
        self.expiry = expiry;
        self
    }

    /// Whether the cache is consulted.
    pub fn cache_enabled(&self) -> bool {
        self.cache_enabled
    }

    /// Build the HTTP transport and cache described by `config`.
    #[cfg(feature = "http")]
    pub fn from_config(config: &crate::config::SmodelConfig) -> crate::Result<Self> {
        use crate::config::CacheBackend;

        let fetcher = super::HttpFetcher::from_config(&config.fetch)?;
        let cache: Arc<dyn Cache> = match config.cache.backend {
            CacheBackend::None => Arc::new(NoCache),
            #[cfg(feature = "redis")]
            CacheBackend::Redis => Arc::new(crate::cache::RedisCache::open(&config.cache.redis_url)?),
            #[cfg(not(feature = "redis"))]
            CacheBackend::Redis => {
                return Err(crate::SmodelError::Config(
                    "redis cache backend requires the `redis` feature".to_string(),
                ));
            }
        };

        Ok(Self::new(fetcher)
            .with_cache(cache)
            .with_cache_enabled(config.cache.enabled)
            .with_expiry(config.cache_expiry()))
    }

    /// Fetch the content at `url`.
    ///
    /// Cache failures never surface here; transport failures do.
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        if self.cache_enabled {
            if let Some(cached) = self.cache.get(url) {
                debug!("Cache hit for {}", url);
                return Ok(cached);
            }
            debug!("Cache miss for {}", url);
        }

        info!("Fetching {}", url);
        let content = self.fetcher.get(url)?;

        if self.cache_enabled {
            self.cache.set(url, &content, self.expiry);
        }

        Ok(content)
    }
}

impl fmt::Debug for DocumentSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentSource")
            .field("cache_enabled", &self.cache_enabled)
            .field("expiry", &self.expiry)
            .finish_non_exhaustive()
    }
}
