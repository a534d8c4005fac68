//! Redis-backed cache.

use std::sync::Mutex;
use std::time::Duration;

use tracing::{debug, error};

use super::Cache;
use crate::error::CacheError;

/// Networked cache on top of a Redis server.
///
/// The connection is opened lazily and dropped after any failure, so the next
/// call reconnects. Every failure is logged and reported as a miss.
pub struct RedisCache {
    client: ::redis::Client,
    connection: Mutex<Option<::redis::Connection>>,
}

impl RedisCache {
    /// Create a cache for the given `redis://` URL.
    ///
    /// No connection is made here; only the URL is validated.
    pub fn open(url: &str) -> Result<Self, CacheError> {
        let client =
            ::redis::Client::open(url).map_err(|e| CacheError::Config(e.to_string()))?;
        Ok(Self {
            client,
            connection: Mutex::new(None),
        })
    }

    /// Drop the current connection, if any.
    pub fn close(&self) {
        if let Ok(mut guard) = self.connection.lock() {
            guard.take();
        }
    }

    fn with_connection<T>(
        &self,
        op: impl FnOnce(&mut ::redis::Connection) -> ::redis::RedisResult<T>,
    ) -> Result<T, CacheError> {
        let mut guard = self
            .connection
            .lock()
            .map_err(|_| CacheError::Backend("connection lock poisoned".to_string()))?;

        if guard.is_none() {
            let conn = self
                .client
                .get_connection()
                .map_err(|e| CacheError::Backend(e.to_string()))?;
            *guard = Some(conn);
        }

        let Some(conn) = guard.as_mut() else {
            return Err(CacheError::Backend("no connection".to_string()));
        };

        match op(conn) {
            Ok(value) => Ok(value),
            Err(e) => {
                guard.take();
                Err(CacheError::Backend(e.to_string()))
            }
        }
    }
}

impl Cache for RedisCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let result = self.with_connection(|conn| {
            ::redis::cmd("GET")
                .arg(key)
                .query::<Option<Vec<u8>>>(conn)
        });

        match result {
            Ok(value) => {
                debug!("Redis GET {} -> {}", key, if value.is_some() { "hit" } else { "miss" });
                value
            }
            Err(e) => {
                error!("Can't reach Redis server on GET {}: {}", key, e);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        let result = self.with_connection(|conn| {
            let mut cmd = ::redis::cmd("SET");
            cmd.arg(key).arg(value);
            if let Some(ttl) = ttl {
                cmd.arg("EX").arg(ttl.as_secs().max(1));
            }
            cmd.query::<()>(conn)
        });

        if let Err(e) = result {
            error!("Can't reach Redis server on SET {}: {}", key, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Port 1 is never a Redis server; connecting fails immediately.
    const UNREACHABLE: &str = "redis://127.0.0.1:1/";

    #[test]
    fn test_open_rejects_invalid_url() {
        assert!(RedisCache::open("not a url").is_err());
    }

    #[test]
    fn test_unreachable_get_is_a_miss() {
        let cache = RedisCache::open(UNREACHABLE).unwrap();
        assert_eq!(cache.get("http://example.com"), None);
    }

    #[test]
    fn test_unreachable_set_does_not_fail() {
        let cache = RedisCache::open(UNREACHABLE).unwrap();
        cache.set("http://example.com", b"body", Some(Duration::from_secs(60)));
        cache.close();
        assert_eq!(cache.get("http://example.com"), None);
    }
}
