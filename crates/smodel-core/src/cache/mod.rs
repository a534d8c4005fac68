//! Cache port used by the document source.
//!
//! Implementations fail open: a backend that cannot be reached behaves like an
//! empty cache and never returns an error to the caller.

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "redis")]
pub use self::redis::RedisCache;

use std::time::Duration;

/// Key-value cache capability.
pub trait Cache: Send + Sync {
    /// Look up a cached value.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a value, optionally expiring after `ttl`.
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>);
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl Cache for NoCache {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) {}
}
