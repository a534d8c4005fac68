//! Document retrieval: the HTTP capability and the cache-aware source.

#[cfg(feature = "http")]
mod http;
mod source;

#[cfg(feature = "http")]
pub use http::HttpFetcher;
pub use source::DocumentSource;

use crate::error::FetchError;

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;

/// Synchronous `GET url -> bytes` capability.
pub trait Fetcher: Send + Sync {
    /// Retrieve the body at `url`.
    fn get(&self, url: &str) -> Result<Vec<u8>>;
}

impl<F> Fetcher for F
where
    F: Fn(&str) -> Result<Vec<u8>> + Send + Sync,
{
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        self(url)
    }
}
