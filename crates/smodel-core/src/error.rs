//! Error types for the smodel-core library.

use thiserror::Error;

/// Main error type for the smodel library.
#[derive(Error, Debug)]
pub enum SmodelError {
    /// Document fetch error.
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Query compilation or evaluation error.
    #[error("selector error: {0}")]
    Selector(#[from] SelectorError),

    /// Mapping source error.
    #[error("mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Cache backend error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised while resolving a URL to document content.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The transport could not complete the request.
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Neither the model nor the caller supplied a URL.
    #[error("no URL to fetch")]
    NoUrl,

    /// No document source is configured and no default transport is compiled in.
    #[error("no document source configured")]
    NoSource,
}

/// Errors related to query text.
#[derive(Error, Debug)]
pub enum SelectorError {
    /// The CSS selector could not be parsed.
    #[error("invalid CSS query {query:?}: {reason}")]
    InvalidCss { query: String, reason: String },

    /// The XPath expression could not be compiled or evaluated.
    #[error("invalid XPath query {query:?}: {reason}")]
    InvalidXPath { query: String, reason: String },
}

/// Errors related to loading mapping overrides.
#[derive(Error, Debug)]
pub enum MappingError {
    /// The mapping file could not be read.
    #[error("failed to read mapping source: {0}")]
    Io(#[from] std::io::Error),

    /// The mapping source is not valid JSON.
    #[error("invalid mapping JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The top-level JSON value is not an object.
    #[error("mapping source must be a JSON object")]
    NotAnObject,

    /// An entry is neither a plain string nor a single-key kind/query object.
    #[error("malformed mapping for {identifier}: {reason}")]
    Malformed { identifier: String, reason: String },
}

/// Errors raised by a cache backend.
///
/// Only construction surfaces these; `get`/`set` failures are logged and
/// treated as a miss.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backend URL or parameters are invalid.
    #[error("invalid cache configuration: {0}")]
    Config(String),

    /// The backend could not be reached or rejected the command.
    #[error("cache backend failure: {0}")]
    Backend(String),
}

/// Error returned by a custom per-field hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for the smodel library.
pub type Result<T> = std::result::Result<T, SmodelError>;
