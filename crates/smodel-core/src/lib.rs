//! Core library for model-driven field extraction.
//!
//! This crate provides:
//! - Field descriptors (CSS, XPath and generic) with extraction modes and
//!   processor chains
//! - An extraction model that reconciles declared fields, runtime mapping
//!   overrides and per-field hooks into a single ordered record
//! - A cache-aware document source in front of an HTTP transport
//! - Populating arbitrary targets from the extracted record

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod field;
pub mod model;
pub mod populate;
pub mod selector;

pub use cache::{Cache, NoCache};
#[cfg(feature = "redis")]
pub use cache::RedisCache;
pub use config::SmodelConfig;
pub use error::{CacheError, FetchError, HookError, MappingError, Result, SelectorError, SmodelError};
pub use fetch::{DocumentSource, Fetcher};
#[cfg(feature = "http")]
pub use fetch::HttpFetcher;
pub use field::{ExtractionMode, FieldDescriptor, FieldKind, Processor, Value};
pub use model::{
    ExtractionModel, FieldHook, Mappings, Model, ParseContext, PostParseHook, Query, Record,
    Schema, SchemaBuilder,
};
pub use populate::{Populate, populate};
pub use selector::{Document, Node, QueryKind, Select, Selection};
