//! Model definitions: declared fields, hooks and default mappings.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::mappings::{Mappings, Query};
use super::record::Record;
use crate::error::HookError;
use crate::field::{FieldDescriptor, Value};
use crate::selector::Document;

/// Custom post-processing for one field, given its raw snapshot value.
pub type FieldHook = Arc<dyn Fn(&Value) -> Result<Value, HookError> + Send + Sync>;

/// Model-level finalization run after every field has been reconciled.
pub type PostParseHook = Arc<dyn Fn(&mut Record, &ParseContext<'_>) + Send + Sync>;

/// What a [`PostParseHook`] can see besides the record.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// The model's target URL, if one is set.
    pub url: Option<&'a str>,
    /// The document that was parsed.
    pub document: &'a Document,
}

/// The fixed shape of a model: what to extract and how to post-process it.
///
/// Build one with [`Schema::builder`]. A schema is cheap to clone and can be
/// shared between threads; each [`ExtractionModel`](super::ExtractionModel)
/// binds its own copy of the declared fields.
#[derive(Clone, Default)]
pub struct Schema {
    fields: IndexMap<String, FieldDescriptor>,
    mappings: Mappings,
    hooks: HashMap<String, FieldHook>,
    post_parse: Option<PostParseHook>,
}

impl Schema {
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Declared fields in declaration order, keyed by identifier.
    pub fn fields(&self) -> &IndexMap<String, FieldDescriptor> {
        &self.fields
    }

    /// Default mappings copied into every model instance.
    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    /// The custom hook registered for `identifier`.
    pub fn hook(&self, identifier: &str) -> Option<&FieldHook> {
        self.hooks.get(identifier)
    }

    pub fn post_parse(&self) -> Option<&PostParseHook> {
        self.post_parse.as_ref()
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut hooks: Vec<&str> = self.hooks.keys().map(String::as_str).collect();
        hooks.sort_unstable();
        f.debug_struct("Schema")
            .field("fields", &self.fields)
            .field("mappings", &self.mappings)
            .field("hooks", &hooks)
            .field("post_parse", &self.post_parse.is_some())
            .finish()
    }
}

/// Registers fields, hooks and mappings for a [`Schema`].
#[derive(Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Declare a field. Re-declaring an identifier replaces the earlier field
    /// in its original position.
    pub fn field(mut self, identifier: impl Into<String>, field: FieldDescriptor) -> Self {
        self.schema.fields.insert(identifier.into(), field);
        self
    }

    /// Add a default mapping override.
    pub fn mapping(mut self, identifier: impl Into<String>, query: Query) -> Self {
        self.schema.mappings.insert(identifier, query);
        self
    }

    /// Add every mapping in `mappings`, overwriting shared identifiers.
    pub fn mappings(mut self, mappings: Mappings) -> Self {
        self.schema.mappings.extend(mappings);
        self
    }

    /// Register the custom hook for `identifier`.
    ///
    /// The hook receives the value the field had before any hook ran. An
    /// error or panic leaves that value in place.
    pub fn hook<F>(mut self, identifier: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&Value) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        self.schema.hooks.insert(identifier.into(), Arc::new(hook));
        self
    }

    /// Register the model-level finalization hook.
    pub fn post_parse<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Record, &ParseContext<'_>) + Send + Sync + 'static,
    {
        self.schema.post_parse = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

/// A type that declares an extraction schema.
pub trait Model {
    fn schema() -> Schema;
}
