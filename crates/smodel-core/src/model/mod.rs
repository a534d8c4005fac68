//! Extraction model: binds a schema to a document and runs the parse pipeline.
//!
//! A parse runs these steps in order, once, to completion:
//!
//! 1. Every declared field runs its query and stores its collapsed, processed
//!    value under its identifier.
//! 2. Every mapping re-runs its query and overwrites the record entry with the
//!    raw matches. Mappings always win over declared fields.
//! 3. The record is snapshotted.
//! 4. Each identifier with a registered hook is replaced by the hook's result
//!    on the snapshot value. A failing hook is logged and its entry kept.
//! 5. Every bound field's value is set from the record.
//! 6. The schema's `post_parse` hook may edit the record freely.
//! 7. Identifiers without a field get a generic field, then every field is
//!    re-synced so `field.value() == record[field.identifier()]`.

mod mappings;
mod record;
mod schema;

pub use mappings::{Mappings, Query};
pub use record::Record;
pub use schema::{FieldHook, Model, ParseContext, PostParseHook, Schema, SchemaBuilder};

use std::any::Any;
use std::io::Read;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, error, info};

use crate::error::{FetchError, HookError, MappingError, Result};
use crate::fetch::DocumentSource;
use crate::field::{FieldDescriptor, Value};
use crate::populate::{self, Populate};
use crate::selector::{Document, Select};

/// Orchestrates extraction for one target.
///
/// An instance owns its record, snapshot and memoized document, so separate
/// instances never share mutable state. Instances are not `Send`; build one
/// per thread from a shared [`Schema`].
pub struct ExtractionModel {
    schema: Schema,
    fields: IndexMap<String, FieldDescriptor>,
    mappings: Mappings,
    record: Record,
    raw_snapshot: Record,
    url: Option<String>,
    source: Option<DocumentSource>,
    document: Option<Rc<Document>>,
    refresh: bool,
}

impl ExtractionModel {
    /// Create a model and bind the schema's declared fields.
    pub fn new(schema: Schema) -> Self {
        let fields = schema
            .fields()
            .iter()
            .map(|(identifier, field)| {
                let mut field = field.clone();
                field.bind(identifier);
                (identifier.clone(), field)
            })
            .collect();

        Self {
            mappings: schema.mappings().clone(),
            fields,
            schema,
            record: Record::new(),
            raw_snapshot: Record::new(),
            url: None,
            source: None,
            document: None,
            refresh: false,
        }
    }

    /// Create a model for a type that declares its schema.
    pub fn of<M: Model>() -> Self {
        Self::new(M::schema())
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_source(mut self, source: DocumentSource) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the mapping table.
    pub fn with_mappings(mut self, mappings: Mappings) -> Self {
        self.mappings = mappings;
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Change the target URL. The memoized document is dropped.
    pub fn set_url(&mut self, url: impl Into<String>) {
        self.url = Some(url.into());
        self.document = None;
    }

    /// Force a re-fetch on the next document access.
    pub fn set_refresh(&mut self, refresh: bool) {
        self.refresh = refresh;
    }

    pub fn mappings(&self) -> &Mappings {
        &self.mappings
    }

    pub fn mappings_mut(&mut self) -> &mut Mappings {
        &mut self.mappings
    }

    /// Merge mappings from a JSON string.
    pub fn load_mappings_from_str(&mut self, json: &str) -> std::result::Result<(), MappingError> {
        self.mappings.load_from_str(json)
    }

    /// Merge mappings from a JSON file.
    pub fn load_mappings_from_path(
        &mut self,
        path: impl AsRef<Path>,
    ) -> std::result::Result<(), MappingError> {
        self.mappings.load_from_path(path)
    }

    /// Merge mappings from an open stream.
    pub fn load_mappings_from_reader(
        &mut self,
        reader: impl Read,
    ) -> std::result::Result<(), MappingError> {
        self.mappings.load_from_reader(reader)
    }

    /// The record from the most recent parse.
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// The record as it was just before custom hooks ran.
    pub fn raw_snapshot(&self) -> &Record {
        &self.raw_snapshot
    }

    /// Shorthand for `record().get(identifier)`.
    pub fn value(&self, identifier: &str) -> Option<&Value> {
        self.record.get(identifier)
    }

    /// The bound field for `identifier`, declared or promoted.
    pub fn field(&self, identifier: &str) -> Option<&FieldDescriptor> {
        self.fields.get(identifier)
    }

    /// Every bound field, declared fields first.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.values()
    }

    /// Fetch the raw content at the model's URL.
    pub fn fetch(&mut self) -> Result<Vec<u8>> {
        let url = self.url.clone().ok_or(FetchError::NoUrl)?;
        let content = self.source()?.fetch(&url)?;
        Ok(content)
    }

    /// The memoized document, fetching it on first use or after a refresh.
    pub fn document(&mut self) -> Result<Rc<Document>> {
        if let Some(document) = &self.document {
            if !self.refresh {
                return Ok(Rc::clone(document));
            }
        }

        let content = self.fetch()?;
        let document = Rc::new(Document::from_bytes(&content));
        self.document = Some(Rc::clone(&document));
        self.refresh = false;
        Ok(document)
    }

    /// Fetch (or reuse) the model's document and parse it.
    pub fn parse(&mut self) -> Result<&Record> {
        let document = self.document()?;
        self.parse_document(&document)
    }

    /// Parse a caller-supplied document.
    pub fn parse_document(&mut self, document: &Document) -> Result<&Record> {
        let mut record = Record::new();
        let mut raw_values = Vec::with_capacity(self.fields.len());

        for (identifier, field) in &self.fields {
            if let Some((raw, value)) = field.extract(document)? {
                raw_values.push((identifier.clone(), raw));
                record.insert(identifier.clone(), value);
            }
        }

        for (identifier, query) in &self.mappings {
            let selection = document.select(query.kind, &query.query)?;
            record.insert(identifier.clone(), Value::Nodes(selection));
        }

        // All queries succeeded.
        for (identifier, raw) in raw_values {
            if let Some(field) = self.fields.get_mut(&identifier) {
                field.set_raw_value(Some(Value::Nodes(raw)));
            }
        }

        let raw_snapshot = record.clone();
        debug!("Extracted {} entries, running hooks", raw_snapshot.len());

        for (identifier, raw) in &raw_snapshot {
            let Some(hook) = self.schema.hook(identifier) else {
                continue;
            };
            match run_hook(hook, raw) {
                Ok(value) => {
                    record.insert(identifier.clone(), value);
                }
                Err(e) => error!("Hook for field {} failed: {}", identifier, e),
            }
        }

        self.sync_fields(&record);

        if let Some(post_parse) = self.schema.post_parse() {
            let context = ParseContext {
                url: self.url.as_deref(),
                document,
            };
            post_parse(&mut record, &context);
        }

        for (identifier, value) in &record {
            if !self.fields.contains_key(identifier) {
                debug!("Promoting {} to a generic field", identifier);
                self.fields.insert(
                    identifier.clone(),
                    FieldDescriptor::generic(identifier.clone(), value.clone()),
                );
            }
        }
        self.sync_fields(&record);

        info!(
            "Parsed {} fields ({} mapped)",
            record.len(),
            self.mappings.len()
        );

        self.record = record;
        self.raw_snapshot = raw_snapshot;
        Ok(&self.record)
    }

    /// Copy record entries onto `target`; every identifier when `None`.
    pub fn populate<T: Populate + ?Sized>(&self, target: &mut T, identifiers: Option<&[&str]>) {
        populate::populate(&self.record, target, identifiers);
    }

    fn source(&mut self) -> std::result::Result<&DocumentSource, FetchError> {
        #[cfg(feature = "http")]
        if self.source.is_none() {
            let fetcher = crate::fetch::HttpFetcher::new()?;
            self.source = Some(DocumentSource::new(fetcher));
        }
        self.source.as_ref().ok_or(FetchError::NoSource)
    }

    fn sync_fields(&mut self, record: &Record) {
        for field in self.fields.values_mut() {
            field.set_value(record.get(field.identifier()).cloned());
        }
    }
}

impl std::fmt::Debug for ExtractionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionModel")
            .field("url", &self.url)
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("mappings", &self.mappings)
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

fn run_hook(hook: &FieldHook, raw: &Value) -> std::result::Result<Value, HookError> {
    match panic::catch_unwind(AssertUnwindSafe(|| hook(raw))) {
        Ok(result) => result,
        Err(payload) => Err(panic_message(payload).into()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Node;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<html><body>
        <h1 id="title">Hello</h1>
        <p class="a">first</p>
        <p class="a">second</p>
        <span>aside</span>
    </body></html>"#;

    fn schema() -> Schema {
        Schema::builder()
            .field("title", FieldDescriptor::css("h1::text").take_first())
            .field("paragraphs", FieldDescriptor::css("p.a::text").extract_all())
            .field("span", FieldDescriptor::xpath("//span/text()").take_first())
            .build()
    }

    #[test]
    fn test_declared_fields_are_bound() {
        let model = ExtractionModel::new(schema());
        let identifiers: Vec<&str> = model.fields().map(FieldDescriptor::identifier).collect();
        assert_eq!(identifiers, vec!["title", "paragraphs", "span"]);
        assert!(schema().fields()["title"].identifier().is_empty());
    }

    #[test]
    fn test_parse_declared_fields() {
        let doc = Document::parse(PAGE);
        let mut model = ExtractionModel::new(schema());
        let record = model.parse_document(&doc).unwrap();

        assert_eq!(record["title"], Value::from("Hello"));
        assert_eq!(record["paragraphs"], Value::from(vec!["first", "second"]));
        assert_eq!(record["span"], Value::from("aside"));
        assert_eq!(
            model.field("title").and_then(FieldDescriptor::raw_value),
            Some(&Value::Nodes(vec![Node::Text("Hello".to_string())].into_iter().collect()))
        );
    }

    #[test]
    fn test_mapping_overrides_declared_field() {
        let doc = Document::parse(PAGE);
        let mut model = ExtractionModel::new(schema());
        model.mappings_mut().insert("title", Query::css("span::text"));

        model.parse_document(&doc).unwrap();

        let expected = Value::Nodes(vec![Node::Text("aside".to_string())].into_iter().collect());
        assert_eq!(model.record()["title"], expected);
        assert_eq!(model.field("title").and_then(FieldDescriptor::value), Some(&expected));
        assert_eq!(
            model.record().keys().collect::<Vec<_>>(),
            vec!["title", "paragraphs", "span"]
        );
    }

    #[test]
    fn test_hook_failure_keeps_pre_hook_value() {
        let schema = Schema::builder()
            .field("title", FieldDescriptor::css("h1::text").take_first())
            .field("span", FieldDescriptor::css("span::text").take_first())
            .hook("title", |_| Err("boom".into()))
            .hook("span", |raw| Ok(Value::Text(format!("{}!", raw))))
            .build();
        let doc = Document::parse(PAGE);
        let mut model = ExtractionModel::new(schema);

        model.parse_document(&doc).unwrap();

        assert_eq!(model.record()["title"], Value::from("Hello"));
        assert_eq!(model.record()["span"], Value::from("aside!"));
        assert_eq!(model.raw_snapshot()["span"], Value::from("aside"));
    }

    #[test]
    fn test_panicking_hook_is_contained() {
        let schema = Schema::builder()
            .field("title", FieldDescriptor::css("h1::text"))
            .hook("title", |raw| {
                let first = raw.as_nodes().unwrap().extract()[5].clone();
                Ok(Value::Text(first))
            })
            .build();
        let doc = Document::parse(PAGE);
        let mut model = ExtractionModel::new(schema);

        model.parse_document(&doc).unwrap();

        assert_eq!(model.record()["title"], model.raw_snapshot()["title"]);
    }

    #[test]
    fn test_post_parse_entries_are_promoted() {
        let schema = Schema::builder()
            .field("title", FieldDescriptor::css("h1::text").take_first())
            .post_parse(|record, ctx| {
                record.set_attr("url", Value::from(ctx.url.map(str::to_string)));
                record.set_attr("title", "Rewritten");
            })
            .build();
        let doc = Document::parse(PAGE);
        let mut model = ExtractionModel::new(schema).with_url("http://example.com/page");

        model.parse_document(&doc).unwrap();

        let url = model.field("url").unwrap();
        assert!(url.is_generic());
        assert_eq!(url.value(), Some(&Value::from("http://example.com/page")));
        assert_eq!(
            model.field("title").and_then(FieldDescriptor::value),
            Some(&Value::from("Rewritten"))
        );
    }

    #[test]
    fn test_every_record_entry_has_a_matching_field() {
        let doc = Document::parse(PAGE);
        let mut model = ExtractionModel::new(schema());
        model.mappings_mut().insert("extra", Query::xpath("//p"));

        model.parse_document(&doc).unwrap();

        for (identifier, value) in model.record() {
            let field = model.field(identifier).unwrap();
            assert_eq!(field.identifier(), identifier);
            assert_eq!(field.value(), Some(value));
        }
    }

    #[test]
    fn test_invalid_query_aborts_parse() {
        let doc = Document::parse(PAGE);
        let mut model = ExtractionModel::new(schema());
        model.mappings_mut().insert("bad", Query::xpath("//p["));

        assert!(model.parse_document(&doc).is_err());
        assert!(model.record().is_empty());
    }

    #[test]
    fn test_failed_parse_keeps_previous_raw_values() {
        let schema = Schema::builder()
            .field("t", FieldDescriptor::css("h1::text").take_first())
            .build();
        let mut model = ExtractionModel::new(schema);
        model.parse_document(&Document::parse("<h1>one</h1>")).unwrap();

        model.mappings_mut().insert("bad", Query::xpath("//p["));
        assert!(model.parse_document(&Document::parse("<h1>two</h1>")).is_err());

        let one = Value::Nodes(vec![Node::Text("one".to_string())].into_iter().collect());
        assert_eq!(model.record()["t"], Value::from("one"));
        assert_eq!(model.field("t").and_then(FieldDescriptor::value), Some(&Value::from("one")));
        assert_eq!(model.field("t").and_then(FieldDescriptor::raw_value), Some(&one));
    }

    #[test]
    fn test_parse_without_url_fails() {
        let mut model = ExtractionModel::new(schema())
            .with_source(DocumentSource::new(|_: &str| Ok::<_, FetchError>(Vec::new())));
        assert!(matches!(
            model.parse(),
            Err(crate::SmodelError::Fetch(FetchError::NoUrl))
        ));
    }
}
