//! Field descriptors: declarative units describing one extraction.

pub mod processor;
mod value;

pub use processor::{Processor, apply_chain};
pub use value::Value;

use std::fmt;

use crate::error::SelectorError;
use crate::selector::{QueryKind, Select, Selection};

/// How a field locates its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// CSS selector query.
    Css,
    /// XPath query.
    Xpath,
    /// No query; the value is supplied directly.
    Generic,
}

impl FieldKind {
    /// The query language, if this kind runs a query.
    pub fn query_kind(&self) -> Option<QueryKind> {
        match self {
            FieldKind::Css => Some(QueryKind::Css),
            FieldKind::Xpath => Some(QueryKind::Xpath),
            FieldKind::Generic => None,
        }
    }
}

impl From<QueryKind> for FieldKind {
    fn from(kind: QueryKind) -> Self {
        match kind {
            QueryKind::Css => FieldKind::Css,
            QueryKind::Xpath => FieldKind::Xpath,
        }
    }
}

/// Policy for collapsing a query's matches into one stored value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExtractionMode {
    /// Keep the matches themselves.
    #[default]
    RawNode,
    /// The first extracted value that is neither absent nor empty.
    TakeFirst,
    /// Every extracted value as a list.
    ExtractAll,
}

/// A declarative unit describing how to extract and post-process one value.
///
/// Descriptors are unbound (empty identifier) until an
/// [`ExtractionModel`](crate::model::ExtractionModel) is constructed from the
/// schema that declares them.
#[derive(Clone)]
pub struct FieldDescriptor {
    query: String,
    kind: FieldKind,
    mode: ExtractionMode,
    processors: Vec<Processor>,
    identifier: String,
    raw_value: Option<Value>,
    value: Option<Value>,
}

impl FieldDescriptor {
    /// A field running `query` of the given kind.
    pub fn new(kind: QueryKind, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            kind: kind.into(),
            mode: ExtractionMode::default(),
            processors: Vec::new(),
            identifier: String::new(),
            raw_value: None,
            value: None,
        }
    }

    /// A CSS selector field.
    pub fn css(query: impl Into<String>) -> Self {
        Self::new(QueryKind::Css, query)
    }

    /// An XPath field.
    pub fn xpath(query: impl Into<String>) -> Self {
        Self::new(QueryKind::Xpath, query)
    }

    /// A bound field holding `value` without any query.
    pub fn generic(identifier: impl Into<String>, value: Value) -> Self {
        Self {
            query: String::new(),
            kind: FieldKind::Generic,
            mode: ExtractionMode::default(),
            processors: Vec::new(),
            identifier: identifier.into(),
            raw_value: None,
            value: Some(value),
        }
    }

    /// Keep only the first non-blank extracted value.
    pub fn take_first(self) -> Self {
        self.with_mode(ExtractionMode::TakeFirst)
    }

    /// Keep every extracted value.
    pub fn extract_all(self) -> Self {
        self.with_mode(ExtractionMode::ExtractAll)
    }

    pub fn with_mode(mut self, mode: ExtractionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Append a transform to the processor chain.
    pub fn processor<F>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.processors.push(processor::processor(f));
        self
    }

    /// Append already-built processors to the chain.
    pub fn with_processors(mut self, chain: impl IntoIterator<Item = Processor>) -> Self {
        self.processors.extend(chain);
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Key of this field in the result record; empty while unbound.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn is_bound(&self) -> bool {
        !self.identifier.is_empty()
    }

    pub fn is_generic(&self) -> bool {
        self.kind == FieldKind::Generic
    }

    /// The unprocessed matches from the most recent extraction.
    pub fn raw_value(&self) -> Option<&Value> {
        self.raw_value.as_ref()
    }

    /// The final record value for this field after the most recent parse.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub(crate) fn bind(&mut self, identifier: &str) {
        self.identifier = identifier.to_string();
    }

    pub(crate) fn set_value(&mut self, value: Option<Value>) {
        self.value = value;
    }

    pub(crate) fn set_raw_value(&mut self, raw_value: Option<Value>) {
        self.raw_value = raw_value;
    }

    /// Run the query against `target` and collapse the matches.
    ///
    /// Returns the raw matches alongside the collapsed value, or `None` for
    /// generic fields, which have nothing to run. The field itself is left
    /// untouched.
    pub(crate) fn extract(
        &self,
        target: &impl Select,
    ) -> Result<Option<(Selection, Value)>, SelectorError> {
        let Some(kind) = self.kind.query_kind() else {
            return Ok(None);
        };
        let selection = target.select(kind, &self.query)?;
        let value = self.collapse(selection.clone());
        Ok(Some((selection, value)))
    }

    /// Collapse matches according to the extraction mode, then process them.
    pub fn collapse(&self, selection: Selection) -> Value {
        match self.mode {
            ExtractionMode::RawNode => self.process(Value::Nodes(selection)),
            ExtractionMode::TakeFirst | ExtractionMode::ExtractAll => {
                let values = selection.extract().into_iter().map(Value::Text).collect();
                self.collapse_values(values)
            }
        }
    }

    fn collapse_values(&self, values: Vec<Value>) -> Value {
        if self.mode == ExtractionMode::TakeFirst {
            if let Some(first) = values.iter().find(|v| !v.is_blank()) {
                return self.process(first.clone());
            }
        }
        self.process(Value::List(values))
    }

    fn process(&self, value: Value) -> Value {
        apply_chain(&self.processors, value)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("identifier", &self.identifier)
            .field("kind", &self.kind)
            .field("query", &self.query)
            .field("mode", &self.mode)
            .field("processors", &self.processors.len())
            .field("value", &self.value)
            .finish()
    }
}

impl fmt::Display for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}", value),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Document;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<html><body>
        <table>
            <tr><td class="c"></td></tr>
            <tr><td class="c">dutch</td></tr>
            <tr><td class="c">american</td></tr>
        </table>
    </body></html>"#;

    #[test]
    fn test_take_first_skips_blank_values() {
        let field = FieldDescriptor::css("td").take_first().processor(|v| {
            Value::Text(format!("<{}>", v))
        });
        let values = vec![
            Value::from(""),
            Value::Null,
            Value::from("X"),
            Value::from("Y"),
        ];
        assert_eq!(field.collapse_values(values), Value::from("<X>"));
    }

    #[test]
    fn test_take_first_falls_through_to_full_collection() {
        let field = FieldDescriptor::css("td")
            .take_first()
            .processor(|v| Value::Int(v.as_list().map_or(-1, |l| l.len() as i64)));
        assert_eq!(
            field.collapse_values(vec![Value::from(""), Value::Null]),
            Value::Int(2)
        );
        assert_eq!(field.collapse_values(Vec::new()), Value::Int(0));
    }

    #[test]
    fn test_extract_all_processes_whole_collection() {
        let field = FieldDescriptor::css("td").extract_all().processor(|v| {
            Value::Int(v.as_list().map_or(0, |l| l.len() as i64))
        });
        assert_eq!(
            field.collapse_values(vec![Value::from("A"), Value::from("B")]),
            Value::Int(2)
        );
    }

    #[test]
    fn test_extract_against_document() {
        let doc = Document::parse(PAGE);
        let field = FieldDescriptor::css("td.c::text")
            .take_first()
            .with_processors([processor::uppercase()]);

        let (raw, value) = field.extract(&doc).unwrap().unwrap();
        assert_eq!(value, Value::from("DUTCH"));
        assert_eq!(raw.extract(), vec!["dutch", "american"]);
        assert_eq!(field.raw_value(), None);
    }

    #[test]
    fn test_raw_node_keeps_matches() {
        let doc = Document::parse(PAGE);
        let field = FieldDescriptor::xpath("//td[@class='c']");
        let (_, value) = field.extract(&doc).unwrap().unwrap();
        assert_eq!(value.as_nodes().map(Selection::len), Some(3));
    }

    #[test]
    fn test_generic_field_runs_nothing() {
        let doc = Document::parse(PAGE);
        let field = FieldDescriptor::generic("url", Value::from("http://x"));
        assert!(field.is_bound());
        assert_eq!(field.extract(&doc).unwrap(), None);
        assert_eq!(field.to_string(), "http://x");
    }
}
