//! Runtime mapping overrides and their JSON loaders.
//!
//! A mapping file is a flat JSON object. Each value is either a plain string
//! (a CSS query) or a single-key object naming the kind:
//!
//! ```json
//! {
//!     "name": {"css": "div#test"},
//!     "phone": {"xpath": "//phone"},
//!     "location": ".location"
//! }
//! ```

use std::fs;
use std::io::Read;
use std::path::Path;

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::MappingError;
use crate::selector::QueryKind;

/// Result type for mapping operations.
pub type Result<T> = std::result::Result<T, MappingError>;

/// A query of a given kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    pub kind: QueryKind,
    pub query: String,
}

impl Query {
    pub fn new(kind: QueryKind, query: impl Into<String>) -> Self {
        Self {
            kind,
            query: query.into(),
        }
    }

    pub fn css(query: impl Into<String>) -> Self {
        Self::new(QueryKind::Css, query)
    }

    pub fn xpath(query: impl Into<String>) -> Self {
        Self::new(QueryKind::Xpath, query)
    }

    /// Interpret one mapping-file entry.
    pub fn from_json(identifier: &str, value: &serde_json::Value) -> Result<Self> {
        let malformed = |reason: String| MappingError::Malformed {
            identifier: identifier.to_string(),
            reason,
        };

        match value {
            serde_json::Value::String(query) => Ok(Query::css(query.clone())),
            serde_json::Value::Object(map) => {
                let mut entries = map.iter();
                let (Some((kind, query)), None) = (entries.next(), entries.next()) else {
                    return Err(malformed(format!(
                        "expected exactly one kind/query pair, found {}",
                        map.len()
                    )));
                };
                let kind = QueryKind::from_name(kind)
                    .ok_or_else(|| malformed(format!("unknown query kind {:?}", kind)))?;
                let query = query
                    .as_str()
                    .ok_or_else(|| malformed("query must be a string".to_string()))?;
                Ok(Query::new(kind, query))
            }
            _ => Err(malformed(
                "expected a string or a single-key object".to_string(),
            )),
        }
    }
}

impl Serialize for Query {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.kind.as_str(), &self.query)?;
        map.end()
    }
}

/// Identifier to query overrides, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct Mappings {
    entries: IndexMap<String, Query>,
}

impl Mappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON mapping document.
    ///
    /// Every entry is validated before anything is returned.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;
        let serde_json::Value::Object(object) = value else {
            return Err(MappingError::NotAnObject);
        };

        object
            .iter()
            .map(|(identifier, entry)| {
                Query::from_json(identifier, entry).map(|query| (identifier.clone(), query))
            })
            .collect()
    }

    /// Merge mappings from a JSON string; incoming keys overwrite existing ones.
    pub fn load_from_str(&mut self, json: &str) -> Result<()> {
        let incoming = Self::from_json_str(json)?;
        self.extend(incoming);
        Ok(())
    }

    /// Merge mappings from a JSON file.
    pub fn load_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let json = fs::read_to_string(path)?;
        self.load_from_str(&json)
    }

    /// Merge mappings read from an open stream.
    pub fn load_from_reader(&mut self, mut reader: impl Read) -> Result<()> {
        let mut json = String::new();
        reader.read_to_string(&mut json)?;
        self.load_from_str(&json)
    }

    pub fn insert(&mut self, identifier: impl Into<String>, query: Query) -> Option<Query> {
        self.entries.insert(identifier.into(), query)
    }

    pub fn get(&self, identifier: &str) -> Option<&Query> {
        self.entries.get(identifier)
    }

    pub fn remove(&mut self, identifier: &str) -> Option<Query> {
        self.entries.shift_remove(identifier)
    }

    pub fn contains_key(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Query> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Extend<(String, Query)> for Mappings {
    fn extend<I: IntoIterator<Item = (String, Query)>>(&mut self, iter: I) {
        self.entries.extend(iter);
    }
}

impl IntoIterator for Mappings {
    type Item = (String, Query);
    type IntoIter = indexmap::map::IntoIter<String, Query>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a Mappings {
    type Item = (&'a String, &'a Query);
    type IntoIter = indexmap::map::Iter<'a, String, Query>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(String, Query)> for Mappings {
    fn from_iter<I: IntoIterator<Item = (String, Query)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
