//! Ordered result store.

use std::ops::Index;

use indexmap::IndexMap;
use serde::Serialize;

use crate::field::Value;

static NULL: Value = Value::Null;

/// Identifier to value mapping produced by a parse, in insertion order.
///
/// Missing keys read as [`Value::Null`] through [`Record::attr`] and indexing,
/// so `record["name"]` and `record.attr("name")` are interchangeable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Record {
    entries: IndexMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.entries.get_mut(key)
    }

    /// Attribute-style read: the stored value, or `Null` when absent.
    pub fn attr(&self, name: &str) -> &Value {
        self.entries.get(name).unwrap_or(&NULL)
    }

    /// Attribute-style write.
    pub fn set_attr(&mut self, name: &str, value: impl Into<Value>) {
        self.entries.insert(name.to_string(), value.into());
    }

    /// Insert or overwrite. An existing key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Index<&str> for Record {
    type Output = Value;

    fn index(&self, key: &str) -> &Value {
        self.attr(key)
    }
}

impl<'a> IntoIterator for &'a Record {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_and_index_access_agree() {
        let mut record = Record::new();
        record.set_attr("name", "Bruno");
        record.insert("company", Value::from("ACME"));

        assert_eq!(record.attr("name"), &record["name"]);
        assert_eq!(record["company"], Value::from("ACME"));
        assert!(record["missing"].is_null());
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut record = Record::new();
        record.insert("a", Value::Int(1));
        record.insert("b", Value::Int(2));
        record.insert("a", Value::Int(3));

        assert_eq!(record.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(record["a"], Value::Int(3));
    }

    #[test]
    fn test_serializes_as_object() {
        let record: Record = vec![
            ("b".to_string(), Value::from("x")),
            ("a".to_string(), Value::Null),
        ]
        .into_iter()
        .collect();
        assert_eq!(serde_json::to_string(&record).unwrap(), r#"{"b":"x","a":null}"#);
    }
}
