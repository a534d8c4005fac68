//! Dynamically typed extracted values.

use std::fmt;

use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::selector::Selection;

/// A value held in the result record.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    /// Absent.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
    /// Unprocessed query matches.
    Nodes(Selection),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Absent or the empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_nodes(&self) -> Option<&Selection> {
        match self {
            Value::Nodes(selection) => Some(selection),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Convert to a JSON value; node matches become their extracted strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::List(items) => serde_json::Value::Array(items.iter().map(Value::to_json).collect()),
            Value::Nodes(selection) => serde_json::Value::Array(
                selection
                    .extract()
                    .into_iter()
                    .map(serde_json::Value::String)
                    .collect(),
            ),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::Int(i) => serializer.serialize_i64(*i),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::Text(s) => serializer.serialize_str(s),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Nodes(selection) => {
                let mut seq = serializer.serialize_seq(Some(selection.len()))?;
                for node in selection {
                    seq.serialize_element(node.extract())?;
                }
                seq.end()
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Text(s) => f.write_str(s),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Nodes(selection) => write!(f, "{:?}", selection.extract()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Selection> for Value {
    fn from(selection: Selection) -> Self {
        Value::Nodes(selection)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::Node;

    #[test]
    fn test_blank() {
        assert!(Value::Null.is_blank());
        assert!(Value::from("").is_blank());
        assert!(!Value::from("x").is_blank());
        assert!(!Value::List(vec![]).is_blank());
    }

    #[test]
    fn test_nodes_serialize_as_extracted_strings() {
        let nodes = Selection::new(vec![
            Node::Text("a".to_string()),
            Node::Attribute { name: "href".to_string(), value: "/b".to_string() },
        ]);
        let json = serde_json::to_string(&Value::Nodes(nodes.clone())).unwrap();
        assert_eq!(json, r#"["a","/b"]"#);
        assert_eq!(Value::Nodes(nodes).to_json(), serde_json::json!(["a", "/b"]));
    }

    #[test]
    fn test_display() {
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(list.to_string(), "[a, b]");
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::from(Some(3i64)).to_string(), "3");
    }
}
