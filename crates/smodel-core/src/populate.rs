//! Copying extracted values onto caller-owned targets.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::field::Value;
use crate::model::Record;

/// A target that accepts named values.
pub trait Populate {
    fn set_attr(&mut self, name: &str, value: Value);
}

impl Populate for HashMap<String, Value> {
    fn set_attr(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value);
    }
}

impl Populate for IndexMap<String, Value> {
    fn set_attr(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value);
    }
}

impl Populate for serde_json::Map<String, serde_json::Value> {
    fn set_attr(&mut self, name: &str, value: Value) {
        self.insert(name.to_string(), value.to_json());
    }
}

impl Populate for Record {
    fn set_attr(&mut self, name: &str, value: Value) {
        self.insert(name, value);
    }
}

/// Copy entries of `record` onto `target`.
///
/// With `identifiers` set, only those names are written and a name missing
/// from the record is written as [`Value::Null`]. Otherwise every entry is
/// copied in record order.
pub fn populate<T: Populate + ?Sized>(record: &Record, target: &mut T, identifiers: Option<&[&str]>) {
    match identifiers {
        Some(identifiers) => {
            for identifier in identifiers {
                target.set_attr(identifier, record.attr(identifier).clone());
            }
        }
        None => {
            for (identifier, value) in record {
                target.set_attr(identifier, value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record() -> Record {
        let mut record = Record::new();
        record.set_attr("name", "Guido");
        record.set_attr("nationality", "DUTCH");
        record
    }

    #[test]
    fn test_populate_everything() {
        let mut target: IndexMap<String, Value> = IndexMap::new();
        populate(&record(), &mut target, None);
        assert_eq!(target.keys().collect::<Vec<_>>(), vec!["name", "nationality"]);
    }

    #[test]
    fn test_populate_selected_fields_only() {
        let mut target: HashMap<String, Value> = HashMap::new();
        populate(&record(), &mut target, Some(&["name"]));

        assert_eq!(target.len(), 1);
        assert_eq!(target["name"], Value::from("Guido"));
    }

    #[test]
    fn test_missing_identifier_is_written_as_null() {
        let mut target = serde_json::Map::new();
        populate(&record(), &mut target, Some(&["name", "email"]));

        assert_eq!(
            serde_json::Value::Object(target),
            serde_json::json!({"name": "Guido", "email": null})
        );
    }

    struct Person {
        name: String,
        other: Vec<String>,
    }

    impl Populate for Person {
        fn set_attr(&mut self, name: &str, value: Value) {
            match name {
                "name" => self.name = value.to_string(),
                _ => self.other.push(name.to_string()),
            }
        }
    }

    #[test]
    fn test_populate_custom_target() {
        let mut person = Person {
            name: String::new(),
            other: Vec::new(),
        };
        populate(&record(), &mut person, None);
        assert_eq!(person.name, "Guido");
        assert_eq!(person.other, vec!["nationality"]);
    }
}
