//! Processor chains applied to extracted values.

use std::sync::Arc;

use super::Value;

/// A pure transform over an extracted value.
pub type Processor = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Wrap a closure as a [`Processor`].
pub fn processor<F>(f: F) -> Processor
where
    F: Fn(Value) -> Value + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Apply `chain` left to right. An empty chain is the identity.
pub fn apply_chain(chain: &[Processor], value: Value) -> Value {
    chain.iter().fold(value, |acc, f| f(acc))
}

/// Upper-case text values, element-wise over lists.
pub fn uppercase() -> Processor {
    processor(|value| map_text(value, |s| s.to_uppercase()))
}

/// Trim whitespace from text values, element-wise over lists.
pub fn trim() -> Processor {
    processor(|value| map_text(value, |s| s.trim().to_string()))
}

/// Join a list of values into one text value.
pub fn join(separator: &str) -> Processor {
    let separator = separator.to_string();
    processor(move |value| match value {
        Value::List(items) => Value::Text(
            items
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(&separator),
        ),
        other => other,
    })
}

fn map_text(value: Value, f: impl Fn(&str) -> String + Copy) -> Value {
    match value {
        Value::Text(s) => Value::Text(f(&s)),
        Value::List(items) => Value::List(items.into_iter().map(|v| map_text(v, f)).collect()),
        other => other,
    }
}
