//! CSS selection on the scraper tree.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;
use scraper::{ElementRef, Selector};

use super::{Node, Result};
use crate::error::SelectorError;

lazy_static! {
    // Trailing `::text` or `::attr(name)`.
    static ref PSEUDO_ELEMENT: Regex = Regex::new(
        r"^(?s)(.*?)::(?:(text)|attr\(\s*([^)\s]+)\s*\))\s*$"
    ).unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pseudo {
    Text,
    Attr(String),
}

fn split_pseudo(query: &str) -> (&str, Option<Pseudo>) {
    match PSEUDO_ELEMENT.captures(query) {
        Some(caps) => {
            let base = caps.get(1).map_or("", |m| m.as_str()).trim();
            let pseudo = match caps.get(3) {
                Some(attr) => Pseudo::Attr(attr.as_str().to_string()),
                None => Pseudo::Text,
            };
            (base, Some(pseudo))
        }
        None => (query.trim(), None),
    }
}

/// Run `query` against each scope element and its descendants.
///
/// Element matches come back with the element they were taken from. An empty
/// base selector (a bare `::text`) applies the pseudo-element to the scopes
/// themselves.
pub(crate) fn select<'a>(
    scopes: &[ElementRef<'a>],
    query: &str,
) -> Result<Vec<(Node, Option<ElementRef<'a>>)>> {
    let (base, pseudo) = split_pseudo(query);

    let elements: Vec<ElementRef<'a>> = if base.is_empty() {
        scopes.to_vec()
    } else {
        let selector = Selector::parse(base).map_err(|e| SelectorError::InvalidCss {
            query: query.to_string(),
            reason: e.to_string(),
        })?;
        let mut seen = HashSet::new();
        let mut elements = Vec::new();
        for scope in scopes {
            let own = selector.matches(scope).then_some(*scope);
            for element in own.into_iter().chain(scope.select(&selector)) {
                if seen.insert(element.id()) {
                    elements.push(element);
                }
            }
        }
        elements
    };

    let mut nodes = Vec::new();
    for element in elements {
        match &pseudo {
            None => nodes.push((Node::Element(element.html()), Some(element))),
            Some(Pseudo::Text) => {
                for child in element.children() {
                    if let Some(text) = child.value().as_text() {
                        let text: &str = text;
                        nodes.push((Node::Text(text.to_string()), None));
                    }
                }
            }
            Some(Pseudo::Attr(name)) => {
                if let Some(value) = element.value().attr(name) {
                    let attribute = Node::Attribute {
                        name: name.clone(),
                        value: value.to_string(),
                    };
                    nodes.push((attribute, None));
                }
            }
        }
    }

    Ok(nodes)
}
