//! XPath evaluation over an sxd-document copy of the HTML tree.

use std::collections::HashSet;

use scraper::ElementRef;
use sxd_document::Package;
use sxd_document::dom::{self, ChildOfElement, ChildOfRoot, ParentOfChild};
use sxd_xpath::nodeset::Node as XNode;
use sxd_xpath::{Context, Factory, Value, XPath};

use super::{Node, Result};
use crate::error::SelectorError;

/// Elements serialized without a closing tag when empty.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Copy a scraper tree into a fresh XPath document rooted at `root`.
pub(crate) fn build_tree(root: ElementRef<'_>) -> Package {
    let package = Package::new();
    {
        let doc = package.as_document();
        let element = copy_element(&doc, root);
        doc.root().append_child(element);
    }
    package
}

fn copy_element<'d>(doc: &dom::Document<'d>, source: ElementRef<'_>) -> dom::Element<'d> {
    let element = doc.create_element(source.value().name());
    for (name, value) in source.value().attrs() {
        element.set_attribute_value(name, value);
    }
    for child in source.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            element.append_child(copy_element(doc, child_element));
        } else if let Some(text) = child.value().as_text() {
            let text: &str = text;
            element.append_child(doc.create_text(text));
        }
    }
    element
}

pub(crate) fn compile(query: &str) -> Result<XPath> {
    let invalid = |reason: String| SelectorError::InvalidXPath {
        query: query.to_string(),
        reason,
    };
    Factory::new()
        .build(query)
        .map_err(|e| invalid(format!("{:?}", e)))?
        .ok_or_else(|| invalid("empty expression".to_string()))
}

/// Evaluate `query` with each element at `contexts` as the context node, or
/// with the document root when `contexts` is `None`.
///
/// Node-set results are merged across contexts without repeats. Scalar
/// results are kept once per context.
pub(crate) fn evaluate(
    package: &Package,
    contexts: Option<&[&[usize]]>,
    query: &str,
) -> Result<Vec<(Node, Option<Vec<usize>>)>> {
    let xpath = compile(query)?;
    let doc = package.as_document();
    let context = Context::new();

    let context_nodes: Vec<XNode<'_>> = match contexts {
        None => vec![doc.root().into()],
        Some(paths) => paths
            .iter()
            .filter_map(|path| resolve(&doc, path))
            .map(XNode::from)
            .collect(),
    };

    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    for node in context_nodes {
        let value = xpath
            .evaluate(&context, node)
            .map_err(|e| SelectorError::InvalidXPath {
                query: query.to_string(),
                reason: format!("{:?}", e),
            })?;
        match value {
            Value::Nodeset(set) => {
                for found in set.document_order() {
                    if seen.insert(found) {
                        nodes.push(convert(found));
                    }
                }
            }
            Value::String(s) => nodes.push((Node::Text(s), None)),
            Value::Number(n) => nodes.push((Node::Text(format_number(n)), None)),
            Value::Boolean(b) => nodes.push((Node::Text(b.to_string()), None)),
        }
    }
    Ok(nodes)
}

fn resolve<'d>(doc: &dom::Document<'d>, path: &[usize]) -> Option<dom::Element<'d>> {
    let mut current = doc.root().children().into_iter().find_map(|child| match child {
        ChildOfRoot::Element(element) => Some(element),
        _ => None,
    })?;
    for &index in path {
        current = child_elements(current).nth(index)?;
    }
    Some(current)
}

fn element_path(element: dom::Element<'_>) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = element;
    while let Some(ParentOfChild::Element(parent)) = current.parent() {
        let index = child_elements(parent)
            .position(|sibling| sibling == current)
            .unwrap_or(0);
        path.push(index);
        current = parent;
    }
    path.reverse();
    path
}

fn child_elements<'d>(element: dom::Element<'d>) -> impl Iterator<Item = dom::Element<'d>> {
    element.children().into_iter().filter_map(|child| match child {
        ChildOfElement::Element(element) => Some(element),
        _ => None,
    })
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Convert a match, keeping the position of element matches.
fn convert(node: XNode<'_>) -> (Node, Option<Vec<usize>>) {
    match node {
        XNode::Element(element) => (Node::Element(serialize(element)), Some(element_path(element))),
        XNode::Attribute(attribute) => {
            let attribute = Node::Attribute {
                name: attribute.name().local_part().to_string(),
                value: attribute.value().to_string(),
            };
            (attribute, None)
        }
        XNode::Text(text) => (Node::Text(text.text().to_string()), None),
        XNode::Root(root) => {
            let mut out = String::new();
            for child in root.children() {
                if let ChildOfRoot::Element(element) = child {
                    write_element(element, &mut out);
                }
            }
            (Node::Element(out), None)
        }
        other => (Node::Text(other.string_value()), None),
    }
}

fn serialize(element: dom::Element<'_>) -> String {
    let mut out = String::new();
    write_element(element, &mut out);
    out
}

fn write_element(element: dom::Element<'_>, out: &mut String) {
    let name = element.name().local_part();
    out.push('<');
    out.push_str(name);
    for attribute in element.attributes() {
        out.push(' ');
        out.push_str(attribute.name().local_part());
        out.push_str("=\"");
        push_escaped(out, attribute.value(), true);
        out.push('"');
    }
    out.push('>');

    let children = element.children();
    if children.is_empty() && VOID_ELEMENTS.contains(&name) {
        return;
    }

    for child in children {
        match child {
            ChildOfElement::Element(child) => write_element(child, out),
            ChildOfElement::Text(text) => push_escaped(out, text.text(), false),
            _ => {}
        }
    }

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn push_escaped(out: &mut String, s: &str, attribute: bool) {
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}
