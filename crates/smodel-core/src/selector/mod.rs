//! Selector capability: document handles and query results.
//!
//! Structural (CSS) queries run on the `scraper` tree. Path (XPath) queries run
//! on an `sxd-document` copy of that tree, built once per document on first use.
//! Results are owned [`Node`]s, so a [`Selection`] outlives the document it
//! came from. Element matches also remember where they sit in the source
//! document, so a selection can itself be queried again with each matched
//! element as the context.

mod css;
mod xpath;

use std::cell::OnceCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use sxd_document::Package;

use crate::error::SelectorError;

/// Result type for selector operations.
pub type Result<T> = std::result::Result<T, SelectorError>;

/// Element-child indices leading from the root element to an element.
type ElementPath = Vec<usize>;

/// Query language of a selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    /// CSS selector, optionally ending in `::text` or `::attr(name)`.
    Css,
    /// XPath 1.0 expression.
    Xpath,
}

impl QueryKind {
    /// Name used in mapping files.
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Css => "css",
            QueryKind::Xpath => "xpath",
        }
    }

    /// Parse a mapping-file kind name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "css" => Some(QueryKind::Css),
            "xpath" => Some(QueryKind::Xpath),
            _ => None,
        }
    }
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single query match.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Node {
    /// An element, stored as its outer markup.
    Element(String),
    /// A text node or a scalar XPath result.
    Text(String),
    /// An attribute.
    Attribute { name: String, value: String },
}

impl Node {
    /// The extracted string form of this match.
    pub fn extract(&self) -> &str {
        match self {
            Node::Element(html) => html,
            Node::Text(text) => text,
            Node::Attribute { value, .. } => value,
        }
    }
}

/// Where the matches of a selection came from.
#[derive(Clone)]
struct Origin {
    source: Arc<str>,
    /// One entry per node; `Some` for element matches.
    paths: Vec<Option<ElementPath>>,
}

/// Ordered sequence of query matches.
///
/// Equality and hashing look at the matches only, not at where they came from.
#[derive(Clone, Default)]
pub struct Selection {
    nodes: Vec<Node>,
    origin: Option<Origin>,
}

impl Selection {
    /// Create a selection from matches.
    ///
    /// A selection built this way has no source document, so querying it
    /// again yields nothing.
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            origin: None,
        }
    }

    fn anchored(source: &Arc<str>, matches: Vec<(Node, Option<ElementPath>)>) -> Self {
        let (nodes, paths) = matches.into_iter().unzip();
        Self {
            nodes,
            origin: Some(Origin {
                source: Arc::clone(source),
                paths,
            }),
        }
    }

    /// The matches, in document order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Extract every match as a string.
    pub fn extract(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.extract().to_string()).collect()
    }

    /// Extract the first match, if any.
    pub fn extract_first(&self) -> Option<String> {
        self.nodes.first().map(|n| n.extract().to_string())
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    /// The source document and the positions of the element matches, if
    /// there is at least one element match to query into.
    fn element_anchors(&self) -> Option<(Document, Vec<&[usize]>)> {
        let origin = self.origin.as_ref()?;
        let paths: Vec<&[usize]> = origin.paths.iter().flatten().map(Vec::as_slice).collect();
        if paths.is_empty() {
            return None;
        }
        Some((Document::from_source(Arc::clone(&origin.source)), paths))
    }
}

impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes
    }
}

impl Eq for Selection {}

impl Hash for Selection {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.nodes.hash(state);
    }
}

impl fmt::Debug for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selection")
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

impl FromIterator<Node> for Selection {
    fn from_iter<I: IntoIterator<Item = Node>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Selection {
    type Item = &'a Node;
    type IntoIter = std::slice::Iter<'a, Node>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Anything that CSS and XPath queries can run against.
pub trait Select {
    /// Run a structural query.
    fn css(&self, query: &str) -> Result<Selection>;

    /// Run a path query.
    fn xpath(&self, query: &str) -> Result<Selection>;

    /// Run a query of the given kind.
    fn select(&self, kind: QueryKind, query: &str) -> Result<Selection> {
        match kind {
            QueryKind::Css => self.css(query),
            QueryKind::Xpath => self.xpath(query),
        }
    }
}

/// A parsed HTML/XML document.
///
/// Not `Send`: create one per thread.
pub struct Document {
    source: Arc<str>,
    html: Html,
    xpath_tree: OnceCell<Package>,
}

impl Document {
    /// Parse document text.
    pub fn parse(text: &str) -> Self {
        Self::from_source(Arc::from(text))
    }

    /// Parse fetched bytes, replacing invalid UTF-8.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::parse(&String::from_utf8_lossy(bytes))
    }

    fn from_source(source: Arc<str>) -> Self {
        Self {
            html: Html::parse_document(&source),
            source,
            xpath_tree: OnceCell::new(),
        }
    }

    /// The text this document was parsed from.
    pub fn source(&self) -> &str {
        &self.source
    }

    fn xpath_tree(&self) -> &Package {
        self.xpath_tree
            .get_or_init(|| xpath::build_tree(self.html.root_element()))
    }

    fn css_within(&self, scopes: &[ElementRef<'_>], query: &str) -> Result<Selection> {
        let matches = css::select(scopes, query)?
            .into_iter()
            .map(|(node, element)| (node, element.map(element_path)))
            .collect();
        Ok(Selection::anchored(&self.source, matches))
    }

    fn xpath_within(&self, contexts: Option<&[&[usize]]>, query: &str) -> Result<Selection> {
        let matches = xpath::evaluate(self.xpath_tree(), contexts, query)?;
        Ok(Selection::anchored(&self.source, matches))
    }
}

impl Select for Document {
    fn css(&self, query: &str) -> Result<Selection> {
        self.css_within(&[self.html.root_element()], query)
    }

    fn xpath(&self, query: &str) -> Result<Selection> {
        self.xpath_within(None, query)
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("len", &self.source.len())
            .finish_non_exhaustive()
    }
}

/// Element matches are re-located in their source document and queried in
/// place. CSS matches each element and its descendants; XPath uses each
/// element as the context node. Text and attribute matches have nothing to
/// select into.
impl Select for Selection {
    fn css(&self, query: &str) -> Result<Selection> {
        let Some((document, paths)) = self.element_anchors() else {
            return css::select(&[], query).map(|_| Selection::default());
        };
        let scopes: Vec<ElementRef<'_>> = paths
            .iter()
            .filter_map(|path| resolve_path(&document.html, path))
            .collect();
        document.css_within(&scopes, query)
    }

    fn xpath(&self, query: &str) -> Result<Selection> {
        let Some((document, paths)) = self.element_anchors() else {
            xpath::compile(query)?;
            return Ok(Selection::default());
        };
        document.xpath_within(Some(paths.as_slice()), query)
    }
}

fn element_path(element: ElementRef<'_>) -> ElementPath {
    let mut path = Vec::new();
    let mut current = element;
    while let Some(parent) = current.parent().and_then(ElementRef::wrap) {
        let index = parent
            .children()
            .filter_map(ElementRef::wrap)
            .position(|sibling| sibling.id() == current.id())
            .unwrap_or(0);
        path.push(index);
        current = parent;
    }
    path.reverse();
    path
}

fn resolve_path<'a>(html: &'a Html, path: &[usize]) -> Option<ElementRef<'a>> {
    let mut current = html.root_element();
    for &index in path {
        current = current.children().filter_map(ElementRef::wrap).nth(index)?;
    }
    Some(current)
}
