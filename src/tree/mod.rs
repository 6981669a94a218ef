//! Arena-based XML document tree.
//!
//! All nodes live in a contiguous `Vec<NodeData>` owned by the `Document`
//! and are referenced by `NodeId`, a newtype over `NonZeroU32`. Navigation
//! links (parent, first\_child, last\_child, next\_sibling, prev\_sibling) are
//! arena indices, so the tree has no reference counting and no cycles to
//! break; dropping the `Document` frees everything.
//!
//! The parser allocates nodes in document order and never reorders them, so
//! comparing two `NodeId`s of a parsed document compares their position in
//! the source.

mod node;

pub use node::NodeKind;

use std::collections::HashMap;
use std::num::NonZeroU32;

use crate::error::{ParseDiagnostic, ParseError, SourceLocation};

/// A typed index into the document's node arena.
///
/// `Option<NodeId>` has the same size as `NodeId` (niche optimization).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct NodeId(NonZeroU32);

impl NodeId {
    /// Creates a `NodeId` from a raw arena index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is 0 or does not fit in a `u32`.
    #[allow(clippy::expect_used)]
    fn from_index(index: usize) -> Self {
        let raw = u32::try_from(index).expect("node arena exceeds u32::MAX entries");
        Self(NonZeroU32::new(raw).expect("NodeId index must be non-zero"))
    }

    fn as_index(self) -> usize {
        self.0.get() as usize
    }
}

/// Storage for a single node in the document arena.
#[derive(Debug, Clone)]
pub struct NodeData {
    /// What kind of node this is and its payload.
    pub kind: NodeKind,
    /// Parent node. The document node has none.
    pub parent: Option<NodeId>,
    /// First child node.
    pub first_child: Option<NodeId>,
    /// Last child node (for O(1) append).
    pub last_child: Option<NodeId>,
    /// Next sibling.
    pub next_sibling: Option<NodeId>,
    /// Previous sibling.
    pub prev_sibling: Option<NodeId>,
    /// Where the node started in the source. Elements record the `<` of
    /// their start tag; nodes built by hand carry the default location.
    pub location: SourceLocation,
}

impl NodeData {
    fn new(kind: NodeKind, location: SourceLocation) -> Self {
        Self {
            kind,
            parent: None,
            first_child: None,
            last_child: None,
            next_sibling: None,
            prev_sibling: None,
            location,
        }
    }
}

/// An XML attribute on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// The local part of the attribute name (e.g., `"lang"` for `xml:lang`).
    pub name: String,
    /// The attribute value after entity expansion and normalization.
    pub value: String,
    /// Namespace prefix, if any.
    pub prefix: Option<String>,
    /// Namespace URI after resolution, if any.
    pub namespace: Option<String>,
}

impl Attribute {
    /// Returns the name as written in the document, `prefix:local` or `local`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Returns `true` for `xmlns` and `xmlns:*` namespace declarations.
    #[must_use]
    pub fn is_namespace_decl(&self) -> bool {
        self.prefix.as_deref() == Some("xmlns") || (self.prefix.is_none() && self.name == "xmlns")
    }
}

/// An XML document.
///
/// The `Document` owns all nodes and provides navigation through `&Document`.
/// Mutation is crate-internal; a parsed document is read-only to callers.
///
/// # Examples
///
/// ```
/// use xmlvalidator::Document;
///
/// let doc = Document::parse_str("<root><child/></root>").unwrap();
/// let root = doc.root_element().unwrap();
/// assert_eq!(doc.node_name(root), Some("root"));
/// ```
#[derive(Debug)]
pub struct Document {
    /// The node arena. Index 0 is an unused placeholder.
    nodes: Vec<NodeData>,
    /// The document node id (not the root element).
    root: NodeId,
    /// XML version from the XML declaration (e.g., "1.0").
    pub version: Option<String>,
    /// Encoding from the XML declaration (e.g., "UTF-8").
    pub encoding: Option<String>,
    /// Standalone flag from the XML declaration.
    pub standalone: Option<bool>,
    /// Non-fatal diagnostics recorded during a lenient parse.
    pub diagnostics: Vec<ParseDiagnostic>,
    /// ID attribute values mapped to their elements, filled in by DTD
    /// validation and used by the `XPath` `id()` function.
    id_map: HashMap<String, NodeId>,
}

impl Document {
    /// Creates a new empty document containing only the document node.
    #[must_use]
    pub fn new() -> Self {
        let mut nodes = Vec::with_capacity(64);
        nodes.push(NodeData::new(NodeKind::Document, SourceLocation::default()));
        nodes.push(NodeData::new(NodeKind::Document, SourceLocation::default()));
        Self {
            nodes,
            root: NodeId::from_index(1),
            version: None,
            encoding: None,
            standalone: None,
            diagnostics: Vec::new(),
            id_map: HashMap::new(),
        }
    }

    /// Parses an XML string into a `Document` without validation.
    ///
    /// # Errors
    ///
    /// Returns `ParseError` if the input is not well-formed XML.
    pub fn parse_str(input: &str) -> Result<Self, ParseError> {
        crate::parser::parse_str(input)
    }

    /// Returns the document node id.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns the single top-level element, if the document has one.
    #[must_use]
    pub fn root_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| matches!(self.node(id).kind, NodeKind::Element { .. }))
    }

    /// Returns the DOCTYPE node, if the document has one.
    #[must_use]
    pub fn doctype(&self) -> Option<NodeId> {
        self.children(self.root)
            .find(|&id| matches!(self.node(id).kind, NodeKind::DocumentType { .. }))
    }

    /// Returns a reference to the `NodeData` for the given node.
    ///
    /// # Panics
    ///
    /// Panics if `id` does not belong to this document.
    #[must_use]
    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.as_index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.as_index()]
    }

    /// Returns the name of a node, if applicable.
    ///
    /// Elements return their local name, PIs their target, and DOCTYPE
    /// nodes the declared root name.
    #[must_use]
    pub fn node_name(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { name, .. }
            | NodeKind::ProcessingInstruction { target: name, .. }
            | NodeKind::DocumentType { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Returns an element's name as written in the source (`prefix:local`).
    #[must_use]
    pub fn qualified_name(&self, id: NodeId) -> Option<String> {
        match &self.node(id).kind {
            NodeKind::Element {
                name,
                prefix: Some(prefix),
                ..
            } => Some(format!("{prefix}:{name}")),
            NodeKind::Element { name, .. } => Some(name.clone()),
            _ => None,
        }
    }

    /// Returns the namespace URI of an element node, if any.
    #[must_use]
    pub fn node_namespace(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { namespace, .. } => namespace.as_deref(),
            _ => None,
        }
    }

    /// Returns the namespace prefix of an element node, if any.
    #[must_use]
    pub fn node_prefix(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Element { prefix, .. } => prefix.as_deref(),
            _ => None,
        }
    }

    /// Returns the character data of a text, CDATA, comment or PI node.
    #[must_use]
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text { content }
            | NodeKind::Comment { content }
            | NodeKind::CData { content } => Some(content),
            NodeKind::ProcessingInstruction { data, .. } => data.as_deref(),
            _ => None,
        }
    }

    /// Returns the concatenated text of a node and all its descendants.
    ///
    /// Comments and processing instructions below an element do not
    /// contribute; for a comment or PI node itself, its own text is returned.
    #[must_use]
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.node(id).kind {
            NodeKind::Comment { content } => content.clone(),
            NodeKind::ProcessingInstruction { data, .. } => data.clone().unwrap_or_default(),
            _ => {
                let mut result = String::new();
                self.collect_text(id, &mut result);
                result
            }
        }
    }

    fn collect_text(&self, id: NodeId, buf: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text { content } | NodeKind::CData { content } => {
                buf.push_str(content);
            }
            NodeKind::Element { .. } | NodeKind::Document => {
                for child in self.children(id) {
                    self.collect_text(child, buf);
                }
            }
            _ => {}
        }
    }

    /// Returns the attributes of an element node (empty for other nodes).
    #[must_use]
    pub fn attributes(&self, id: NodeId) -> &[Attribute] {
        match &self.node(id).kind {
            NodeKind::Element { attributes, .. } => attributes,
            _ => &[],
        }
    }

    /// Returns the value of an attribute by its qualified name.
    #[must_use]
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attributes(id)
            .iter()
            .find(|a| match &a.prefix {
                Some(prefix) => name
                    .strip_prefix(prefix.as_str())
                    .and_then(|rest| rest.strip_prefix(':'))
                    == Some(a.name.as_str()),
                None => a.name == name,
            })
            .map(|a| a.value.as_str())
    }

    /// Returns the namespace bindings in scope at an element, innermost
    /// first. The default namespace is reported with an empty prefix.
    #[must_use]
    pub fn in_scope_namespaces(&self, id: NodeId) -> Vec<(String, String)> {
        let mut seen: Vec<(String, String)> = Vec::new();
        for ancestor in self.ancestors(id) {
            for attr in self.attributes(ancestor) {
                if !attr.is_namespace_decl() {
                    continue;
                }
                let prefix = if attr.prefix.is_some() {
                    attr.name.clone()
                } else {
                    String::new()
                };
                if !seen.iter().any(|(p, _)| *p == prefix) {
                    seen.push((prefix, attr.value.clone()));
                }
            }
        }
        seen.retain(|(_, uri)| !uri.is_empty());
        seen
    }

    // --- ID lookup ---

    /// Associates an ID value with an element node.
    pub(crate) fn set_id(&mut self, id: &str, node: NodeId) {
        self.id_map.insert(id.to_string(), node);
    }

    /// Looks up an element by the value of its ID-typed attribute.
    ///
    /// Only documents that went through DTD validation have IDs registered.
    #[must_use]
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_map.get(id).copied()
    }

    // --- Navigation ---

    /// Returns the parent of a node.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Returns the first child of a node.
    #[must_use]
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).first_child
    }

    /// Returns the last child of a node.
    #[must_use]
    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).last_child
    }

    /// Returns the next sibling of a node.
    #[must_use]
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next_sibling
    }

    /// Returns the previous sibling of a node.
    #[must_use]
    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).prev_sibling
    }

    /// Returns an iterator over the children of a node.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.node(id).first_child,
        }
    }

    /// Returns an iterator over a node and its ancestors (walking up to root).
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            doc: self,
            next: Some(id),
        }
    }

    /// Returns an iterator over all descendants of a node in document order.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            root: id,
            next: self.first_child(id),
        }
    }

    /// Returns the source location recorded for a node.
    #[must_use]
    pub fn location(&self, id: NodeId) -> SourceLocation {
        self.node(id).location
    }

    // --- Construction ---

    /// Allocates a new detached node in the arena.
    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        self.create_node_at(kind, SourceLocation::default())
    }

    pub(crate) fn create_node_at(&mut self, kind: NodeKind, location: SourceLocation) -> NodeId {
        let index = self.nodes.len();
        self.nodes.push(NodeData::new(kind, location));
        NodeId::from_index(index)
    }

    /// Appends a child node to the end of a parent's child list.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        debug_assert!(
            self.node(child).parent.is_none(),
            "child already has a parent"
        );

        self.node_mut(child).parent = Some(parent);

        if let Some(last) = self.node(parent).last_child {
            self.node_mut(last).next_sibling = Some(child);
            self.node_mut(child).prev_sibling = Some(last);
            self.node_mut(parent).last_child = Some(child);
        } else {
            self.node_mut(parent).first_child = Some(child);
            self.node_mut(parent).last_child = Some(child);
        }
    }

    /// Returns the number of nodes in the arena, the document node included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len() - 1
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// --- Iterators ---

/// Iterator over the children of a node.
pub struct Children<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).next_sibling;
        Some(current)
    }
}

/// Iterator over a node and its ancestors.
pub struct Ancestors<'a> {
    doc: &'a Document,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.doc.node(current).parent;
        Some(current)
    }
}

/// Depth-first iterator over all descendants of a node.
pub struct Descendants<'a> {
    doc: &'a Document,
    root: NodeId,
    next: Option<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;

        if let Some(child) = self.doc.first_child(current) {
            self.next = Some(child);
            return Some(current);
        }

        if let Some(sibling) = self.doc.next_sibling(current) {
            self.next = Some(sibling);
            return Some(current);
        }

        let mut ancestor = self.doc.parent(current);
        while let Some(anc) = ancestor {
            if anc == self.root {
                break;
            }
            if let Some(sibling) = self.doc.next_sibling(anc) {
                self.next = Some(sibling);
                return Some(current);
            }
            ancestor = self.doc.parent(anc);
        }

        self.next = None;
        Some(current)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn element(name: &str) -> NodeKind {
        NodeKind::Element {
            name: name.to_string(),
            prefix: None,
            namespace: None,
            attributes: vec![],
        }
    }

    fn text(content: &str) -> NodeKind {
        NodeKind::Text {
            content: content.to_string(),
        }
    }

    #[test]
    fn test_new_document_has_root() {
        let doc = Document::new();
        assert!(matches!(doc.node(doc.root()).kind, NodeKind::Document));
        assert_eq!(doc.node_count(), 1);
        assert_eq!(doc.root_element(), None);
    }

    #[test]
    fn test_append_multiple_children() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_node(text("A"));
        let b = doc.create_node(text("B"));
        let c = doc.create_node(text("C"));
        doc.append_child(root, a);
        doc.append_child(root, b);
        doc.append_child(root, c);

        assert_eq!(doc.first_child(root), Some(a));
        assert_eq!(doc.last_child(root), Some(c));
        assert_eq!(doc.next_sibling(a), Some(b));
        assert_eq!(doc.prev_sibling(c), Some(b));
        assert_eq!(doc.children(root).collect::<Vec<_>>(), vec![a, b, c]);
    }

    #[test]
    fn test_descendants_are_in_document_order() {
        let mut doc = Document::new();
        let root = doc.root();
        let shelf = doc.create_node(element("shelf"));
        doc.append_child(root, shelf);
        let book1 = doc.create_node(element("book"));
        doc.append_child(shelf, book1);
        let title = doc.create_node(text("Dune"));
        doc.append_child(book1, title);
        let book2 = doc.create_node(element("book"));
        doc.append_child(shelf, book2);

        let order: Vec<NodeId> = doc.descendants(root).collect();
        assert_eq!(order, vec![shelf, book1, title, book2]);
        let mut sorted = order.clone();
        sorted.sort();
        assert_eq!(sorted, order);
    }

    #[test]
    fn test_descendants_stop_at_subtree() {
        let doc = Document::parse_str("<r><a><b/></a><c/></r>").unwrap();
        let r = doc.root_element().unwrap();
        let a = doc.first_child(r).unwrap();
        let names: Vec<&str> = doc
            .descendants(a)
            .filter_map(|id| doc.node_name(id))
            .collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn test_text_content_concatenates_descendants() {
        let doc =
            Document::parse_str("<p>Hello <b>big</b><!-- skip --> world<![CDATA[!]]></p>").unwrap();
        let p = doc.root_element().unwrap();
        assert_eq!(doc.text_content(p), "Hello big world!");
    }

    #[test]
    fn test_attribute_lookup_by_qualified_name() {
        let doc = Document::parse_str(
            r#"<r xmlns:x="urn:x" x:id="1" id="2"/>"#,
        )
        .unwrap();
        let r = doc.root_element().unwrap();
        assert_eq!(doc.attribute(r, "x:id"), Some("1"));
        assert_eq!(doc.attribute(r, "id"), Some("2"));
        assert_eq!(doc.attribute(r, "y:id"), None);
    }

    #[test]
    fn test_in_scope_namespaces_innermost_wins() {
        let doc = Document::parse_str(
            r#"<a xmlns="urn:outer" xmlns:p="urn:p"><b xmlns="urn:inner"/></a>"#,
        )
        .unwrap();
        let a = doc.root_element().unwrap();
        let b = doc.first_child(a).unwrap();
        let scope = doc.in_scope_namespaces(b);
        assert_eq!(
            scope,
            vec![
                (String::new(), "urn:inner".to_string()),
                ("p".to_string(), "urn:p".to_string()),
            ]
        );
    }

    #[test]
    fn test_doctype_lookup() {
        let doc = Document::parse_str("<!DOCTYPE r [<!ELEMENT r EMPTY>]><r/>").unwrap();
        let dt = doc.doctype().unwrap();
        assert_eq!(doc.node_name(dt), Some("r"));
    }
}
