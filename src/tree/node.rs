//! Node type definitions.
//!
//! The `NodeKind` enum carries the node-type-specific payload (element name
//! and attributes, character data, DOCTYPE identifiers). Navigation links
//! live in `NodeData`, not here.

use super::Attribute;

/// The kind of an XML node and its associated data.
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// The document node; there is exactly one per `Document`.
    Document,

    /// An element node, e.g., `<book category="web">`.
    Element {
        /// The element's local name.
        name: String,
        /// Namespace prefix (e.g., `"bk"` in `bk:book`), if any.
        prefix: Option<String>,
        /// Namespace URI after resolution, if any.
        namespace: Option<String>,
        /// Attributes on this element, including DTD defaults that were
        /// applied and namespace declarations.
        attributes: Vec<Attribute>,
    },

    /// A text node containing character data (references already resolved).
    Text {
        /// The decoded text.
        content: String,
    },

    /// A CDATA section, e.g., `<![CDATA[...]]>`.
    CData {
        /// The section content, unescaped.
        content: String,
    },

    /// A comment node, e.g., `<!-- ... -->`.
    Comment {
        /// The comment text without delimiters.
        content: String,
    },

    /// A processing instruction, e.g., `<?target data?>`.
    ProcessingInstruction {
        /// The PI target.
        target: String,
        /// The PI data, if any.
        data: Option<String>,
    },

    /// A general entity reference the parser could not expand.
    ///
    /// Only produced by a non-validating parse, for entities declared in an
    /// external subset that was not read.
    EntityRef {
        /// The entity name (without `&` and `;`).
        name: String,
    },

    /// A document type declaration, e.g., `<!DOCTYPE bookstore SYSTEM "b.dtd">`.
    ///
    /// See XML 1.0 §2.8: `[28]` doctypedecl
    DocumentType {
        /// The root element name declared in the DOCTYPE.
        name: String,
        /// The SYSTEM identifier, if any.
        system_id: Option<String>,
        /// The PUBLIC identifier, if any.
        public_id: Option<String>,
        /// The raw text between `[` and `]`, if an internal subset exists.
        internal_subset: Option<String>,
    },
}
