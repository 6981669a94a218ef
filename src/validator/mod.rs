//! File-level validation and querying.
//!
//! [`Validator`] reads an XML file, parses it, and checks it against the
//! DTD its DOCTYPE declares or against a DTD supplied by the caller. The
//! caller's DTD is applied by rewriting the document's DOCTYPE
//! ([`rewrite_doctype`]) and validating the rewritten text, so the DTD is
//! resolved exactly as if the document had named it.
//!
//! A [`ValidatedDocument`] can only be obtained from a successful
//! validation. [`evaluate`] runs an `XPath` expression over it and returns
//! the selected nodes, borrowing the document.

use std::fmt;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};

use crate::encoding::decode_to_utf8;
use crate::error::{Error, ErrorSeverity, ParseDiagnostic};
use crate::parser::{parse_document, ParseOptions};
use crate::resolver::{base_dir_of, EntityResolver};
use crate::serial::{serialize_with_options, SerializeOptions};
use crate::tree::{Document, NodeKind};
use crate::validation::{check, report, ErrorHandler, StrictHandler, ValidityError};
use crate::xpath::{self, XPathNode};

/// Options for a [`Validator`].
///
/// ```
/// use xmlvalidator::ValidatorOptions;
///
/// let options = ValidatorOptions::default()
///     .max_depth(64)
///     .max_entity_expansions(1_000);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidatorOptions {
    /// Parser limits and entity loading. `base_dir` is set per file.
    pub parse: ParseOptions,
}

impl ValidatorOptions {
    /// Replaces the parse options wholesale.
    #[must_use]
    pub fn parse_options(mut self, options: ParseOptions) -> Self {
        self.parse = options;
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.parse = self.parse.max_depth(max);
        self
    }

    /// Sets the maximum number of entity reference expansions.
    #[must_use]
    pub fn max_entity_expansions(mut self, max: u32) -> Self {
        self.parse = self.parse.max_entity_expansions(max);
        self
    }

    /// Sets the resolver used for the external subset and external entities.
    #[must_use]
    pub fn entity_resolver(mut self, resolver: impl EntityResolver + 'static) -> Self {
        self.parse = self.parse.entity_resolver(resolver);
        self
    }
}

/// Which DTD a document was validated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DtdSource {
    /// The document has no DOCTYPE; only well-formedness was checked.
    None,
    /// The DOCTYPE's own internal and/or external subset.
    Embedded,
    /// A DTD file supplied by the caller in place of the document's own.
    External(PathBuf),
}

impl fmt::Display for DtdSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("no DTD"),
            Self::Embedded => f.write_str("embedded DTD"),
            Self::External(path) => write!(f, "DTD '{}'", path.display()),
        }
    }
}

/// A document that passed validation.
///
/// Dereferences to the [`Document`] tree; there is no mutable access.
#[derive(Debug)]
pub struct ValidatedDocument {
    doc: Document,
    dtd: DtdSource,
}

impl ValidatedDocument {
    /// The DTD that was applied.
    #[must_use]
    pub fn dtd_source(&self) -> &DtdSource {
        &self.dtd
    }

    /// Gives up the validation guarantee and returns the tree.
    #[must_use]
    pub fn into_document(self) -> Document {
        self.doc
    }
}

impl Deref for ValidatedDocument {
    type Target = Document;

    fn deref(&self) -> &Document {
        &self.doc
    }
}

/// Validates XML files against their DTD or a caller-supplied one.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    options: ValidatorOptions,
}

impl Validator {
    /// Creates a validator with the given options.
    #[must_use]
    pub fn new(options: ValidatorOptions) -> Self {
        Self { options }
    }

    /// Validates `xml_path`, failing on the first warning or error.
    ///
    /// Without `dtd_path` the document is checked against its own DOCTYPE;
    /// a document without one only has to be well-formed. With `dtd_path`
    /// the document's DOCTYPE is replaced by one naming that file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if a file cannot be read, [`Error::Parse`] if
    /// the document or a DTD is not well-formed, [`Error::Invalid`] for any
    /// validity warning or error and [`Error::Rewrite`] if the DOCTYPE
    /// could not be replaced.
    pub fn validate(
        &self,
        xml_path: &Path,
        dtd_path: Option<&Path>,
    ) -> Result<ValidatedDocument, Error> {
        self.validate_with_handler(xml_path, dtd_path, &mut StrictHandler)
    }

    /// Like [`validate`](Self::validate), but lets `handler` decide which
    /// validity diagnostics stop validation.
    ///
    /// # Errors
    ///
    /// As for [`validate`](Self::validate), except that diagnostics the
    /// handler accepts do not fail.
    pub fn validate_with_handler(
        &self,
        xml_path: &Path,
        dtd_path: Option<&Path>,
        handler: &mut dyn ErrorHandler,
    ) -> Result<ValidatedDocument, Error> {
        match dtd_path {
            None => {
                tracing::info!(path = %xml_path.display(), "Validation using embedded DTD");
                let text = read_text(xml_path)?;
                let options = self.options.parse.clone().base_dir(base_dir_of(xml_path));
                let doc = parse_and_check(&text, &options, handler)?;
                let dtd = if doc.doctype().is_some() {
                    DtdSource::Embedded
                } else {
                    DtdSource::None
                };
                Ok(ValidatedDocument { doc, dtd })
            }
            Some(dtd_path) => {
                let text = self.rewrite_doctype(xml_path, dtd_path)?;
                // Rewritten text has no location of its own; the new system
                // identifier resolves as the caller gave it.
                let mut options = self.options.parse.clone();
                options.base_dir = None;
                let doc = parse_and_check(&text, &options, handler)?;
                Ok(ValidatedDocument {
                    doc,
                    dtd: DtdSource::External(dtd_path.to_path_buf()),
                })
            }
        }
    }

    /// Re-serializes `xml_path` with its DOCTYPE pointing at `new_dtd_path`.
    ///
    /// The document is parsed without validation and without reading its
    /// original external subset. The result is UTF-8 text whose DOCTYPE is
    /// `<!DOCTYPE root SYSTEM "new_dtd_path">`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and
    /// [`Error::Rewrite`] if it is not well-formed.
    pub fn rewrite_doctype(&self, xml_path: &Path, new_dtd_path: &Path) -> Result<String, Error> {
        let text = read_text(xml_path)?;
        let options = self
            .options
            .parse
            .clone()
            .load_external_dtd(false)
            .base_dir(base_dir_of(xml_path));
        let (doc, _) = parse_document(&text, &options).map_err(|e| Error::Rewrite {
            path: xml_path.to_path_buf(),
            source: Box::new(Error::Parse(e)),
        })?;
        let system_id = new_dtd_path.to_string_lossy();
        tracing::debug!(
            path = %xml_path.display(),
            system_id = %system_id,
            "rewriting DOCTYPE"
        );
        Ok(serialize_with_options(
            &doc,
            &SerializeOptions::default().doctype_system(&system_id),
        ))
    }
}

/// Validates `xml_path` with default options. See [`Validator::validate`].
///
/// # Errors
///
/// As for [`Validator::validate`].
pub fn validate(xml_path: &Path, dtd_path: Option<&Path>) -> Result<ValidatedDocument, Error> {
    Validator::default().validate(xml_path, dtd_path)
}

/// Validates `xml_path` with default options and a custom handler. See
/// [`Validator::validate_with_handler`].
///
/// # Errors
///
/// As for [`Validator::validate_with_handler`].
pub fn validate_with_handler(
    xml_path: &Path,
    dtd_path: Option<&Path>,
    handler: &mut dyn ErrorHandler,
) -> Result<ValidatedDocument, Error> {
    Validator::default().validate_with_handler(xml_path, dtd_path, handler)
}

/// Rewrites the DOCTYPE of `xml_path` with default options. See
/// [`Validator::rewrite_doctype`].
///
/// # Errors
///
/// As for [`Validator::rewrite_doctype`].
pub fn rewrite_doctype(xml_path: &Path, new_dtd_path: &Path) -> Result<String, Error> {
    Validator::default().rewrite_doctype(xml_path, new_dtd_path)
}

/// Evaluates an `XPath` 1.0 expression from the document root and returns
/// the selected nodes in document order.
///
/// # Errors
///
/// Returns [`Error::Query`] if the expression does not compile, fails to
/// evaluate, or yields something other than a node-set.
pub fn evaluate<'doc>(
    doc: &'doc ValidatedDocument,
    expression: &str,
) -> Result<QueryResult<'doc>, Error> {
    let nodes = xpath::compile(expression)?.select_nodes(doc)?;
    tracing::debug!(expression, matches = nodes.len(), "evaluated XPath");
    Ok(QueryResult {
        doc: &doc.doc,
        nodes,
    })
}

/// Reads a file and decodes it to UTF-8. The file is closed before this
/// returns.
fn read_text(path: &Path) -> Result<String, Error> {
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode_to_utf8(&bytes).map_err(|e| Error::Io {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })
}

/// Parses `text` and, if it has a DOCTYPE, checks it against the DTD,
/// passing every diagnostic through `handler`.
fn parse_and_check(
    text: &str,
    options: &ParseOptions,
    handler: &mut dyn ErrorHandler,
) -> Result<Document, Error> {
    let (mut doc, dtd) = match parse_document(text, options) {
        Ok(parsed) => parsed,
        Err(e) => {
            handler.fatal_error(&e);
            return Err(e.into());
        }
    };
    for diagnostic in std::mem::take(&mut doc.diagnostics) {
        report(handler, diagnostic_to_validity(diagnostic))?;
    }
    if let Some(dtd) = dtd {
        check::validate(&mut doc, &dtd, handler)?;
    }
    Ok(doc)
}

fn diagnostic_to_validity(diagnostic: ParseDiagnostic) -> ValidityError {
    let location = Some(diagnostic.location);
    match diagnostic.severity {
        ErrorSeverity::Warning => ValidityError::warning(diagnostic.message, location),
        ErrorSeverity::Error | ErrorSeverity::Fatal => {
            ValidityError::error(diagnostic.message, location)
        }
    }
}

// ---------------------------------------------------------------------------
// Query results
// ---------------------------------------------------------------------------

/// The nodes an `XPath` expression selected, in document order.
///
/// Borrows the document it was evaluated against.
#[derive(Debug, Clone)]
pub struct QueryResult<'doc> {
    doc: &'doc Document,
    nodes: Vec<XPathNode>,
}

impl<'doc> QueryResult<'doc> {
    /// Number of selected nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if nothing matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the `index`th node in document order.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<MatchedNode<'doc>> {
        self.nodes.get(index).map(|&node| MatchedNode {
            doc: self.doc,
            node,
        })
    }

    /// Iterates over the selected nodes in document order.
    pub fn iter(&self) -> impl Iterator<Item = MatchedNode<'doc>> + '_ {
        let doc = self.doc;
        self.nodes.iter().map(move |&node| MatchedNode { doc, node })
    }

    /// Text content of every node, in order.
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.iter().map(|n| n.text_content()).collect()
    }
}

impl<'doc> IntoIterator for QueryResult<'doc> {
    type Item = MatchedNode<'doc>;
    type IntoIter = IntoIter<'doc>;

    fn into_iter(self) -> IntoIter<'doc> {
        IntoIter {
            doc: self.doc,
            nodes: self.nodes.into_iter(),
        }
    }
}

/// Owning iterator over a [`QueryResult`].
#[derive(Debug)]
pub struct IntoIter<'doc> {
    doc: &'doc Document,
    nodes: std::vec::IntoIter<XPathNode>,
}

impl<'doc> Iterator for IntoIter<'doc> {
    type Item = MatchedNode<'doc>;

    fn next(&mut self) -> Option<MatchedNode<'doc>> {
        let node = self.nodes.next()?;
        Some(MatchedNode {
            doc: self.doc,
            node,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.nodes.size_hint()
    }
}

/// What kind of node a [`MatchedNode`] is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchedKind {
    /// The document node (`/`).
    Document,
    /// An element.
    Element,
    /// An attribute.
    Attribute,
    /// A text node or CDATA section.
    Text,
    /// A comment.
    Comment,
    /// A processing instruction.
    ProcessingInstruction,
    /// A namespace node.
    Namespace,
}

/// One node selected by an `XPath` expression.
#[derive(Debug, Clone, Copy)]
pub struct MatchedNode<'doc> {
    doc: &'doc Document,
    node: XPathNode,
}

impl MatchedNode<'_> {
    /// The node's string-value: descendant text for elements, the value
    /// for attributes.
    #[must_use]
    pub fn text_content(&self) -> String {
        xpath::string_value(self.doc, self.node)
    }

    /// The qualified name of an element or attribute, a PI target or a
    /// namespace prefix; empty for other nodes.
    #[must_use]
    pub fn name(&self) -> String {
        xpath::node_name(self.doc, self.node)
    }

    /// The node's kind.
    #[must_use]
    pub fn kind(&self) -> MatchedKind {
        match self.node {
            XPathNode::Attribute { .. } => MatchedKind::Attribute,
            XPathNode::Namespace { .. } => MatchedKind::Namespace,
            XPathNode::Node(id) => match self.doc.node(id).kind {
                NodeKind::Element { .. } => MatchedKind::Element,
                NodeKind::Comment { .. } => MatchedKind::Comment,
                NodeKind::ProcessingInstruction { .. } => MatchedKind::ProcessingInstruction,
                NodeKind::Document | NodeKind::DocumentType { .. } => MatchedKind::Document,
                NodeKind::Text { .. } | NodeKind::CData { .. } | NodeKind::EntityRef { .. } => {
                    MatchedKind::Text
                }
            },
        }
    }

    /// The underlying `XPath` node handle.
    #[must_use]
    pub fn node(&self) -> XPathNode {
        self.node
    }

    /// Where the node (or an attribute's element) starts in the source.
    #[must_use]
    pub fn location(&self) -> crate::error::SourceLocation {
        self.doc.location(self.node.tree_node())
    }
}

impl fmt::Display for MatchedNode<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text_content())
    }
}
