//! XML 1.0 parser.
//!
//! A hand-rolled recursive descent parser for W3C XML 1.0 (Fifth Edition)
//! with Namespaces in XML 1.0. The parser builds a [`Document`] tree, reads
//! the DOCTYPE's internal and external subsets into a DTD, expands entity
//! references and applies attribute defaults. It does not check validity
//! constraints; [`crate::validation::check`] does that over the finished
//! tree.

pub(crate) mod input;
mod xml;

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::ParseError;
use crate::resolver::{EntityResolver, FileResolver};
use crate::tree::Document;
use crate::validation::dtd::Dtd;

use input::{
    DEFAULT_MAX_ATTRIBUTES, DEFAULT_MAX_DEPTH, DEFAULT_MAX_ENTITY_EXPANSIONS,
    DEFAULT_MAX_NAME_LENGTH,
};

/// Parse options controlling parser behavior and security limits.
///
/// Use the builder pattern to configure options:
///
/// ```
/// use xmlvalidator::parser::ParseOptions;
///
/// let opts = ParseOptions::default()
///     .load_external_dtd(false)
///     .max_depth(128);
/// ```
pub struct ParseOptions {
    /// Read the external DTD subset, external parameter entities and
    /// external general entities (default: true). When false, a general
    /// entity declared only in unread declarations is kept as an
    /// [`NodeKind::EntityRef`](crate::tree::NodeKind::EntityRef) node.
    pub load_external_dtd: bool,
    /// Apply Namespaces in XML 1.0 (default: true). When false, names are
    /// kept whole and `xmlns` attributes are ordinary attributes.
    pub namespaces: bool,
    /// Directory the DOCTYPE's relative system identifier resolves against.
    /// `None` means the process working directory.
    pub base_dir: Option<PathBuf>,
    /// Loads external entities (default: [`FileResolver`]).
    pub entity_resolver: Arc<dyn EntityResolver>,

    // -- Security limits --
    /// Maximum element nesting depth (default: 256).
    pub max_depth: u32,
    /// Maximum number of attributes on a single element (default: 256).
    pub max_attributes: u32,
    /// Maximum length in bytes of an element or attribute name (default: 50,000).
    pub max_name_length: usize,
    /// Maximum number of entity reference expansions per document,
    /// parameter entities included (default: 10,000).
    pub max_entity_expansions: u32,
}

impl Clone for ParseOptions {
    fn clone(&self) -> Self {
        Self {
            load_external_dtd: self.load_external_dtd,
            namespaces: self.namespaces,
            base_dir: self.base_dir.clone(),
            entity_resolver: Arc::clone(&self.entity_resolver),
            max_depth: self.max_depth,
            max_attributes: self.max_attributes,
            max_name_length: self.max_name_length,
            max_entity_expansions: self.max_entity_expansions,
        }
    }
}

impl std::fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOptions")
            .field("load_external_dtd", &self.load_external_dtd)
            .field("namespaces", &self.namespaces)
            .field("base_dir", &self.base_dir)
            .field("entity_resolver", &"...")
            .field("max_depth", &self.max_depth)
            .field("max_attributes", &self.max_attributes)
            .field("max_name_length", &self.max_name_length)
            .field("max_entity_expansions", &self.max_entity_expansions)
            .finish()
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            load_external_dtd: true,
            namespaces: true,
            base_dir: None,
            entity_resolver: Arc::new(FileResolver),
            max_depth: DEFAULT_MAX_DEPTH,
            max_attributes: DEFAULT_MAX_ATTRIBUTES,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_entity_expansions: DEFAULT_MAX_ENTITY_EXPANSIONS,
        }
    }
}

impl ParseOptions {
    /// Enables or disables reading of external DTD subsets and entities.
    #[must_use]
    pub fn load_external_dtd(mut self, yes: bool) -> Self {
        self.load_external_dtd = yes;
        self
    }

    /// Enables or disables namespace processing.
    #[must_use]
    pub fn namespaces(mut self, yes: bool) -> Self {
        self.namespaces = yes;
        self
    }

    /// Sets the directory relative system identifiers resolve against.
    #[must_use]
    pub fn base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Sets the external entity resolver.
    ///
    /// # Security
    ///
    /// **Warning:** Resolving external entities of untrusted documents
    /// opens the door to XML External Entity (XXE) attacks. Restrict which
    /// identifiers the resolver is willing to load.
    #[must_use]
    pub fn entity_resolver(mut self, resolver: impl EntityResolver + 'static) -> Self {
        self.entity_resolver = Arc::new(resolver);
        self
    }

    /// Sets the maximum element nesting depth.
    #[must_use]
    pub fn max_depth(mut self, max: u32) -> Self {
        self.max_depth = max;
        self
    }

    /// Sets the maximum number of attributes per element.
    #[must_use]
    pub fn max_attributes(mut self, max: u32) -> Self {
        self.max_attributes = max;
        self
    }

    /// Sets the maximum element/attribute name length in bytes.
    #[must_use]
    pub fn max_name_length(mut self, max: usize) -> Self {
        self.max_name_length = max;
        self
    }

    /// Sets the maximum number of entity reference expansions.
    #[must_use]
    pub fn max_entity_expansions(mut self, max: u32) -> Self {
        self.max_entity_expansions = max;
        self
    }
}

/// Parses an XML string with default options.
///
/// # Errors
///
/// Returns `ParseError` if the input is not well-formed XML.
pub fn parse_str(input: &str) -> Result<Document, ParseError> {
    parse_str_with_options(input, &ParseOptions::default())
}

/// Parses an XML string with the given options.
///
/// # Errors
///
/// Returns `ParseError` if the input (or an entity or DTD it pulls in) is
/// not well-formed.
pub fn parse_str_with_options(input: &str, options: &ParseOptions) -> Result<Document, ParseError> {
    parse_document(input, options).map(|(doc, _)| doc)
}

/// Parses a document and returns the DTD read from its DOCTYPE, if any.
pub(crate) fn parse_document(
    input: &str,
    options: &ParseOptions,
) -> Result<(Document, Option<Dtd>), ParseError> {
    tracing::debug!(bytes = input.len(), "parsing document");
    let parser = xml::XmlParser::new(input, options);
    let parsed = parser.parse()?;
    tracing::debug!(nodes = parsed.0.node_count(), "parsed document");
    Ok(parsed)
}
