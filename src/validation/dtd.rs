//! DTD (Document Type Definition) data model and parser.
//!
//! Implements the declaration side of XML 1.0 (Fifth Edition) sections 2.8,
//! 3.2, 3.3, 3.4, 4.2 and 4.4:
//!
//! - A data model for declarations (elements, attributes, general and
//!   parameter entities, notations)
//! - A parser for internal and external subsets that expands parameter
//!   entity references and honours `INCLUDE`/`IGNORE` conditional sections
//!
//! The internal subset is read before the external one and both feed the
//! same [`Dtd`]. For entities and attribute definitions the first
//! declaration is binding, so the internal subset can override the external
//! subset. A second declaration of an element type or notation is a
//! validity error, recorded in [`Dtd::diagnostics`].
//!
//! # Parameter entities
//!
//! Between declarations a reference to an internal parameter entity is
//! replaced by its text; an external one is read through the
//! [`EntityResolver`] and parsed as a nested external subset. Inside
//! declarations (external subset only, per the WFC "PEs in Internal
//! Subset") the replacement text is spliced into the input padded with one
//! space on each side (XML 1.0 §4.4.8). Inside entity value literals it is
//! included as is.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{ParseError, SourceLocation};
use crate::parser::input::{
    is_name_char, is_name_start_char, is_pubid_char, is_xml_char, normalize_line_endings,
    parse_char_ref, predefined_entity, split_reference, ExpansionBudget, DEFAULT_MAX_DEPTH, DEFAULT_MAX_NAME_LENGTH,
};
use crate::resolver::{EntityResolver, ExternalEntity, ExternalEntityRequest};

use super::ValidityError;

// ---------------------------------------------------------------------------
// DTD Data Model
// ---------------------------------------------------------------------------

/// All declarations read from a document's internal and external subsets.
#[derive(Debug, Clone, Default)]
pub struct Dtd {
    /// Element declarations, keyed by element name.
    pub elements: HashMap<String, ElementDecl>,
    /// Attribute declarations, keyed by element name, in declaration order.
    pub attributes: HashMap<String, Vec<AttributeDecl>>,
    /// General entity declarations, keyed by entity name.
    pub entities: HashMap<String, EntityDecl>,
    /// Parameter entity declarations, keyed by entity name.
    pub parameter_entities: HashMap<String, EntityDecl>,
    /// Notation declarations, keyed by notation name.
    pub notations: HashMap<String, NotationDecl>,
    /// Validity problems found in the declarations themselves, reported
    /// ahead of any document content.
    pub diagnostics: Vec<ValidityError>,
    /// Set when an external parameter entity was referenced but not read;
    /// declarations it would have made are unknown.
    pub(crate) skipped_external: bool,
}

impl Dtd {
    /// Returns the declaration of an element type.
    #[must_use]
    pub fn element(&self, name: &str) -> Option<&ElementDecl> {
        self.elements.get(name)
    }

    /// Returns the attribute definitions of an element type.
    #[must_use]
    pub fn attribute_decls(&self, element: &str) -> &[AttributeDecl] {
        self.attributes.get(element).map_or(&[], Vec::as_slice)
    }

    /// Returns one attribute definition.
    #[must_use]
    pub fn attribute_decl(&self, element: &str, attribute: &str) -> Option<&AttributeDecl> {
        self.attribute_decls(element)
            .iter()
            .find(|d| d.attribute_name == attribute)
    }
}

/// An element declaration from `<!ELEMENT name content-model>`.
///
/// See XML 1.0 section 3.2.
#[derive(Debug, Clone)]
pub struct ElementDecl {
    /// The element name.
    pub name: String,
    /// The declared content model.
    pub content_model: ContentModel,
    /// Where the declaration starts.
    pub location: SourceLocation,
}

/// The content model for an element declaration.
///
/// `contentspec ::= 'EMPTY' | 'ANY' | Mixed | children`
#[derive(Debug, Clone, PartialEq)]
pub enum ContentModel {
    /// `EMPTY`: no content at all.
    Empty,
    /// `ANY`: any declared elements and text.
    Any,
    /// `(#PCDATA)` or `(#PCDATA|a|b)*`: text plus the listed elements in
    /// any order.
    Mixed(Vec<String>),
    /// Element-only content following a content particle.
    Children(ContentSpec),
}

/// A content particle of an element-only content model.
///
/// See XML 1.0 sections 3.2.1 and 3.2.2.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentSpec {
    /// The particle kind.
    pub kind: ContentSpecKind,
    /// How many times this particle may occur.
    pub occurrence: Occurrence,
}

/// The kind of a content particle.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentSpecKind {
    /// A single named element, e.g., `a`.
    Name(String),
    /// A sequence of particles, e.g., `(a, b, c)`.
    Seq(Vec<ContentSpec>),
    /// A choice among particles, e.g., `(a | b | c)`.
    Choice(Vec<ContentSpec>),
}

/// Occurrence indicator for a content particle: `'?' | '*' | '+'`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// Exactly once (no indicator).
    Once,
    /// Zero or one time (`?`).
    Optional,
    /// Zero or more times (`*`).
    ZeroOrMore,
    /// One or more times (`+`).
    OneOrMore,
}

/// One attribute definition from `<!ATTLIST element-name ...>`.
///
/// See XML 1.0 section 3.3.
#[derive(Debug, Clone)]
pub struct AttributeDecl {
    /// The element this attribute belongs to.
    pub element_name: String,
    /// The attribute name.
    pub attribute_name: String,
    /// The attribute type.
    pub attribute_type: AttributeType,
    /// The default value specification. Default and fixed values are
    /// stored with references expanded and normalized for the type.
    pub default: AttributeDefault,
    /// Where the `ATTLIST` declaration starts.
    pub location: SourceLocation,
}

/// The type of an attribute as declared in `<!ATTLIST>`.
///
/// See XML 1.0 section 3.3.1.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeType {
    /// Character data (`CDATA`).
    CData,
    /// A unique identifier (`ID`).
    Id,
    /// A reference to an ID (`IDREF`).
    IdRef,
    /// Space-separated list of ID references (`IDREFS`).
    IdRefs,
    /// An unparsed entity name (`ENTITY`).
    Entity,
    /// Space-separated list of unparsed entity names (`ENTITIES`).
    Entities,
    /// A name token (`NMTOKEN`).
    NmToken,
    /// Space-separated list of name tokens (`NMTOKENS`).
    NmTokens,
    /// A notation type with allowed notation names (`NOTATION (a|b|c)`).
    Notation(Vec<String>),
    /// An enumeration of allowed values (`(a|b|c)`).
    Enumeration(Vec<String>),
}

impl AttributeType {
    /// Every type except `CDATA` is tokenized: its values are
    /// whitespace-collapsed after reference expansion (XML 1.0 §3.3.3).
    #[must_use]
    pub fn is_tokenized(&self) -> bool {
        !matches!(self, Self::CData)
    }
}

/// The default value specification for an attribute.
///
/// See XML 1.0 section 3.3.2.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeDefault {
    /// `#REQUIRED`
    Required,
    /// `#IMPLIED`
    Implied,
    /// `#FIXED "value"`
    Fixed(String),
    /// `"value"`
    Default(String),
}

impl AttributeDefault {
    /// Returns the value supplied when the attribute is omitted.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Fixed(v) | Self::Default(v) => Some(v),
            Self::Required | Self::Implied => None,
        }
    }
}

/// A general or parameter entity declaration.
///
/// See XML 1.0 section 4.2.
#[derive(Debug, Clone)]
pub struct EntityDecl {
    /// The entity name.
    pub name: String,
    /// The entity's value, either internal or external.
    pub kind: EntityKind,
}

/// Whether an entity has literal replacement text or lives elsewhere.
#[derive(Debug, Clone)]
pub enum EntityKind {
    /// Internal entity. Holds the replacement text: character references
    /// and parameter entity references are already expanded, general
    /// entity references are kept for expansion at the point of use.
    Internal(String),
    /// External entity identified by a system identifier.
    External {
        /// The SYSTEM identifier.
        system_id: String,
        /// The PUBLIC identifier, if any.
        public_id: Option<String>,
        /// The notation of an unparsed entity (`NDATA name`).
        notation: Option<String>,
        /// Directory of the subset that declared the entity; relative
        /// system identifiers resolve against it.
        base: Option<PathBuf>,
    },
}

impl EntityKind {
    /// Returns `true` for unparsed (`NDATA`) entities.
    #[must_use]
    pub fn is_unparsed(&self) -> bool {
        matches!(
            self,
            Self::External {
                notation: Some(_),
                ..
            }
        )
    }
}

/// A notation declaration from `<!NOTATION name ...>`.
///
/// See XML 1.0 section 4.7.
#[derive(Debug, Clone)]
pub struct NotationDecl {
    /// The notation name.
    pub name: String,
    /// The SYSTEM identifier, if any.
    pub system_id: Option<String>,
    /// The PUBLIC identifier, if any.
    pub public_id: Option<String>,
}

impl fmt::Display for ContentModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "EMPTY"),
            Self::Any => write!(f, "ANY"),
            Self::Mixed(names) if names.is_empty() => write!(f, "(#PCDATA)"),
            Self::Mixed(names) => write!(f, "(#PCDATA|{})*", names.join("|")),
            Self::Children(spec) => write!(f, "{spec}"),
        }
    }
}

impl fmt::Display for ContentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (items, separator) = match &self.kind {
            ContentSpecKind::Name(name) => {
                write!(f, "{name}")?;
                (&[][..], "")
            }
            ContentSpecKind::Seq(items) => (items.as_slice(), ","),
            ContentSpecKind::Choice(items) => (items.as_slice(), "|"),
        };
        if !matches!(self.kind, ContentSpecKind::Name(_)) {
            write!(f, "(")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, "{separator}")?;
                }
                write!(f, "{item}")?;
            }
            write!(f, ")")?;
        }
        match self.occurrence {
            Occurrence::Once => Ok(()),
            Occurrence::Optional => write!(f, "?"),
            Occurrence::ZeroOrMore => write!(f, "*"),
            Occurrence::OneOrMore => write!(f, "+"),
        }
    }
}

// ---------------------------------------------------------------------------
// Content model matching
// ---------------------------------------------------------------------------

/// Returns every position in `names` at which a match of `spec` that
/// starts at `pos` can end.
///
/// Tracking the full set instead of a single greedy end keeps optional
/// and repeated particles correct inside choices, e.g. `(a?|b)*`.
pub(crate) fn match_content_spec(spec: &ContentSpec, names: &[&str], pos: usize) -> BTreeSet<usize> {
    let once = |start: usize| -> BTreeSet<usize> {
        match &spec.kind {
            ContentSpecKind::Name(expected) => names
                .get(start)
                .filter(|name| **name == expected.as_str())
                .map(|_| start + 1)
                .into_iter()
                .collect(),
            ContentSpecKind::Seq(items) => items.iter().fold(BTreeSet::from([start]), |ends, item| {
                ends.iter()
                    .flat_map(|&p| match_content_spec(item, names, p))
                    .collect()
            }),
            ContentSpecKind::Choice(items) => items
                .iter()
                .flat_map(|item| match_content_spec(item, names, start))
                .collect(),
        }
    };

    match spec.occurrence {
        Occurrence::Once => once(pos),
        Occurrence::Optional => {
            let mut ends = once(pos);
            ends.insert(pos);
            ends
        }
        Occurrence::ZeroOrMore | Occurrence::OneOrMore => {
            let first = once(pos);
            let mut reached = first.clone();
            let mut frontier: Vec<usize> = first.into_iter().collect();
            while let Some(p) = frontier.pop() {
                for next in once(p) {
                    if reached.insert(next) {
                        frontier.push(next);
                    }
                }
            }
            if spec.occurrence == Occurrence::ZeroOrMore {
                reached.insert(pos);
            }
            reached
        }
    }
}

// ---------------------------------------------------------------------------
// Attribute value expansion (XML 1.0 §3.3.3)
// ---------------------------------------------------------------------------

/// Expands references in an attribute value literal and replaces each
/// whitespace character with a space.
///
/// The error is a bare message; callers attach their own location.
pub(crate) fn expand_att_value(
    raw: &str,
    dtd: &Dtd,
    budget: &mut ExpansionBudget,
) -> Result<String, String> {
    let mut out = String::with_capacity(raw.len());
    expand_att_value_into(raw, dtd, budget, &mut Vec::new(), &mut out)?;
    Ok(out)
}

fn expand_att_value_into(
    text: &str,
    dtd: &Dtd,
    budget: &mut ExpansionBudget,
    open: &mut Vec<String>,
    out: &mut String,
) -> Result<(), String> {
    let mut rest = text;
    while let Some(i) = rest.find(['&', '<', '\t', '\n', '\r']) {
        out.push_str(&rest[..i]);
        let tail = &rest[i..];
        if tail.starts_with('<') {
            return Err("'<' not allowed in attribute values".to_string());
        }
        if !tail.starts_with('&') {
            out.push(' ');
            rest = &tail[1..];
            continue;
        }
        if tail.starts_with("&#") {
            let (ch, len) = parse_char_ref(tail).ok_or("malformed character reference")?;
            out.push(ch);
            rest = &tail[len..];
            continue;
        }

        let (name, len) = split_reference(&tail[1..]).ok_or("malformed entity reference")?;
        if let Some(ch) = predefined_entity(name) {
            out.push(ch);
        } else {
            match dtd.entities.get(name).map(|decl| &decl.kind) {
                Some(EntityKind::Internal(replacement)) => {
                    if open.iter().any(|n| n == name) {
                        return Err(format!("entity '{name}' references itself"));
                    }
                    budget.spend()?;
                    open.push(name.to_string());
                    expand_att_value_into(replacement, dtd, budget, open, out)?;
                    open.pop();
                }
                Some(EntityKind::External { .. }) => {
                    return Err(format!(
                        "attribute values cannot reference external entity '{name}'"
                    ));
                }
                None => return Err(format!("entity '{name}' was referenced but not declared")),
            }
        }
        rest = &tail[1 + len..];
    }
    out.push_str(rest);
    Ok(())
}

/// Collapses runs of spaces and trims, for tokenized attribute types.
pub(crate) fn collapse_whitespace(value: &str) -> String {
    value.split(' ').filter(|s| !s.is_empty()).collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// DTD Parser
// ---------------------------------------------------------------------------

/// Parses standalone DTD text, such as the content of a `.dtd` file.
///
/// The text is treated as an external subset: conditional sections and
/// parameter entity references inside declarations are allowed. External
/// parameter entities are not read.
///
/// # Errors
///
/// Returns a `ParseError` if the DTD text is malformed.
///
/// # Examples
///
/// ```
/// use xmlvalidator::validation::dtd::parse_dtd;
///
/// let dtd = parse_dtd("<!ELEMENT root (#PCDATA)>").unwrap();
/// assert!(dtd.elements.contains_key("root"));
/// ```
pub fn parse_dtd(input: &str) -> Result<Dtd, ParseError> {
    let mut dtd = Dtd::default();
    let mut budget = ExpansionBudget::default();
    let source = SubsetSource {
        text: input,
        external: true,
        start: start_of_text(),
        base: None,
    };
    parse_subset(&mut dtd, &source, DtdLoad::default(), &mut budget)?;
    Ok(dtd)
}

/// One block of DTD text and where it came from.
pub(crate) struct SubsetSource<'a> {
    pub text: &'a str,
    /// `false` for the internal subset.
    pub external: bool,
    /// Location of the first character, so internal-subset positions are
    /// reported relative to the document.
    pub start: SourceLocation,
    /// Directory relative system identifiers resolve against.
    pub base: Option<&'a Path>,
}

/// Settings shared by every subset read into one [`Dtd`].
#[derive(Clone, Copy)]
pub(crate) struct DtdLoad<'a> {
    /// Reads external parameter entities; `None` leaves them unread.
    pub resolver: Option<&'a dyn EntityResolver>,
    pub max_name_length: usize,
    /// Deepest nesting of parenthesized groups in a content model.
    pub max_depth: u32,
}

impl Default for DtdLoad<'_> {
    fn default() -> Self {
        Self {
            resolver: None,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Parses one subset into `dtd`, keeping declarations already present.
pub(crate) fn parse_subset(
    dtd: &mut Dtd,
    source: &SubsetSource<'_>,
    load: DtdLoad<'_>,
    budget: &mut ExpansionBudget,
) -> Result<(), ParseError> {
    let mut parser = DtdParser::new(source, dtd, load, budget);
    parser.parse()
}

fn start_of_text() -> SourceLocation {
    SourceLocation {
        line: 1,
        column: 1,
        byte_offset: 0,
    }
}

/// Internal DTD parser state.
struct DtdParser<'a> {
    input: String,
    pos: usize,
    line: u32,
    column: u32,
    offset: usize,
    dtd: &'a mut Dtd,
    budget: &'a mut ExpansionBudget,
    load: DtdLoad<'a>,
    external: bool,
    base: Option<PathBuf>,
    /// Open `INCLUDE` sections.
    include_depth: usize,
    /// Open content model groups.
    group_depth: u32,
    /// Parameter entities currently being read, for recursion detection.
    open_entities: Vec<String>,
}

impl<'a> DtdParser<'a> {
    fn new(
        source: &SubsetSource<'_>,
        dtd: &'a mut Dtd,
        load: DtdLoad<'a>,
        budget: &'a mut ExpansionBudget,
    ) -> Self {
        Self {
            input: normalize_line_endings(source.text),
            pos: 0,
            line: source.start.line,
            column: source.start.column,
            offset: source.start.byte_offset,
            dtd,
            budget,
            load,
            external: source.external,
            base: source.base.map(Path::to_path_buf),
            include_depth: 0,
            group_depth: 0,
            open_entities: Vec::new(),
        }
    }

    fn parse(&mut self) -> Result<(), ParseError> {
        loop {
            self.skip_blanks();
            if self.at_end() {
                break;
            }

            if self.looking_at(b"<!--") {
                self.skip_comment()?;
            } else if self.looking_at(b"<![") {
                self.parse_conditional_section()?;
            } else if self.looking_at(b"]]>") && self.include_depth > 0 {
                self.advance(3);
                self.include_depth -= 1;
            } else if self.looking_at(b"<!ELEMENT") {
                self.parse_element_decl()?;
            } else if self.looking_at(b"<!ATTLIST") {
                self.parse_attlist_decl()?;
            } else if self.looking_at(b"<!ENTITY") {
                self.parse_entity_decl()?;
            } else if self.looking_at(b"<!NOTATION") {
                self.parse_notation_decl()?;
            } else if self.looking_at(b"<?") {
                self.skip_pi()?;
            } else if self.peek() == Some(b'%') {
                self.parse_pe_between_declarations()?;
            } else {
                return Err(self.fatal(format!(
                    "unexpected character '{}' in DTD",
                    self.peek_char().unwrap_or('?')
                )));
            }
        }

        if self.include_depth > 0 {
            return Err(self.fatal("unterminated INCLUDE section"));
        }
        Ok(())
    }

    // --- Parameter entity references ---

    /// Handles `%name;` at the top level of a subset.
    fn parse_pe_between_declarations(&mut self) -> Result<(), ParseError> {
        let (start, line, column) = (self.pos, self.line, self.column);
        let name = self.parse_pe_reference()?;
        let Some(kind) = self.lookup_parameter_entity(&name)? else {
            return Ok(());
        };
        self.spend_expansion()?;

        match kind {
            EntityKind::Internal(text) => {
                self.splice(start, &text, line, column);
                Ok(())
            }
            EntityKind::External {
                system_id,
                public_id,
                base,
                ..
            } => {
                if self.open_entities.contains(&name) {
                    return Err(self.fatal(format!("parameter entity '%{name};' references itself")));
                }
                let Some(entity) =
                    self.load_external(&name, &system_id, public_id.as_deref(), base.as_deref())?
                else {
                    return Ok(());
                };
                self.parse_external_entity(&name, &entity)
            }
        }
    }

    /// Parses the text of an external parameter entity as a nested
    /// external subset.
    fn parse_external_entity(&mut self, name: &str, entity: &ExternalEntity) -> Result<(), ParseError> {
        let source = SubsetSource {
            text: &entity.text,
            external: true,
            start: start_of_text(),
            base: entity.base.as_deref(),
        };
        let mut nested = DtdParser::new(&source, &mut *self.dtd, self.load, &mut *self.budget);
        nested.open_entities.clone_from(&self.open_entities);
        nested.open_entities.push(name.to_string());
        nested.parse().map_err(|mut err| {
            err.message = format!("in parameter entity '%{name};': {}", err.message);
            err
        })
    }

    /// Expands a `%name;` found inside a markup declaration.
    fn expand_pe_in_declaration(&mut self) -> Result<(), ParseError> {
        if !self.external {
            return Err(self.fatal(
                "parameter entity references are not allowed within markup declarations \
                 in the internal subset",
            ));
        }
        let (start, line, column) = (self.pos, self.line, self.column);
        let name = self.parse_pe_reference()?;
        let text = self.pe_replacement_text(&name)?.unwrap_or_default();
        self.splice(start, &text, line, column);
        Ok(())
    }

    /// Returns the replacement text of a parameter entity, reading
    /// external ones through the resolver.
    fn pe_replacement_text(&mut self, name: &str) -> Result<Option<String>, ParseError> {
        let Some(kind) = self.lookup_parameter_entity(name)? else {
            return Ok(None);
        };
        self.spend_expansion()?;
        match kind {
            EntityKind::Internal(text) => Ok(Some(text)),
            EntityKind::External {
                system_id,
                public_id,
                base,
                ..
            } => Ok(self
                .load_external(name, &system_id, public_id.as_deref(), base.as_deref())?
                .map(|entity| entity.text)),
        }
    }

    /// An undeclared parameter entity is tolerated only when an unread
    /// external entity might have declared it.
    fn lookup_parameter_entity(&mut self, name: &str) -> Result<Option<EntityKind>, ParseError> {
        match self.dtd.parameter_entities.get(name) {
            Some(decl) => Ok(Some(decl.kind.clone())),
            None if self.dtd.skipped_external => {
                tracing::debug!(entity = name, "parameter entity declared in unread entity");
                Ok(None)
            }
            None => Err(self.fatal(format!(
                "parameter entity '%{name};' was referenced but not declared"
            ))),
        }
    }

    fn load_external(
        &mut self,
        name: &str,
        system_id: &str,
        public_id: Option<&str>,
        base: Option<&Path>,
    ) -> Result<Option<ExternalEntity>, ParseError> {
        let Some(resolver) = self.load.resolver else {
            tracing::debug!(entity = name, system_id, "external parameter entity not read");
            self.dtd.skipped_external = true;
            return Ok(None);
        };
        let request = ExternalEntityRequest {
            name: Some(name),
            system_id,
            public_id,
            base,
        };
        resolver
            .resolve(&request)
            .map(Some)
            .map_err(|err| self.fatal(format!("cannot load {request}: {err}")))
    }

    /// Replaces `input[start..pos]` with the padded replacement text and
    /// rewinds to `start`.
    fn splice(&mut self, start: usize, text: &str, line: u32, column: u32) {
        self.input
            .replace_range(start..self.pos, &format!(" {} ", normalize_line_endings(text)));
        self.pos = start;
        self.line = line;
        self.column = column;
    }

    fn parse_pe_reference(&mut self) -> Result<String, ParseError> {
        self.expect_byte(b'%')?;
        let name = self.parse_name()?;
        self.expect_byte(b';')?;
        Ok(name)
    }

    fn spend_expansion(&mut self) -> Result<(), ParseError> {
        self.budget.spend().map_err(|msg| self.fatal(msg))
    }

    /// `%` followed by a name start character begins a reference; `% `
    /// in `<!ENTITY % name` does not.
    fn at_pe_reference(&self) -> bool {
        self.peek() == Some(b'%')
            && self
                .input
                .get(self.pos + 1..)
                .and_then(|s| s.chars().next())
                .is_some_and(is_name_start_char)
    }

    // --- Conditional sections ---
    // See XML 1.0 §3.4: [61] conditionalSect

    fn parse_conditional_section(&mut self) -> Result<(), ParseError> {
        if !self.external {
            return Err(self.fatal("conditional sections are not allowed in the internal subset"));
        }
        self.expect_str(b"<![")?;
        self.skip_whitespace()?;
        if self.looking_at(b"INCLUDE") {
            self.advance(7);
            self.skip_whitespace()?;
            self.expect_byte(b'[')?;
            self.include_depth += 1;
            Ok(())
        } else if self.looking_at(b"IGNORE") {
            self.advance(6);
            self.skip_whitespace()?;
            self.expect_byte(b'[')?;
            self.skip_ignored_section()
        } else {
            Err(self.fatal("expected INCLUDE or IGNORE in conditional section"))
        }
    }

    fn skip_ignored_section(&mut self) -> Result<(), ParseError> {
        let mut depth = 1usize;
        while depth > 0 {
            if self.at_end() {
                return Err(self.fatal("unterminated IGNORE section"));
            }
            if self.looking_at(b"<![") {
                self.advance(3);
                depth += 1;
            } else if self.looking_at(b"]]>") {
                self.advance(3);
                depth -= 1;
            } else {
                self.advance(1);
            }
        }
        Ok(())
    }

    // --- ELEMENT declaration ---
    // See XML 1.0 §3.2: [45] elementdecl

    fn parse_element_decl(&mut self) -> Result<(), ParseError> {
        let location = self.location();
        self.expect_str(b"<!ELEMENT")?;
        self.skip_whitespace_required()?;
        let name = self.parse_name()?;
        self.skip_whitespace_required()?;
        let content_model = self.parse_content_model()?;
        self.skip_whitespace()?;
        self.expect_byte(b'>')?;

        if self.dtd.elements.contains_key(&name) {
            self.dtd.diagnostics.push(ValidityError::error(
                format!("element type '{name}' is declared more than once"),
                Some(location),
            ));
            return Ok(());
        }
        self.dtd.elements.insert(
            name.clone(),
            ElementDecl {
                name,
                content_model,
                location,
            },
        );
        Ok(())
    }

    fn parse_content_model(&mut self) -> Result<ContentModel, ParseError> {
        if self.looking_at(b"EMPTY") {
            self.advance(5);
            return Ok(ContentModel::Empty);
        }
        if self.looking_at(b"ANY") {
            self.advance(3);
            return Ok(ContentModel::Any);
        }

        self.expect_byte(b'(')?;
        self.skip_whitespace()?;

        if !self.looking_at(b"#PCDATA") {
            let spec = self.parse_content_spec_group()?;
            return Ok(ContentModel::Children(spec));
        }

        let location = self.location();
        self.advance(7);
        self.skip_whitespace()?;
        let mut names: Vec<String> = Vec::new();
        if self.peek() == Some(b')') {
            self.advance(1);
            if self.peek() == Some(b'*') {
                self.advance(1);
            }
            return Ok(ContentModel::Mixed(names));
        }

        while self.peek() == Some(b'|') {
            self.advance(1);
            self.skip_whitespace()?;
            let name = self.parse_name()?;
            if names.contains(&name) {
                self.dtd.diagnostics.push(ValidityError::error(
                    format!("element type '{name}' appears more than once in mixed content"),
                    Some(location),
                ));
            } else {
                names.push(name);
            }
            self.skip_whitespace()?;
        }
        self.expect_byte(b')')?;
        if self.peek() != Some(b'*') {
            return Err(self.fatal("mixed content with element types must end with ')*'"));
        }
        self.advance(1);
        Ok(ContentModel::Mixed(names))
    }

    /// Parses a group after its opening `(`.
    fn parse_content_spec_group(&mut self) -> Result<ContentSpec, ParseError> {
        if self.group_depth >= self.load.max_depth {
            return Err(self.fatal(format!(
                "content model nested deeper than {} groups",
                self.load.max_depth
            )));
        }
        self.group_depth += 1;
        let group = self.parse_group_items();
        self.group_depth -= 1;
        group
    }

    fn parse_group_items(&mut self) -> Result<ContentSpec, ParseError> {
        let first = self.parse_content_particle()?;
        self.skip_whitespace()?;

        let separator = match self.peek() {
            Some(sep @ (b',' | b'|')) => sep,
            _ => {
                self.expect_byte(b')')?;
                let occurrence = self.parse_occurrence();
                return Ok(match (occurrence, first.occurrence) {
                    (Occurrence::Once, _) => first,
                    (_, Occurrence::Once) => ContentSpec {
                        kind: first.kind,
                        occurrence,
                    },
                    _ => ContentSpec {
                        kind: ContentSpecKind::Seq(vec![first]),
                        occurrence,
                    },
                });
            }
        };

        let mut items = vec![first];
        while self.peek() == Some(separator) {
            self.advance(1);
            self.skip_whitespace()?;
            items.push(self.parse_content_particle()?);
            self.skip_whitespace()?;
        }
        self.expect_byte(b')')?;
        let occurrence = self.parse_occurrence();
        let kind = if separator == b',' {
            ContentSpecKind::Seq(items)
        } else {
            ContentSpecKind::Choice(items)
        };
        Ok(ContentSpec { kind, occurrence })
    }

    fn parse_content_particle(&mut self) -> Result<ContentSpec, ParseError> {
        if self.peek() == Some(b'(') {
            self.advance(1);
            self.skip_whitespace()?;
            self.parse_content_spec_group()
        } else {
            let name = self.parse_name()?;
            let occurrence = self.parse_occurrence();
            Ok(ContentSpec {
                kind: ContentSpecKind::Name(name),
                occurrence,
            })
        }
    }

    fn parse_occurrence(&mut self) -> Occurrence {
        let occurrence = match self.peek() {
            Some(b'?') => Occurrence::Optional,
            Some(b'*') => Occurrence::ZeroOrMore,
            Some(b'+') => Occurrence::OneOrMore,
            _ => return Occurrence::Once,
        };
        self.advance(1);
        occurrence
    }

    // --- ATTLIST declaration ---
    // See XML 1.0 §3.3: [52] AttlistDecl

    fn parse_attlist_decl(&mut self) -> Result<(), ParseError> {
        let location = self.location();
        self.expect_str(b"<!ATTLIST")?;
        self.skip_whitespace_required()?;
        let element_name = self.parse_name()?;

        loop {
            self.skip_whitespace()?;
            if self.peek() == Some(b'>') {
                self.advance(1);
                return Ok(());
            }

            let attribute_name = self.parse_name()?;
            self.skip_whitespace_required()?;
            let attribute_type = self.parse_attribute_type()?;
            self.skip_whitespace_required()?;
            let default = self.parse_attribute_default(&attribute_type)?;

            let decls = self.dtd.attributes.entry(element_name.clone()).or_default();
            if decls.iter().any(|d| d.attribute_name == attribute_name) {
                tracing::trace!(
                    element = %element_name,
                    attribute = %attribute_name,
                    "ignoring repeated attribute definition"
                );
                continue;
            }
            decls.push(AttributeDecl {
                element_name: element_name.clone(),
                attribute_name,
                attribute_type,
                default,
                location,
            });
        }
    }

    fn parse_attribute_type(&mut self) -> Result<AttributeType, ParseError> {
        const KEYWORDS: [(&[u8], AttributeType); 8] = [
            (b"CDATA", AttributeType::CData),
            (b"IDREFS", AttributeType::IdRefs),
            (b"IDREF", AttributeType::IdRef),
            (b"ID", AttributeType::Id),
            (b"ENTITIES", AttributeType::Entities),
            (b"ENTITY", AttributeType::Entity),
            (b"NMTOKENS", AttributeType::NmTokens),
            (b"NMTOKEN", AttributeType::NmToken),
        ];
        for (keyword, attribute_type) in KEYWORDS {
            if self.looking_at(keyword) {
                self.advance(keyword.len());
                return Ok(attribute_type);
            }
        }
        if self.looking_at(b"NOTATION") {
            self.advance(8);
            self.skip_whitespace_required()?;
            let names = self.parse_enumerated_values(true)?;
            return Ok(AttributeType::Notation(names));
        }
        if self.peek() == Some(b'(') {
            let values = self.parse_enumerated_values(false)?;
            return Ok(AttributeType::Enumeration(values));
        }
        Err(self.fatal("expected attribute type"))
    }

    fn parse_enumerated_values(&mut self, names: bool) -> Result<Vec<String>, ParseError> {
        self.expect_byte(b'(')?;
        let mut values = Vec::new();
        loop {
            self.skip_whitespace()?;
            let value = if names {
                self.parse_name()?
            } else {
                self.parse_nmtoken()?
            };
            values.push(value);
            self.skip_whitespace()?;
            match self.peek() {
                Some(b'|') => self.advance(1),
                _ => {
                    self.expect_byte(b')')?;
                    return Ok(values);
                }
            }
        }
    }

    fn parse_attribute_default(
        &mut self,
        attribute_type: &AttributeType,
    ) -> Result<AttributeDefault, ParseError> {
        if self.looking_at(b"#REQUIRED") {
            self.advance(9);
            return Ok(AttributeDefault::Required);
        }
        if self.looking_at(b"#IMPLIED") {
            self.advance(8);
            return Ok(AttributeDefault::Implied);
        }
        let fixed = self.looking_at(b"#FIXED");
        if fixed {
            self.advance(6);
            self.skip_whitespace_required()?;
        }
        let raw = self.parse_quoted_value()?;
        let mut value =
            expand_att_value(&raw, self.dtd, self.budget).map_err(|msg| self.fatal(msg))?;
        if attribute_type.is_tokenized() {
            value = collapse_whitespace(&value);
        }
        Ok(if fixed {
            AttributeDefault::Fixed(value)
        } else {
            AttributeDefault::Default(value)
        })
    }

    // --- ENTITY declaration ---
    // See XML 1.0 §4.2: [70] EntityDecl

    fn parse_entity_decl(&mut self) -> Result<(), ParseError> {
        self.expect_str(b"<!ENTITY")?;
        self.skip_whitespace_required()?;

        let parameter = self.peek() == Some(b'%');
        if parameter {
            self.advance(1);
            self.skip_whitespace_required()?;
        }
        let name = self.parse_name()?;
        if name.contains(':') {
            return Err(self.fatal(format!("entity name '{name}' must not contain a colon")));
        }
        self.skip_whitespace_required()?;

        let kind = if matches!(self.peek(), Some(b'"' | b'\'')) {
            let raw = self.parse_quoted_value()?;
            EntityKind::Internal(self.expand_entity_value(&raw)?)
        } else {
            let (system_id, public_id) = self.parse_external_id(false)?;
            let had_ws = self.skip_whitespace()?;
            let notation = if self.looking_at(b"NDATA") {
                if parameter {
                    return Err(self.fatal("NDATA annotation is not allowed on parameter entities"));
                }
                if !had_ws {
                    return Err(self.fatal("whitespace required before NDATA"));
                }
                self.advance(5);
                self.skip_whitespace_required()?;
                Some(self.parse_name()?)
            } else {
                None
            };
            EntityKind::External {
                system_id: system_id.unwrap_or_default(),
                public_id,
                notation,
                base: self.base.clone(),
            }
        };

        self.skip_whitespace()?;
        self.expect_byte(b'>')?;

        let map = if parameter {
            &mut self.dtd.parameter_entities
        } else {
            &mut self.dtd.entities
        };
        map.entry(name.clone()).or_insert(EntityDecl { name, kind });
        Ok(())
    }

    /// Computes the replacement text of an entity value literal: parameter
    /// entity and character references are expanded, general entity
    /// references are kept (XML 1.0 §4.5).
    fn expand_entity_value(&mut self, raw: &str) -> Result<String, ParseError> {
        if let Some(c) = raw.chars().find(|&c| !is_xml_char(c)) {
            return Err(self.fatal(format!(
                "invalid XML character U+{:04X} in entity value",
                c as u32
            )));
        }

        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;
        while let Some(i) = rest.find(['%', '&']) {
            out.push_str(&rest[..i]);
            let tail = &rest[i..];
            if let Some(after) = tail.strip_prefix('%') {
                let (name, len) = split_reference(after)
                    .ok_or_else(|| self.fatal("malformed parameter entity reference in entity value"))?;
                if !self.external {
                    return Err(self.fatal(
                        "parameter entity references are not allowed within markup \
                         declarations in the internal subset",
                    ));
                }
                if self.open_entities.iter().any(|n| n == name) {
                    return Err(self.fatal(format!("parameter entity '%{name};' references itself")));
                }
                let text = self.pe_replacement_text(name)?.unwrap_or_default();
                self.open_entities.push(name.to_string());
                let expanded = self.expand_entity_value(&text);
                self.open_entities.pop();
                out.push_str(&expanded?);
                rest = &after[len..];
            } else if tail.starts_with("&#") {
                let (ch, len) = parse_char_ref(tail)
                    .ok_or_else(|| self.fatal("malformed character reference in entity value"))?;
                out.push(ch);
                rest = &tail[len..];
            } else {
                let (_, len) = split_reference(&tail[1..])
                    .ok_or_else(|| self.fatal("malformed entity reference in entity value"))?;
                out.push_str(&tail[..=len]);
                rest = &tail[1 + len..];
            }
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Parses `SYSTEM "sys"` or `PUBLIC "pub" "sys"`. With `public_only`
    /// (notations) the system literal after a public one is optional.
    fn parse_external_id(
        &mut self,
        public_only: bool,
    ) -> Result<(Option<String>, Option<String>), ParseError> {
        if self.looking_at(b"SYSTEM") {
            self.advance(6);
            self.skip_whitespace_required()?;
            let system_id = self.parse_quoted_value()?;
            return Ok((Some(system_id), None));
        }
        if !self.looking_at(b"PUBLIC") {
            return Err(self.fatal("expected SYSTEM or PUBLIC"));
        }
        self.advance(6);
        self.skip_whitespace_required()?;
        let public_id = self.parse_quoted_value()?;
        if let Some(c) = public_id.chars().find(|&c| !is_pubid_char(c)) {
            return Err(self.fatal(format!("invalid character '{c}' in public identifier")));
        }

        if public_only {
            let saved = (self.pos, self.line, self.column);
            self.skip_whitespace()?;
            if !matches!(self.peek(), Some(b'"' | b'\'')) {
                (self.pos, self.line, self.column) = saved;
                return Ok((None, Some(public_id)));
            }
        } else {
            self.skip_whitespace_required()?;
        }
        let system_id = self.parse_quoted_value()?;
        Ok((Some(system_id), Some(public_id)))
    }

    // --- NOTATION declaration ---
    // See XML 1.0 §4.7: [82] NotationDecl

    fn parse_notation_decl(&mut self) -> Result<(), ParseError> {
        let location = self.location();
        self.expect_str(b"<!NOTATION")?;
        self.skip_whitespace_required()?;
        let name = self.parse_name()?;
        if name.contains(':') {
            return Err(self.fatal(format!("notation name '{name}' must not contain a colon")));
        }
        self.skip_whitespace_required()?;
        let (system_id, public_id) = self.parse_external_id(true)?;
        self.skip_whitespace()?;
        self.expect_byte(b'>')?;

        if self.dtd.notations.contains_key(&name) {
            self.dtd.diagnostics.push(ValidityError::error(
                format!("notation '{name}' is declared more than once"),
                Some(location),
            ));
            return Ok(());
        }
        self.dtd.notations.insert(
            name.clone(),
            NotationDecl {
                name,
                system_id,
                public_id,
            },
        );
        Ok(())
    }

    // --- Skip helpers ---

    fn skip_comment(&mut self) -> Result<(), ParseError> {
        self.expect_str(b"<!--")?;
        loop {
            if self.at_end() {
                return Err(self.fatal("unexpected end of input in comment"));
            }
            if self.looking_at(b"-->") {
                self.advance(3);
                return Ok(());
            }
            self.advance(1);
        }
    }

    fn skip_pi(&mut self) -> Result<(), ParseError> {
        self.expect_str(b"<?")?;
        let target = self.parse_name()?;
        if target.eq_ignore_ascii_case("xml") {
            return Err(self.fatal("XML declaration is not allowed inside DTD"));
        }
        loop {
            if self.at_end() {
                return Err(self.fatal("unexpected end of input in processing instruction"));
            }
            if self.looking_at(b"?>") {
                self.advance(2);
                return Ok(());
            }
            self.advance(1);
        }
    }

    // --- Name / token parsing ---

    fn parse_name(&mut self) -> Result<String, ParseError> {
        let first = self
            .peek_char()
            .ok_or_else(|| self.fatal("expected name, found end of input"))?;
        if !is_name_start_char(first) {
            return Err(self.fatal(format!("invalid name start character '{first}'")));
        }
        self.take_name_chars()
    }

    fn parse_nmtoken(&mut self) -> Result<String, ParseError> {
        match self.peek_char() {
            Some(c) if is_name_char(c) => self.take_name_chars(),
            Some(c) => Err(self.fatal(format!("invalid NMTOKEN character '{c}'"))),
            None => Err(self.fatal("expected NMTOKEN, found end of input")),
        }
    }

    fn take_name_chars(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        while let Some(ch) = self.peek_char().filter(|&c| is_name_char(c)) {
            self.advance_char(ch);
        }
        let len = self.pos - start;
        if len > self.load.max_name_length {
            return Err(self.fatal(format!(
                "name length ({len}) exceeds maximum ({})",
                self.load.max_name_length
            )));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_quoted_value(&mut self) -> Result<String, ParseError> {
        let quote = self.next_byte()?;
        if quote != b'"' && quote != b'\'' {
            return Err(self.fatal("expected quoted value"));
        }
        let start = self.pos;
        while !self.at_end() && self.peek() != Some(quote) {
            self.advance(1);
        }
        if self.at_end() {
            return Err(self.fatal("unexpected end of input in quoted value"));
        }
        let value = self.input[start..self.pos].to_string();
        self.advance(1);
        Ok(value)
    }

    // --- Low-level input helpers ---

    fn location(&self) -> SourceLocation {
        SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.offset + self.pos,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.as_bytes().get(self.pos).copied()
    }

    fn peek_char(&self) -> Option<char> {
        self.input.get(self.pos..).and_then(|s| s.chars().next())
    }

    fn advance(&mut self, count: usize) {
        for _ in 0..count {
            match self.peek() {
                Some(b'\n') => {
                    self.line += 1;
                    self.column = 1;
                }
                // continuation bytes do not start a new column
                Some(b) if b & 0xC0 == 0x80 => {}
                Some(_) => self.column += 1,
                None => return,
            }
            self.pos += 1;
        }
    }

    fn advance_char(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.pos += ch.len_utf8();
    }

    fn next_byte(&mut self) -> Result<u8, ParseError> {
        let b = self
            .peek()
            .ok_or_else(|| self.fatal("unexpected end of input"))?;
        self.advance(1);
        Ok(b)
    }

    fn expect_byte(&mut self, expected: u8) -> Result<(), ParseError> {
        match self.peek() {
            Some(b) if b == expected => {
                self.advance(1);
                Ok(())
            }
            Some(_) => Err(self.fatal(format!(
                "expected '{}', found '{}'",
                expected as char,
                self.peek_char().unwrap_or('?')
            ))),
            None => Err(self.fatal(format!(
                "expected '{}', found end of input",
                expected as char
            ))),
        }
    }

    fn expect_str(&mut self, expected: &[u8]) -> Result<(), ParseError> {
        for &b in expected {
            self.expect_byte(b)?;
        }
        Ok(())
    }

    fn looking_at(&self, s: &[u8]) -> bool {
        self.input.as_bytes()[self.pos..].starts_with(s)
    }

    /// Skips whitespace between declarations.
    fn skip_blanks(&mut self) -> bool {
        let start = self.pos;
        while let Some(b' ' | b'\t' | b'\r' | b'\n') = self.peek() {
            self.advance(1);
        }
        self.pos > start
    }

    /// Skips whitespace inside a declaration, expanding any parameter
    /// entity references met along the way.
    fn skip_whitespace(&mut self) -> Result<bool, ParseError> {
        let mut skipped = self.skip_blanks();
        while self.at_pe_reference() {
            self.expand_pe_in_declaration()?;
            self.skip_blanks();
            skipped = true;
        }
        Ok(skipped)
    }

    fn skip_whitespace_required(&mut self) -> Result<(), ParseError> {
        if !self.skip_whitespace()? {
            return Err(self.fatal("whitespace required"));
        }
        Ok(())
    }

    fn fatal(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.location())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
