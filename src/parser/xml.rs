//! Core XML 1.0 parser state machine.
//!
//! Implements a hand-rolled recursive descent parser for XML 1.0 (Fifth Edition).
//! See <https://www.w3.org/TR/xml/> for the specification.

use crate::error::{ErrorSeverity, ParseDiagnostic, ParseError, SourceLocation};
use crate::resolver::ExternalEntityRequest;
use crate::tree::{Attribute, Document, NodeId, NodeKind};
use crate::validation::dtd::{
    collapse_whitespace, expand_att_value, parse_subset, Dtd, DtdLoad, EntityKind, SubsetSource,
};

use super::input::{
    check_qname, is_pubid_char, parse_cdata_content, parse_char_ref, parse_comment_content,
    parse_pi_content, parse_xml_decl, predefined_entity, split_name, ExpansionBudget,
    NamespaceResolver, ParserInput, XMLNS_NAMESPACE, XML_NAMESPACE,
};
use super::ParseOptions;

/// Where a run of content stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContentEnd {
    /// At the end tag of the enclosing element.
    EndTag,
    /// At the end of entity replacement text.
    EndOfInput,
}

/// An attribute as written, before namespace processing.
struct RawAttribute {
    name: String,
    value: String,
}

/// The core XML parser.
pub(crate) struct XmlParser<'o> {
    /// Low-level input state; swapped out while entity text is parsed.
    input: ParserInput,
    /// The document being built.
    doc: Document,
    options: &'o ParseOptions,
    /// Declarations from the DOCTYPE, once it has been read.
    dtd: Option<Dtd>,
    /// Namespace resolver managing the scope stack.
    ns: NamespaceResolver,
    /// Shared with the DTD parser so parameter entities count too.
    budget: ExpansionBudget,
    /// Declarations exist that were not read (external subset or external
    /// parameter entity), so an undeclared entity is not a fatal error.
    external_unread: bool,
    /// General entities being expanded, innermost last.
    entity_stack: Vec<String>,
}

impl<'o> XmlParser<'o> {
    pub fn new(input: &str, options: &'o ParseOptions) -> Self {
        let mut pi = ParserInput::new(input);
        pi.set_max_depth(options.max_depth);
        pi.set_max_name_length(options.max_name_length);

        Self {
            input: pi,
            doc: Document::new(),
            options,
            dtd: None,
            ns: NamespaceResolver::new(),
            budget: ExpansionBudget::new(options.max_entity_expansions),
            external_unread: false,
            entity_stack: Vec::new(),
        }
    }

    /// Parses the entire document. Diagnostics recorded before a fatal
    /// error travel with it.
    pub fn parse(mut self) -> Result<(Document, Option<Dtd>), ParseError> {
        match self.parse_document() {
            Ok(()) => Ok((self.doc, self.dtd)),
            Err(mut err) => {
                err.diagnostics = std::mem::take(&mut self.doc.diagnostics);
                Err(err)
            }
        }
    }

    fn parse_document(&mut self) -> Result<(), ParseError> {
        let root = self.doc.root();
        if self.looking_at_xml_decl() {
            self.parse_xml_declaration()?;
        } else if self.input.skip_whitespace() && self.looking_at_xml_decl() {
            return Err(self
                .input
                .fatal("XML declaration must be at the start of the document"));
        }

        self.parse_misc(root)?;
        if self.input.looking_at(b"<!DOCTYPE") {
            self.parse_doctype(root)?;
            self.parse_misc(root)?;
        }

        if self.input.peek() == Some(b'<')
            && self
                .input
                .peek_at(1)
                .is_some_and(|b| b != b'!' && b != b'?' && b != b'/')
        {
            self.parse_element(root)?;
        } else {
            return Err(self.input.fatal("missing root element"));
        }

        self.parse_misc(root)?;
        if !self.input.at_end() {
            return Err(self.input.fatal("content after document element"));
        }
        Ok(())
    }

    fn looking_at_xml_decl(&self) -> bool {
        self.input.looking_at(b"<?xml")
            && matches!(self.input.peek_at(5), Some(b' ' | b'\t' | b'\n' | b'\r'))
    }

    // --- XML Declaration ---
    // See XML 1.0 §2.8: [23] XMLDecl

    fn parse_xml_declaration(&mut self) -> Result<(), ParseError> {
        let decl = parse_xml_decl(&mut self.input)?;
        self.doc.version = Some(decl.version);
        self.doc.encoding = decl.encoding;
        self.doc.standalone = decl.standalone;
        Ok(())
    }

    // --- Misc (comments, PIs, whitespace) ---

    fn parse_misc(&mut self, parent: NodeId) -> Result<(), ParseError> {
        loop {
            self.input.skip_whitespace();
            if self.input.looking_at(b"<!--") {
                self.parse_comment(parent)?;
            } else if self.input.looking_at(b"<?") {
                if self.looking_at_xml_decl() {
                    return Err(self
                        .input
                        .fatal("XML declaration must be at the start of the document"));
                }
                self.parse_processing_instruction(parent)?;
            } else {
                return Ok(());
            }
        }
    }

    // --- Document Type Declaration ---
    // See XML 1.0 §2.8: [28] doctypedecl

    fn parse_doctype(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let location = self.input.location();
        self.input.expect_str(b"<!DOCTYPE")?;
        self.input.skip_whitespace_required()?;
        let name = self.input.parse_name()?;
        if self.options.namespaces {
            if let Some(problem) = check_qname(&name) {
                return Err(self.input.fatal(format!("DOCTYPE name '{name}' {problem}")));
            }
        }

        let had_ws = self.input.skip_whitespace();
        let mut system_id = None;
        let mut public_id = None;
        if self.input.looking_at(b"SYSTEM") || self.input.looking_at(b"PUBLIC") {
            if !had_ws {
                return Err(self.input.fatal("whitespace required before external ID"));
            }
            if self.input.looking_at(b"PUBLIC") {
                self.input.expect_str(b"PUBLIC")?;
                self.input.skip_whitespace_required()?;
                let pid = self.input.parse_quoted_value()?;
                if let Some(c) = pid.chars().find(|&c| !is_pubid_char(c)) {
                    return Err(self
                        .input
                        .fatal(format!("invalid character '{c}' in public identifier")));
                }
                public_id = Some(pid);
            } else {
                self.input.expect_str(b"SYSTEM")?;
            }
            self.input.skip_whitespace_required()?;
            system_id = Some(self.input.parse_quoted_value()?);
            self.input.skip_whitespace();
        }

        let mut internal_subset = None;
        let mut subset_start = location;
        if self.input.peek() == Some(b'[') {
            self.input.advance(1);
            subset_start = self.input.location();
            internal_subset = Some(self.scan_internal_subset()?);
            self.input.expect_byte(b']')?;
            self.input.skip_whitespace();
        }
        self.input.expect_byte(b'>')?;

        self.read_dtd(
            internal_subset.as_deref(),
            subset_start,
            system_id.as_deref(),
            public_id.as_deref(),
        )?;

        let doctype_id = self.doc.create_node_at(
            NodeKind::DocumentType {
                name,
                system_id,
                public_id,
                internal_subset,
            },
            location,
        );
        self.doc.append_child(parent, doctype_id);
        Ok(())
    }

    /// Returns the internal subset text, leaving the input at its `]`.
    ///
    /// Literals, comments and PIs are stepped over whole so that a `]`
    /// inside them does not end the subset.
    fn scan_internal_subset(&mut self) -> Result<String, ParseError> {
        let start = self.input.pos();
        loop {
            match self.input.peek() {
                None => {
                    return Err(self
                        .input
                        .fatal("unexpected end of input in internal subset"))
                }
                Some(b']') => break,
                Some(b'"' | b'\'') => {
                    self.input.parse_quoted_value()?;
                }
                Some(b'<') if self.input.looking_at(b"<!--") => {
                    parse_comment_content(&mut self.input)?;
                }
                Some(b'<') if self.input.looking_at(b"<?") => {
                    parse_pi_content(&mut self.input)?;
                }
                Some(_) => {
                    self.input.next_char()?;
                }
            }
        }
        Ok(self.input.slice(start, self.input.pos()).to_string())
    }

    /// Reads the internal subset, then the external one, into the DTD.
    fn read_dtd(
        &mut self,
        internal_subset: Option<&str>,
        subset_start: SourceLocation,
        system_id: Option<&str>,
        public_id: Option<&str>,
    ) -> Result<(), ParseError> {
        let options = self.options;
        let load = DtdLoad {
            resolver: options
                .load_external_dtd
                .then_some(&*options.entity_resolver),
            max_name_length: options.max_name_length,
            max_depth: options.max_depth,
        };
        let mut dtd = Dtd::default();

        if let Some(text) = internal_subset {
            let source = SubsetSource {
                text,
                external: false,
                start: subset_start,
                base: options.base_dir.as_deref(),
            };
            parse_subset(&mut dtd, &source, load, &mut self.budget)?;
        }

        if let Some(system_id) = system_id {
            let request = ExternalEntityRequest {
                name: None,
                system_id,
                public_id,
                base: options.base_dir.as_deref(),
            };
            if options.load_external_dtd {
                tracing::debug!(system_id, "loading external DTD subset");
                let entity = options
                    .entity_resolver
                    .resolve(&request)
                    .map_err(|err| self.input.fatal(format!("cannot load {request}: {err}")))?;
                let source = SubsetSource {
                    text: &entity.text,
                    external: true,
                    start: SourceLocation {
                        line: 1,
                        column: 1,
                        byte_offset: 0,
                    },
                    base: entity.base.as_deref(),
                };
                parse_subset(&mut dtd, &source, load, &mut self.budget).map_err(|mut err| {
                    err.message = format!("in {request}: {}", err.message);
                    err
                })?;
            } else {
                tracing::debug!(system_id, "external DTD subset not read");
                self.external_unread = true;
            }
        }

        self.external_unread |= dtd.skipped_external;
        self.dtd = Some(dtd);
        Ok(())
    }

    // --- Elements ---
    // See XML 1.0 §3.1: [40] STag, [42] ETag, [44] EmptyElemTag

    fn parse_element(&mut self, parent: NodeId) -> Result<NodeId, ParseError> {
        let location = self.input.location();
        self.input.increment_depth()?;
        self.input.expect_byte(b'<')?;
        let name = self.input.parse_name()?;

        let mut raw_attributes: Vec<RawAttribute> = Vec::new();
        loop {
            let had_ws = self.input.skip_whitespace();
            if self.input.peek() == Some(b'>') || self.input.looking_at(b"/>") {
                break;
            }
            if !had_ws {
                return Err(self.input.fatal("whitespace required between attributes"));
            }
            let attr = self.parse_attribute()?;
            // WFC: Unique Att Spec
            if raw_attributes.iter().any(|a| a.name == attr.name) {
                return Err(self
                    .input
                    .fatal(format!("duplicate attribute '{}'", attr.name)));
            }
            raw_attributes.push(attr);
            if raw_attributes.len() > self.options.max_attributes as usize {
                return Err(self.input.fatal(format!(
                    "too many attributes on element '{name}' (maximum {})",
                    self.options.max_attributes
                )));
            }
        }

        self.apply_attribute_decls(&name, &mut raw_attributes);

        let has_ns_decls = self.options.namespaces
            && raw_attributes
                .iter()
                .any(|a| a.name == "xmlns" || a.name.starts_with("xmlns:"));
        if has_ns_decls {
            self.ns.push_scope();
        }
        let kind = if self.options.namespaces {
            self.resolve_namespaces(name.clone(), raw_attributes, has_ns_decls)?
        } else {
            NodeKind::Element {
                name: name.clone(),
                prefix: None,
                namespace: None,
                attributes: raw_attributes
                    .into_iter()
                    .map(|a| Attribute {
                        name: a.name,
                        value: a.value,
                        prefix: None,
                        namespace: None,
                    })
                    .collect(),
            }
        };

        let elem_id = self.doc.create_node_at(kind, location);
        self.doc.append_child(parent, elem_id);

        if self.input.looking_at(b"/>") {
            self.input.advance(2);
        } else {
            self.input.expect_byte(b'>')?;
            self.parse_content(elem_id, ContentEnd::EndTag)?;
            self.input.expect_str(b"</")?;
            let end_name = self.input.parse_name()?;
            if end_name != name {
                return Err(self.input.fatal(format!(
                    "mismatched end tag: expected </{name}>, found </{end_name}>"
                )));
            }
            self.input.skip_whitespace();
            self.input.expect_byte(b'>')?;
        }

        if has_ns_decls {
            self.ns.pop_scope();
        }
        self.input.decrement_depth();
        Ok(elem_id)
    }

    /// Normalizes tokenized attribute values and adds declared defaults for
    /// attributes the start tag omits (XML 1.0 §3.3.2, §3.3.3).
    fn apply_attribute_decls(&self, element: &str, attributes: &mut Vec<RawAttribute>) {
        let Some(dtd) = &self.dtd else {
            return;
        };
        for decl in dtd.attribute_decls(element) {
            match attributes.iter_mut().find(|a| a.name == decl.attribute_name) {
                Some(attr) if decl.attribute_type.is_tokenized() => {
                    attr.value = collapse_whitespace(&attr.value);
                }
                Some(_) => {}
                None => {
                    if let Some(value) = decl.default.value() {
                        attributes.push(RawAttribute {
                            name: decl.attribute_name.clone(),
                            value: value.to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Applies Namespaces in XML 1.0 to an element and its attributes.
    fn resolve_namespaces(
        &mut self,
        name: String,
        raw_attributes: Vec<RawAttribute>,
        has_ns_decls: bool,
    ) -> Result<NodeKind, ParseError> {
        if let Some(problem) = check_qname(&name) {
            return Err(self.input.fatal(format!("element name '{name}' {problem}")));
        }
        for attr in &raw_attributes {
            if let Some(problem) = check_qname(&attr.name) {
                return Err(self
                    .input
                    .fatal(format!("attribute name '{}' {problem}", attr.name)));
            }
        }

        if has_ns_decls {
            for attr in &raw_attributes {
                let declared = match split_name(&attr.name) {
                    (Some("xmlns"), prefix) => Some(prefix),
                    (None, "xmlns") => None,
                    _ => continue,
                };
                self.check_namespace_binding(declared, &attr.value)?;
                self.ns
                    .bind(declared.map(str::to_string), attr.value.clone());
            }
        }

        let (prefix, local) = split_name(&name);
        if prefix == Some("xmlns") {
            return Err(self
                .input
                .fatal("elements must not have the prefix 'xmlns'"));
        }
        let namespace = self.ns.resolve(prefix).map(str::to_string);
        if let (Some(prefix), None) = (prefix, &namespace) {
            return Err(self
                .input
                .fatal(format!("unbound namespace prefix '{prefix}'")));
        }

        let mut attributes: Vec<Attribute> = Vec::with_capacity(raw_attributes.len());
        for raw in raw_attributes {
            let (attr_prefix, attr_local) = split_name(&raw.name);
            let attr_namespace = match attr_prefix {
                None => None,
                Some("xmlns") => Some(XMLNS_NAMESPACE.to_string()),
                Some(p) => match self.ns.resolve(Some(p)) {
                    Some(uri) => Some(uri.to_string()),
                    None => {
                        return Err(self
                            .input
                            .fatal(format!("unbound namespace prefix '{p}' on attribute")))
                    }
                },
            };
            let attribute = Attribute {
                name: attr_local.to_string(),
                prefix: attr_prefix.map(str::to_string),
                namespace: attr_namespace,
                value: raw.value,
            };
            // Namespaces in XML 1.0 §6.3: no two attributes with the same
            // expanded name.
            if attribute.namespace.is_some()
                && attributes
                    .iter()
                    .any(|a| a.namespace == attribute.namespace && a.name == attribute.name)
            {
                return Err(self.input.fatal(format!(
                    "duplicate attribute '{{{}}}{}'",
                    attribute.namespace.as_deref().unwrap_or_default(),
                    attribute.name
                )));
            }
            attributes.push(attribute);
        }

        Ok(NodeKind::Element {
            name: local.to_string(),
            prefix: prefix.map(str::to_string),
            namespace,
            attributes,
        })
    }

    fn check_namespace_binding(&self, prefix: Option<&str>, uri: &str) -> Result<(), ParseError> {
        let problem = match prefix {
            Some("xmlns") => Some("the 'xmlns' prefix must not be declared"),
            Some("xml") if uri != XML_NAMESPACE => {
                Some("the 'xml' prefix must be bound to the XML namespace")
            }
            Some(_) if uri.is_empty() => {
                return Err(self.input.fatal(format!(
                    "namespace prefix '{}' cannot be undeclared in XML 1.0",
                    prefix.unwrap_or_default()
                )))
            }
            Some(p) if p != "xml" && uri == XML_NAMESPACE => {
                Some("only the 'xml' prefix may be bound to the XML namespace")
            }
            None if uri == XML_NAMESPACE => {
                Some("the xml namespace must not be declared as the default namespace")
            }
            _ if uri == XMLNS_NAMESPACE => Some("the xmlns namespace must not be bound"),
            _ => None,
        };
        match problem {
            Some(msg) => Err(self.input.fatal(msg)),
            None => Ok(()),
        }
    }

    fn parse_attribute(&mut self) -> Result<RawAttribute, ParseError> {
        let name = self.input.parse_name()?;
        self.input.skip_whitespace();
        self.input.expect_byte(b'=')?;
        self.input.skip_whitespace();
        let value_location = self.input.location();
        let raw = self.input.parse_quoted_value()?;

        let empty;
        let dtd = match &self.dtd {
            Some(dtd) => dtd,
            None => {
                empty = Dtd::default();
                &empty
            }
        };
        let value = expand_att_value(&raw, dtd, &mut self.budget).map_err(|msg| {
            let msg = if self.external_unread && msg.ends_with("not declared") {
                format!("{msg} (it may be declared in an external subset that was not read)")
            } else {
                msg
            };
            ParseError::new(format!("in attribute '{name}': {msg}"), value_location)
        })?;
        Ok(RawAttribute { name, value })
    }

    // --- Content ---
    // See XML 1.0 §3.1: [43] content

    fn parse_content(&mut self, parent: NodeId, end: ContentEnd) -> Result<(), ParseError> {
        loop {
            if self.input.at_end() {
                return match end {
                    ContentEnd::EndOfInput => Ok(()),
                    ContentEnd::EndTag => Err(self
                        .input
                        .fatal("unexpected end of input in element content")),
                };
            }

            if self.input.looking_at(b"</") {
                if end == ContentEnd::EndTag {
                    return Ok(());
                }
                return Err(self.input.fatal(format!(
                    "end tag without start tag in replacement text of entity '{}'",
                    self.entity_stack.last().map_or("", String::as_str)
                )));
            }

            if self.input.looking_at(b"<![CDATA[") {
                self.parse_cdata(parent)?;
            } else if self.input.looking_at(b"<!--") {
                self.parse_comment(parent)?;
            } else if self.input.looking_at(b"<?") {
                self.parse_processing_instruction(parent)?;
            } else if self.input.peek() == Some(b'<') {
                self.parse_element(parent)?;
            } else if self.input.peek() == Some(b'&') {
                self.parse_reference(parent)?;
            } else {
                self.parse_char_data(parent)?;
            }
        }
    }

    // See XML 1.0 §2.4: [14] CharData
    fn parse_char_data(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let location = self.input.location();
        let start = self.input.pos();
        while let Some(b) = self.input.peek() {
            if b == b'<' || b == b'&' {
                break;
            }
            if b == b']' && self.input.looking_at(b"]]>") {
                return Err(self.input.fatal("']]>' not allowed in character data"));
            }
            self.input.next_char()?;
        }
        let text = self.input.slice(start, self.input.pos()).to_string();
        self.append_text(parent, &text, location);
        Ok(())
    }

    /// Appends text, merging with a preceding text node.
    fn append_text(&mut self, parent: NodeId, text: &str, location: SourceLocation) {
        if text.is_empty() {
            return;
        }
        if let Some(last) = self.doc.last_child(parent) {
            if let NodeKind::Text { content } = &mut self.doc.node_mut(last).kind {
                content.push_str(text);
                return;
            }
        }
        let id = self.doc.create_node_at(
            NodeKind::Text {
                content: text.to_string(),
            },
            location,
        );
        self.doc.append_child(parent, id);
    }

    // --- References ---
    // See XML 1.0 §4.1: [67] Reference, §4.4 entity handling

    fn parse_reference(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let location = self.input.location();
        if self.input.looking_at(b"&#") {
            let (ch, len) = parse_char_ref(self.input.rest())
                .ok_or_else(|| self.input.fatal("malformed character reference"))?;
            self.input.advance(len);
            self.append_text(parent, ch.encode_utf8(&mut [0; 4]), location);
            return Ok(());
        }

        self.input.expect_byte(b'&')?;
        let name = self.input.parse_name()?;
        self.input.expect_byte(b';')?;

        if let Some(ch) = predefined_entity(&name) {
            self.append_text(parent, ch.encode_utf8(&mut [0; 4]), location);
            return Ok(());
        }

        let kind = self
            .dtd
            .as_ref()
            .and_then(|dtd| dtd.entities.get(&name))
            .map(|decl| decl.kind.clone());
        let Some(kind) = kind else {
            return self.undeclared_entity(parent, name, location);
        };

        if self.entity_stack.contains(&name) {
            return Err(ParseError::new(
                format!("entity '{name}' references itself"),
                location,
            ));
        }
        self.budget
            .spend()
            .map_err(|msg| ParseError::new(msg, location))?;

        match kind {
            EntityKind::Internal(text) => {
                if text.contains(['<', '&']) {
                    self.parse_entity_text(parent, name, &text, location)
                } else {
                    self.append_text(parent, &text, location);
                    Ok(())
                }
            }
            EntityKind::External {
                notation: Some(_), ..
            } => Err(ParseError::new(
                format!("reference to unparsed entity '{name}'"),
                location,
            )),
            EntityKind::External {
                system_id,
                public_id,
                base,
                ..
            } => {
                if !self.options.load_external_dtd {
                    tracing::debug!(entity = %name, "external entity not read");
                    self.append_entity_ref(parent, name, location);
                    return Ok(());
                }
                let request = ExternalEntityRequest {
                    name: Some(&name),
                    system_id: &system_id,
                    public_id: public_id.as_deref(),
                    base: base.as_deref(),
                };
                let entity = self
                    .options
                    .entity_resolver
                    .resolve(&request)
                    .map_err(|err| ParseError::new(format!("cannot load {request}: {err}"), location))?;
                self.parse_entity_text(parent, name, &entity.text, location)
            }
        }
    }

    /// An entity that has no declaration is fatal (WFC: Entity Declared)
    /// unless unread declarations might hold it.
    fn undeclared_entity(
        &mut self,
        parent: NodeId,
        name: String,
        location: SourceLocation,
    ) -> Result<(), ParseError> {
        if !self.external_unread {
            return Err(ParseError::new(
                format!("entity '{name}' was referenced but not declared"),
                location,
            ));
        }
        self.doc.diagnostics.push(ParseDiagnostic {
            severity: ErrorSeverity::Warning,
            message: format!("entity '{name}' was not expanded: its declaration was not read"),
            location,
        });
        self.append_entity_ref(parent, name, location);
        Ok(())
    }

    fn append_entity_ref(&mut self, parent: NodeId, name: String, location: SourceLocation) {
        let id = self.doc.create_node_at(NodeKind::EntityRef { name }, location);
        self.doc.append_child(parent, id);
    }

    /// Parses replacement text as content of `parent`. Positions inside it
    /// are reported at the reference.
    fn parse_entity_text(
        &mut self,
        parent: NodeId,
        name: String,
        text: &str,
        location: SourceLocation,
    ) -> Result<(), ParseError> {
        let entity_input = ParserInput::for_entity(text, location, &self.input);
        let outer = std::mem::replace(&mut self.input, entity_input);
        self.entity_stack.push(name);
        let result = self.parse_content(parent, ContentEnd::EndOfInput);
        self.entity_stack.pop();
        self.input = outer;
        result
    }

    // --- Comments, CDATA, PIs ---

    fn parse_comment(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let location = self.input.location();
        let content = parse_comment_content(&mut self.input)?;
        let comment_id = self
            .doc
            .create_node_at(NodeKind::Comment { content }, location);
        self.doc.append_child(parent, comment_id);
        Ok(())
    }

    fn parse_cdata(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let location = self.input.location();
        let content = parse_cdata_content(&mut self.input)?;
        let cdata_id = self
            .doc
            .create_node_at(NodeKind::CData { content }, location);
        self.doc.append_child(parent, cdata_id);
        Ok(())
    }

    fn parse_processing_instruction(&mut self, parent: NodeId) -> Result<(), ParseError> {
        let location = self.input.location();
        let (target, data) = parse_pi_content(&mut self.input)?;
        let pi_id = self
            .doc
            .create_node_at(NodeKind::ProcessingInstruction { target, data }, location);
        self.doc.append_child(parent, pi_id);
        Ok(())
    }
}
