//! DTD validity checks over a parsed document.
//!
//! [`validate`] walks the tree in document order and reports every violated
//! validity constraint of XML 1.0 §2.8, §3 and §4 to an [`ErrorHandler`] as
//! soon as it is found. Problems in the declarations themselves come first,
//! then the root element, then each element with its attributes, and
//! finally the `IDREF`s that never matched an `ID`.
//!
//! Element and attribute names are compared as written (`prefix:local`),
//! which is how a DTD declares them.

use std::collections::{HashMap, HashSet};

use crate::error::SourceLocation;
use crate::parser::input::{is_valid_name, is_valid_nmtoken};
use crate::tree::{Document, NodeId, NodeKind};

use super::dtd::{
    match_content_spec, AttributeDecl, AttributeDefault, AttributeType, ContentModel,
    ContentSpec, ContentSpecKind, Dtd, EntityKind,
};
use super::{report, ErrorHandler, ValidityError};

/// Validates a document against a DTD.
///
/// IDs found on the way are registered with the document so that
/// [`Document::element_by_id`] and the `XPath` `id()` function work.
///
/// # Checks Performed
///
/// - Declarations: unique element types and notations, one `ID` attribute
///   per element type, `ID` defaults, declared notations
/// - Root element name matches the DOCTYPE name
/// - Every element type is declared and its content matches the model
/// - Attributes are declared, `#REQUIRED` ones present, `#FIXED` ones
///   unchanged, and values fit their declared type
/// - `ID` values are unique and every `IDREF` names one of them
///
/// # Errors
///
/// Returns the first diagnostic the handler refuses.
///
/// # Examples
///
/// ```
/// use xmlvalidator::validation::{check, dtd::parse_dtd, CollectingHandler};
/// use xmlvalidator::Document;
///
/// let dtd = parse_dtd("<!ELEMENT root (#PCDATA)>").unwrap();
/// let mut doc = Document::parse_str("<!DOCTYPE root><root>hello</root>").unwrap();
/// let mut handler = CollectingHandler::default();
/// check::validate(&mut doc, &dtd, &mut handler).unwrap();
/// assert!(handler.is_valid());
/// ```
pub fn validate(
    doc: &mut Document,
    dtd: &Dtd,
    handler: &mut dyn ErrorHandler,
) -> Result<(), ValidityError> {
    let ids = {
        let mut checker = Checker {
            doc: &*doc,
            dtd,
            handler,
            ids: HashMap::new(),
            idrefs: Vec::new(),
        };
        checker.run()?;
        checker.ids
    };
    for (value, node) in ids {
        doc.set_id(&value, node);
    }
    Ok(())
}

struct Checker<'a, 'h> {
    doc: &'a Document,
    dtd: &'a Dtd,
    handler: &'h mut dyn ErrorHandler,
    ids: HashMap<String, NodeId>,
    /// Every IDREF token with the element that carried it.
    idrefs: Vec<(String, SourceLocation)>,
}

impl Checker<'_, '_> {
    fn run(&mut self) -> Result<(), ValidityError> {
        let dtd = self.dtd;
        for diagnostic in &dtd.diagnostics {
            report(self.handler, diagnostic.clone())?;
        }
        self.check_declarations()?;

        let Some(root) = self.doc.root_element() else {
            return Ok(());
        };
        self.check_root_element(root)?;
        self.check_element(root)?;

        let idrefs = std::mem::take(&mut self.idrefs);
        for (value, location) in idrefs {
            if !self.ids.contains_key(&value) {
                self.error(
                    format!("IDREF '{value}' does not match any ID in the document"),
                    location,
                )?;
            }
        }
        Ok(())
    }

    fn error(&mut self, message: String, location: SourceLocation) -> Result<(), ValidityError> {
        report(self.handler, ValidityError::error(message, Some(location)))
    }

    fn warning(&mut self, message: String, location: SourceLocation) -> Result<(), ValidityError> {
        report(self.handler, ValidityError::warning(message, Some(location)))
    }

    // --- Declarations ---

    fn check_declarations(&mut self) -> Result<(), ValidityError> {
        let dtd = self.dtd;

        let mut attlists: Vec<(&String, &Vec<AttributeDecl>)> = dtd.attributes.iter().collect();
        attlists.sort_by_key(|(_, decls)| decls.first().map(|d| d.location.byte_offset));
        for (element, decls) in attlists {
            let Some(first) = decls.first() else {
                continue;
            };
            if !dtd.elements.contains_key(element) {
                self.warning(
                    format!("attribute list declared for undeclared element type '{element}'"),
                    first.location,
                )?;
            }
            self.check_attribute_decls(element, decls)?;
        }

        let mut elements: Vec<_> = dtd.elements.values().collect();
        elements.sort_by_key(|decl| decl.location.byte_offset);
        for decl in elements {
            let mut referenced = Vec::new();
            match &decl.content_model {
                ContentModel::Mixed(names) => referenced.extend(names.iter()),
                ContentModel::Children(spec) => collect_names(spec, &mut referenced),
                ContentModel::Empty | ContentModel::Any => {}
            }
            let mut seen = HashSet::new();
            for name in referenced {
                if seen.insert(name) && !dtd.elements.contains_key(name) {
                    self.warning(
                        format!(
                            "content model of element type '{}' refers to undeclared element type '{name}'",
                            decl.name
                        ),
                        decl.location,
                    )?;
                }
            }
        }

        let mut unparsed: Vec<_> = dtd
            .entities
            .values()
            .filter_map(|decl| match &decl.kind {
                EntityKind::External {
                    notation: Some(notation),
                    ..
                } => Some((decl.name.as_str(), notation.as_str())),
                _ => None,
            })
            .collect();
        unparsed.sort_unstable();
        for (entity, notation) in unparsed {
            if !dtd.notations.contains_key(notation) {
                report(
                    self.handler,
                    ValidityError::error(
                        format!("notation '{notation}' of unparsed entity '{entity}' is not declared"),
                        None,
                    ),
                )?;
            }
        }
        Ok(())
    }

    fn check_attribute_decls(
        &mut self,
        element: &str,
        decls: &[AttributeDecl],
    ) -> Result<(), ValidityError> {
        let dtd = self.dtd;
        let mut id_attribute: Option<&str> = None;
        let mut notation_attribute: Option<&str> = None;
        for decl in decls {
            match &decl.attribute_type {
                AttributeType::Id => {
                    if let Some(previous) = id_attribute {
                        self.error(
                            format!(
                                "element type '{element}' has more than one ID attribute \
                                 ('{previous}' and '{}')",
                                decl.attribute_name
                            ),
                            decl.location,
                        )?;
                    }
                    id_attribute = Some(decl.attribute_name.as_str());
                    if !matches!(decl.default, AttributeDefault::Implied | AttributeDefault::Required) {
                        self.error(
                            format!(
                                "ID attribute '{}' of element type '{element}' must be \
                                 #IMPLIED or #REQUIRED",
                                decl.attribute_name
                            ),
                            decl.location,
                        )?;
                    }
                }
                AttributeType::Notation(names) => {
                    if let Some(previous) = notation_attribute {
                        self.error(
                            format!(
                                "element type '{element}' has more than one NOTATION attribute \
                                 ('{previous}' and '{}')",
                                decl.attribute_name
                            ),
                            decl.location,
                        )?;
                    }
                    notation_attribute = Some(decl.attribute_name.as_str());
                    for name in names {
                        if !dtd.notations.contains_key(name) {
                            self.error(
                                format!(
                                    "notation '{name}' used by attribute '{}' of element type \
                                     '{element}' is not declared",
                                    decl.attribute_name
                                ),
                                decl.location,
                            )?;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    // --- Elements ---

    fn check_root_element(&mut self, root: NodeId) -> Result<(), ValidityError> {
        let doc = self.doc;
        let Some(doctype) = doc.doctype() else {
            return Ok(());
        };
        let NodeKind::DocumentType { name: expected, .. } = &doc.node(doctype).kind else {
            return Ok(());
        };
        let actual = doc.qualified_name(root).unwrap_or_default();
        if actual != *expected {
            self.error(
                format!("root element '{actual}' does not match DOCTYPE name '{expected}'"),
                doc.location(root),
            )?;
        }
        Ok(())
    }

    fn check_element(&mut self, node: NodeId) -> Result<(), ValidityError> {
        let doc = self.doc;
        let dtd = self.dtd;
        let name = doc.qualified_name(node).unwrap_or_default();
        let location = doc.location(node);

        match dtd.element(&name) {
            Some(decl) => self.check_content(node, &name, &decl.content_model)?,
            None => self.error(format!("element type '{name}' is not declared"), location)?,
        }
        self.check_attributes(node, &name)?;

        for child in doc.children(node) {
            if matches!(doc.node(child).kind, NodeKind::Element { .. }) {
                self.check_element(child)?;
            }
        }
        Ok(())
    }

    fn check_content(
        &mut self,
        node: NodeId,
        name: &str,
        model: &ContentModel,
    ) -> Result<(), ValidityError> {
        let doc = self.doc;
        let location = doc.location(node);
        match model {
            ContentModel::Empty => {
                if doc.first_child(node).is_some() {
                    self.error(
                        format!("element '{name}' is declared EMPTY but has content"),
                        location,
                    )?;
                }
            }
            ContentModel::Any => {}
            ContentModel::Mixed(allowed) => {
                for child in doc.children(node) {
                    let Some(child_name) = element_name(doc, child) else {
                        continue;
                    };
                    if !allowed.contains(&child_name) {
                        self.error(
                            format!(
                                "element '{child_name}' is not allowed in mixed content of \
                                 '{name}' (allowed: {model})"
                            ),
                            doc.location(child),
                        )?;
                    }
                }
            }
            ContentModel::Children(spec) => {
                let has_text = doc.children(node).any(|child| match &doc.node(child).kind {
                    NodeKind::Text { content } => !content.trim_matches(is_xml_space).is_empty(),
                    NodeKind::CData { .. } => true,
                    _ => false,
                });
                if has_text {
                    self.error(
                        format!(
                            "element '{name}' has element-only content model {model} \
                             but contains character data"
                        ),
                        location,
                    )?;
                }

                let child_names: Vec<String> = doc
                    .children(node)
                    .filter_map(|child| element_name(doc, child))
                    .collect();
                let names: Vec<&str> = child_names.iter().map(String::as_str).collect();
                if !match_content_spec(spec, &names, 0).contains(&names.len()) {
                    self.error(
                        format!(
                            "element '{name}' content does not match declared content model \
                             {model}; found children: [{}]",
                            names.join(", ")
                        ),
                        location,
                    )?;
                }
            }
        }
        Ok(())
    }

    // --- Attributes ---

    fn check_attributes(&mut self, node: NodeId, element: &str) -> Result<(), ValidityError> {
        let doc = self.doc;
        let dtd = self.dtd;
        let location = doc.location(node);
        let actual = doc.attributes(node);

        // xmlns and xmlns:* need declarations too.
        for attr in actual {
            let qname = attr.qualified_name();
            if dtd.attribute_decl(element, &qname).is_none() {
                self.error(
                    format!("attribute '{qname}' is not declared for element '{element}'"),
                    location,
                )?;
            }
        }

        for decl in dtd.attribute_decls(element) {
            let value = actual
                .iter()
                .find(|a| a.qualified_name() == decl.attribute_name)
                .map(|a| a.value.as_str());
            match (&decl.default, value) {
                (AttributeDefault::Required, None) => {
                    self.error(
                        format!(
                            "required attribute '{}' is missing on element '{element}'",
                            decl.attribute_name
                        ),
                        location,
                    )?;
                }
                (AttributeDefault::Fixed(fixed), Some(value)) if value != fixed => {
                    self.error(
                        format!(
                            "attribute '{}' on element '{element}' must have fixed value \
                             '{fixed}', found '{value}'",
                            decl.attribute_name
                        ),
                        location,
                    )?;
                }
                _ => {}
            }
            if let Some(value) = value {
                self.check_attribute_value(node, element, decl, value)?;
            }
        }
        Ok(())
    }

    fn check_attribute_value(
        &mut self,
        node: NodeId,
        element: &str,
        decl: &AttributeDecl,
        value: &str,
    ) -> Result<(), ValidityError> {
        let dtd = self.dtd;
        let location = self.doc.location(node);
        let attribute = &decl.attribute_name;
        let invalid = |kind: &str, token: &str| {
            format!("attribute '{attribute}' on element '{element}' has invalid {kind} value '{token}'")
        };

        match &decl.attribute_type {
            AttributeType::CData => {}
            AttributeType::Id => {
                if !is_valid_name(value) {
                    self.error(invalid("ID", value), location)?;
                } else if self.ids.contains_key(value) {
                    self.error(
                        format!("ID '{value}' is already used by another element"),
                        location,
                    )?;
                } else {
                    self.ids.insert(value.to_string(), node);
                }
            }
            AttributeType::IdRef | AttributeType::IdRefs => {
                let list = decl.attribute_type == AttributeType::IdRefs;
                for token in tokens(value, list) {
                    if is_valid_name(token) {
                        self.idrefs.push((token.to_string(), location));
                    } else {
                        self.error(invalid(if list { "IDREFS" } else { "IDREF" }, token), location)?;
                    }
                }
            }
            AttributeType::NmToken | AttributeType::NmTokens => {
                let list = decl.attribute_type == AttributeType::NmTokens;
                for token in tokens(value, list) {
                    if !is_valid_nmtoken(token) {
                        self.error(
                            invalid(if list { "NMTOKENS" } else { "NMTOKEN" }, token),
                            location,
                        )?;
                    }
                }
            }
            AttributeType::Entity | AttributeType::Entities => {
                let list = decl.attribute_type == AttributeType::Entities;
                for token in tokens(value, list) {
                    let unparsed = dtd
                        .entities
                        .get(token)
                        .is_some_and(|entity| entity.kind.is_unparsed());
                    if !unparsed {
                        self.error(
                            format!(
                                "attribute '{attribute}' on element '{element}' refers to \
                                 '{token}', which is not an unparsed entity"
                            ),
                            location,
                        )?;
                    }
                }
            }
            AttributeType::Enumeration(allowed) | AttributeType::Notation(allowed) => {
                if !allowed.iter().any(|v| v == value) {
                    self.error(
                        format!(
                            "attribute '{attribute}' on element '{element}' has value \
                             '{value}', which is not one of ({})",
                            allowed.join("|")
                        ),
                        location,
                    )?;
                }
            }
        }
        Ok(())
    }
}

/// Splits a list-typed value; an empty list still yields one empty token
/// so that it is reported.
fn tokens(value: &str, list: bool) -> Vec<&str> {
    if !list {
        return vec![value];
    }
    let tokens: Vec<&str> = value.split(' ').filter(|t| !t.is_empty()).collect();
    if tokens.is_empty() {
        vec![value]
    } else {
        tokens
    }
}

fn element_name(doc: &Document, node: NodeId) -> Option<String> {
    match doc.node(node).kind {
        NodeKind::Element { .. } => doc.qualified_name(node),
        _ => None,
    }
}

fn collect_names<'s>(spec: &'s ContentSpec, out: &mut Vec<&'s String>) {
    match &spec.kind {
        ContentSpecKind::Name(name) => out.push(name),
        ContentSpecKind::Seq(items) | ContentSpecKind::Choice(items) => {
            for item in items {
                collect_names(item, out);
            }
        }
    }
}

fn is_xml_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::parser::{parse_document, ParseOptions};
    use crate::validation::{CollectingHandler, StrictHandler};

    fn collect(input: &str) -> CollectingHandler {
        let (mut doc, dtd) = parse_document(input, &ParseOptions::default()).unwrap();
        let mut handler = CollectingHandler::default();
        validate(&mut doc, &dtd.unwrap_or_default(), &mut handler).unwrap();
        handler
    }

    fn error_messages(input: &str) -> Vec<String> {
        collect(input).errors.into_iter().map(|e| e.message).collect()
    }

    const BOOKS: &str = r#"<!DOCTYPE bookstore [
<!ELEMENT bookstore (book+)>
<!ELEMENT book (title, author+, year?, price)>
<!ATTLIST book
  id ID #REQUIRED
  category (web|cooking|children) "web">
<!ELEMENT title (#PCDATA)>
<!ATTLIST title lang NMTOKEN #IMPLIED>
<!ELEMENT author (#PCDATA)>
<!ELEMENT year (#PCDATA)>
<!ELEMENT price (#PCDATA)>
]>
"#;

    #[test]
    fn test_valid_document_has_no_diagnostics() {
        let handler = collect(&format!(
            "{BOOKS}<bookstore>\n  <book id=\"b1\" category=\"cooking\">\n    <title lang=\"en\">Everyday Italian</title>\n    <author>Giada</author>\n    <price>30.00</price>\n  </book>\n</bookstore>"
        ));
        assert!(handler.is_valid(), "{:?}", handler.errors);
        assert!(handler.warnings.is_empty());
    }

    #[test]
    fn test_ids_are_registered() {
        let (mut doc, dtd) = parse_document(
            &format!("{BOOKS}<bookstore><book id=\"b1\"><title/><author/><price/></book></bookstore>"),
            &ParseOptions::default(),
        )
        .unwrap();
        validate(&mut doc, &dtd.unwrap(), &mut StrictHandler).unwrap();
        let book = doc.element_by_id("b1").unwrap();
        assert_eq!(doc.node_name(book), Some("book"));
    }

    #[test]
    fn test_content_model_violation_points_at_start_tag() {
        let handler = collect(&format!(
            "{BOOKS}<bookstore>\n<book id=\"b1\"><author/><title/><price/></book></bookstore>"
        ));
        assert_eq!(handler.errors.len(), 1);
        let err = &handler.errors[0];
        assert!(err.message.contains("content does not match"), "{}", err.message);
        assert!(err.message.contains("[author, title, price]"));
        let loc = err.location.unwrap();
        assert_eq!((loc.line, loc.column), (14, 1));
    }

    #[test]
    fn test_root_must_match_doctype() {
        let errors = error_messages("<!DOCTYPE a [<!ELEMENT a ANY><!ELEMENT b ANY>]><b/>");
        assert_eq!(errors, vec!["root element 'b' does not match DOCTYPE name 'a'".to_string()]);
    }

    #[test]
    fn test_undeclared_element_is_reported() {
        let errors = error_messages("<!DOCTYPE a [<!ELEMENT a ANY>]><a><x/></a>");
        assert_eq!(errors, vec!["element type 'x' is not declared".to_string()]);
    }

    #[test]
    fn test_empty_and_mixed_content() {
        let errors = error_messages(
            "<!DOCTYPE a [<!ELEMENT a (#PCDATA|b)*><!ELEMENT b EMPTY><!ELEMENT c EMPTY>]>\
             <a>text<b/><b>x</b><c/></a>",
        );
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("not allowed in mixed content"));
        assert!(errors[1].contains("declared EMPTY"));
    }

    #[test]
    fn test_text_in_element_only_content() {
        let errors = error_messages("<!DOCTYPE a [<!ELEMENT a (b)><!ELEMENT b EMPTY>]><a> hi <b/></a>");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("character data"));
        assert!(error_messages("<!DOCTYPE a [<!ELEMENT a (b)><!ELEMENT b EMPTY>]><a>\n  <b/>\n</a>").is_empty());
    }

    #[test]
    fn test_attribute_rules() {
        let errors = error_messages(
            r#"<!DOCTYPE a [
<!ELEMENT a ANY>
<!ATTLIST a
  req CDATA #REQUIRED
  fix CDATA #FIXED "v"
  kind (x|y) #IMPLIED
  tok NMTOKEN #IMPLIED>
]><a fix="w" kind="z" tok="a b" extra="1"/>"#,
        );
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors[0].contains("'extra' is not declared"));
        assert!(errors[1].contains("required attribute 'req'"));
        assert!(errors[2].contains("fixed value 'v'"));
        assert!(errors[3].contains("not one of (x|y)"));
        assert!(errors[4].contains("invalid NMTOKEN"));
    }

    #[test]
    fn test_duplicate_id_and_dangling_idref() {
        let errors = error_messages(
            r#"<!DOCTYPE a [
<!ELEMENT a (e*)>
<!ELEMENT e EMPTY>
<!ATTLIST e id ID #IMPLIED ref IDREF #IMPLIED refs IDREFS #IMPLIED>
]><a><e id="x"/><e id="x"/><e ref="x" refs="x missing"/></a>"#,
        );
        assert_eq!(
            errors,
            vec![
                "ID 'x' is already used by another element".to_string(),
                "IDREF 'missing' does not match any ID in the document".to_string(),
            ]
        );
    }

    #[test]
    fn test_entity_attribute_requires_unparsed_entity() {
        let errors = error_messages(
            r#"<!DOCTYPE a [
<!NOTATION gif SYSTEM "image/gif">
<!ENTITY logo SYSTEM "logo.gif" NDATA gif>
<!ENTITY text "plain">
<!ELEMENT a EMPTY>
<!ATTLIST a img ENTITY #IMPLIED imgs ENTITIES #IMPLIED>
]><a img="logo" imgs="logo text"/>"#,
        );
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("'text', which is not an unparsed entity"));
    }

    #[test]
    fn test_declaration_errors() {
        let errors = error_messages(
            r#"<!DOCTYPE a [
<!ELEMENT a EMPTY>
<!ELEMENT a ANY>
<!ATTLIST a i1 ID #IMPLIED i2 ID "x" n NOTATION (png) #IMPLIED>
<!ENTITY pic SYSTEM "p.jpg" NDATA jpeg>
]><a/>"#,
        );
        assert_eq!(errors.len(), 5, "{errors:?}");
        assert!(errors[0].contains("declared more than once"));
        assert!(errors[1].contains("more than one ID attribute"));
        assert!(errors[2].contains("must be #IMPLIED or #REQUIRED"));
        assert!(errors[3].contains("notation 'png'"));
        assert!(errors[4].contains("notation 'jpeg' of unparsed entity 'pic'"));
    }

    #[test]
    fn test_declaration_warnings() {
        let handler = collect(
            "<!DOCTYPE a [<!ELEMENT a (b?)><!ATTLIST ghost x CDATA #IMPLIED>]><a/>",
        );
        assert!(handler.is_valid());
        let warnings: Vec<_> = handler.warnings.iter().map(|w| w.message.as_str()).collect();
        assert_eq!(
            warnings,
            vec![
                "attribute list declared for undeclared element type 'ghost'",
                "content model of element type 'a' refers to undeclared element type 'b'",
            ]
        );
    }

    #[test]
    fn test_strict_handler_stops_at_first_warning() {
        let (mut doc, dtd) = parse_document(
            "<!DOCTYPE a [<!ELEMENT a EMPTY><!ATTLIST ghost x CDATA #IMPLIED>]><a><oops/></a>",
            &ParseOptions::default(),
        )
        .unwrap();
        let err = validate(&mut doc, &dtd.unwrap(), &mut StrictHandler).unwrap_err();
        assert!(err.message.contains("ghost"));
    }

    #[test]
    fn test_namespaced_names_compare_as_written() {
        let errors = error_messages(
            r#"<!DOCTYPE x:a [
<!ELEMENT x:a EMPTY>
<!ATTLIST x:a xmlns:x CDATA #FIXED "urn:x" x:flag (on|off) "on">
]><x:a xmlns:x="urn:x"/>"#,
        );
        assert!(errors.is_empty(), "{errors:?}");
    }

    #[test]
    fn test_undeclared_namespace_declarations_are_invalid() {
        let errors = error_messages(
            r#"<!DOCTYPE r [<!ELEMENT r EMPTY>]><r xmlns="urn:x" xmlns:q="urn:q"/>"#,
        );
        assert_eq!(
            errors,
            vec![
                "attribute 'xmlns' is not declared for element 'r'".to_string(),
                "attribute 'xmlns:q' is not declared for element 'r'".to_string(),
            ]
        );
    }

    #[test]
    fn test_document_without_declarations_reports_root() {
        let errors = error_messages("<!DOCTYPE r><r/>");
        assert_eq!(errors, vec!["element type 'r' is not declared".to_string()]);
    }
}
