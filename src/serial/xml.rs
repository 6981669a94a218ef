//! XML serializer.
//!
//! Serializes a `Document` tree into well-formed UTF-8 XML text, optionally
//! pointing its DOCTYPE at a different external subset.

use std::fmt::Write;

use crate::tree::{Document, NodeId, NodeKind};

/// Options controlling XML serialization output.
///
/// # Examples
///
/// ```
/// use xmlvalidator::Document;
/// use xmlvalidator::serial::{serialize_with_options, SerializeOptions};
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let xml = serialize_with_options(&doc, &SerializeOptions::default().doctype_system("r.dtd"));
/// assert!(xml.contains("<!DOCTYPE root SYSTEM \"r.dtd\">"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SerializeOptions {
    /// When set, the DOCTYPE is written as `<!DOCTYPE root SYSTEM "id">`
    /// with this system identifier, replacing any public identifier and
    /// internal subset. A DOCTYPE is added if the document has none.
    pub doctype_system: Option<String>,
}

impl SerializeOptions {
    /// Forces the DOCTYPE's system identifier.
    #[must_use]
    pub fn doctype_system(mut self, system_id: &str) -> Self {
        self.doctype_system = Some(system_id.to_owned());
        self
    }
}

/// Serializes a document to an XML string.
///
/// # Examples
///
/// ```
/// use xmlvalidator::Document;
/// use xmlvalidator::serial::serialize;
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let xml = serialize(&doc);
/// assert!(xml.contains("<root><child>Hello</child></root>"));
/// ```
#[must_use]
pub fn serialize(doc: &Document) -> String {
    serialize_with_options(doc, &SerializeOptions::default())
}

/// Serializes a document to an XML string with the given options.
///
/// The output always starts with an XML declaration naming `UTF-8`, since
/// that is the encoding of the returned string. Each top-level node is
/// followed by a newline.
#[must_use]
pub fn serialize_with_options(doc: &Document, options: &SerializeOptions) -> String {
    let mut out = String::new();

    let version = doc.version.as_deref().unwrap_or("1.0");
    let _ = write!(out, "<?xml version=\"{version}\" encoding=\"UTF-8\"");
    if let Some(standalone) = doc.standalone {
        out.push_str(if standalone {
            " standalone=\"yes\""
        } else {
            " standalone=\"no\""
        });
    }
    out.push_str("?>\n");

    let mut doctype_written = false;
    for child in doc.children(doc.root()) {
        match &doc.node(child).kind {
            NodeKind::DocumentType { name, .. } if options.doctype_system.is_some() => {
                write_doctype(&mut out, name, None, options.doctype_system.as_deref(), None);
                doctype_written = true;
            }
            NodeKind::Element { .. } if !doctype_written => {
                if let Some(system_id) = options.doctype_system.as_deref() {
                    let root_name = doc.qualified_name(child).unwrap_or_default();
                    write_doctype(&mut out, &root_name, None, Some(system_id), None);
                    out.push('\n');
                }
                doctype_written = true;
                serialize_node(doc, child, &mut out);
            }
            NodeKind::DocumentType { .. } => {
                doctype_written = true;
                serialize_node(doc, child, &mut out);
            }
            _ => serialize_node(doc, child, &mut out),
        }
        out.push('\n');
    }

    out
}

fn serialize_node(doc: &Document, id: NodeId, out: &mut String) {
    match &doc.node(id).kind {
        NodeKind::Element {
            name,
            prefix,
            attributes,
            ..
        } => {
            out.push('<');
            write_qname(out, prefix.as_deref(), name);
            for attr in attributes {
                out.push(' ');
                write_qname(out, attr.prefix.as_deref(), &attr.name);
                out.push_str("=\"");
                write_escaped_attr(out, &attr.value);
                out.push('"');
            }

            if doc.first_child(id).is_none() {
                out.push_str("/>");
                return;
            }
            out.push('>');
            for child in doc.children(id) {
                serialize_node(doc, child, out);
            }
            out.push_str("</");
            write_qname(out, prefix.as_deref(), name);
            out.push('>');
        }
        NodeKind::Text { content } => write_escaped_text(out, content),
        NodeKind::CData { content } => {
            out.push_str("<![CDATA[");
            out.push_str(content);
            out.push_str("]]>");
        }
        NodeKind::Comment { content } => {
            out.push_str("<!--");
            out.push_str(content);
            out.push_str("-->");
        }
        NodeKind::ProcessingInstruction { target, data } => {
            out.push_str("<?");
            out.push_str(target);
            if let Some(d) = data {
                out.push(' ');
                out.push_str(d);
            }
            out.push_str("?>");
        }
        NodeKind::EntityRef { name } => {
            out.push('&');
            out.push_str(name);
            out.push(';');
        }
        NodeKind::DocumentType {
            name,
            system_id,
            public_id,
            internal_subset,
        } => write_doctype(
            out,
            name,
            public_id.as_deref(),
            system_id.as_deref(),
            internal_subset.as_deref(),
        ),
        NodeKind::Document => {}
    }
}

fn write_qname(out: &mut String, prefix: Option<&str>, local: &str) {
    if let Some(prefix) = prefix {
        out.push_str(prefix);
        out.push(':');
    }
    out.push_str(local);
}

fn write_doctype(
    out: &mut String,
    name: &str,
    public_id: Option<&str>,
    system_id: Option<&str>,
    internal_subset: Option<&str>,
) {
    out.push_str("<!DOCTYPE ");
    out.push_str(name);
    match (public_id, system_id) {
        (Some(public_id), Some(system_id)) => {
            let _ = write!(out, " PUBLIC \"{public_id}\" ");
            write_system_literal(out, system_id);
        }
        (None, Some(system_id)) => {
            out.push_str(" SYSTEM ");
            write_system_literal(out, system_id);
        }
        _ => {}
    }
    if let Some(subset) = internal_subset {
        out.push_str(" [");
        out.push_str(subset);
        out.push(']');
    }
    out.push('>');
}

/// A system literal cannot contain both quote characters, so pick the one
/// it does not use.
fn write_system_literal(out: &mut String, literal: &str) {
    let quote = if literal.contains('"') { '\'' } else { '"' };
    out.push(quote);
    out.push_str(literal);
    out.push(quote);
}

/// Escapes character data: `&`, `<`, `>`, and `\r` (which a parser would
/// otherwise normalize away).
fn write_escaped_text(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}

/// Escapes an attribute value. Whitespace characters other than space are
/// written as character references so attribute-value normalization on
/// re-parse leaves them intact.
fn write_escaped_attr(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\t' => out.push_str("&#9;"),
            '\n' => out.push_str("&#10;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(ch),
        }
    }
}
