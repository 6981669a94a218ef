//! Low-level input handling shared by the document and DTD parsers.
//!
//! [`ParserInput`] owns the text being parsed and tracks the position
//! (line, column, byte offset), element nesting depth and the name-length
//! limit. Entity replacement text is parsed by swapping in a second
//! `ParserInput` whose reported location is pinned to the reference site.
//!
//! # Security
//!
//! - **Depth limit**: prevents stack overflow from deeply nested elements.
//! - **Entity expansion budget**: [`ExpansionBudget`] counts every general
//!   and parameter entity expansion of one document and fails once the
//!   limit is reached, which stops "billion laughs" style amplification.
//! - **Name length limit**: prevents memory exhaustion from huge names.

use crate::error::{ParseError, SourceLocation};

// -------------------------------------------------------------------------
// Security defaults
// -------------------------------------------------------------------------

/// Default maximum element nesting depth.
pub(crate) const DEFAULT_MAX_DEPTH: u32 = 256;

/// Default maximum number of attributes on a single element.
pub(crate) const DEFAULT_MAX_ATTRIBUTES: u32 = 256;

/// Default maximum length (in bytes) of an element or attribute name.
pub(crate) const DEFAULT_MAX_NAME_LENGTH: usize = 50_000;

/// Default maximum number of entity expansions per document.
pub(crate) const DEFAULT_MAX_ENTITY_EXPANSIONS: u32 = 10_000;

// -------------------------------------------------------------------------
// XML character classes (XML 1.0 §2.2, §2.3)
// -------------------------------------------------------------------------

/// Returns `true` if `c` is a valid `Char` per XML 1.0 §2.2 `[2]`.
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(c as u32,
        0x09 | 0x0A | 0x0D | 0x20..=0xD7FF | 0xE000..=0xFFFD | 0x0001_0000..=0x0010_FFFF
    )
}

/// Returns `true` if `c` is a valid `NameStartChar` per XML 1.0 §2.3 `[4]`.
pub(crate) fn is_name_start_char(c: char) -> bool {
    matches!(c,
        ':' | 'A'..='Z' | '_' | 'a'..='z' |
        '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}' |
        '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' |
        '\u{200C}'..='\u{200D}' | '\u{2070}'..='\u{218F}' |
        '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}' |
        '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' |
        '\u{10000}'..='\u{EFFFF}'
    )
}

/// Returns `true` if `c` is a valid `NameChar` per XML 1.0 §2.3 `[4a]`.
pub(crate) fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || matches!(c,
            '-' | '.' | '0'..='9' | '\u{B7}' |
            '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}'
        )
}

/// Returns `true` if `s` matches the `Name` production.
pub(crate) fn is_valid_name(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if is_name_start_char(first) => chars.all(is_name_char),
        _ => false,
    }
}

/// Returns `true` if `s` matches the `Nmtoken` production.
pub(crate) fn is_valid_nmtoken(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_name_char)
}

/// Splits a qualified name into optional prefix and local part.
///
/// `"foo:bar"` → `(Some("foo"), "bar")`, `"bar"` → `(None, "bar")`
pub(crate) fn split_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, name),
    }
}

/// Returns an error message if `name` is not a legal `QName`
/// (Namespaces in XML 1.0 §4).
pub(crate) fn check_qname(name: &str) -> Option<&'static str> {
    match name.split_once(':') {
        None => None,
        Some((prefix, local)) if prefix.is_empty() || local.is_empty() => {
            Some("has an empty prefix or local part")
        }
        Some((_, local)) if local.contains(':') => Some("contains more than one colon"),
        Some(_) => None,
    }
}

/// Returns `true` if `c` is a valid `PubidChar` per XML 1.0 §2.3 `[13]`.
pub(crate) fn is_pubid_char(c: char) -> bool {
    matches!(c,
        ' ' | '\r' | '\n' |
        'a'..='z' | 'A'..='Z' | '0'..='9' |
        '-' | '\'' | '(' | ')' | '+' | ',' | '.' | '/' | ':' |
        '=' | '?' | ';' | '!' | '*' | '#' | '@' | '$' | '_' | '%'
    )
}

// -------------------------------------------------------------------------
// References
// -------------------------------------------------------------------------

/// Returns the character for one of the five predefined entities.
pub(crate) fn predefined_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "apos" => Some('\''),
        "quot" => Some('"'),
        _ => None,
    }
}

/// Decodes a character reference at the start of `s` (`&#65;`, `&#x41;`).
///
/// Returns the character and the number of bytes the reference spans, or
/// `None` when the reference is malformed or names a non-XML character.
pub(crate) fn parse_char_ref(s: &str) -> Option<(char, usize)> {
    let body = s.strip_prefix("&#")?;
    let (digits, radix, skip) = match body.strip_prefix('x') {
        Some(hex) => (hex, 16, 3),
        None => (body, 10, 2),
    };
    let end = digits.find(';')?;
    let number = &digits[..end];
    if number.is_empty() || !number.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    let ch = u32::from_str_radix(number, radix)
        .ok()
        .and_then(char::from_u32)?;
    is_xml_char(ch).then_some((ch, skip + end + 1))
}

/// Splits `Name;` off the start of `s` (the text after `&` or `%`).
///
/// Returns the name and the bytes consumed including the semicolon.
pub(crate) fn split_reference(s: &str) -> Option<(&str, usize)> {
    let end = s.find(';')?;
    let name = &s[..end];
    is_valid_name(name).then_some((name, end + 1))
}

/// Normalizes line endings per XML 1.0 §2.11: `\r\n` and lone `\r`
/// become `\n`.
pub(crate) fn normalize_line_endings(text: &str) -> String {
    if !text.contains('\r') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

// -------------------------------------------------------------------------
// Entity expansion budget
// -------------------------------------------------------------------------

/// Counts entity expansions across one document, DTD included.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExpansionBudget {
    used: u32,
    max: u32,
}

impl ExpansionBudget {
    pub fn new(max: u32) -> Self {
        Self { used: 0, max }
    }

    /// Records one expansion.
    pub fn spend(&mut self) -> Result<(), String> {
        self.used += 1;
        if self.used > self.max {
            return Err(format!("entity expansion limit exceeded ({})", self.max));
        }
        Ok(())
    }
}

impl Default for ExpansionBudget {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTITY_EXPANSIONS)
    }
}

// -------------------------------------------------------------------------
// ParserInput
// -------------------------------------------------------------------------

/// Cursor over one piece of XML text.
pub(crate) struct ParserInput {
    /// The text, with line endings already normalized.
    text: String,

    /// Current byte offset in `text`.
    pos: usize,

    /// Current line number (1-based).
    line: u32,

    /// Current column number (1-based).
    column: u32,

    /// Reported for every position when this input is entity replacement
    /// text; the reference site is the only location a user can act on.
    pinned: Option<SourceLocation>,

    /// Current element nesting depth.
    depth: u32,

    /// Maximum allowed nesting depth.
    max_depth: u32,

    /// Maximum allowed name length in bytes.
    max_name_length: usize,
}

impl ParserInput {
    /// Creates an input with default limits.
    pub fn new(text: &str) -> Self {
        Self {
            text: normalize_line_endings(text),
            pos: 0,
            line: 1,
            column: 1,
            pinned: None,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            max_name_length: DEFAULT_MAX_NAME_LENGTH,
        }
    }

    /// Creates an input for entity replacement text referenced from
    /// `outer` at `site`. Depth and limits carry over.
    pub fn for_entity(text: &str, site: SourceLocation, outer: &Self) -> Self {
        Self {
            pinned: Some(site),
            depth: outer.depth,
            max_depth: outer.max_depth,
            max_name_length: outer.max_name_length,
            ..Self::new(text)
        }
    }

    /// Sets the maximum nesting depth.
    pub fn set_max_depth(&mut self, max: u32) {
        self.max_depth = max;
    }

    /// Sets the maximum name length.
    pub fn set_max_name_length(&mut self, max: usize) {
        self.max_name_length = max;
    }

    // -- Depth tracking --

    /// Increments the nesting depth. Returns an error if the limit is exceeded.
    pub fn increment_depth(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.fatal(format!(
                "maximum nesting depth exceeded ({})",
                self.max_depth
            )));
        }
        Ok(())
    }

    /// Decrements the nesting depth (saturating at 0).
    pub fn decrement_depth(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // -- Position queries --

    /// Returns the current source location.
    pub fn location(&self) -> SourceLocation {
        self.pinned.unwrap_or(SourceLocation {
            line: self.line,
            column: self.column,
            byte_offset: self.pos,
        })
    }

    /// Returns `true` if all input has been consumed.
    pub fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    /// Returns the current byte offset.
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// Returns the text between two byte offsets.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        &self.text[start..end]
    }

    /// Returns the unconsumed text.
    pub fn rest(&self) -> &str {
        self.text.get(self.pos..).unwrap_or_default()
    }

    // -- Peek operations --

    /// Returns the byte at the current position without consuming it.
    pub fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    /// Returns the byte at `current_position + offset` without consuming.
    pub fn peek_at(&self, offset: usize) -> Option<u8> {
        self.text.as_bytes().get(self.pos + offset).copied()
    }

    /// Returns the character at the current position without consuming it.
    pub fn peek_char(&self) -> Option<char> {
        self.text.get(self.pos..).and_then(|s| s.chars().next())
    }

    // -- Advance operations --

    /// Advances the position by `count` bytes, updating line/column.
    ///
    /// Callers only skip ASCII bytes they have already inspected.
    pub fn advance(&mut self, count: usize) {
        for _ in 0..count {
            match self.peek() {
                Some(b'\n') => {
                    self.line += 1;
                    self.column = 1;
                }
                Some(_) => self.column += 1,
                None => return,
            }
            self.pos += 1;
        }
    }

    /// Advances by one character, updating line/column.
    pub fn advance_char(&mut self, ch: char) {
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.pos += ch.len_utf8();
    }

    /// Consumes and returns the next byte, or returns an error at EOF.
    pub fn next_byte(&mut self) -> Result<u8, ParseError> {
        let b = self
            .peek()
            .ok_or_else(|| self.fatal("unexpected end of input"))?;
        self.advance(1);
        Ok(b)
    }

    /// Consumes and returns the next character, rejecting characters
    /// outside the XML 1.0 `Char` production.
    pub fn next_char(&mut self) -> Result<char, ParseError> {
        let ch = self
            .peek_char()
            .ok_or_else(|| self.fatal("unexpected end of input"))?;
        if !is_xml_char(ch) {
            return Err(self.fatal(format!("invalid XML character U+{:04X}", ch as u32)));
        }
        self.advance_char(ch);
        Ok(ch)
    }

    // -- Expect operations --

    /// Consumes the next byte and asserts it matches `expected`.
    pub fn expect_byte(&mut self, expected: u8) -> Result<(), ParseError> {
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

    /// Consumes bytes and asserts they match the `expected` sequence.
    pub fn expect_str(&mut self, expected: &[u8]) -> Result<(), ParseError> {
        for &b in expected {
            self.expect_byte(b)?;
        }
        Ok(())
    }

    /// Returns `true` if the remaining input starts with `s`.
    pub fn looking_at(&self, s: &[u8]) -> bool {
        self.text.as_bytes()[self.pos..].starts_with(s)
    }

    // -- Whitespace --

    /// Skips whitespace characters. Returns `true` if any were consumed.
    pub fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while let Some(b' ' | b'\t' | b'\r' | b'\n') = self.peek() {
            self.advance(1);
        }
        self.pos > start
    }

    /// Skips whitespace, returning an error if none is found.
    pub fn skip_whitespace_required(&mut self) -> Result<(), ParseError> {
        if !self.skip_whitespace() {
            return Err(self.fatal("whitespace required"));
        }
        Ok(())
    }

    // -- Names and literals --

    /// Parses an XML `Name` per XML 1.0 §2.3 production `[5]`.
    pub fn parse_name(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        let first = self
            .peek_char()
            .ok_or_else(|| self.fatal("expected name, found end of input"))?;
        if !is_name_start_char(first) {
            return Err(self.fatal(format!("invalid name start character '{first}'")));
        }
        self.advance_char(first);
        while let Some(ch) = self.peek_char().filter(|&c| is_name_char(c)) {
            self.advance_char(ch);
        }

        let len = self.pos - start;
        if len > self.max_name_length {
            return Err(self.fatal(format!(
                "name length ({len}) exceeds maximum ({})",
                self.max_name_length
            )));
        }
        Ok(self.text[start..self.pos].to_string())
    }

    /// Parses a quoted literal without interpreting references.
    pub fn parse_quoted_value(&mut self) -> Result<String, ParseError> {
        let quote = self.next_byte()?;
        if quote != b'"' && quote != b'\'' {
            return Err(self.fatal("expected quoted value"));
        }
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.fatal("unexpected end of input in quoted value")),
                Some(b) if b == quote => {
                    self.advance(1);
                    return Ok(value);
                }
                Some(_) => value.push(self.next_char()?),
            }
        }
    }

    // -- Error helpers --

    /// Creates a fatal `ParseError` at the current location.
    pub fn fatal(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(message, self.location())
    }
}

// -------------------------------------------------------------------------
// Namespace resolver
// -------------------------------------------------------------------------

/// The well-known XML namespace URI, pre-bound to the `xml` prefix.
pub(crate) const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// The namespace URI reserved for `xmlns` declarations.
pub(crate) const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";

/// Stack of namespace bindings mirroring element nesting.
///
/// Each frame holds the `xmlns` declarations of one element; a `None`
/// prefix is the default namespace.
pub(crate) struct NamespaceResolver {
    stack: Vec<Vec<(Option<String>, String)>>,
}

impl NamespaceResolver {
    /// Creates a new resolver with the `xml` prefix pre-bound.
    pub fn new() -> Self {
        let initial = vec![(Some("xml".to_string()), XML_NAMESPACE.to_string())];
        Self {
            stack: vec![initial],
        }
    }

    /// Pushes a new (empty) namespace scope for an element.
    pub fn push_scope(&mut self) {
        self.stack.push(Vec::new());
    }

    /// Pops the current namespace scope.
    pub fn pop_scope(&mut self) {
        self.stack.pop();
    }

    /// Binds a namespace prefix to a URI in the current scope.
    pub fn bind(&mut self, prefix: Option<String>, uri: String) {
        if let Some(frame) = self.stack.last_mut() {
            frame.push((prefix, uri));
        }
    }

    /// Resolves a namespace prefix to its URI, innermost binding first.
    pub fn resolve(&self, prefix: Option<&str>) -> Option<&str> {
        self.stack
            .iter()
            .rev()
            .flat_map(|frame| frame.iter().rev())
            .find(|(p, _)| p.as_deref() == prefix)
            .and_then(|(_, uri)| (!uri.is_empty()).then_some(uri.as_str()))
    }
}

// -------------------------------------------------------------------------
// Common XML parsing helpers
// -------------------------------------------------------------------------

/// Parses a comment (`<!-- ... -->`), returning its text.
///
/// See XML 1.0 §2.5 production `[15]`.
pub(crate) fn parse_comment_content(input: &mut ParserInput) -> Result<String, ParseError> {
    input.expect_str(b"<!--")?;
    let mut content = String::new();
    loop {
        if input.at_end() {
            return Err(input.fatal("unexpected end of input in comment"));
        }
        if input.looking_at(b"-->") {
            input.advance(3);
            return Ok(content);
        }
        if input.looking_at(b"--") {
            return Err(input.fatal("'--' not allowed inside comments"));
        }
        content.push(input.next_char()?);
    }
}

/// Parses a CDATA section (`<![CDATA[ ... ]]>`), returning its text.
///
/// See XML 1.0 §2.7 production `[18]`.
pub(crate) fn parse_cdata_content(input: &mut ParserInput) -> Result<String, ParseError> {
    input.expect_str(b"<![CDATA[")?;
    let mut content = String::new();
    loop {
        if input.at_end() {
            return Err(input.fatal("unexpected end of input in CDATA section"));
        }
        if input.looking_at(b"]]>") {
            input.advance(3);
            return Ok(content);
        }
        content.push(input.next_char()?);
    }
}

/// Parses a processing instruction (`<?target data?>`).
///
/// See XML 1.0 §2.6 production `[16]`.
pub(crate) fn parse_pi_content(
    input: &mut ParserInput,
) -> Result<(String, Option<String>), ParseError> {
    input.expect_str(b"<?")?;
    let target = input.parse_name()?;
    if target.eq_ignore_ascii_case("xml") {
        return Err(input.fatal("PI target 'xml' is reserved"));
    }

    if !input.skip_whitespace() {
        input.expect_str(b"?>")?;
        return Ok((target, None));
    }
    let mut data = String::new();
    loop {
        if input.at_end() {
            return Err(input.fatal("unexpected end of input in processing instruction"));
        }
        if input.looking_at(b"?>") {
            input.advance(2);
            break;
        }
        data.push(input.next_char()?);
    }
    Ok((target, (!data.is_empty()).then_some(data)))
}

/// Parsed XML declaration data.
#[derive(Debug, Clone)]
pub(crate) struct XmlDeclaration {
    pub version: String,
    pub encoding: Option<String>,
    pub standalone: Option<bool>,
}

/// Parses an XML declaration (`<?xml version="1.0" ...?>`).
///
/// See XML 1.0 §2.8 production `[23]`.
pub(crate) fn parse_xml_decl(input: &mut ParserInput) -> Result<XmlDeclaration, ParseError> {
    input.expect_str(b"<?xml")?;
    input.skip_whitespace_required()?;

    input.expect_str(b"version")?;
    let version = parse_pseudo_attribute_value(input)?;
    if !is_valid_version_num(&version) {
        return Err(input.fatal(format!("invalid version number '{version}'")));
    }

    let mut had_ws = input.skip_whitespace();
    let encoding = if input.looking_at(b"encoding") {
        if !had_ws {
            return Err(input.fatal("whitespace required before encoding"));
        }
        input.expect_str(b"encoding")?;
        let enc = parse_pseudo_attribute_value(input)?;
        if !is_valid_encoding_name(&enc) {
            return Err(input.fatal(format!("invalid encoding name '{enc}'")));
        }
        had_ws = input.skip_whitespace();
        Some(enc)
    } else {
        None
    };

    let standalone = if input.looking_at(b"standalone") {
        if !had_ws {
            return Err(input.fatal("whitespace required before standalone"));
        }
        input.expect_str(b"standalone")?;
        let value = match parse_pseudo_attribute_value(input)?.as_str() {
            "yes" => true,
            "no" => false,
            _ => return Err(input.fatal("standalone must be 'yes' or 'no'")),
        };
        input.skip_whitespace();
        Some(value)
    } else {
        None
    };

    input.expect_str(b"?>")?;
    Ok(XmlDeclaration {
        version,
        encoding,
        standalone,
    })
}

fn parse_pseudo_attribute_value(input: &mut ParserInput) -> Result<String, ParseError> {
    input.skip_whitespace();
    input.expect_byte(b'=')?;
    input.skip_whitespace();
    input.parse_quoted_value()
}

/// `VersionNum ::= '1.' [0-9]+`
fn is_valid_version_num(s: &str) -> bool {
    s.strip_prefix("1.")
        .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// `EncName ::= [A-Za-z] ([A-Za-z0-9._] | '-')*`
fn is_valid_encoding_name(s: &str) -> bool {
    let mut bytes = s.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_line_column_tracking() {
        let mut input = ParserInput::new("ab\ncd");
        input.advance(2);
        assert_eq!(input.location().column, 3);
        input.advance(1);
        assert_eq!(input.location().line, 2);
        assert_eq!(input.location().column, 1);
    }

    #[test]
    fn test_line_endings_are_normalized() {
        assert_eq!(normalize_line_endings("a\r\nb\rc\n"), "a\nb\nc\n");
        let mut input = ParserInput::new("a\r\nb");
        assert_eq!(input.next_char().unwrap(), 'a');
        assert_eq!(input.next_char().unwrap(), '\n');
        assert_eq!(input.next_char().unwrap(), 'b');
    }

    #[test]
    fn test_entity_input_reports_reference_site() {
        let outer = ParserInput::new("<r>&e;</r>");
        let site = SourceLocation {
            line: 1,
            column: 4,
            byte_offset: 3,
        };
        let mut inner = ParserInput::for_entity("<a/>\n<b/>", site, &outer);
        inner.advance(6);
        assert_eq!(inner.location(), site);
    }

    #[test]
    fn test_parse_name_length_limit() {
        let long_name = "a".repeat(100);
        let mut input = ParserInput::new(&long_name);
        input.set_max_name_length(50);
        let err = input.parse_name().unwrap_err();
        assert!(err.message.contains("name length"));
    }

    #[test]
    fn test_next_char_rejects_control_characters() {
        let mut input = ParserInput::new("\u{1}");
        assert!(input.next_char().is_err());
    }

    #[test]
    fn test_depth_limit() {
        let mut input = ParserInput::new("");
        input.set_max_depth(2);
        assert!(input.increment_depth().is_ok());
        assert!(input.increment_depth().is_ok());
        assert!(input.increment_depth().is_err());
    }

    #[test]
    fn test_parse_char_ref() {
        assert_eq!(parse_char_ref("&#65;rest"), Some(('A', 5)));
        assert_eq!(parse_char_ref("&#x41;"), Some(('A', 6)));
        assert_eq!(parse_char_ref("&#x;"), None);
        assert_eq!(parse_char_ref("&#0;"), None);
        assert_eq!(parse_char_ref("&#12"), None);
    }

    #[test]
    fn test_split_reference() {
        assert_eq!(split_reference("amp;x"), Some(("amp", 4)));
        assert_eq!(split_reference("1a;"), None);
        assert_eq!(split_reference("a b;"), None);
    }

    #[test]
    fn test_expansion_budget() {
        let mut budget = ExpansionBudget::new(2);
        assert!(budget.spend().is_ok());
        assert!(budget.spend().is_ok());
        assert!(budget.spend().unwrap_err().contains("entity expansion limit"));
    }

    #[test]
    fn test_check_qname() {
        assert_eq!(check_qname("a:b"), None);
        assert_eq!(check_qname("ab"), None);
        assert!(check_qname(":b").is_some());
        assert!(check_qname("a:b:c").is_some());
    }

    #[test]
    fn test_namespace_resolver_scopes() {
        let mut ns = NamespaceResolver::new();
        assert_eq!(ns.resolve(Some("xml")), Some(XML_NAMESPACE));
        ns.push_scope();
        ns.bind(None, "urn:default".to_string());
        ns.push_scope();
        ns.bind(None, String::new());
        assert_eq!(ns.resolve(None), None);
        ns.pop_scope();
        assert_eq!(ns.resolve(None), Some("urn:default"));
    }

    #[test]
    fn test_parse_comment_rejects_double_hyphen() {
        let mut input = ParserInput::new("<!-- a -- b -->");
        assert!(parse_comment_content(&mut input).is_err());
    }

    #[test]
    fn test_parse_pi_content() {
        let mut input = ParserInput::new("<?target data?>");
        let (target, data) = parse_pi_content(&mut input).unwrap();
        assert_eq!(target, "target");
        assert_eq!(data.as_deref(), Some("data"));
    }

    #[test]
    fn test_parse_xml_decl() {
        let mut input =
            ParserInput::new("<?xml version=\"1.0\" encoding='UTF-8' standalone=\"no\" ?>");
        let decl = parse_xml_decl(&mut input).unwrap();
        assert_eq!(decl.version, "1.0");
        assert_eq!(decl.encoding.as_deref(), Some("UTF-8"));
        assert_eq!(decl.standalone, Some(false));
    }

    #[test]
    fn test_parse_xml_decl_bad_version() {
        let mut input = ParserInput::new("<?xml version=\"2.0\"?>");
        assert!(parse_xml_decl(&mut input).is_err());
    }
}
