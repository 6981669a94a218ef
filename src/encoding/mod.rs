//! Encoding detection and transcoding.
//!
//! XML files may arrive in any encoding `encoding_rs` understands. Detection
//! follows XML 1.0 §4.3.3 and Appendix F:
//!
//! 1. A byte order mark decides the encoding outright.
//! 2. Without one, the first four bytes distinguish UTF-16 `<?` from an
//!    ASCII-compatible encoding.
//! 3. For ASCII-compatible input the XML (or text) declaration's
//!    `encoding=` pseudo-attribute selects the final decoder.
//!
//! The result is always a UTF-8 `String` with the BOM removed.

use std::fmt;

use encoding_rs::{Encoding, UTF_16BE, UTF_16LE, UTF_8};

/// An error that occurs during encoding detection or transcoding.
#[derive(Debug, Clone)]
pub struct EncodingError {
    /// A human-readable description of the problem.
    pub message: String,
}

impl EncodingError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for EncodingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "encoding error: {}", self.message)
    }
}

impl std::error::Error for EncodingError {}

/// Guesses the encoding of raw XML bytes before any declaration is read.
///
/// Returns the encoding and the number of BOM bytes to skip.
///
/// # Examples
///
/// ```
/// use xmlvalidator::encoding::detect_encoding;
///
/// let (enc, skip) = detect_encoding(b"\xEF\xBB\xBF<a/>");
/// assert_eq!(enc.name(), "UTF-8");
/// assert_eq!(skip, 3);
/// ```
#[must_use]
pub fn detect_encoding(bytes: &[u8]) -> (&'static Encoding, usize) {
    if let Some(found) = Encoding::for_bom(bytes) {
        return found;
    }
    match bytes {
        [0x00, b'<', 0x00, b'?', ..] => (UTF_16BE, 0),
        [b'<', 0x00, b'?', 0x00, ..] => (UTF_16LE, 0),
        _ => (UTF_8, 0),
    }
}

/// Decodes raw XML (or external DTD) bytes into UTF-8 text.
///
/// # Errors
///
/// Returns `EncodingError` if the declared encoding is unknown or the bytes
/// are malformed for the chosen encoding.
///
/// # Examples
///
/// ```
/// use xmlvalidator::encoding::decode_to_utf8;
///
/// let text = decode_to_utf8(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?><a>caf\xE9</a>").unwrap();
/// assert!(text.ends_with("<a>caf\u{e9}</a>"));
/// ```
pub fn decode_to_utf8(bytes: &[u8]) -> Result<String, EncodingError> {
    let (sniffed, skip) = detect_encoding(bytes);
    let body = &bytes[skip..];

    let encoding = if sniffed == UTF_8 {
        match declared_encoding(body) {
            Some(label) => {
                let declared = Encoding::for_label(label.as_bytes())
                    .ok_or_else(|| EncodingError::new(format!("unsupported encoding '{label}'")))?;
                if declared == UTF_16BE || declared == UTF_16LE {
                    if skip == 0 {
                        return Err(EncodingError::new(format!(
                            "document declares '{label}' but is not UTF-16 encoded"
                        )));
                    }
                    sniffed
                } else {
                    declared
                }
            }
            None => UTF_8,
        }
    } else {
        sniffed
    };

    let (text, had_errors) = encoding.decode_without_bom_handling(body);
    if had_errors {
        return Err(EncodingError::new(format!(
            "malformed byte sequence for encoding {}",
            encoding.name()
        )));
    }
    Ok(text.into_owned())
}

/// Reads the `encoding` pseudo-attribute from a leading `<?xml ...?>`
/// declaration, treating the bytes as ASCII.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(256)];
    if !head.starts_with(b"<?xml") {
        return None;
    }
    let end = head.windows(2).position(|w| w == b"?>")?;
    let decl = &head[..end];
    let at = decl.windows(8).position(|w| w == b"encoding")?;
    let rest = trim_ascii_start(&decl[at + 8..]);
    let rest = trim_ascii_start(rest.strip_prefix(b"=")?);
    let (&quote, rest) = rest.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let close = rest.iter().position(|&b| b == quote)?;
    let label = &rest[..close];
    label
        .is_ascii()
        .then(|| String::from_utf8_lossy(label).into_owned())
}

fn trim_ascii_start(bytes: &[u8]) -> &[u8] {
    let skip = bytes
        .iter()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count();
    &bytes[skip..]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_detect_utf8_bom() {
        let (encoding, skip) = detect_encoding(b"\xEF\xBB\xBF<?xml version=\"1.0\"?><root/>");
        assert_eq!(encoding, UTF_8);
        assert_eq!(skip, 3);
    }

    #[test]
    fn test_detect_utf16le_bom() {
        let (encoding, skip) = detect_encoding(b"\xFF\xFE<\x00r\x00");
        assert_eq!(encoding, UTF_16LE);
        assert_eq!(skip, 2);
    }

    #[test]
    fn test_detect_utf16be_without_bom() {
        let (encoding, skip) = detect_encoding(b"\x00<\x00?\x00x");
        assert_eq!(encoding, UTF_16BE);
        assert_eq!(skip, 0);
    }

    #[test]
    fn test_detect_defaults_to_utf8() {
        assert_eq!(detect_encoding(b"<root/>"), (UTF_8, 0));
        assert_eq!(detect_encoding(b""), (UTF_8, 0));
    }

    #[test]
    fn test_decode_strips_bom() {
        let result = decode_to_utf8(b"\xEF\xBB\xBF<root/>").unwrap();
        assert_eq!(result, "<root/>");
    }

    #[test]
    fn test_decode_latin1_declaration() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"<?xml version=\"1.0\" encoding=\"ISO-8859-1\"?>");
        bytes.extend_from_slice(b"<root>caf\xE9</root>");
        let result = decode_to_utf8(&bytes).unwrap();
        assert!(result.contains("caf\u{00E9}"));
    }

    #[test]
    fn test_decode_utf16le_with_bom() {
        let mut bytes = vec![0xFF, 0xFE];
        for unit in "<a>\u{e9}</a>".encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        assert_eq!(decode_to_utf8(&bytes).unwrap(), "<a>\u{e9}</a>");
    }

    #[test]
    fn test_decode_unknown_encoding() {
        let err = decode_to_utf8(b"<?xml version=\"1.0\" encoding=\"X-NOPE\"?><a/>").unwrap_err();
        assert!(err.message.contains("unsupported encoding"));
    }

    #[test]
    fn test_decode_utf16_declared_on_ascii_bytes() {
        let err = decode_to_utf8(b"<?xml version=\"1.0\" encoding=\"UTF-16\"?><a/>").unwrap_err();
        assert!(err.message.contains("not UTF-16"));
    }

    #[test]
    fn test_decode_invalid_utf8() {
        assert!(decode_to_utf8(&[0x3C, 0x61, 0x3E, 0x80, 0x81]).is_err());
    }

    #[test]
    fn test_declared_encoding_single_quotes() {
        assert_eq!(
            declared_encoding(b"<?xml version='1.0' encoding = 'UTF-8'?><r/>"),
            Some("UTF-8".to_string())
        );
        assert_eq!(declared_encoding(b"<?xml version='1.0'?><r/>"), None);
        assert_eq!(declared_encoding(b"<r/>"), None);
    }
}
