//! Error types and diagnostics.
//!
//! Two layers live here. The parser-level types ([`ErrorSeverity`],
//! [`SourceLocation`], [`ParseDiagnostic`], [`ParseError`]) follow the
//! libxml2 reporting model: every problem carries a severity, a message and
//! the line/column where it was detected. The crate-level [`Error`] wraps
//! everything a caller of [`crate::validate`] or [`crate::evaluate`] can see,
//! one variant per origin.

use std::fmt;
use std::path::PathBuf;

use crate::validation::ValidityError;
use crate::xpath::XPathError;

/// Severity level for a diagnostic, matching libxml2's `xmlErrorLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    /// A problem that a lenient consumer may choose to ignore.
    Warning,
    /// A recoverable error; the input violates a constraint.
    Error,
    /// An unrecoverable error; processing stops.
    Fatal,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
            Self::Fatal => write!(f, "fatal error"),
        }
    }
}

/// Source location within an XML document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column number (in characters, not bytes).
    pub column: u32,
    /// 0-based byte offset from the start of the input.
    pub byte_offset: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A single non-fatal diagnostic recorded while parsing.
///
/// A non-validating parse keeps going past problems that only matter to a
/// validator (an entity declared in an unread external subset, say) and
/// records them here.
#[derive(Debug, Clone)]
pub struct ParseDiagnostic {
    /// The severity of this diagnostic.
    pub severity: ErrorSeverity,
    /// Human-readable message.
    pub message: String,
    /// Where in the source this was detected.
    pub location: SourceLocation,
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} at {}", self.severity, self.message, self.location)
    }
}

/// The error type returned when XML or DTD text is not well-formed.
#[derive(Debug, Clone)]
pub struct ParseError {
    /// The primary error message.
    pub message: String,
    /// Where in the source the fatal error occurred.
    pub location: SourceLocation,
    /// Diagnostics collected before the fatal error.
    pub diagnostics: Vec<ParseDiagnostic>,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
            diagnostics: Vec::new(),
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "parse error at {}: {}", self.location, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Every failure the validator and query evaluator can report.
///
/// The variants separate failures by origin; the `Display` text is what the
/// command-line tool prints after `Error: `.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A file could not be opened or read.
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        /// The path that was being read.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The document (or a DTD it pulls in) is not well-formed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The document is well-formed but violates its DTD.
    #[error(transparent)]
    Invalid(#[from] ValidityError),

    /// The source document could not be re-serialized against a new DTD.
    #[error("cannot rewrite DOCTYPE of '{}': {source}", path.display())]
    Rewrite {
        /// The document being rewritten.
        path: PathBuf,
        /// Why the non-validating parse or serialization failed.
        #[source]
        source: Box<Error>,
    },

    /// An `XPath` expression failed to compile or evaluate.
    #[error(transparent)]
    Query(#[from] XPathError),
}

impl Error {
    /// Returns the 1-based position of the failure, when it is known.
    #[must_use]
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            Self::Parse(e) => Some(e.location),
            Self::Invalid(e) => e.location,
            Self::Rewrite { source, .. } => source.location(),
            Self::Io { .. } | Self::Query(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_source_location_display() {
        let loc = SourceLocation {
            line: 10,
            column: 5,
            byte_offset: 42,
        };
        assert_eq!(loc.to_string(), "10:5");
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(
            "unexpected end of input",
            SourceLocation {
                line: 1,
                column: 15,
                byte_offset: 14,
            },
        );
        assert_eq!(
            err.to_string(),
            "parse error at 1:15: unexpected end of input"
        );
    }

    #[test]
    fn test_parse_diagnostic_display() {
        let diag = ParseDiagnostic {
            severity: ErrorSeverity::Warning,
            message: "entity 'nbsp' was not declared".to_string(),
            location: SourceLocation {
                line: 3,
                column: 10,
                byte_offset: 50,
            },
        };
        assert_eq!(
            diag.to_string(),
            "warning: entity 'nbsp' was not declared at 3:10"
        );
    }

    #[test]
    fn test_error_severity_display() {
        assert_eq!(ErrorSeverity::Warning.to_string(), "warning");
        assert_eq!(ErrorSeverity::Error.to_string(), "error");
        assert_eq!(ErrorSeverity::Fatal.to_string(), "fatal error");
    }

    #[test]
    fn test_io_error_display_names_path() {
        let err = Error::Io {
            path: PathBuf::from("missing.xml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.to_string(), "cannot read 'missing.xml': not found");
        assert!(err.location().is_none());
    }

    #[test]
    fn test_parse_error_passes_location_through() {
        let loc = SourceLocation {
            line: 4,
            column: 2,
            byte_offset: 30,
        };
        let err = Error::from(ParseError::new("mismatched tag", loc));
        assert_eq!(err.location(), Some(loc));
        assert_eq!(err.to_string(), "parse error at 4:2: mismatched tag");
    }

    #[test]
    fn test_rewrite_error_keeps_inner_location() {
        let loc = SourceLocation {
            line: 2,
            column: 7,
            byte_offset: 12,
        };
        let err = Error::Rewrite {
            path: PathBuf::from("doc.xml"),
            source: Box::new(Error::from(ParseError::new("bad", loc))),
        };
        assert_eq!(err.location(), Some(loc));
        assert!(err.to_string().starts_with("cannot rewrite DOCTYPE of 'doc.xml'"));
    }
}
