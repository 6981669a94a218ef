//! DTD validation.
//!
//! - [`dtd`] holds the DTD data model and the parser for internal and
//!   external subsets.
//! - [`check`] walks a parsed document and checks it against a [`dtd::Dtd`].
//!
//! Validity problems are not returned in bulk. Each one is handed to an
//! [`ErrorHandler`] the moment it is found, and the handler decides whether
//! processing continues. This mirrors the SAX `ErrorHandler` triple
//! (`warning`, `error`, `fatalError`): [`StrictHandler`] stops on the first
//! report of any severity, [`CollectingHandler`] records everything.

pub mod check;
pub mod dtd;

use std::fmt;

use crate::error::{ErrorSeverity, ParseError, SourceLocation};

/// A DTD validity problem.
///
/// `severity` is [`ErrorSeverity::Warning`] for the optional diagnostics the
/// XML specification allows a validator to emit (an `ATTLIST` for an
/// undeclared element, for example) and [`ErrorSeverity::Error`] for
/// violations of a validity constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidityError {
    /// Warning or error.
    pub severity: ErrorSeverity,
    /// Human-readable description.
    pub message: String,
    /// 1-based position in the document or DTD, when known.
    pub location: Option<SourceLocation>,
}

impl ValidityError {
    /// Creates a validity error (a violated constraint).
    pub fn error(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            severity: ErrorSeverity::Error,
            message: message.into(),
            location,
        }
    }

    /// Creates a validity warning.
    pub fn warning(message: impl Into<String>, location: Option<SourceLocation>) -> Self {
        Self {
            severity: ErrorSeverity::Warning,
            message: message.into(),
            location,
        }
    }
}

impl fmt::Display for ValidityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            ErrorSeverity::Warning => "warning",
            ErrorSeverity::Error | ErrorSeverity::Fatal => "error",
        };
        match self.location {
            Some(loc) => write!(f, "validity {kind} at {loc}: {}", self.message),
            None => write!(f, "validity {kind}: {}", self.message),
        }
    }
}

impl std::error::Error for ValidityError {}

/// Receives validity diagnostics as they are found.
///
/// Returning `Err` from [`warning`](ErrorHandler::warning) or
/// [`error`](ErrorHandler::error) stops validation with that error.
pub trait ErrorHandler {
    /// Called for validity warnings.
    ///
    /// # Errors
    ///
    /// Returns the diagnostic (or another one) to stop validation.
    fn warning(&mut self, warning: ValidityError) -> Result<(), ValidityError>;

    /// Called for violated validity constraints.
    ///
    /// # Errors
    ///
    /// Returns the diagnostic (or another one) to stop validation.
    fn error(&mut self, error: ValidityError) -> Result<(), ValidityError>;

    /// Called once when the document is not well-formed. Parsing always
    /// stops after a fatal error, so this can only observe it.
    fn fatal_error(&mut self, error: &ParseError) {
        let _ = error;
    }
}

/// Dispatches a diagnostic to the handler method matching its severity.
pub(crate) fn report(
    handler: &mut dyn ErrorHandler,
    diagnostic: ValidityError,
) -> Result<(), ValidityError> {
    match diagnostic.severity {
        ErrorSeverity::Warning => handler.warning(diagnostic),
        ErrorSeverity::Error | ErrorSeverity::Fatal => handler.error(diagnostic),
    }
}

/// Treats warnings, errors and fatal errors alike: the first one fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictHandler;

impl ErrorHandler for StrictHandler {
    fn warning(&mut self, warning: ValidityError) -> Result<(), ValidityError> {
        tracing::debug!(%warning, "escalating validity warning");
        Err(warning)
    }

    fn error(&mut self, error: ValidityError) -> Result<(), ValidityError> {
        Err(error)
    }

    fn fatal_error(&mut self, error: &ParseError) {
        tracing::debug!(%error, "document is not well-formed");
    }
}

/// Records every diagnostic and never stops validation.
#[derive(Debug, Clone, Default)]
pub struct CollectingHandler {
    /// Warnings in the order they were reported.
    pub warnings: Vec<ValidityError>,
    /// Errors in the order they were reported.
    pub errors: Vec<ValidityError>,
    /// The well-formedness error that ended the parse, if any.
    pub fatal: Option<ParseError>,
}

impl CollectingHandler {
    /// Returns `true` if nothing but warnings was reported.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.fatal.is_none()
    }
}

impl ErrorHandler for CollectingHandler {
    fn warning(&mut self, warning: ValidityError) -> Result<(), ValidityError> {
        self.warnings.push(warning);
        Ok(())
    }

    fn error(&mut self, error: ValidityError) -> Result<(), ValidityError> {
        self.errors.push(error);
        Ok(())
    }

    fn fatal_error(&mut self, error: &ParseError) {
        self.fatal = Some(error.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn loc(line: u32, column: u32) -> Option<SourceLocation> {
        Some(SourceLocation {
            line,
            column,
            byte_offset: 0,
        })
    }

    #[test]
    fn test_validity_error_display_with_location() {
        let err = ValidityError::error("required attribute 'id' is missing", loc(5, 10));
        assert_eq!(
            err.to_string(),
            "validity error at 5:10: required attribute 'id' is missing"
        );
    }

    #[test]
    fn test_validity_warning_display_without_location() {
        let warn = ValidityError::warning("ATTLIST for undeclared element 'x'", None);
        assert_eq!(
            warn.to_string(),
            "validity warning: ATTLIST for undeclared element 'x'"
        );
    }

    #[test]
    fn test_strict_handler_escalates_warnings() {
        let mut handler = StrictHandler;
        let warn = ValidityError::warning("w", None);
        assert_eq!(report(&mut handler, warn.clone()), Err(warn));
        let err = ValidityError::error("e", None);
        assert_eq!(report(&mut handler, err.clone()), Err(err));
    }

    #[test]
    fn test_collecting_handler_records_in_order() {
        let mut handler = CollectingHandler::default();
        assert!(report(&mut handler, ValidityError::warning("w1", None)).is_ok());
        assert!(report(&mut handler, ValidityError::error("e1", None)).is_ok());
        assert!(report(&mut handler, ValidityError::warning("w2", None)).is_ok());
        assert_eq!(handler.warnings.len(), 2);
        assert_eq!(handler.errors[0].message, "e1");
        assert!(!handler.is_valid());
    }

    #[test]
    fn test_collecting_handler_records_fatal() {
        let mut handler = CollectingHandler::default();
        handler.fatal_error(&ParseError::new("boom", SourceLocation::default()));
        assert_eq!(handler.fatal.map(|e| e.message), Some("boom".to_string()));
    }
}
