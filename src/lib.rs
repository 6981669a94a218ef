//! # xmlvalidator
//!
//! Validates XML documents against a Document Type Definition, either the
//! one the document declares itself or an external DTD supplied by the
//! caller, and evaluates `XPath` 1.0 expressions against the validated tree.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! let doc = xmlvalidator::validate(Path::new("books.xml"), Some(Path::new("books.dtd")))?;
//! for title in xmlvalidator::evaluate(&doc, "//book/title")? {
//!     println!("{}", title.text_content());
//! }
//! # Ok::<(), xmlvalidator::Error>(())
//! ```
//!
//! The lower layers are usable on their own: [`parser`] builds a
//! [`Document`] from text, [`validation`] holds the DTD model and the
//! validity checks, [`serial`] writes a tree back out and [`xpath`] is a
//! standalone `XPath` 1.0 engine over the same tree.

pub mod encoding;
pub mod error;
pub mod parser;
pub mod resolver;
pub mod serial;
pub mod tree;
pub mod validation;
pub mod validator;
pub mod xpath;

pub use error::Error;
pub use tree::{Attribute, Document, NodeId};
pub use validator::{
    evaluate, rewrite_doctype, validate, validate_with_handler, DtdSource, MatchedKind,
    MatchedNode, QueryResult, ValidatedDocument, Validator, ValidatorOptions,
};
