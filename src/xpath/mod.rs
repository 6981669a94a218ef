//! `XPath` 1.0 query language implementation.
//!
//! This module provides an implementation of the `XPath` 1.0 specification
//! (<https://www.w3.org/TR/xpath-10/>), including expression parsing and
//! evaluation against an XML document tree.
//!
//! # Quick Start
//!
//! ```
//! use xmlvalidator::Document;
//! use xmlvalidator::xpath::{compile, XPathValue};
//!
//! let doc = Document::parse_str("<root><a>1</a><b>2</b></root>").unwrap();
//! let expr = compile("count(/root/*)").unwrap();
//! assert_eq!(expr.evaluate(&doc).unwrap(), XPathValue::Number(2.0));
//! ```
//!
//! Unprefixed names in an expression select nodes in no namespace. A
//! prefixed name is resolved against the namespace declarations on the
//! document element.
//!
//! # Submodules
//!
//! - [`ast`]: Abstract syntax tree types for parsed `XPath` expressions.
//! - [`lexer`]: Tokenizer for `XPath` expression strings.
//! - [`types`]: `XPath` value types, node handles and errors.
//! - [`parser`]: Recursive descent parser for `XPath` expressions.
//! - [`eval`]: Expression evaluator against a document tree.

pub mod ast;
pub mod eval;
pub mod lexer;
pub mod parser;
pub mod types;

pub use eval::{node_name, string_value, XPathContext};
pub use types::{XPathError, XPathNode, XPathValue};

use crate::tree::{Document, NodeId};

/// A parsed `XPath` expression, ready to evaluate against any document.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: String,
    expr: ast::Expr,
}

/// Parses an `XPath` 1.0 expression.
///
/// # Errors
///
/// Returns [`XPathError::Syntax`] with the offending position if the
/// expression is malformed.
pub fn compile(expression: &str) -> Result<CompiledExpr, XPathError> {
    let expr = parser::parse(expression).map_err(|error| XPathError::Syntax {
        expression: expression.to_owned(),
        error,
    })?;
    Ok(CompiledExpr {
        source: expression.to_owned(),
        expr,
    })
}

impl CompiledExpr {
    /// The expression text as it was compiled.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// The parsed expression tree.
    #[must_use]
    pub fn ast(&self) -> &ast::Expr {
        &self.expr
    }

    /// Evaluates the expression with the document node as context.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError`] if evaluation fails.
    pub fn evaluate(&self, doc: &Document) -> Result<XPathValue, XPathError> {
        self.evaluate_at(doc, XPathNode::Node(doc.root()))
    }

    /// Evaluates the expression with `context` as the context node.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError`] if evaluation fails.
    pub fn evaluate_at(
        &self,
        doc: &Document,
        context: XPathNode,
    ) -> Result<XPathValue, XPathError> {
        XPathContext::new(doc).evaluate(&self.expr, context)
    }

    /// Evaluates the expression from the document node and returns the
    /// selected nodes in document order.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError::TypeError`] if the expression yields a number,
    /// string or boolean instead of a node-set.
    pub fn select_nodes(&self, doc: &Document) -> Result<Vec<XPathNode>, XPathError> {
        match self.evaluate(doc)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(XPathError::TypeError {
                context: format!("selecting nodes with '{}'", self.source),
                found: other.type_name(),
            }),
        }
    }
}

/// Evaluates an `XPath` 1.0 expression against a document node.
///
/// This is a convenience function that parses the expression and evaluates it
/// in a single call. For evaluating the same expression against multiple
/// documents, use [`compile`] once and [`CompiledExpr::evaluate`].
///
/// # Examples
///
/// ```
/// use xmlvalidator::Document;
/// use xmlvalidator::xpath::{evaluate, XPathValue};
///
/// let doc = Document::parse_str("<root><child>Hello</child></root>").unwrap();
/// let root = doc.root_element().unwrap();
///
/// let result = evaluate(&doc, root, "string(child)").unwrap();
/// assert_eq!(result, XPathValue::String("Hello".into()));
/// ```
///
/// # Errors
///
/// Returns [`XPathError`] if the expression is malformed or evaluation fails.
pub fn evaluate(
    doc: &Document,
    context_node: NodeId,
    expression: &str,
) -> Result<XPathValue, XPathError> {
    compile(expression)?.evaluate_at(doc, XPathNode::Node(context_node))
}
