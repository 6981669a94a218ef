//! `XPath` 1.0 value type system.
//!
//! This module implements the four core data types defined in the `XPath` 1.0
//! specification (<https://www.w3.org/TR/xpath-10/#section-Data-Model>):
//! boolean, number, string, and node-set, plus the [`XPathNode`] handle that
//! node-sets are made of and the [`XPathError`] type.

use std::cmp::Ordering;
use std::fmt;

use super::lexer::SyntaxError;
use crate::tree::NodeId;

// ---------------------------------------------------------------------------
// XPathNode
// ---------------------------------------------------------------------------

/// A node in the `XPath` data model.
///
/// Tree nodes live in the document arena. Attributes and namespace nodes do
/// not, so they are addressed through their owner element and their index
/// in its attribute list or in-scope namespace list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum XPathNode {
    /// A node of the document tree.
    Node(NodeId),
    /// The `index`th attribute of `owner`.
    Attribute {
        /// The element carrying the attribute.
        owner: NodeId,
        /// Position in [`Document::attributes`](crate::Document::attributes).
        index: usize,
    },
    /// The `index`th in-scope namespace of `owner`.
    Namespace {
        /// The element the namespace is in scope on.
        owner: NodeId,
        /// Position in the evaluator's namespace list for `owner`.
        index: usize,
    },
}

impl XPathNode {
    /// The tree node itself, or the element an attribute/namespace belongs to.
    #[must_use]
    pub fn tree_node(self) -> NodeId {
        match self {
            Self::Node(id) | Self::Attribute { owner: id, .. } | Self::Namespace { owner: id, .. } => {
                id
            }
        }
    }

    /// Document order key. An element's namespace nodes come right after
    /// it, then its attributes, then its children.
    fn order_key(self) -> (NodeId, u8, usize) {
        match self {
            Self::Node(id) => (id, 0, 0),
            Self::Namespace { owner, index } => (owner, 1, index),
            Self::Attribute { owner, index } => (owner, 2, index),
        }
    }
}

impl PartialOrd for XPathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for XPathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl From<NodeId> for XPathNode {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

// ---------------------------------------------------------------------------
// XPathValue
// ---------------------------------------------------------------------------

/// An `XPath` 1.0 value.
///
/// The `XPath` specification defines exactly four data types. Every expression
/// evaluates to one of these variants.
#[derive(Debug, Clone, PartialEq)]
pub enum XPathValue {
    /// A boolean value (`true` or `false`).
    Boolean(bool),

    /// A number (IEEE 754 double-precision floating-point).
    Number(f64),

    /// A string (a sequence of UCS characters).
    String(String),

    /// Nodes in document order, without duplicates.
    NodeSet(Vec<XPathNode>),
}

impl XPathValue {
    /// Converts a non-node-set value to a boolean (section 4.3). A node-set
    /// is true when it is non-empty.
    #[must_use]
    pub fn to_boolean(&self) -> bool {
        match self {
            Self::Boolean(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::NodeSet(nodes) => !nodes.is_empty(),
        }
    }

    /// Returns a human-readable name for the type of this value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::NodeSet(_) => "node-set",
        }
    }
}

impl fmt::Display for XPathValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_xpath_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::NodeSet(nodes) => write!(f, "<node-set of {} nodes>", nodes.len()),
        }
    }
}

// ---------------------------------------------------------------------------
// Number conversions (section 4.4)
// ---------------------------------------------------------------------------

/// Formats an `f64` per the `XPath` number-to-string rules: `NaN`,
/// `Infinity`, integers without a decimal point, and no exponent notation.
#[must_use]
pub fn format_xpath_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_owned();
    }
    if n.is_infinite() {
        return if n.is_sign_positive() {
            "Infinity".to_owned()
        } else {
            "-Infinity".to_owned()
        };
    }
    if n == 0.0 {
        return "0".to_owned();
    }
    #[allow(clippy::float_cmp, clippy::cast_possible_truncation)]
    if n.fract() == 0.0 && n.abs() < 1e18 {
        return format!("{}", n as i64);
    }
    format!("{n}")
}

/// Parses a string into an `XPath` number: optional whitespace, an optional
/// minus sign, digits with an optional decimal point. Anything else is NaN.
#[must_use]
pub fn parse_xpath_number(s: &str) -> f64 {
    let trimmed = s.trim_matches(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));
    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    let well_formed = !digits.is_empty()
        && digits != "."
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.matches('.').count() <= 1;
    if !well_formed {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

// ---------------------------------------------------------------------------
// XPathError
// ---------------------------------------------------------------------------

/// An error raised while compiling or evaluating an `XPath` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XPathError {
    /// The expression is not valid `XPath` 1.0 syntax.
    Syntax {
        /// The expression as given.
        expression: String,
        /// What is wrong and where.
        error: SyntaxError,
    },

    /// A type mismatch occurred (e.g., expected a node-set but got a string).
    TypeError {
        /// Where the value was used.
        context: String,
        /// The type that was actually found.
        found: &'static str,
    },

    /// A variable reference used a name that has no binding.
    UndefinedVariable {
        /// The name of the undefined variable (without the `$` prefix).
        name: String,
    },

    /// A function call used a name that is not a core `XPath` function.
    UndefinedFunction {
        /// The name of the undefined function.
        name: String,
    },

    /// A function was called with the wrong number of arguments.
    InvalidArgCount {
        /// The name of the function.
        function: String,
        /// The accepted argument counts, as text (`"1"`, `"2 or 3"`).
        expected: &'static str,
        /// The number of arguments that were actually provided.
        found: usize,
    },

    /// A name test used a prefix the document element does not bind.
    UnboundPrefix {
        /// The prefix.
        prefix: String,
    },
}

impl fmt::Display for XPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Syntax { expression, error } => {
                write!(f, "invalid XPath expression '{expression}': {error}")
            }
            Self::TypeError { context, found } => {
                write!(f, "XPath type error: {context} requires a node-set, found {found}")
            }
            Self::UndefinedVariable { name } => {
                write!(f, "XPath error: undefined variable ${name}")
            }
            Self::UndefinedFunction { name } => {
                write!(f, "XPath error: unknown function {name}()")
            }
            Self::InvalidArgCount {
                function,
                expected,
                found,
            } => {
                write!(
                    f,
                    "XPath error: {function}() takes {expected} argument(s), {found} given"
                )
            }
            Self::UnboundPrefix { prefix } => {
                write!(f, "XPath error: namespace prefix '{prefix}' is not bound")
            }
        }
    }
}

impl std::error::Error for XPathError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Syntax { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::tree::{Document, NodeKind};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_to_boolean() {
        assert!(XPathValue::Number(-0.5).to_boolean());
        assert!(!XPathValue::Number(0.0).to_boolean());
        assert!(!XPathValue::Number(f64::NAN).to_boolean());
        assert!(XPathValue::String("false".into()).to_boolean());
        assert!(!XPathValue::String(String::new()).to_boolean());
        assert!(!XPathValue::NodeSet(Vec::new()).to_boolean());
    }

    #[test]
    fn test_format_xpath_number() {
        assert_eq!(format_xpath_number(1.0), "1");
        assert_eq!(format_xpath_number(-0.0), "0");
        assert_eq!(format_xpath_number(2.5), "2.5");
        assert_eq!(format_xpath_number(-42.0), "-42");
        assert_eq!(format_xpath_number(f64::NAN), "NaN");
        assert_eq!(format_xpath_number(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_parse_xpath_number() {
        assert_eq!(parse_xpath_number(" 42 "), 42.0);
        assert_eq!(parse_xpath_number("-1.5"), -1.5);
        assert_eq!(parse_xpath_number(".5"), 0.5);
        assert!(parse_xpath_number("1e3").is_nan());
        assert!(parse_xpath_number("+1").is_nan());
        assert!(parse_xpath_number("inf").is_nan());
        assert!(parse_xpath_number("").is_nan());
        assert!(parse_xpath_number(".").is_nan());
    }

    #[test]
    fn test_node_document_order() {
        let mut doc = Document::new();
        let root = doc.root();
        let a = doc.create_node(NodeKind::Element {
            name: "a".into(),
            prefix: None,
            namespace: None,
            attributes: Vec::new(),
        });
        doc.append_child(root, a);
        let text = doc.create_node(NodeKind::Text {
            content: "t".into(),
        });
        doc.append_child(a, text);

        let mut nodes = vec![
            XPathNode::Node(text),
            XPathNode::Attribute { owner: a, index: 1 },
            XPathNode::Node(a),
            XPathNode::Attribute { owner: a, index: 0 },
            XPathNode::Namespace { owner: a, index: 0 },
        ];
        nodes.sort();
        assert_eq!(
            nodes,
            vec![
                XPathNode::Node(a),
                XPathNode::Namespace { owner: a, index: 0 },
                XPathNode::Attribute { owner: a, index: 0 },
                XPathNode::Attribute { owner: a, index: 1 },
                XPathNode::Node(text),
            ]
        );
    }

    #[test]
    fn test_syntax_error_display() {
        let err = XPathError::Syntax {
            expression: "invalid\\xpath".into(),
            error: SyntaxError {
                message: "illegal character '\\'".into(),
                position: 7,
            },
        };
        assert_eq!(
            err.to_string(),
            "invalid XPath expression 'invalid\\xpath': illegal character '\\' at position 7"
        );
    }

    #[test]
    fn test_arg_count_display() {
        let err = XPathError::InvalidArgCount {
            function: "substring".into(),
            expected: "2 or 3",
            found: 1,
        };
        assert_eq!(
            err.to_string(),
            "XPath error: substring() takes 2 or 3 argument(s), 1 given"
        );
    }
}
