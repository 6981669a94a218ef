//! Abstract syntax tree types for `XPath` 1.0 expressions.
//!
//! This module defines the AST that results from parsing an `XPath` expression
//! string. The AST closely follows the `XPath` 1.0 grammar from
//! <https://www.w3.org/TR/xpath-10/#section-Basics>.
//!
//! The primary type is [`Expr`], which represents any `XPath` expression.
//! Location paths are composed of [`Step`]s, each having an [`Axis`],
//! a [`NodeTest`], and zero or more predicate expressions.

use std::fmt;

/// An `XPath` expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A numeric literal.
    Number(f64),

    /// A string literal.
    String(String),

    /// A variable reference (`$name`), without the `$`.
    Variable(String),

    /// A binary operator applied to two operands.
    BinaryOp {
        /// The operator.
        op: BinaryOp,
        /// Left operand.
        left: Box<Expr>,
        /// Right operand.
        right: Box<Expr>,
    },

    /// Unary minus.
    UnaryNeg(Box<Expr>),

    /// A call to one of the core functions.
    FunctionCall {
        /// Function name as written.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
    },

    /// A relative location path, evaluated from the context node.
    Path {
        /// The steps, left to right.
        steps: Vec<Step>,
    },

    /// An absolute location path, evaluated from the document root.
    RootPath {
        /// The steps, left to right. Empty for `/` alone.
        steps: Vec<Step>,
    },

    /// A primary expression filtered by predicates (`$x[1]`, `(//a)[2]`).
    Filter {
        /// The filtered expression; must yield a node-set.
        expr: Box<Expr>,
        /// Predicates applied in order, positions in document order.
        predicates: Vec<Expr>,
    },

    /// A filter expression continued by a relative path (`id('x')/name`).
    FilterPath {
        /// The leading expression; must yield a node-set.
        filter: Box<Expr>,
        /// Steps applied to each node of the filter result.
        steps: Vec<Step>,
    },

    /// `left | right`.
    Union(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Height of the expression tree, counting only `Expr` nodes; a literal
    /// has depth 1. Walks the tree with an explicit stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending: Vec<(&Expr, usize)> = vec![(self, 1)];
        while let Some((expr, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            let below = depth + 1;
            match expr {
                Expr::Number(_) | Expr::String(_) | Expr::Variable(_) => {}
                Expr::BinaryOp { left, right, .. } | Expr::Union(left, right) => {
                    pending.push((&**left, below));
                    pending.push((&**right, below));
                }
                Expr::UnaryNeg(inner) => pending.push((&**inner, below)),
                Expr::FunctionCall { args, .. } => {
                    pending.extend(args.iter().map(|arg| (arg, below)));
                }
                Expr::Path { steps } | Expr::RootPath { steps } => {
                    pending.extend(step_predicates(steps).map(|p| (p, below)));
                }
                Expr::Filter { expr, predicates } => {
                    pending.push((&**expr, below));
                    pending.extend(predicates.iter().map(|p| (p, below)));
                }
                Expr::FilterPath { filter, steps } => {
                    pending.push((&**filter, below));
                    pending.extend(step_predicates(steps).map(|p| (p, below)));
                }
            }
        }
        deepest
    }
}

fn step_predicates(steps: &[Step]) -> impl Iterator<Item = &Expr> {
    steps.iter().flat_map(|step| &step.predicates)
}

/// Binary operators, loosest binding first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `or`
    Or,
    /// `and`
    And,
    /// `=`
    Eq,
    /// `!=`
    Neq,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `div`
    Div,
    /// `mod`
    Mod,
}

/// One step of a location path: `axis::node-test[predicate]*`.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// The direction of travel from the context node.
    pub axis: Axis,
    /// Which nodes on the axis are selected.
    pub node_test: NodeTest,
    /// Filters applied in axis order.
    pub predicates: Vec<Expr>,
}

impl Step {
    /// `descendant-or-self::node()`, the expansion of `//`.
    #[must_use]
    pub fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            node_test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

/// The 13 `XPath` axes (section 2.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Child,
    Descendant,
    Parent,
    Ancestor,
    FollowingSibling,
    PrecedingSibling,
    Following,
    Preceding,
    Attribute,
    Namespace,
    Self_,
    DescendantOrSelf,
    AncestorOrSelf,
}

impl Axis {
    /// The axis name as written in an expression.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Child => "child",
            Self::Descendant => "descendant",
            Self::Parent => "parent",
            Self::Ancestor => "ancestor",
            Self::FollowingSibling => "following-sibling",
            Self::PrecedingSibling => "preceding-sibling",
            Self::Following => "following",
            Self::Preceding => "preceding",
            Self::Attribute => "attribute",
            Self::Namespace => "namespace",
            Self::Self_ => "self",
            Self::DescendantOrSelf => "descendant-or-self",
            Self::AncestorOrSelf => "ancestor-or-self",
        }
    }

    /// Looks up an axis by name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "child" => Some(Self::Child),
            "descendant" => Some(Self::Descendant),
            "parent" => Some(Self::Parent),
            "ancestor" => Some(Self::Ancestor),
            "following-sibling" => Some(Self::FollowingSibling),
            "preceding-sibling" => Some(Self::PrecedingSibling),
            "following" => Some(Self::Following),
            "preceding" => Some(Self::Preceding),
            "attribute" => Some(Self::Attribute),
            "namespace" => Some(Self::Namespace),
            "self" => Some(Self::Self_),
            "descendant-or-self" => Some(Self::DescendantOrSelf),
            "ancestor-or-self" => Some(Self::AncestorOrSelf),
            _ => None,
        }
    }

    /// Reverse axes number their nodes in reverse document order.
    #[must_use]
    pub fn is_reverse(self) -> bool {
        matches!(
            self,
            Self::Ancestor | Self::AncestorOrSelf | Self::Preceding | Self::PrecedingSibling
        )
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node test (section 2.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeTest {
    /// A `QName`; a prefix resolves against the document element's bindings.
    Name(String),

    /// `*`: any node of the axis's principal type.
    Wildcard,

    /// `prefix:*`.
    PrefixWildcard(String),

    /// `node()`
    Node,

    /// `text()`
    Text,

    /// `comment()`
    Comment,

    /// `processing-instruction()` with an optional target literal.
    ProcessingInstruction(Option<String>),
}

impl fmt::Display for NodeTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::Wildcard => f.write_str("*"),
            Self::PrefixWildcard(prefix) => write!(f, "{prefix}:*"),
            Self::Node => f.write_str("node()"),
            Self::Text => f.write_str("text()"),
            Self::Comment => f.write_str("comment()"),
            Self::ProcessingInstruction(None) => f.write_str("processing-instruction()"),
            Self::ProcessingInstruction(Some(name)) => {
                write!(f, "processing-instruction('{name}')")
            }
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Or => "or",
            Self::And => "and",
            Self::Eq => "=",
            Self::Neq => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "div",
            Self::Mod => "mod",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_axis_names_parse_back() {
        for axis in [
            Axis::Child,
            Axis::Descendant,
            Axis::Parent,
            Axis::Ancestor,
            Axis::FollowingSibling,
            Axis::PrecedingSibling,
            Axis::Following,
            Axis::Preceding,
            Axis::Attribute,
            Axis::Namespace,
            Axis::Self_,
            Axis::DescendantOrSelf,
            Axis::AncestorOrSelf,
        ] {
            assert_eq!(Axis::parse(axis.as_str()), Some(axis));
        }
        assert_eq!(Axis::parse("sideways"), None);
    }

    #[test]
    fn test_depth_counts_expression_levels() {
        assert_eq!(Expr::Number(1.0).depth(), 1);
        let sum = Expr::BinaryOp {
            op: BinaryOp::Add,
            left: Box::new(Expr::Number(1.0)),
            right: Box::new(Expr::UnaryNeg(Box::new(Expr::Variable("x".into())))),
        };
        assert_eq!(sum.depth(), 3);
        let path = Expr::Path {
            steps: vec![
                Step::descendant_or_self(),
                Step {
                    axis: Axis::Child,
                    node_test: NodeTest::Wildcard,
                    predicates: vec![sum],
                },
            ],
        };
        assert_eq!(path.depth(), 4);
    }

    #[test]
    fn test_reverse_axes() {
        assert!(Axis::Ancestor.is_reverse());
        assert!(Axis::PrecedingSibling.is_reverse());
        assert!(!Axis::Child.is_reverse());
        assert!(!Axis::Following.is_reverse());
    }

    #[test]
    fn test_node_test_display() {
        assert_eq!(NodeTest::Name("bk:title".into()).to_string(), "bk:title");
        assert_eq!(NodeTest::PrefixWildcard("bk".into()).to_string(), "bk:*");
        assert_eq!(
            NodeTest::ProcessingInstruction(Some("app".into())).to_string(),
            "processing-instruction('app')"
        );
    }
}
