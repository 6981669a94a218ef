//! `XPath` 1.0 expression evaluator.
//!
//! This module implements the core evaluation engine for `XPath` 1.0 expressions
//! as specified in <https://www.w3.org/TR/xpath-10/>. It walks an [`Expr`] AST
//! (produced by [`super::parser::parse`]) and evaluates it against a
//! [`Document`] tree, producing an [`XPathValue`].
//!
//! # Evaluation Context
//!
//! Per `XPath` 1.0 section 1, every expression is evaluated with respect to a
//! context node, context position and context size (held in a `Focus`),
//! variable bindings and namespace declarations (held in [`XPathContext`]).
//! The namespace declarations are the ones in scope on the document element.
//!
//! # Location Paths
//!
//! All 13 axes are supported. Attribute and namespace nodes are first-class
//! [`XPathNode`]s. Predicates number nodes in axis order, so `ancestor::*[1]`
//! is the parent; results are always returned in document order.
//!
//! # Functions
//!
//! All 27 core `XPath` 1.0 functions are implemented (node-set, string,
//! boolean, and number function groups). `id()` uses the IDs registered by
//! DTD validation.

use std::collections::HashMap;
use std::iter;

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::types::{parse_xpath_number, XPathError, XPathNode, XPathValue};
use crate::parser::input::{split_name, XML_NAMESPACE};
use crate::tree::{Attribute, Document, NodeId, NodeKind};

/// The context node, position and size an expression is evaluated in.
#[derive(Debug, Clone, Copy)]
struct Focus {
    node: XPathNode,
    position: usize,
    size: usize,
}

/// Evaluation context for `XPath` 1.0 expressions over one document.
///
/// # Examples
///
/// ```
/// use xmlvalidator::Document;
/// use xmlvalidator::xpath::{parser::parse, XPathContext, XPathNode, XPathValue};
///
/// let doc = Document::parse_str("<root><a/><b/></root>").unwrap();
/// let ctx = XPathContext::new(&doc);
/// let expr = parse("count(/root/*)").unwrap();
/// let value = ctx.evaluate(&expr, XPathNode::Node(doc.root())).unwrap();
/// assert_eq!(value, XPathValue::Number(2.0));
/// ```
pub struct XPathContext<'a> {
    doc: &'a Document,
    /// Prefix bindings available to name tests.
    namespaces: HashMap<String, String>,
    variables: HashMap<String, XPathValue>,
}

impl<'a> XPathContext<'a> {
    /// Creates a context whose name-test prefixes are those declared on
    /// the document element.
    #[must_use]
    pub fn new(doc: &'a Document) -> Self {
        let mut namespaces: HashMap<String, String> = doc
            .root_element()
            .map(|root| doc.in_scope_namespaces(root))
            .unwrap_or_default()
            .into_iter()
            .filter(|(prefix, _)| !prefix.is_empty())
            .collect();
        namespaces.insert("xml".to_owned(), XML_NAMESPACE.to_owned());
        Self {
            doc,
            namespaces,
            variables: HashMap::new(),
        }
    }

    /// Binds a variable name to a value in this context.
    pub fn set_variable(&mut self, name: &str, value: XPathValue) {
        self.variables.insert(name.to_owned(), value);
    }

    /// Evaluates an expression with `node` as the context node.
    ///
    /// # Errors
    ///
    /// Returns [`XPathError`] if evaluation fails (undefined variable or
    /// function, wrong argument count, a node-set operation on another
    /// type, an unbound prefix).
    pub fn evaluate(&self, expr: &Expr, node: XPathNode) -> Result<XPathValue, XPathError> {
        let focus = Focus {
            node,
            position: 1,
            size: 1,
        };
        self.eval(expr, &focus)
    }

    /// Computes the string-value of a node (section 5).
    #[must_use]
    pub fn string_value(&self, node: XPathNode) -> String {
        string_value(self.doc, node)
    }

    /// Returns the name `name()` reports for a node.
    #[must_use]
    pub fn node_name(&self, node: XPathNode) -> String {
        node_name(self.doc, node)
    }

    // -----------------------------------------------------------------------
    // Internal expression dispatch
    // -----------------------------------------------------------------------

    fn eval(&self, expr: &Expr, focus: &Focus) -> Result<XPathValue, XPathError> {
        match expr {
            Expr::Number(n) => Ok(XPathValue::Number(*n)),
            Expr::String(s) => Ok(XPathValue::String(s.clone())),
            Expr::Variable(name) => {
                self.variables
                    .get(name)
                    .cloned()
                    .ok_or_else(|| XPathError::UndefinedVariable {
                        name: name.to_owned(),
                    })
            }
            Expr::BinaryOp { op, left, right } => self.eval_binary_op(*op, left, right, focus),
            Expr::UnaryNeg(inner) => {
                let value = self.eval(inner, focus)?;
                Ok(XPathValue::Number(-self.number_of(&value)))
            }
            Expr::FunctionCall { name, args } => self.eval_function(name, args, focus),
            Expr::Path { steps } => self.eval_steps(vec![focus.node], steps),
            Expr::RootPath { steps } => {
                self.eval_steps(vec![XPathNode::Node(self.doc.root())], steps)
            }
            Expr::Filter { expr, predicates } => {
                let nodes = self.eval_node_set(expr, focus, "a predicate")?;
                Ok(XPathValue::NodeSet(self.apply_predicates(nodes, predicates)?))
            }
            Expr::FilterPath { filter, steps } => {
                let nodes = self.eval_node_set(filter, focus, "a path step")?;
                self.eval_steps(nodes, steps)
            }
            Expr::Union(left, right) => {
                let mut nodes = self.eval_node_set(left, focus, "the '|' operator")?;
                nodes.extend(self.eval_node_set(right, focus, "the '|' operator")?);
                nodes.sort_unstable();
                nodes.dedup();
                Ok(XPathValue::NodeSet(nodes))
            }
        }
    }

    fn eval_node_set(
        &self,
        expr: &Expr,
        focus: &Focus,
        context: &str,
    ) -> Result<Vec<XPathNode>, XPathError> {
        match self.eval(expr, focus)? {
            XPathValue::NodeSet(nodes) => Ok(nodes),
            other => Err(XPathError::TypeError {
                context: context.to_owned(),
                found: other.type_name(),
            }),
        }
    }

    // -----------------------------------------------------------------------
    // Binary operations
    // -----------------------------------------------------------------------

    fn eval_binary_op(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        focus: &Focus,
    ) -> Result<XPathValue, XPathError> {
        if matches!(op, BinaryOp::And | BinaryOp::Or) {
            let lv = self.eval(left, focus)?.to_boolean();
            if lv == (op == BinaryOp::Or) {
                return Ok(XPathValue::Boolean(lv));
            }
            return Ok(XPathValue::Boolean(self.eval(right, focus)?.to_boolean()));
        }

        let lv = self.eval(left, focus)?;
        let rv = self.eval(right, focus)?;
        Ok(match op {
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Lt
            | BinaryOp::Lte
            | BinaryOp::Gt
            | BinaryOp::Gte => XPathValue::Boolean(self.compare(op, &lv, &rv)),
            _ => {
                let (ln, rn) = (self.number_of(&lv), self.number_of(&rv));
                XPathValue::Number(match op {
                    BinaryOp::Add => ln + rn,
                    BinaryOp::Sub => ln - rn,
                    BinaryOp::Mul => ln * rn,
                    BinaryOp::Div => ln / rn,
                    _ => ln % rn,
                })
            }
        })
    }

    /// Compares two values per section 3.4. A node-set compares true when
    /// any of its nodes does.
    fn compare(&self, op: BinaryOp, lhs: &XPathValue, rhs: &XPathValue) -> bool {
        match (lhs, rhs) {
            (XPathValue::NodeSet(l), XPathValue::NodeSet(r)) => {
                let rstrings: Vec<String> = r.iter().map(|&n| self.string_value(n)).collect();
                l.iter().any(|&ln| {
                    let ls = XPathValue::String(self.string_value(ln));
                    rstrings
                        .iter()
                        .any(|rs| compare_atomic(op, &ls, &XPathValue::String(rs.clone())))
                })
            }
            (XPathValue::NodeSet(nodes), XPathValue::Boolean(_)) => {
                compare_atomic(op, &XPathValue::Boolean(!nodes.is_empty()), rhs)
            }
            (XPathValue::Boolean(_), XPathValue::NodeSet(nodes)) => {
                compare_atomic(op, lhs, &XPathValue::Boolean(!nodes.is_empty()))
            }
            (XPathValue::NodeSet(nodes), other) => nodes.iter().any(|&n| {
                compare_atomic(op, &self.node_as(n, other), other)
            }),
            (other, XPathValue::NodeSet(nodes)) => nodes.iter().any(|&n| {
                compare_atomic(op, other, &self.node_as(n, other))
            }),
            _ => compare_atomic(op, lhs, rhs),
        }
    }

    /// Converts a node's string-value to the type of `other` (number or
    /// string) for comparison.
    fn node_as(&self, node: XPathNode, other: &XPathValue) -> XPathValue {
        let s = self.string_value(node);
        match other {
            XPathValue::Number(_) => XPathValue::Number(parse_xpath_number(&s)),
            _ => XPathValue::String(s),
        }
    }

    // -----------------------------------------------------------------------
    // Location paths
    // -----------------------------------------------------------------------

    fn eval_steps(
        &self,
        mut nodes: Vec<XPathNode>,
        steps: &[Step],
    ) -> Result<XPathValue, XPathError> {
        for step in steps {
            nodes = self.apply_step(&nodes, step)?;
        }
        Ok(XPathValue::NodeSet(nodes))
    }

    /// Applies a step to every node in `input`, producing a node-set in
    /// document order with duplicates removed.
    fn apply_step(&self, input: &[XPathNode], step: &Step) -> Result<Vec<XPathNode>, XPathError> {
        let mut result = Vec::new();
        for &node in input {
            let mut selected = Vec::new();
            for candidate in self.axis_nodes(node, step.axis) {
                if self.matches_test(candidate, &step.node_test, step.axis)? {
                    selected.push(candidate);
                }
            }
            result.extend(self.apply_predicates(selected, &step.predicates)?);
        }
        result.sort_unstable();
        result.dedup();
        Ok(result)
    }

    /// Filters `nodes` by each predicate in turn. A numeric predicate
    /// selects by position.
    fn apply_predicates(
        &self,
        mut nodes: Vec<XPathNode>,
        predicates: &[Expr],
    ) -> Result<Vec<XPathNode>, XPathError> {
        for predicate in predicates {
            let size = nodes.len();
            let mut kept = Vec::with_capacity(size);
            for (i, node) in nodes.into_iter().enumerate() {
                let focus = Focus {
                    node,
                    position: i + 1,
                    size,
                };
                let keep = match self.eval(predicate, &focus)? {
                    #[allow(clippy::float_cmp, clippy::cast_precision_loss)]
                    XPathValue::Number(n) => n == (i + 1) as f64,
                    other => other.to_boolean(),
                };
                if keep {
                    kept.push(node);
                }
            }
            nodes = kept;
        }
        Ok(nodes)
    }

    // -----------------------------------------------------------------------
    // Axis expansion
    // -----------------------------------------------------------------------

    /// Returns the nodes on `axis` from `node`, in axis order (reverse
    /// document order for reverse axes).
    fn axis_nodes(&self, node: XPathNode, axis: Axis) -> Vec<XPathNode> {
        let doc = self.doc;
        let id = match node {
            XPathNode::Node(id) => id,
            XPathNode::Attribute { owner, .. } | XPathNode::Namespace { owner, .. } => {
                return self.attached_axis_nodes(node, owner, axis);
            }
        };
        match axis {
            Axis::Child => self.tree_nodes(doc.children(id)),
            Axis::Descendant => self.tree_nodes(doc.descendants(id)),
            Axis::DescendantOrSelf => self.tree_nodes(iter::once(id).chain(doc.descendants(id))),
            Axis::Parent => self.tree_nodes(doc.parent(id).into_iter()),
            Axis::Ancestor => self.tree_nodes(doc.ancestors(id).skip(1)),
            Axis::AncestorOrSelf => self.tree_nodes(doc.ancestors(id)),
            Axis::FollowingSibling => {
                self.tree_nodes(iter::successors(doc.next_sibling(id), |&s| doc.next_sibling(s)))
            }
            Axis::PrecedingSibling => {
                self.tree_nodes(iter::successors(doc.prev_sibling(id), |&s| doc.prev_sibling(s)))
            }
            Axis::Following => self.tree_nodes(self.following(id).into_iter()),
            Axis::Preceding => self.tree_nodes(self.preceding(id).into_iter()),
            Axis::Attribute => doc
                .attributes(id)
                .iter()
                .enumerate()
                .filter(|(_, a)| !a.is_namespace_decl())
                .map(|(index, _)| XPathNode::Attribute { owner: id, index })
                .collect(),
            Axis::Namespace => {
                if !matches!(doc.node(id).kind, NodeKind::Element { .. }) {
                    return Vec::new();
                }
                (0..namespaces_of(self.doc, id).len())
                    .map(|index| XPathNode::Namespace { owner: id, index })
                    .collect()
            }
            Axis::Self_ => vec![node],
        }
    }

    /// Axes from an attribute or namespace node, which has a parent but no
    /// children or siblings.
    fn attached_axis_nodes(&self, node: XPathNode, owner: NodeId, axis: Axis) -> Vec<XPathNode> {
        let doc = self.doc;
        match axis {
            Axis::Self_ | Axis::DescendantOrSelf => vec![node],
            Axis::Parent => vec![XPathNode::Node(owner)],
            Axis::Ancestor => self.tree_nodes(doc.ancestors(owner)),
            Axis::AncestorOrSelf => {
                let mut nodes = vec![node];
                nodes.extend(self.tree_nodes(doc.ancestors(owner)));
                nodes
            }
            Axis::Following => {
                self.tree_nodes(doc.descendants(owner).chain(self.following(owner)))
            }
            Axis::Preceding => self.tree_nodes(self.preceding(owner).into_iter()),
            _ => Vec::new(),
        }
    }

    /// Keeps the tree nodes that exist in the `XPath` data model.
    fn tree_nodes(&self, ids: impl Iterator<Item = NodeId>) -> Vec<XPathNode> {
        ids.filter(|&id| {
            !matches!(
                self.doc.node(id).kind,
                NodeKind::DocumentType { .. } | NodeKind::EntityRef { .. }
            )
        })
        .map(XPathNode::Node)
        .collect()
    }

    /// Nodes after `id` in document order, excluding its descendants.
    fn following(&self, id: NodeId) -> Vec<NodeId> {
        let doc = self.doc;
        let mut result = Vec::new();
        for ancestor in doc.ancestors(id) {
            let mut sibling = doc.next_sibling(ancestor);
            while let Some(s) = sibling {
                result.push(s);
                result.extend(doc.descendants(s));
                sibling = doc.next_sibling(s);
            }
        }
        result
    }

    /// Nodes before `id` in reverse document order, excluding its ancestors.
    fn preceding(&self, id: NodeId) -> Vec<NodeId> {
        let doc = self.doc;
        let ancestors: Vec<NodeId> = doc.ancestors(id).collect();
        let mut result: Vec<NodeId> = doc
            .descendants(doc.root())
            .take_while(|&n| n != id)
            .filter(|n| !ancestors.contains(n))
            .collect();
        result.reverse();
        result
    }

    // -----------------------------------------------------------------------
    // Node tests
    // -----------------------------------------------------------------------

    /// Checks a node against a node test. Name tests and `*` select only
    /// the axis's principal node type: attributes on the attribute axis,
    /// namespaces on the namespace axis, elements elsewhere.
    fn matches_test(
        &self,
        node: XPathNode,
        test: &NodeTest,
        axis: Axis,
    ) -> Result<bool, XPathError> {
        let kind = match node {
            XPathNode::Node(id) => Some(&self.doc.node(id).kind),
            _ => None,
        };
        let matched = match test {
            NodeTest::Node => true,
            NodeTest::Text => matches!(kind, Some(NodeKind::Text { .. } | NodeKind::CData { .. })),
            NodeTest::Comment => matches!(kind, Some(NodeKind::Comment { .. })),
            NodeTest::ProcessingInstruction(expected) => match kind {
                Some(NodeKind::ProcessingInstruction { target, .. }) => {
                    expected.as_ref().map_or(true, |e| e == target)
                }
                _ => false,
            },
            NodeTest::Wildcard => self.is_principal(node, axis),
            NodeTest::PrefixWildcard(prefix) => {
                let uri = self.resolve_prefix(prefix)?;
                self.is_principal(node, axis) && self.namespace_uri(node) == Some(uri)
            }
            NodeTest::Name(qname) => {
                let (prefix, local) = split_name(qname);
                let uri = prefix.map(|p| self.resolve_prefix(p)).transpose()?;
                if !self.is_principal(node, axis) {
                    return Ok(false);
                }
                if let XPathNode::Namespace { .. } = node {
                    return Ok(uri.is_none() && self.node_name(node) == local);
                }
                self.local_name(node) == local && self.namespace_uri(node) == uri
            }
        };
        Ok(matched)
    }

    fn is_principal(&self, node: XPathNode, axis: Axis) -> bool {
        match (axis, node) {
            (Axis::Attribute, XPathNode::Attribute { .. })
            | (Axis::Namespace, XPathNode::Namespace { .. }) => true,
            (Axis::Attribute | Axis::Namespace, _) => false,
            (_, XPathNode::Node(id)) => matches!(self.doc.node(id).kind, NodeKind::Element { .. }),
            _ => false,
        }
    }

    fn resolve_prefix(&self, prefix: &str) -> Result<&str, XPathError> {
        self.namespaces
            .get(prefix)
            .map(String::as_str)
            .ok_or_else(|| XPathError::UnboundPrefix {
                prefix: prefix.to_owned(),
            })
    }

    fn local_name(&self, node: XPathNode) -> String {
        match node {
            XPathNode::Node(id) => self.doc.node_name(id).unwrap_or_default().to_owned(),
            XPathNode::Attribute { owner, index } => self
                .attribute(owner, index)
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            XPathNode::Namespace { .. } => self.node_name(node),
        }
    }

    fn namespace_uri(&self, node: XPathNode) -> Option<&str> {
        match node {
            XPathNode::Node(id) => self.doc.node_namespace(id),
            XPathNode::Attribute { owner, index } => {
                self.attribute(owner, index).and_then(|a| a.namespace.as_deref())
            }
            XPathNode::Namespace { .. } => None,
        }
    }

    fn attribute(&self, owner: NodeId, index: usize) -> Option<&Attribute> {
        self.doc.attributes(owner).get(index)
    }

    // -----------------------------------------------------------------------
    // Conversions (sections 4.2 and 4.4)
    // -----------------------------------------------------------------------

    fn number_of(&self, value: &XPathValue) -> f64 {
        match value {
            XPathValue::Number(n) => *n,
            XPathValue::Boolean(b) => f64::from(u8::from(*b)),
            XPathValue::String(s) => parse_xpath_number(s),
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map_or(f64::NAN, |&n| parse_xpath_number(&self.string_value(n))),
        }
    }

    fn string_of(&self, value: &XPathValue) -> String {
        match value {
            XPathValue::NodeSet(nodes) => nodes
                .first()
                .map(|&n| self.string_value(n))
                .unwrap_or_default(),
            other => other.to_string(),
        }
    }

    // -----------------------------------------------------------------------
    // Function library
    // -----------------------------------------------------------------------

    fn eval_function(
        &self,
        name: &str,
        args: &[Expr],
        focus: &Focus,
    ) -> Result<XPathValue, XPathError> {
        let arity = |min: usize, max: usize, expected: &'static str| {
            if args.len() < min || args.len() > max {
                Err(XPathError::InvalidArgCount {
                    function: name.to_owned(),
                    expected,
                    found: args.len(),
                })
            } else {
                Ok(())
            }
        };
        let string_arg = |i: usize| -> Result<String, XPathError> {
            Ok(self.string_of(&self.eval(&args[i], focus)?))
        };
        let number_arg =
            |i: usize| -> Result<f64, XPathError> { Ok(self.number_of(&self.eval(&args[i], focus)?)) };
        // The context node, or the first node of the optional argument.
        let node_arg = |context: &str| -> Result<Option<XPathNode>, XPathError> {
            match args.first() {
                None => Ok(Some(focus.node)),
                Some(arg) => Ok(self.eval_node_set(arg, focus, context)?.first().copied()),
            }
        };
        // The optional string argument, defaulting to the context node.
        let string_or_context = || -> Result<String, XPathError> {
            if args.is_empty() {
                Ok(self.string_value(focus.node))
            } else {
                string_arg(0)
            }
        };

        #[allow(clippy::cast_precision_loss)]
        let value = match name {
            // Node-set functions
            "last" => {
                arity(0, 0, "0")?;
                XPathValue::Number(focus.size as f64)
            }
            "position" => {
                arity(0, 0, "0")?;
                XPathValue::Number(focus.position as f64)
            }
            "count" => {
                arity(1, 1, "1")?;
                XPathValue::Number(self.eval_node_set(&args[0], focus, "count()")?.len() as f64)
            }
            "id" => {
                arity(1, 1, "1")?;
                self.fn_id(&args[0], focus)?
            }
            "local-name" => {
                arity(0, 1, "0 or 1")?;
                let node = node_arg("local-name()")?;
                XPathValue::String(node.map(|n| self.local_name(n)).unwrap_or_default())
            }
            "namespace-uri" => {
                arity(0, 1, "0 or 1")?;
                let node = node_arg("namespace-uri()")?;
                XPathValue::String(
                    node.and_then(|n| self.namespace_uri(n))
                        .unwrap_or_default()
                        .to_owned(),
                )
            }
            "name" => {
                arity(0, 1, "0 or 1")?;
                let node = node_arg("name()")?;
                XPathValue::String(node.map(|n| self.node_name(n)).unwrap_or_default())
            }

            // String functions
            "string" => {
                arity(0, 1, "0 or 1")?;
                XPathValue::String(string_or_context()?)
            }
            "concat" => {
                arity(2, usize::MAX, "at least 2")?;
                let mut result = String::new();
                for i in 0..args.len() {
                    result.push_str(&string_arg(i)?);
                }
                XPathValue::String(result)
            }
            "starts-with" => {
                arity(2, 2, "2")?;
                XPathValue::Boolean(string_arg(0)?.starts_with(&string_arg(1)?))
            }
            "contains" => {
                arity(2, 2, "2")?;
                XPathValue::Boolean(string_arg(0)?.contains(&string_arg(1)?))
            }
            "substring-before" => {
                arity(2, 2, "2")?;
                let (s, sub) = (string_arg(0)?, string_arg(1)?);
                XPathValue::String(s.find(&sub).map(|i| s[..i].to_owned()).unwrap_or_default())
            }
            "substring-after" => {
                arity(2, 2, "2")?;
                let (s, sub) = (string_arg(0)?, string_arg(1)?);
                XPathValue::String(
                    s.find(&sub)
                        .map(|i| s[i + sub.len()..].to_owned())
                        .unwrap_or_default(),
                )
            }
            "substring" => {
                arity(2, 3, "2 or 3")?;
                let s = string_arg(0)?;
                let start = number_arg(1)?;
                let length = if args.len() == 3 {
                    Some(number_arg(2)?)
                } else {
                    None
                };
                XPathValue::String(substring(&s, start, length))
            }
            "string-length" => {
                arity(0, 1, "0 or 1")?;
                XPathValue::Number(string_or_context()?.chars().count() as f64)
            }
            "normalize-space" => {
                arity(0, 1, "0 or 1")?;
                let s = string_or_context()?;
                XPathValue::String(
                    s.split(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
                        .filter(|part| !part.is_empty())
                        .collect::<Vec<_>>()
                        .join(" "),
                )
            }
            "translate" => {
                arity(3, 3, "3")?;
                let (s, from, to) = (string_arg(0)?, string_arg(1)?, string_arg(2)?);
                XPathValue::String(translate(&s, &from, &to))
            }

            // Boolean functions
            "boolean" => {
                arity(1, 1, "1")?;
                XPathValue::Boolean(self.eval(&args[0], focus)?.to_boolean())
            }
            "not" => {
                arity(1, 1, "1")?;
                XPathValue::Boolean(!self.eval(&args[0], focus)?.to_boolean())
            }
            "true" => {
                arity(0, 0, "0")?;
                XPathValue::Boolean(true)
            }
            "false" => {
                arity(0, 0, "0")?;
                XPathValue::Boolean(false)
            }
            "lang" => {
                arity(1, 1, "1")?;
                XPathValue::Boolean(self.fn_lang(&string_arg(0)?, focus.node))
            }

            // Number functions
            "number" => {
                arity(0, 1, "0 or 1")?;
                if args.is_empty() {
                    XPathValue::Number(parse_xpath_number(&self.string_value(focus.node)))
                } else {
                    XPathValue::Number(number_arg(0)?)
                }
            }
            "sum" => {
                arity(1, 1, "1")?;
                let nodes = self.eval_node_set(&args[0], focus, "sum()")?;
                XPathValue::Number(
                    nodes
                        .iter()
                        .map(|&n| parse_xpath_number(&self.string_value(n)))
                        .sum(),
                )
            }
            "floor" => {
                arity(1, 1, "1")?;
                XPathValue::Number(number_arg(0)?.floor())
            }
            "ceiling" => {
                arity(1, 1, "1")?;
                XPathValue::Number(number_arg(0)?.ceil())
            }
            "round" => {
                arity(1, 1, "1")?;
                XPathValue::Number(xpath_round(number_arg(0)?))
            }

            _ => {
                return Err(XPathError::UndefinedFunction {
                    name: name.to_owned(),
                })
            }
        };
        Ok(value)
    }

    /// `id(object)`: elements whose ID attribute matches any of the
    /// whitespace-separated tokens in the argument.
    fn fn_id(&self, arg: &Expr, focus: &Focus) -> Result<XPathValue, XPathError> {
        let tokens: Vec<String> = match self.eval(arg, focus)? {
            XPathValue::NodeSet(nodes) => nodes.iter().map(|&n| self.string_value(n)).collect(),
            other => vec![self.string_of(&other)],
        };
        let mut nodes: Vec<XPathNode> = tokens
            .iter()
            .flat_map(|t| t.split_ascii_whitespace())
            .filter_map(|id| self.doc.element_by_id(id))
            .map(XPathNode::Node)
            .collect();
        nodes.sort_unstable();
        nodes.dedup();
        Ok(XPathValue::NodeSet(nodes))
    }

    /// `lang(string)`: whether the nearest `xml:lang` matches the language
    /// or is a sublanguage of it, ignoring case.
    fn fn_lang(&self, target: &str, node: XPathNode) -> bool {
        let target = target.to_lowercase();
        self.doc
            .ancestors(node.tree_node())
            .find_map(|n| self.doc.attribute(n, "xml:lang"))
            .is_some_and(|lang| {
                let lang = lang.to_lowercase();
                lang == target || lang.starts_with(&format!("{target}-"))
            })
    }
}

// ---------------------------------------------------------------------------
// Node accessors
// ---------------------------------------------------------------------------

/// Computes the string-value of a node (section 5): the concatenated text
/// of an element or the document, an attribute's value, a namespace URI or
/// the content of a text, comment or processing-instruction node.
#[must_use]
pub fn string_value(doc: &Document, node: XPathNode) -> String {
    match node {
        XPathNode::Node(id) => match &doc.node(id).kind {
            NodeKind::Document | NodeKind::Element { .. } => doc.text_content(id),
            NodeKind::Text { content }
            | NodeKind::CData { content }
            | NodeKind::Comment { content } => content.clone(),
            NodeKind::ProcessingInstruction { data, .. } => data.clone().unwrap_or_default(),
            NodeKind::EntityRef { .. } | NodeKind::DocumentType { .. } => String::new(),
        },
        XPathNode::Attribute { owner, index } => doc
            .attributes(owner)
            .get(index)
            .map(|a| a.value.clone())
            .unwrap_or_default(),
        XPathNode::Namespace { owner, index } => namespaces_of(doc, owner)
            .into_iter()
            .nth(index)
            .map(|(_, uri)| uri)
            .unwrap_or_default(),
    }
}

/// Returns the name `name()` reports for a node: the qualified name of an
/// element or attribute, a PI target or a namespace prefix. Other nodes
/// have the empty name.
#[must_use]
pub fn node_name(doc: &Document, node: XPathNode) -> String {
    match node {
        XPathNode::Node(id) => match &doc.node(id).kind {
            NodeKind::Element { .. } => doc.qualified_name(id).unwrap_or_default(),
            NodeKind::ProcessingInstruction { target, .. } => target.clone(),
            _ => String::new(),
        },
        XPathNode::Attribute { owner, index } => doc
            .attributes(owner)
            .get(index)
            .map(Attribute::qualified_name)
            .unwrap_or_default(),
        XPathNode::Namespace { owner, index } => namespaces_of(doc, owner)
            .into_iter()
            .nth(index)
            .map(|(prefix, _)| prefix)
            .unwrap_or_default(),
    }
}

/// In-scope namespaces of an element, the implicit `xml` binding last.
fn namespaces_of(doc: &Document, element: NodeId) -> Vec<(String, String)> {
    let mut namespaces = doc.in_scope_namespaces(element);
    namespaces.push(("xml".to_owned(), XML_NAMESPACE.to_owned()));
    namespaces
}

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// Compares two non-node-set values per section 3.4.
#[allow(clippy::float_cmp)]
fn compare_atomic(op: BinaryOp, lhs: &XPathValue, rhs: &XPathValue) -> bool {
    let to_number = |v: &XPathValue| match v {
        XPathValue::Number(n) => *n,
        XPathValue::Boolean(b) => f64::from(u8::from(*b)),
        XPathValue::String(s) => parse_xpath_number(s),
        XPathValue::NodeSet(_) => f64::NAN,
    };
    match op {
        BinaryOp::Eq | BinaryOp::Neq => {
            let equal = match (lhs, rhs) {
                (XPathValue::Boolean(_), _) | (_, XPathValue::Boolean(_)) => {
                    lhs.to_boolean() == rhs.to_boolean()
                }
                (XPathValue::Number(_), _) | (_, XPathValue::Number(_)) => {
                    to_number(lhs) == to_number(rhs)
                }
                _ => lhs.to_string() == rhs.to_string(),
            };
            equal == (op == BinaryOp::Eq)
        }
        BinaryOp::Lt => to_number(lhs) < to_number(rhs),
        BinaryOp::Lte => to_number(lhs) <= to_number(rhs),
        BinaryOp::Gt => to_number(lhs) > to_number(rhs),
        BinaryOp::Gte => to_number(lhs) >= to_number(rhs),
        _ => false,
    }
}

/// `substring()`: the characters at 1-based positions `p` with
/// `round(start) <= p < round(start) + round(length)`.
fn substring(s: &str, start: f64, length: Option<f64>) -> String {
    let first = xpath_round(start);
    let end = length.map_or(f64::INFINITY, |l| first + xpath_round(l));
    if first.is_nan() || end.is_nan() {
        return String::new();
    }
    s.chars()
        .enumerate()
        .filter(|&(i, _)| {
            #[allow(clippy::cast_precision_loss)]
            let p = (i + 1) as f64;
            p >= first && p < end
        })
        .map(|(_, c)| c)
        .collect()
}

/// `translate()`: maps each character of `from` to the one at the same
/// position in `to`, dropping it when `to` is shorter.
fn translate(s: &str, from: &str, to: &str) -> String {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();
    s.chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect()
}

/// Rounds half toward positive infinity: `round(-0.5)` is 0, `round(2.5)` is 3.
fn xpath_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        return n;
    }
    (n + 0.5).floor()
}
