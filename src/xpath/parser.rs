//! `XPath` 1.0 expression parser.
//!
//! This module implements a recursive descent parser for `XPath` 1.0 expressions
//! as specified in <https://www.w3.org/TR/xpath-10/#section-Grammar>. The parser
//! consumes the tokens produced by [`super::lexer::Lexer`] and produces an
//! [`Expr`] AST.
//!
//! # Operator Precedence
//!
//! From lowest to highest:
//! 1. `or`
//! 2. `and`
//! 3. `=`, `!=` (equality)
//! 4. `<`, `<=`, `>`, `>=` (relational)
//! 5. `+`, `-` (additive)
//! 6. `*`, `div`, `mod` (multiplicative)
//! 7. Unary `-`
//! 8. `|` (union)
//! 9. Filter expressions (primary expression with predicates)
//! 10. Path expressions (location paths)

use super::ast::{Axis, BinaryOp, Expr, NodeTest, Step};
use super::lexer::{Lexer, Spanned, SyntaxError, Token};
use crate::parser::input::DEFAULT_MAX_DEPTH;

/// Deepest expression accepted, both in nested parentheses, predicates and
/// function arguments while parsing and in [`Expr::depth`] of the result.
/// Shares the document nesting limit.
pub const MAX_EXPR_DEPTH: usize = DEFAULT_MAX_DEPTH as usize;

/// Longest expression accepted, in tokens.
pub const MAX_EXPR_TOKENS: usize = 10_000;

/// Parses an `XPath` expression string into an AST.
///
/// # Errors
///
/// Returns [`SyntaxError`] if the input is not a valid `XPath` 1.0
/// expression. The error names the offending token and its character
/// offset.
pub fn parse(input: &str) -> Result<Expr, SyntaxError> {
    let tokens = Lexer::new(input).tokenize()?;
    if tokens.is_empty() {
        return Err(SyntaxError {
            message: "empty expression".to_string(),
            position: 0,
        });
    }

    if tokens.len() > MAX_EXPR_TOKENS {
        return Err(SyntaxError {
            message: format!("expression longer than {MAX_EXPR_TOKENS} tokens"),
            position: 0,
        });
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        end: input.chars().count(),
        depth: 0,
    };
    let expr = parser.parse_expr()?;
    if parser.pos < parser.tokens.len() {
        return Err(parser.error(format!(
            "unexpected {} after expression",
            parser.describe_current()
        )));
    }
    // Operator chains nest without recursing in the parser, so the finished
    // tree is measured too; evaluation recurses once per level.
    if expr.depth() > MAX_EXPR_DEPTH {
        return Err(SyntaxError {
            message: too_deep(),
            position: 0,
        });
    }
    Ok(expr)
}

fn too_deep() -> String {
    format!("expression nested too deeply (more than {MAX_EXPR_DEPTH} levels)")
}

/// Internal recursive descent parser for `XPath` 1.0 token streams.
struct Parser {
    tokens: Vec<Spanned>,
    /// Index of the current token.
    pos: usize,
    /// Character length of the expression, reported for errors at the end.
    end: usize,
    /// Current nesting of `parse_expr` calls.
    depth: usize,
}

impl Parser {
    // -----------------------------------------------------------------------
    // Token access helpers
    // -----------------------------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    /// Consumes the current token if it matches `token`.
    fn eat(&mut self, token: &Token) -> bool {
        if self.check(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token) -> Result<(), SyntaxError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(format!(
                "expected '{token}', found {}",
                self.describe_current()
            )))
        }
    }

    fn describe_current(&self) -> String {
        self.peek()
            .map_or_else(|| "end of expression".to_string(), |t| format!("'{t}'"))
    }

    fn error(&self, message: String) -> SyntaxError {
        SyntaxError {
            message,
            position: self.tokens.get(self.pos).map_or(self.end, |(_, p)| *p),
        }
    }

    // -----------------------------------------------------------------------
    // Grammar productions
    // -----------------------------------------------------------------------

    /// `Expr ::= OrExpr`
    fn parse_expr(&mut self) -> Result<Expr, SyntaxError> {
        if self.depth >= MAX_EXPR_DEPTH {
            return Err(self.error(too_deep()));
        }
        self.depth += 1;
        let expr = self.parse_or_expr();
        self.depth -= 1;
        expr
    }

    /// Parses one left-associative binary level: `next (op next)*`.
    fn parse_binary_level(
        &mut self,
        ops: &[(Token, BinaryOp)],
        next: fn(&mut Self) -> Result<Expr, SyntaxError>,
    ) -> Result<Expr, SyntaxError> {
        let mut left = next(self)?;
        'outer: loop {
            for (token, op) in ops {
                if self.eat(token) {
                    let right = next(self)?;
                    left = Expr::BinaryOp {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                    };
                    continue 'outer;
                }
            }
            return Ok(left);
        }
    }

    /// `OrExpr ::= AndExpr ('or' AndExpr)*`
    fn parse_or_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary_level(&[(Token::Or, BinaryOp::Or)], Self::parse_and_expr)
    }

    /// `AndExpr ::= EqualityExpr ('and' EqualityExpr)*`
    fn parse_and_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary_level(&[(Token::And, BinaryOp::And)], Self::parse_equality_expr)
    }

    /// `EqualityExpr ::= RelationalExpr (('=' | '!=') RelationalExpr)*`
    fn parse_equality_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary_level(
            &[(Token::Equal, BinaryOp::Eq), (Token::NotEqual, BinaryOp::Neq)],
            Self::parse_relational_expr,
        )
    }

    /// `RelationalExpr ::= AdditiveExpr (('<' | '<=' | '>' | '>=') AdditiveExpr)*`
    fn parse_relational_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary_level(
            &[
                (Token::LessThan, BinaryOp::Lt),
                (Token::LessThanEqual, BinaryOp::Lte),
                (Token::GreaterThan, BinaryOp::Gt),
                (Token::GreaterThanEqual, BinaryOp::Gte),
            ],
            Self::parse_additive_expr,
        )
    }

    /// `AdditiveExpr ::= MultiplicativeExpr (('+' | '-') MultiplicativeExpr)*`
    fn parse_additive_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary_level(
            &[(Token::Plus, BinaryOp::Add), (Token::Minus, BinaryOp::Sub)],
            Self::parse_multiplicative_expr,
        )
    }

    /// `MultiplicativeExpr ::= UnaryExpr (('*' | 'div' | 'mod') UnaryExpr)*`
    fn parse_multiplicative_expr(&mut self) -> Result<Expr, SyntaxError> {
        self.parse_binary_level(
            &[
                (Token::Multiply, BinaryOp::Mul),
                (Token::Div, BinaryOp::Div),
                (Token::Mod, BinaryOp::Mod),
            ],
            Self::parse_unary_expr,
        )
    }

    /// `UnaryExpr ::= UnionExpr | '-' UnaryExpr`
    fn parse_unary_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut negations = 0;
        while self.eat(&Token::Minus) {
            negations += 1;
        }
        let mut expr = self.parse_union_expr()?;
        for _ in 0..negations {
            expr = Expr::UnaryNeg(Box::new(expr));
        }
        Ok(expr)
    }

    /// `UnionExpr ::= PathExpr ('|' PathExpr)*`
    fn parse_union_expr(&mut self) -> Result<Expr, SyntaxError> {
        let mut left = self.parse_path_expr()?;
        while self.eat(&Token::Pipe) {
            let right = self.parse_path_expr()?;
            left = Expr::Union(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Parses a path expression.
    ///
    /// ```text
    /// PathExpr ::= LocationPath
    ///            | FilterExpr
    ///            | FilterExpr '/' RelativeLocationPath
    ///            | FilterExpr '//' RelativeLocationPath
    /// ```
    fn parse_path_expr(&mut self) -> Result<Expr, SyntaxError> {
        match self.peek() {
            Some(Token::Slash | Token::DoubleSlash) => self.parse_absolute_path(),
            Some(
                Token::VariableReference(_)
                | Token::Literal(_)
                | Token::Number(_)
                | Token::LeftParen
                | Token::FunctionName(_),
            ) => {
                let filter = self.parse_filter_expr()?;
                let mut steps = Vec::new();
                if self.eat(&Token::DoubleSlash) {
                    steps.push(Step::descendant_or_self());
                } else if !self.eat(&Token::Slash) {
                    return Ok(filter);
                }
                self.parse_relative_path_into(&mut steps)?;
                Ok(Expr::FilterPath {
                    filter: Box::new(filter),
                    steps,
                })
            }
            _ if self.is_step_start() => {
                let mut steps = Vec::new();
                self.parse_relative_path_into(&mut steps)?;
                Ok(Expr::Path { steps })
            }
            None => Err(self.error("unexpected end of expression".to_string())),
            Some(token) => Err(self.error(format!("expected an expression, found '{token}'"))),
        }
    }

    /// `AbsoluteLocationPath ::= '/' RelativeLocationPath? | '//' RelativeLocationPath`
    fn parse_absolute_path(&mut self) -> Result<Expr, SyntaxError> {
        let mut steps = Vec::new();
        if self.eat(&Token::DoubleSlash) {
            steps.push(Step::descendant_or_self());
            self.parse_relative_path_into(&mut steps)?;
        } else {
            self.expect(&Token::Slash)?;
            if self.is_step_start() {
                self.parse_relative_path_into(&mut steps)?;
            }
        }
        Ok(Expr::RootPath { steps })
    }

    /// `FilterExpr ::= PrimaryExpr Predicate*`
    fn parse_filter_expr(&mut self) -> Result<Expr, SyntaxError> {
        let expr = self.parse_primary_expr()?;
        let predicates = self.parse_predicates()?;
        if predicates.is_empty() {
            Ok(expr)
        } else {
            Ok(Expr::Filter {
                expr: Box::new(expr),
                predicates,
            })
        }
    }

    /// ```text
    /// PrimaryExpr ::= VariableReference | '(' Expr ')' | Literal | Number | FunctionCall
    /// ```
    fn parse_primary_expr(&mut self) -> Result<Expr, SyntaxError> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.error("unexpected end of expression".to_string()));
        };
        self.pos += 1;
        match token {
            Token::VariableReference(name) => Ok(Expr::Variable(name)),
            Token::Literal(value) => Ok(Expr::String(value)),
            Token::Number(value) => Ok(Expr::Number(value)),
            Token::LeftParen => {
                let expr = self.parse_expr()?;
                self.expect(&Token::RightParen)?;
                Ok(expr)
            }
            Token::FunctionName(name) => {
                self.expect(&Token::LeftParen)?;
                let mut args = Vec::new();
                if !self.check(&Token::RightParen) {
                    args.push(self.parse_expr()?);
                    while self.eat(&Token::Comma) {
                        args.push(self.parse_expr()?);
                    }
                }
                self.expect(&Token::RightParen)?;
                Ok(Expr::FunctionCall { name, args })
            }
            other => {
                self.pos -= 1;
                Err(self.error(format!("unexpected '{other}'")))
            }
        }
    }

    /// ```text
    /// RelativeLocationPath ::= Step
    ///                        | RelativeLocationPath '/' Step
    ///                        | RelativeLocationPath '//' Step
    /// ```
    fn parse_relative_path_into(&mut self, steps: &mut Vec<Step>) -> Result<(), SyntaxError> {
        steps.push(self.parse_step()?);
        loop {
            if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
            } else if !self.eat(&Token::Slash) {
                return Ok(());
            }
            steps.push(self.parse_step()?);
        }
    }

    fn is_step_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(
                Token::Dot
                    | Token::DotDot
                    | Token::At
                    | Token::NameTest(_)
                    | Token::NodeType(_)
                    | Token::AxisName(_)
            )
        )
    }

    /// ```text
    /// Step ::= AxisSpecifier NodeTest Predicate* | '.' | '..'
    /// ```
    fn parse_step(&mut self) -> Result<Step, SyntaxError> {
        if self.eat(&Token::Dot) {
            return Ok(Step {
                axis: Axis::Self_,
                node_test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }
        if self.eat(&Token::DotDot) {
            return Ok(Step {
                axis: Axis::Parent,
                node_test: NodeTest::Node,
                predicates: Vec::new(),
            });
        }

        let axis = self.parse_axis_specifier()?;
        let node_test = self.parse_node_test()?;
        let predicates = self.parse_predicates()?;
        Ok(Step {
            axis,
            node_test,
            predicates,
        })
    }

    /// `AxisSpecifier ::= AxisName '::' | '@'?`
    fn parse_axis_specifier(&mut self) -> Result<Axis, SyntaxError> {
        if self.eat(&Token::At) {
            return Ok(Axis::Attribute);
        }
        if let Some(Token::AxisName(name)) = self.peek() {
            let axis = Axis::parse(name)
                .ok_or_else(|| self.error(format!("unknown axis '{name}'")))?;
            self.pos += 1;
            self.expect(&Token::ColonColon)?;
            return Ok(axis);
        }
        Ok(Axis::Child)
    }

    /// ```text
    /// NodeTest ::= NameTest | NodeType '(' ')' | 'processing-instruction' '(' Literal ')'
    /// ```
    fn parse_node_test(&mut self) -> Result<NodeTest, SyntaxError> {
        match self.peek().cloned() {
            Some(Token::NodeType(name)) => {
                self.pos += 1;
                self.expect(&Token::LeftParen)?;
                let test = match name.as_str() {
                    "node" => NodeTest::Node,
                    "text" => NodeTest::Text,
                    "comment" => NodeTest::Comment,
                    _ => match self.peek().cloned() {
                        Some(Token::Literal(target)) => {
                            self.pos += 1;
                            NodeTest::ProcessingInstruction(Some(target))
                        }
                        _ => NodeTest::ProcessingInstruction(None),
                    },
                };
                self.expect(&Token::RightParen)?;
                Ok(test)
            }
            Some(Token::NameTest(name)) => {
                self.pos += 1;
                Ok(if name == "*" {
                    NodeTest::Wildcard
                } else if let Some(prefix) = name.strip_suffix(":*") {
                    NodeTest::PrefixWildcard(prefix.to_string())
                } else {
                    NodeTest::Name(name)
                })
            }
            _ => Err(self.error(format!(
                "expected a node test, found {}",
                self.describe_current()
            ))),
        }
    }

    /// `Predicate ::= '[' Expr ']'`
    fn parse_predicates(&mut self) -> Result<Vec<Expr>, SyntaxError> {
        let mut predicates = Vec::new();
        while self.eat(&Token::LeftBracket) {
            predicates.push(self.parse_expr()?);
            self.expect(&Token::RightBracket)?;
        }
        Ok(predicates)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn p(input: &str) -> Expr {
        parse(input).unwrap()
    }

    fn step(axis: Axis, node_test: NodeTest) -> Step {
        Step {
            axis,
            node_test,
            predicates: Vec::new(),
        }
    }

    fn named(name: &str) -> Step {
        step(Axis::Child, NodeTest::Name(name.to_string()))
    }

    #[test]
    fn test_parse_root_only() {
        assert_eq!(p("/"), Expr::RootPath { steps: Vec::new() });
    }

    #[test]
    fn test_parse_double_slash_path() {
        assert_eq!(
            p("//bookstore/book/title"),
            Expr::RootPath {
                steps: vec![
                    Step::descendant_or_self(),
                    named("bookstore"),
                    named("book"),
                    named("title"),
                ]
            }
        );
    }

    #[test]
    fn test_parse_abbreviations() {
        assert_eq!(
            p(".//@id/.."),
            Expr::Path {
                steps: vec![
                    step(Axis::Self_, NodeTest::Node),
                    Step::descendant_or_self(),
                    step(Axis::Attribute, NodeTest::Name("id".into())),
                    step(Axis::Parent, NodeTest::Node),
                ]
            }
        );
    }

    #[test]
    fn test_parse_explicit_axes_and_node_types() {
        assert_eq!(
            p("ancestor-or-self::*/following-sibling::text()"),
            Expr::Path {
                steps: vec![
                    step(Axis::AncestorOrSelf, NodeTest::Wildcard),
                    step(Axis::FollowingSibling, NodeTest::Text),
                ]
            }
        );
        assert_eq!(
            p("processing-instruction('app')"),
            Expr::Path {
                steps: vec![step(
                    Axis::Child,
                    NodeTest::ProcessingInstruction(Some("app".into()))
                )]
            }
        );
    }

    #[test]
    fn test_parse_predicate() {
        let Expr::Path { steps } = p("book[@lang='en'][2]") else {
            panic!("expected a path");
        };
        assert_eq!(steps[0].predicates.len(), 2);
        assert_eq!(steps[0].predicates[1], Expr::Number(2.0));
    }

    #[test]
    fn test_operator_precedence() {
        assert_eq!(
            p("1 + 2 * 3 = 7 or false()"),
            Expr::BinaryOp {
                op: BinaryOp::Or,
                left: Box::new(Expr::BinaryOp {
                    op: BinaryOp::Eq,
                    left: Box::new(Expr::BinaryOp {
                        op: BinaryOp::Add,
                        left: Box::new(Expr::Number(1.0)),
                        right: Box::new(Expr::BinaryOp {
                            op: BinaryOp::Mul,
                            left: Box::new(Expr::Number(2.0)),
                            right: Box::new(Expr::Number(3.0)),
                        }),
                    }),
                    right: Box::new(Expr::Number(7.0)),
                }),
                right: Box::new(Expr::FunctionCall {
                    name: "false".into(),
                    args: Vec::new(),
                }),
            }
        );
    }

    #[test]
    fn test_subtraction_is_left_associative() {
        assert_eq!(
            p("5 - 2 - 1"),
            Expr::BinaryOp {
                op: BinaryOp::Sub,
                left: Box::new(Expr::BinaryOp {
                    op: BinaryOp::Sub,
                    left: Box::new(Expr::Number(5.0)),
                    right: Box::new(Expr::Number(2.0)),
                }),
                right: Box::new(Expr::Number(1.0)),
            }
        );
    }

    #[test]
    fn test_parse_filter_path() {
        assert_eq!(
            p("id('b1')//title"),
            Expr::FilterPath {
                filter: Box::new(Expr::FunctionCall {
                    name: "id".into(),
                    args: vec![Expr::String("b1".into())],
                }),
                steps: vec![Step::descendant_or_self(), named("title")],
            }
        );
        assert!(matches!(p("(//a)[1]"), Expr::Filter { .. }));
    }

    #[test]
    fn test_parse_union() {
        assert!(matches!(p("a | b | c"), Expr::Union(..)));
    }

    #[test]
    fn test_parse_errors() {
        for (input, needle) in [
            ("", "empty expression"),
            ("/bookstore/", "expected a node test, found end of expression"),
            ("book[1", "expected ']'"),
            ("count(1,", "unexpected end of expression"),
            ("1 +", "unexpected end of expression"),
            ("bogus::a", "unknown axis 'bogus'"),
            ("a)", "unexpected ')' after expression"),
        ] {
            let err = parse(input).unwrap_err();
            assert!(
                err.message.contains(needle),
                "{input}: expected '{needle}' in '{}'",
                err.message
            );
        }
    }

    #[test]
    fn test_error_position_points_at_token() {
        let err = parse("//a[@x=]").unwrap_err();
        assert_eq!(err.position, 7);
    }

    /// Runs `f` on a thread with room for the deepest accepted expression
    /// in an unoptimized build.
    fn with_big_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
        std::thread::Builder::new()
            .stack_size(16 * 1024 * 1024)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap()
    }

    #[test]
    fn test_nesting_limit() {
        let (inside, outside) = with_big_stack(|| {
            let nested = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
            (
                parse(&nested(MAX_EXPR_DEPTH - 1)).map(|_| ()),
                parse(&nested(MAX_EXPR_DEPTH + 1)).map(|_| ()),
            )
        });
        assert!(inside.is_ok());
        assert!(outside.unwrap_err().message.contains("nested too deeply"));
    }

    #[test]
    fn test_nested_predicates_and_arguments_limited() {
        let errors = with_big_stack(|| {
            let predicates = format!("{}1{}", "a[".repeat(1000), "]".repeat(1000));
            let calls = format!("{}1{}", "count(".repeat(1000), ")".repeat(1000));
            [predicates, calls].map(|input| parse(&input).unwrap_err().message)
        });
        for message in errors {
            assert!(message.contains("nested too deeply"), "{message}");
        }
    }

    #[test]
    fn test_operator_chains_limited() {
        let sum = vec!["1"; 300].join(" + ");
        assert!(parse(&sum).unwrap_err().message.contains("nested too deeply"));
        let negated = format!("{}1", "-".repeat(300));
        assert!(parse(&negated).unwrap_err().message.contains("nested too deeply"));
        assert!(parse(&vec!["a"; 100].join(" | ")).is_ok());
    }

    #[test]
    fn test_token_limit() {
        let long = vec!["a"; MAX_EXPR_TOKENS].join("/");
        assert!(parse(&long).unwrap_err().message.contains("tokens"));
    }
}
