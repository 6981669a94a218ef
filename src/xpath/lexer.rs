//! `XPath` 1.0 expression tokenizer.
//!
//! This module implements a lexer for `XPath` 1.0 expressions as specified in
//! <https://www.w3.org/TR/xpath-10/#exprlex>. The lexer converts an `XPath`
//! expression string into a sequence of [`Token`]s that can be consumed by
//! the parser.
//!
//! # Disambiguation Rules
//!
//! Section 3.7 makes the meaning of some tokens depend on the token before
//! them. The lexer applies these rules as it goes:
//!
//! - If there is a preceding token and it is not one of `@`, `::`, `(`,
//!   `[`, `,` or an operator, then `*` is the multiply operator and an
//!   `NCName` is an operator name (`and`, `or`, `mod`, `div`).
//! - Otherwise a name followed by `(` is a function name or node type, a
//!   name followed by `::` is an axis name, and anything else is a name test.

use std::fmt;

use crate::parser::input::{is_name_char, is_name_start_char};

/// A malformed expression: what is wrong and where (0-based character
/// offset into the expression).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    /// What was found.
    pub message: String,
    /// Character offset of the offending token.
    pub position: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at position {}", self.message, self.position)
    }
}

impl std::error::Error for SyntaxError {}

/// The set of node type names recognized as node type tests.
const NODE_TYPE_NAMES: &[&str] = &["comment", "text", "processing-instruction", "node"];

/// A token produced by the `XPath` lexer.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Dot,
    DotDot,
    At,
    Comma,
    ColonColon,
    Slash,
    DoubleSlash,
    Pipe,
    Plus,
    Minus,
    Equal,
    NotEqual,
    LessThan,
    LessThanEqual,
    GreaterThan,
    GreaterThanEqual,
    And,
    Or,
    Mod,
    Div,
    /// `*` as the multiplication operator.
    Multiply,
    /// A numeric literal (e.g., `42`, `3.5`, `.5`).
    Number(f64),
    /// A string literal without its quotes.
    Literal(String),
    /// A name test: `*`, `prefix:*` or a `QName`.
    NameTest(String),
    /// A variable reference; the name without `$`.
    VariableReference(String),
    /// A name that appeared before `(`.
    FunctionName(String),
    /// `node`, `text`, `comment` or `processing-instruction` before `(`.
    NodeType(String),
    /// A name that appeared before `::`.
    AxisName(String),
}

impl Token {
    /// Whether a `*` or `NCName` after this token is an operator.
    fn ends_operand(&self) -> bool {
        !matches!(
            self,
            Self::At
                | Self::ColonColon
                | Self::LeftParen
                | Self::LeftBracket
                | Self::Comma
                | Self::And
                | Self::Or
                | Self::Mod
                | Self::Div
                | Self::Multiply
                | Self::Slash
                | Self::DoubleSlash
                | Self::Pipe
                | Self::Plus
                | Self::Minus
                | Self::Equal
                | Self::NotEqual
                | Self::LessThan
                | Self::LessThanEqual
                | Self::GreaterThan
                | Self::GreaterThanEqual
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LeftParen => f.write_str("("),
            Self::RightParen => f.write_str(")"),
            Self::LeftBracket => f.write_str("["),
            Self::RightBracket => f.write_str("]"),
            Self::Dot => f.write_str("."),
            Self::DotDot => f.write_str(".."),
            Self::At => f.write_str("@"),
            Self::Comma => f.write_str(","),
            Self::ColonColon => f.write_str("::"),
            Self::Slash => f.write_str("/"),
            Self::DoubleSlash => f.write_str("//"),
            Self::Pipe => f.write_str("|"),
            Self::Plus => f.write_str("+"),
            Self::Minus => f.write_str("-"),
            Self::Multiply => f.write_str("*"),
            Self::Equal => f.write_str("="),
            Self::NotEqual => f.write_str("!="),
            Self::LessThan => f.write_str("<"),
            Self::LessThanEqual => f.write_str("<="),
            Self::GreaterThan => f.write_str(">"),
            Self::GreaterThanEqual => f.write_str(">="),
            Self::And => f.write_str("and"),
            Self::Or => f.write_str("or"),
            Self::Mod => f.write_str("mod"),
            Self::Div => f.write_str("div"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Literal(s) => write!(f, "\"{s}\""),
            Self::NameTest(s) | Self::FunctionName(s) | Self::NodeType(s) | Self::AxisName(s) => {
                f.write_str(s)
            }
            Self::VariableReference(s) => write!(f, "${s}"),
        }
    }
}

/// A token and the character offset it starts at.
pub type Spanned = (Token, usize);

/// `XPath` 1.0 expression tokenizer.
pub struct Lexer {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Spanned>,
}

impl Lexer {
    /// Creates a new lexer for the given `XPath` expression string.
    #[must_use]
    pub fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            tokens: Vec::new(),
        }
    }

    /// Tokenizes the entire input expression.
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError`] for a character outside the `XPath` token set,
    /// an unterminated literal or a malformed operator.
    pub fn tokenize(mut self) -> Result<Vec<Spanned>, SyntaxError> {
        loop {
            self.skip_whitespace();
            let Some(ch) = self.peek() else {
                return Ok(self.tokens);
            };
            let start = self.pos;
            let token = self.next_token(ch)?;
            self.tokens.push((token, start));
        }
    }

    fn next_token(&mut self, ch: char) -> Result<Token, SyntaxError> {
        let single = match ch {
            '(' => Some(Token::LeftParen),
            ')' => Some(Token::RightParen),
            '[' => Some(Token::LeftBracket),
            ']' => Some(Token::RightBracket),
            '@' => Some(Token::At),
            ',' => Some(Token::Comma),
            '|' => Some(Token::Pipe),
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '=' => Some(Token::Equal),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(token);
        }

        match ch {
            '*' => {
                self.pos += 1;
                Ok(if self.preceding_ends_operand() {
                    Token::Multiply
                } else {
                    Token::NameTest("*".to_string())
                })
            }
            '.' => Ok(self.read_dot_or_number()),
            '/' => Ok(self.read_pair('/', Token::Slash, Token::DoubleSlash)),
            '<' => Ok(self.read_pair('=', Token::LessThan, Token::LessThanEqual)),
            '>' => Ok(self.read_pair('=', Token::GreaterThan, Token::GreaterThanEqual)),
            ':' => {
                if self.peek_at(1) == Some(':') {
                    self.pos += 2;
                    Ok(Token::ColonColon)
                } else {
                    Err(self.error("unexpected ':'"))
                }
            }
            '!' => {
                if self.peek_at(1) == Some('=') {
                    self.pos += 2;
                    Ok(Token::NotEqual)
                } else {
                    Err(self.error("expected '=' after '!'"))
                }
            }
            '"' | '\'' => self.read_string_literal(ch),
            '$' => self.read_variable_reference(),
            '0'..='9' => Ok(self.read_number()),
            _ if is_name_start_char(ch) => self.read_name(),
            _ => Err(self.error(format!("illegal character '{ch}'"))),
        }
    }

    /// Reads `.`, `..` or a number starting with `.`.
    fn read_dot_or_number(&mut self) -> Token {
        match self.peek_at(1) {
            Some('.') => {
                self.pos += 2;
                Token::DotDot
            }
            Some(c) if c.is_ascii_digit() => self.read_number(),
            _ => {
                self.pos += 1;
                Token::Dot
            }
        }
    }

    /// Reads a one-character token, or the two-character one when the next
    /// character is `second`.
    fn read_pair(&mut self, second: char, one: Token, two: Token) -> Token {
        if self.peek_at(1) == Some(second) {
            self.pos += 2;
            two
        } else {
            self.pos += 1;
            one
        }
    }

    /// See `XPath` 1.0 section 3.7: `Literal ::= '"' [^"]* '"' | "'" [^']* "'"`.
    fn read_string_literal(&mut self, quote: char) -> Result<Token, SyntaxError> {
        let start = self.pos;
        self.pos += 1;
        let content_start = self.pos;
        while self.peek().is_some_and(|c| c != quote) {
            self.pos += 1;
        }
        if self.peek().is_none() {
            return Err(SyntaxError {
                message: "unterminated string literal".to_string(),
                position: start,
            });
        }
        let content = self.chars[content_start..self.pos].iter().collect();
        self.pos += 1;
        Ok(Token::Literal(content))
    }

    fn read_variable_reference(&mut self) -> Result<Token, SyntaxError> {
        self.pos += 1;
        if !self.peek().is_some_and(is_name_start_char) {
            return Err(self.error("expected a variable name after '$'"));
        }
        let name = self.read_qname();
        Ok(Token::VariableReference(name))
    }

    /// `Number ::= Digits ('.' Digits?)? | '.' Digits`
    fn read_number(&mut self) -> Token {
        let start = self.pos;
        self.skip_while(|c| c.is_ascii_digit());
        if self.peek() == Some('.') {
            self.pos += 1;
            self.skip_while(|c| c.is_ascii_digit());
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        // Only digits and one dot, so the parse cannot fail except for "."
        Token::Number(text.parse().unwrap_or(f64::NAN))
    }

    /// Reads an `NCName` plus an optional `:NCName` or `:*`.
    fn read_name(&mut self) -> Result<Token, SyntaxError> {
        let start = self.pos;
        if self.preceding_ends_operand() {
            let name = self.read_ncname();
            return match name.as_str() {
                "and" => Ok(Token::And),
                "or" => Ok(Token::Or),
                "mod" => Ok(Token::Mod),
                "div" => Ok(Token::Div),
                _ => Err(SyntaxError {
                    message: format!("unexpected name '{name}', expected an operator"),
                    position: start,
                }),
            };
        }

        let name = self.read_qname();
        if name.ends_with(":*") {
            return Ok(Token::NameTest(name));
        }

        let after = self.chars[self.pos..]
            .iter()
            .copied()
            .find(|c| !c.is_whitespace());
        let after_two = {
            let mut rest = self.chars[self.pos..]
                .iter()
                .copied()
                .skip_while(|c| c.is_whitespace());
            (rest.next(), rest.next())
        };
        Ok(match after {
            Some('(') if NODE_TYPE_NAMES.contains(&name.as_str()) => Token::NodeType(name),
            Some('(') => Token::FunctionName(name),
            Some(':') if after_two == (Some(':'), Some(':')) => Token::AxisName(name),
            _ => Token::NameTest(name),
        })
    }

    fn read_ncname(&mut self) -> String {
        let start = self.pos;
        self.pos += 1;
        self.skip_while(|c| c != ':' && is_name_char(c));
        self.chars[start..self.pos].iter().collect()
    }

    /// `QName ::= (NCName ':')? NCName`, with `NCName ':' '*'` allowed too.
    fn read_qname(&mut self) -> String {
        let mut name = self.read_ncname();
        if self.peek() == Some(':') {
            match self.peek_at(1) {
                Some('*') => {
                    self.pos += 2;
                    name.push_str(":*");
                }
                Some(c) if c != ':' && is_name_start_char(c) => {
                    self.pos += 1;
                    name.push(':');
                    name.push_str(&self.read_ncname());
                }
                _ => {}
            }
        }
        name
    }

    fn preceding_ends_operand(&self) -> bool {
        self.tokens.last().is_some_and(|(t, _)| t.ends_operand())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn skip_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
    }

    /// `ExprWhitespace ::= S`
    fn skip_whitespace(&mut self) {
        self.skip_while(|c| matches!(c, ' ' | '\t' | '\r' | '\n'));
    }

    fn error(&self, message: impl Into<String>) -> SyntaxError {
        SyntaxError {
            message: message.into(),
            position: self.pos,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokenize(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|(t, _)| t)
            .collect()
    }

    fn name(s: &str) -> Token {
        Token::NameTest(s.to_string())
    }

    #[test]
    fn test_tokenize_abbreviated_path() {
        assert_eq!(
            tokenize("//bookstore/book[@lang]"),
            vec![
                Token::DoubleSlash,
                name("bookstore"),
                Token::Slash,
                name("book"),
                Token::LeftBracket,
                Token::At,
                name("lang"),
                Token::RightBracket,
            ]
        );
    }

    #[test]
    fn test_star_is_name_test_or_multiply_by_context() {
        assert_eq!(tokenize("*"), vec![name("*")]);
        assert_eq!(
            tokenize("2 * 3"),
            vec![Token::Number(2.0), Token::Multiply, Token::Number(3.0)]
        );
        assert_eq!(
            tokenize("a/*"),
            vec![name("a"), Token::Slash, name("*")]
        );
        assert_eq!(
            tokenize("(*)*2"),
            vec![
                Token::LeftParen,
                name("*"),
                Token::RightParen,
                Token::Multiply,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_operator_names_after_operand() {
        assert_eq!(
            tokenize("div div div"),
            vec![name("div"), Token::Div, name("div")]
        );
        assert_eq!(
            tokenize("a and b or c mod 2"),
            vec![
                name("a"),
                Token::And,
                name("b"),
                Token::Or,
                name("c"),
                Token::Mod,
                Token::Number(2.0),
            ]
        );
    }

    #[test]
    fn test_function_node_type_and_axis() {
        assert_eq!(
            tokenize("count (child::text())"),
            vec![
                Token::FunctionName("count".into()),
                Token::LeftParen,
                Token::AxisName("child".into()),
                Token::ColonColon,
                Token::NodeType("text".into()),
                Token::LeftParen,
                Token::RightParen,
                Token::RightParen,
            ]
        );
    }

    #[test]
    fn test_qnames_and_prefix_wildcard() {
        assert_eq!(
            tokenize("bk:title | bk:*"),
            vec![name("bk:title"), Token::Pipe, name("bk:*")]
        );
        assert_eq!(
            tokenize("$ns:var"),
            vec![Token::VariableReference("ns:var".into())]
        );
    }

    #[test]
    fn test_numbers_literals_and_dots() {
        assert_eq!(
            tokenize(".5 + 1. - 'it''s'"),
            vec![
                Token::Number(0.5),
                Token::Plus,
                Token::Number(1.0),
                Token::Minus,
                Token::Literal("it".into()),
                Token::Literal("s".into()),
            ]
        );
        assert_eq!(
            tokenize("../."),
            vec![Token::DotDot, Token::Slash, Token::Dot]
        );
    }

    #[test]
    fn test_comparison_operators() {
        assert_eq!(
            tokenize("1<=2>=3!=4<5>6=7"),
            vec![
                Token::Number(1.0),
                Token::LessThanEqual,
                Token::Number(2.0),
                Token::GreaterThanEqual,
                Token::Number(3.0),
                Token::NotEqual,
                Token::Number(4.0),
                Token::LessThan,
                Token::Number(5.0),
                Token::GreaterThan,
                Token::Number(6.0),
                Token::Equal,
                Token::Number(7.0),
            ]
        );
    }

    #[test]
    fn test_non_ascii_names() {
        assert_eq!(tokenize("//café"), vec![Token::DoubleSlash, name("café")]);
    }

    #[test]
    fn test_illegal_character_position() {
        let err = Lexer::new("invalid\\xpath").tokenize().unwrap_err();
        assert_eq!(err.to_string(), "illegal character '\\' at position 7");
    }

    #[test]
    fn test_unterminated_literal() {
        let err = Lexer::new("a = 'open").tokenize().unwrap_err();
        assert_eq!(err.position, 4);
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn test_name_after_operand_must_be_operator() {
        let err = Lexer::new("a b").tokenize().unwrap_err();
        assert!(err.message.contains("unexpected name 'b'"));
    }
}
