//! Token definitions and the cursor the parser walks them with.

use std::fmt;

use crate::result::ParseError;
use crate::value::{Value, ValueType};

/// A 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    /// Line number.
    pub line: usize,
    /// Column number.
    pub column: usize,
}

impl Position {
    /// Create a position.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Build a parse error located here.
    pub fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, self.column, message)
    }
}

/// Reserved words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `if`
    If,
    /// `else`
    Else,
    /// `while`
    While,
    /// `for`
    For,
    /// `return`
    Return,
    /// `break`
    Break,
    /// `continue`
    Continue,
    /// `global`
    Global,
    /// `extern`
    Extern,
    /// `const`
    Const,
}

impl Keyword {
    pub(crate) fn from_word(word: &str) -> Option<Self> {
        match word {
            "if" => Some(Keyword::If),
            "else" => Some(Keyword::Else),
            "while" => Some(Keyword::While),
            "for" => Some(Keyword::For),
            "return" => Some(Keyword::Return),
            "break" => Some(Keyword::Break),
            "continue" => Some(Keyword::Continue),
            "global" => Some(Keyword::Global),
            "extern" => Some(Keyword::Extern),
            "const" => Some(Keyword::Const),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Keyword::If => "if",
            Keyword::Else => "else",
            Keyword::While => "while",
            Keyword::For => "for",
            Keyword::Return => "return",
            Keyword::Break => "break",
            Keyword::Continue => "continue",
            Keyword::Global => "global",
            Keyword::Extern => "extern",
            Keyword::Const => "const",
        }
    }
}

/// Operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// `=`
    Assignment,
    /// `+=`
    PlusEquals,
    /// `-=`
    MinusEquals,
    /// `*=`
    TimesEquals,
    /// `/=`
    DivideEquals,
    /// `%=`
    ModuloEquals,
    /// `++`
    Increment,
    /// `--`
    Decrement,
    /// `==`
    IsEqual,
    /// `!=`
    IsNotEqual,
    /// `<`
    IsLessThan,
    /// `<=`
    IsLessThanOrEqual,
    /// `>`
    IsGreaterThan,
    /// `>=`
    IsGreaterThanOrEqual,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `!`
    Not,
    /// `+`
    Plus,
    /// `-`
    Minus,
    /// `*`
    Times,
    /// `/`
    Divide,
    /// `%`
    Modulo,
}

impl Operator {
    pub(crate) fn from_symbol(symbol: &str) -> Option<Self> {
        let op = match symbol {
            "=" => Operator::Assignment,
            "+=" => Operator::PlusEquals,
            "-=" => Operator::MinusEquals,
            "*=" => Operator::TimesEquals,
            "/=" => Operator::DivideEquals,
            "%=" => Operator::ModuloEquals,
            "++" => Operator::Increment,
            "--" => Operator::Decrement,
            "==" => Operator::IsEqual,
            "!=" => Operator::IsNotEqual,
            "<" => Operator::IsLessThan,
            "<=" => Operator::IsLessThanOrEqual,
            ">" => Operator::IsGreaterThan,
            ">=" => Operator::IsGreaterThanOrEqual,
            "&&" => Operator::And,
            "||" => Operator::Or,
            "!" => Operator::Not,
            "+" => Operator::Plus,
            "-" => Operator::Minus,
            "*" => Operator::Times,
            "/" => Operator::Divide,
            "%" => Operator::Modulo,
            _ => return None,
        };
        Some(op)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Operator::Assignment => "=",
            Operator::PlusEquals => "+=",
            Operator::MinusEquals => "-=",
            Operator::TimesEquals => "*=",
            Operator::DivideEquals => "/=",
            Operator::ModuloEquals => "%=",
            Operator::Increment => "++",
            Operator::Decrement => "--",
            Operator::IsEqual => "==",
            Operator::IsNotEqual => "!=",
            Operator::IsLessThan => "<",
            Operator::IsLessThanOrEqual => "<=",
            Operator::IsGreaterThan => ">",
            Operator::IsGreaterThanOrEqual => ">=",
            Operator::And => "&&",
            Operator::Or => "||",
            Operator::Not => "!",
            Operator::Plus => "+",
            Operator::Minus => "-",
            Operator::Times => "*",
            Operator::Divide => "/",
            Operator::Modulo => "%",
        }
    }
}

/// Punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    /// `;`
    Semicolon,
    /// `,`
    Comma,
    /// `(`
    OpenParen,
    /// `)`
    CloseParen,
    /// `{`
    OpenBrace,
    /// `}`
    CloseBrace,
}

impl Separator {
    pub(crate) fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            ";" => Some(Separator::Semicolon),
            "," => Some(Separator::Comma),
            "(" => Some(Separator::OpenParen),
            ")" => Some(Separator::CloseParen),
            "{" => Some(Separator::OpenBrace),
            "}" => Some(Separator::CloseBrace),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Separator::Semicolon => ";",
            Separator::Comma => ",",
            Separator::OpenParen => "(",
            Separator::CloseParen => ")",
            Separator::OpenBrace => "{",
            Separator::CloseBrace => "}",
        }
    }
}

/// What a token is.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Reserved word.
    Keyword(Keyword),
    /// Type name.
    Type(ValueType),
    /// Any other word.
    Identifier(String),
    /// Literal value.
    Literal(Value),
    /// Operator.
    Operator(Operator),
    /// Punctuation.
    Separator(Separator),
    /// End of the stream.
    Eof,
}

/// A token and where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What the token is.
    pub kind: TokenKind,
    /// Where it starts.
    pub position: Position,
}

impl Token {
    /// Create a token.
    pub fn new(kind: TokenKind, position: Position) -> Self {
        Self { kind, position }
    }

    /// Build a parse error located at this token.
    pub fn error(&self, message: impl Into<String>) -> ParseError {
        self.position.error(message)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TokenKind::Keyword(kw) => write!(f, "keyword '{}'", kw.as_str()),
            TokenKind::Type(ty) => write!(f, "type '{}'", ty),
            TokenKind::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenKind::Literal(Value::String(s)) => write!(f, "literal \"{}\"", s),
            TokenKind::Literal(value) => write!(f, "literal '{}'", value),
            TokenKind::Operator(op) => write!(f, "operator '{}'", op.as_str()),
            TokenKind::Separator(sep) => write!(f, "'{}'", sep.as_str()),
            TokenKind::Eof => f.write_str("end of script"),
        }
    }
}

/// A cursor over a token sequence with the current/advance protocol.
///
/// The stream always ends in an [`TokenKind::Eof`] token, and advancing past
/// it stays on it.
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    index: usize,
}

impl TokenStream {
    /// Wrap a token list, appending an EOF token if it is missing.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
            let position = tokens.last().map(|t| t.position).unwrap_or_default();
            tokens.push(Token::new(TokenKind::Eof, position));
        }
        Self { tokens, index: 0 }
    }

    /// The token under the cursor.
    pub fn current(&self) -> &Token {
        &self.tokens[self.index.min(self.tokens.len() - 1)]
    }

    /// The token `offset` places after the cursor.
    pub fn peek(&self, offset: usize) -> &Token {
        &self.tokens[(self.index + offset).min(self.tokens.len() - 1)]
    }

    /// Whether the cursor sits on the EOF token.
    pub fn at_end(&self) -> bool {
        matches!(self.current().kind, TokenKind::Eof)
    }

    /// Move to the next token.
    pub fn advance(&mut self) {
        if self.index + 1 < self.tokens.len() {
            self.index += 1;
        }
    }

    /// Return the current token and move past it.
    pub fn next_token(&mut self) -> Token {
        let token = self.current().clone();
        self.advance();
        token
    }

    /// Move past the current token, failing if it is EOF.
    pub fn cautious_advance(&mut self) -> Result<(), ParseError> {
        if self.at_end() {
            return Err(self.current().error("Unexpected end of script"));
        }
        self.advance();
        Ok(())
    }

    /// Whether the current token is `separator`.
    pub fn test_separator(&self, separator: Separator) -> bool {
        self.current().kind == TokenKind::Separator(separator)
    }

    /// Whether the current token is `operator`.
    pub fn test_operator(&self, operator: Operator) -> bool {
        self.current().kind == TokenKind::Operator(operator)
    }

    /// Whether the current token is `keyword`.
    pub fn test_keyword(&self, keyword: Keyword) -> bool {
        self.current().kind == TokenKind::Keyword(keyword)
    }

    /// Advance if the current token is `separator`, reporting whether it was.
    pub fn test_and_advance_separator(&mut self, separator: Separator) -> bool {
        let matched = self.test_separator(separator);
        if matched {
            self.advance();
        }
        matched
    }

    /// Advance if the current token is `operator`, reporting whether it was.
    pub fn test_and_advance_operator(&mut self, operator: Operator) -> bool {
        let matched = self.test_operator(operator);
        if matched {
            self.advance();
        }
        matched
    }

    /// Advance if the current token is `keyword`, reporting whether it was.
    pub fn test_and_advance_keyword(&mut self, keyword: Keyword) -> bool {
        let matched = self.test_keyword(keyword);
        if matched {
            self.advance();
        }
        matched
    }

    /// Require `separator` and move past it.
    pub fn expect_separator(&mut self, separator: Separator) -> Result<(), ParseError> {
        if self.test_and_advance_separator(separator) {
            return Ok(());
        }
        Err(self.current().error(format!(
            "Expected '{}' but found {}",
            separator.as_str(),
            self.current()
        )))
    }

    /// Require `operator` and move past it.
    pub fn expect_operator(&mut self, operator: Operator) -> Result<(), ParseError> {
        if self.test_and_advance_operator(operator) {
            return Ok(());
        }
        Err(self.current().error(format!(
            "Expected '{}' but found {}",
            operator.as_str(),
            self.current()
        )))
    }

    /// Require a type token and move past it.
    pub fn read_type(&mut self) -> Result<ValueType, ParseError> {
        match self.current().kind {
            TokenKind::Type(ty) => {
                self.advance();
                Ok(ty)
            }
            _ => Err(self
                .current()
                .error(format!("Expected a type but found {}", self.current()))),
        }
    }

    /// Require an identifier and move past it, returning its name and position.
    pub fn read_identifier(&mut self) -> Result<(String, Position), ParseError> {
        let token = self.current();
        match &token.kind {
            TokenKind::Identifier(name) => {
                let result = (name.clone(), token.position);
                self.advance();
                Ok(result)
            }
            _ => Err(token.error(format!("Expected an identifier but found {}", token))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sep(s: Separator, column: usize) -> Token {
        Token::new(TokenKind::Separator(s), Position::new(1, column))
    }

    #[test]
    fn test_stream_appends_eof() {
        let mut stream = TokenStream::new(vec![sep(Separator::Semicolon, 1)]);
        assert!(!stream.at_end());
        stream.advance();
        assert!(stream.at_end());
        stream.advance();
        assert!(stream.at_end());
    }

    #[test]
    fn test_cautious_advance_fails_at_eof() {
        let mut stream = TokenStream::new(Vec::new());
        assert!(stream.cautious_advance().is_err());
    }

    #[test]
    fn test_expect_separator_reports_found_token() {
        let mut stream = TokenStream::new(vec![sep(Separator::Comma, 7)]);
        let err = stream.expect_separator(Separator::Semicolon).unwrap_err();
        assert_eq!(err.column, 7);
        assert!(err.message.contains("','"));
    }
}
