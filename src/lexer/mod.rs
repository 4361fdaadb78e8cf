//! Lexer implementation using Pest.

mod token;

pub use token::{Keyword, Operator, Position, Separator, Token, TokenKind, TokenStream};

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;

use crate::result::ParseError;
use crate::value::{Value, ValueType};

#[derive(Parser)]
#[grammar = "lexer/grammar.pest"]
pub(crate) struct ScriptLexer;

/// Split script text into tokens, ending with an EOF token.
///
/// # Example
///
/// ```
/// use emberscript::lexer::{tokenize, TokenKind};
///
/// let tokens = tokenize("int x = 5;")?;
/// assert_eq!(tokens.len(), 6);
/// assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
/// # Ok::<(), emberscript::ParseError>(())
/// ```
pub fn tokenize(input: &str) -> Result<Vec<Token>, ParseError> {
    let pairs = ScriptLexer::parse(Rule::tokens, input)?;

    let mut tokens = Vec::new();
    for pair in pairs.flatten() {
        let (line, column) = pair.as_span().start_pos().line_col();
        let position = Position::new(line, column);

        let kind = match pair.as_rule() {
            Rule::number if prefix_minus(&tokens) => {
                // Fold the sign into the literal so the most negative value parses.
                let minus = tokens.pop().map_or(position, |t| t.position);
                let kind = parse_number(&format!("-{}", pair.as_str()), minus)?;
                tokens.push(Token::new(kind, minus));
                continue;
            }
            Rule::number => parse_number(pair.as_str(), position)?,
            Rule::string => {
                let inner = pair
                    .into_inner()
                    .next()
                    .map(|p| p.as_str())
                    .unwrap_or_default();
                TokenKind::Literal(Value::String(unescape(inner)))
            }
            Rule::word => classify_word(pair.as_str()),
            Rule::operator => operator_kind(&pair, position)?,
            Rule::separator => separator_kind(&pair, position)?,
            Rule::EOI => TokenKind::Eof,
            _ => continue,
        };

        tokens.push(Token::new(kind, position));
    }

    Ok(tokens)
}

/// Tokenize into a ready-to-parse [`TokenStream`].
pub fn token_stream(input: &str) -> Result<TokenStream, ParseError> {
    Ok(TokenStream::new(tokenize(input)?))
}

fn classify_word(word: &str) -> TokenKind {
    if let Some(keyword) = Keyword::from_word(word) {
        return TokenKind::Keyword(keyword);
    }
    if let Some(ty) = ValueType::from_keyword(word) {
        return TokenKind::Type(ty);
    }
    match word {
        "true" => TokenKind::Literal(Value::Bool(true)),
        "false" => TokenKind::Literal(Value::Bool(false)),
        "null" => TokenKind::Literal(Value::Null),
        _ => TokenKind::Identifier(word.to_string()),
    }
}

/// Whether the last token is a `-` that cannot be a binary operator.
fn prefix_minus(tokens: &[Token]) -> bool {
    let [.., before, last] = tokens else {
        return matches!(tokens, [Token { kind: TokenKind::Operator(Operator::Minus), .. }]);
    };
    if last.kind != TokenKind::Operator(Operator::Minus) {
        return false;
    }
    !matches!(
        before.kind,
        TokenKind::Literal(_)
            | TokenKind::Identifier(_)
            | TokenKind::Separator(Separator::CloseParen)
            | TokenKind::Operator(Operator::Increment | Operator::Decrement)
    )
}

fn parse_number(text: &str, position: Position) -> Result<TokenKind, ParseError> {
    let invalid = || position.error(format!("Invalid numeric literal: {}", text));

    let (digits, suffix) = match text.chars().last() {
        Some(c) if c.is_ascii_alphabetic() => (&text[..text.len() - 1], Some(c.to_ascii_lowercase())),
        _ => (text, None),
    };
    let is_fractional = digits.contains('.');

    let value = match (suffix, is_fractional) {
        (Some('f'), _) => Value::Float(digits.parse().map_err(|_| invalid())?),
        (Some('d'), _) | (None, true) => Value::Double(digits.parse().map_err(|_| invalid())?),
        (Some('l'), false) => Value::Long(digits.parse().map_err(|_| invalid())?),
        (None, false) => Value::Int(digits.parse().map_err(|_| invalid())?),
        _ => return Err(invalid()),
    };

    Ok(TokenKind::Literal(value))
}

fn operator_kind(pair: &Pair<Rule>, position: Position) -> Result<TokenKind, ParseError> {
    Operator::from_symbol(pair.as_str())
        .map(TokenKind::Operator)
        .ok_or_else(|| position.error(format!("Unknown operator: {}", pair.as_str())))
}

fn separator_kind(pair: &Pair<Rule>, position: Position) -> Result<TokenKind, ParseError> {
    Separator::from_symbol(pair.as_str())
        .map(TokenKind::Separator)
        .ok_or_else(|| position.error(format!("Unknown separator: {}", pair.as_str())))
}

fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            result.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some('r') => result.push('\r'),
            Some('0') => result.push('\0'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_global_declaration_tokens() {
        assert_eq!(
            kinds("global int x = 5;"),
            vec![
                TokenKind::Keyword(Keyword::Global),
                TokenKind::Type(ValueType::Int),
                TokenKind::Identifier("x".to_string()),
                TokenKind::Operator(Operator::Assignment),
                TokenKind::Literal(Value::Int(5)),
                TokenKind::Separator(Separator::Semicolon),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_numeric_suffixes() {
        assert_eq!(
            kinds("1 2L 1.5 1.5f 3d"),
            vec![
                TokenKind::Literal(Value::Int(1)),
                TokenKind::Literal(Value::Long(2)),
                TokenKind::Literal(Value::Double(1.5)),
                TokenKind::Literal(Value::Float(1.5)),
                TokenKind::Literal(Value::Double(3.0)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_string_escapes() {
        assert_eq!(
            kinds(r#""a\"b\n""#),
            vec![
                TokenKind::Literal(Value::String("a\"b\n".to_string())),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comments_and_positions() {
        let tokens = tokenize("// header\nint /* inline */ y;").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Type(ValueType::Int));
        assert_eq!(tokens[0].position, Position::new(2, 1));
        assert_eq!(tokens[1].position, Position::new(2, 18));
    }

    #[test]
    fn test_compound_operators() {
        assert_eq!(
            kinds("a += b++ <= !c"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Operator(Operator::PlusEquals),
                TokenKind::Identifier("b".to_string()),
                TokenKind::Operator(Operator::Increment),
                TokenKind::Operator(Operator::IsLessThanOrEqual),
                TokenKind::Operator(Operator::Not),
                TokenKind::Identifier("c".to_string()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_invalid_character_is_parse_error() {
        let err = tokenize("int x = 5 $ 3;").unwrap_err();
        assert_eq!(err.line, 1);
    }

    #[test]
    fn test_int_literal_overflow() {
        assert!(tokenize("99999999999").is_err());
        assert!(tokenize("2147483648").is_err());
    }

    #[test]
    fn test_most_negative_literals() {
        assert_eq!(
            kinds("-2147483648; -9223372036854775808L"),
            vec![
                TokenKind::Literal(Value::Int(i32::MIN)),
                TokenKind::Separator(Separator::Semicolon),
                TokenKind::Literal(Value::Long(i64::MIN)),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_binary_minus_not_folded() {
        assert_eq!(
            kinds("a -1 (2)-3"),
            vec![
                TokenKind::Identifier("a".to_string()),
                TokenKind::Operator(Operator::Minus),
                TokenKind::Literal(Value::Int(1)),
                TokenKind::Separator(Separator::OpenParen),
                TokenKind::Literal(Value::Int(2)),
                TokenKind::Separator(Separator::CloseParen),
                TokenKind::Operator(Operator::Minus),
                TokenKind::Literal(Value::Int(3)),
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("= -1"),
            vec![
                TokenKind::Operator(Operator::Assignment),
                TokenKind::Literal(Value::Int(-1)),
                TokenKind::Eof,
            ]
        );
    }
}
