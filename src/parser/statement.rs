//! Statement parser for function bodies.

use crate::lexer::{Keyword, Operator, Separator, TokenKind, TokenStream};
use crate::parser::ast::{Block, Statement};
use crate::parser::expression::{parse_next_expression, parse_next_getter_expression};
use crate::parser::CompilationContext;
use crate::result::ParseError;
use crate::value::ValueType;

/// Parse statements until the closing brace of the current block.
///
/// The opening brace must already be consumed; the closing brace is consumed
/// here.
pub fn parse_block_body(
    tokens: &mut TokenStream,
    context: &CompilationContext,
) -> Result<Block, ParseError> {
    let mut statements = Vec::new();

    loop {
        if tokens.test_and_advance_separator(Separator::CloseBrace) {
            return Ok(statements);
        }
        if tokens.at_end() {
            return Err(tokens.current().error("Expected '}' before end of script"));
        }
        if let Some(statement) = parse_next_statement(tokens, context)? {
            statements.push(statement);
        }
    }
}

/// Parse one statement. Empty statements (`;`) yield `None`.
pub fn parse_next_statement(
    tokens: &mut TokenStream,
    context: &CompilationContext,
) -> Result<Option<Statement>, ParseError> {
    let token = tokens.current().clone();

    match token.kind {
        TokenKind::Separator(Separator::Semicolon) => {
            tokens.advance();
            Ok(None)
        }
        TokenKind::Separator(Separator::OpenBrace) => {
            tokens.advance();
            Ok(Some(Statement::Block(parse_block_body(tokens, context)?)))
        }
        TokenKind::Keyword(keyword) => parse_keyword_statement(keyword, tokens, context).map(Some),
        TokenKind::Type(value_type) => parse_declaration(value_type, tokens, context).map(Some),
        TokenKind::Literal(_) | TokenKind::Identifier(_) | TokenKind::Operator(_) => {
            let expression = parse_next_expression(tokens, context)?;
            tokens.expect_separator(Separator::Semicolon)?;
            Ok(Some(Statement::Expression(expression)))
        }
        TokenKind::Eof => Err(token.error("Unexpected end of script")),
        TokenKind::Separator(_) => Err(token.error(format!("Statement cannot begin with {}", token))),
    }
}

fn parse_declaration(
    value_type: ValueType,
    tokens: &mut TokenStream,
    context: &CompilationContext,
) -> Result<Statement, ParseError> {
    let type_token = tokens.next_token();
    if value_type == ValueType::Void {
        return Err(type_token.error("Cannot declare a variable of type void"));
    }

    let (name, position) = tokens.read_identifier()?;
    if context.constant(&name).is_some() {
        return Err(position.error(format!("Identifier {} already declared as a constant", name)));
    }

    let initializer = if tokens.test_and_advance_operator(Operator::Assignment) {
        Some(parse_next_getter_expression(tokens, context)?)
    } else {
        None
    };
    tokens.expect_separator(Separator::Semicolon)?;

    Ok(Statement::Declaration {
        value_type,
        name,
        initializer,
        position,
    })
}

fn parse_required_statement(
    tokens: &mut TokenStream,
    context: &CompilationContext,
) -> Result<Statement, ParseError> {
    let token = tokens.current().clone();
    parse_next_statement(tokens, context)?
        .ok_or_else(|| token.error("Expected a statement, found an empty statement"))
}

fn parse_keyword_statement(
    keyword: Keyword,
    tokens: &mut TokenStream,
    context: &CompilationContext,
) -> Result<Statement, ParseError> {
    let keyword_token = tokens.next_token();

    match keyword {
        Keyword::If => {
            tokens.expect_separator(Separator::OpenParen)?;
            let condition = parse_next_getter_expression(tokens, context)?;
            tokens.expect_separator(Separator::CloseParen)?;

            let then_branch = Box::new(parse_required_statement(tokens, context)?);
            let else_branch = if tokens.test_and_advance_keyword(Keyword::Else) {
                Some(Box::new(parse_required_statement(tokens, context)?))
            } else {
                None
            };

            Ok(Statement::If {
                condition,
                then_branch,
                else_branch,
            })
        }
        Keyword::While => {
            tokens.expect_separator(Separator::OpenParen)?;
            let condition = parse_next_getter_expression(tokens, context)?;
            tokens.expect_separator(Separator::CloseParen)?;
            let body = Box::new(parse_required_statement(tokens, context)?);

            Ok(Statement::While { condition, body })
        }
        Keyword::For => {
            tokens.expect_separator(Separator::OpenParen)?;

            // The initializer statement consumes its own semicolon.
            let initializer = parse_next_statement(tokens, context)?.map(Box::new);
            if let Some(init) = &initializer {
                if !matches!(**init, Statement::Declaration { .. } | Statement::Expression(_)) {
                    return Err(keyword_token.error("For initializer must be a declaration or expression"));
                }
            }

            let condition = if tokens.test_separator(Separator::Semicolon) {
                None
            } else {
                Some(parse_next_getter_expression(tokens, context)?)
            };
            tokens.expect_separator(Separator::Semicolon)?;

            let step = if tokens.test_separator(Separator::CloseParen) {
                None
            } else {
                Some(parse_next_expression(tokens, context)?)
            };
            tokens.expect_separator(Separator::CloseParen)?;

            let body = Box::new(parse_required_statement(tokens, context)?);

            Ok(Statement::For {
                initializer,
                condition,
                step,
                body,
            })
        }
        Keyword::Return => {
            let value = if tokens.test_separator(Separator::Semicolon) {
                None
            } else {
                Some(parse_next_getter_expression(tokens, context)?)
            };
            tokens.expect_separator(Separator::Semicolon)?;

            Ok(Statement::Return {
                value,
                position: keyword_token.position,
            })
        }
        Keyword::Break => {
            tokens.expect_separator(Separator::Semicolon)?;
            Ok(Statement::Break)
        }
        Keyword::Continue => {
            tokens.expect_separator(Separator::Semicolon)?;
            Ok(Statement::Continue)
        }
        Keyword::Else => Err(keyword_token.error("'else' without a matching 'if'")),
        Keyword::Global | Keyword::Extern | Keyword::Const => Err(keyword_token.error(format!(
            "{} is only valid at global scope",
            keyword_token
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token_stream;
    use crate::parser::ast::Expression;
    use crate::value::Value;

    fn parse_body(input: &str) -> Result<Block, ParseError> {
        let mut tokens = token_stream(input)?;
        tokens.expect_separator(Separator::OpenBrace)?;
        parse_block_body(&mut tokens, &CompilationContext::new())
    }

    #[test]
    fn test_declaration_and_return() {
        let block = parse_body("{ int x = 5; return x; }").unwrap();
        assert_eq!(block.len(), 2);
        assert!(matches!(
            &block[0],
            Statement::Declaration { value_type: ValueType::Int, initializer: Some(Expression::Literal(Value::Int(5))), .. }
        ));
        assert!(matches!(&block[1], Statement::Return { value: Some(_), .. }));
    }

    #[test]
    fn test_for_loop_parts() {
        let block = parse_body("{ for (int i = 0; i < 3; i++) { } }").unwrap();
        let Statement::For { initializer, condition, step, .. } = &block[0] else {
            panic!("expected for loop");
        };
        assert!(initializer.is_some());
        assert!(condition.is_some());
        assert!(step.is_some());
    }

    #[test]
    fn test_infinite_for_loop() {
        let block = parse_body("{ for (;;) { break; } }").unwrap();
        assert!(matches!(
            &block[0],
            Statement::For { initializer: None, condition: None, step: None, .. }
        ));
    }

    #[test]
    fn test_else_chain() {
        let block = parse_body("{ if (a) x = 1; else if (b) x = 2; else x = 3; }").unwrap();
        let Statement::If { else_branch: Some(else_branch), .. } = &block[0] else {
            panic!("expected if");
        };
        assert!(matches!(**else_branch, Statement::If { else_branch: Some(_), .. }));
    }

    #[test]
    fn test_empty_statements_are_skipped() {
        assert_eq!(parse_body("{ ;; }").unwrap().len(), 0);
    }

    #[test]
    fn test_unterminated_block() {
        let err = parse_body("{ int x = 1;").unwrap_err();
        assert!(err.message.contains("'}'"));
    }

    #[test]
    fn test_void_local_rejected() {
        assert!(parse_body("{ void x; }").is_err());
    }

    #[test]
    fn test_global_keyword_rejected_in_body() {
        let err = parse_body("{ global int x; }").unwrap_err();
        assert!(err.message.contains("global scope"));
    }
}
