//! Precedence-climbing expression parser.

use crate::lexer::{Operator, Separator, TokenKind, TokenStream};
use crate::parser::ast::{BinaryOperator, Expression, UnaryOperator};
use crate::parser::CompilationContext;
use crate::result::ParseError;
use crate::value::Value;

/// Parse an expression that only produces a value.
///
/// Used for initializers and conditions, where a top-level assignment or
/// increment is a mistake rather than an intent.
pub fn parse_next_getter_expression(
    tokens: &mut TokenStream,
    context: &CompilationContext,
) -> Result<Expression, ParseError> {
    let position = tokens.current().position;
    let expression = parse_next_expression(tokens, context)?;
    if expression.is_executable() {
        return Err(position.error("Expected a value, found an assignment"));
    }
    Ok(expression)
}

/// Parse any expression, including assignments.
pub fn parse_next_expression(
    tokens: &mut TokenStream,
    context: &CompilationContext,
) -> Result<Expression, ParseError> {
    parse_assignment(tokens, context)
}

fn parse_assignment(
    tokens: &mut TokenStream,
    context: &CompilationContext,
) -> Result<Expression, ParseError> {
    let start = tokens.current().clone();
    let left = parse_binary(tokens, context, 0)?;

    let op = match tokens.current().kind {
        TokenKind::Operator(Operator::Assignment) => None,
        TokenKind::Operator(Operator::PlusEquals) => Some(BinaryOperator::Add),
        TokenKind::Operator(Operator::MinusEquals) => Some(BinaryOperator::Subtract),
        TokenKind::Operator(Operator::TimesEquals) => Some(BinaryOperator::Multiply),
        TokenKind::Operator(Operator::DivideEquals) => Some(BinaryOperator::Divide),
        TokenKind::Operator(Operator::ModuloEquals) => Some(BinaryOperator::Modulo),
        _ => return Ok(left),
    };
    let operator_token = tokens.next_token();

    let (target, position) = match (&start.kind, left) {
        (TokenKind::Identifier(_), Expression::Identifier { name, position }) => (name, position),
        (TokenKind::Identifier(name), Expression::Literal(_)) if context.constant(name).is_some() => {
            return Err(start.error(format!("Cannot assign to constant {}", name)));
        }
        _ => return Err(operator_token.error("Left side of assignment must be a variable")),
    };

    let value = parse_assignment(tokens, context)?;
    Ok(Expression::Assign {
        target,
        op,
        value: Box::new(value),
        position,
    })
}

fn binary_operator(kind: &TokenKind) -> Option<(BinaryOperator, u8)> {
    let TokenKind::Operator(op) = kind else {
        return None;
    };
    let entry = match op {
        Operator::Or => (BinaryOperator::Or, 1),
        Operator::And => (BinaryOperator::And, 2),
        Operator::IsEqual => (BinaryOperator::Equal, 3),
        Operator::IsNotEqual => (BinaryOperator::NotEqual, 3),
        Operator::IsLessThan => (BinaryOperator::Less, 4),
        Operator::IsLessThanOrEqual => (BinaryOperator::LessOrEqual, 4),
        Operator::IsGreaterThan => (BinaryOperator::Greater, 4),
        Operator::IsGreaterThanOrEqual => (BinaryOperator::GreaterOrEqual, 4),
        Operator::Plus => (BinaryOperator::Add, 5),
        Operator::Minus => (BinaryOperator::Subtract, 5),
        Operator::Times => (BinaryOperator::Multiply, 6),
        Operator::Divide => (BinaryOperator::Divide, 6),
        Operator::Modulo => (BinaryOperator::Modulo, 6),
        _ => return None,
    };
    Some(entry)
}

fn parse_binary(
    tokens: &mut TokenStream,
    context: &CompilationContext,
    min_precedence: u8,
) -> Result<Expression, ParseError> {
    let mut left = parse_unary(tokens, context)?;

    while let Some((op, precedence)) = binary_operator(&tokens.current().kind) {
        if precedence <= min_precedence {
            break;
        }
        tokens.advance();
        let right = parse_binary(tokens, context, precedence)?;
        left = Expression::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        };
    }

    Ok(left)
}

fn parse_unary(
    tokens: &mut TokenStream,
    context: &CompilationContext,
) -> Result<Expression, ParseError> {
    let token = tokens.current().clone();
    match token.kind {
        TokenKind::Operator(Operator::Minus) => {
            tokens.advance();
            let operand = parse_unary(tokens, context)?;
            Ok(match operand {
                Expression::Literal(Value::Int(n)) => Expression::Literal(Value::Int(n.wrapping_neg())),
                Expression::Literal(Value::Long(n)) => Expression::Literal(Value::Long(n.wrapping_neg())),
                Expression::Literal(Value::Float(n)) => Expression::Literal(Value::Float(-n)),
                Expression::Literal(Value::Double(n)) => Expression::Literal(Value::Double(-n)),
                other => Expression::Unary {
                    op: UnaryOperator::Negate,
                    operand: Box::new(other),
                },
            })
        }
        TokenKind::Operator(Operator::Not) => {
            tokens.advance();
            let operand = parse_unary(tokens, context)?;
            Ok(Expression::Unary {
                op: UnaryOperator::Not,
                operand: Box::new(operand),
            })
        }
        TokenKind::Operator(op @ (Operator::Increment | Operator::Decrement)) => {
            tokens.advance();
            let (target, position) = tokens.read_identifier()?;
            if context.constant(&target).is_some() {
                return Err(position.error(format!("Cannot modify constant {}", target)));
            }
            Ok(Expression::Increment {
                target,
                delta: if op == Operator::Increment { 1 } else { -1 },
                prefix: true,
                position,
            })
        }
        _ => parse_postfix(tokens, context),
    }
}

fn parse_postfix(
    tokens: &mut TokenStream,
    context: &CompilationContext,
) -> Result<Expression, ParseError> {
    let expression = parse_primary(tokens, context)?;

    let delta = match tokens.current().kind {
        TokenKind::Operator(Operator::Increment) => 1,
        TokenKind::Operator(Operator::Decrement) => -1,
        _ => return Ok(expression),
    };

    match expression {
        Expression::Identifier { name, position } => {
            tokens.advance();
            Ok(Expression::Increment {
                target: name,
                delta,
                prefix: false,
                position,
            })
        }
        _ => Err(tokens
            .current()
            .error("Increment and decrement require a variable")),
    }
}

fn parse_primary(
    tokens: &mut TokenStream,
    context: &CompilationContext,
) -> Result<Expression, ParseError> {
    let token = tokens.next_token();

    match token.kind {
        TokenKind::Literal(value) => Ok(Expression::Literal(value)),
        TokenKind::Identifier(name) => {
            if tokens.test_and_advance_separator(Separator::OpenParen) {
                let arguments = parse_arguments(tokens, context)?;
                return Ok(Expression::Call {
                    name,
                    arguments,
                    position: token.position,
                });
            }
            if let Some(value) = context.constant(&name) {
                return Ok(Expression::Literal(value.clone()));
            }
            Ok(Expression::Identifier {
                name,
                position: token.position,
            })
        }
        TokenKind::Separator(Separator::OpenParen) => {
            let inner = parse_next_expression(tokens, context)?;
            tokens.expect_separator(Separator::CloseParen)?;
            Ok(inner)
        }
        TokenKind::Eof => Err(token.error("Unexpected end of script in expression")),
        _ => Err(token.error(format!("Unexpected {} in expression", token))),
    }
}

fn parse_arguments(
    tokens: &mut TokenStream,
    context: &CompilationContext,
) -> Result<Vec<Expression>, ParseError> {
    let mut arguments = Vec::new();

    if tokens.test_and_advance_separator(Separator::CloseParen) {
        return Ok(arguments);
    }

    loop {
        arguments.push(parse_next_getter_expression(tokens, context)?);
        if !tokens.test_and_advance_separator(Separator::Comma) {
            break;
        }
    }
    tokens.expect_separator(Separator::CloseParen)?;

    Ok(arguments)
}
