//! Tree-walking interpreter for function bodies and initializers.

use std::cmp::Ordering;

use tracing::trace;

use crate::context::{RuntimeContext, ScopeRuntimeContext};
use crate::parser::ast::{BinaryOperator, Block, Expression, Statement, UnaryOperator};
use crate::result::{RuntimeError, ScriptError};
use crate::script::CancellationToken;
use crate::value::{Value, ValueType};

/// How control leaves a statement.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FlowState {
    /// Continue with the next statement.
    Nominal,
    /// Leave the innermost loop.
    Break,
    /// Skip to the next iteration of the innermost loop.
    Continue,
    /// Leave the function, optionally with a value.
    Return(Option<Value>),
}

/// Execute a block in `context`, stopping at the first non-nominal flow.
pub(crate) fn execute_block(
    block: &Block,
    context: &mut dyn RuntimeContext,
    token: &CancellationToken,
) -> Result<FlowState, ScriptError> {
    for statement in block {
        let flow = execute_statement(statement, context, token)?;
        if flow != FlowState::Nominal {
            return Ok(flow);
        }
    }
    Ok(FlowState::Nominal)
}

/// Execute a single statement.
pub(crate) fn execute_statement(
    statement: &Statement,
    context: &mut dyn RuntimeContext,
    token: &CancellationToken,
) -> Result<FlowState, ScriptError> {
    token.check()?;

    match statement {
        Statement::Block(block) => {
            let mut scope = ScopeRuntimeContext::new(context)?;
            execute_block(block, &mut scope, token)
        }
        Statement::Declaration {
            value_type,
            name,
            initializer,
            ..
        } => {
            let value = match initializer {
                Some(expression) => evaluate_expression(expression, context, token)?,
                None => value_type.default_value(),
            };
            context.declare_variable(name, *value_type, value)?;
            Ok(FlowState::Nominal)
        }
        Statement::Expression(expression) => {
            evaluate_expression(expression, context, token)?;
            Ok(FlowState::Nominal)
        }
        Statement::If {
            condition,
            then_branch,
            else_branch,
        } => {
            if evaluate_condition(condition, context, token)? {
                execute_statement(then_branch, context, token)
            } else if let Some(else_branch) = else_branch {
                execute_statement(else_branch, context, token)
            } else {
                Ok(FlowState::Nominal)
            }
        }
        Statement::While { condition, body } => {
            loop {
                token.check()?;
                if !evaluate_condition(condition, context, token)? {
                    break;
                }
                match execute_statement(body, context, token)? {
                    FlowState::Break => break,
                    FlowState::Nominal | FlowState::Continue => {}
                    flow @ FlowState::Return(_) => return Ok(flow),
                }
            }
            Ok(FlowState::Nominal)
        }
        Statement::For {
            initializer,
            condition,
            step,
            body,
        } => {
            let mut scope = ScopeRuntimeContext::new(context)?;
            execute_for(
                initializer.as_deref(),
                condition.as_ref(),
                step.as_ref(),
                body,
                &mut scope,
                token,
            )
        }
        Statement::Return { value, .. } => {
            let value = value
                .as_ref()
                .map(|expression| evaluate_expression(expression, context, token))
                .transpose()?;
            Ok(FlowState::Return(value))
        }
        Statement::Break => Ok(FlowState::Break),
        Statement::Continue => Ok(FlowState::Continue),
    }
}

fn execute_for(
    initializer: Option<&Statement>,
    condition: Option<&Expression>,
    step: Option<&Expression>,
    body: &Statement,
    context: &mut dyn RuntimeContext,
    token: &CancellationToken,
) -> Result<FlowState, ScriptError> {
    if let Some(initializer) = initializer {
        execute_statement(initializer, context, token)?;
    }

    loop {
        token.check()?;
        if let Some(condition) = condition {
            if !evaluate_condition(condition, context, token)? {
                break;
            }
        }
        match execute_statement(body, context, token)? {
            FlowState::Break => break,
            FlowState::Nominal | FlowState::Continue => {}
            flow @ FlowState::Return(_) => return Ok(flow),
        }
        if let Some(step) = step {
            evaluate_expression(step, context, token)?;
        }
    }

    Ok(FlowState::Nominal)
}

fn evaluate_condition(
    condition: &Expression,
    context: &mut dyn RuntimeContext,
    token: &CancellationToken,
) -> Result<bool, ScriptError> {
    let value = evaluate_expression(condition, context, token)?;
    value.as_bool().ok_or_else(|| {
        RuntimeError::Evaluation(format!(
            "Condition must be a bool, found {}",
            value.value_type()
        ))
        .into()
    })
}

/// Evaluate an expression to a value.
pub(crate) fn evaluate_expression(
    expression: &Expression,
    context: &mut dyn RuntimeContext,
    token: &CancellationToken,
) -> Result<Value, ScriptError> {
    match expression {
        Expression::Literal(value) => Ok(value.clone()),
        Expression::Identifier { name, .. } => Ok(context.lookup(name)?.into_value()),
        Expression::Call {
            name, arguments, ..
        } => {
            let mut values = Vec::with_capacity(arguments.len());
            for argument in arguments {
                values.push(evaluate_expression(argument, context, token)?);
            }
            trace!(function = %name, arguments = values.len(), "nested call");

            let script = context.script()?.clone();
            Ok(script.run_function(name, values, token)?.unwrap_or(Value::Null))
        }
        Expression::Unary { op, operand } => {
            let value = evaluate_expression(operand, context, token)?;
            Ok(apply_unary(*op, value)?)
        }
        Expression::Binary { left, op, right } => match op {
            BinaryOperator::And | BinaryOperator::Or => {
                let left = expect_bool(*op, evaluate_expression(left, context, token)?)?;
                // Short-circuit: && stops on false, || stops on true.
                if left == (*op == BinaryOperator::Or) {
                    return Ok(Value::Bool(left));
                }
                let right = expect_bool(*op, evaluate_expression(right, context, token)?)?;
                Ok(Value::Bool(right))
            }
            _ => {
                let left = evaluate_expression(left, context, token)?;
                let right = evaluate_expression(right, context, token)?;
                Ok(apply_binary(*op, left, right)?)
            }
        },
        Expression::Assign {
            target, op, value, ..
        } => {
            let mut value = evaluate_expression(value, context, token)?;
            if let Some(op) = op {
                let current = context.lookup(target)?.into_value();
                value = apply_binary(*op, current, value)?;
            }
            context.set_existing_value(target, value)?;
            Ok(context.lookup(target)?.into_value())
        }
        Expression::Increment {
            target,
            delta,
            prefix,
            ..
        } => {
            let current = context.lookup(target)?.into_value();
            if !current.value_type().is_numeric() {
                return Err(RuntimeError::Evaluation(format!(
                    "Cannot increment {} of type {}",
                    target,
                    current.value_type()
                ))
                .into());
            }
            let updated = apply_binary(BinaryOperator::Add, current.clone(), Value::Int(i32::from(*delta)))?;
            context.set_existing_value(target, updated)?;
            if *prefix {
                Ok(context.lookup(target)?.into_value())
            } else {
                Ok(current)
            }
        }
    }
}

fn expect_bool(op: BinaryOperator, value: Value) -> Result<bool, RuntimeError> {
    value.as_bool().ok_or_else(|| {
        RuntimeError::Evaluation(format!(
            "Operator {} requires bool operands, found {}",
            op.symbol(),
            value.value_type()
        ))
    })
}

fn apply_unary(op: UnaryOperator, value: Value) -> Result<Value, RuntimeError> {
    match (op, value) {
        (UnaryOperator::Negate, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
        (UnaryOperator::Negate, Value::Long(n)) => Ok(Value::Long(n.wrapping_neg())),
        (UnaryOperator::Negate, Value::Float(n)) => Ok(Value::Float(-n)),
        (UnaryOperator::Negate, Value::Double(n)) => Ok(Value::Double(-n)),
        (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOperator::Negate, other) => Err(RuntimeError::Evaluation(format!(
            "Cannot negate a value of type {}",
            other.value_type()
        ))),
        (UnaryOperator::Not, other) => Err(RuntimeError::Evaluation(format!(
            "Operator ! requires a bool, found {}",
            other.value_type()
        ))),
    }
}

fn numeric_rank(value_type: ValueType) -> Option<u8> {
    match value_type {
        ValueType::Int => Some(0),
        ValueType::Long => Some(1),
        ValueType::Float => Some(2),
        ValueType::Double => Some(3),
        _ => None,
    }
}

/// Widen both operands to the wider of their numeric types.
fn promote(left: Value, right: Value) -> Result<Option<(Value, Value)>, RuntimeError> {
    let (Some(left_rank), Some(right_rank)) = (
        numeric_rank(left.value_type()),
        numeric_rank(right.value_type()),
    ) else {
        return Ok(None);
    };

    let target = if left_rank >= right_rank {
        left.value_type()
    } else {
        right.value_type()
    };
    Ok(Some((left.convert_to(target)?, right.convert_to(target)?)))
}

fn apply_binary(op: BinaryOperator, left: Value, right: Value) -> Result<Value, RuntimeError> {
    if op == BinaryOperator::Add
        && (left.value_type() == ValueType::String || right.value_type() == ValueType::String)
    {
        return Ok(Value::String(format!("{}{}", left, right)));
    }

    let mismatch = |left: ValueType, right: ValueType| {
        RuntimeError::Evaluation(format!(
            "Operator {} cannot be applied to {} and {}",
            op.symbol(),
            left,
            right
        ))
    };
    let (left_type, right_type) = (left.value_type(), right.value_type());

    match op {
        BinaryOperator::Equal | BinaryOperator::NotEqual => {
            let equal = match promote(left.clone(), right.clone())? {
                Some((l, r)) => compare_numbers(&l, &r) == Some(Ordering::Equal),
                None => left == right,
            };
            Ok(Value::Bool(equal == (op == BinaryOperator::Equal)))
        }
        BinaryOperator::Less
        | BinaryOperator::LessOrEqual
        | BinaryOperator::Greater
        | BinaryOperator::GreaterOrEqual => {
            let ordering = match (left, right) {
                (Value::String(l), Value::String(r)) => Some(l.cmp(&r)),
                (left, right) => match promote(left, right)? {
                    Some((l, r)) => compare_numbers(&l, &r),
                    None => return Err(mismatch(left_type, right_type)),
                },
            };
            let result = match ordering {
                // NaN compares false against everything.
                None => false,
                Some(ordering) => match op {
                    BinaryOperator::Less => ordering == Ordering::Less,
                    BinaryOperator::LessOrEqual => ordering != Ordering::Greater,
                    BinaryOperator::Greater => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                },
            };
            Ok(Value::Bool(result))
        }
        BinaryOperator::And | BinaryOperator::Or => {
            let l = expect_bool(op, left)?;
            let r = expect_bool(op, right)?;
            Ok(Value::Bool(if op == BinaryOperator::And { l && r } else { l || r }))
        }
        _ => match promote(left, right)? {
            Some((l, r)) => arithmetic(op, l, r),
            None => Err(mismatch(left_type, right_type)),
        },
    }
}

fn compare_numbers(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => Some(l.cmp(r)),
        (Value::Long(l), Value::Long(r)) => Some(l.cmp(r)),
        (Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
        (Value::Double(l), Value::Double(r)) => l.partial_cmp(r),
        _ => None,
    }
}

macro_rules! integer_arithmetic {
    ($op:expr, $variant:ident, $l:expr, $r:expr) => {
        match $op {
            BinaryOperator::Add => Ok(Value::$variant($l.wrapping_add($r))),
            BinaryOperator::Subtract => Ok(Value::$variant($l.wrapping_sub($r))),
            BinaryOperator::Multiply => Ok(Value::$variant($l.wrapping_mul($r))),
            BinaryOperator::Divide if $r == 0 => Err(RuntimeError::Evaluation("Division by zero".to_string())),
            BinaryOperator::Divide => Ok(Value::$variant($l.wrapping_div($r))),
            BinaryOperator::Modulo if $r == 0 => Err(RuntimeError::Evaluation("Division by zero".to_string())),
            BinaryOperator::Modulo => Ok(Value::$variant($l.wrapping_rem($r))),
            other => Err(RuntimeError::Evaluation(format!(
                "Operator {} is not arithmetic",
                other.symbol()
            ))),
        }
    };
}

macro_rules! float_arithmetic {
    ($op:expr, $variant:ident, $l:expr, $r:expr) => {
        match $op {
            BinaryOperator::Add => Ok(Value::$variant($l + $r)),
            BinaryOperator::Subtract => Ok(Value::$variant($l - $r)),
            BinaryOperator::Multiply => Ok(Value::$variant($l * $r)),
            BinaryOperator::Divide => Ok(Value::$variant($l / $r)),
            BinaryOperator::Modulo => Ok(Value::$variant($l % $r)),
            other => Err(RuntimeError::Evaluation(format!(
                "Operator {} is not arithmetic",
                other.symbol()
            ))),
        }
    };
}

fn arithmetic(op: BinaryOperator, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => integer_arithmetic!(op, Int, l, r),
        (Value::Long(l), Value::Long(r)) => integer_arithmetic!(op, Long, l, r),
        (Value::Float(l), Value::Float(r)) => float_arithmetic!(op, Float, l, r),
        (Value::Double(l), Value::Double(r)) => float_arithmetic!(op, Double, l, r),
        (l, r) => Err(RuntimeError::Evaluation(format!(
            "Operator {} cannot be applied to {} and {}",
            op.symbol(),
            l.value_type(),
            r.value_type()
        ))),
    }
}
