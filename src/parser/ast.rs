//! Syntax tree for function bodies and initializers.

use crate::lexer::Position;
use crate::value::{Value, ValueType};

/// A block of statements.
pub type Block = Vec<Statement>;

/// A statement inside a function body.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// Nested block: `{ ... }`. Runs in its own scope.
    Block(Block),
    /// Local declaration: `int x = 1;`
    Declaration {
        /// Declared type.
        value_type: ValueType,
        /// Variable name.
        name: String,
        /// Optional initializer.
        initializer: Option<Expression>,
        /// Position of the name.
        position: Position,
    },
    /// Expression evaluated for its effect: `x = 2;`, `f();`
    Expression(Expression),
    /// Conditional: `if (cond) stmt else stmt`
    If {
        /// Condition, must evaluate to `bool`.
        condition: Expression,
        /// Taken branch.
        then_branch: Box<Statement>,
        /// Optional else branch.
        else_branch: Option<Box<Statement>>,
    },
    /// Loop: `while (cond) stmt`
    While {
        /// Condition, must evaluate to `bool`.
        condition: Expression,
        /// Loop body.
        body: Box<Statement>,
    },
    /// Loop: `for (init; cond; step) stmt`
    For {
        /// Runs once, in the loop's own scope.
        initializer: Option<Box<Statement>>,
        /// Absent means `true`.
        condition: Option<Expression>,
        /// Runs after every iteration.
        step: Option<Expression>,
        /// Loop body.
        body: Box<Statement>,
    },
    /// `return;` or `return expr;`
    Return {
        /// Returned value.
        value: Option<Expression>,
        /// Position of the keyword.
        position: Position,
    },
    /// `break;`
    Break,
    /// `continue;`
    Continue,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    /// `-x`
    Negate,
    /// `!x`
    Not,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `==`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    Less,
    /// `<=`
    LessOrEqual,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEqual,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl BinaryOperator {
    /// Source spelling of the operator.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::Less => "<",
            BinaryOperator::LessOrEqual => "<=",
            BinaryOperator::Greater => ">",
            BinaryOperator::GreaterOrEqual => ">=",
            BinaryOperator::And => "&&",
            BinaryOperator::Or => "||",
        }
    }
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A literal, including substituted constants.
    Literal(Value),
    /// Variable read.
    Identifier {
        /// Variable name.
        name: String,
        /// Where it appears.
        position: Position,
    },
    /// Script function call.
    Call {
        /// Function name.
        name: String,
        /// Argument expressions.
        arguments: Vec<Expression>,
        /// Where it appears.
        position: Position,
    },
    /// Unary operation.
    Unary {
        /// Operator.
        op: UnaryOperator,
        /// Operand.
        operand: Box<Expression>,
    },
    /// Binary operation.
    Binary {
        /// Left operand.
        left: Box<Expression>,
        /// Operator.
        op: BinaryOperator,
        /// Right operand.
        right: Box<Expression>,
    },
    /// Assignment, plain (`op == None`) or compound (`x += 1`).
    Assign {
        /// Target variable.
        target: String,
        /// Operator applied before storing, for compound assignments.
        op: Option<BinaryOperator>,
        /// Assigned expression.
        value: Box<Expression>,
        /// Where the target appears.
        position: Position,
    },
    /// `++x`, `x++`, `--x`, `x--`
    Increment {
        /// Target variable.
        target: String,
        /// `1` or `-1`.
        delta: i8,
        /// Whether the expression yields the updated value.
        prefix: bool,
        /// Where the target appears.
        position: Position,
    },
}

impl Expression {
    /// Whether this expression changes a variable at its top level.
    pub fn is_executable(&self) -> bool {
        matches!(self, Expression::Assign { .. } | Expression::Increment { .. })
    }
}
