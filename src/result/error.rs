//! Error types for EmberScript

use thiserror::Error;

use crate::value::ValueType;

/// Errors surfaced by compiling or running a script.
///
/// Every public entry point returns `Result<T, ScriptError>`. The three arms are
/// distinct: a script that fails to compile never produces a
/// [`Script`](crate::Script), a runtime failure means the script logic (or the
/// host's use of it) was wrong, and cancellation means the call was abandoned.
///
/// # Examples
///
/// ```
/// use emberscript::{Script, ScriptError};
///
/// match Script::compile("const int N = 2 + 2;") {
///     Err(ScriptError::Parse(e)) => println!("line {}: {}", e.line, e.message),
///     Err(e) => panic!("unexpected error: {e}"),
///     Ok(_) => panic!("non-literal const should not compile"),
/// }
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// Grammar or contract violation found while compiling.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Failure raised while preparing a script or executing a function.
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// The call was abandoned because its timeout elapsed or its token was cancelled.
    #[error("Execution cancelled")]
    Cancelled,
}

impl ScriptError {
    /// Returns `true` for the cancellation arm.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScriptError::Cancelled)
    }
}

/// A compile-time error, positioned at the token that triggered it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Parse error at line {line}, column {column}: {message}")]
pub struct ParseError {
    /// Line number where the error occurred (1-based).
    pub line: usize,
    /// Column number where the error occurred (1-based).
    pub column: usize,
    /// Error message.
    pub message: String,
}

impl ParseError {
    /// Create a parse error at the given position.
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

impl From<pest::error::Error<crate::lexer::Rule>> for ParseError {
    fn from(e: pest::error::Error<crate::lexer::Rule>) -> Self {
        let (line, column) = match e.line_col {
            pest::error::LineColLocation::Pos((line, col)) => (line, col),
            pest::error::LineColLocation::Span((line, col), _) => (line, col),
        };
        ParseError::new(line, column, e.variant.to_string())
    }
}

/// Which kind of variable access failed to resolve a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// A read.
    Requested,
    /// A write.
    Set,
}

impl std::fmt::Display for Access {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Access::Requested => f.write_str("requested"),
            Access::Set => f.write_str("set"),
        }
    }
}

/// Failures raised while preparing a script or executing one of its functions.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    /// A name was declared twice in the same context.
    #[error("Variable {key} already defined in context")]
    AlreadyDeclared {
        /// The duplicated name.
        key: String,
    },

    /// A name was used without being visible from the accessing context.
    #[error("Variable {key} was {access} but never declared")]
    NeverDeclared {
        /// The unresolved name.
        key: String,
        /// Whether it was read or written.
        access: Access,
    },

    /// A stored value cannot be read or written as the requested type.
    #[error("Value {key} used as {requested} when it's {stored}")]
    TypeMismatch {
        /// Variable name.
        key: String,
        /// Type the caller asked for or supplied.
        requested: ValueType,
        /// Type the variable was declared with.
        stored: ValueType,
    },

    /// The stashed return value cannot be converted to the requested type.
    #[error("Unable to return value of type {actual} as a {requested}")]
    ReturnTypeMismatch {
        /// Type of the stashed value.
        actual: ValueType,
        /// Type the caller asked for.
        requested: ValueType,
    },

    /// A function returned `null` to a caller that asked for a non-nullable type.
    #[error("Function returned null, which cannot be read as {0}")]
    NullReturn(ValueType),

    /// A return value was popped but none was pushed.
    #[error("No return value was stashed")]
    MissingReturnValue,

    /// A non-void function finished without returning a value.
    #[error("Function {function} finished without returning a value")]
    NoReturn {
        /// Signature of the offending function.
        function: String,
    },

    /// Argument count did not match the parameter count.
    #[error("Tried to call function {signature} with argument list: [{received}]")]
    ArgumentCount {
        /// Signature of the callee.
        signature: String,
        /// The arguments that were supplied.
        received: String,
    },

    /// An argument cannot be bound to its parameter.
    #[error("Incompatible argument type for argument {parameter}. Expected: {expected}, Received: {received}")]
    ArgumentType {
        /// Parameter name.
        parameter: String,
        /// Declared parameter type.
        expected: ValueType,
        /// Runtime type of the argument.
        received: ValueType,
    },

    /// No function with this name exists in the script.
    #[error("Unable to find function {0} for invocation")]
    UnknownFunction(String),

    /// `declare_existing_global` named a global the host never created.
    #[error("Tried to declare existing global {0}, but it does not exist")]
    UnknownGlobal(String),

    /// `declare_existing_global` used the wrong type.
    #[error("Tried to access an existing global ({key}) with the wrong type. Declared: {declared}, Actual: {actual}")]
    GlobalTypeMismatch {
        /// Global name.
        key: String,
        /// Type requested by the script.
        declared: ValueType,
        /// Type stored in the global context.
        actual: ValueType,
    },

    /// The operation is not available on this kind of context.
    #[error("{0}")]
    Unsupported(String),

    /// A scope context was opened beneath something other than a function or scope.
    #[error("Scope context expects either a function or scope parent, received: {0}")]
    InvalidScopeParent(String),

    /// A numeric conversion does not fit the target type.
    #[error("Value {value} does not fit in {target}")]
    ConversionOverflow {
        /// The value being converted, rendered.
        value: String,
        /// Target type.
        target: ValueType,
    },

    /// Expression evaluation failed (bad operand types, division by zero, ...).
    #[error("{0}")]
    Evaluation(String),

    /// Nested function calls exceeded the configured limit.
    #[error("Maximum call depth of {0} exceeded")]
    CallDepthExceeded(usize),

    /// Another call is already executing against this script context.
    #[error("Script context is already executing a function")]
    ContextBusy,

    /// The worker running an async call failed before producing a result.
    #[error("Worker failed: {0}")]
    WorkerFailed(String),
}
