//! Script compilation and execution.
//!
//! A [`Script`] is compiled once from source text. Compilation reads every
//! global construct (globals, externs, constants, members and function
//! headers), checks the host's expected functions, and only then parses the
//! function bodies. A script either compiles completely or not at all.
//!
//! Running a script takes two steps:
//!
//! 1. [`Script::prepare`] materializes the declarations into a fresh
//!    [`ScriptRuntimeContext`] beneath a [`GlobalRuntimeContext`].
//! 2. The `execute_function*` family runs one function against that context.
//!
//! # Example
//!
//! ```
//! use emberscript::{GlobalRuntimeContext, Script};
//!
//! let script = Script::compile(r#"
//!     global int x = 5;
//!     int GetX() { return x; }
//! "#)?;
//!
//! let global = GlobalRuntimeContext::new();
//! let context = script.prepare(&global)?;
//! let x: i32 = script.execute_function_as("GetX", &context, vec![])?;
//! assert_eq!(x, 5);
//! # Ok::<(), emberscript::ScriptError>(())
//! ```

mod cancel;
mod declaration;
mod function;
mod interpreter;

pub use cancel::CancellationToken;
pub use declaration::{KeyInfo, ScriptDeclaration};
pub use function::{FunctionSignature, Parameter, ScriptFunction};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::context::{GlobalRuntimeContext, RuntimeContext, ScriptRuntimeContext};
use crate::lexer::{token_stream, Keyword, Operator, Separator, TokenKind, TokenStream};
use crate::parser::ast::Expression;
use crate::parser::{parse_next_getter_expression, CompilationContext};
use crate::result::{ParseError, RuntimeError, ScriptError};
use crate::value::{FromValue, Value, ValueType};

use function::PendingFunction;

/// Default limit on nested script calls.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// The immutable result of compiling a script, shared by every context
/// prepared from it.
#[derive(Debug)]
pub(crate) struct CompiledScript {
    text: String,
    declarations: Vec<ScriptDeclaration>,
    functions: HashMap<String, ScriptFunction>,
    max_call_depth: usize,
}

impl CompiledScript {
    pub(crate) fn function(&self, name: &str) -> Option<&ScriptFunction> {
        self.functions.get(name)
    }

    pub(crate) fn max_call_depth(&self) -> usize {
        self.max_call_depth
    }
}

/// A compiled script.
///
/// Cheap to clone. One script may be prepared against any number of global
/// contexts, and its functions may run concurrently against different
/// [`ScriptRuntimeContext`]s.
#[derive(Debug, Clone)]
pub struct Script {
    inner: Arc<CompiledScript>,
}

impl Script {
    /// Compile a script with no expected functions.
    pub fn compile(text: &str) -> Result<Self, ScriptError> {
        ScriptBuilder::new().compile(text)
    }

    /// Compile a script that must define every function in `expected`.
    ///
    /// # Example
    ///
    /// ```
    /// use emberscript::{FunctionSignature, Script, ValueType};
    ///
    /// let expected = [FunctionSignature::new("Tick", ValueType::Void, vec![])];
    /// assert!(Script::compile_with("void Tick() { }", &expected).is_ok());
    /// assert!(Script::compile_with("int Tick() { return 1; }", &expected).is_err());
    /// ```
    pub fn compile_with(text: &str, expected: &[FunctionSignature]) -> Result<Self, ScriptError> {
        ScriptBuilder::new()
            .expect_functions(expected.iter().cloned())
            .compile(text)
    }

    /// Compile from an already tokenized stream.
    pub fn from_tokens(
        text: &str,
        tokens: TokenStream,
        expected: &[FunctionSignature],
    ) -> Result<Self, ScriptError> {
        ScriptBuilder::new()
            .expect_functions(expected.iter().cloned())
            .compile_tokens(text, tokens)
    }

    /// Create a builder for configuring compilation.
    pub fn builder() -> ScriptBuilder {
        ScriptBuilder::new()
    }

    /// The source text the script was compiled from.
    pub fn text(&self) -> &str {
        &self.inner.text
    }

    /// Whether a function named `name` exists.
    pub fn has_function(&self, name: &str) -> bool {
        self.inner.functions.contains_key(name)
    }

    /// Whether a function matching `signature` exists.
    pub fn has_function_signature(&self, signature: &FunctionSignature) -> bool {
        self.function_signature(signature.identifier())
            .is_some_and(|found| found.matches(signature))
    }

    /// The signature of the function named `name`.
    pub fn function_signature(&self, name: &str) -> Option<&FunctionSignature> {
        self.inner.functions.get(name).map(ScriptFunction::signature)
    }

    /// The globals this script contributes (non-extern globals), in order.
    ///
    /// Restartable: every call yields the same sequence.
    pub fn declarations(&self) -> impl Iterator<Item = &KeyInfo> + '_ {
        self.inner
            .declarations
            .iter()
            .filter(|d| matches!(d, ScriptDeclaration::Global { is_extern: false, .. }))
            .map(ScriptDeclaration::key_info)
    }

    /// The globals this script expects the host to supply (externs), in order.
    pub fn dependencies(&self) -> impl Iterator<Item = &KeyInfo> + '_ {
        self.inner
            .declarations
            .iter()
            .filter(|d| d.is_extern())
            .map(ScriptDeclaration::key_info)
    }

    /// Materialize the declarations into a new context beneath `global`.
    ///
    /// Declarations run in source order. If one fails, every global this call
    /// created is removed again before the error is returned.
    pub fn prepare(&self, global: &GlobalRuntimeContext) -> Result<ScriptRuntimeContext, ScriptError> {
        let context = ScriptRuntimeContext::new(global.clone(), Arc::clone(&self.inner));
        let token = CancellationToken::new();

        debug!(
            declarations = self.inner.declarations.len(),
            "preparing script context"
        );

        for declaration in &self.inner.declarations {
            if let Err(error) = declaration.execute(&context, &token) {
                warn!(
                    identifier = declaration.key_info().identifier(),
                    %error,
                    "declaration failed, rolling back prepare"
                );
                context.roll_back_globals();
                return Err(error);
            }
        }

        context.commit_globals();
        Ok(context)
    }

    /// Run `name` and return its raw return value, if it has one.
    pub fn execute_function(
        &self,
        name: &str,
        context: &ScriptRuntimeContext,
        arguments: Vec<Value>,
    ) -> Result<Option<Value>, ScriptError> {
        self.execute_function_with_token(name, &CancellationToken::new(), context, arguments)
    }

    /// Run `name` under an external cancellation token.
    pub fn execute_function_with_token(
        &self,
        name: &str,
        token: &CancellationToken,
        context: &ScriptRuntimeContext,
        arguments: Vec<Value>,
    ) -> Result<Option<Value>, ScriptError> {
        self.check_context(context)?;
        run_call(&self.inner, context, name, arguments, token, None)
    }

    /// Run `name` and pop its return value as `T`.
    ///
    /// `()` may be used for void functions. A `string` function may return
    /// `null`; read it as `Option<String>`, since `String` fails with
    /// [`RuntimeError::NullReturn`].
    pub fn execute_function_as<T: FromValue>(
        &self,
        name: &str,
        context: &ScriptRuntimeContext,
        arguments: Vec<Value>,
    ) -> Result<T, ScriptError> {
        self.check_context(context)?;
        run_typed(&self.inner, context, name, arguments, &CancellationToken::new())
    }

    /// Run `name` on the calling thread, cancelling it after `timeout`.
    pub fn execute_function_with_timeout<T: FromValue>(
        &self,
        name: &str,
        timeout: Duration,
        context: &ScriptRuntimeContext,
        arguments: Vec<Value>,
    ) -> Result<T, ScriptError> {
        self.check_context(context)?;
        let token = CancellationToken::with_timeout(timeout);
        run_typed(&self.inner, context, name, arguments, &token)
    }

    /// Run `name` on a blocking worker, cancelling it after `timeout`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::time::Duration;
    /// use emberscript::{GlobalRuntimeContext, Script, ScriptError};
    ///
    /// # tokio_test::block_on(async {
    /// let script = Script::compile("int Spin() { while (true) { } }")?;
    /// let context = script.prepare(&GlobalRuntimeContext::new())?;
    ///
    /// let result = script
    ///     .execute_function_async::<i32>("Spin", Duration::from_millis(20), &context, vec![])
    ///     .await;
    /// assert_eq!(result, Err(ScriptError::Cancelled));
    /// # Ok::<(), ScriptError>(())
    /// # }).unwrap();
    /// ```
    pub async fn execute_function_async<T>(
        &self,
        name: &str,
        timeout: Duration,
        context: &ScriptRuntimeContext,
        arguments: Vec<Value>,
    ) -> Result<T, ScriptError>
    where
        T: FromValue + Send + 'static,
    {
        let token = CancellationToken::with_timeout(timeout);
        self.spawn_typed(name, token, context, arguments).await
    }

    /// Like [`execute_function_async`](Script::execute_function_async), but
    /// also cancelled when `external` trips.
    pub async fn execute_function_async_with_token<T>(
        &self,
        name: &str,
        timeout: Duration,
        external: &CancellationToken,
        context: &ScriptRuntimeContext,
        arguments: Vec<Value>,
    ) -> Result<T, ScriptError>
    where
        T: FromValue + Send + 'static,
    {
        let token = CancellationToken::linked(external, timeout);
        self.spawn_typed(name, token, context, arguments).await
    }

    async fn spawn_typed<T>(
        &self,
        name: &str,
        token: CancellationToken,
        context: &ScriptRuntimeContext,
        arguments: Vec<Value>,
    ) -> Result<T, ScriptError>
    where
        T: FromValue + Send + 'static,
    {
        self.check_context(context)?;

        let program = Arc::clone(&self.inner);
        let context = context.clone();
        let name = name.to_string();

        let worker = tokio::task::spawn_blocking(move || {
            run_typed::<T>(&program, &context, &name, arguments, &token)
        });

        worker
            .await
            .map_err(|e| RuntimeError::WorkerFailed(e.to_string()))?
    }

    fn check_context(&self, context: &ScriptRuntimeContext) -> Result<(), RuntimeError> {
        if !context.prepared_by(&self.inner) {
            return Err(RuntimeError::Unsupported(
                "Context was prepared by a different script".to_string(),
            ));
        }
        Ok(())
    }
}

/// Run one call under the context's execution lease.
///
/// With `pop_as` set, the return value is popped through the global stash as
/// that type; otherwise whatever the function returned is taken raw.
fn run_call(
    program: &CompiledScript,
    context: &ScriptRuntimeContext,
    name: &str,
    arguments: Vec<Value>,
    token: &CancellationToken,
    pop_as: Option<ValueType>,
) -> Result<Option<Value>, ScriptError> {
    let function = program
        .function(name)
        .ok_or_else(|| RuntimeError::UnknownFunction(name.to_string()))?;
    let _lease = context.begin_execution()?;

    debug!(function = name, arguments = arguments.len(), "executing function");

    if let Err(error) = function.execute(context, token, arguments) {
        if error.is_cancelled() {
            warn!(function = name, "function call cancelled");
        }
        return Err(error);
    }

    let returns_value = function.signature().return_type() != ValueType::Void;
    match pop_as {
        Some(ValueType::Void) => {
            // Discard any value so the stash stays empty.
            context.global().take_return_value();
            Ok(None)
        }
        Some(as_type) => match context.pop_return_value(as_type) {
            Ok(value) => Ok(Some(value)),
            Err(error) => {
                context.global().take_return_value();
                Err(error.into())
            }
        },
        None if returns_value => Ok(context.global().take_return_value()),
        None => Ok(None),
    }
}

fn run_typed<T: FromValue>(
    program: &CompiledScript,
    context: &ScriptRuntimeContext,
    name: &str,
    arguments: Vec<Value>,
    token: &CancellationToken,
) -> Result<T, ScriptError> {
    let value = run_call(program, context, name, arguments, token, Some(T::VALUE_TYPE))?
        .unwrap_or(Value::Null);
    let actual = value.value_type();
    T::from_value(value).ok_or_else(|| {
        if actual == ValueType::Null {
            return RuntimeError::NullReturn(T::VALUE_TYPE).into();
        }
        RuntimeError::ReturnTypeMismatch {
            actual,
            requested: T::VALUE_TYPE,
        }
        .into()
    })
}

/// Builder for configuring script compilation.
///
/// # Example
///
/// ```
/// use emberscript::{FunctionSignature, Parameter, Script, ValueType};
///
/// let script = Script::builder()
///     .expect_function(FunctionSignature::new(
///         "Double",
///         ValueType::Int,
///         vec![Parameter::new("n", ValueType::Int)],
///     ))
///     .max_call_depth(32)
///     .compile("int Double(int n) { return n * 2; }")?;
/// assert!(script.has_function("Double"));
/// # Ok::<(), emberscript::ScriptError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ScriptBuilder {
    expected: Vec<FunctionSignature>,
    max_call_depth: usize,
}

impl ScriptBuilder {
    /// Create a new script builder.
    pub fn new() -> Self {
        Self {
            expected: Vec::new(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Require the script to define a function matching `signature`.
    pub fn expect_function(mut self, signature: FunctionSignature) -> Self {
        self.expected.push(signature);
        self
    }

    /// Require the script to define every function in `signatures`.
    pub fn expect_functions<I>(mut self, signatures: I) -> Self
    where
        I: IntoIterator<Item = FunctionSignature>,
    {
        self.expected.extend(signatures);
        self
    }

    /// Limit how deeply script functions may call each other.
    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Tokenize and compile `text` with the configured options.
    pub fn compile(self, text: &str) -> Result<Script, ScriptError> {
        let tokens = token_stream(text)?;
        self.compile_tokens(text, tokens)
    }

    /// Compile an already tokenized stream with the configured options.
    pub fn compile_tokens(self, text: &str, mut tokens: TokenStream) -> Result<Script, ScriptError> {
        let mut compiler = Compiler::default();

        while !tokens.at_end() {
            compiler.parse_global(&mut tokens)?;
        }

        for expected in &self.expected {
            match compiler
                .functions
                .iter()
                .find(|f| f.signature().identifier() == expected.identifier())
            {
                None => {
                    return Err(tokens
                        .current()
                        .error(format!("Expected function not found: {}", expected))
                        .into());
                }
                Some(found) if !found.signature().matches(expected) => {
                    return Err(found
                        .position()
                        .error(format!(
                            "Function {} does not match expected signature {}",
                            found.signature(),
                            expected
                        ))
                        .into());
                }
                Some(_) => {}
            }
        }

        let Compiler {
            context,
            declarations,
            functions: pending,
        } = compiler;

        let mut functions = HashMap::with_capacity(pending.len());
        for function in pending {
            let function = function.parse_body(&context)?;
            functions.insert(function.signature().identifier().to_string(), function);
        }

        debug!(
            functions = functions.len(),
            declarations = declarations.len(),
            "compiled script"
        );

        Ok(Script {
            inner: Arc::new(CompiledScript {
                text: text.to_string(),
                declarations,
                functions,
                max_call_depth: self.max_call_depth,
            }),
        })
    }
}

impl Default for ScriptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Global-scope parse state.
#[derive(Default)]
struct Compiler {
    context: CompilationContext,
    declarations: Vec<ScriptDeclaration>,
    functions: Vec<PendingFunction>,
}

impl Compiler {
    /// Parse one global construct.
    fn parse_global(&mut self, tokens: &mut TokenStream) -> Result<(), ParseError> {
        let token = tokens.current().clone();

        match token.kind {
            TokenKind::Keyword(keyword @ (Keyword::Global | Keyword::Extern)) => {
                tokens.advance();
                let value_type = self.read_variable_type(tokens)?;
                let (name, position) = tokens.read_identifier()?;
                self.context.claim_name(&name, position)?;
                let initializer = self.read_initializer(tokens)?;
                tokens.expect_separator(Separator::Semicolon)?;

                self.declarations.push(ScriptDeclaration::Global {
                    key_info: KeyInfo::new(name, value_type),
                    is_extern: keyword == Keyword::Extern,
                    initializer,
                    position,
                });
                Ok(())
            }
            TokenKind::Keyword(Keyword::Const) => {
                tokens.advance();
                self.parse_constant(tokens)
            }
            TokenKind::Type(value_type) => {
                tokens.advance();
                let (name, position) = tokens.read_identifier()?;

                if tokens.test_and_advance_separator(Separator::OpenParen) {
                    if self
                        .functions
                        .iter()
                        .any(|f| f.signature().identifier() == name)
                    {
                        return Err(position.error(format!("Function {} already defined", name)));
                    }
                    self.context.claim_name(&name, position)?;
                    let function = PendingFunction::parse_header(value_type, name, position, tokens)?;
                    self.functions.push(function);
                    return Ok(());
                }

                if value_type == ValueType::Void {
                    return Err(token.error("Cannot declare a member of type void"));
                }
                self.context.claim_name(&name, position)?;
                let initializer = self.read_initializer(tokens)?;
                tokens.expect_separator(Separator::Semicolon)?;

                self.declarations.push(ScriptDeclaration::Member {
                    key_info: KeyInfo::new(name, value_type),
                    initializer,
                    position,
                });
                Ok(())
            }
            _ => Err(token.error(format!("Unexpected {} at global scope", token))),
        }
    }

    fn parse_constant(&mut self, tokens: &mut TokenStream) -> Result<(), ParseError> {
        let value_type = self.read_variable_type(tokens)?;
        let (name, position) = tokens.read_identifier()?;
        tokens.expect_operator(Operator::Assignment)?;

        let value_token = tokens.current().clone();
        let Expression::Literal(value) = parse_next_getter_expression(tokens, &self.context)? else {
            return Err(value_token.error(format!("Const {} must be initialized with a literal", name)));
        };
        tokens.expect_separator(Separator::Semicolon)?;

        let supplied = value.value_type();
        let value = match value.coerce_to(value_type) {
            Some(Ok(value)) => value,
            Some(Err(error)) => return Err(value_token.error(error.to_string())),
            None => {
                return Err(value_token.error(format!(
                    "Cannot initialize const {} {} with a {} literal",
                    value_type, name, supplied
                )))
            }
        };

        self.context.declare_constant(&name, value_type, value, position)
    }

    fn read_variable_type(&self, tokens: &mut TokenStream) -> Result<ValueType, ParseError> {
        let type_token = tokens.current().clone();
        let value_type = tokens.read_type()?;
        if value_type == ValueType::Void {
            return Err(type_token.error("Cannot declare a variable of type void"));
        }
        Ok(value_type)
    }

    fn read_initializer(&self, tokens: &mut TokenStream) -> Result<Option<Expression>, ParseError> {
        if tokens.test_and_advance_operator(Operator::Assignment) {
            return Ok(Some(parse_next_getter_expression(tokens, &self.context)?));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_constructs_recorded_in_order() {
        let script = Script::compile(
            "extern float health; global int score = 1; string name; const int N = 3; void F() { }",
        )
        .unwrap();
        assert_eq!(script.inner.declarations.len(), 3);
        assert!(script.inner.declarations[0].is_extern());
        assert!(matches!(
            script.inner.declarations[2],
            ScriptDeclaration::Member { .. }
        ));
        assert!(script.has_function("F"));
    }

    #[test]
    fn test_const_accepts_folded_negative() {
        assert!(Script::compile("const int N = -4;").is_ok());
    }

    #[test]
    fn test_const_literal_is_converted() {
        let script = Script::compile("const double D = 2; double Get() { return D; }").unwrap();
        let context = script.prepare(&GlobalRuntimeContext::new()).unwrap();
        assert_eq!(
            script.execute_function("Get", &context, vec![]).unwrap(),
            Some(Value::Double(2.0))
        );
    }

    #[test]
    fn test_const_incompatible_literal() {
        let err = Script::compile("const int N = \"four\";").unwrap_err();
        assert!(matches!(err, ScriptError::Parse(_)));
    }

    #[test]
    fn test_void_member_rejected() {
        let err = Script::compile("void nothing;").unwrap_err();
        assert!(err.to_string().contains("void"));
    }

    #[test]
    fn test_unexpected_global_token() {
        let err = Script::compile("return 1;").unwrap_err();
        assert!(err.to_string().contains("global scope"));
    }

    #[test]
    fn test_context_from_other_script_rejected() {
        let a = Script::compile("void F() { }").unwrap();
        let b = Script::compile("void F() { }").unwrap();
        let context = a.prepare(&GlobalRuntimeContext::new()).unwrap();
        assert!(matches!(
            b.execute_function("F", &context, vec![]),
            Err(ScriptError::Runtime(RuntimeError::Unsupported(_)))
        ));
    }
}
