//! Function signatures and executable script functions.

use std::fmt;

use crate::context::{FunctionRuntimeContext, RuntimeContext, ScriptRuntimeContext};
use crate::lexer::{Position, Separator, Token, TokenKind, TokenStream};
use crate::parser::ast::Block;
use crate::parser::{parse_block_body, CompilationContext};
use crate::result::{ParseError, RuntimeError, ScriptError};
use crate::script::interpreter::{self, FlowState};
use crate::script::CancellationToken;
use crate::value::{Value, ValueType};

/// A named, typed function parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    name: String,
    value_type: ValueType,
}

impl Parameter {
    /// Create a parameter.
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
        }
    }

    /// Parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}

/// The externally checkable shape of a function.
///
/// # Example
///
/// ```
/// use emberscript::{FunctionSignature, Parameter, ValueType};
///
/// let signature = FunctionSignature::new(
///     "Add",
///     ValueType::Int,
///     vec![Parameter::new("a", ValueType::Int), Parameter::new("b", ValueType::Int)],
/// );
/// assert_eq!(signature.to_string(), "int Add(int a, int b)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    identifier: String,
    return_type: ValueType,
    parameters: Vec<Parameter>,
}

impl FunctionSignature {
    /// Create a signature.
    pub fn new(identifier: impl Into<String>, return_type: ValueType, parameters: Vec<Parameter>) -> Self {
        Self {
            identifier: identifier.into(),
            return_type,
            parameters,
        }
    }

    /// Function name.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Declared return type.
    pub fn return_type(&self) -> ValueType {
        self.return_type
    }

    /// Parameters, in order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Same name, return type and parameter types in the same order.
    ///
    /// Parameter names are not compared.
    pub fn matches(&self, other: &FunctionSignature) -> bool {
        self.identifier == other.identifier
            && self.return_type == other.return_type
            && self.parameters.len() == other.parameters.len()
            && self
                .parameters
                .iter()
                .zip(&other.parameters)
                .all(|(a, b)| a.value_type == b.value_type)
    }
}

impl fmt::Display for FunctionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.return_type, self.identifier)?;
        for (index, parameter) in self.parameters.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{} {}", parameter.value_type, parameter.name)?;
        }
        f.write_str(")")
    }
}

/// A function whose header is parsed but whose body is still raw tokens.
///
/// Bodies are parsed only after every global construct has been read, so a
/// body can see constants declared after it.
#[derive(Debug)]
pub(crate) struct PendingFunction {
    signature: FunctionSignature,
    position: Position,
    body: Vec<Token>,
}

impl PendingFunction {
    /// Parse a parameter list and collect the body.
    ///
    /// The stream must sit just past the opening parenthesis.
    pub(crate) fn parse_header(
        return_type: ValueType,
        identifier: String,
        position: Position,
        tokens: &mut TokenStream,
    ) -> Result<Self, ParseError> {
        let mut parameters: Vec<Parameter> = Vec::new();

        if !tokens.test_and_advance_separator(Separator::CloseParen) {
            loop {
                let type_token = tokens.current().clone();
                let value_type = tokens.read_type()?;
                if value_type == ValueType::Void {
                    return Err(type_token.error("Parameters cannot be void"));
                }
                let (name, name_position) = tokens.read_identifier()?;
                if parameters.iter().any(|p| p.name == name) {
                    return Err(name_position.error(format!("Duplicate parameter {}", name)));
                }
                parameters.push(Parameter::new(name, value_type));

                if !tokens.test_and_advance_separator(Separator::Comma) {
                    break;
                }
            }
            tokens.expect_separator(Separator::CloseParen)?;
        }

        tokens.expect_separator(Separator::OpenBrace)?;
        let body = collect_body(tokens)?;

        Ok(Self {
            signature: FunctionSignature::new(identifier, return_type, parameters),
            position,
            body,
        })
    }

    pub(crate) fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    pub(crate) fn position(&self) -> Position {
        self.position
    }

    /// Parse the collected body against the finished compilation context.
    pub(crate) fn parse_body(self, context: &CompilationContext) -> Result<ScriptFunction, ParseError> {
        if let Some(parameter) = self
            .signature
            .parameters()
            .iter()
            .find(|p| context.constant(p.name()).is_some())
        {
            return Err(self.position.error(format!(
                "Parameter {} of {} already declared as a constant",
                parameter.name(),
                self.signature
            )));
        }

        let mut tokens = TokenStream::new(self.body);
        let body = parse_block_body(&mut tokens, context)?;
        if !tokens.at_end() {
            return Err(tokens
                .current()
                .error(format!("Unexpected {} after function body", tokens.current())));
        }

        Ok(ScriptFunction {
            signature: self.signature,
            body,
        })
    }
}

/// Take the tokens of a body up to and including its matching close brace.
fn collect_body(tokens: &mut TokenStream) -> Result<Vec<Token>, ParseError> {
    let mut body = Vec::new();
    let mut depth = 1usize;

    loop {
        let token = tokens.current().clone();
        match &token.kind {
            TokenKind::Eof => return Err(token.error("Expected '}' before end of script")),
            TokenKind::Separator(Separator::OpenBrace) => depth += 1,
            TokenKind::Separator(Separator::CloseBrace) => depth -= 1,
            _ => {}
        }
        tokens.advance();
        body.push(token);

        if depth == 0 {
            return Ok(body);
        }
    }
}

/// A compiled function: its signature and parsed body.
#[derive(Debug)]
pub struct ScriptFunction {
    signature: FunctionSignature,
    body: Block,
}

impl ScriptFunction {
    /// The function's signature.
    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }

    /// Run the function against `script`.
    ///
    /// Binds `arguments` in a fresh [`FunctionRuntimeContext`] and runs the
    /// body. A non-void function pushes its return value onto the global
    /// context's stash.
    pub fn execute(
        &self,
        script: &ScriptRuntimeContext,
        token: &CancellationToken,
        arguments: Vec<Value>,
    ) -> Result<(), ScriptError> {
        let _depth = script.enter_call()?;
        let mut context = FunctionRuntimeContext::new(script.clone(), &self.signature, arguments)?;

        token.check()?;
        let flow = interpreter::execute_block(&self.body, &mut context, token)?;

        let return_type = self.signature.return_type;
        match flow {
            FlowState::Return(Some(value)) if return_type == ValueType::Void => {
                Err(RuntimeError::Evaluation(format!(
                    "Function {} is void but returned {}",
                    self.signature, value
                ))
                .into())
            }
            FlowState::Return(Some(value)) => {
                let actual = value.value_type();
                let value = value.coerce_to(return_type).unwrap_or_else(|| {
                    Err(RuntimeError::ReturnTypeMismatch {
                        actual,
                        requested: return_type,
                    })
                })?;
                script.global().push_return_value(value);
                Ok(())
            }
            FlowState::Break | FlowState::Continue => Err(RuntimeError::Evaluation(
                "break or continue outside of a loop".to_string(),
            )
            .into()),
            FlowState::Return(None) | FlowState::Nominal if return_type == ValueType::Void => Ok(()),
            FlowState::Return(None) | FlowState::Nominal => Err(RuntimeError::NoReturn {
                function: self.signature.to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::token_stream;

    fn header(input: &str) -> Result<PendingFunction, ParseError> {
        let mut tokens = token_stream(input)?;
        let return_type = tokens.read_type()?;
        let (name, position) = tokens.read_identifier()?;
        tokens.expect_separator(Separator::OpenParen)?;
        PendingFunction::parse_header(return_type, name, position, &mut tokens)
    }

    #[test]
    fn test_signature_display() {
        let pending = header("double Scale(double x, int factor) { return x; }").unwrap();
        assert_eq!(pending.signature().to_string(), "double Scale(double x, int factor)");
    }

    #[test]
    fn test_matches_ignores_parameter_names() {
        let a = FunctionSignature::new("F", ValueType::Int, vec![Parameter::new("a", ValueType::Int)]);
        let b = FunctionSignature::new("F", ValueType::Int, vec![Parameter::new("b", ValueType::Int)]);
        let c = FunctionSignature::new("F", ValueType::Long, vec![Parameter::new("a", ValueType::Int)]);
        assert!(a.matches(&b));
        assert!(!a.matches(&c));
    }

    #[test]
    fn test_body_collects_nested_braces() {
        let pending = header("void F() { if (true) { } } int x;").unwrap();
        assert_eq!(pending.body.len(), 7);
        assert!(pending.parse_body(&CompilationContext::new()).is_ok());
    }

    #[test]
    fn test_unterminated_body() {
        let err = header("void F() { int x = 1;").unwrap_err();
        assert!(err.message.contains("'}'"));
    }

    #[test]
    fn test_void_parameter_rejected() {
        assert!(header("void F(void x) { }").is_err());
    }

    #[test]
    fn test_parameter_named_like_constant_rejected() {
        let mut context = CompilationContext::new();
        context
            .declare_constant("N", ValueType::Int, Value::Int(4), Position::new(1, 1))
            .unwrap();

        let err = header("int F(int N) { return N; }")
            .unwrap()
            .parse_body(&context)
            .unwrap_err();
        assert!(err.message.contains("Parameter N"), "{}", err.message);
    }

    #[test]
    fn test_duplicate_parameter_rejected() {
        let err = header("void F(int a, long a) { }").unwrap_err();
        assert!(err.message.contains("Duplicate parameter"));
    }
}
