//! Compile-time declarations awaiting materialization.

use tracing::trace;

use crate::context::{RuntimeContext, ScriptRuntimeContext};
use crate::lexer::Position;
use crate::parser::ast::Expression;
use crate::result::ScriptError;
use crate::script::interpreter::evaluate_expression;
use crate::script::CancellationToken;
use crate::value::{Value, ValueType};

/// The name and type a declaration introduces.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyInfo {
    identifier: String,
    value_type: ValueType,
}

impl KeyInfo {
    /// Create a key.
    pub fn new(identifier: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            identifier: identifier.into(),
            value_type,
        }
    }

    /// Declared name.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Declared type.
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}

/// A global or member declaration recorded while compiling.
///
/// Constants never appear here; they are substituted during parsing.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptDeclaration {
    /// `global T name [= init];` or `extern T name [= init];`
    Global {
        /// Name and type.
        key_info: KeyInfo,
        /// Whether the global is sourced from the host.
        is_extern: bool,
        /// Optional initializer.
        initializer: Option<Expression>,
        /// Where the name appears.
        position: Position,
    },
    /// `T name [= init];` at global scope: a script-level member.
    Member {
        /// Name and type.
        key_info: KeyInfo,
        /// Optional initializer.
        initializer: Option<Expression>,
        /// Where the name appears.
        position: Position,
    },
}

impl ScriptDeclaration {
    /// Name and type of the declared variable.
    pub fn key_info(&self) -> &KeyInfo {
        match self {
            ScriptDeclaration::Global { key_info, .. } | ScriptDeclaration::Member { key_info, .. } => key_info,
        }
    }

    /// Whether this is an `extern` global.
    pub fn is_extern(&self) -> bool {
        matches!(self, ScriptDeclaration::Global { is_extern: true, .. })
    }

    /// Where the declaration appears in the script.
    pub fn position(&self) -> Position {
        match self {
            ScriptDeclaration::Global { position, .. } | ScriptDeclaration::Member { position, .. } => *position,
        }
    }

    /// Materialize the declaration in `script`.
    ///
    /// A global that already exists on the global context is bound with
    /// [`ScriptRuntimeContext::declare_existing_global`], keeping its value and
    /// failing if its type differs. A missing `global` is created from its
    /// initializer. A missing `extern` is created only when it has an
    /// initializer; otherwise it stays unbound and any use of it fails as never
    /// declared. Members are declared on the script context itself.
    pub(crate) fn execute(
        &self,
        script: &ScriptRuntimeContext,
        token: &CancellationToken,
    ) -> Result<(), ScriptError> {
        trace!(
            identifier = self.key_info().identifier(),
            value_type = %self.key_info().value_type(),
            is_extern = self.is_extern(),
            "materializing declaration"
        );

        match self {
            ScriptDeclaration::Global { key_info, .. }
                if script.global_variable_exists(key_info.identifier()) =>
            {
                script.declare_existing_global(key_info.identifier(), key_info.value_type())?;
            }
            ScriptDeclaration::Global {
                is_extern: true,
                initializer: None,
                ..
            } => {}
            ScriptDeclaration::Global {
                key_info,
                initializer,
                ..
            } => {
                let value = initial_value(key_info, initializer.as_ref(), script, token)?;
                script.declare_new_global(key_info.identifier(), key_info.value_type(), value)?;
            }
            ScriptDeclaration::Member {
                key_info,
                initializer,
                ..
            } => {
                let value = initial_value(key_info, initializer.as_ref(), script, token)?;
                script
                    .clone()
                    .declare_variable(key_info.identifier(), key_info.value_type(), value)?;
            }
        }

        Ok(())
    }
}

fn initial_value(
    key_info: &KeyInfo,
    initializer: Option<&Expression>,
    script: &ScriptRuntimeContext,
    token: &CancellationToken,
) -> Result<Value, ScriptError> {
    match initializer {
        Some(expression) => evaluate_expression(expression, &mut script.clone(), token),
        None => Ok(key_info.value_type().default_value()),
    }
}
