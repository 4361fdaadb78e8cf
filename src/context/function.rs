//! Per-call context.

use std::collections::HashMap;

use crate::context::{ContextKind, GlobalRuntimeContext, RuntimeContext, ScriptRuntimeContext};
use crate::result::RuntimeError;
use crate::script::FunctionSignature;
use crate::value::{ScriptValue, Value};

/// One active function call, parented to the script context.
///
/// Construction binds each parameter as a local variable. Lookups that miss
/// locally always continue into the script context.
#[derive(Debug)]
pub struct FunctionRuntimeContext {
    script: ScriptRuntimeContext,
    signature: FunctionSignature,
    values: HashMap<String, ScriptValue>,
}

impl FunctionRuntimeContext {
    /// Bind `arguments` to the parameters of `signature`.
    ///
    /// The argument count must equal the parameter count exactly; this is
    /// checked before anything is bound. Each non-null argument must be
    /// assignable or convertible to its parameter type. A null argument binds
    /// the parameter type's default value.
    pub fn new(
        script: ScriptRuntimeContext,
        signature: &FunctionSignature,
        arguments: Vec<Value>,
    ) -> Result<Self, RuntimeError> {
        let parameters = signature.parameters();

        if parameters.len() != arguments.len() {
            let received = arguments
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(RuntimeError::ArgumentCount {
                signature: signature.to_string(),
                received,
            });
        }

        let mut context = Self {
            script,
            signature: signature.clone(),
            values: HashMap::with_capacity(parameters.len()),
        };

        for (parameter, argument) in parameters.iter().zip(arguments) {
            let value = match argument {
                Value::Null => parameter.value_type().default_value(),
                argument => {
                    let received = argument.value_type();
                    argument.coerce_to(parameter.value_type()).unwrap_or_else(|| {
                        Err(RuntimeError::ArgumentType {
                            parameter: parameter.name().to_string(),
                            expected: parameter.value_type(),
                            received,
                        })
                    })?
                }
            };

            context.declare_variable(parameter.name(), parameter.value_type(), value)?;
        }

        Ok(context)
    }

    /// The signature this call was bound against.
    pub fn signature(&self) -> &FunctionSignature {
        &self.signature
    }
}

impl RuntimeContext for FunctionRuntimeContext {
    fn kind(&self) -> ContextKind {
        ContextKind::Function
    }

    fn search_parent(&self, _key: &str) -> bool {
        true
    }

    fn parent(&self) -> Option<&dyn RuntimeContext> {
        Some(&self.script)
    }

    fn parent_mut(&mut self) -> Option<&mut dyn RuntimeContext> {
        Some(&mut self.script)
    }

    fn local_value(&self, key: &str) -> Option<ScriptValue> {
        self.values.get(key).cloned()
    }

    fn store_local(&mut self, value: ScriptValue) {
        self.values.insert(value.key().to_string(), value);
    }

    fn global(&self) -> &GlobalRuntimeContext {
        self.script.global()
    }

    fn script(&self) -> Result<&ScriptRuntimeContext, RuntimeError> {
        Ok(&self.script)
    }

    fn function(&self) -> Result<&FunctionRuntimeContext, RuntimeError> {
        Ok(self)
    }
}
