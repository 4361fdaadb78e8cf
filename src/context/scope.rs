//! Nested block context.

use std::collections::HashMap;

use crate::context::{ContextKind, FunctionRuntimeContext, GlobalRuntimeContext, RuntimeContext, ScriptRuntimeContext};
use crate::result::RuntimeError;
use crate::value::ScriptValue;

/// A nested block inside a function body.
///
/// Borrows its parent mutably for as long as the block runs, so the tree
/// shape is fixed by the borrow. Declarations here may shadow names from any
/// ancestor.
pub struct ScopeRuntimeContext<'p> {
    parent: &'p mut dyn RuntimeContext,
    values: HashMap<String, ScriptValue>,
}

impl<'p> ScopeRuntimeContext<'p> {
    /// Open a scope beneath `parent`, which must be a function or scope context.
    pub fn new(parent: &'p mut dyn RuntimeContext) -> Result<Self, RuntimeError> {
        match parent.kind() {
            ContextKind::Function | ContextKind::Scope => Ok(Self {
                parent,
                values: HashMap::new(),
            }),
            other => Err(RuntimeError::InvalidScopeParent(other.to_string())),
        }
    }
}

impl std::fmt::Debug for ScopeRuntimeContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeRuntimeContext")
            .field("parent", &self.parent.kind())
            .field("values", &self.values)
            .finish()
    }
}

impl RuntimeContext for ScopeRuntimeContext<'_> {
    fn kind(&self) -> ContextKind {
        ContextKind::Scope
    }

    fn search_parent(&self, _key: &str) -> bool {
        true
    }

    fn parent(&self) -> Option<&dyn RuntimeContext> {
        Some(&*self.parent)
    }

    fn parent_mut(&mut self) -> Option<&mut dyn RuntimeContext> {
        Some(&mut *self.parent)
    }

    fn local_value(&self, key: &str) -> Option<ScriptValue> {
        self.values.get(key).cloned()
    }

    fn store_local(&mut self, value: ScriptValue) {
        self.values.insert(value.key().to_string(), value);
    }

    fn global(&self) -> &GlobalRuntimeContext {
        self.parent.global()
    }

    fn script(&self) -> Result<&ScriptRuntimeContext, RuntimeError> {
        self.parent.script()
    }

    fn function(&self) -> Result<&FunctionRuntimeContext, RuntimeError> {
        self.parent.function()
    }
}
