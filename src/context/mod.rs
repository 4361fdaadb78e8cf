//! Runtime contexts: the scoping tree variables live in.
//!
//! Four kinds of context form a parent-linked tree:
//!
//! - [`GlobalRuntimeContext`]: the root, shared by every script instance and
//!   holding the return-value stash.
//! - [`ScriptRuntimeContext`]: one per prepared script; only sees the globals it
//!   declared.
//! - [`FunctionRuntimeContext`]: one per call; binds the parameters.
//! - [`ScopeRuntimeContext`]: one per nested block; enables shadowing.
//!
//! Lookups check the local map first and then continue upward only when
//! [`RuntimeContext::search_parent`] allows it. That predicate is what encodes
//! the scoping rules, so each kind overrides it.

mod function;
mod global;
mod scope;
mod script;

pub use function::FunctionRuntimeContext;
pub use global::GlobalRuntimeContext;
pub use scope::ScopeRuntimeContext;
pub use script::ScriptRuntimeContext;

use std::fmt;

use crate::result::{Access, RuntimeError};
use crate::value::{Compatibility, ScriptValue, Value, ValueType};

/// The four kinds of context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    /// [`GlobalRuntimeContext`]
    Global,
    /// [`ScriptRuntimeContext`]
    Script,
    /// [`FunctionRuntimeContext`]
    Function,
    /// [`ScopeRuntimeContext`]
    Scope,
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKind::Global => f.write_str("global context"),
            ContextKind::Script => f.write_str("script context"),
            ContextKind::Function => f.write_str("function context"),
            ContextKind::Scope => f.write_str("scope context"),
        }
    }
}

/// A node in the scoping tree.
///
/// Implementors supply local storage, the parent link and the
/// [`search_parent`](RuntimeContext::search_parent) predicate; declaration,
/// lookup and assignment are provided on top of those.
pub trait RuntimeContext {
    /// Which kind of node this is.
    fn kind(&self) -> ContextKind;

    /// Whether a lookup of `key` that misses locally may continue into the parent.
    fn search_parent(&self, key: &str) -> bool;

    /// The parent node, if any.
    fn parent(&self) -> Option<&dyn RuntimeContext>;

    /// The parent node, mutably.
    fn parent_mut(&mut self) -> Option<&mut dyn RuntimeContext>;

    /// The record stored under `key` in this node's own map.
    fn local_value(&self, key: &str) -> Option<ScriptValue>;

    /// Insert or replace a record in this node's own map.
    fn store_local(&mut self, value: ScriptValue);

    /// The root of the tree.
    fn global(&self) -> &GlobalRuntimeContext;

    /// The owning script context.
    fn script(&self) -> Result<&ScriptRuntimeContext, RuntimeError>;

    /// The owning function context.
    fn function(&self) -> Result<&FunctionRuntimeContext, RuntimeError>;

    /// Declare `key` in this context.
    ///
    /// Fails if `key` already exists in this context's own map; ancestors are
    /// not consulted, so a nested context may shadow an outer name. The value
    /// is coerced to `value_type`.
    fn declare_variable(
        &mut self,
        key: &str,
        value_type: ValueType,
        value: Value,
    ) -> Result<(), RuntimeError> {
        if self.local_value(key).is_some() {
            return Err(RuntimeError::AlreadyDeclared {
                key: key.to_string(),
            });
        }

        let stored = coerce_for_store(key, value_type, value)?;
        self.store_local(ScriptValue::new(value_type, key, stored));
        Ok(())
    }

    /// Whether `key` is visible from this context.
    fn variable_exists(&self, key: &str) -> bool {
        if self.local_value(key).is_some() {
            return true;
        }
        self.search_parent(key) && self.parent().is_some_and(|p| p.variable_exists(key))
    }

    /// The visible record for `key`, without any type conversion.
    fn lookup(&self, key: &str) -> Result<ScriptValue, RuntimeError> {
        if let Some(value) = self.local_value(key) {
            return Ok(value);
        }
        match self.parent() {
            Some(parent) if self.search_parent(key) => parent.lookup(key),
            _ => Err(RuntimeError::NeverDeclared {
                key: key.to_string(),
                access: Access::Requested,
            }),
        }
    }

    /// Read `key` as `as_type`, converting if the stored type only converts.
    fn get_existing_value(&self, key: &str, as_type: ValueType) -> Result<Value, RuntimeError> {
        let record = self.lookup(key)?;

        match as_type.compatibility_from(record.value_type()) {
            Compatibility::Assignable => Ok(record.into_value()),
            Compatibility::Convertible => record.into_value().convert_to(as_type),
            Compatibility::Incompatible => Err(RuntimeError::TypeMismatch {
                key: key.to_string(),
                requested: as_type,
                stored: record.value_type(),
            }),
        }
    }

    /// Assign to an existing, visible `key`, converting the value to the declared type.
    fn set_existing_value(&mut self, key: &str, value: Value) -> Result<(), RuntimeError> {
        if let Some(record) = self.local_value(key) {
            let stored = coerce_for_store(key, record.value_type(), value)?;
            self.store_local(record.update_value(stored));
            return Ok(());
        }

        if self.search_parent(key) {
            if let Some(parent) = self.parent_mut() {
                return parent.set_existing_value(key, value);
            }
        }

        Err(RuntimeError::NeverDeclared {
            key: key.to_string(),
            access: Access::Set,
        })
    }

    /// Stash a function's return value on the global context.
    fn push_return_value(&self, value: Value) {
        self.global().push_return_value(value);
    }

    /// Take the stashed return value as `as_type`.
    fn pop_return_value(&self, as_type: ValueType) -> Result<Value, RuntimeError> {
        self.global().pop_return_value(as_type)
    }
}

/// Coerce `value` for storage in a slot declared as `value_type`.
pub(crate) fn coerce_for_store(
    key: &str,
    value_type: ValueType,
    value: Value,
) -> Result<Value, RuntimeError> {
    let supplied = value.value_type();
    value.coerce_to(value_type).unwrap_or_else(|| {
        Err(RuntimeError::TypeMismatch {
            key: key.to_string(),
            requested: supplied,
            stored: value_type,
        })
    })
}
