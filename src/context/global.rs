//! The root context.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::{coerce_for_store, ContextKind, FunctionRuntimeContext, RuntimeContext, ScriptRuntimeContext};
use crate::result::RuntimeError;
use crate::value::{Compatibility, ScriptValue, Value, ValueType};

#[derive(Debug, Default)]
struct GlobalState {
    values: HashMap<String, ScriptValue>,
    stashed_return_value: Option<Value>,
}

/// Root of the context tree: host-visible globals plus the return-value stash.
///
/// This is a cheap handle; clones share the same state, which is how several
/// [`ScriptRuntimeContext`]s see one set of globals. Return values from every
/// call flow through the single stash, so concurrent calls against one global
/// context can observe each other's return values. Give each independently
/// running script its own global context.
#[derive(Debug, Clone, Default)]
pub struct GlobalRuntimeContext {
    state: Arc<Mutex<GlobalState>>,
}

impl GlobalRuntimeContext {
    /// A fresh, empty global context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `key` or update its value, outside the declaration protocol.
    ///
    /// An existing global keeps its declared type; `value` must be compatible
    /// with it and is converted when needed.
    pub fn add_or_set_value(
        &self,
        key: &str,
        value_type: ValueType,
        value: Value,
    ) -> Result<(), RuntimeError> {
        let mut state = self.state.lock();

        if let Some(record) = state.values.get(key) {
            if !record.value_type().accepts(value_type) {
                return Err(RuntimeError::TypeMismatch {
                    key: key.to_string(),
                    requested: value_type,
                    stored: record.value_type(),
                });
            }
            let stored = coerce_for_store(key, record.value_type(), value)?;
            let updated = record.update_value(stored);
            state.values.insert(key.to_string(), updated);
        } else {
            let stored = coerce_for_store(key, value_type, value)?;
            state
                .values
                .insert(key.to_string(), ScriptValue::new(value_type, key, stored));
        }

        Ok(())
    }

    /// The current value of `key`, if it exists.
    pub fn raw_value(&self, key: &str) -> Option<Value> {
        self.state.lock().values.get(key).map(|v| v.value().clone())
    }

    /// The declared type of `key`, if it exists.
    pub fn value_type(&self, key: &str) -> Option<ValueType> {
        self.state.lock().values.get(key).map(|v| v.value_type())
    }

    /// Remove every global and empty the return stash.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.values.clear();
        state.stashed_return_value = None;
    }

    /// Whether both handles point at the same state.
    pub fn same_as(&self, other: &GlobalRuntimeContext) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    pub(crate) fn remove(&self, key: &str) {
        self.state.lock().values.remove(key);
    }

    /// Overwrite the return stash.
    pub fn push_return_value(&self, value: Value) {
        self.state.lock().stashed_return_value = Some(value);
    }

    /// Take the stashed return value as `as_type`, leaving the stash empty.
    ///
    /// Fails if nothing was pushed since the last pop, or if the stashed value
    /// is neither assignable nor convertible to `as_type`. An incompatible
    /// value stays stashed here so the caller can retry with another type; the
    /// typed entry points on [`Script`](crate::Script) discard it instead.
    pub fn pop_return_value(&self, as_type: ValueType) -> Result<Value, RuntimeError> {
        let mut state = self.state.lock();

        let actual = state
            .stashed_return_value
            .as_ref()
            .map(Value::value_type)
            .ok_or(RuntimeError::MissingReturnValue)?;

        let compatibility = as_type.compatibility_from(actual);
        if compatibility == Compatibility::Incompatible {
            return Err(RuntimeError::ReturnTypeMismatch {
                actual,
                requested: as_type,
            });
        }

        let value = state
            .stashed_return_value
            .take()
            .ok_or(RuntimeError::MissingReturnValue)?;
        match compatibility {
            Compatibility::Convertible => value.convert_to(as_type),
            _ => Ok(value),
        }
    }

    /// Take whatever is stashed, without conversion.
    pub fn take_return_value(&self) -> Option<Value> {
        self.state.lock().stashed_return_value.take()
    }
}

impl RuntimeContext for GlobalRuntimeContext {
    fn kind(&self) -> ContextKind {
        ContextKind::Global
    }

    fn search_parent(&self, _key: &str) -> bool {
        false
    }

    fn parent(&self) -> Option<&dyn RuntimeContext> {
        None
    }

    fn parent_mut(&mut self) -> Option<&mut dyn RuntimeContext> {
        None
    }

    fn local_value(&self, key: &str) -> Option<ScriptValue> {
        self.state.lock().values.get(key).cloned()
    }

    fn store_local(&mut self, value: ScriptValue) {
        self.state
            .lock()
            .values
            .insert(value.key().to_string(), value);
    }

    fn global(&self) -> &GlobalRuntimeContext {
        self
    }

    fn script(&self) -> Result<&ScriptRuntimeContext, RuntimeError> {
        Err(RuntimeError::Unsupported(
            "Cannot retrieve a script context from the global context".to_string(),
        ))
    }

    fn function(&self) -> Result<&FunctionRuntimeContext, RuntimeError> {
        Err(RuntimeError::Unsupported(
            "Cannot retrieve a function context from the global context".to_string(),
        ))
    }

    fn declare_variable(
        &mut self,
        key: &str,
        value_type: ValueType,
        value: Value,
    ) -> Result<(), RuntimeError> {
        // Check and insert under one lock so two scripts cannot both declare a key.
        let mut state = self.state.lock();
        if state.values.contains_key(key) {
            return Err(RuntimeError::AlreadyDeclared {
                key: key.to_string(),
            });
        }
        let stored = coerce_for_store(key, value_type, value)?;
        state
            .values
            .insert(key.to_string(), ScriptValue::new(value_type, key, stored));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_twice_fails() {
        let mut global = GlobalRuntimeContext::new();
        global
            .declare_variable("x", ValueType::Int, Value::Int(1))
            .unwrap();
        let err = global
            .declare_variable("x", ValueType::Int, Value::Int(2))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::AlreadyDeclared { .. }));
    }

    #[test]
    fn test_never_searches_parent() {
        let global = GlobalRuntimeContext::new();
        assert!(!global.search_parent("anything"));
        assert!(!global.variable_exists("anything"));
    }

    #[test]
    fn test_add_or_set_value_converts() {
        let global = GlobalRuntimeContext::new();
        global
            .add_or_set_value("ratio", ValueType::Double, Value::Double(0.5))
            .unwrap();
        global
            .add_or_set_value("ratio", ValueType::Int, Value::Int(2))
            .unwrap();
        assert_eq!(global.raw_value("ratio"), Some(Value::Double(2.0)));
        assert_eq!(global.value_type("ratio"), Some(ValueType::Double));

        let err = global
            .add_or_set_value("ratio", ValueType::String, Value::from("two"))
            .unwrap_err();
        assert!(matches!(err, RuntimeError::TypeMismatch { .. }));
    }

    #[test]
    fn test_pop_empties_stash() {
        let global = GlobalRuntimeContext::new();
        global.push_return_value(Value::Int(7));
        assert_eq!(global.pop_return_value(ValueType::Long), Ok(Value::Long(7)));
        assert_eq!(
            global.pop_return_value(ValueType::Long),
            Err(RuntimeError::MissingReturnValue)
        );
    }

    #[test]
    fn test_incompatible_pop_keeps_value() {
        let global = GlobalRuntimeContext::new();
        global.push_return_value(Value::Bool(true));
        assert!(matches!(
            global.pop_return_value(ValueType::Int),
            Err(RuntimeError::ReturnTypeMismatch { .. })
        ));
        assert_eq!(global.pop_return_value(ValueType::Bool), Ok(Value::Bool(true)));
    }

    #[test]
    fn test_clear_drops_stash() {
        let global = GlobalRuntimeContext::new();
        global.push_return_value(Value::Int(1));
        global.clear();
        assert_eq!(global.take_return_value(), None);
    }

    #[test]
    fn test_script_accessor_unsupported() {
        let global = GlobalRuntimeContext::new();
        assert!(matches!(global.script(), Err(RuntimeError::Unsupported(_))));
        assert!(matches!(global.function(), Err(RuntimeError::Unsupported(_))));
    }
}
