//! Per-instance script context.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::context::{ContextKind, FunctionRuntimeContext, GlobalRuntimeContext, RuntimeContext};
use crate::result::{RuntimeError, ScriptError};
use crate::script::{CancellationToken, CompiledScript};
use crate::value::{ScriptValue, Value, ValueType};

#[derive(Debug, Default)]
struct ScriptState {
    values: HashMap<String, ScriptValue>,
    global_declarations: HashSet<String>,
    created_globals: Vec<String>,
}

#[derive(Debug)]
struct ScriptShared {
    program: Arc<CompiledScript>,
    state: Mutex<ScriptState>,
    executing: AtomicBool,
    depth: AtomicUsize,
}

/// One instantiated script, parented to a [`GlobalRuntimeContext`].
///
/// Holds the script's member variables and the set of global names the script
/// declared. Lookups only reach the global context for names in that set, so
/// a script never sees a global it did not declare.
///
/// This is a handle; clones share state. A context serves one call at a time:
/// the execution entry points on [`Script`](crate::Script) fail with
/// [`RuntimeError::ContextBusy`] while another call is running against it.
#[derive(Debug, Clone)]
pub struct ScriptRuntimeContext {
    global: GlobalRuntimeContext,
    shared: Arc<ScriptShared>,
}

impl ScriptRuntimeContext {
    pub(crate) fn new(global: GlobalRuntimeContext, program: Arc<CompiledScript>) -> Self {
        Self {
            global,
            shared: Arc::new(ScriptShared {
                program,
                state: Mutex::new(ScriptState::default()),
                executing: AtomicBool::new(false),
                depth: AtomicUsize::new(0),
            }),
        }
    }

    pub(crate) fn prepared_by(&self, program: &Arc<CompiledScript>) -> bool {
        Arc::ptr_eq(&self.shared.program, program)
    }

    /// Whether `key` exists on the global context, declared here or not.
    pub fn global_variable_exists(&self, key: &str) -> bool {
        self.global.variable_exists(key)
    }

    /// Whether this script has declared `key` as a global.
    pub fn has_global_declaration(&self, key: &str) -> bool {
        self.shared.state.lock().global_declarations.contains(key)
    }

    /// Make an existing global visible to this script.
    ///
    /// The global must already exist with exactly `value_type`.
    pub fn declare_existing_global(&self, key: &str, value_type: ValueType) -> Result<(), RuntimeError> {
        let actual = self
            .global
            .value_type(key)
            .ok_or_else(|| RuntimeError::UnknownGlobal(key.to_string()))?;

        if actual != value_type {
            return Err(RuntimeError::GlobalTypeMismatch {
                key: key.to_string(),
                declared: value_type,
                actual,
            });
        }

        self.shared
            .state
            .lock()
            .global_declarations
            .insert(key.to_string());
        Ok(())
    }

    /// Create a new global and make it visible to this script.
    pub fn declare_new_global(
        &self,
        key: &str,
        value_type: ValueType,
        value: Value,
    ) -> Result<(), RuntimeError> {
        self.global
            .clone()
            .declare_variable(key, value_type, value)?;

        let mut state = self.shared.state.lock();
        state.global_declarations.insert(key.to_string());
        state.created_globals.push(key.to_string());
        Ok(())
    }

    /// Call a function of this script from script code, returning its value.
    ///
    /// Void functions yield `None`.
    pub fn run_function(
        &self,
        name: &str,
        arguments: Vec<Value>,
        token: &CancellationToken,
    ) -> Result<Option<Value>, ScriptError> {
        let function = self
            .shared
            .program
            .function(name)
            .ok_or_else(|| RuntimeError::UnknownFunction(name.to_string()))?;

        function.execute(self, token, arguments)?;

        if function.signature().return_type() == ValueType::Void {
            return Ok(None);
        }
        Ok(Some(
            self.global
                .take_return_value()
                .ok_or(RuntimeError::MissingReturnValue)?,
        ))
    }

    /// Mark this context busy for the lifetime of the returned lease.
    pub(crate) fn begin_execution(&self) -> Result<ExecutionLease, RuntimeError> {
        if self
            .shared
            .executing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(RuntimeError::ContextBusy);
        }
        Ok(ExecutionLease {
            context: self.clone(),
        })
    }

    /// Track one level of call nesting; the returned guard releases it.
    pub(crate) fn enter_call(&self) -> Result<CallDepthGuard, RuntimeError> {
        let limit = self.shared.program.max_call_depth();
        let depth = self.shared.depth.fetch_add(1, Ordering::AcqRel) + 1;
        let guard = CallDepthGuard {
            context: self.clone(),
        };
        if depth > limit {
            return Err(RuntimeError::CallDepthExceeded(limit));
        }
        Ok(guard)
    }

    /// Undo the globals this context created; used when preparation fails.
    pub(crate) fn roll_back_globals(&self) {
        let mut state = self.shared.state.lock();
        for key in std::mem::take(&mut state.created_globals) {
            state.global_declarations.remove(&key);
            self.global.remove(&key);
        }
    }

    /// Forget which globals preparation created, once it has succeeded.
    pub(crate) fn commit_globals(&self) {
        self.shared.state.lock().created_globals.clear();
    }
}

/// Releases the busy flag of a [`ScriptRuntimeContext`] on drop.
#[derive(Debug)]
pub(crate) struct ExecutionLease {
    context: ScriptRuntimeContext,
}

impl Drop for ExecutionLease {
    fn drop(&mut self) {
        self.context.shared.executing.store(false, Ordering::Release);
    }
}

/// Decrements the call depth of a [`ScriptRuntimeContext`] on drop.
#[derive(Debug)]
pub(crate) struct CallDepthGuard {
    context: ScriptRuntimeContext,
}

impl Drop for CallDepthGuard {
    fn drop(&mut self) {
        self.context.shared.depth.fetch_sub(1, Ordering::AcqRel);
    }
}

impl RuntimeContext for ScriptRuntimeContext {
    fn kind(&self) -> ContextKind {
        ContextKind::Script
    }

    // Only declared globals are visible.
    fn search_parent(&self, key: &str) -> bool {
        self.shared.state.lock().global_declarations.contains(key)
    }

    fn parent(&self) -> Option<&dyn RuntimeContext> {
        Some(&self.global)
    }

    fn parent_mut(&mut self) -> Option<&mut dyn RuntimeContext> {
        Some(&mut self.global)
    }

    fn local_value(&self, key: &str) -> Option<ScriptValue> {
        self.shared.state.lock().values.get(key).cloned()
    }

    fn store_local(&mut self, value: ScriptValue) {
        self.shared
            .state
            .lock()
            .values
            .insert(value.key().to_string(), value);
    }

    fn global(&self) -> &GlobalRuntimeContext {
        &self.global
    }

    fn script(&self) -> Result<&ScriptRuntimeContext, RuntimeError> {
        Ok(self)
    }

    fn function(&self) -> Result<&FunctionRuntimeContext, RuntimeError> {
        Err(RuntimeError::Unsupported(
            "Cannot retrieve a function context from a script context".to_string(),
        ))
    }
}
