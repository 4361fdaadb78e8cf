//! Emberscript: an embeddable, statically typed scripting language.
//!
//! Emberscript compiles small C-like scripts and runs their functions against
//! a tree of runtime contexts. The host decides which globals a script may
//! see, which functions it must define, and how long a call may run.
//!
//! # Features
//!
//! - **Typed values**: `bool`, `int`, `long`, `float`, `double`, `string`
//!   with an explicit assignability and conversion table
//! - **Scoped contexts**: global, script, function and block scopes with
//!   per-kind visibility rules
//! - **Host contracts**: expected function signatures checked at compile time,
//!   extern globals supplied by the host
//! - **Cancellation**: timeouts and external tokens, observed cooperatively
//! - **Async**: calls can run on tokio's blocking pool
//!
//! # Quick Start
//!
//! ```rust
//! use emberscript::{GlobalRuntimeContext, Script, Value, ValueType};
//!
//! # fn main() -> Result<(), emberscript::ScriptError> {
//! let script = Script::compile(r#"
//!     extern double rate;
//!     const int BASE = 10;
//!
//!     double Scale(int amount) {
//!         return (BASE + amount) * rate;
//!     }
//! "#)?;
//!
//! let global = GlobalRuntimeContext::new();
//! global.add_or_set_value("rate", ValueType::Double, Value::Double(1.5))?;
//!
//! let context = script.prepare(&global)?;
//!
//! let scaled: f64 = script.execute_function_as("Scale", &context, vec![Value::Int(2)])?;
//! assert_eq!(scaled, 18.0);
//! # Ok(())
//! # }
//! ```
//!
//! # Scoping
//!
//! A script only sees the globals it declared. Preparing a script binds every
//! `global` and `extern` whose global already exists; a missing `global` is
//! created, while a missing `extern` stays unbound until the host supplies it
//! and calls [`ScriptRuntimeContext::declare_existing_global`]. Function
//! parameters and block locals may shadow outer names.
//!
//! # Errors
//!
//! Every fallible operation returns [`ScriptError`], which separates parse
//! failures, runtime failures and cancellation.

#![warn(missing_docs)]

pub mod context;
pub mod lexer;
pub mod parser;
mod result;
mod script;
mod value;

pub use context::{
    ContextKind, FunctionRuntimeContext, GlobalRuntimeContext, RuntimeContext, ScopeRuntimeContext,
    ScriptRuntimeContext,
};
pub use result::{Access, ParseError, Result, RuntimeError, ScriptError};
pub use script::{
    CancellationToken, FunctionSignature, KeyInfo, Parameter, Script, ScriptBuilder, ScriptDeclaration,
    ScriptFunction, DEFAULT_MAX_CALL_DEPTH,
};
pub use value::{Compatibility, FromValue, ScriptValue, Value, ValueType};
