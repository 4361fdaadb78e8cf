//! Result and error types

mod error;

pub use error::{Access, ParseError, RuntimeError, ScriptError};

/// Convenience alias used throughout the crate.
pub type Result<T, E = ScriptError> = std::result::Result<T, E>;
