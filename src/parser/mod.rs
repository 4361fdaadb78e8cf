//! Expression and statement parsing over a [`TokenStream`](crate::lexer::TokenStream).

pub mod ast;
mod expression;
mod statement;

pub use expression::{parse_next_expression, parse_next_getter_expression};
pub use statement::{parse_block_body, parse_next_statement};

use std::collections::{HashMap, HashSet};

use crate::lexer::Position;
use crate::result::ParseError;
use crate::value::{Value, ValueType};

/// State shared by every parse call while one script compiles.
///
/// Holds the named compile-time constants (substituted as literals wherever
/// they are referenced afterwards) and the names already claimed at global
/// scope, so redeclarations are caught while parsing.
#[derive(Debug, Default)]
pub struct CompilationContext {
    constants: HashMap<String, (ValueType, Value)>,
    declared: HashSet<String>,
}

impl CompilationContext {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a global-scope name, failing if it is already taken.
    pub fn claim_name(&mut self, name: &str, position: Position) -> Result<(), ParseError> {
        if !self.declared.insert(name.to_string()) {
            return Err(position.error(format!("Identifier {} already declared", name)));
        }
        Ok(())
    }

    /// Register a constant. The value must already have the declared type.
    pub fn declare_constant(
        &mut self,
        name: &str,
        value_type: ValueType,
        value: Value,
        position: Position,
    ) -> Result<(), ParseError> {
        self.claim_name(name, position)?;
        self.constants.insert(name.to_string(), (value_type, value));
        Ok(())
    }

    /// The value of a constant, if `name` is one.
    pub fn constant(&self, name: &str) -> Option<&Value> {
        self.constants.get(name).map(|(_, value)| value)
    }

    /// The declared type of a constant, if `name` is one.
    pub fn constant_type(&self, name: &str) -> Option<ValueType> {
        self.constants.get(name).map(|(ty, _)| *ty)
    }
}
