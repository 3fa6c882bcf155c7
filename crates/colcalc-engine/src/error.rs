//! Error types for the formula engine.

use thiserror::Error;

use crate::engine::ChunkKind;

/// Errors that can occur while compiling or rendering a formula.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The formula was handed to the compiler or builder without passing validation.
    #[error("Invalid formula: {0}")]
    InvalidFormula(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Cannot change a {from} chunk into a {to} chunk")]
    KindChange { from: ChunkKind, to: ChunkKind },

    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("Rhai compile error: {0}")]
    RhaiCompile(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
