//! Error types for colcalc core.

use colcalc_engine::EngineError;
use thiserror::Error;

/// Errors that can occur while editing, saving or loading a custom column.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Session file error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Cannot serialize columns: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("Invalid chunk {index} in session: {message}")]
    Session { index: usize, message: String },

    #[error("Session file is too large ({0} bytes)")]
    SessionTooLarge(u64),

    #[error("Column cannot be saved: {0}")]
    NotSavable(String),

    #[error("No chunk at index {0}")]
    ChunkIndex(usize),
}

pub type Result<T> = std::result::Result<T, CoreError>;
