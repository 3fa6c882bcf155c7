//! colcalc_engine - Custom column formula engine + Rhai integration.

pub(crate) mod builtins;
pub mod engine;
pub mod error;

pub use error::{EngineError, Result};
