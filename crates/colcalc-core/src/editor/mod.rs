//! Editing session for one derived column.
//!
//! `reduce` is the whole derivation: formula, catalog and name in, verdict
//! and compiled column out. `ColumnEditor` owns the inputs plus two timers
//! and calls `reduce` when the recompile timer fires.

mod debounce;
mod ops;
mod reduce;
mod state;

pub use debounce::{Debouncer, TimerHandle};
pub use ops::{EditorEvents, RecompileJob};
pub use reduce::{EditorOutput, reduce};
pub use state::{ColumnEditor, DEFAULT_RENAME_DEBOUNCE};
