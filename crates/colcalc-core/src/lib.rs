//! colcalc-core - UI-agnostic column editor session + storage.

pub mod editor;
pub mod error;
pub mod preview;
pub mod storage;

pub use editor::{
    ColumnEditor, DEFAULT_RENAME_DEBOUNCE, Debouncer, EditorEvents, EditorOutput, RecompileJob,
    TimerHandle, reduce,
};
pub use error::{CoreError, Result};
pub use preview::{DEFAULT_NEW_COLUMN_CLASS, PreviewColumn};
pub use storage::{Session, load_session, parse_session};
