use std::time::Duration;

use colcalc_engine::engine::{Chunk, ChunkValue, ColumnCatalog};

use super::debounce::Debouncer;
use super::reduce::{EditorOutput, reduce};

/// Quiet period before a rename reaches the preview.
pub const DEFAULT_RENAME_DEBOUNCE: Duration = Duration::from_millis(500);

/// Recompiles run on the next tick so edits made in one interaction batch together.
pub(crate) const RECOMPILE_DELAY: Duration = Duration::ZERO;

/// Single-writer editing session for one derived column.
#[derive(Debug, Clone)]
pub struct ColumnEditor {
    pub(crate) catalog: ColumnCatalog,
    pub(crate) formula: Vec<Chunk>,
    pub(crate) name: String,
    pub(crate) output: EditorOutput,
    /// Title currently shown in the preview; lags `name` by the rename debounce.
    pub(crate) preview_title: String,
    pub(crate) rename_timer: Debouncer,
    pub(crate) recompile_timer: Debouncer,
    /// Bumped on every formula or name change.
    pub(crate) revision: u64,
    pub(crate) compiled_revision: u64,
    pub(crate) saved: bool,
}

impl ColumnEditor {
    pub fn new(catalog: ColumnCatalog) -> Self {
        Self::with_rename_debounce(catalog, DEFAULT_RENAME_DEBOUNCE)
    }

    pub fn with_rename_debounce(catalog: ColumnCatalog, rename_debounce: Duration) -> Self {
        let output = reduce(&[], &catalog, "");
        ColumnEditor {
            catalog,
            formula: Vec::new(),
            name: String::new(),
            output,
            preview_title: String::new(),
            rename_timer: Debouncer::new(rename_debounce),
            recompile_timer: Debouncer::new(RECOMPILE_DELAY),
            revision: 0,
            compiled_revision: 0,
            saved: false,
        }
    }

    /// Start from an existing formula and name, already compiled.
    pub fn from_parts(
        catalog: ColumnCatalog,
        formula: Vec<Chunk>,
        name: impl Into<String>,
        rename_debounce: Duration,
    ) -> Self {
        let mut editor = Self::with_rename_debounce(catalog, rename_debounce);
        editor.formula = formula
            .into_iter()
            .map(|chunk| editor.attach_descriptor(chunk))
            .collect();
        editor.name = name.into();
        editor.preview_title = editor.name.clone();
        editor.output = reduce(&editor.formula, &editor.catalog, &editor.name);
        editor
    }

    pub fn catalog(&self) -> &ColumnCatalog {
        &self.catalog
    }

    pub fn formula(&self) -> &[Chunk] {
        &self.formula
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn preview_title(&self) -> &str {
        &self.preview_title
    }

    /// Output of the last recompile. May trail the formula until the next tick.
    pub fn output(&self) -> &EditorOutput {
        &self.output
    }

    /// True when the output reflects the current formula and name.
    pub fn is_up_to_date(&self) -> bool {
        self.compiled_revision == self.revision
    }

    pub fn is_saved(&self) -> bool {
        self.saved
    }

    pub(crate) fn attach_descriptor(&self, chunk: Chunk) -> Chunk {
        let field = match chunk.value() {
            ChunkValue::Column(field) => field,
            _ => return chunk,
        };
        match self.catalog.get(field).cloned() {
            Some(descriptor) => chunk.with_descriptor(descriptor),
            None => chunk,
        }
    }
}
