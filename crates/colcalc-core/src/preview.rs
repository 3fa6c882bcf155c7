//! Translation of a compiled column into what a table preview renders.

use colcalc_engine::engine::{CellValue, CompiledColumn, Mutator, RowEvalFn};

/// Styling hint for a column that is still being edited.
pub const DEFAULT_NEW_COLUMN_CLASS: &str = "column-new";

/// Column definition handed to a table widget.
#[derive(Clone, Debug)]
pub struct PreviewColumn {
    pub field: String,
    pub title: String,
    pub mutator: Mutator,
    pub css_class: String,
    /// True while the column has not been saved.
    pub editing: bool,
}

impl PreviewColumn {
    pub fn from_compiled(compiled: &CompiledColumn, css_class: &str) -> Self {
        Self {
            field: compiled.field.clone(),
            title: compiled.title.clone(),
            mutator: compiled.mutator.clone(),
            css_class: css_class.to_string(),
            editing: true,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn row_fn(&self) -> RowEvalFn {
        self.mutator.row_fn()
    }

    /// Computed values for every row of `rows`.
    pub fn fill(&self, rows: &[Vec<CellValue>]) -> Vec<CellValue> {
        self.mutator.evaluate_table(rows)
    }

    /// Append the computed value to the end of each row.
    pub fn append_to(&self, rows: &mut [Vec<CellValue>]) {
        let values = self.fill(rows);
        for (row, value) in rows.iter_mut().zip(values) {
            row.push(value);
        }
    }
}
