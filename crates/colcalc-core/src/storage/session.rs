//! Session files: a column catalog, a formula, a name and optional sample rows.
//!
//! ```toml
//! name = "Unit Price"
//! rows = [[120.0, 4], [80.0, 0]]
//!
//! [[columns]]
//! field = "revenue"
//! title = "Revenue"
//! value_type = "DOLLAR_AMT"
//!
//! [[formula]]
//! column = "revenue"
//!
//! [[formula]]
//! operator = "/"
//!
//! [[formula]]
//! function = "MOVING_AVERAGE"
//! of = "units"
//! window = 3
//! ```
//!
//! Each `[[formula]]` entry sets exactly one of `column`, `operator`, `number`
//! or `function`. TOML has no null, so an empty string stands in for a
//! missing cell.

use std::fs;
use std::path::Path;
use std::time::Duration;

use colcalc_engine::engine::{
    CellValue, Chunk, ColumnCatalog, ColumnDescriptor, FunctionConfig, FunctionOp, Operator,
};
use serde::Deserialize;

use crate::editor::ColumnEditor;
use crate::error::{CoreError, Result};

const MAX_SESSION_BYTES: u64 = 1024 * 1024;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionFile {
    #[serde(default)]
    name: String,
    #[serde(default)]
    columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    formula: Vec<ChunkEntry>,
    #[serde(default)]
    rows: Vec<Vec<CellValue>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ChunkEntry {
    column: Option<String>,
    operator: Option<String>,
    number: Option<String>,
    function: Option<FunctionOp>,
    of: Option<String>,
    window: Option<usize>,
}

impl ChunkEntry {
    fn into_chunk(self, index: usize) -> Result<Chunk> {
        let invalid = |message: &str| CoreError::Session {
            index,
            message: message.to_string(),
        };
        let set = [
            self.column.is_some(),
            self.operator.is_some(),
            self.number.is_some(),
            self.function.is_some(),
        ];
        if set.iter().filter(|s| **s).count() != 1 {
            return Err(invalid(
                "expected exactly one of column, operator, number or function",
            ));
        }
        if self.function.is_none() && (self.of.is_some() || self.window.is_some()) {
            return Err(invalid("'of' and 'window' only apply to functions"));
        }

        if let Some(field) = self.column {
            return Ok(Chunk::column(field));
        }
        if let Some(symbol) = self.operator {
            let op = Operator::from_symbol(&symbol)
                .ok_or_else(|| invalid(&format!("unknown operator '{}'", symbol)))?;
            return Ok(Chunk::operator(op));
        }
        if let Some(text) = self.number {
            // Kept verbatim; the validator reports bad literals.
            return Ok(Chunk::number(text));
        }
        let op = self.function.ok_or_else(|| invalid("missing function"))?;
        let mut config = FunctionConfig::new(op);
        config.column = self.of;
        config.window = self.window;
        Ok(Chunk::function(config))
    }
}

/// A loaded session.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub name: String,
    pub catalog: ColumnCatalog,
    pub formula: Vec<Chunk>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Session {
    /// An editor holding this session's formula and name, already compiled.
    pub fn editor(&self, rename_debounce: Duration) -> ColumnEditor {
        ColumnEditor::from_parts(
            self.catalog.clone(),
            self.formula.clone(),
            self.name.clone(),
            rename_debounce,
        )
    }
}

/// Parse session TOML from a string.
pub fn parse_session(content: &str) -> Result<Session> {
    let file: SessionFile = toml::from_str(content)?;
    let formula = file
        .formula
        .into_iter()
        .enumerate()
        .map(|(i, entry)| entry.into_chunk(i))
        .collect::<Result<Vec<_>>>()?;
    let columns = file.columns.into_iter().map(|mut column| {
        column.numeric |= column.value_type.is_numeric();
        column
    });
    let rows = file
        .rows
        .into_iter()
        .map(|row| row.into_iter().map(blank_to_null).collect::<Vec<_>>())
        .collect();
    Ok(Session {
        name: file.name,
        catalog: columns.collect(),
        formula,
        rows,
    })
}

/// Load a session file. Files over 1 MiB are rejected.
pub fn load_session(path: &Path) -> Result<Session> {
    let size = fs::metadata(path)?.len();
    if size > MAX_SESSION_BYTES {
        return Err(CoreError::SessionTooLarge(size));
    }
    let content = fs::read_to_string(path)?;
    parse_session(&content)
}

fn blank_to_null(value: CellValue) -> CellValue {
    match value {
        CellValue::Text(s) if s.is_empty() => CellValue::Null,
        other => other,
    }
}
