//! Writer for confirmed column lists.

use std::fs;
use std::path::Path;

use colcalc_engine::engine::ColumnDescriptor;
use serde::Serialize;

use crate::error::Result;

#[derive(Serialize)]
struct ColumnsFile<'a> {
    columns: &'a [ColumnDescriptor],
}

/// Write a column list to a TOML file as `[[columns]]` tables.
pub fn write_columns(path: &Path, columns: &[ColumnDescriptor]) -> Result<()> {
    let content = write_columns_content(columns)?;
    fs::write(path, content)?;
    Ok(())
}

/// Render a column list as TOML. The output loads back as a session's `columns`.
pub fn write_columns_content(columns: &[ColumnDescriptor]) -> Result<String> {
    let body = toml::to_string(&ColumnsFile { columns })?;
    Ok(format!("# colcalc columns\n{}", body))
}
