//! Plain-text report of a loaded session.

use colcalc_core::{ColumnEditor, PreviewColumn};
use colcalc_engine::engine::{CellValue, format_value};

use crate::config::Config;

/// Render the editor's verdict, the compiled column and a preview of the
/// first `config.preview_rows` rows.
pub(crate) fn render_report(editor: &ColumnEditor, rows: &[Vec<CellValue>], config: &Config) -> String {
    let output = editor.output();
    let mut lines = Vec::new();

    if !output.is_valid {
        lines.push("Valid: no".to_string());
        lines.push(format!("Error: {}", output.error.as_deref().unwrap_or_default()));
        return lines.join("\n") + "\n";
    }

    lines.push("Valid: yes".to_string());
    if let Some(result_type) = output.result_type {
        lines.push(format!("Type: {}", result_type));
    }
    let Some(compiled) = output.compiled.as_ref() else {
        lines.push("Name: (none, the column is not compiled)".to_string());
        return lines.join("\n") + "\n";
    };
    lines.push(format!("Field: {}", compiled.field));
    lines.push(format!("Summary: {}", compiled.summary));
    lines.push(format!("Expression: {}", compiled.expression));

    if let Some(column) = editor.preview_column(&config.new_column_class) {
        if !rows.is_empty() {
            lines.push(String::new());
            lines.extend(preview_lines(&column, rows, config.preview_rows));
        }
    }
    lines.join("\n") + "\n"
}

fn preview_lines(column: &PreviewColumn, rows: &[Vec<CellValue>], limit: usize) -> Vec<String> {
    // Window functions see the whole table; only the output is truncated.
    let values = column.fill(rows);
    let mut lines = vec![format!("Preview [{}] {}:", column.css_class, column.title)];
    lines.extend(
        values
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, value)| format!("  {}: {}", i + 1, format_value(value))),
    );
    if values.len() > limit {
        lines.push(format!("  ... {} more rows", values.len() - limit));
    }
    lines
}
