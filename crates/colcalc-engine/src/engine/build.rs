//! Rendering a formula as query-expression text and as a readable summary.

use std::sync::OnceLock;

use regex::Regex;

use super::chunk::{Chunk, ChunkValue, FunctionConfig, FunctionOp, Operator};
use super::column::{ColumnCatalog, ColumnDescriptor};
use super::guard::try_transform_division_expression;
use super::validate::{is_unary_minus, validate_formula};
use crate::error::{EngineError, Result};

/// Render a validated formula as a flat query expression.
///
/// Columns become their storage identifier, operators their symbol, numbers
/// their literal text and functions a whitelisted window call.
pub fn build_expression(formula: &[Chunk], catalog: &ColumnCatalog) -> Result<String> {
    ensure_valid(formula, catalog)?;
    render_tokens(formula, |chunk| sql_piece(chunk, catalog))
}

/// The expression that gets persisted: the built text with every division guarded.
pub fn persisted_expression(formula: &[Chunk], catalog: &ColumnCatalog) -> Result<String> {
    let built = build_expression(formula, catalog)?;
    try_transform_division_expression(&built)
}

/// `"= "` followed by the formula written with display names, e.g. `= Revenue / Units`.
pub fn summary_text(formula: &[Chunk], catalog: &ColumnCatalog) -> Result<String> {
    ensure_valid(formula, catalog)?;
    let body = render_tokens(formula, |chunk| display_piece(chunk, catalog))?;
    Ok(format!("= {}", body))
}

pub(crate) fn ensure_valid(formula: &[Chunk], catalog: &ColumnCatalog) -> Result<()> {
    let verdict = validate_formula(formula, catalog);
    if verdict.valid {
        return Ok(());
    }
    let reason = verdict.error.unwrap_or("invalid formula");
    Err(EngineError::InvalidFormula(reason.to_string()))
}

/// Join rendered chunks with single spaces, except after `(`, before `)`
/// and after a unary minus. A unary minus in front of a negative literal
/// keeps its space so the text never contains `--`.
fn render_tokens<F>(formula: &[Chunk], piece: F) -> Result<String>
where
    F: Fn(&Chunk) -> Result<String>,
{
    let mut out = String::new();
    let mut spaced = false;
    for (i, chunk) in formula.iter().enumerate() {
        let op = chunk.as_operator();
        let text = piece(chunk)?;
        let joins_minus = out.ends_with('-') && text.starts_with('-');
        if (spaced && op != Some(Operator::RightBracket)) || joins_minus {
            out.push(' ');
        }
        out.push_str(&text);
        spaced = match op {
            Some(Operator::LeftBracket) => false,
            Some(Operator::Subtraction) => !is_unary_position(formula, i),
            _ => true,
        };
    }
    Ok(out)
}

/// A minus is unary when nothing that yields a value precedes it.
fn is_unary_position(formula: &[Chunk], i: usize) -> bool {
    if !is_unary_minus(formula, i) {
        return false;
    }
    match i.checked_sub(1).map(|p| &formula[p]) {
        None => true,
        Some(prev) => prev
            .as_operator()
            .is_some_and(|op| op != Operator::RightBracket),
    }
}

fn column_of<'a>(field: &str, catalog: &'a ColumnCatalog) -> Result<&'a ColumnDescriptor> {
    catalog
        .get(field)
        .ok_or_else(|| EngineError::UnknownColumn(field.to_string()))
}

fn function_column<'a>(
    config: &FunctionConfig,
    catalog: &'a ColumnCatalog,
) -> Result<&'a ColumnDescriptor> {
    let field = config.column.as_deref().ok_or_else(|| {
        EngineError::InvalidFormula(format!("{} is missing required parameters", config.op))
    })?;
    column_of(field, catalog)
}

fn sql_piece(chunk: &Chunk, catalog: &ColumnCatalog) -> Result<String> {
    let text = match chunk.value() {
        ChunkValue::Column(field) => quote_identifier(column_of(field, catalog)?.storage_identifier()),
        ChunkValue::Operator(op) => op.symbol().to_string(),
        ChunkValue::Number(text) => text.clone(),
        ChunkValue::Function(config) => function_sql(config, catalog)?,
    };
    Ok(text)
}

/// Identifiers that are not plain (optionally dotted) names are written in
/// double quotes, with embedded quotes doubled.
pub(crate) fn quote_identifier(ident: &str) -> String {
    static PLAIN: OnceLock<Regex> = OnceLock::new();
    let plain = PLAIN.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_.]*$").expect("identifier regex must compile")
    });
    if plain.is_match(ident) {
        ident.to_string()
    } else {
        format!("\"{}\"", ident.replace('"', "\"\""))
    }
}

/// Window call for a function chunk.
fn function_sql(config: &FunctionConfig, catalog: &ColumnCatalog) -> Result<String> {
    let col = quote_identifier(function_column(config, catalog)?.storage_identifier());
    let sql = match config.op {
        FunctionOp::Rank => format!("RANK() OVER (ORDER BY {} DESC)", col),
        FunctionOp::RunningSum => format!(
            "SUM({}) OVER (ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW)",
            col
        ),
        FunctionOp::MovingAverage => {
            let preceding = config.window.unwrap_or(1).saturating_sub(1);
            format!(
                "AVG({}) OVER (ROWS BETWEEN {} PRECEDING AND CURRENT ROW)",
                col, preceding
            )
        }
        FunctionOp::PercentOfTotal => format!("({} / SUM({}) OVER ())", col, col),
    };
    Ok(sql)
}

fn display_piece(chunk: &Chunk, catalog: &ColumnCatalog) -> Result<String> {
    let text = match chunk.value() {
        ChunkValue::Column(field) => column_of(field, catalog)?.title.clone(),
        ChunkValue::Operator(op) => op.symbol().to_string(),
        ChunkValue::Number(text) => text.clone(),
        ChunkValue::Function(config) => {
            let title = &function_column(config, catalog)?.title;
            match (config.op.needs_window(), config.window) {
                (true, Some(window)) => format!("{}({}, {})", config.op, title, window),
                _ => format!("{}({})", config.op, title),
            }
        }
    };
    Ok(text)
}
