//! Window function inputs for preview evaluation.
//!
//! Window functions look at the whole table, so they are computed once per
//! table before row evaluation. Each row then receives its own slice of
//! values (`win[i]` in the compiled script), which keeps row evaluation pure.

use super::chunk::{FunctionConfig, FunctionOp};
use super::column::ColumnCatalog;
use super::value::CellValue;
use crate::error::{EngineError, Result};

/// A configured window function with its column resolved to a row index.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct WindowInput {
    op: FunctionOp,
    column: usize,
    window: usize,
}

impl WindowInput {
    pub(crate) fn resolve(config: &FunctionConfig, catalog: &ColumnCatalog) -> Result<WindowInput> {
        if !config.is_configured() {
            return Err(EngineError::InvalidFormula(format!(
                "{} is missing required parameters",
                config.op
            )));
        }
        let field = config.column.as_deref().unwrap_or_default();
        let column = catalog
            .position(field)
            .ok_or_else(|| EngineError::UnknownColumn(field.to_string()))?;
        Ok(WindowInput {
            op: config.op,
            column,
            window: config.window.unwrap_or(1),
        })
    }

    fn compute(&self, rows: &[Vec<CellValue>]) -> Vec<CellValue> {
        let values: Vec<Option<f64>> = rows
            .iter()
            .map(|row| row.get(self.column).and_then(CellValue::as_number))
            .collect();
        match self.op {
            FunctionOp::Rank => rank(&values),
            FunctionOp::RunningSum => running_sum(&values),
            FunctionOp::MovingAverage => moving_average(&values, self.window),
            FunctionOp::PercentOfTotal => percent_of_total(&values),
        }
    }
}

/// Per-row window values, one entry per input, row-major.
pub(crate) fn window_inputs(inputs: &[WindowInput], rows: &[Vec<CellValue>]) -> Vec<Vec<CellValue>> {
    let columns: Vec<Vec<CellValue>> = inputs.iter().map(|input| input.compute(rows)).collect();
    (0..rows.len())
        .map(|r| columns.iter().map(|col| col[r].clone()).collect())
        .collect()
}

/// SQL `RANK()` ordered descending: ties share a rank, gaps follow ties.
fn rank(values: &[Option<f64>]) -> Vec<CellValue> {
    let mut sorted: Vec<f64> = values.iter().flatten().copied().collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    values
        .iter()
        .map(|v| match v {
            Some(v) => {
                let greater = sorted.len() - sorted.partition_point(|w| w <= v);
                CellValue::Number((greater + 1) as f64)
            }
            None => CellValue::Null,
        })
        .collect()
}

fn running_sum(values: &[Option<f64>]) -> Vec<CellValue> {
    let mut acc: Option<f64> = None;
    values
        .iter()
        .map(|v| {
            if let Some(v) = v {
                acc = Some(acc.unwrap_or(0.0) + v);
            }
            acc.map(CellValue::Number).unwrap_or_default()
        })
        .collect()
}

fn moving_average(values: &[Option<f64>], window: usize) -> Vec<CellValue> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let present: Vec<f64> = values[start..=i].iter().flatten().copied().collect();
            if present.is_empty() {
                CellValue::Null
            } else {
                CellValue::Number(present.iter().sum::<f64>() / present.len() as f64)
            }
        })
        .collect()
}

/// Matches the guarded expression: a null value or a zero total yields 0.
fn percent_of_total(values: &[Option<f64>]) -> Vec<CellValue> {
    let total: f64 = values.iter().flatten().sum();
    values
        .iter()
        .map(|v| match v {
            Some(v) if total != 0.0 => CellValue::Number(v / total),
            _ => CellValue::Number(0.0),
        })
        .collect()
}
