//! Cell values flowing through preview evaluation.

use rhai::Dynamic;
use serde::{Deserialize, Serialize};

/// A single cell of a table row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl CellValue {
    /// Numeric view of the cell. Text that parses as a finite number counts.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Null => None,
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub(crate) fn to_dynamic(&self) -> Dynamic {
        match self {
            CellValue::Null => Dynamic::UNIT,
            CellValue::Number(n) => Dynamic::from(*n),
            CellValue::Text(s) => Dynamic::from(s.clone()),
        }
    }

    pub(crate) fn from_dynamic(value: Dynamic) -> CellValue {
        if value.is_unit() {
            CellValue::Null
        } else if let Ok(n) = value.as_float() {
            CellValue::Number(n)
        } else if let Ok(n) = value.as_int() {
            CellValue::Number(n as f64)
        } else if value.is_string() {
            value
                .into_string()
                .map(CellValue::Text)
                .unwrap_or(CellValue::Null)
        } else {
            CellValue::Null
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}
