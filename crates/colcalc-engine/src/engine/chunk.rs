//! Formula tokens ("chunks").
//!
//! A formula is an ordered list of chunks: column references, operators,
//! numeric literals and windowed aggregate functions. The kind of a chunk is
//! fixed when it is created; its value may be overwritten in place with
//! another value of the same kind.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

use super::column::ColumnDescriptor;
use crate::error::{EngineError, Result};

/// The four kinds of chunk a formula can contain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkKind {
    Column,
    Operator,
    Number,
    Function,
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkKind::Column => "COLUMN",
            ChunkKind::Operator => "OPERATOR",
            ChunkKind::Number => "NUMBER",
            ChunkKind::Function => "FUNCTION",
        };
        f.write_str(name)
    }
}

/// Operators, including the two brackets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Addition,
    Subtraction,
    Multiplication,
    Division,
    LeftBracket,
    RightBracket,
    Concat,
}

impl Operator {
    /// Textual symbol used in both the query expression and the summary.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Addition => "+",
            Operator::Subtraction => "-",
            Operator::Multiplication => "*",
            Operator::Division => "/",
            Operator::LeftBracket => "(",
            Operator::RightBracket => ")",
            Operator::Concat => "||",
        }
    }

    /// Inverse of [`Operator::symbol`].
    pub fn from_symbol(symbol: &str) -> Option<Operator> {
        let op = match symbol.trim() {
            "+" => Operator::Addition,
            "-" => Operator::Subtraction,
            "*" => Operator::Multiplication,
            "/" => Operator::Division,
            "(" => Operator::LeftBracket,
            ")" => Operator::RightBracket,
            "||" => Operator::Concat,
            _ => return None,
        };
        Some(op)
    }

    /// True for everything except the brackets.
    pub fn is_binary(self) -> bool {
        !matches!(self, Operator::LeftBracket | Operator::RightBracket)
    }

    /// Binding strength; higher binds tighter. `||` binds loosest, as in SQL.
    pub(crate) fn precedence(self) -> u8 {
        match self {
            Operator::Concat => 0,
            Operator::Addition | Operator::Subtraction => 1,
            Operator::Multiplication | Operator::Division => 2,
            Operator::LeftBracket | Operator::RightBracket => 0,
        }
    }
}

/// The whitelisted windowed aggregate functions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionOp {
    Rank,
    RunningSum,
    MovingAverage,
    PercentOfTotal,
}

impl FunctionOp {
    pub fn name(self) -> &'static str {
        crate::builtins::window_builtin(self).name
    }

    /// Whether the function needs a window size in addition to its column.
    pub fn needs_window(self) -> bool {
        crate::builtins::window_builtin(self).needs_window
    }

    pub fn description(self) -> &'static str {
        crate::builtins::window_builtin(self).description
    }

    pub fn all() -> [FunctionOp; 4] {
        [
            FunctionOp::Rank,
            FunctionOp::RunningSum,
            FunctionOp::MovingAverage,
            FunctionOp::PercentOfTotal,
        ]
    }
}

impl fmt::Display for FunctionOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A function chunk's operation and its sub-parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionConfig {
    pub op: FunctionOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub window: Option<usize>,
}

impl FunctionConfig {
    /// A freshly inserted function with none of its parameters chosen yet.
    pub fn new(op: FunctionOp) -> FunctionConfig {
        FunctionConfig {
            op,
            column: None,
            window: None,
        }
    }

    pub fn with_column(mut self, field: impl Into<String>) -> FunctionConfig {
        self.column = Some(field.into());
        self
    }

    pub fn with_window(mut self, window: usize) -> FunctionConfig {
        self.window = Some(window);
        self
    }

    /// A function is usable as an operand only once every required parameter is set.
    pub fn is_configured(&self) -> bool {
        if self.column.is_none() {
            return false;
        }
        if self.op.needs_window() {
            return matches!(self.window, Some(w) if w >= 1);
        }
        true
    }
}

/// The value carried by a chunk. The variant determines the chunk's kind.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChunkValue {
    /// Field id of the referenced column.
    Column(String),
    Operator(Operator),
    /// Literal text, kept verbatim so the persisted expression matches what was typed.
    Number(String),
    Function(FunctionConfig),
}

impl ChunkValue {
    pub fn kind(&self) -> ChunkKind {
        match self {
            ChunkValue::Column(_) => ChunkKind::Column,
            ChunkValue::Operator(_) => ChunkKind::Operator,
            ChunkValue::Number(_) => ChunkKind::Number,
            ChunkValue::Function(_) => ChunkKind::Function,
        }
    }
}

/// One token in a formula.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    value: ChunkValue,
    /// Snapshot of the referenced column, owned by the catalog. Display only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<ColumnDescriptor>,
}

impl Chunk {
    pub fn new(value: ChunkValue) -> Chunk {
        Chunk {
            value,
            column: None,
        }
    }

    pub fn column(field: impl Into<String>) -> Chunk {
        Chunk::new(ChunkValue::Column(field.into()))
    }

    pub fn operator(op: Operator) -> Chunk {
        Chunk::new(ChunkValue::Operator(op))
    }

    pub fn number(text: impl Into<String>) -> Chunk {
        Chunk::new(ChunkValue::Number(text.into()))
    }

    pub fn function(config: FunctionConfig) -> Chunk {
        Chunk::new(ChunkValue::Function(config))
    }

    pub fn with_descriptor(mut self, descriptor: ColumnDescriptor) -> Chunk {
        self.column = Some(descriptor);
        self
    }

    pub fn kind(&self) -> ChunkKind {
        self.value.kind()
    }

    pub fn value(&self) -> &ChunkValue {
        &self.value
    }

    /// Overwrite the value in place. The new value must be of the same kind.
    pub fn set_value(&mut self, value: ChunkValue) -> Result<()> {
        if value.kind() != self.kind() {
            return Err(EngineError::KindChange {
                from: self.kind(),
                to: value.kind(),
            });
        }
        // The snapshot belonged to the old value; callers re-attach one if needed.
        self.column = None;
        self.value = value;
        Ok(())
    }

    pub fn as_operator(&self) -> Option<Operator> {
        match self.value {
            ChunkValue::Operator(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionConfig> {
        match &self.value {
            ChunkValue::Function(config) => Some(config),
            _ => None,
        }
    }

    /// Columns and configured functions are variables.
    pub fn is_variable(&self) -> bool {
        match &self.value {
            ChunkValue::Column(_) => true,
            ChunkValue::Function(config) => config.is_configured(),
            _ => false,
        }
    }

    /// Anything that occupies an operand slot, configured or not.
    pub fn is_operand(&self) -> bool {
        matches!(
            self.value,
            ChunkValue::Column(_) | ChunkValue::Number(_) | ChunkValue::Function(_)
        )
    }
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^-?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][-+]?[0-9]+)?$")
            .expect("number literal regex must compile")
    })
}

/// Parse numeric literal text: optional `-`, digits, optional fraction and exponent.
/// Returns None for anything else (including `inf`, `nan` and a leading `+`).
pub fn parse_number_literal(text: &str) -> Option<f64> {
    if !number_re().is_match(text) {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_symbols_round_trip() {
        assert_eq!(Operator::from_symbol("||"), Some(Operator::Concat));
        assert_eq!(Operator::from_symbol(" / "), Some(Operator::Division));
        assert_eq!(Operator::from_symbol("%"), None);
    }

    #[test]
    fn test_parse_number_literal_forms() {
        assert_eq!(parse_number_literal("5"), Some(5.0));
        assert_eq!(parse_number_literal("-5"), Some(-5.0));
        assert_eq!(parse_number_literal("2.5"), Some(2.5));
        assert_eq!(parse_number_literal(".5"), Some(0.5));
        assert_eq!(parse_number_literal("3."), Some(3.0));
        assert_eq!(parse_number_literal("1e3"), Some(1000.0));
        assert_eq!(parse_number_literal("-1.5E-2"), Some(-0.015));
    }

    #[test]
    fn test_parse_number_literal_rejects_non_numbers() {
        for text in ["", "-", "+5", "inf", "NaN", "1e", "1.2.3", " 5", "5 ", "1e999"] {
            assert_eq!(parse_number_literal(text), None, "{text:?}");
        }
    }

    #[test]
    fn test_set_value_keeps_kind() {
        let mut chunk = Chunk::column("revenue");
        chunk.set_value(ChunkValue::Column("units".into())).unwrap();
        assert_eq!(chunk.value(), &ChunkValue::Column("units".into()));

        let err = chunk
            .set_value(ChunkValue::Operator(Operator::Addition))
            .unwrap_err();
        assert_eq!(
            err,
            EngineError::KindChange {
                from: ChunkKind::Column,
                to: ChunkKind::Operator
            }
        );
        assert_eq!(chunk.kind(), ChunkKind::Column);
    }

    #[test]
    fn test_function_is_variable_only_when_configured() {
        let bare = Chunk::function(FunctionConfig::new(FunctionOp::MovingAverage));
        assert!(!bare.is_variable());
        assert!(bare.is_operand());

        let no_window =
            Chunk::function(FunctionConfig::new(FunctionOp::MovingAverage).with_column("a"));
        assert!(!no_window.is_variable());

        let zero_window = Chunk::function(
            FunctionConfig::new(FunctionOp::MovingAverage)
                .with_column("a")
                .with_window(0),
        );
        assert!(!zero_window.is_variable());

        let ready = Chunk::function(
            FunctionConfig::new(FunctionOp::MovingAverage)
                .with_column("a")
                .with_window(3),
        );
        assert!(ready.is_variable());

        let rank = Chunk::function(FunctionConfig::new(FunctionOp::Rank).with_column("a"));
        assert!(rank.is_variable());
    }
}
