//! Structural validation of a formula.
//!
//! Runs on every edit. Failures are returned, never raised, so the editor can
//! show the message inline and keep the session alive. Messages are stable
//! literals; the first failing rule wins, in this order:
//!
//! 1. empty formula
//! 2. bracket balance
//! 3. number literals
//! 4. column references (when a catalog is supplied)
//! 5. leading operator
//! 6. adjacency of consecutive chunks
//! 7. trailing operator
//! 8. at least one variable
//! 9. every function configured

use serde::Serialize;

use super::chunk::{Chunk, ChunkValue, Operator, parse_number_literal};
use super::column::ColumnCatalog;

pub const ERR_EMPTY: &str = "Formula is empty";
pub const ERR_MISMATCHED_PARENS: &str = "Mismatched parentheses";
pub const ERR_INVALID_NUMBER: &str = "Invalid number";
pub const ERR_UNKNOWN_COLUMN: &str = "Unknown column";
pub const ERR_LEADING_OPERATOR: &str = "Formula cannot start with an operator";
pub const ERR_CONSECUTIVE_OPERATORS: &str = "Consecutive operators";
pub const ERR_MISSING_LEFT_OPERAND: &str = "Operator missing left operand";
pub const ERR_MISSING_RIGHT_OPERAND: &str = "Operator missing right operand";
pub const ERR_EMPTY_PARENS: &str = "Empty parentheses";
pub const ERR_MISSING_OPERATOR: &str = "Missing operator between operands";
pub const ERR_TRAILING_OPERATOR: &str = "Formula cannot end with an operator";
pub const ERR_NO_VARIABLE: &str = "Formula must reference at least one column";
pub const ERR_INCOMPLETE_FUNCTION: &str = "Function parameters are incomplete";

/// Verdict for one formula.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub error: Option<&'static str>,
}

impl ValidationResult {
    pub fn ok() -> ValidationResult {
        ValidationResult {
            valid: true,
            error: None,
        }
    }

    pub fn fail(error: &'static str) -> ValidationResult {
        ValidationResult {
            valid: false,
            error: Some(error),
        }
    }
}

/// Position of a chunk in the operand/operator grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Operand,
    Binary,
    Open,
    Close,
}

fn slot(chunk: &Chunk) -> Slot {
    match chunk.as_operator() {
        Some(Operator::LeftBracket) => Slot::Open,
        Some(Operator::RightBracket) => Slot::Close,
        Some(_) => Slot::Binary,
        None => Slot::Operand,
    }
}

/// SUBTRACTION directly followed by a NUMBER or COLUMN acts as a unary minus.
pub(crate) fn is_unary_minus(formula: &[Chunk], index: usize) -> bool {
    formula[index].as_operator() == Some(Operator::Subtraction)
        && formula.get(index + 1).is_some_and(|next| {
            matches!(next.value(), ChunkValue::Number(_) | ChunkValue::Column(_))
        })
}

/// Validate structure only; column references are not resolved.
pub fn validate_structure(formula: &[Chunk]) -> ValidationResult {
    verdict(check(formula, None))
}

/// Validate structure and resolve every column reference against `catalog`.
pub fn validate_formula(formula: &[Chunk], catalog: &ColumnCatalog) -> ValidationResult {
    verdict(check(formula, Some(catalog)))
}

fn verdict(outcome: Result<(), &'static str>) -> ValidationResult {
    match outcome {
        Ok(()) => ValidationResult::ok(),
        Err(error) => ValidationResult::fail(error),
    }
}

fn check(formula: &[Chunk], catalog: Option<&ColumnCatalog>) -> Result<(), &'static str> {
    if formula.is_empty() {
        return Err(ERR_EMPTY);
    }

    check_brackets(formula)?;

    for chunk in formula {
        match chunk.value() {
            ChunkValue::Number(text) if parse_number_literal(text).is_none() => {
                return Err(ERR_INVALID_NUMBER);
            }
            ChunkValue::Column(field) => {
                if catalog.is_some_and(|c| c.get(field).is_none()) {
                    return Err(ERR_UNKNOWN_COLUMN);
                }
            }
            ChunkValue::Function(config) => {
                let unknown = config
                    .column
                    .as_deref()
                    .is_some_and(|field| catalog.is_some_and(|c| c.get(field).is_none()));
                if unknown {
                    return Err(ERR_UNKNOWN_COLUMN);
                }
            }
            _ => {}
        }
    }

    if slot(&formula[0]) == Slot::Binary && !is_unary_minus(formula, 0) {
        return Err(ERR_LEADING_OPERATOR);
    }

    for i in 0..formula.len() - 1 {
        check_pair(formula, i)?;
    }

    if slot(&formula[formula.len() - 1]) == Slot::Binary {
        return Err(ERR_TRAILING_OPERATOR);
    }

    if !formula.iter().any(Chunk::is_variable) {
        return Err(ERR_NO_VARIABLE);
    }

    let incomplete = formula
        .iter()
        .filter_map(Chunk::as_function)
        .any(|config| !config.is_configured());
    if incomplete {
        return Err(ERR_INCOMPLETE_FUNCTION);
    }

    Ok(())
}

fn check_brackets(formula: &[Chunk]) -> Result<(), &'static str> {
    let mut depth = 0usize;
    for chunk in formula {
        match chunk.as_operator() {
            Some(Operator::LeftBracket) => depth += 1,
            Some(Operator::RightBracket) => {
                depth = depth.checked_sub(1).ok_or(ERR_MISMATCHED_PARENS)?;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(ERR_MISMATCHED_PARENS);
    }
    Ok(())
}

fn check_pair(formula: &[Chunk], i: usize) -> Result<(), &'static str> {
    let (a, b) = (slot(&formula[i]), slot(&formula[i + 1]));
    match (a, b) {
        (Slot::Binary, Slot::Binary) if !is_unary_minus(formula, i + 1) => {
            Err(ERR_CONSECUTIVE_OPERATORS)
        }
        (Slot::Open, Slot::Binary) if !is_unary_minus(formula, i + 1) => {
            Err(ERR_MISSING_LEFT_OPERAND)
        }
        (Slot::Binary, Slot::Close) => Err(ERR_MISSING_RIGHT_OPERAND),
        (Slot::Open, Slot::Close) => Err(ERR_EMPTY_PARENS),
        (Slot::Operand | Slot::Close, Slot::Operand | Slot::Open) => Err(ERR_MISSING_OPERATOR),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ColumnDescriptor, FunctionConfig, FunctionOp, ValueType};

    fn col(field: &str) -> Chunk {
        Chunk::column(field)
    }

    fn op(op: Operator) -> Chunk {
        Chunk::operator(op)
    }

    fn num(text: &str) -> Chunk {
        Chunk::number(text)
    }

    fn error_of(formula: &[Chunk]) -> Option<&'static str> {
        validate_structure(formula).error
    }

    #[test]
    fn test_single_column_is_valid() {
        assert_eq!(validate_structure(&[col("a")]), ValidationResult::ok());
    }

    #[test]
    fn test_empty_formula() {
        assert_eq!(error_of(&[]), Some(ERR_EMPTY));
    }

    #[test]
    fn test_deep_nesting_is_valid() {
        let mut formula = vec![op(Operator::LeftBracket); 10];
        formula.push(col("a"));
        formula.extend(vec![op(Operator::RightBracket); 10]);
        assert!(validate_structure(&formula).valid);
    }

    #[test]
    fn test_unbalanced_brackets() {
        let open = [op(Operator::LeftBracket), col("a")];
        assert_eq!(error_of(&open), Some(ERR_MISMATCHED_PARENS));

        let close_first = [
            op(Operator::RightBracket),
            col("a"),
            op(Operator::LeftBracket),
        ];
        assert_eq!(error_of(&close_first), Some(ERR_MISMATCHED_PARENS));
    }

    #[test]
    fn test_consecutive_additions_without_variable() {
        let formula = [op(Operator::Addition), op(Operator::Addition)];
        let result = validate_structure(&formula);
        assert!(!result.valid);
        assert!(!result.error.unwrap().is_empty());
    }

    #[test]
    fn test_consecutive_binary_operators_rejected() {
        let formula = [
            col("a"),
            op(Operator::Addition),
            op(Operator::Addition),
            col("b"),
        ];
        assert_eq!(error_of(&formula), Some(ERR_CONSECUTIVE_OPERATORS));
    }

    #[test]
    fn test_unary_minus_before_column_and_number() {
        let column = [
            col("a"),
            op(Operator::Multiplication),
            op(Operator::Subtraction),
            col("b"),
        ];
        assert!(validate_structure(&column).valid);

        let number = [col("a"), op(Operator::Multiplication), num("-5")];
        assert!(validate_structure(&number).valid);

        let minus_number = [
            col("a"),
            op(Operator::Multiplication),
            op(Operator::Subtraction),
            num("5"),
        ];
        assert!(validate_structure(&minus_number).valid);
    }

    #[test]
    fn test_unary_minus_before_bracket_rejected() {
        let formula = [
            col("a"),
            op(Operator::Multiplication),
            op(Operator::Subtraction),
            op(Operator::LeftBracket),
            col("b"),
            op(Operator::RightBracket),
        ];
        assert_eq!(error_of(&formula), Some(ERR_CONSECUTIVE_OPERATORS));
    }

    #[test]
    fn test_leading_operator_rules() {
        assert_eq!(
            error_of(&[op(Operator::Addition), col("a")]),
            Some(ERR_LEADING_OPERATOR)
        );
        assert!(validate_structure(&[op(Operator::Subtraction), col("a")]).valid);
        assert_eq!(
            error_of(&[
                op(Operator::Subtraction),
                op(Operator::LeftBracket),
                col("a"),
                op(Operator::RightBracket),
            ]),
            Some(ERR_LEADING_OPERATOR)
        );
    }

    #[test]
    fn test_trailing_operator_rejected() {
        assert_eq!(
            error_of(&[col("a"), op(Operator::Division)]),
            Some(ERR_TRAILING_OPERATOR)
        );
    }

    #[test]
    fn test_bracket_adjacency() {
        let empty = [
            col("a"),
            op(Operator::Addition),
            op(Operator::LeftBracket),
            op(Operator::RightBracket),
        ];
        assert_eq!(error_of(&empty), Some(ERR_EMPTY_PARENS));

        let dangling = [
            op(Operator::LeftBracket),
            col("a"),
            op(Operator::Addition),
            op(Operator::RightBracket),
        ];
        assert_eq!(error_of(&dangling), Some(ERR_MISSING_RIGHT_OPERAND));

        let leading_in_group = [
            op(Operator::LeftBracket),
            op(Operator::Multiplication),
            col("a"),
            op(Operator::RightBracket),
        ];
        assert_eq!(error_of(&leading_in_group), Some(ERR_MISSING_LEFT_OPERAND));

        let juxtaposed = [
            op(Operator::LeftBracket),
            col("a"),
            op(Operator::RightBracket),
            op(Operator::LeftBracket),
            col("b"),
            op(Operator::RightBracket),
        ];
        assert_eq!(error_of(&juxtaposed), Some(ERR_MISSING_OPERATOR));
    }

    #[test]
    fn test_missing_operator_between_operands() {
        assert_eq!(error_of(&[col("a"), num("2")]), Some(ERR_MISSING_OPERATOR));
    }

    #[test]
    fn test_numbers_only_has_no_variable() {
        let formula = [num("1"), op(Operator::Addition), num("2")];
        assert_eq!(error_of(&formula), Some(ERR_NO_VARIABLE));
    }

    #[test]
    fn test_invalid_number_literal() {
        let formula = [col("a"), op(Operator::Addition), num("1..2")];
        assert_eq!(error_of(&formula), Some(ERR_INVALID_NUMBER));
    }

    #[test]
    fn test_unconfigured_function() {
        let bare = Chunk::function(FunctionConfig::new(FunctionOp::Rank));
        assert_eq!(error_of(&[bare.clone()]), Some(ERR_NO_VARIABLE));

        let formula = [col("a"), op(Operator::Addition), bare];
        assert_eq!(error_of(&formula), Some(ERR_INCOMPLETE_FUNCTION));
    }

    #[test]
    fn test_unknown_column_needs_catalog() {
        let catalog = ColumnCatalog::new(vec![ColumnDescriptor::new(
            "a",
            "A",
            ValueType::Quantity,
        )]);
        let formula = [col("a"), op(Operator::Addition), col("zzz")];
        assert!(validate_structure(&formula).valid);
        assert_eq!(
            validate_formula(&formula, &catalog).error,
            Some(ERR_UNKNOWN_COLUMN)
        );

        let rank = Chunk::function(FunctionConfig::new(FunctionOp::Rank).with_column("zzz"));
        assert_eq!(
            validate_formula(&[rank], &catalog).error,
            Some(ERR_UNKNOWN_COLUMN)
        );
    }
}
