//! Formula engine API.
//!
//! - `chunk`, `column`: the formula data model and the table's column catalog
//! - `validate`, `unify`: structural checks and result-type inference
//! - `build`, `guard`: query-expression text and the division guard
//! - `compile`, `window`: preview evaluation through Rhai

mod build;
mod chunk;
mod column;
mod compile;
mod eval;
mod expr;
mod format;
mod guard;
mod unify;
mod validate;
mod value;
mod window;

pub use build::{build_expression, persisted_expression, summary_text};
pub use chunk::{
    Chunk, ChunkKind, ChunkValue, FunctionConfig, FunctionOp, Operator, parse_number_literal,
};
pub use column::{ColumnCatalog, ColumnDescriptor, ValueType};
pub use compile::{
    CompiledColumn, MutationType, Mutator, MutatorParams, RowEvalFn, compile_column,
    compile_formula,
};
pub use eval::{compile_script, create_engine};
pub use expr::{BinaryOp, Expr, ExprKind, Span, parse_expression};
pub use format::{format_number, format_value};
pub use guard::{
    guard_divisions, normalize_coalesce_parentheses, transform_division_expression,
    try_transform_division_expression,
};
pub use unify::{formula_result_type, function_result_type, unify_types};
pub use validate::{
    ERR_CONSECUTIVE_OPERATORS, ERR_EMPTY, ERR_EMPTY_PARENS, ERR_INCOMPLETE_FUNCTION,
    ERR_INVALID_NUMBER, ERR_LEADING_OPERATOR, ERR_MISMATCHED_PARENS, ERR_MISSING_LEFT_OPERAND,
    ERR_MISSING_OPERATOR, ERR_MISSING_RIGHT_OPERAND, ERR_NO_VARIABLE, ERR_TRAILING_OPERATOR,
    ERR_UNKNOWN_COLUMN, ValidationResult, validate_formula, validate_structure,
};
pub use value::CellValue;

pub use rhai::AST;
