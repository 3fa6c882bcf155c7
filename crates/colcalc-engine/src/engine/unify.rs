//! Result-type unification for derived columns.

use super::chunk::{Chunk, ChunkValue, FunctionConfig, FunctionOp};
use super::column::{ColumnCatalog, ValueType};

/// Collapse the types referenced by a formula into one result type.
///
/// Identical types win outright; otherwise STRING dominates, a mixture of
/// numeric subtypes becomes QUANTITY, and anything else falls back to STRING.
/// Returns None when there is nothing to unify.
pub fn unify_types<I>(types: I) -> Option<ValueType>
where
    I: IntoIterator<Item = ValueType>,
{
    let types: Vec<ValueType> = types.into_iter().collect();
    let first = *types.first()?;

    if types.iter().all(|t| *t == first) {
        return Some(first);
    }
    if types.contains(&ValueType::String) {
        return Some(ValueType::String);
    }
    if types.iter().all(|t| t.is_numeric()) {
        return Some(ValueType::Quantity);
    }
    Some(ValueType::String)
}

/// Result type of a configured window function.
pub fn function_result_type(config: &FunctionConfig, catalog: &ColumnCatalog) -> Option<ValueType> {
    match config.op {
        FunctionOp::Rank => Some(ValueType::Quantity),
        FunctionOp::PercentOfTotal => Some(ValueType::Percent),
        FunctionOp::RunningSum | FunctionOp::MovingAverage => {
            let field = config.column.as_deref()?;
            catalog.get(field).map(|c| c.value_type)
        }
    }
}

/// Result type of a formula, from its column and configured function chunks.
/// Number literals do not take part.
pub fn formula_result_type(formula: &[Chunk], catalog: &ColumnCatalog) -> Option<ValueType> {
    let types = formula.iter().filter_map(|chunk| match chunk.value() {
        ChunkValue::Column(field) => catalog.get(field).map(|c| c.value_type),
        ChunkValue::Function(config) if config.is_configured() => {
            function_result_type(config, catalog)
        }
        _ => None,
    });
    unify_types(types)
}
