//! The editor's derived state as a pure function of its inputs.

use colcalc_engine::engine::{
    Chunk, ColumnCatalog, CompiledColumn, Mutator, ValueType, compile_column,
    formula_result_type, validate_formula,
};
use log::{debug, warn};

/// Everything the host needs to render the editor after a change.
#[derive(Clone, Debug, Default)]
pub struct EditorOutput {
    pub is_valid: bool,
    pub error: Option<String>,
    pub result_type: Option<ValueType>,
    /// Present once the formula is valid and the column has a name.
    pub compiled: Option<CompiledColumn>,
}

impl EditorOutput {
    pub fn mutator(&self) -> Option<&Mutator> {
        self.compiled.as_ref().map(|c| &c.mutator)
    }

    pub fn summary(&self) -> Option<&str> {
        self.compiled.as_ref().map(|c| c.summary.as_str())
    }

    pub fn expression(&self) -> Option<&str> {
        self.compiled.as_ref().map(|c| c.expression.as_str())
    }

    fn invalid(error: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Validate, type and compile a formula for a column called `name`.
pub fn reduce(formula: &[Chunk], catalog: &ColumnCatalog, name: &str) -> EditorOutput {
    let verdict = validate_formula(formula, catalog);
    if !verdict.valid {
        return EditorOutput::invalid(verdict.error.unwrap_or("Invalid formula"));
    }

    let result_type = formula_result_type(formula, catalog);
    let name = name.trim();
    if name.is_empty() {
        return EditorOutput {
            is_valid: true,
            result_type,
            ..EditorOutput::default()
        };
    }

    let field = catalog.unique_field_for(name);
    match compile_column(&field, name, formula, catalog) {
        Ok(compiled) => {
            debug!("compiled column {} as {}", field, compiled.mutator.script());
            EditorOutput {
                is_valid: true,
                error: None,
                result_type: Some(compiled.result_type),
                compiled: Some(compiled),
            }
        }
        Err(e) => {
            warn!("formula passed validation but failed to compile: {}", e);
            EditorOutput::invalid(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colcalc_engine::engine::{
        ColumnDescriptor, ERR_CONSECUTIVE_OPERATORS, ERR_EMPTY, Operator,
    };

    fn catalog() -> ColumnCatalog {
        ColumnCatalog::new(vec![
            ColumnDescriptor::new("revenue", "Revenue", ValueType::DollarAmt),
            ColumnDescriptor::new("units", "Units", ValueType::Quantity),
        ])
    }

    #[test]
    fn test_invalid_formula_reports_error() {
        let output = reduce(&[], &catalog(), "Total");
        assert!(!output.is_valid);
        assert_eq!(output.error.as_deref(), Some(ERR_EMPTY));
        assert!(output.compiled.is_none());

        let formula = [
            Chunk::column("revenue"),
            Chunk::operator(Operator::Addition),
            Chunk::operator(Operator::Addition),
            Chunk::column("units"),
        ];
        let output = reduce(&formula, &catalog(), "Total");
        assert_eq!(output.error.as_deref(), Some(ERR_CONSECUTIVE_OPERATORS));
    }

    #[test]
    fn test_valid_without_name_has_type_only() {
        let output = reduce(&[Chunk::column("revenue")], &catalog(), "  ");
        assert!(output.is_valid);
        assert_eq!(output.result_type, Some(ValueType::DollarAmt));
        assert!(output.compiled.is_none());
        assert_eq!(output.summary(), None);
    }

    #[test]
    fn test_named_formula_compiles() {
        let formula = [
            Chunk::column("revenue"),
            Chunk::operator(Operator::Division),
            Chunk::column("units"),
        ];
        let output = reduce(&formula, &catalog(), "Unit Price");
        assert!(output.is_valid);
        assert_eq!(output.error, None);
        assert_eq!(output.result_type, Some(ValueType::Quantity));
        assert_eq!(output.summary(), Some("= Revenue / Units"));
        assert_eq!(
            output.expression(),
            Some("COALESCE(revenue / NULLIF(units, 0), 0)")
        );
        let compiled = output.compiled.as_ref().unwrap();
        assert_eq!(compiled.field, "unit_price");
        assert_eq!(compiled.title, "Unit Price");
    }
}
