//! Rhai engine creation for preview evaluation.
//!
//! Compiled formulas are `let` bindings over calls to the operator built-ins
//! (`ADD`, `DIV`, ...), so the engine only needs those registered.

use rhai::Engine;

use super::AST;
use crate::error::{EngineError, Result};

/// Create a Rhai engine with the operator built-ins registered.
pub fn create_engine() -> Engine {
    let mut engine = Engine::new();
    crate::builtins::register_builtins(&mut engine);
    engine
}

/// Compile a lowered formula script into an AST.
pub fn compile_script(engine: &Engine, script: &str) -> Result<AST> {
    engine
        .compile(script)
        .map_err(|e| EngineError::RhaiCompile(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rhai::{Dynamic, Scope};

    #[test]
    fn test_compiled_script_reads_scope_arrays() {
        let engine = create_engine();
        let ast = compile_script(&engine, "DIV(row[0], lits[0])").unwrap();

        let mut scope = Scope::new();
        scope.push_constant("row", vec![Dynamic::from(9.0_f64)]);
        scope.push_constant("lits", vec![Dynamic::from(3.0_f64)]);
        let result: f64 = engine.eval_ast_with_scope(&mut scope, &ast).unwrap();
        assert_eq!(result, 3.0);
    }

    #[test]
    fn test_let_bindings_yield_last_value() {
        let engine = create_engine();
        let ast = compile_script(&engine, "let t0 = ADD(row[0], row[0]);\nMUL(t0, row[0])").unwrap();

        let mut scope = Scope::new();
        scope.push_constant("row", vec![Dynamic::from(3.0_f64)]);
        let result: f64 = engine.eval_ast_with_scope(&mut scope, &ast).unwrap();
        assert_eq!(result, 18.0);
    }

    #[test]
    fn test_syntax_errors_are_reported() {
        let engine = create_engine();
        assert!(matches!(
            compile_script(&engine, "ADD(row[0],"),
            Err(EngineError::RhaiCompile(_))
        ));
    }
}
