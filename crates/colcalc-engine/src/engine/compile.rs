//! Compiling a formula into a preview mutator.
//!
//! The chunk list is parsed with precedence climbing into a small term tree
//! and lowered to a flat sequence of calls on the operator built-ins, one
//! `let` per intermediate result:
//!
//! ```text
//! Revenue / (Units - 2)   =>   let t0 = SUB(row[1], lits[0]);
//!                              DIV(row[0], t0)
//! ```
//!
//! Every statement nests at most one call deep, so the script stays within
//! Rhai's expression depth limit however long the formula is.
//!
//! `row`, `lits` and `win` are scope constants supplied per evaluation, so a
//! compiled formula never embeds row data in its script.

use std::fmt;
use std::sync::Arc;

use log::{debug, warn};
use rhai::{AST, Array, Dynamic, Engine, Scope};

use super::build::{ensure_valid, persisted_expression, summary_text};
use super::chunk::{Chunk, ChunkValue, Operator, parse_number_literal};
use super::column::{ColumnCatalog, ColumnDescriptor, ValueType};
use super::eval::{compile_script, create_engine};
use super::unify::formula_result_type;
use super::value::CellValue;
use super::window::{WindowInput, window_inputs};
use crate::builtins::operator_rhai_name;
use crate::error::{EngineError, Result};

/// Why a mutator is being called; the preview does not distinguish them.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MutationType {
    #[default]
    Data,
    Edit,
}

/// Extra per-row inputs handed to a mutator.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MutatorParams {
    /// This row's window function values, in formula order.
    pub window: Vec<CellValue>,
}

/// Callback form of a mutator: `(value, row, mutation, params) -> value`.
pub type RowEvalFn =
    Arc<dyn Fn(&CellValue, &[CellValue], MutationType, &MutatorParams) -> CellValue + Send + Sync>;

#[derive(Clone, Debug, PartialEq)]
enum Term {
    Cell(usize),
    Literal(usize),
    Window(usize),
    Neg(Box<Term>),
    Binary(&'static str, Box<Term>, Box<Term>),
}

impl Term {
    /// Rhai text for this term. Operands that are calls themselves are bound
    /// to a fresh `let` in `lets` first and referenced by name.
    fn lower(&self, lets: &mut Vec<String>) -> String {
        match self {
            Term::Cell(i) => format!("row[{}]", i),
            Term::Literal(i) => format!("lits[{}]", i),
            Term::Window(i) => format!("win[{}]", i),
            Term::Neg(inner) => format!("NEG({})", inner.bind(lets)),
            Term::Binary(name, lhs, rhs) => {
                let lhs = lhs.bind(lets);
                let rhs = rhs.bind(lets);
                format!("{}({}, {})", name, lhs, rhs)
            }
        }
    }

    fn bind(&self, lets: &mut Vec<String>) -> String {
        let text = self.lower(lets);
        if matches!(self, Term::Cell(_) | Term::Literal(_) | Term::Window(_)) {
            return text;
        }
        let name = format!("t{}", lets.len());
        lets.push(format!("let {} = {};", name, text));
        name
    }

    fn to_script(&self) -> String {
        let mut lets = Vec::new();
        let result = self.lower(&mut lets);
        lets.push(result);
        lets.join("\n")
    }
}

struct TermParser<'a> {
    formula: &'a [Chunk],
    catalog: &'a ColumnCatalog,
    pos: usize,
    literals: Array,
    windows: Vec<WindowInput>,
}

impl<'a> TermParser<'a> {
    fn new(formula: &'a [Chunk], catalog: &'a ColumnCatalog) -> Self {
        Self {
            formula,
            catalog,
            pos: 0,
            literals: Array::new(),
            windows: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<(Term, Array, Vec<WindowInput>)> {
        let term = self.expr(0)?;
        if self.pos != self.formula.len() {
            return Err(self.error("unexpected chunk after end of formula"));
        }
        Ok((term, self.literals, self.windows))
    }

    fn error(&self, message: &str) -> EngineError {
        EngineError::Parse {
            position: self.pos,
            message: message.to_string(),
        }
    }

    fn peek_binary(&self) -> Option<Operator> {
        self.formula
            .get(self.pos)?
            .as_operator()
            .filter(|op| op.is_binary())
    }

    fn expr(&mut self, min_prec: u8) -> Result<Term> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek_binary() {
            if op.precedence() < min_prec {
                break;
            }
            let name = operator_rhai_name(op).ok_or_else(|| self.error("not a binary operator"))?;
            self.pos += 1;
            let rhs = self.expr(op.precedence() + 1)?;
            lhs = Term::Binary(name, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Term> {
        let chunk = self.formula.get(self.pos);
        if chunk.and_then(Chunk::as_operator) == Some(Operator::Subtraction) {
            self.pos += 1;
            return Ok(Term::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Term> {
        let chunk = self
            .formula
            .get(self.pos)
            .ok_or_else(|| self.error("unexpected end of formula"))?;
        self.pos += 1;
        match chunk.value() {
            ChunkValue::Column(field) => self
                .catalog
                .position(field)
                .map(Term::Cell)
                .ok_or_else(|| EngineError::UnknownColumn(field.clone())),
            ChunkValue::Number(text) => {
                let n = parse_number_literal(text).ok_or_else(|| self.error("invalid number"))?;
                self.literals.push(Dynamic::from(n));
                Ok(Term::Literal(self.literals.len() - 1))
            }
            ChunkValue::Function(config) => {
                self.windows.push(WindowInput::resolve(config, self.catalog)?);
                Ok(Term::Window(self.windows.len() - 1))
            }
            ChunkValue::Operator(Operator::LeftBracket) => {
                let inner = self.expr(0)?;
                match self.formula.get(self.pos).and_then(Chunk::as_operator) {
                    Some(Operator::RightBracket) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(self.error("expected ')'")),
                }
            }
            ChunkValue::Operator(op) => Err(EngineError::Parse {
                position: self.pos - 1,
                message: format!("unexpected operator '{}'", op.symbol()),
            }),
        }
    }
}

/// A compiled formula that computes one cell of the derived column.
#[derive(Clone)]
pub struct Mutator {
    engine: Arc<Engine>,
    ast: Arc<AST>,
    script: String,
    width: usize,
    literals: Array,
    windows: Vec<WindowInput>,
}

impl fmt::Debug for Mutator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutator")
            .field("script", &self.script)
            .field("windows", &self.windows.len())
            .finish()
    }
}

impl Mutator {
    /// The lowered Rhai script, e.g. `DIV(row[0], row[1])`.
    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn uses_window_functions(&self) -> bool {
        !self.windows.is_empty()
    }

    /// Per-row window values for a whole table, one `Vec` per row.
    pub fn window_inputs(&self, rows: &[Vec<CellValue>]) -> Vec<Vec<CellValue>> {
        window_inputs(&self.windows, rows)
    }

    /// Evaluate one row. `row` is in catalog order; missing trailing cells
    /// read as null. Evaluation errors are logged and yield null.
    pub fn evaluate(&self, row: &[CellValue], window: &[CellValue]) -> CellValue {
        let row: Array = (0..self.width)
            .map(|i| row.get(i).map(CellValue::to_dynamic).unwrap_or(Dynamic::UNIT))
            .collect();
        let mut win: Array = window.iter().map(CellValue::to_dynamic).collect();
        win.resize(self.windows.len(), Dynamic::UNIT);

        let mut scope = Scope::new();
        scope.push_constant("row", row);
        scope.push_constant("lits", self.literals.clone());
        scope.push_constant("win", win);

        match self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &self.ast)
        {
            Ok(value) => CellValue::from_dynamic(value),
            Err(e) => {
                warn!("evaluating {} failed: {}", self.script, e);
                CellValue::Null
            }
        }
    }

    /// Evaluate every row of a table, window functions included.
    pub fn evaluate_table(&self, rows: &[Vec<CellValue>]) -> Vec<CellValue> {
        if !self.uses_window_functions() {
            return rows.iter().map(|row| self.evaluate(row, &[])).collect();
        }
        let windows = self.window_inputs(rows);
        rows.iter()
            .zip(windows.iter())
            .map(|(row, window)| self.evaluate(row, window))
            .collect()
    }

    /// Wrap this mutator as a grid callback. The cell's own value and the
    /// mutation type are ignored.
    pub fn row_fn(&self) -> RowEvalFn {
        let mutator = self.clone();
        Arc::new(
            move |_value: &CellValue,
                  row: &[CellValue],
                  _mutation: MutationType,
                  params: &MutatorParams|
                  -> CellValue { mutator.evaluate(row, &params.window) },
        )
    }
}

/// Compile a formula into a mutator. The formula must pass validation.
pub fn compile_formula(formula: &[Chunk], catalog: &ColumnCatalog) -> Result<Mutator> {
    ensure_valid(formula, catalog)?;
    let (term, literals, windows) = TermParser::new(formula, catalog).parse()?;
    let script = term.to_script();
    debug!("compiled formula to {}", script);

    let engine = create_engine();
    let ast = compile_script(&engine, &script)?;
    Ok(Mutator {
        engine: Arc::new(engine),
        ast: Arc::new(ast),
        script,
        width: catalog.len(),
        literals,
        windows,
    })
}

/// Everything the editor needs to add a derived column to the preview.
#[derive(Clone, Debug)]
pub struct CompiledColumn {
    pub field: String,
    pub title: String,
    pub result_type: ValueType,
    pub mutator: Mutator,
    /// Readable formula, e.g. `= Revenue / Units`.
    pub summary: String,
    /// Guarded query expression to persist.
    pub expression: String,
}

impl CompiledColumn {
    /// Catalog entry for the derived column.
    pub fn descriptor(&self) -> ColumnDescriptor {
        let mut descriptor =
            ColumnDescriptor::new(self.field.clone(), self.title.clone(), self.result_type);
        descriptor.expression = Some(self.expression.clone());
        descriptor
    }
}

pub fn compile_column(
    field: &str,
    title: &str,
    formula: &[Chunk],
    catalog: &ColumnCatalog,
) -> Result<CompiledColumn> {
    let mutator = compile_formula(formula, catalog)?;
    let result_type = formula_result_type(formula, catalog).ok_or_else(|| {
        EngineError::InvalidFormula("result type cannot be inferred".to_string())
    })?;
    Ok(CompiledColumn {
        field: field.to_string(),
        title: title.to_string(),
        result_type,
        mutator,
        summary: summary_text(formula, catalog)?,
        expression: persisted_expression(formula, catalog)?,
    })
}
