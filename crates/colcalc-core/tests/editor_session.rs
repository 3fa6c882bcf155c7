//! Editing sessions driven through the public API with an explicit clock.

use std::time::{Duration, Instant};

use colcalc_core::storage::parse_session;
use colcalc_core::{ColumnEditor, CoreError, DEFAULT_NEW_COLUMN_CLASS};
use colcalc_engine::engine::{
    CellValue, Chunk, ChunkValue, ColumnCatalog, ColumnDescriptor, ERR_INCOMPLETE_FUNCTION,
    FunctionConfig, FunctionOp, Operator, ValueType, transform_division_expression,
};

const MS: Duration = Duration::from_millis(1);

fn catalog() -> ColumnCatalog {
    ColumnCatalog::new(vec![
        ColumnDescriptor::new("region", "Region", ValueType::String),
        ColumnDescriptor::new("revenue", "Revenue", ValueType::DollarAmt),
        ColumnDescriptor::new("units", "Units", ValueType::Quantity),
    ])
}

fn rows() -> Vec<Vec<CellValue>> {
    vec![
        vec!["east".into(), 100.0.into(), 4.0.into()],
        vec!["west".into(), 50.0.into(), 0.0.into()],
        vec!["north".into(), 300.0.into(), 6.0.into()],
    ]
}

#[test]
fn build_formula_step_by_step() {
    let t0 = Instant::now();
    let mut editor = ColumnEditor::new(catalog());

    editor.push_chunk(Chunk::column("revenue"), t0);
    editor.push_chunk(Chunk::operator(Operator::Division), t0);
    editor.tick(t0);
    assert!(!editor.output().is_valid);

    editor.push_chunk(Chunk::column("units"), t0 + MS);
    editor.set_name("Unit Price", t0 + MS);
    editor.tick(t0 + MS);
    let output = editor.output();
    assert!(output.is_valid);
    assert_eq!(output.summary(), Some("= Revenue / Units"));

    let preview = editor.preview_column(DEFAULT_NEW_COLUMN_CLASS).unwrap();
    assert_eq!(
        preview.fill(&rows()),
        vec![
            CellValue::Number(25.0),
            CellValue::Number(0.0),
            CellValue::Number(50.0)
        ]
    );
}

#[test]
fn saving_division_persists_guarded_expression() {
    let t0 = Instant::now();
    let mut editor = ColumnEditor::new(catalog());
    for chunk in [
        Chunk::column("revenue"),
        Chunk::operator(Operator::Division),
        Chunk::column("units"),
    ] {
        editor.push_chunk(chunk, t0);
    }
    editor.set_name("Unit Price", t0);

    let mut added = Vec::new();
    editor.save(|column| added.push(column)).unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(
        added[0].expression.as_deref(),
        Some(transform_division_expression("revenue / units").as_str())
    );
}

#[test]
fn unconfigured_function_blocks_save() {
    let t0 = Instant::now();
    let mut editor = ColumnEditor::new(catalog());
    editor.push_chunk(Chunk::column("units"), t0);
    editor.push_chunk(Chunk::operator(Operator::Multiplication), t0);
    editor.push_chunk(Chunk::function(FunctionConfig::new(FunctionOp::MovingAverage)), t0);
    editor.set_name("Smoothed", t0);

    let err = editor.confirm(|_| panic!("must not be called")).unwrap_err();
    match err {
        CoreError::NotSavable(reason) => assert_eq!(reason, ERR_INCOMPLETE_FUNCTION),
        other => panic!("unexpected error: {other}"),
    }

    let config = FunctionConfig::new(FunctionOp::MovingAverage)
        .with_column("revenue")
        .with_window(2);
    editor
        .update_chunk(2, ChunkValue::Function(config), t0 + MS)
        .unwrap();
    let mut confirmed = Vec::new();
    editor.confirm(|columns| confirmed = columns).unwrap();
    assert_eq!(confirmed.len(), 4);
    assert_eq!(confirmed[3].field, "smoothed");
    assert_eq!(
        confirmed[3].expression.as_deref(),
        Some("units * AVG(revenue) OVER (ROWS BETWEEN 1 PRECEDING AND CURRENT ROW)")
    );
}

#[test]
fn rename_reaches_preview_after_quiet_period() {
    let session = parse_session(
        r#"
name = "Total"

[[columns]]
field = "revenue"
title = "Revenue"
value_type = "DOLLAR_AMT"

[[formula]]
column = "revenue"
"#,
    )
    .unwrap();
    let t0 = Instant::now();
    let mut editor = session.editor(Duration::from_millis(500));
    assert_eq!(editor.preview_title(), "Total");

    editor.set_name("Grand", t0);
    editor.set_name("Grand Total", t0 + 400 * MS);
    assert_eq!(editor.tick(t0 + 500 * MS).renamed, None);
    assert_eq!(
        editor.tick(t0 + 900 * MS).renamed.as_deref(),
        Some("Grand Total")
    );
    let preview = editor.preview_column("column-new").unwrap();
    assert_eq!(preview.title, "Grand Total");
    assert_eq!(preview.field, "grand_total");
}

#[test]
fn superseded_recompile_never_lands() {
    let t0 = Instant::now();
    let mut editor = ColumnEditor::new(catalog());
    editor.set_name("Share", t0);
    editor.push_chunk(
        Chunk::function(FunctionConfig::new(FunctionOp::PercentOfTotal).with_column("revenue")),
        t0,
    );
    let stale = editor.take_recompile(t0).unwrap();
    editor.remove_chunk(0, t0 + MS).unwrap();
    let fresh = editor.take_recompile(t0 + MS).unwrap();

    let fresh_output = fresh.run();
    assert!(editor.apply_recompile(&fresh, fresh_output));
    assert!(!editor.apply_recompile(&stale, stale.run()));
    assert!(!editor.output().is_valid);
    assert!(editor.is_up_to_date());
}
