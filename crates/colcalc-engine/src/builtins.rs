//! Built-in formula functions (Rust) and their metadata.
//!
//! Conventions:
//! - Operators lower to ALLCAPS Rhai calls (`a + b` becomes `ADD(a, b)`), so
//!   precedence is already resolved by the time Rhai sees the script.
//! - Window functions are the only callable functions. If you add one, add a
//!   `WINDOW_BUILTINS` entry and handle it in `engine::window` and
//!   `engine::build`.

use rhai::{Dynamic, Engine};

use crate::engine::{FunctionOp, Operator};

pub struct WindowBuiltin {
    pub name: &'static str,
    pub needs_window: bool,
    pub description: &'static str,
}

/// Indexed by [`window_builtin`].
pub const WINDOW_BUILTINS: &[WindowBuiltin] = &[
    WindowBuiltin {
        name: "RANK",
        needs_window: false,
        description: "Rank of the row's value, largest first",
    },
    WindowBuiltin {
        name: "RUNNING_SUM",
        needs_window: false,
        description: "Cumulative sum in table order",
    },
    WindowBuiltin {
        name: "MOVING_AVERAGE",
        needs_window: true,
        description: "Mean over a trailing window of rows",
    },
    WindowBuiltin {
        name: "PERCENT_OF_TOTAL",
        needs_window: false,
        description: "Share of the column total",
    },
];

pub fn window_builtin(op: FunctionOp) -> &'static WindowBuiltin {
    let index = match op {
        FunctionOp::Rank => 0,
        FunctionOp::RunningSum => 1,
        FunctionOp::MovingAverage => 2,
        FunctionOp::PercentOfTotal => 3,
    };
    &WINDOW_BUILTINS[index]
}

/// Rhai function a binary operator lowers to. Brackets have none.
pub fn operator_rhai_name(op: Operator) -> Option<&'static str> {
    match op {
        Operator::Addition => Some("ADD"),
        Operator::Subtraction => Some("SUB"),
        Operator::Multiplication => Some("MUL"),
        Operator::Division => Some("DIV"),
        Operator::Concat => Some("CONCAT"),
        Operator::LeftBracket | Operator::RightBracket => None,
    }
}

/// Numeric view of a Rhai value: floats, ints and numeric strings.
fn number(value: &Dynamic) -> Option<f64> {
    if value.is_unit() {
        return None;
    }
    if let Ok(n) = value.as_float() {
        return Some(n);
    }
    if let Ok(n) = value.as_int() {
        return Some(n as f64);
    }
    if value.is_string() {
        let text = value.clone().into_string().ok()?;
        return text.trim().parse::<f64>().ok().filter(|n| n.is_finite());
    }
    None
}

fn display(value: &Dynamic) -> Option<String> {
    if value.is_unit() {
        return None;
    }
    if value.is_string() {
        return value.clone().into_string().ok();
    }
    number(value).map(|n| n.to_string())
}

/// Null in, null out; non-finite results are null as well.
fn arithmetic(a: &Dynamic, b: &Dynamic, f: impl Fn(f64, f64) -> f64) -> Dynamic {
    match (number(a), number(b)) {
        (Some(x), Some(y)) => {
            let r = f(x, y);
            if r.is_finite() {
                Dynamic::from(r)
            } else {
                Dynamic::UNIT
            }
        }
        _ => Dynamic::UNIT,
    }
}

/// `COALESCE(a / NULLIF(b, 0), 0)`: anything that would be null becomes 0.
fn guarded_div(a: &Dynamic, b: &Dynamic) -> Dynamic {
    match (number(a), number(b)) {
        (Some(x), Some(y)) if y != 0.0 => {
            let r = x / y;
            if r.is_finite() {
                Dynamic::from(r)
            } else {
                Dynamic::from(0.0_f64)
            }
        }
        _ => Dynamic::from(0.0_f64),
    }
}

/// Register all built-in functions into the Rhai engine.
pub fn register_builtins(engine: &mut Engine) {
    engine.register_fn("ADD", |a: Dynamic, b: Dynamic| -> Dynamic {
        arithmetic(&a, &b, |x, y| x + y)
    });
    engine.register_fn("SUB", |a: Dynamic, b: Dynamic| -> Dynamic {
        arithmetic(&a, &b, |x, y| x - y)
    });
    engine.register_fn("MUL", |a: Dynamic, b: Dynamic| -> Dynamic {
        arithmetic(&a, &b, |x, y| x * y)
    });
    engine.register_fn("DIV", |a: Dynamic, b: Dynamic| -> Dynamic { guarded_div(&a, &b) });

    engine.register_fn("NEG", |a: Dynamic| -> Dynamic {
        match number(&a) {
            Some(n) => Dynamic::from(-n),
            None => Dynamic::UNIT,
        }
    });

    // CONCAT(a, b): SQL `||`, null if either side is null
    engine.register_fn("CONCAT", |a: Dynamic, b: Dynamic| -> Dynamic {
        match (display(&a), display(&b)) {
            (Some(x), Some(y)) => Dynamic::from(format!("{}{}", x, y)),
            _ => Dynamic::UNIT,
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Engine {
        let mut engine = Engine::new();
        register_builtins(&mut engine);
        engine
    }

    #[test]
    fn test_every_function_op_has_metadata() {
        assert_eq!(
            FunctionOp::all().map(FunctionOp::name),
            ["RANK", "RUNNING_SUM", "MOVING_AVERAGE", "PERCENT_OF_TOTAL"]
        );
        for op in FunctionOp::all() {
            assert!(!op.description().is_empty());
        }
        assert_eq!(FunctionOp::MovingAverage.name(), "MOVING_AVERAGE");
        assert!(FunctionOp::MovingAverage.needs_window());
    }

    #[test]
    fn test_operator_rhai_name_mapping() {
        assert_eq!(operator_rhai_name(Operator::Division), Some("DIV"));
        assert_eq!(operator_rhai_name(Operator::LeftBracket), None);
    }

    #[test]
    fn test_div_by_zero_is_zero() {
        let engine = engine();
        let result: f64 = engine.eval("DIV(5.0, 0.0)").unwrap();
        assert_eq!(result, 0.0);
        let result: f64 = engine.eval("DIV((), 2.0)").unwrap();
        assert_eq!(result, 0.0);
        let result: f64 = engine.eval("DIV(9.0, 3)").unwrap();
        assert_eq!(result, 3.0);
    }

    #[test]
    fn test_arithmetic_propagates_null() {
        let engine = engine();
        let result: Dynamic = engine.eval("ADD((), 1.0)").unwrap();
        assert!(result.is_unit());
        let result: Dynamic = engine.eval(r#"MUL("east", 2.0)"#).unwrap();
        assert!(result.is_unit());
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let engine = engine();
        let result: f64 = engine.eval(r#"SUB("10", 4.0)"#).unwrap();
        assert_eq!(result, 6.0);
    }

    #[test]
    fn test_concat_joins_display_text() {
        let engine = engine();
        let result: String = engine.eval(r#"CONCAT("unit-", 5.0)"#).unwrap();
        assert_eq!(result, "unit-5");
        let result: Dynamic = engine.eval(r#"CONCAT("a", ())"#).unwrap();
        assert!(result.is_unit());
    }
}
