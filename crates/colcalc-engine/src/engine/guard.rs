//! Division-by-zero guarding for persisted expressions.
//!
//! Every division `l / r` is rewritten to `COALESCE(l / NULLIF(r, 0), 0)`.
//! The rewrite works on the expression tree, so it only ever touches real
//! division nodes and never double-applies:
//!
//! - a division that is already the first argument of `COALESCE(_, 0)` with a
//!   `NULLIF(_, 0)` divisor is left alone;
//! - a division whose divisor is already `NULLIF(_, 0)` only gets the
//!   `COALESCE` wrap.
//!
//! Redundant parentheses a previous guard may have left inside `COALESCE`
//! are collapsed first, so the output is always in canonical form.

use log::{debug, warn};

use super::expr::{BinaryOp, Expr, ExprKind, parse_expression};
use crate::error::Result;

/// Guard every division in `expression`. Text that does not parse is returned unchanged.
pub fn transform_division_expression(expression: &str) -> String {
    if expression.trim().is_empty() {
        return expression.to_string();
    }
    match try_transform_division_expression(expression) {
        Ok(guarded) => guarded,
        Err(err) => {
            warn!("leaving expression unguarded: {}", err);
            expression.to_string()
        }
    }
}

/// Like [`transform_division_expression`], but reports text that does not parse.
pub fn try_transform_division_expression(expression: &str) -> Result<String> {
    let tree = parse_expression(expression)?;
    let guarded = guard_divisions(normalize_tree(tree)).to_string();
    if guarded != expression {
        debug!("guarded expression: {} -> {}", expression, guarded);
    }
    Ok(guarded)
}

/// Collapse doubled parentheses inside `COALESCE` calls, leaving every other
/// byte of the input untouched:
///
/// - `COALESCE((x / NULLIF(y, 0), 0))` becomes `COALESCE(x / NULLIF(y, 0), 0)`
/// - `COALESCE((x / NULLIF(y, 0)), 0)` becomes `COALESCE(x / NULLIF(y, 0), 0)`
pub fn normalize_coalesce_parentheses(expression: &str) -> String {
    let Ok(tree) = parse_expression(expression) else {
        return expression.to_string();
    };

    let mut removals = Vec::new();
    collect_redundant_parens(&tree, &mut removals);
    if removals.is_empty() {
        return expression.to_string();
    }

    removals.sort_unstable();
    removals.dedup();
    let mut out = String::with_capacity(expression.len());
    let mut removals = removals.into_iter().peekable();
    for (i, ch) in expression.char_indices() {
        if removals.peek() == Some(&i) {
            removals.next();
            continue;
        }
        out.push(ch);
    }
    out
}

/// Rewrite every unguarded division node.
pub fn guard_divisions(expr: Expr) -> Expr {
    let span = expr.span.clone();
    match expr.kind {
        ExprKind::Call {
            name,
            mut args,
            over,
        } if over.is_none() && is_guarded_coalesce(&name, &args) => {
            // Already guarded: only the operands of the division are visited.
            let first = args.remove(0);
            let division = match first.kind {
                ExprKind::Binary { op, lhs, rhs } => Expr::new(
                    ExprKind::Binary {
                        op,
                        lhs: Box::new(guard_divisions(*lhs)),
                        rhs: Box::new(guard_divisions(*rhs)),
                    },
                    first.span,
                ),
                kind => guard_divisions(Expr::new(kind, first.span)),
            };
            args.insert(0, division);
            Expr::new(ExprKind::Call { name, args, over }, span)
        }
        ExprKind::Binary {
            op: BinaryOp::Div,
            lhs,
            rhs,
        } => {
            let lhs = guard_divisions(*lhs);
            let rhs = guard_divisions(*rhs);
            let rhs = if is_nullif_zero(&rhs) {
                rhs
            } else {
                let rhs_span = rhs.span.clone();
                Expr::call(
                    "NULLIF",
                    vec![rhs, Expr::number("0", rhs_span.end..rhs_span.end)],
                    rhs_span,
                )
            };
            let division = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::Div,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span.clone(),
            );
            Expr::call(
                "COALESCE",
                vec![division, Expr::number("0", span.end..span.end)],
                span,
            )
        }
        other => Expr::new(map_children(other, guard_divisions), span),
    }
}

/// Tree counterpart of [`normalize_coalesce_parentheses`].
pub(crate) fn normalize_tree(expr: Expr) -> Expr {
    let span = expr.span.clone();
    match map_children(expr.kind, normalize_tree) {
        ExprKind::Call {
            name,
            mut args,
            over: None,
        } if name.eq_ignore_ascii_case("COALESCE") => {
            if args.len() == 1 && matches!(args[0].kind, ExprKind::List(_)) {
                if let ExprKind::List(items) = args.remove(0).kind {
                    args = items;
                }
            }
            if args.len() == 2 && args[1].is_zero() {
                let first = args.remove(0);
                args.insert(0, strip_groups_around_guarded_division(first));
            }
            Expr::new(
                ExprKind::Call {
                    name,
                    args,
                    over: None,
                },
                span,
            )
        }
        kind => Expr::new(kind, span),
    }
}

fn strip_groups_around_guarded_division(expr: Expr) -> Expr {
    if guarded_division_depth(&expr).is_none() {
        return expr;
    }
    let mut current = expr;
    loop {
        match current.kind {
            ExprKind::Group(inner) => current = *inner,
            kind => return Expr::new(kind, current.span),
        }
    }
}

/// Number of parenthesis pairs wrapping a `x / NULLIF(y, 0)` division, if that is what `expr` is.
fn guarded_division_depth(expr: &Expr) -> Option<usize> {
    let mut depth = 0usize;
    let mut current = expr;
    while let ExprKind::Group(inner) = &current.kind {
        depth += 1;
        current = inner;
    }
    match &current.kind {
        ExprKind::Binary {
            op: BinaryOp::Div,
            rhs,
            ..
        } if is_nullif_zero(rhs) => Some(depth),
        _ => None,
    }
}

fn is_nullif_zero(expr: &Expr) -> bool {
    match &expr.kind {
        ExprKind::Call { args, .. } if expr.is_call_named("NULLIF") => {
            args.len() == 2 && args[1].is_zero()
        }
        _ => false,
    }
}

fn is_guarded_coalesce(name: &str, args: &[Expr]) -> bool {
    name.eq_ignore_ascii_case("COALESCE")
        && args.len() == 2
        && args[1].is_zero()
        && guarded_division_depth(&args[0]) == Some(0)
}

fn map_children(kind: ExprKind, f: fn(Expr) -> Expr) -> ExprKind {
    match kind {
        ExprKind::Neg(inner) => ExprKind::Neg(Box::new(f(*inner))),
        ExprKind::Binary { op, lhs, rhs } => ExprKind::Binary {
            op,
            lhs: Box::new(f(*lhs)),
            rhs: Box::new(f(*rhs)),
        },
        ExprKind::Group(inner) => ExprKind::Group(Box::new(f(*inner))),
        ExprKind::List(items) => ExprKind::List(items.into_iter().map(f).collect()),
        ExprKind::Call { name, args, over } => ExprKind::Call {
            name,
            args: args.into_iter().map(f).collect(),
            over,
        },
        leaf @ (ExprKind::Number(_) | ExprKind::Ident(_) | ExprKind::Str(_)) => leaf,
    }
}

/// Byte offsets of parentheses `normalize_coalesce_parentheses` should drop.
fn collect_redundant_parens(expr: &Expr, removals: &mut Vec<usize>) {
    if let ExprKind::Call {
        args, over: None, ..
    } = &expr.kind
    {
        if expr.is_call_named("COALESCE") {
            let mut effective: Vec<&Expr> = args.iter().collect();
            if let [list] = args.as_slice() {
                if let ExprKind::List(items) = &list.kind {
                    removals.push(list.span.start);
                    removals.push(list.span.end - 1);
                    effective = items.iter().collect();
                }
            }
            if effective.len() == 2 && effective[1].is_zero() {
                push_group_parens(effective[0], removals);
            }
        }
    }

    match &expr.kind {
        ExprKind::Neg(inner) | ExprKind::Group(inner) => collect_redundant_parens(inner, removals),
        ExprKind::Binary { lhs, rhs, .. } => {
            collect_redundant_parens(lhs, removals);
            collect_redundant_parens(rhs, removals);
        }
        ExprKind::List(items) | ExprKind::Call { args: items, .. } => {
            for item in items {
                collect_redundant_parens(item, removals);
            }
        }
        ExprKind::Number(_) | ExprKind::Ident(_) | ExprKind::Str(_) => {}
    }
}

fn push_group_parens(expr: &Expr, removals: &mut Vec<usize>) {
    if guarded_division_depth(expr).unwrap_or(0) == 0 {
        return;
    }
    let mut current = expr;
    while let ExprKind::Group(inner) = &current.kind {
        removals.push(current.span.start);
        removals.push(current.span.end - 1);
        current = inner;
    }
}
