//! Comparison canonicalization.
//!
//! Renders a comparison the way the engine prints it in plan filters, in
//! both operand orders, so it can be found by substring search.

use log::trace;

use crate::sql::{CompareOp, Literal, Operand};

/// Token used for operands that have no stable textual form.
pub const OPAQUE_TOKEN: &str = "<expr>";

/// Render one operand in plan notation.
pub fn render_operand(operand: &Operand) -> String {
    match operand {
        Operand::Column(name) => name.clone(),
        Operand::Literal(Literal::Number(n)) => n.clone(),
        Operand::Literal(Literal::Text(s)) => format!("'{}'", s.replace('\'', "''")),
        Operand::Literal(Literal::Boolean(b)) => b.to_string(),
        Operand::Literal(Literal::Null) => "NULL".to_string(),
        Operand::Literal(Literal::Interval(_)) | Operand::Subquery(_) | Operand::Opaque(_) => {
            OPAQUE_TOKEN.to_string()
        }
    }
}

/// Operator text for the forward and the operand-swapped form.
fn operator_pair(op: CompareOp) -> (&'static str, &'static str) {
    match op {
        CompareOp::Gt => (" > ", " < "),
        CompareOp::Lt => (" < ", " > "),
        CompareOp::Eq => (" = ", " = "),
        CompareOp::NotEq => (" <> ", " <> "),
        CompareOp::GtEq => (" >= ", " <= "),
        CompareOp::LtEq => (" <= ", " >= "),
        CompareOp::Like => (" ~~ ", " ~~ "),
        CompareOp::NotLike => (" !~~ ", " !~~ "),
    }
}

/// Canonical `(forward, reversed)` forms of `lhs op rhs`.
pub fn canonicalize(op: CompareOp, lhs: &Operand, rhs: &Operand) -> (String, String) {
    let (l, r) = (render_operand(lhs), render_operand(rhs));
    let (fwd, rev) = operator_pair(op);
    (format!("{}{}{}", l, fwd, r), format!("{}{}{}", r, rev, l))
}

/// Whether either canonical form of the comparison occurs in `filter`.
pub fn matches(op: CompareOp, lhs: &Operand, rhs: &Operand, filter: &str) -> bool {
    if filter.is_empty() {
        return false;
    }
    let (forward, reversed) = canonicalize(op, lhs, rhs);
    let hit = filter.contains(&forward) || filter.contains(&reversed);
    trace!("match '{}' / '{}' in '{}': {}", forward, reversed, filter, hit);
    hit
}
