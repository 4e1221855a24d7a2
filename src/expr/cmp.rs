//! Comparison predicates.

use crate::sql::Sql;

fn comparison(left: impl Into<Sql>, operator: &'static str, right: impl Into<Sql>) -> Sql {
    left.into()
        .append_raw(" ")
        .append_raw(operator)
        .append_raw(" ")
        .append(right.into())
}

/// `left = right`
pub fn eq(left: impl Into<Sql>, right: impl Into<Sql>) -> Sql {
    comparison(left, "=", right)
}

/// `left <> right`
pub fn neq(left: impl Into<Sql>, right: impl Into<Sql>) -> Sql {
    comparison(left, "<>", right)
}

/// `left > right`
pub fn gt(left: impl Into<Sql>, right: impl Into<Sql>) -> Sql {
    comparison(left, ">", right)
}

/// `left >= right`
pub fn gte(left: impl Into<Sql>, right: impl Into<Sql>) -> Sql {
    comparison(left, ">=", right)
}

/// `left < right`
pub fn lt(left: impl Into<Sql>, right: impl Into<Sql>) -> Sql {
    comparison(left, "<", right)
}

/// `left <= right`
pub fn lte(left: impl Into<Sql>, right: impl Into<Sql>) -> Sql {
    comparison(left, "<=", right)
}

/// `operand BETWEEN low AND high`
pub fn between(operand: impl Into<Sql>, low: impl Into<Sql>, high: impl Into<Sql>) -> Sql {
    operand
        .into()
        .append_raw(" BETWEEN ")
        .append(low.into())
        .append_raw(" AND ")
        .append(high.into())
}

/// `operand NOT BETWEEN low AND high`
pub fn not_between(operand: impl Into<Sql>, low: impl Into<Sql>, high: impl Into<Sql>) -> Sql {
    operand
        .into()
        .append_raw(" NOT BETWEEN ")
        .append(low.into())
        .append_raw(" AND ")
        .append(high.into())
}
