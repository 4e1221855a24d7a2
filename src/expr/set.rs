//! Set-membership predicates.

use crate::sql::Sql;
use crate::value::Value;

fn membership(
    left: impl Into<Sql>,
    negated: bool,
    values: impl IntoIterator<Item = impl Into<Value>>,
) -> Sql {
    let items: Vec<Sql> = values.into_iter().map(|v| Sql::value(v.into())).collect();
    if items.is_empty() {
        // Membership in the empty set is decidable without touching the
        // operand; `IN ()` is not valid SQL.
        return if negated {
            Sql::raw("1 = 1")
        } else {
            Sql::raw("1 = 0")
        };
    }
    left.into()
        .append_raw(if negated { " NOT IN (" } else { " IN (" })
        .append(Sql::join(items, ", "))
        .append_raw(")")
}

/// `left IN (v1, v2, ...)` with every element bound as a parameter.
///
/// An empty list renders a constant-false predicate.
pub fn in_array(left: impl Into<Sql>, values: impl IntoIterator<Item = impl Into<Value>>) -> Sql {
    membership(left, false, values)
}

/// `left NOT IN (v1, v2, ...)`. An empty list renders a constant-true
/// predicate.
pub fn not_in_array(
    left: impl Into<Sql>,
    values: impl IntoIterator<Item = impl Into<Value>>,
) -> Sql {
    membership(left, true, values)
}

/// `left IN (subquery)` with the sub-query fragment inlined verbatim.
pub fn in_subquery(left: impl Into<Sql>, subquery: impl Into<Sql>) -> Sql {
    left.into()
        .append_raw(" IN ")
        .append(subquery.into().parenthesized())
}

/// `left NOT IN (subquery)`.
pub fn not_in_subquery(left: impl Into<Sql>, subquery: impl Into<Sql>) -> Sql {
    left.into()
        .append_raw(" NOT IN ")
        .append(subquery.into().parenthesized())
}
