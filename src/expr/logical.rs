//! Logical combinators (AND, OR, NOT).

use crate::sql::Sql;

fn combine(conditions: impl IntoIterator<Item = Sql>, operator: &'static str) -> Sql {
    let mut present: Vec<Sql> = conditions.into_iter().filter(|c| !c.is_empty()).collect();
    match present.len() {
        // No conditions: the predicate is omitted entirely.
        0 => Sql::empty(),
        // A single condition is returned unwrapped.
        1 => present.pop().unwrap_or_default(),
        _ => Sql::join(present, operator).parenthesized(),
    }
}

/// Joins predicates with ` AND `. Zero predicates yield an empty fragment,
/// one is returned unwrapped, two or more are parenthesized as a group.
pub fn and(conditions: impl IntoIterator<Item = Sql>) -> Sql {
    combine(conditions, " AND ")
}

/// Joins predicates with ` OR `; grouping rules as for [`and`].
pub fn or(conditions: impl IntoIterator<Item = Sql>) -> Sql {
    combine(conditions, " OR ")
}

/// `NOT (condition)`. An empty condition stays empty.
pub fn not(condition: impl Into<Sql>) -> Sql {
    let condition = condition.into();
    if condition.is_empty() {
        return condition;
    }
    Sql::raw("NOT ").append(condition.parenthesized())
}
