//! Predicate and expression builders.
//!
//! Each builder takes fragment operands (columns via [`col`], literal
//! operands via [`val`], or any [`Sql`]) and returns the fragment for the
//! corresponding predicate. Literal operands become bound parameters;
//! sub-query fragments are inlined verbatim.

pub mod agg;
mod cmp;
mod logical;
mod null;
mod set;
mod string;
mod subquery;

pub use agg::{CountStar, count_star};
pub use cmp::{between, eq, gt, gte, lt, lte, neq, not_between};
pub use logical::{and, not, or};
pub use null::{is_not_null, is_null};
pub use set::{in_array, in_subquery, not_in_array, not_in_subquery};
pub use string::{ilike, like, not_ilike, not_like};
pub use subquery::{exists, not_exists};

use crate::sql::Sql;
use crate::value::Value;

/// A table-qualified column operand.
pub fn col(table: impl AsRef<str>, column: impl AsRef<str>) -> Sql {
    Sql::qualified(table, column)
}

/// A literal operand, bound as a parameter with its type inferred from the
/// value.
pub fn val(value: impl Into<Value>) -> Sql {
    Sql::value(value)
}

/// Ascending order-by term.
pub fn asc(operand: impl Into<Sql>) -> Sql {
    operand.into().append_raw(" ASC")
}

/// Descending order-by term.
pub fn desc(operand: impl Into<Sql>) -> Sql {
    operand.into().append_raw(" DESC")
}
