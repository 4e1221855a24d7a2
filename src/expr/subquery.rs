//! Existence predicates over sub-queries.

use crate::sql::Sql;

/// `EXISTS (subquery)`. The sub-query fragment is inlined verbatim, its
/// parameters keeping their position in tree order.
pub fn exists(subquery: impl Into<Sql>) -> Sql {
    Sql::raw("EXISTS ").append(subquery.into().parenthesized())
}

/// `NOT EXISTS (subquery)`
pub fn not_exists(subquery: impl Into<Sql>) -> Sql {
    Sql::raw("NOT EXISTS ").append(subquery.into().parenthesized())
}
