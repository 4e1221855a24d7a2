//! Null checks.

use crate::sql::Sql;

/// `operand IS NULL`
pub fn is_null(operand: impl Into<Sql>) -> Sql {
    operand.into().append_raw(" IS NULL")
}

/// `operand IS NOT NULL`
pub fn is_not_null(operand: impl Into<Sql>) -> Sql {
    operand.into().append_raw(" IS NOT NULL")
}
