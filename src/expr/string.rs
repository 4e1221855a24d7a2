//! Pattern-match predicates.

use crate::sql::{Chunk, Sql};

/// `left LIKE pattern`
pub fn like(left: impl Into<Sql>, pattern: impl Into<Sql>) -> Sql {
    left.into().append_raw(" LIKE ").append(pattern.into())
}

/// `left NOT LIKE pattern`
pub fn not_like(left: impl Into<Sql>, pattern: impl Into<Sql>) -> Sql {
    left.into().append_raw(" NOT LIKE ").append(pattern.into())
}

/// Case-insensitive LIKE. Renders `ILIKE` on dialects that have it and
/// falls back to `LIKE` elsewhere (already case-insensitive for ASCII on
/// SQLite and under MySQL's default collations).
pub fn ilike(left: impl Into<Sql>, pattern: impl Into<Sql>) -> Sql {
    left.into()
        .push(Chunk::Ilike { negated: false })
        .append(pattern.into())
}

/// Negated case-insensitive LIKE.
pub fn not_ilike(left: impl Into<Sql>, pattern: impl Into<Sql>) -> Sql {
    left.into()
        .push(Chunk::Ilike { negated: true })
        .append(pattern.into())
}
