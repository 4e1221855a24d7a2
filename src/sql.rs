//! The fragment tree: composable intermediate representation of SQL text.
//!
//! A [`Sql`] is an ordered, flat sequence of [`Chunk`]s: literal text,
//! identifier references, and bound values. Composition splices one
//! fragment's chunks into another, so a built fragment never nests: the
//! renderer makes a single left-to-right pass. Fragments are immutable once
//! built; every combinator consumes its inputs and returns a new fragment.

use compact_str::{CompactString, ToCompactString};
use smallvec::SmallVec;

use crate::value::{ColumnType, Value};

/// An identifier reference: a bare table/alias name, or a
/// table-qualified column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    /// Qualifying table or alias, if any.
    pub table: Option<CompactString>,
    pub name: CompactString,
}

/// A runtime value paired with the column type that encodes it at render
/// time. The Nth bound value in tree order becomes the Nth placeholder.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundValue {
    /// Column name reported when encoding fails.
    pub column: CompactString,
    pub ty: ColumnType,
    pub value: Value,
}

/// One element of a fragment's flat chunk stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    /// Literal SQL text, appended verbatim.
    Text(CompactString),
    /// Identifier, quoted per dialect at render time.
    Ident(Ident),
    /// Bound value, rendered as a placeholder and encoded into the
    /// parameter list.
    Bound(BoundValue),
    /// Case-insensitive LIKE operator; `ILIKE` where the dialect has it,
    /// plain `LIKE` elsewhere.
    Ilike { negated: bool },
}

/// A SQL statement or fragment under construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Sql {
    chunks: SmallVec<[Chunk; 4]>,
}

impl Sql {
    /// Creates an empty fragment. Renders to nothing and is skipped by
    /// [`Sql::join`] and the logical combinators.
    pub const fn empty() -> Self {
        Sql {
            chunks: SmallVec::new_const(),
        }
    }

    /// Creates a fragment of literal SQL text, not a parameter.
    pub fn raw(text: impl AsRef<str>) -> Self {
        let mut chunks = SmallVec::new();
        chunks.push(Chunk::Text(text.as_ref().to_compact_string()));
        Sql { chunks }
    }

    /// Creates a bare identifier fragment (a table or alias name).
    pub fn ident(name: impl AsRef<str>) -> Self {
        let mut chunks = SmallVec::new();
        chunks.push(Chunk::Ident(Ident {
            table: None,
            name: name.as_ref().to_compact_string(),
        }));
        Sql { chunks }
    }

    /// Creates a table-qualified column identifier fragment.
    pub fn qualified(table: impl AsRef<str>, column: impl AsRef<str>) -> Self {
        let mut chunks = SmallVec::new();
        chunks.push(Chunk::Ident(Ident {
            table: Some(table.as_ref().to_compact_string()),
            name: column.as_ref().to_compact_string(),
        }));
        Sql { chunks }
    }

    /// Creates a bound-value fragment with an explicit column type.
    pub fn bind(column: impl AsRef<str>, ty: ColumnType, value: impl Into<Value>) -> Self {
        let mut chunks = SmallVec::new();
        chunks.push(Chunk::Bound(BoundValue {
            column: column.as_ref().to_compact_string(),
            ty,
            value: value.into(),
        }));
        Sql { chunks }
    }

    /// Creates a bound-value fragment whose column type is inferred from the
    /// value itself. Used for ad-hoc expression operands.
    pub fn value(value: impl Into<Value>) -> Self {
        let value = value.into();
        let ty = value.inferred_type();
        Self::bind("param", ty, value)
    }

    pub(crate) fn from_chunks(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        Sql {
            chunks: chunks.into_iter().collect(),
        }
    }

    pub(crate) fn push(mut self, chunk: Chunk) -> Self {
        self.chunks.push(chunk);
        self
    }

    /// Appends literal SQL text.
    pub fn append_raw(mut self, text: impl AsRef<str>) -> Self {
        self.chunks.push(Chunk::Text(text.as_ref().to_compact_string()));
        self
    }

    /// Splices another fragment's chunks onto the end of this one,
    /// preserving order. Text and parameters concatenate; the result stays
    /// flat.
    pub fn append(mut self, other: impl Into<Sql>) -> Self {
        self.chunks.extend(other.into().chunks);
        self
    }

    /// Concatenates a sequence of fragments in order.
    pub fn concat(parts: impl IntoIterator<Item = Sql>) -> Self {
        let mut out = Sql::empty();
        for part in parts {
            out = out.append(part);
        }
        out
    }

    /// Joins non-empty fragments with a literal separator. The separator is
    /// inserted between fragments, never before the first or after the last.
    pub fn join(parts: impl IntoIterator<Item = Sql>, separator: &str) -> Self {
        let mut out = Sql::empty();
        let mut first = true;
        for part in parts {
            if part.is_empty() {
                continue;
            }
            if !first {
                out = out.append_raw(separator);
            }
            first = false;
            out = out.append(part);
        }
        out
    }

    /// Keeps this fragment only when `condition` holds; otherwise yields an
    /// empty fragment. Used for optional clause prefixes such as
    /// `Sql::raw(" WHERE ").only_if(filter.is_some())`.
    pub fn only_if(self, condition: bool) -> Self {
        if condition { self } else { Sql::empty() }
    }

    /// Wraps this fragment in parentheses.
    pub fn parenthesized(self) -> Self {
        Sql::raw("(").append(self).append_raw(")")
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// The flat chunk stream, for the renderer and structural assertions.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Bound values in tree order, without rendering.
    pub fn bound_values(&self) -> impl Iterator<Item = &BoundValue> {
        self.chunks.iter().filter_map(|c| match c {
            Chunk::Bound(b) => Some(b),
            _ => None,
        })
    }
}

impl From<Value> for Sql {
    fn from(value: Value) -> Self {
        Sql::value(value)
    }
}

impl From<&Sql> for Sql {
    fn from(value: &Sql) -> Self {
        value.clone()
    }
}
