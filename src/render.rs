//! The dialect renderer: a single left-to-right pass over a fragment's flat
//! chunk stream producing final SQL text plus the ordered parameter list.

use tracing::debug;

use crate::dialect::Dialect;
use crate::error::Result;
use crate::sql::{Chunk, Sql};
use crate::value::DriverValue;

/// A rendered statement, ready for a driver: SQL text and encoded
/// parameters in placeholder order.
///
/// This is the `.to_sql()` inspection surface; building a statement never
/// touches a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<DriverValue>,
}

impl Sql {
    /// Renders this fragment for `dialect`.
    ///
    /// Placeholder numbering for numbered dialects is strictly sequential
    /// starting at 1, counted across the entire statement. Encoding a value
    /// that does not fit its column type is fatal
    /// ([`Error::Encoding`](crate::Error::Encoding)).
    pub fn to_sql(&self, dialect: &Dialect) -> Result<Statement> {
        let mut text = String::with_capacity(self.chunks().len() * 8);
        let mut params = Vec::new();

        for chunk in self.chunks() {
            match chunk {
                Chunk::Text(t) => text.push_str(t),
                Chunk::Ident(ident) => {
                    if let Some(table) = &ident.table {
                        dialect.write_ident(table, &mut text);
                        text.push('.');
                    }
                    dialect.write_ident(&ident.name, &mut text);
                }
                Chunk::Bound(bound) => {
                    let encoded = bound.ty.encode(&bound.value, &bound.column)?;
                    params.push(encoded);
                    text.push_str(&dialect.placeholder(params.len()));
                }
                Chunk::Ilike { negated } => {
                    let op = match (dialect.supports_ilike, negated) {
                        (true, false) => " ILIKE ",
                        (true, true) => " NOT ILIKE ",
                        (false, false) => " LIKE ",
                        (false, true) => " NOT LIKE ",
                    };
                    text.push_str(op);
                }
            }
        }

        debug!(
            dialect = dialect.name,
            params = params.len(),
            "rendered statement"
        );
        Ok(Statement { sql: text, params })
    }
}
