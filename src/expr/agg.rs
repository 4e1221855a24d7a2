//! The `count(*)` aggregate expression.
//!
//! A [`CountStar`] is usable two ways, both rendering identical WHERE
//! semantics from the same optional filter:
//!
//! - [`embedded`](CountStar::embedded): a scalar sub-select fragment,
//!   composable into larger expressions;
//! - [`statement`](CountStar::statement) / [`fetch`](CountStar::fetch): a
//!   standalone `select count(*) ...` statement whose single result row
//!   yields the count.

use tracing::debug;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::render::Statement;
use crate::sql::Sql;
use crate::value::DriverValue;

/// A `count(*)` over a table or an arbitrary source fragment, with an
/// optional filter.
#[derive(Debug, Clone, PartialEq)]
pub struct CountStar {
    source: Sql,
    filter: Option<Sql>,
}

/// Counts rows of a table.
pub fn count_star(table: impl AsRef<str>) -> CountStar {
    CountStar {
        source: Sql::ident(table),
        filter: None,
    }
}

impl CountStar {
    /// Counts rows of an arbitrary source fragment (e.g. a sub-select).
    pub fn over(source: impl Into<Sql>) -> CountStar {
        CountStar {
            source: source.into(),
            filter: None,
        }
    }

    /// Restricts the count to rows matching `predicate`. An empty predicate
    /// leaves the count unfiltered.
    pub fn filter(mut self, predicate: impl Into<Sql>) -> Self {
        let predicate = predicate.into();
        self.filter = (!predicate.is_empty()).then_some(predicate);
        self
    }

    fn body(&self, dialect: &Dialect) -> Sql {
        Sql::raw("select count(*)")
            .append_raw(if dialect.casts_count_to_int {
                "::int"
            } else {
                ""
            })
            .append_raw(" from ")
            .append(self.source.clone())
            .append(Sql::raw(" where ").only_if(self.filter.is_some()))
            .append(self.filter.clone().unwrap_or_default())
    }

    /// The embedded scalar form: `(select count(*) from ... [where ...])`,
    /// usable directly inside further expressions.
    pub fn embedded(&self, dialect: &Dialect) -> Sql {
        self.body(dialect).parenthesized()
    }

    /// The top-level statement form: `select count(*) from ... [where ...];`.
    pub fn statement(&self, dialect: &Dialect) -> Result<Statement> {
        self.body(dialect).append_raw(";").to_sql(dialect)
    }

    /// Executes the statement form and extracts the single row's count.
    pub async fn fetch<E: Executor>(&self, executor: &E, dialect: &Dialect) -> Result<i64> {
        let statement = self.statement(dialect)?;
        debug!(sql = %statement.sql, "executing count");
        let rows = executor.query(&statement).await?;
        let row = rows.into_iter().next().ok_or(Error::NotFound)?;
        let value = row
            .get("count")
            .or_else(|| row.first())
            .ok_or_else(|| Error::mapping("count query returned an empty row"))?;
        match value {
            DriverValue::Integer(n) => Ok(*n),
            other => Err(Error::mapping(format!(
                "count column holds {other:?}, expected an integer"
            ))),
        }
    }
}
