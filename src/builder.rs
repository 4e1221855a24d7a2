//! Statement builders for select/insert/update/delete.
//!
//! Builders assemble fragment trees; nothing touches a connection until the
//! caller renders with [`build`](SelectBuilder::build) and hands the
//! [`Statement`] to an [`Executor`](crate::Executor). Building and
//! executing are separate steps; a builder is never itself awaitable.

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::render::Statement;
use crate::schema::Table;
use crate::sql::Sql;
use crate::value::Value;

fn returning_clause(dialect: &Dialect, columns: &[String]) -> Result<Sql> {
    if columns.is_empty() {
        return Ok(Sql::empty());
    }
    if !dialect.supports_returning {
        return Err(Error::config(format!(
            "dialect \"{}\" does not support RETURNING",
            dialect.name
        )));
    }
    Ok(Sql::raw(" RETURNING ").append(Sql::join(
        columns.iter().map(Sql::ident),
        ", ",
    )))
}

// =============================================================================
// SELECT
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum JoinKind {
    Inner,
    Left,
}

/// Starts a `SELECT` over explicit projection fragments; an empty list
/// selects `*`.
pub fn select(columns: impl IntoIterator<Item = Sql>) -> SelectBuilder {
    SelectBuilder {
        columns: columns.into_iter().collect(),
        from: None,
        joins: Vec::new(),
        filter: Sql::empty(),
        order_by: Vec::new(),
        limit: None,
        offset: None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectBuilder {
    columns: Vec<Sql>,
    from: Option<Sql>,
    joins: Vec<(JoinKind, Sql, Sql)>,
    filter: Sql,
    order_by: Vec<Sql>,
    limit: Option<u32>,
    offset: Option<u32>,
}

impl SelectBuilder {
    pub fn from(mut self, table: impl AsRef<str>) -> Self {
        self.from = Some(Sql::ident(table));
        self
    }

    /// Selects from an arbitrary source fragment (sub-select, join tree).
    pub fn from_sql(mut self, source: impl Into<Sql>) -> Self {
        self.from = Some(source.into());
        self
    }

    pub fn inner_join(mut self, table: impl AsRef<str>, on: impl Into<Sql>) -> Self {
        self.joins
            .push((JoinKind::Inner, Sql::ident(table), on.into()));
        self
    }

    pub fn left_join(mut self, table: impl AsRef<str>, on: impl Into<Sql>) -> Self {
        self.joins
            .push((JoinKind::Left, Sql::ident(table), on.into()));
        self
    }

    /// Filters the selection. An empty predicate (e.g. from `and([])`)
    /// leaves the statement unfiltered.
    pub fn r#where(mut self, predicate: impl Into<Sql>) -> Self {
        self.filter = predicate.into();
        self
    }

    pub fn order_by(mut self, terms: impl IntoIterator<Item = Sql>) -> Self {
        self.order_by.extend(terms);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// The assembled fragment tree, for composition into larger queries.
    pub fn to_fragment(&self) -> Result<Sql> {
        let from = self
            .from
            .clone()
            .ok_or_else(|| Error::config("SELECT is missing a FROM source"))?;
        let projection = if self.columns.is_empty() {
            Sql::raw("*")
        } else {
            Sql::join(self.columns.iter().cloned(), ", ")
        };
        let mut sql = Sql::raw("SELECT ")
            .append(projection)
            .append_raw(" FROM ")
            .append(from);
        for (kind, table, on) in &self.joins {
            sql = sql
                .append_raw(match kind {
                    JoinKind::Inner => " INNER JOIN ",
                    JoinKind::Left => " LEFT JOIN ",
                })
                .append(table.clone())
                .append_raw(" ON ")
                .append(on.clone());
        }
        sql = sql
            .append(Sql::raw(" WHERE ").only_if(!self.filter.is_empty()))
            .append(self.filter.clone());
        let order = Sql::join(self.order_by.iter().cloned(), ", ");
        sql = sql
            .append(Sql::raw(" ORDER BY ").only_if(!order.is_empty()))
            .append(order);
        if let Some(n) = self.limit {
            sql = sql.append_raw(format!(" LIMIT {n}"));
        }
        if let Some(n) = self.offset {
            sql = sql.append_raw(format!(" OFFSET {n}"));
        }
        Ok(sql)
    }

    pub fn build(&self, dialect: &Dialect) -> Result<Statement> {
        self.to_fragment()?.to_sql(dialect)
    }
}

// =============================================================================
// INSERT
// =============================================================================

/// Starts an `INSERT` into a schema table; column types come from the
/// table definition.
pub fn insert(table: &Table) -> InsertBuilder<'_> {
    InsertBuilder {
        table,
        rows: Vec::new(),
        returning: Vec::new(),
    }
}

#[derive(Debug, Clone)]
pub struct InsertBuilder<'a> {
    table: &'a Table,
    rows: Vec<Vec<(String, Value)>>,
    returning: Vec<String>,
}

impl<'a> InsertBuilder<'a> {
    /// Appends one row of `(column, value)` pairs. Every row must name the
    /// same columns in the same order.
    pub fn values(
        mut self,
        row: impl IntoIterator<Item = (impl Into<String>, impl Into<Value>)>,
    ) -> Self {
        self.rows.push(
            row.into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        );
        self
    }

    pub fn returning(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.returning = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(&self, dialect: &Dialect) -> Result<Statement> {
        let first = self
            .rows
            .first()
            .ok_or_else(|| Error::config("INSERT has no rows"))?;
        let column_names: Vec<&str> = first.iter().map(|(name, _)| name.as_str()).collect();

        let mut tuples = Vec::with_capacity(self.rows.len());
        for row in &self.rows {
            if row.len() != column_names.len()
                || row
                    .iter()
                    .zip(&column_names)
                    .any(|((name, _), expected)| name != expected)
            {
                return Err(Error::config(
                    "INSERT rows must all name the same columns in the same order",
                ));
            }
            let bound = row.iter().map(|(name, value)| {
                let column = self.table.find_column(name).ok_or_else(|| {
                    Error::config(format!(
                        "unknown column \"{name}\" on table \"{}\"",
                        self.table.name
                    ))
                })?;
                Ok(Sql::bind(name, column.ty, value.clone()))
            });
            let bound: Result<Vec<Sql>> = bound.collect();
            tuples.push(Sql::join(bound?, ", ").parenthesized());
        }

        let sql = Sql::raw("INSERT INTO ")
            .append(Sql::ident(&self.table.name))
            .append_raw(" ")
            .append(Sql::join(column_names.iter().map(Sql::ident), ", ").parenthesized())
            .append_raw(" VALUES ")
            .append(Sql::join(tuples, ", "))
            .append(returning_clause(dialect, &self.returning)?);
        sql.to_sql(dialect)
    }
}

// =============================================================================
// UPDATE
// =============================================================================

/// Starts an `UPDATE` of a schema table.
pub fn update(table: &Table) -> UpdateBuilder<'_> {
    UpdateBuilder {
        table,
        assignments: Vec::new(),
        filter: Sql::empty(),
        returning: Vec::new(),
    }
}

#[derive(Debug, Clone)]
pub struct UpdateBuilder<'a> {
    table: &'a Table,
    assignments: Vec<(String, Value)>,
    filter: Sql,
    returning: Vec<String>,
}

impl<'a> UpdateBuilder<'a> {
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push((column.into(), value.into()));
        self
    }

    pub fn r#where(mut self, predicate: impl Into<Sql>) -> Self {
        self.filter = predicate.into();
        self
    }

    pub fn returning(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.returning = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(&self, dialect: &Dialect) -> Result<Statement> {
        if self.assignments.is_empty() {
            return Err(Error::config("UPDATE has no assignments"));
        }
        let assignments = self.assignments.iter().map(|(name, value)| {
            let column = self.table.find_column(name).ok_or_else(|| {
                Error::config(format!(
                    "unknown column \"{name}\" on table \"{}\"",
                    self.table.name
                ))
            })?;
            Ok(Sql::ident(name)
                .append_raw(" = ")
                .append(Sql::bind(name, column.ty, value.clone())))
        });
        let assignments: Result<Vec<Sql>> = assignments.collect();

        let sql = Sql::raw("UPDATE ")
            .append(Sql::ident(&self.table.name))
            .append_raw(" SET ")
            .append(Sql::join(assignments?, ", "))
            .append(Sql::raw(" WHERE ").only_if(!self.filter.is_empty()))
            .append(self.filter.clone())
            .append(returning_clause(dialect, &self.returning)?);
        sql.to_sql(dialect)
    }
}

// =============================================================================
// DELETE
// =============================================================================

/// Starts a `DELETE` from a schema table.
pub fn delete(table: &Table) -> DeleteBuilder<'_> {
    DeleteBuilder {
        table,
        filter: Sql::empty(),
        returning: Vec::new(),
    }
}

#[derive(Debug, Clone)]
pub struct DeleteBuilder<'a> {
    table: &'a Table,
    filter: Sql,
    returning: Vec<String>,
}

impl<'a> DeleteBuilder<'a> {
    pub fn r#where(mut self, predicate: impl Into<Sql>) -> Self {
        self.filter = predicate.into();
        self
    }

    pub fn returning(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.returning = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn build(&self, dialect: &Dialect) -> Result<Statement> {
        let sql = Sql::raw("DELETE FROM ")
            .append(Sql::ident(&self.table.name))
            .append(Sql::raw(" WHERE ").only_if(!self.filter.is_empty()))
            .append(self.filter.clone())
            .append(returning_clause(dialect, &self.returning)?);
        sql.to_sql(dialect)
    }
}
