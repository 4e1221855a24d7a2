//! Relational query execution: issues the planned statement(s) and
//! reassembles flat rows into nested records.

use std::future::Future;
use std::pin::Pin;

use hashbrown::HashSet;
use tracing::debug;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::row::{
    FieldValue, Record, decode_row, dedup_by_primary_key, group_by_key, group_key,
    reassemble_embedded, strip_hidden,
};
use crate::schema::Schema;
use crate::sql::Sql;
use crate::value::Value;

use super::descriptor::{Cardinality, RelationFetch, SelectionDescriptor};
use super::plan::plan;
use super::request::SelectionRequest;

/// Runs a nested selection rooted at `table`, returning every matching
/// record with its requested relations attached.
pub async fn find_many<E: Executor>(
    executor: &E,
    schema: &Schema,
    dialect: &Dialect,
    table: &str,
    request: &SelectionRequest,
) -> Result<Vec<Record>> {
    let plan = plan(schema, dialect, table, request)?;
    debug!(sql = %plan.statement.sql, "executing relational root");
    let rows = executor.query(&plan.statement).await?;

    if dialect.supports_lateral {
        return reassemble_embedded(&plan.descriptor, &rows);
    }

    let mut records = rows
        .iter()
        .map(|row| decode_row(&plan.descriptor, row))
        .collect::<Result<Vec<_>>>()?;
    attach_batched(executor, dialect, &plan.descriptor, &mut records).await?;
    for record in &mut records {
        strip_hidden(&plan.descriptor, record);
    }
    Ok(records)
}

/// [`find_many`] with an implicit limit of one: returns the single nested
/// record, or `None` rather than an empty list.
pub async fn find_first<E: Executor>(
    executor: &E,
    schema: &Schema,
    dialect: &Dialect,
    table: &str,
    request: &SelectionRequest,
) -> Result<Option<Record>> {
    let request = request.clone().limit(1);
    let records = find_many(executor, schema, dialect, table, &request).await?;
    Ok(records.into_iter().next())
}

/// Fetches and stitches every batched relation level under `descriptor`.
/// Deeper levels are resolved before shallower ones group their rows; a
/// failure in any round trip aborts the whole reassembly.
fn attach_batched<'a, E: Executor>(
    executor: &'a E,
    dialect: &'a Dialect,
    descriptor: &'a SelectionDescriptor,
    records: &'a mut Vec<Record>,
) -> Pin<Box<dyn Future<Output = Result<()>> + 'a>> {
    Box::pin(async move {
        for relation in &descriptor.relations {
            let RelationFetch::Batched(fetch) = &relation.fetch else {
                return Err(Error::mapping(
                    "batched execution given an embedded descriptor".to_string(),
                ));
            };

            // Distinct parent key tuples, in first-seen order. A tuple with
            // any null component matches no children and is skipped.
            let mut seen = HashSet::new();
            let mut keys: Vec<Vec<Value>> = Vec::new();
            for record in records.iter() {
                if let Some(token) = group_key(record, &fetch.parent_key_fields)
                    && seen.insert(token)
                {
                    keys.push(
                        fetch
                            .parent_key_fields
                            .iter()
                            .filter_map(|field| record.scalar(field).cloned())
                            .collect(),
                    );
                }
            }

            let groups = if keys.is_empty() {
                Default::default()
            } else {
                let single = fetch.parent_key_fields.len() == 1;
                let in_list = Sql::join(
                    keys.into_iter().map(|tuple| {
                        let bound = Sql::join(
                            tuple
                                .into_iter()
                                .zip(fetch.key_types.iter())
                                .zip(fetch.parent_key_fields.iter())
                                .map(|((value, ty), field)| Sql::bind(field, *ty, value)),
                            ", ",
                        );
                        if single { bound } else { bound.parenthesized() }
                    }),
                    ", ",
                )
                .parenthesized();
                let statement = fetch
                    .prefix
                    .clone()
                    .append(in_list)
                    .append(fetch.suffix.clone())
                    .to_sql(dialect)?;
                debug!(
                    relation = %relation.field,
                    sql = %statement.sql,
                    "executing relational round trip"
                );
                let rows = executor.query(&statement).await?;
                let mut children = rows
                    .iter()
                    .map(|row| decode_row(&relation.descriptor, row))
                    .collect::<Result<Vec<_>>>()?;
                attach_batched(executor, dialect, &relation.descriptor, &mut children).await?;
                group_by_key(children, &fetch.child_key_fields)
            };

            for record in records.iter_mut() {
                let mut group = group_key(record, &fetch.parent_key_fields)
                    .and_then(|key| groups.get(&key).cloned())
                    .unwrap_or_default();
                if fetch.dedup {
                    dedup_by_primary_key(&mut group, &relation.descriptor.primary_key);
                }
                // Per-parent pagination happens here, not in SQL, where a
                // plain LIMIT would apply globally across parents.
                if let Some(offset) = relation.offset {
                    let skip = (offset as usize).min(group.len());
                    group.drain(..skip);
                }
                if let Some(limit) = relation.limit {
                    group.truncate(limit as usize);
                }
                for child in &mut group {
                    strip_hidden(&relation.descriptor, child);
                }
                let value = match relation.cardinality {
                    Cardinality::Many => FieldValue::Many(group),
                    Cardinality::One => {
                        FieldValue::One(group.into_iter().next().map(Box::new))
                    }
                };
                record.insert(&relation.field, value);
            }
        }
        Ok(())
    })
}
