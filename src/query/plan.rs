//! The relational query planner.
//!
//! Expands a nested [`SelectionRequest`] against the schema graph into
//! either a single statement with correlated JSON-aggregating sub-selects
//! (dialects that support them) or a root statement plus one round-trip
//! recipe per relation level (dialects that do not). Every table reference
//! at every depth gets a unique alias built from the parent alias, the
//! relation name, and a running counter, so repeated tables and self-joins
//! never collide.
//! Either way the plan carries a [`SelectionDescriptor`] for reassembly.

use compact_str::{CompactString, ToCompactString, format_compact};
use tracing::debug;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::render::Statement;
use crate::schema::{Column, Relation, RelationKind, Schema, Table};
use crate::sql::{Chunk, Ident, Sql};

use super::descriptor::{
    BatchedFetch, Cardinality, ColumnSelection, RelationFetch, RelationSelection,
    SelectionDescriptor,
};
use super::request::{OrderBy, SelectionRequest};

/// A planned relational query: the rendered root statement plus the
/// descriptor that drives execution and reassembly.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub statement: Statement,
    pub descriptor: SelectionDescriptor,
}

/// Plans `request` rooted at `table` for `dialect`.
pub fn plan(
    schema: &Schema,
    dialect: &Dialect,
    table: &str,
    request: &SelectionRequest,
) -> Result<QueryPlan> {
    let root = schema.table(table)?;
    let mut aliases = AliasAllocator::new();
    let root_alias = aliases.root();

    let (fragment, descriptor) = if dialect.supports_lateral {
        embedded_root(schema, dialect, root, request, &root_alias, &mut aliases)?
    } else {
        batched_root(schema, root, request, &root_alias, &mut aliases)?
    };

    debug!(
        table,
        dialect = dialect.name,
        strategy = if dialect.supports_lateral {
            "embedded"
        } else {
            "batched"
        },
        "planned relational query"
    );
    Ok(QueryPlan {
        statement: fragment.to_sql(dialect)?,
        descriptor,
    })
}

struct AliasAllocator {
    counter: usize,
}

impl AliasAllocator {
    fn new() -> Self {
        AliasAllocator { counter: 0 }
    }

    fn root(&mut self) -> CompactString {
        let alias = format_compact!("t{}", self.counter);
        self.counter += 1;
        alias
    }

    fn next(&mut self, parent: &str, relation: &str) -> CompactString {
        let alias = format_compact!("{parent}_{relation}{}", self.counter);
        self.counter += 1;
        alias
    }
}

/// Resolves the requested column subset against the table, declaration
/// order when no subset was named.
fn resolve_columns<'t>(table: &'t Table, request: &SelectionRequest) -> Result<Vec<&'t Column>> {
    match &request.columns {
        None => Ok(table.columns.iter().collect()),
        Some(names) => names
            .iter()
            .map(|name| {
                table.find_column(name).ok_or_else(|| {
                    Error::config(format!(
                        "unknown column \"{name}\" requested on table \"{}\"",
                        table.name
                    ))
                })
            })
            .collect(),
    }
}

fn resolve_relation<'t>(table: &'t Table, name: &str) -> Result<&'t Relation> {
    table.find_relation(name).ok_or_else(|| {
        Error::config(format!(
            "table \"{}\" declares no relation named \"{name}\"",
            table.name
        ))
    })
}

/// Rewrites table-qualified identifier chunks from the declared table name
/// to the generated alias. Filters are written against table names; aliases
/// only exist once the planner has run.
fn rewrite_table(sql: &Sql, table: &str, alias: &str) -> Sql {
    Sql::from_chunks(sql.chunks().iter().cloned().map(|chunk| match chunk {
        Chunk::Ident(Ident {
            table: Some(t),
            name,
        }) if t.as_str() == table => Chunk::Ident(Ident {
            table: Some(alias.to_compact_string()),
            name,
        }),
        other => other,
    }))
}

fn order_terms(table: &Table, alias: &str, order_by: &[OrderBy]) -> Result<Sql> {
    let terms = order_by
        .iter()
        .map(|term| {
            if table.find_column(&term.column).is_none() {
                return Err(Error::config(format!(
                    "unknown column \"{}\" in order by on table \"{}\"",
                    term.column, table.name
                )));
            }
            Ok(Sql::qualified(alias, &term.column)
                .append_raw(if term.descending { " DESC" } else { " ASC" }))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Sql::join(terms, ", "))
}

/// A column or relation name as a single-quoted JSON key literal, embedded
/// quotes doubled.
fn json_key(name: &str) -> CompactString {
    if name.contains('\'') {
        format_compact!("'{}', ", name.replace('\'', "''"))
    } else {
        format_compact!("'{name}', ")
    }
}

fn table_as(table: &str, alias: &str) -> Sql {
    Sql::ident(table)
        .append_raw(" AS ")
        .append(Sql::ident(alias))
}

fn pagination(limit: Option<u32>, offset: Option<u32>) -> Sql {
    let mut out = Sql::empty();
    if let Some(n) = limit {
        out = out.append_raw(format_compact!(" LIMIT {n}"));
    }
    if let Some(n) = offset {
        out = out.append_raw(format_compact!(" OFFSET {n}"));
    }
    out
}

fn primary_key_fields(table: &Table, columns: &[ColumnSelection]) -> Vec<CompactString> {
    table
        .primary_key()
        .into_iter()
        .filter(|pk| columns.iter().any(|c| c.field.as_str() == *pk))
        .map(|pk| pk.to_compact_string())
        .collect()
}

// =============================================================================
// Embedded (lateral) strategy
// =============================================================================

fn embedded_root(
    schema: &Schema,
    dialect: &Dialect,
    table: &Table,
    request: &SelectionRequest,
    alias: &str,
    aliases: &mut AliasAllocator,
) -> Result<(Sql, SelectionDescriptor)> {
    let columns = resolve_columns(table, request)?;
    let mut select_items: Vec<Sql> = columns
        .iter()
        .map(|c| Sql::qualified(alias, &c.name))
        .collect();

    let column_selections: Vec<ColumnSelection> = columns
        .iter()
        .map(|c| ColumnSelection {
            field: c.name.to_compact_string(),
            alias: c.name.to_compact_string(),
            ty: c.ty,
            hidden: false,
        })
        .collect();

    let mut relations = Vec::new();
    for (name, sub_request) in &request.with {
        let relation = resolve_relation(table, name)?;
        let (subquery, selection) =
            embedded_relation(schema, dialect, relation, sub_request, alias, aliases)?;
        let output_alias = format_compact!("__rel_{name}");
        select_items.push(
            subquery
                .append_raw(dialect.json.text_cast)
                .append_raw(" AS ")
                .append(Sql::ident(&output_alias)),
        );
        relations.push(RelationSelection {
            fetch: RelationFetch::Embedded {
                alias: output_alias,
            },
            ..selection
        });
    }

    let filter = request
        .filter
        .as_ref()
        .map(|f| rewrite_table(f, &table.name, alias));
    let order = order_terms(table, alias, &request.order_by)?;

    let fragment = Sql::raw("SELECT ")
        .append(Sql::join(select_items, ", "))
        .append_raw(" FROM ")
        .append(table_as(&table.name, alias))
        .append(Sql::raw(" WHERE ").only_if(filter.is_some()))
        .append(filter.unwrap_or_default())
        .append(Sql::raw(" ORDER BY ").only_if(!order.is_empty()))
        .append(order)
        .append(pagination(request.limit, request.offset));

    let primary_key = primary_key_fields(table, &column_selections);
    Ok((
        fragment,
        SelectionDescriptor {
            table: table.name.clone(),
            columns: column_selections,
            relations,
            primary_key,
        },
    ))
}

/// Builds the correlated sub-select for one relation, recursing into its
/// nested requests. Returns the scalar fragment (parenthesized sub-select)
/// and the matching descriptor node.
fn embedded_relation(
    schema: &Schema,
    dialect: &Dialect,
    relation: &Relation,
    request: &SelectionRequest,
    parent_alias: &str,
    aliases: &mut AliasAllocator,
) -> Result<(Sql, RelationSelection)> {
    let target = schema.table(&relation.target)?;
    let target_alias = aliases.next(parent_alias, &relation.name);
    let columns = resolve_columns(target, request)?;

    // FROM core and the correlation back to the enclosing row.
    let (from_core, correlation) = match &relation.through {
        None => {
            let from = table_as(&target.name, &target_alias);
            let correlation = Sql::join(
                relation.keys.iter().map(|(target_col, source_col)| {
                    Sql::qualified(&target_alias, target_col)
                        .append_raw(" = ")
                        .append(Sql::qualified(parent_alias, source_col))
                }),
                " AND ",
            );
            (from, correlation)
        }
        Some(junction) => {
            let junction_alias = aliases.next(parent_alias, &relation.name);
            let from = table_as(&junction.table, &junction_alias)
                .append_raw(" JOIN ")
                .append(table_as(&target.name, &target_alias))
                .append_raw(" ON ")
                .append(Sql::qualified(&target_alias, &junction.target_key.1))
                .append_raw(" = ")
                .append(Sql::qualified(&junction_alias, &junction.target_key.0));
            let correlation = Sql::qualified(&junction_alias, &junction.source_key.0)
                .append_raw(" = ")
                .append(Sql::qualified(parent_alias, &junction.source_key.1));
            (from, correlation)
        }
    };

    // JSON object over the target's columns plus nested relations.
    let mut object_args: Vec<Sql> = columns
        .iter()
        .map(|c| {
            Sql::raw(json_key(&c.name)).append(Sql::qualified(&target_alias, &c.name))
        })
        .collect();

    let column_selections: Vec<ColumnSelection> = columns
        .iter()
        .map(|c| ColumnSelection {
            field: c.name.to_compact_string(),
            alias: c.name.to_compact_string(),
            ty: c.ty,
            hidden: false,
        })
        .collect();

    let mut nested_selections = Vec::new();
    // Nested sub-selects correlate through this level's alias, so the
    // columns they join on must survive a derived-table projection even
    // when the caller's column subset omits them.
    let mut correlation_columns: Vec<CompactString> = Vec::new();
    for (name, nested_request) in &request.with {
        let nested_relation = resolve_relation(target, name)?;
        let nested_sources: Vec<&str> = match &nested_relation.through {
            None => nested_relation.keys.iter().map(|(_, s)| s.as_str()).collect(),
            Some(junction) => vec![junction.source_key.1.as_str()],
        };
        for source in nested_sources {
            if columns.iter().all(|c| c.name != source)
                && correlation_columns.iter().all(|c| c.as_str() != source)
            {
                correlation_columns.push(source.to_compact_string());
            }
        }
        let (subquery, selection) = embedded_relation(
            schema,
            dialect,
            nested_relation,
            nested_request,
            &target_alias,
            aliases,
        )?;
        // SQLite returns aggregated JSON as text; mark it as a JSON
        // subcomponent so the outer object nests it instead of quoting it.
        let nested_value = if dialect.json.nested_json_fn.is_empty() {
            subquery
        } else {
            Sql::raw(dialect.json.nested_json_fn).append(subquery.parenthesized())
        };
        object_args.push(Sql::raw(json_key(name)).append(nested_value));
        nested_selections.push(selection);
    }

    let object = Sql::raw(dialect.json.object_fn)
        .append(Sql::join(object_args, ", ").parenthesized());

    let filter = request
        .filter
        .as_ref()
        .map(|f| rewrite_table(f, &target.name, &target_alias));
    let order = order_terms(target, &target_alias, &request.order_by)?;

    let cardinality = match relation.kind {
        RelationKind::One => Cardinality::One,
        RelationKind::Many => Cardinality::Many,
    };

    // Pagination or ordering on a to-many relation must apply before
    // aggregation, which takes an inner derived table.
    let needs_inner = cardinality == Cardinality::Many
        && (request.limit.is_some() || request.offset.is_some() || !order.is_empty());

    let where_filter = |sql: Sql| -> Sql {
        let present = filter.is_some();
        sql.append(Sql::raw(" AND ").only_if(present))
            .append(filter.clone().unwrap_or_default())
    };

    let body = match cardinality {
        Cardinality::Many => {
            let aggregated = Sql::raw("coalesce(")
                .append_raw(dialect.json.array_agg_fn)
                .append(object.parenthesized())
                .append_raw(", ")
                .append_raw(dialect.json.empty_array)
                .append_raw(")");
            if needs_inner {
                let inner = Sql::raw("SELECT ")
                    .append(Sql::join(
                        columns
                            .iter()
                            .map(|c| Sql::qualified(&target_alias, &c.name))
                            .chain(
                                correlation_columns
                                    .iter()
                                    .map(|c| Sql::qualified(&target_alias, c)),
                            ),
                        ", ",
                    ))
                    .append_raw(" FROM ")
                    .append(from_core)
                    .append_raw(" WHERE ")
                    .append(where_filter(correlation))
                    .append(Sql::raw(" ORDER BY ").only_if(!order.is_empty()))
                    .append(order)
                    .append(pagination(request.limit, request.offset));
                Sql::raw("SELECT ")
                    .append(aggregated)
                    .append_raw(" FROM ")
                    .append(inner.parenthesized())
                    .append_raw(" AS ")
                    .append(Sql::ident(&target_alias))
            } else {
                Sql::raw("SELECT ")
                    .append(aggregated)
                    .append_raw(" FROM ")
                    .append(from_core)
                    .append_raw(" WHERE ")
                    .append(where_filter(correlation))
            }
        }
        Cardinality::One => Sql::raw("SELECT ")
            .append(object)
            .append_raw(" FROM ")
            .append(from_core)
            .append_raw(" WHERE ")
            .append(where_filter(correlation))
            .append(Sql::raw(" ORDER BY ").only_if(!order.is_empty()))
            .append(order)
            .append_raw(" LIMIT 1"),
    };

    let primary_key = primary_key_fields(target, &column_selections);
    Ok((
        body.parenthesized(),
        RelationSelection {
            field: relation.name.to_compact_string(),
            cardinality,
            // Overwritten by the caller; nested levels key by field name.
            fetch: RelationFetch::Embedded {
                alias: relation.name.to_compact_string(),
            },
            descriptor: SelectionDescriptor {
                table: target.name.clone(),
                columns: column_selections,
                relations: nested_selections,
                primary_key,
            },
            limit: request.limit,
            offset: request.offset,
        },
    ))
}

// =============================================================================
// Batched (non-lateral) strategy
// =============================================================================

fn batched_root(
    schema: &Schema,
    table: &Table,
    request: &SelectionRequest,
    alias: &str,
    aliases: &mut AliasAllocator,
) -> Result<(Sql, SelectionDescriptor)> {
    let node = batched_node(schema, table, request, alias, aliases, &[])?;

    let filter = request
        .filter
        .as_ref()
        .map(|f| rewrite_table(f, &table.name, alias));
    let order = order_terms(table, alias, &request.order_by)?;

    let fragment = node
        .select_from
        .append(Sql::raw(" WHERE ").only_if(filter.is_some()))
        .append(filter.unwrap_or_default())
        .append(Sql::raw(" ORDER BY ").only_if(!order.is_empty()))
        .append(order)
        .append(pagination(request.limit, request.offset));

    Ok((fragment, node.descriptor))
}

struct BatchedNode {
    /// `SELECT cols FROM "table" AS "alias"`, no WHERE yet.
    select_from: Sql,
    descriptor: SelectionDescriptor,
}

/// Builds the select list and round-trip recipes for one level of the
/// batched strategy. `forced_fields` are stitching keys a parent level
/// needs selected even when the caller's column subset omits them.
fn batched_node(
    schema: &Schema,
    table: &Table,
    request: &SelectionRequest,
    alias: &str,
    aliases: &mut AliasAllocator,
    forced_fields: &[&str],
) -> Result<BatchedNode> {
    let columns = resolve_columns(table, request)?;
    let mut column_selections: Vec<ColumnSelection> = columns
        .iter()
        .map(|c| ColumnSelection {
            field: c.name.to_compact_string(),
            alias: c.name.to_compact_string(),
            ty: c.ty,
            hidden: false,
        })
        .collect();

    let mut force = |name: &str, selections: &mut Vec<ColumnSelection>| -> Result<()> {
        if selections.iter().any(|c| c.field.as_str() == name) {
            return Ok(());
        }
        let column = table.find_column(name).ok_or_else(|| {
            Error::config(format!(
                "stitching key \"{name}\" is not a column of table \"{}\"",
                table.name
            ))
        })?;
        selections.push(ColumnSelection {
            field: column.name.to_compact_string(),
            alias: column.name.to_compact_string(),
            ty: column.ty,
            hidden: true,
        });
        Ok(())
    };

    for name in forced_fields {
        force(name, &mut column_selections)?;
    }

    let mut relations = Vec::new();
    for (name, sub_request) in &request.with {
        let relation = resolve_relation(table, name)?;
        let target = schema.table(&relation.target)?;
        let target_alias = aliases.next(alias, name);

        let selection = match &relation.through {
            None => {
                let mut parent_key_fields = Vec::with_capacity(relation.keys.len());
                let mut child_key_fields = Vec::with_capacity(relation.keys.len());
                let mut key_types = Vec::with_capacity(relation.keys.len());
                for (target_key, source_key) in &relation.keys {
                    force(source_key, &mut column_selections)?;
                    let ty = table
                        .find_column(source_key)
                        .map(|c| c.ty)
                        .ok_or_else(|| {
                            Error::config(format!("unknown key column \"{source_key}\""))
                        })?;
                    parent_key_fields.push(source_key.to_compact_string());
                    child_key_fields.push(target_key.to_compact_string());
                    key_types.push(ty);
                }
                let forced: Vec<&str> =
                    relation.keys.iter().map(|(t, _)| t.as_str()).collect();
                let child = batched_node(
                    schema,
                    target,
                    sub_request,
                    &target_alias,
                    aliases,
                    &forced,
                )?;
                // Composite keys batch as row-value tuples:
                // `(a, b) IN ((?, ?), ...)`.
                let key_expr = if relation.keys.len() == 1 {
                    Sql::qualified(&target_alias, &relation.keys[0].0)
                } else {
                    Sql::join(
                        relation
                            .keys
                            .iter()
                            .map(|(t, _)| Sql::qualified(&target_alias, t)),
                        ", ",
                    )
                    .parenthesized()
                };
                let prefix = child
                    .select_from
                    .append_raw(" WHERE ")
                    .append(key_expr)
                    .append_raw(" IN ");
                let suffix = batched_suffix(sub_request, target, &target_alias)?;

                RelationSelection {
                    field: name.to_compact_string(),
                    cardinality: match relation.kind {
                        RelationKind::One => Cardinality::One,
                        RelationKind::Many => Cardinality::Many,
                    },
                    fetch: RelationFetch::Batched(Box::new(BatchedFetch {
                        parent_key_fields,
                        child_key_fields,
                        key_types,
                        prefix,
                        suffix,
                        dedup: false,
                    })),
                    descriptor: child.descriptor,
                    limit: sub_request.limit,
                    offset: sub_request.offset,
                }
            }
            Some(junction) => {
                let junction_alias = aliases.next(alias, name);
                force(&junction.source_key.1, &mut column_selections)?;
                let key_type = table
                    .find_column(&junction.source_key.1)
                    .map(|c| c.ty)
                    .ok_or_else(|| {
                        Error::config(format!(
                            "unknown key column \"{}\"",
                            junction.source_key.1
                        ))
                    })?;

                // The junction join can repeat targets per parent; the
                // child's primary key drives de-duplication, so force it.
                let pk: Vec<String> =
                    target.primary_key().iter().map(|s| s.to_string()).collect();
                let pk_refs: Vec<&str> = pk.iter().map(String::as_str).collect();
                let mut child = batched_node(
                    schema,
                    target,
                    sub_request,
                    &target_alias,
                    aliases,
                    &pk_refs,
                )?;
                // A junction fetch drives from the junction join, not the
                // bare target table, and selects the junction's parent key
                // as a hidden stitching column.
                let prefix = Sql::raw("SELECT ")
                    .append(Sql::join(
                        child
                            .descriptor
                            .columns
                            .iter()
                            .map(|c| Sql::qualified(&target_alias, &c.field)),
                        ", ",
                    ))
                    .append_raw(", ")
                    .append(Sql::qualified(&junction_alias, &junction.source_key.0))
                    .append_raw(" AS ")
                    .append(Sql::ident("__jk"))
                    .append_raw(" FROM ")
                    .append(table_as(&junction.table, &junction_alias))
                    .append_raw(" JOIN ")
                    .append(table_as(&target.name, &target_alias))
                    .append_raw(" ON ")
                    .append(Sql::qualified(&target_alias, &junction.target_key.1))
                    .append_raw(" = ")
                    .append(Sql::qualified(&junction_alias, &junction.target_key.0))
                    .append_raw(" WHERE ")
                    .append(Sql::qualified(&junction_alias, &junction.source_key.0))
                    .append_raw(" IN ");
                child.descriptor.columns.push(ColumnSelection {
                    field: CompactString::const_new("__jk"),
                    alias: CompactString::const_new("__jk"),
                    ty: key_type,
                    hidden: true,
                });

                let suffix = batched_suffix(sub_request, target, &target_alias)?;

                RelationSelection {
                    field: name.to_compact_string(),
                    cardinality: Cardinality::Many,
                    fetch: RelationFetch::Batched(Box::new(BatchedFetch {
                        parent_key_fields: vec![junction.source_key.1.to_compact_string()],
                        child_key_fields: vec![CompactString::const_new("__jk")],
                        key_types: vec![key_type],
                        prefix,
                        suffix,
                        dedup: true,
                    })),
                    descriptor: child.descriptor,
                    limit: sub_request.limit,
                    offset: sub_request.offset,
                }
            }
        };
        relations.push(selection);
    }

    let select_from = Sql::raw("SELECT ")
        .append(Sql::join(
            column_selections
                .iter()
                .map(|c| Sql::qualified(alias, &c.field)),
            ", ",
        ))
        .append_raw(" FROM ")
        .append(table_as(&table.name, alias));

    let primary_key = primary_key_fields(table, &column_selections);
    Ok(BatchedNode {
        select_from,
        descriptor: SelectionDescriptor {
            table: table.name.clone(),
            columns: column_selections,
            relations,
            primary_key,
        },
    })
}

fn batched_suffix(request: &SelectionRequest, target: &Table, target_alias: &str) -> Result<Sql> {
    let filter = request
        .filter
        .as_ref()
        .map(|f| rewrite_table(f, &target.name, target_alias));
    let order = order_terms(target, target_alias, &request.order_by)?;
    Ok(Sql::raw(" AND ")
        .only_if(filter.is_some())
        .append(filter.unwrap_or_default())
        .append(Sql::raw(" ORDER BY ").only_if(!order.is_empty()))
        .append(order))
}
