//! The table/relation schema graph.
//!
//! Built once at startup, read-only afterwards, shared by every query. A
//! [`Schema`] maps table names to column definitions and declared relations;
//! [`Schema::new`] validates that every relation resolves to real tables and
//! columns, so the planner can trust the graph. Cycles (self-referencing
//! relations) are permitted; expansion depth is bounded by the request,
//! not the schema.

use hashbrown::HashMap;

use crate::error::{Error, Result};
use crate::value::ColumnType;

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
    pub primary_key: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Column {
            name: name.into(),
            ty,
            primary_key: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

/// Relation arity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// To-one; reassembly yields a single record or an absent value.
    One,
    /// To-many; reassembly yields a list, empty when nothing matches.
    Many,
}

/// A many-to-many hop through a junction table.
///
/// `source_key` joins the junction to the declaring table, `target_key`
/// joins it to the target: `(junction column, endpoint column)` each.
#[derive(Debug, Clone, PartialEq)]
pub struct Junction {
    pub table: String,
    pub source_key: (String, String),
    pub target_key: (String, String),
}

/// A declared association between two tables.
#[derive(Debug, Clone, PartialEq)]
pub struct Relation {
    pub name: String,
    pub target: String,
    pub kind: RelationKind,
    /// Join key pairs: `(target column, source column)`; each pair renders
    /// `target."a" = source."b"`. Unused when `through` is set.
    pub keys: Vec<(String, String)>,
    pub through: Option<Junction>,
}

impl Relation {
    /// A to-one relation (e.g. `post.author`): `target.key = source.key`.
    pub fn one(
        name: impl Into<String>,
        target: impl Into<String>,
        target_column: impl Into<String>,
        source_column: impl Into<String>,
    ) -> Self {
        Relation {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::One,
            keys: vec![(target_column.into(), source_column.into())],
            through: None,
        }
    }

    /// A to-many relation (e.g. `user.posts`).
    pub fn many(
        name: impl Into<String>,
        target: impl Into<String>,
        target_column: impl Into<String>,
        source_column: impl Into<String>,
    ) -> Self {
        Relation {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::Many,
            keys: vec![(target_column.into(), source_column.into())],
            through: None,
        }
    }

    /// A many-to-many relation through a junction table.
    pub fn many_through(
        name: impl Into<String>,
        target: impl Into<String>,
        junction: Junction,
    ) -> Self {
        Relation {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::Many,
            keys: Vec::new(),
            through: Some(junction),
        }
    }

    /// Appends an additional join key pair for composite-key relations.
    pub fn key(
        mut self,
        target_column: impl Into<String>,
        source_column: impl Into<String>,
    ) -> Self {
        self.keys.push((target_column.into(), source_column.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub relations: Vec<Relation>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Table {
            name: name.into(),
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn find_relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Names of the primary-key columns, in declaration order.
    pub fn primary_key(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// The process-wide schema graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    tables: HashMap<String, Table>,
}

impl Schema {
    /// Builds the graph, validating every relation reference.
    pub fn new(tables: impl IntoIterator<Item = Table>) -> Result<Self> {
        let mut map = HashMap::new();
        for table in tables {
            if map.insert(table.name.clone(), table).is_some() {
                return Err(Error::config("duplicate table declaration"));
            }
        }
        let schema = Schema { tables: map };
        schema.validate()?;
        Ok(schema)
    }

    fn validate(&self) -> Result<()> {
        for table in self.tables.values() {
            for relation in &table.relations {
                let target = self.tables.get(&relation.target).ok_or_else(|| {
                    Error::config(format!(
                        "relation \"{}\" on table \"{}\" targets unknown table \"{}\"",
                        relation.name, table.name, relation.target
                    ))
                })?;
                if let Some(junction) = &relation.through {
                    let junction_table = self.tables.get(&junction.table).ok_or_else(|| {
                        Error::config(format!(
                            "relation \"{}\" on table \"{}\" goes through unknown table \"{}\"",
                            relation.name, table.name, junction.table
                        ))
                    })?;
                    check_column(junction_table, &junction.source_key.0, relation)?;
                    check_column(table, &junction.source_key.1, relation)?;
                    check_column(junction_table, &junction.target_key.0, relation)?;
                    check_column(target, &junction.target_key.1, relation)?;
                } else {
                    if relation.keys.is_empty() {
                        return Err(Error::config(format!(
                            "relation \"{}\" on table \"{}\" declares no key columns",
                            relation.name, table.name
                        )));
                    }
                    for (target_column, source_column) in &relation.keys {
                        check_column(target, target_column, relation)?;
                        check_column(table, source_column, relation)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Looks up a table, failing with a configuration error when absent.
    pub fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::config(format!("unknown table \"{name}\"")))
    }
}

fn check_column(table: &Table, column: &str, relation: &Relation) -> Result<()> {
    if table.find_column(column).is_none() {
        return Err(Error::config(format!(
            "relation \"{}\" references unknown column \"{}\" on table \"{}\"",
            relation.name, column, table.name
        )));
    }
    Ok(())
}
