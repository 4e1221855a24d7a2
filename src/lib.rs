//! SQL fragment composition, dialect-aware rendering, and a relational
//! query layer that loads nested records over any [`Executor`].
//!
//! The crate splits into three layers:
//!
//! - [`sql`] and [`expr`]: build parameterized SQL fragments by
//!   composition, with predicate helpers (`eq`, `and`, `in_array`, ...)
//!   that keep values bound rather than interpolated.
//! - [`dialect`] and [`render`]: flatten a fragment into the final SQL
//!   text plus ordered parameters for one target engine.
//! - [`schema`] and [`query`]: a declared table/relation graph, a planner
//!   that expands nested selection requests into statements, and the
//!   reassembly of flat rows into nested [`Record`] graphs.

pub mod builder;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod expr;
pub mod query;
pub mod render;
pub mod row;
pub mod schema;
pub mod sql;
pub mod value;

pub use builder::{delete, insert, select, update};
pub use dialect::{Dialect, JsonSyntax, PlaceholderStyle, QuoteStyle};
pub use error::{Error, Result};
pub use executor::Executor;
pub use expr::{CountStar, count_star};
pub use query::{OrderBy, QueryPlan, SelectionRequest, find_first, find_many, plan};
pub use render::Statement;
pub use row::{FieldValue, Record, Row};
pub use schema::{Column, Junction, Relation, RelationKind, Schema, Table};
pub use sql::Sql;
pub use value::{ColumnType, DriverValue, Value};
