//! The relational query layer.
//!
//! The pipeline: a [`SelectionRequest`] names columns and relations to
//! load; [`plan`] expands it against the schema graph into statements plus
//! a [`SelectionDescriptor`]; [`find_many`]/[`find_first`] execute the plan
//! through an [`Executor`](crate::Executor) and reassemble the flat rows
//! into nested [`Record`](crate::Record) graphs.

pub mod descriptor;
mod plan;
mod request;
mod run;

pub use descriptor::{
    BatchedFetch, Cardinality, ColumnSelection, RelationFetch, RelationSelection,
    SelectionDescriptor,
};
pub use plan::{QueryPlan, plan};
pub use request::{OrderBy, SelectionRequest};
pub use run::{find_first, find_many};
