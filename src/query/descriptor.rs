//! Selection descriptors: metadata recorded by the planner mapping output
//! columns and aliases back to the logical fields the caller requested.
//! Row reassembly is driven entirely by this tree.

use compact_str::CompactString;

use crate::sql::Sql;
use crate::value::ColumnType;

/// Relation arity as it affects reassembly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// Reassembles to a single record, or an explicit absent value when the
    /// outer-joined branch matched nothing.
    One,
    /// Reassembles to a list, empty when nothing matched.
    Many,
}

/// One output column: which field it feeds, under which output alias it
/// arrives, and how to decode it.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSelection {
    pub field: CompactString,
    pub alias: CompactString,
    pub ty: ColumnType,
    /// Selected only to drive stitching (key columns); stripped from the
    /// final records.
    pub hidden: bool,
}

/// How a relation's rows reach the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationFetch {
    /// Pre-aggregated JSON column in the parent row (lateral strategy).
    /// At the root level `alias` names the output column; nested levels key
    /// into the parent's JSON object by field name.
    Embedded { alias: CompactString },
    /// Separate per-level round trip stitched by key matching.
    Batched(Box<BatchedFetch>),
}

/// The round-trip recipe for one batched relation level.
///
/// Composite-key relations carry one entry per key pair, in declaration
/// order; the batch then matches row-value tuples.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchedFetch {
    /// Fields on parent records whose values key the batch.
    pub parent_key_fields: Vec<CompactString>,
    /// Fields on child records used for grouping (a hidden junction key for
    /// many-to-many).
    pub child_key_fields: Vec<CompactString>,
    /// Binding types for the `IN (...)` parameters, one per key field.
    pub key_types: Vec<ColumnType>,
    /// Everything up to and including ` IN `; the executor appends the
    /// parenthesized key list.
    pub prefix: Sql,
    /// Filter and ordering appended after the key list.
    pub suffix: Sql,
    /// Collapse duplicate children per parent, keyed by the child's
    /// primary key. Set when rows come from a driving join (junction
    /// tables), where repeated parents/children can occur.
    pub dedup: bool,
}

/// One requested relation and how to reassemble it.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSelection {
    pub field: CompactString,
    pub cardinality: Cardinality,
    pub fetch: RelationFetch,
    pub descriptor: SelectionDescriptor,
    /// Per-parent-row pagination, applied during stitching for batched
    /// fetches (the SQL already applies it for embedded ones).
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// The descriptor tree for one table level, mirroring the request shape.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionDescriptor {
    pub table: String,
    pub columns: Vec<ColumnSelection>,
    pub relations: Vec<RelationSelection>,
    /// Primary-key field names, used to collapse repeated rows.
    pub primary_key: Vec<CompactString>,
}
