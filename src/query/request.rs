//! Nested selection requests: the input to the relational query planner.

use crate::sql::Sql;

/// One ordering term on the requested table's columns.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// A nested "find" request: which columns to return, which declared
/// relations to load alongside, and per-level filter/order/pagination.
///
/// A request for relation `R` is only valid when the table declares a
/// relation named `R`; the planner rejects anything else with a
/// configuration error.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectionRequest {
    /// Column subset; `None` selects every declared column.
    pub columns: Option<Vec<String>>,
    /// Relations to load, each with its own nested request.
    pub with: Vec<(String, SelectionRequest)>,
    pub filter: Option<Sql>,
    pub order_by: Vec<OrderBy>,
    /// For relations this limit applies per parent row, not globally.
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SelectionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the selection to the named columns.
    pub fn columns(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    /// Loads a declared relation alongside this level.
    pub fn with(mut self, relation: impl Into<String>, request: SelectionRequest) -> Self {
        self.with.push((relation.into(), request));
        self
    }

    /// Filters this level. Column references are written against the table
    /// name; the planner rewrites them to the generated alias. An empty
    /// predicate is ignored.
    pub fn filter(mut self, predicate: impl Into<Sql>) -> Self {
        let predicate = predicate.into();
        self.filter = (!predicate.is_empty()).then_some(predicate);
        self
    }

    pub fn order_by_asc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(OrderBy {
            column: column.into(),
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, column: impl Into<String>) -> Self {
        self.order_by.push(OrderBy {
            column: column.into(),
            descending: true,
        });
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
}
