//! The driver seam.
//!
//! Connection management, wire protocols, and retries all live behind this
//! trait; the engine only hands over rendered statements and reads back flat
//! rows. Dropping an in-flight future is the only cancellation mechanism
//! this layer offers; no signal is propagated to the underlying connection.

use crate::error::Result;
use crate::render::Statement;
use crate::row::Row;

/// Executes rendered statements against a database.
///
/// Implementations wrap a vendor client library. Errors are propagated to
/// the caller unmodified as [`Error::Execution`](crate::Error::Execution);
/// this layer performs no retries.
#[allow(async_fn_in_trait)]
pub trait Executor {
    /// Runs a statement expected to produce rows.
    async fn query(&self, statement: &Statement) -> Result<Vec<Row>>;

    /// Runs a statement expected to produce a row count.
    async fn execute(&self, statement: &Statement) -> Result<u64>;
}
