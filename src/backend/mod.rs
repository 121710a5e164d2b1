//! # Backends
//!
//! The handful of table-level operations the migration and seed scripts need
//! from a database. `RestBackend` talks to the hosted PostgREST API;
//! `LocalBackend` runs the same operations against a SQLite file so both
//! scripts can be rehearsed offline.

mod local;
mod rest;

pub use local::LocalBackend;
pub use rest::RestBackend;

use crate::error::BazaarResult;
use serde_json::Value;

/// SQL flavour accepted by `Backend::exec_sql`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    Sqlite,
}

/// Table-level operations against a database.
///
/// Implementations must report a missing column from `probe_column` as
/// `BazaarError::UndefinedColumn`, whatever their native signal is.
#[allow(async_fn_in_trait)]
pub trait Backend {
    /// SQL dialect for statements passed to `exec_sql`
    fn dialect(&self) -> Dialect;

    /// Human-readable target, for logs
    fn describe(&self) -> String;

    /// Number of rows currently in `table`
    async fn count_rows(&self, table: &str) -> BazaarResult<u64>;

    /// Inserts all `rows` into `table` as one unit. Returns the number inserted.
    async fn insert_rows(&self, table: &str, rows: &[Value]) -> BazaarResult<u64>;

    /// Runs raw SQL
    async fn exec_sql(&self, sql: &str) -> BazaarResult<()>;

    /// Selects `column` from `table` to find out whether it exists
    async fn probe_column(&self, table: &str, column: &str) -> BazaarResult<()>;
}

#[cfg(test)]
pub(crate) mod mock;
