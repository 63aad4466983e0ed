//! Database connection traits.
//!
//! - [`Connection`] - a live, blocking connection: statements, batches and
//!   transaction control
//! - [`DataSource`] - where fresh connections come from; pooling lives behind
//!   this boundary
//!
//! Drivers implement both. Everything above this layer talks to `dyn Connection`.

use std::sync::Arc;

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// A live database connection.
///
/// Statements use `?` placeholders bound positionally from `params`. A driver
/// must reject a parameter count that does not match the statement with a
/// `QueryErrorKind::Binding` error.
pub trait Connection: Send + Sync {
    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute text that may hold several statements, returning one row set per
    /// statement that produces columns, at most `max_sets` of them.
    ///
    /// Parameters are consumed in order across the statements. The default
    /// treats the text as a single statement.
    fn query_sets(&self, sql: &str, params: &[Value], max_sets: usize) -> Result<Vec<Vec<Row>>> {
        if max_sets == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![self.query(sql, params)?])
    }

    /// Execute a statement and return the number of rows affected.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute an INSERT and return the generated key of the last row.
    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64>;

    /// Execute one statement once per parameter set.
    ///
    /// Stops at the first failure; transaction handling is up to the caller.
    fn execute_batch(&self, sql: &str, batch: &[Vec<Value>]) -> Result<Vec<u64>> {
        batch
            .iter()
            .map(|params| self.execute(sql, params))
            .collect()
    }

    /// Begin a transaction (turns auto-commit off until commit/rollback).
    fn begin(&self) -> Result<()>;

    /// Commit the current transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the current transaction.
    fn rollback(&self) -> Result<()>;

    /// Whether a transaction is open on this connection.
    fn in_transaction(&self) -> bool;

    /// Check that the connection is usable.
    fn ping(&self) -> Result<()> {
        self.query("SELECT 1", &[]).map(|_| ())
    }
}

/// A source of fresh connections.
pub trait DataSource: Send + Sync {
    /// Open (or check out) a connection. It is released when the last handle drops.
    fn connection(&self) -> Result<Arc<dyn Connection>>;
}

impl<F> DataSource for F
where
    F: Fn() -> Result<Arc<dyn Connection>> + Send + Sync,
{
    fn connection(&self) -> Result<Arc<dyn Connection>> {
        self()
    }
}
