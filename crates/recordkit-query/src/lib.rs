//! Parameterized queries for recordkit.
//!
//! `recordkit-query` is the **execution layer**. It turns SQL text plus
//! positional parameters into results:
//!
//! - [`Query`] accumulates SQL and parameters and offers the read/write paths
//! - [`execute`] holds the strategies each path runs, wrapped in a cache pipeline
//! - [`ResultHandler`] maps rows, [`Exchange`] may claim a query before any I/O
//! - [`DbConfig`] and [`Registry`] describe databases and on-demand tables
//! - [`Dialect`] abstracts paging, counting and DDL per engine
//! - [`Tx`] is an explicit, shareable transaction handle
//!
//! Engine dialects live in `recordkit-schema`; drivers implement
//! `recordkit_core::Connection`.

pub mod db;
pub mod dialect;
pub mod execute;
pub mod handler;
pub mod page;
pub mod query;
pub mod sql_helper;
pub mod tx;

#[cfg(test)]
pub(crate) mod testing;

pub use db::{DbConfig, DbConfigBuilder, Registry};
pub use dialect::{ColumnDef, CreateTable, Dialect, IndexDef, TableType, history_columns};
pub use execute::{
    CacheExecutor, Execute, InsertExecutor, ResultExecutor, ResultLoadExecutor,
    ResultSetExecutor, ResultSetsExecutor, UpdateExecutor,
};
pub use handler::{Exchange, LoadTarget, RecordingExchange, ResultHandler};
pub use page::Page;
pub use query::{DEFAULT_RESULTSET_DEPTH, Params, Query};
pub use sql_helper::executable_sql;
pub use tx::{CURRENT_USER_ID, Tx};

pub use recordkit_core::Value;
