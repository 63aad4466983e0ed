//! Engine dialects for recordkit.
//!
//! `recordkit-schema` implements [`recordkit_query::Dialect`] for the
//! supported engines:
//!
//! - [`SqliteDialect`] - `INSERT OR REPLACE`, inline `AUTOINCREMENT` keys
//! - [`MysqlDialect`] - backtick quoting, `LIMIT offset, count`, `REPLACE INTO`
//! - [`PostgresDialect`] - `ON CONFLICT` upserts, `SERIAL` keys
//!
//! Each dialect generates `CREATE TABLE IF NOT EXISTS` DDL through [`ddl`] and
//! reads existing tables back through [`introspect`].

pub mod ddl;
pub mod introspect;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use std::sync::Arc;

use recordkit_core::{Error, Result};
use recordkit_query::Dialect;

pub use ddl::{Engine, quote_identifier};
pub use mysql::MysqlDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

/// Dialect for an engine name as found in connection URLs and config files.
pub fn dialect_for(name: &str) -> Result<Arc<dyn Dialect>> {
    match name.to_ascii_lowercase().as_str() {
        "sqlite" | "sqlite3" => Ok(Arc::new(SqliteDialect)),
        "mysql" | "mariadb" => Ok(Arc::new(MysqlDialect)),
        "postgres" | "postgresql" | "pg" => Ok(Arc::new(PostgresDialect)),
        other => Err(Error::config(format!("Unsupported dialect: {}", other))),
    }
}
