//! recordkit - active-record models and fluent SQL queries.
//!
//! recordkit provides:
//!
//! - [`Query`]: SQL text with positional `?` parameters, run through a cache
//!   pipeline and mapped to [`DataMap`]s, entities or pages
//! - [`Model`]: change-tracked entities with load/save/update/delete, audit
//!   columns, optimistic versioning, history tables and partitions
//! - [`Tx`]: an explicit transaction handle shared by queries and models
//! - Dialects for SQLite, MySQL and PostgreSQL, and a bundled SQLite driver
//!
//! # Quick Start
//!
//! ```ignore
//! use recordkit::prelude::*;
//!
//! let db = recordkit::sqlite_db("main", SqliteDataSource::file("app.db"), Properties::new())?;
//!
//! let mut order = Model::<Order>::new().use_db(&db);
//! order.set("title", "first")?;
//! order.save()?;
//!
//! let open: Vec<DataMap> = db
//!     .query()
//!     .add("SELECT * FROM orders WHERE 1=1", ())
//!     .add_if_not_empty(" AND status = ?", [status])
//!     .list()?;
//!
//! let tx = Tx::new();
//! order.set_tx(Some(&tx));
//! order.delete()?;
//! tx.commit()?;
//! ```

use std::sync::Arc;

pub use recordkit_core::{
    Cache, CacheKey, Connection, DataMap, DataSource, DbProp, Error, FieldValidationError,
    FromDataMap, FromValue, MemoryCache, Properties, QueryErrorKind, Result, Row, SqlType,
    UnknownFieldPolicy, ValidationErrorKind, Value,
};
pub use recordkit_model::{
    Column, DatePartition, Entity, Field, MetaPartition, Model, ModelEvent, ModelListener,
    ModelMeta, Partition, assign,
};
pub use recordkit_query::{
    CURRENT_USER_ID, ColumnDef, CreateTable, DbConfig, Dialect, Exchange, IndexDef, LoadTarget,
    Page, Params, Query, RecordingExchange, Registry, ResultHandler, Tx, params,
};
pub use recordkit_schema::{MysqlDialect, PostgresDialect, SqliteDialect, dialect_for};
pub use recordkit_sqlite::{SqliteConfig, SqliteConnection, SqliteDataSource};

/// The commonly used types.
pub mod prelude {
    pub use crate::{
        Column, DataMap, DbConfig, DbProp, Entity, Error, Field, Model, ModelEvent, ModelListener,
        Page, Properties, Query, Result, SqlType, SqliteDataSource, Tx, Value, assign, params,
    };
}

/// A database on SQLite.
pub fn sqlite_db(key: impl Into<String>, source: SqliteDataSource, properties: Properties) -> Result<DbConfig> {
    DbConfig::builder(key)
        .data_source(Arc::new(source))
        .dialect(Arc::new(SqliteDialect))
        .properties(properties)
        .build()
}

/// A database whose dialect is named by `dialect` and whose properties are a
/// JSON object of strings, e.g. `{"sql.debug": "true"}`.
pub fn db_from_json(
    key: impl Into<String>,
    dialect: &str,
    source: Arc<dyn DataSource>,
    properties_json: &str,
) -> Result<DbConfig> {
    let key = key.into();
    let properties = Properties::from_json_str(properties_json)?;
    tracing::debug!(db = %key, dialect, "Configuring database");
    DbConfig::builder(key)
        .data_source(source)
        .dialect(dialect_for(dialect)?)
        .properties(properties)
        .build()
}
