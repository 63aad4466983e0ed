//! The parameterized query builder and its execution paths.

use std::fmt;
use std::sync::Arc;

use recordkit_core::{
    Cache, CacheKey, Connection, DataMap, DbProp, Error, FromDataMap, Result, Value,
};

use crate::db::DbConfig;
use crate::dialect::Dialect;
use crate::execute::{
    CacheExecutor, Execute, InsertExecutor, ResultExecutor, ResultLoadExecutor,
    ResultSetExecutor, ResultSetsExecutor, UpdateExecutor,
};
use crate::handler::{Exchange, LoadTarget, ResultHandler};
use crate::page::Page;
use crate::sql_helper;
use crate::tx::Tx;

/// Result sets read by [`Query::all_results`] when `multi.resultset.depth` is unset.
pub const DEFAULT_RESULTSET_DEPTH: usize = 100;

/// Positional arguments for [`Query::add`].
///
/// Implemented for `()`, arrays, vectors, slices of [`Value`] and tuples of up
/// to six values. [`Value::Array`] arguments are flattened into their elements.
pub trait Params {
    fn into_values(self) -> Vec<Value>;
}

impl Params for () {
    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }
}

impl<V: Into<Value>, const N: usize> Params for [V; N] {
    fn into_values(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl<V: Into<Value>> Params for Vec<V> {
    fn into_values(self) -> Vec<Value> {
        self.into_iter().map(Into::into).collect()
    }
}

impl Params for &[Value] {
    fn into_values(self) -> Vec<Value> {
        self.to_vec()
    }
}

macro_rules! tuple_params {
    ($($name:ident),+) => {
        impl<$($name: Into<Value>),+> Params for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_values(self) -> Vec<Value> {
                let ($($name,)+) = self;
                vec![$($name.into()),+]
            }
        }
    };
}

tuple_params!(A);
tuple_params!(A, B);
tuple_params!(A, B, C);
tuple_params!(A, B, C, D);
tuple_params!(A, B, C, D, E);
tuple_params!(A, B, C, D, E, F);

/// Build a `Vec<Value>` from heterogeneous arguments.
///
/// ```
/// use recordkit_query::params;
/// let p = params![1, "a", 2.5];
/// assert_eq!(p.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::Value>::new()
    };
    ($($v:expr),+ $(,)?) => {
        vec![$($crate::Value::from($v)),+]
    };
}

/// A SQL text with `?` placeholders and its positional parameters.
///
/// Fragments and parameters are appended in call order. Reads first offer the
/// query to an attached [`Exchange`]; otherwise a database must have been set.
///
/// # Example
///
/// ```ignore
/// let rows = Query::with_db(&db)
///     .add("SELECT * FROM orders WHERE 1=1", ())
///     .add_if_not_empty(" AND status = ?", [status])
///     .list()?;
/// ```
#[derive(Clone, Default)]
pub struct Query {
    sql: String,
    parameters: Vec<Value>,
    batch_parameters: Vec<Vec<Value>>,
    db: Option<DbConfig>,
    enable_cache: bool,
    cache: Option<Arc<dyn Cache>>,
    tag: Option<String>,
    readonly: Option<bool>,
    debug_sql: Option<bool>,
    tx: Option<Tx>,
    exchange: Option<Arc<dyn Exchange>>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_db(db: &DbConfig) -> Self {
        Self::new().use_db(db)
    }

    pub fn use_db(mut self, db: &DbConfig) -> Self {
        self.db = Some(db.clone());
        self
    }

    pub fn db(&self) -> Option<&DbConfig> {
        self.db.as_ref()
    }

    pub fn dialect(&self) -> Result<Arc<dyn Dialect>> {
        self.require_db().map(DbConfig::dialect)
    }

    /// Run inside `tx`, borrowing its connection.
    pub fn tx(mut self, tx: &Tx) -> Self {
        self.tx = Some(tx.clone());
        self
    }

    pub fn with_tx(mut self, tx: Option<&Tx>) -> Self {
        self.tx = tx.cloned();
        self
    }

    pub fn current_tx(&self) -> Option<&Tx> {
        self.tx.as_ref()
    }

    /// Opaque correlation tag; part of the cache key.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn get_tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Use the database cache for this query.
    pub fn enable_cache(mut self, enable: bool) -> Self {
        self.enable_cache = enable;
        self
    }

    pub fn is_cache_enabled(&self) -> bool {
        self.enable_cache
    }

    /// Use `cache` for this query, regardless of [`Query::enable_cache`].
    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The cache reads go through: the explicit one, else the database's when enabled.
    pub fn effective_cache(&self) -> Option<Arc<dyn Cache>> {
        if let Some(cache) = &self.cache {
            return Some(Arc::clone(cache));
        }
        if self.enable_cache {
            return self.db.as_ref().and_then(DbConfig::cache);
        }
        None
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = Some(readonly);
        self
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly.unwrap_or(false)
    }

    /// Override the `sql.debug` property for this query.
    pub fn debug_sql(mut self, debug: bool) -> Self {
        self.debug_sql = Some(debug);
        self
    }

    pub fn is_debug_sql(&self) -> bool {
        match (self.debug_sql, &self.db) {
            (Some(debug), _) => debug,
            (None, Some(db)) => db.properties().bool_value(DbProp::SqlDebug),
            (None, None) => false,
        }
    }

    pub fn exchange(mut self, exchange: Arc<dyn Exchange>) -> Self {
        self.exchange = Some(exchange);
        self
    }

    /// Append `segment` and its arguments.
    pub fn add(mut self, segment: impl AsRef<str>, args: impl Params) -> Self {
        self.sql.push_str(segment.as_ref());
        for arg in args.into_values() {
            arg.flatten_into(&mut self.parameters);
        }
        self
    }

    /// Like [`Query::add`], but a no-op when given exactly one argument that is
    /// null or blank text.
    pub fn add_if_not_empty(self, segment: impl AsRef<str>, args: impl Params) -> Self {
        let args = args.into_values();
        if args.len() == 1 && args[0].is_blank() {
            return self;
        }
        self.add(segment, args)
    }

    /// Append another query's text and parameters.
    pub fn add_query(self, other: &Query) -> Self {
        self.add(&other.sql, other.parameters.as_slice())
    }

    /// Append ` IN (...)` for `values` using the database's dialect.
    pub fn in_values(self, values: impl Params) -> Result<Self> {
        let dialect = self.dialect()?;
        Ok(dialect.in_values(self, values.into_values()))
    }

    /// Append ` NOT IN (...)` for `values` using the database's dialect.
    pub fn not_in(self, values: impl Params) -> Result<Self> {
        let dialect = self.dialect()?;
        Ok(dialect.not_in(self, values.into_values()))
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// SQL with parameters rendered in place, for logs and error text only.
    pub fn executable_sql(&self) -> String {
        sql_helper::executable_sql(&self.sql, &self.parameters)
    }

    pub fn parameters(&self) -> &[Value] {
        &self.parameters
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Reset text and parameters so the query can be reused.
    pub fn clear(&mut self) -> &mut Self {
        self.sql.clear();
        self.parameters.clear();
        self
    }

    pub fn clear_parameters(&mut self) -> &mut Self {
        self.parameters.clear();
        self
    }

    pub fn set_parameters(&mut self, parameters: Vec<Value>) -> &mut Self {
        self.parameters = parameters;
        self
    }

    /// Queue one parameter set for [`Query::execute_batch`].
    ///
    /// Parameters added through [`Query::add`] so far become the first set.
    pub fn add_batch(mut self, params: impl Params) -> Self {
        if !self.parameters.is_empty() {
            let pending = std::mem::take(&mut self.parameters);
            self.batch_parameters.push(pending);
        }
        self.batch_parameters.push(params.into_values());
        self
    }

    pub fn batch_parameters(&self) -> &[Vec<Value>] {
        &self.batch_parameters
    }

    /// A query with new text but this query's parameters and settings.
    pub fn derive(&self, sql: impl Into<String>) -> Query {
        Query {
            sql: sql.into(),
            parameters: self.parameters.clone(),
            batch_parameters: Vec::new(),
            db: self.db.clone(),
            enable_cache: self.enable_cache,
            cache: self.cache.clone(),
            tag: self.tag.clone(),
            readonly: self.readonly,
            debug_sql: self.debug_sql,
            tx: self.tx.clone(),
            exchange: self.exchange.clone(),
        }
    }

    /// Fingerprint: db key, tag (`"null"` when unset), SQL text, each parameter.
    pub fn cache_key(&self) -> Result<CacheKey> {
        let db = self.require_db()?;
        let mut key = CacheKey::new();
        key.update(db.key());
        key.update(self.tag.as_deref().unwrap_or("null"));
        key.update(&self.sql);
        for p in &self.parameters {
            key.update(p);
        }
        Ok(key)
    }

    // ---- execution --------------------------------------------------------

    /// Run as an update and return the affected row count.
    pub fn execute(&self) -> Result<u64> {
        self.run(UpdateExecutor)
    }

    /// Run an INSERT and return the generated key.
    pub fn insert(&self) -> Result<i64> {
        self.run(InsertExecutor)
    }

    /// Run with a custom strategy.
    pub fn execute_with<X>(&self, executor: X) -> Result<X::Output>
    where
        X: Execute,
        X::Output: Clone + Send + Sync + 'static,
    {
        self.run(executor)
    }

    /// Run every queued parameter set against the statement.
    ///
    /// Without a transaction the batch runs in its own: committed when every set
    /// succeeds, rolled back as a whole otherwise. Inside a [`Tx`] the outcome is
    /// left to the transaction owner.
    pub fn execute_batch(&self) -> Result<Vec<u64>> {
        let db = self.require_db()?;
        let mut lease = ConnectionLease::acquire(db, self.tx.as_ref(), false)?;
        if self.is_debug_sql() {
            for params in &self.batch_parameters {
                tracing::info!(
                    target: "recordkit::sql",
                    db = db.key(),
                    "{}",
                    sql_helper::executable_sql(&self.sql, params)
                );
            }
        }

        match lease
            .connection()
            .execute_batch(&self.sql, &self.batch_parameters)
        {
            Ok(counts) => {
                lease.commit().map_err(|e| e.with_sql(self.sql.clone()))?;
                tracing::debug!(db = db.key(), sets = counts.len(), "Batch executed");
                Ok(counts)
            }
            Err(e) => {
                if let Err(rollback_err) = lease.rollback() {
                    tracing::warn!(error = %rollback_err, "Batch rollback failed");
                }
                Err(e.with_sql(self.sql.clone()))
            }
        }
    }

    /// First row as a [`DataMap`].
    pub fn result(&self) -> Result<Option<DataMap>> {
        self.result_with(ResultHandler::new())
    }

    pub fn result_as<T>(&self) -> Result<Option<T>>
    where
        T: FromDataMap + Clone + Send + Sync + 'static,
    {
        self.result_with(ResultHandler::new())
    }

    pub fn result_with<T>(&self, handler: ResultHandler<T>) -> Result<Option<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        if self.exchanged() {
            return Ok(None);
        }
        self.run(ResultExecutor::new(handler))
    }

    pub fn list(&self) -> Result<Vec<DataMap>> {
        self.list_with(ResultHandler::new())
    }

    pub fn list_as<T>(&self) -> Result<Vec<T>>
    where
        T: FromDataMap + Clone + Send + Sync + 'static,
    {
        self.list_with(ResultHandler::new())
    }

    pub fn list_with<T>(&self, handler: ResultHandler<T>) -> Result<Vec<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        if self.exchanged() {
            return Ok(Vec::new());
        }
        self.run(ResultSetExecutor::new(handler))
    }

    /// At most `limit` rows starting at `offset` (0-based), without counting.
    pub fn list_limit(&self, limit: usize, offset: usize) -> Result<Vec<DataMap>> {
        self.list_limit_with(ResultHandler::new(), limit, offset)
    }

    pub fn list_limit_with<T>(
        &self,
        handler: ResultHandler<T>,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        if self.exchanged() {
            return Ok(Vec::new());
        }
        let limited = self.dialect()?.limit_query(self, limit, offset);
        limited.run(ResultSetExecutor::new(handler))
    }

    pub fn page(&self, limit: usize, offset: usize) -> Result<Page<DataMap>> {
        self.page_with(ResultHandler::new(), limit, offset)
    }

    pub fn page_as<T>(&self, limit: usize, offset: usize) -> Result<Page<T>>
    where
        T: FromDataMap + Clone + Send + Sync + 'static,
    {
        self.page_with(ResultHandler::new(), limit, offset)
    }

    /// One page plus the total row count.
    ///
    /// Count and rows come from two separate round-trips without snapshot
    /// isolation, so the total may disagree with the rows under concurrent writes.
    pub fn page_with<T>(&self, handler: ResultHandler<T>, limit: usize, offset: usize) -> Result<Page<T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        if self.exchanged() {
            return Ok(Page::empty());
        }
        let dialect = self.dialect()?;

        let total = dialect
            .count_query(self)
            .run(ResultExecutor::new(ResultHandler::<i64>::new()))?
            .unwrap_or(0);
        let list = dialect
            .limit_query(self, limit, offset)
            .run(ResultSetExecutor::new(handler))?;

        Ok(Page::new(list, u64::try_from(total).unwrap_or(0), limit, offset))
    }

    /// Load the first row into `target`. Returns whether a row was found.
    pub fn load_into<T: LoadTarget>(&self, target: &mut T) -> Result<bool> {
        if self.exchanged() {
            return Ok(false);
        }
        match self.run(ResultLoadExecutor)? {
            Some(row) => {
                target.load_from(&row)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Every result set of a multi-statement query, bounded by `multi.resultset.depth`.
    pub fn all_results(&self) -> Result<Vec<Vec<DataMap>>> {
        if self.exchanged() {
            return Ok(Vec::new());
        }
        let depth = self
            .require_db()?
            .properties()
            .usize_value(DbProp::MultiResultSetDepth)
            .unwrap_or(DEFAULT_RESULTSET_DEPTH);
        self.run(ResultSetsExecutor::new(ResultHandler::new(), depth))
    }

    fn require_db(&self) -> Result<&DbConfig> {
        self.db
            .as_ref()
            .ok_or_else(|| Error::config("Query must use db!"))
    }

    fn exchanged(&self) -> bool {
        self.exchange.as_ref().is_some_and(|x| x.claim(self))
    }

    fn log_sql(&self, db: &DbConfig) {
        if self.is_debug_sql() {
            tracing::info!(target: "recordkit::sql", db = db.key(), "{}", self.executable_sql());
        } else {
            tracing::trace!(db = db.key(), sql = %self.sql, "Executing");
        }
    }

    fn run<X>(&self, executor: X) -> Result<X::Output>
    where
        X: Execute,
        X::Output: Clone + Send + Sync + 'static,
    {
        let db = self.require_db()?;
        let cache = match self.effective_cache() {
            Some(cache) if executor.cacheable() => Some((cache, self.cache_key()?)),
            _ => None,
        };
        let pipeline = CacheExecutor::new(executor, cache);

        if let Some(hit) = pipeline.check() {
            return Ok(hit);
        }

        let lease = ConnectionLease::acquire(db, self.tx.as_ref(), true)?;
        self.log_sql(db);
        let output = pipeline
            .run(lease.connection(), &self.sql, &self.parameters)
            .map_err(|e| e.with_sql(self.executable_sql()))?;
        pipeline.store(&output);
        Ok(output)
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("sql", &self.sql)
            .field("parameters", &self.parameters)
            .field("batches", &self.batch_parameters.len())
            .field("db", &self.db.as_ref().map(DbConfig::key))
            .field("tag", &self.tag)
            .field("tx", &self.tx.as_ref().map(Tx::id))
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.executable_sql())
    }
}

/// A connection held for one execution.
///
/// Borrowed connections belong to a [`Tx`] and are never committed, rolled
/// back or closed here. Owned connections are released on drop, rolling back
/// a transaction that was begun but not finished.
enum ConnectionLease {
    Borrowed(Arc<dyn Connection>),
    Owned {
        conn: Arc<dyn Connection>,
        open: bool,
    },
}

impl ConnectionLease {
    fn acquire(db: &DbConfig, tx: Option<&Tx>, auto_commit: bool) -> Result<Self> {
        if let Some(tx) = tx {
            return Ok(ConnectionLease::Borrowed(tx.connection(db)?));
        }
        let conn = db.connection()?;
        if !auto_commit {
            conn.begin()?;
        }
        Ok(ConnectionLease::Owned {
            conn,
            open: !auto_commit,
        })
    }

    fn connection(&self) -> &dyn Connection {
        match self {
            ConnectionLease::Borrowed(conn) | ConnectionLease::Owned { conn, .. } => conn.as_ref(),
        }
    }

    fn commit(&mut self) -> Result<()> {
        if let ConnectionLease::Owned { conn, open } = self {
            if *open {
                *open = false;
                conn.commit()?;
            }
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if let ConnectionLease::Owned { conn, open } = self {
            if *open {
                *open = false;
                conn.rollback()?;
            }
        }
        Ok(())
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if let Err(e) = self.rollback() {
            tracing::warn!(error = %e, "Rollback on release failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::RecordingExchange;
    use crate::testing::mock_db;
    use recordkit_core::{MemoryCache, QueryErrorKind, Row};

    #[test]
    fn test_add_flattens_arrays() {
        let q = Query::new().add(
            "a IN (?, ?) AND b = ?",
            vec![Value::Array(vec![Value::Int(1), Value::Int(2)]), Value::from("x")],
        );
        assert_eq!(q.parameters(), &[Value::Int(1), Value::Int(2), Value::from("x")]);
        assert_eq!(q.executable_sql(), "a IN (1, 2) AND b = 'x'");
    }

    #[test]
    fn test_add_if_not_empty() {
        let base = Query::new().add("SELECT * FROM t WHERE 1=1", ());

        let q = base.clone().add_if_not_empty(" AND x=?", [Value::Null]);
        assert_eq!(q.sql(), base.sql());
        assert_eq!(q.parameter_count(), 0);

        let q = base.clone().add_if_not_empty(" AND x=?", [""]);
        assert_eq!(q.sql(), base.sql());

        let q = base.clone().add_if_not_empty(" AND x=?", ["  "]);
        assert_eq!(q.parameter_count(), 0);

        let q = base.clone().add_if_not_empty(" AND x=?", ["v"]);
        assert_eq!(q.sql(), "SELECT * FROM t WHERE 1=1 AND x=?");
        assert_eq!(q.parameters(), &[Value::from("v")]);

        let q = base.add_if_not_empty(" AND x BETWEEN ? AND ?", (Value::Null, 1));
        assert_eq!(q.parameter_count(), 2);
    }

    #[test]
    fn test_clear_and_reuse() {
        let mut q = Query::new().add("SELECT ?", [1]);
        q.clear();
        assert!(q.is_empty());
        assert_eq!(q.parameter_count(), 0);
        let q = q.add("SELECT 2", ());
        assert_eq!(q.sql(), "SELECT 2");
    }

    #[test]
    fn test_cache_key_fingerprint() {
        let (db, _) = mock_db("k");
        let q = |v: i32| Query::with_db(&db).add("SELECT * FROM t WHERE a=?", [v]);
        assert_eq!(q(1).cache_key().unwrap(), q(1).cache_key().unwrap());
        assert_ne!(q(1).cache_key().unwrap(), q(2).cache_key().unwrap());
        assert_ne!(
            q(1).cache_key().unwrap(),
            q(1).tag("other").cache_key().unwrap()
        );
    }

    #[test]
    fn test_query_must_use_db() {
        let err = Query::new().add("SELECT 1", ()).list().unwrap_err();
        assert_eq!(err.to_string(), "Query must use db!");
    }

    #[test]
    fn test_exchange_claims_before_db() {
        let exchange = Arc::new(RecordingExchange::new());
        let q = Query::new()
            .add("SELECT * FROM t WHERE id = ?", [3])
            .exchange(exchange.clone());
        assert!(q.list().unwrap().is_empty());
        assert!(q.result().unwrap().is_none());
        assert!(q.page(10, 0).unwrap().is_empty());
        let mut target = DataMap::new();
        assert!(!q.load_into(&mut target).unwrap());
        assert_eq!(exchange.claimed().len(), 4);
        assert_eq!(exchange.claimed()[0], "SELECT * FROM t WHERE id = 3");
    }

    #[test]
    fn test_cached_read_runs_once() {
        let (db, conn) = mock_db("c");
        conn.set_rows(vec![Row::new(vec!["n".to_string()], vec![Value::Int(7)])]);
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new("q", 16));
        let q = Query::with_db(&db)
            .add("SELECT n FROM t WHERE id = ?", [1])
            .cache(cache);

        assert_eq!(q.list().unwrap().len(), 1);
        assert_eq!(q.list().unwrap().len(), 1);
        assert_eq!(conn.log(), vec!["SELECT n FROM t WHERE id = ?"]);
    }

    #[test]
    fn test_error_carries_executable_sql() {
        let (db, conn) = mock_db("e");
        conn.fail_on("bad_table");
        let err = Query::with_db(&db)
            .add("UPDATE bad_table SET a = ?", ["z"])
            .execute()
            .unwrap_err();
        assert_eq!(err.sql(), Some("UPDATE bad_table SET a = 'z'"));
        assert!(err.to_string().starts_with("SQL ERROR:"));
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Constraint));
    }

    #[test]
    fn test_batch_commits_on_success() {
        let (db, conn) = mock_db("b1");
        let counts = Query::with_db(&db)
            .add("INSERT INTO t VALUES (?)", [1])
            .add_batch([2])
            .execute_batch()
            .unwrap();
        assert_eq!(counts, vec![1, 1]);
        assert_eq!(
            conn.log(),
            vec!["BEGIN", "INSERT INTO t VALUES (?)", "INSERT INTO t VALUES (?)", "COMMIT"]
        );
    }

    #[test]
    fn test_batch_rolls_back_on_failure() {
        let (db, conn) = mock_db("b2");
        conn.fail_on("fail");
        let err = Query::with_db(&db)
            .add("INSERT INTO fail VALUES (?)", ())
            .add_batch([1])
            .add_batch([2])
            .execute_batch()
            .unwrap_err();
        assert!(err.sql().is_some());
        assert_eq!(conn.log(), vec!["BEGIN", "INSERT INTO fail VALUES (?)", "ROLLBACK"]);
    }

    #[test]
    fn test_batch_in_tx_leaves_outcome_to_owner() {
        let (db, conn) = mock_db("b3");
        conn.fail_on("fail");
        let tx = Tx::new();
        let _ = Query::with_db(&db)
            .tx(&tx)
            .add("INSERT INTO fail VALUES (?)", ())
            .add_batch([1])
            .execute_batch();
        assert_eq!(conn.log(), vec!["BEGIN", "INSERT INTO fail VALUES (?)"]);
        tx.rollback().unwrap();
        assert_eq!(conn.log().last().map(String::as_str), Some("ROLLBACK"));
    }

    #[test]
    fn test_page_counts_then_limits() {
        let (db, conn) = mock_db("p");
        conn.set_rows(vec![Row::new(vec!["c".to_string()], vec![Value::BigInt(42)])]);
        let page = Query::with_db(&db).add("SELECT * FROM t", ()).page(5, 10).unwrap();
        assert_eq!(page.total(), 42);
        assert_eq!(page.limit(), 5);
        assert_eq!(
            conn.log(),
            vec![
                "SELECT COUNT(*) FROM (SELECT * FROM t) t",
                "SELECT * FROM t LIMIT 5 OFFSET 10"
            ]
        );
    }

    #[test]
    fn test_params_macro_and_tuples() {
        let q = Query::new().add("a=? b=? c=?", (1, "x", 2.5));
        assert_eq!(q.parameter_count(), 3);
        assert_eq!(crate::params![1, "b"], vec![Value::Int(1), Value::from("b")]);
    }
}
