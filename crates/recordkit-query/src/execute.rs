//! Execution strategies.
//!
//! An [`Execute`] turns a live connection plus SQL and parameters into a typed
//! output. Every query execution runs through a [`CacheExecutor`], a fixed
//! three-stage pipeline: cache check, execute, cache store.

use std::sync::Arc;

use recordkit_core::{Cache, CacheKey, Connection, DataMap, Result, Value};

use crate::handler::ResultHandler;

/// Strategy producing a typed output from one statement execution.
pub trait Execute {
    type Output;

    fn execute(&self, conn: &dyn Connection, sql: &str, params: &[Value]) -> Result<Self::Output>;

    /// Whether outputs of this strategy may be served from a cache.
    fn cacheable(&self) -> bool {
        true
    }
}

/// Returns the number of affected rows. Never cached.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateExecutor;

impl Execute for UpdateExecutor {
    type Output = u64;

    fn execute(&self, conn: &dyn Connection, sql: &str, params: &[Value]) -> Result<u64> {
        conn.execute(sql, params)
    }

    fn cacheable(&self) -> bool {
        false
    }
}

/// Runs an INSERT and returns the generated key of the last row. Never cached.
#[derive(Debug, Clone, Copy, Default)]
pub struct InsertExecutor;

impl Execute for InsertExecutor {
    type Output = i64;

    fn execute(&self, conn: &dyn Connection, sql: &str, params: &[Value]) -> Result<i64> {
        conn.insert(sql, params)
    }

    fn cacheable(&self) -> bool {
        false
    }
}

/// Maps the first row, if any.
#[derive(Debug, Clone)]
pub struct ResultExecutor<T> {
    handler: ResultHandler<T>,
}

impl<T> ResultExecutor<T> {
    pub fn new(handler: ResultHandler<T>) -> Self {
        Self { handler }
    }
}

impl<T> Execute for ResultExecutor<T> {
    type Output = Option<T>;

    fn execute(&self, conn: &dyn Connection, sql: &str, params: &[Value]) -> Result<Option<T>> {
        conn.query(sql, params)?
            .into_iter()
            .next()
            .map(|row| self.handler.handle(row))
            .transpose()
    }
}

/// Maps every row.
#[derive(Debug, Clone)]
pub struct ResultSetExecutor<T> {
    handler: ResultHandler<T>,
}

impl<T> ResultSetExecutor<T> {
    pub fn new(handler: ResultHandler<T>) -> Self {
        Self { handler }
    }
}

impl<T> Execute for ResultSetExecutor<T> {
    type Output = Vec<T>;

    fn execute(&self, conn: &dyn Connection, sql: &str, params: &[Value]) -> Result<Vec<T>> {
        self.handler.handle_all(conn.query(sql, params)?)
    }
}

/// Maps every row of every result set, reading at most `depth` sets.
#[derive(Debug, Clone)]
pub struct ResultSetsExecutor<T> {
    handler: ResultHandler<T>,
    depth: usize,
}

impl<T> ResultSetsExecutor<T> {
    pub fn new(handler: ResultHandler<T>, depth: usize) -> Self {
        Self { handler, depth }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl<T> Execute for ResultSetsExecutor<T> {
    type Output = Vec<Vec<T>>;

    fn execute(&self, conn: &dyn Connection, sql: &str, params: &[Value]) -> Result<Vec<Vec<T>>> {
        conn.query_sets(sql, params, self.depth)?
            .into_iter()
            .map(|rows| self.handler.handle_all(rows))
            .collect()
    }
}

/// Reads the first row as a [`DataMap`] to be loaded into an existing value.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultLoadExecutor;

impl Execute for ResultLoadExecutor {
    type Output = Option<DataMap>;

    fn execute(&self, conn: &dyn Connection, sql: &str, params: &[Value]) -> Result<Option<DataMap>> {
        Ok(conn
            .query(sql, params)?
            .into_iter()
            .next()
            .map(|row| row.into_data_map()))
    }
}

/// Cache stages around an inner strategy.
///
/// Without a cache, or around a non-cacheable strategy, `check` always misses
/// and `store` does nothing.
pub struct CacheExecutor<X> {
    inner: X,
    cache: Option<(Arc<dyn Cache>, CacheKey)>,
}

impl<X> CacheExecutor<X>
where
    X: Execute,
    X::Output: Clone + Send + Sync + 'static,
{
    pub fn new(inner: X, cache: Option<(Arc<dyn Cache>, CacheKey)>) -> Self {
        let cache = cache.filter(|_| inner.cacheable());
        Self { inner, cache }
    }

    pub fn is_cached(&self) -> bool {
        self.cache.is_some()
    }

    /// Stage 1: a live entry for the key, if any.
    pub fn check(&self) -> Option<X::Output> {
        let (cache, key) = self.cache.as_ref()?;
        let hit = cache.get(key)?;
        match hit.downcast_ref::<X::Output>() {
            Some(output) => {
                tracing::debug!(cache = cache.id(), key = ?key, "Cache hit");
                Some(output.clone())
            }
            None => {
                tracing::warn!(cache = cache.id(), key = ?key, "Cached value has an unexpected type");
                None
            }
        }
    }

    /// Stage 2: run the inner strategy.
    pub fn run(&self, conn: &dyn Connection, sql: &str, params: &[Value]) -> Result<X::Output> {
        self.inner.execute(conn, sql, params)
    }

    /// Stage 3: remember `output` under the key.
    pub fn store(&self, output: &X::Output) {
        if let Some((cache, key)) = &self.cache {
            cache.put(key.clone(), Arc::new(output.clone()));
        }
    }
}

impl<X> Execute for CacheExecutor<X>
where
    X: Execute,
    X::Output: Clone + Send + Sync + 'static,
{
    type Output = X::Output;

    fn execute(&self, conn: &dyn Connection, sql: &str, params: &[Value]) -> Result<X::Output> {
        if let Some(hit) = self.check() {
            return Ok(hit);
        }
        let output = self.run(conn, sql, params)?;
        self.store(&output);
        Ok(output)
    }

    fn cacheable(&self) -> bool {
        self.inner.cacheable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockConnection;
    use recordkit_core::{MemoryCache, Row};

    fn key(sql: &str) -> CacheKey {
        let mut k = CacheKey::new();
        k.update(sql);
        k
    }

    fn rows() -> Vec<Row> {
        vec![
            Row::new(vec!["n".to_string()], vec![Value::Int(1)]),
            Row::new(vec!["n".to_string()], vec![Value::Int(2)]),
        ]
    }

    #[test]
    fn test_result_takes_first_row() {
        let conn = MockConnection::with_rows(rows());
        let out = ResultExecutor::new(ResultHandler::<DataMap>::new())
            .execute(&conn, "SELECT n FROM t", &[])
            .unwrap();
        assert_eq!(out.unwrap().get("n"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_result_set_maps_all_rows() {
        let conn = MockConnection::with_rows(rows());
        let out = ResultSetExecutor::new(ResultHandler::with(|m| m.get_int("N", 0)))
            .execute(&conn, "SELECT n FROM t", &[])
            .unwrap();
        assert_eq!(out, vec![1, 2]);
    }

    #[test]
    fn test_cache_executor_second_run_is_served_from_cache() {
        let conn = MockConnection::with_rows(rows());
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new("t", 10));
        let exec = || {
            CacheExecutor::new(
                ResultSetExecutor::new(ResultHandler::<DataMap>::new()),
                Some((Arc::clone(&cache), key("SELECT n FROM t"))),
            )
        };

        assert_eq!(exec().execute(&conn, "SELECT n FROM t", &[]).unwrap().len(), 2);
        assert_eq!(exec().execute(&conn, "SELECT n FROM t", &[]).unwrap().len(), 2);
        assert_eq!(conn.log(), vec!["SELECT n FROM t"]);
    }

    #[test]
    fn test_update_is_never_cached() {
        let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new("t", 10));
        let exec = CacheExecutor::new(UpdateExecutor, Some((Arc::clone(&cache), key("DELETE"))));
        assert!(!exec.is_cached());

        let conn = MockConnection::new();
        exec.execute(&conn, "DELETE FROM t", &[]).unwrap();
        exec.execute(&conn, "DELETE FROM t", &[]).unwrap();
        assert_eq!(conn.log().len(), 2);
        assert!(cache.is_empty());
    }
}
