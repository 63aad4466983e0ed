//! Database handles and the table registry.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock, Weak};

use recordkit_core::{Cache, Connection, DataSource, DbProp, Error, Properties, Result};

use crate::dialect::Dialect;
use crate::query::Query;
use crate::tx::Tx;

/// Process-wide bookkeeping shared by databases.
///
/// Holds the set of physical tables already created on demand (history and
/// partition tables, keyed `"<db>:<table>"`) and a by-name lookup of
/// registered databases.
#[derive(Default)]
pub struct Registry {
    tables: Mutex<HashSet<String>>,
    dbs: RwLock<HashMap<String, Weak<DbInner>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry used by databases that were not given one.
    pub fn global() -> Arc<Registry> {
        static GLOBAL: OnceLock<Arc<Registry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Registry::new())))
    }

    /// Run `create` unless `key` is already registered, then register it.
    ///
    /// Returns whether `create` ran. When `create` runs inside `tx` the key is
    /// registered only once `tx` commits; a rollback leaves it unregistered.
    /// A failed `create` leaves the key unregistered so the next caller tries
    /// again. Two racing callers may both run `create`; table creation must
    /// therefore be idempotent.
    pub fn insert_if_absent<F>(self: &Arc<Self>, tx: Option<&Tx>, key: &str, create: F) -> Result<bool>
    where
        F: FnOnce() -> Result<()>,
    {
        if self.contains(key) {
            return Ok(false);
        }
        create()?;
        match tx {
            Some(tx) => tx.register_on_commit(self, key),
            None => self.insert(key),
        }
        Ok(true)
    }

    pub(crate) fn insert(&self, key: &str) {
        self.lock_tables().insert(key.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock_tables().contains(key)
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock_tables().remove(key)
    }

    /// Forget every registered table.
    pub fn clear(&self) {
        self.lock_tables().clear();
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register_db(&self, db: &DbConfig) {
        self.dbs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(db.key().to_string(), Arc::downgrade(&db.inner));
    }

    /// Look up a live database registered under `key`.
    pub fn db(&self, key: &str) -> Option<DbConfig> {
        self.dbs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(Weak::upgrade)
            .map(|inner| DbConfig { inner })
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("tables", &self.lock_tables().len())
            .finish_non_exhaustive()
    }
}

struct DbInner {
    key: String,
    data_source: Arc<dyn DataSource>,
    dialect: Arc<dyn Dialect>,
    properties: Properties,
    cache: Option<Arc<dyn Cache>>,
    registry: Arc<Registry>,
}

/// A configured database: identity, connection source, dialect, properties,
/// optional cache and the registry it belongs to.
///
/// Cloning is cheap; clones refer to the same database.
#[derive(Clone)]
pub struct DbConfig {
    inner: Arc<DbInner>,
}

impl DbConfig {
    pub fn builder(key: impl Into<String>) -> DbConfigBuilder {
        DbConfigBuilder {
            key: key.into(),
            data_source: None,
            dialect: None,
            properties: Properties::new(),
            cache: None,
            registry: None,
        }
    }

    /// Unique key of this database.
    pub fn key(&self) -> &str {
        &self.inner.key
    }

    pub fn data_source(&self) -> &Arc<dyn DataSource> {
        &self.inner.data_source
    }

    pub fn dialect(&self) -> Arc<dyn Dialect> {
        Arc::clone(&self.inner.dialect)
    }

    pub fn properties(&self) -> &Properties {
        &self.inner.properties
    }

    /// Table-scoped property lookup with defaults.
    pub fn prop(&self, prop: DbProp, table: &str) -> Option<String> {
        self.inner.properties.table_value(prop, table)
    }

    pub fn cache(&self) -> Option<Arc<dyn Cache>> {
        self.inner.cache.clone()
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    /// Open a fresh connection.
    pub fn connection(&self) -> Result<Arc<dyn Connection>> {
        self.inner.data_source.connection()
    }

    /// Start a query against this database.
    pub fn query(&self) -> Query {
        Query::with_db(self)
    }

    /// Another registered database, looked up by key in this database's registry.
    pub fn lookup(&self, key: &str) -> Result<DbConfig> {
        if key == self.key() {
            return Ok(self.clone());
        }
        self.inner
            .registry
            .db(key)
            .ok_or_else(|| Error::config(format!("Database not found: {}", key)))
    }
}

impl PartialEq for DbConfig {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("key", &self.inner.key)
            .field("dialect", &self.inner.dialect.name())
            .field("cache", &self.inner.cache.as_ref().map(|c| c.id().to_string()))
            .finish_non_exhaustive()
    }
}

/// Builder for [`DbConfig`].
pub struct DbConfigBuilder {
    key: String,
    data_source: Option<Arc<dyn DataSource>>,
    dialect: Option<Arc<dyn Dialect>>,
    properties: Properties,
    cache: Option<Arc<dyn Cache>>,
    registry: Option<Arc<Registry>>,
}

impl DbConfigBuilder {
    pub fn data_source(mut self, data_source: Arc<dyn DataSource>) -> Self {
        self.data_source = Some(data_source);
        self
    }

    pub fn dialect(mut self, dialect: Arc<dyn Dialect>) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Set a single property.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.set(key, value);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Build the database and register it by key.
    pub fn build(self) -> Result<DbConfig> {
        let data_source = self
            .data_source
            .ok_or_else(|| Error::config(format!("No data source for db: {}", self.key)))?;
        let dialect = self
            .dialect
            .ok_or_else(|| Error::config(format!("No dialect for db: {}", self.key)))?;
        let registry = self.registry.unwrap_or_else(Registry::global);

        let db = DbConfig {
            inner: Arc::new(DbInner {
                key: self.key,
                data_source,
                dialect,
                properties: self.properties,
                cache: self.cache,
                registry: Arc::clone(&registry),
            }),
        };
        registry.register_db(&db);
        tracing::debug!(db = db.key(), dialect = db.inner.dialect.name(), "Database registered");
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockConnection, MockDialect, data_source};

    fn db(key: &str, registry: &Arc<Registry>) -> DbConfig {
        DbConfig::builder(key)
            .data_source(data_source(&Arc::new(MockConnection::new())))
            .dialect(Arc::new(MockDialect))
            .registry(Arc::clone(registry))
            .property("history.prefix.table", "h_")
            .build()
            .unwrap()
    }

    #[test]
    fn test_insert_if_absent_runs_once() {
        let registry = Arc::new(Registry::new());
        let mut runs = 0;
        assert!(registry.insert_if_absent(None, "db:t", || {
            runs += 1;
            Ok(())
        })
        .unwrap());
        assert!(!registry.insert_if_absent(None, "db:t", || {
            runs += 1;
            Ok(())
        })
        .unwrap());
        assert_eq!(runs, 1);
    }

    #[test]
    fn test_failed_create_is_retried() {
        let registry = Arc::new(Registry::new());
        assert!(registry
            .insert_if_absent(None, "k", || Err(Error::config("boom")))
            .is_err());
        assert!(!registry.contains("k"));
        assert!(registry.insert_if_absent(None, "k", || Ok(())).unwrap());
    }

    #[test]
    fn test_insert_if_absent_in_tx_waits_for_commit() {
        let registry = Arc::new(Registry::new());
        let main = db("main_tx", &registry);
        let tx = Tx::new();
        tx.connection(&main).unwrap();
        assert!(registry.insert_if_absent(Some(&tx), "main_tx:h", || Ok(())).unwrap());
        assert!(!registry.contains("main_tx:h"));
        tx.rollback().unwrap();
        assert!(!registry.contains("main_tx:h"));

        let mut runs = 0;
        let tx = Tx::new();
        tx.connection(&main).unwrap();
        assert!(registry
            .insert_if_absent(Some(&tx), "main_tx:h", || {
                runs += 1;
                Ok(())
            })
            .unwrap());
        tx.commit().unwrap();
        assert_eq!(runs, 1);
        assert!(registry.contains("main_tx:h"));
    }

    #[test]
    fn test_lookup_by_key() {
        let registry = Arc::new(Registry::new());
        let main = db("main", &registry);
        let hist = db("hist", &registry);
        assert_eq!(main.lookup("hist").unwrap(), hist);
        assert_eq!(main.lookup("main").unwrap(), main);
        assert!(main.lookup("nope").is_err());
        assert_eq!(main.prop(DbProp::HistoryTablePrefix, "t").as_deref(), Some("h_"));
    }

    #[test]
    fn test_dropped_db_is_not_found() {
        let registry = Arc::new(Registry::new());
        drop(db("gone", &registry));
        assert!(registry.db("gone").is_none());
    }

    #[test]
    fn test_build_requires_data_source() {
        let err = DbConfig::builder("x")
            .dialect(Arc::new(MockDialect))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("No data source"));
    }
}
