//! Connection factories for SQLite databases.

use std::sync::Arc;

use recordkit_core::{Connection, DataSource, Result};

use crate::connection::{SqliteConfig, SqliteConnection};

/// Opens a fresh [`SqliteConnection`] per request.
///
/// For a named in-memory database the source holds one connection open for
/// its whole lifetime, so the data survives between requests.
pub struct SqliteDataSource {
    config: SqliteConfig,
    _keeper: Option<SqliteConnection>,
}

impl SqliteDataSource {
    /// Source for an arbitrary configuration.
    pub fn new(config: SqliteConfig) -> Self {
        Self {
            config,
            _keeper: None,
        }
    }

    /// Source for a database file, created on first use.
    pub fn file(path: impl Into<String>) -> Self {
        Self::new(SqliteConfig::file(path))
    }

    /// Source for an in-memory database shared by all its connections.
    pub fn memory(name: &str) -> Result<Self> {
        let config = SqliteConfig::shared_memory(name);
        let keeper = SqliteConnection::open(&config)?;
        Ok(Self {
            config,
            _keeper: Some(keeper),
        })
    }

    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }
}

impl DataSource for SqliteDataSource {
    fn connection(&self) -> Result<Arc<dyn Connection>> {
        let conn = SqliteConnection::open(&self.config)?;
        Ok(Arc::new(conn))
    }
}

impl std::fmt::Debug for SqliteDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDataSource")
            .field("path", &self.config.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_keeps_data() {
        let source = SqliteDataSource::memory("source_keeps_data").unwrap();
        source
            .connection()
            .unwrap()
            .execute("CREATE TABLE k (v TEXT)", &[])
            .unwrap();
        source
            .connection()
            .unwrap()
            .execute("INSERT INTO k VALUES ('x')", &[])
            .unwrap();

        let rows = source.connection().unwrap().query("SELECT v FROM k", &[]).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_debug_shows_path() {
        let source = SqliteDataSource::file("/tmp/recordkit-debug.db");
        assert!(format!("{:?}", source).contains("recordkit-debug.db"));
    }
}
