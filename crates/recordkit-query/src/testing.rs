//! In-crate test doubles.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use recordkit_core::{
    Connection, DataSource, Error, QueryErrorKind, Result, Row, SchemaError, SchemaErrorKind, Value,
};

use crate::db::{DbConfig, Registry};
use crate::dialect::{CreateTable, Dialect};
use crate::tx::Tx;

/// Connection that logs statements and serves canned rows.
#[derive(Default)]
pub(crate) struct MockConnection {
    log: Mutex<Vec<String>>,
    rows: Mutex<Vec<Row>>,
    fail_on: Mutex<Option<String>>,
    in_tx: AtomicBool,
}

impl MockConnection {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_rows(rows: Vec<Row>) -> Self {
        let conn = Self::new();
        conn.set_rows(rows);
        conn
    }

    pub(crate) fn set_rows(&self, rows: Vec<Row>) {
        *self.rows.lock().unwrap_or_else(PoisonError::into_inner) = rows;
    }

    /// Fail every statement containing `pattern`.
    pub(crate) fn fail_on(&self, pattern: &str) {
        *self.fail_on.lock().unwrap_or_else(PoisonError::into_inner) = Some(pattern.to_string());
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn record(&self, sql: &str) -> Result<()> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql.to_string());
        let fail = self.fail_on.lock().unwrap_or_else(PoisonError::into_inner);
        match fail.as_deref() {
            Some(pattern) if sql.contains(pattern) => Err(Error::query(
                QueryErrorKind::Constraint,
                "constraint failed",
            )),
            _ => Ok(()),
        }
    }
}

impl Connection for MockConnection {
    fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
        self.record(sql)?;
        Ok(self.rows.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }

    fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
        self.record(sql)?;
        Ok(1)
    }

    fn insert(&self, sql: &str, _params: &[Value]) -> Result<i64> {
        self.record(sql)?;
        Ok(42)
    }

    fn begin(&self) -> Result<()> {
        self.in_tx.store(true, Ordering::SeqCst);
        self.record("BEGIN")
    }

    fn commit(&self) -> Result<()> {
        self.in_tx.store(false, Ordering::SeqCst);
        self.record("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.in_tx.store(false, Ordering::SeqCst);
        self.record("ROLLBACK")
    }

    fn in_transaction(&self) -> bool {
        self.in_tx.load(Ordering::SeqCst)
    }
}

/// Dialect using every default.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MockDialect;

impl Dialect for MockDialect {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn replace_sql(&self, table: &str, columns: &[&str], _keys: &[&str]) -> String {
        format!(
            "REPLACE INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            vec!["?"; columns.len()].join(", ")
        )
    }

    fn create_table_statements(&self, table: &CreateTable) -> Vec<String> {
        vec![format!("CREATE TABLE {}", table.name)]
    }

    fn get_create_table(&self, _db: &DbConfig, _tx: Option<&Tx>, table: &str) -> Result<CreateTable> {
        Err(Error::Schema(SchemaError {
            kind: SchemaErrorKind::TableNotFound,
            message: format!("no table {}", table),
            source: None,
        }))
    }
}

pub(crate) fn data_source(conn: &Arc<MockConnection>) -> Arc<dyn DataSource> {
    let conn = Arc::clone(conn);
    Arc::new(move || -> Result<Arc<dyn Connection>> { Ok(Arc::clone(&conn) as Arc<dyn Connection>) })
}

/// A database over one shared mock connection, in a private registry.
pub(crate) fn mock_db(key: &str) -> (DbConfig, Arc<MockConnection>) {
    let conn = Arc::new(MockConnection::new());
    let db = DbConfig::builder(key)
        .data_source(data_source(&conn))
        .dialect(Arc::new(MockDialect))
        .registry(Arc::new(Registry::new()))
        .build()
        .expect("mock db builds");
    (db, conn)
}
