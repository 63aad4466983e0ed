//! SQLite connection implementation.
//!
//! Safe wrappers around SQLite's C API implementing
//! [`recordkit_core::Connection`]. Every call locks the connection's handle,
//! so one `SqliteConnection` may be shared between threads.

use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use libsqlite3_sys as ffi;
use recordkit_core::error::{
    ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind, TransactionError,
    TransactionErrorKind,
};
use recordkit_core::{ColumnInfo, Connection, Error, Result, Row, Value};

use crate::types;

// libsqlite3-sys 0.37 omits `sqlite3_close_v2` from its generated bindings;
// the bundled SQLite library still exports it.
unsafe extern "C" {
    fn sqlite3_close_v2(db: *mut ffi::sqlite3) -> c_int;
}

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, ":memory:", or a `file:` URI.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// Let readers see uncommitted rows of other connections sharing the cache.
    pub read_uncommitted: bool,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in serialized mode (connections can be shared).
    pub full_mutex: bool,
    /// Enable shared cache mode.
    pub shared_cache: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        if self.shared_cache {
            flags |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::file(":memory:")
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
            read_uncommitted: false,
        }
    }

    /// Create a new config for a private in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// A named in-memory database shared by every connection opened with it.
    pub fn shared_memory(name: &str) -> Self {
        Self {
            path: format!("file:{}?mode=memory&cache=shared", name),
            flags: OpenFlags {
                uri: true,
                shared_cache: true,
                ..OpenFlags::create_read_write()
            },
            busy_timeout_ms: 5000,
            read_uncommitted: true,
        }
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

/// Inner state of the SQLite connection, protected by a mutex for thread safety.
struct SqliteInner {
    db: *mut ffi::sqlite3,
    in_transaction: bool,
}

// SAFETY: the handle is only touched while the owning Mutex is held.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

/// Owned prepared statement, finalized on drop.
struct Statement {
    raw: *mut ffi::sqlite3_stmt,
}

impl Drop for Statement {
    fn drop(&mut self) {
        // SAFETY: raw came from a successful prepare and is finalized once
        unsafe {
            ffi::sqlite3_finalize(self.raw);
        }
    }
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "Invalid path: contains null byte".to_string(),
                source: None,
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &raw mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                error_string(rc)
            } else {
                // SAFETY: db is valid even on failure and must be closed
                unsafe {
                    let msg = errmsg(db);
                    ffi::sqlite3_close(db);
                    msg
                }
            };

            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: format!("Failed to open database: {}", msg),
                source: None,
            }));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        let conn = Self {
            inner: Mutex::new(SqliteInner {
                db,
                in_transaction: false,
            }),
            path: config.path.clone(),
        };
        if config.read_uncommitted {
            conn.execute_raw("PRAGMA read_uncommitted = 1")?;
        }
        tracing::debug!(path = %conn.path, "Opened SQLite connection");
        Ok(conn)
    }

    /// Open a private in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute SQL directly without preparing (for DDL, etc.)
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let inner = self.lock();
        let c_sql = c_string(sql)?;
        let mut err: *mut std::ffi::c_char = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_exec(inner.db, c_sql.as_ptr(), None, ptr::null_mut(), &raw mut err)
        };

        if rc != ffi::SQLITE_OK {
            let msg = if err.is_null() {
                error_string(rc)
            } else {
                // SAFETY: err is a NUL-terminated string we must free
                unsafe {
                    let msg = CStr::from_ptr(err).to_string_lossy().into_owned();
                    ffi::sqlite3_free(err.cast());
                    msg
                }
            };
            return Err(query_error(error_code_to_kind(rc), sql, msg));
        }
        Ok(())
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&self) -> i64 {
        let inner = self.lock();
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(inner.db) }
    }

    /// Get the number of rows changed by the last statement.
    pub fn changes(&self) -> u64 {
        let inner = self.lock();
        // SAFETY: db is valid
        u64::try_from(unsafe { ffi::sqlite3_changes(inner.db) }).unwrap_or(0)
    }

    /// Run every statement in `sql`, consuming `params` in order.
    ///
    /// Returns the row sets of statements that produce columns, up to `max_sets`.
    fn run_script(&self, sql: &str, params: &[Value], max_sets: usize) -> Result<Vec<Vec<Row>>> {
        let inner = self.lock();
        let c_sql = c_string(sql)?;
        let mut sets = Vec::new();
        let mut offset = 0;
        let mut consumed = 0;

        loop {
            let (stmt, rest) = prepare_next(inner.db, &c_sql, offset, sql)?;
            let advanced = rest > offset;
            offset = rest;
            let Some(stmt) = stmt else {
                // Empty statement such as a stray `;`
                if advanced {
                    continue;
                }
                break;
            };

            // SAFETY: stmt is valid
            let wanted = unsafe { ffi::sqlite3_bind_parameter_count(stmt.raw) } as usize;
            let slice = params.get(consumed..consumed + wanted).ok_or_else(|| {
                binding_mismatch(sql, consumed + wanted, params.len())
            })?;
            consumed += wanted;

            let rows = run_statement(inner.db, &stmt, slice, sql)?;
            // SAFETY: stmt is valid
            let has_columns = unsafe { ffi::sqlite3_column_count(stmt.raw) } > 0;
            if has_columns && sets.len() < max_sets {
                sets.push(rows);
            }
        }

        if consumed != params.len() {
            return Err(binding_mismatch(sql, consumed, params.len()));
        }
        Ok(sets)
    }

    /// Prepare and execute a single query, returning all rows.
    fn query_sync(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let inner = self.lock();
        let c_sql = c_string(sql)?;
        let (stmt, _) = prepare_next(inner.db, &c_sql, 0, sql)?;
        let Some(stmt) = stmt else {
            return if params.is_empty() {
                Ok(Vec::new())
            } else {
                Err(binding_mismatch(sql, 0, params.len()))
            };
        };
        check_param_count(&stmt, params, sql)?;
        run_statement(inner.db, &stmt, params, sql)
    }

    /// Prepare and execute a statement, returning rows affected.
    fn execute_sync(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let inner = self.lock();
        let c_sql = c_string(sql)?;
        let (stmt, _) = prepare_next(inner.db, &c_sql, 0, sql)?;
        let Some(stmt) = stmt else {
            return Ok(0);
        };
        check_param_count(&stmt, params, sql)?;
        run_statement(inner.db, &stmt, params, sql)?;
        // SAFETY: db is valid
        let changes = unsafe { ffi::sqlite3_changes(inner.db) };
        Ok(u64::try_from(changes).unwrap_or(0))
    }

    /// Execute an INSERT and return the last inserted rowid.
    fn insert_sync(&self, sql: &str, params: &[Value]) -> Result<i64> {
        self.execute_sync(sql, params)?;
        Ok(self.last_insert_rowid())
    }

    fn set_transaction(&self, open: bool, sql: &str) -> Result<()> {
        let active = self.lock().in_transaction;
        if active == open {
            let (kind, message) = if open {
                (TransactionErrorKind::AlreadyActive, "Already in a transaction")
            } else {
                (TransactionErrorKind::NotActive, "Not in a transaction")
            };
            return Err(Error::Transaction(TransactionError {
                kind,
                message: message.to_string(),
            }));
        }

        self.execute_raw(sql)?;
        self.lock().in_transaction = open;
        tracing::trace!(path = %self.path, "{}", sql);
        Ok(())
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let inner = self.lock();
        if !inner.db.is_null() {
            // SAFETY: db is valid and no statements outlive this connection
            unsafe {
                sqlite3_close_v2(inner.db);
            }
        }
    }
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.query_sync(sql, params)
    }

    fn query_sets(&self, sql: &str, params: &[Value], max_sets: usize) -> Result<Vec<Vec<Row>>> {
        self.run_script(sql, params, max_sets)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.execute_sync(sql, params)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        self.insert_sync(sql, params)
    }

    fn begin(&self) -> Result<()> {
        self.set_transaction(true, "BEGIN")
    }

    fn commit(&self) -> Result<()> {
        self.set_transaction(false, "COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.set_transaction(false, "ROLLBACK")
    }

    fn in_transaction(&self) -> bool {
        self.lock().in_transaction
    }
}

// Helper functions

fn c_string(sql: &str) -> Result<CString> {
    CString::new(sql)
        .map_err(|_| query_error(QueryErrorKind::Syntax, sql, "SQL contains null byte"))
}

/// Prepare the statement starting at byte `offset` of `c_sql`.
///
/// Returns `None` for an empty statement (whitespace, comments, a lone `;`),
/// plus the offset of the text after the statement.
fn prepare_next(
    db: *mut ffi::sqlite3,
    c_sql: &CStr,
    offset: usize,
    sql: &str,
) -> Result<(Option<Statement>, usize)> {
    let bytes = c_sql.to_bytes();
    if offset >= bytes.len() {
        return Ok((None, offset));
    }

    let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
    let mut tail: *const std::ffi::c_char = ptr::null();
    // SAFETY: offset is within the buffer; SQLite reads at most the given length
    let rc = unsafe {
        let start = c_sql.as_ptr().add(offset);
        ffi::sqlite3_prepare_v2(
            db,
            start,
            (bytes.len() - offset) as c_int,
            &raw mut stmt,
            &raw mut tail,
        )
    };

    if rc != ffi::SQLITE_OK {
        return Err(db_error(db, sql));
    }

    let rest = if tail.is_null() {
        bytes.len()
    } else {
        // SAFETY: tail points into the same buffer as c_sql
        unsafe { tail.offset_from(c_sql.as_ptr()) as usize }
    };

    if stmt.is_null() {
        Ok((None, rest))
    } else {
        Ok((Some(Statement { raw: stmt }), rest))
    }
}

fn check_param_count(stmt: &Statement, params: &[Value], sql: &str) -> Result<()> {
    // SAFETY: stmt is valid
    let wanted = unsafe { ffi::sqlite3_bind_parameter_count(stmt.raw) } as usize;
    if wanted == params.len() {
        Ok(())
    } else {
        Err(binding_mismatch(sql, wanted, params.len()))
    }
}

/// Bind `params` and step `stmt` to completion, collecting any rows.
fn run_statement(
    db: *mut ffi::sqlite3,
    stmt: &Statement,
    params: &[Value],
    sql: &str,
) -> Result<Vec<Row>> {
    for (i, param) in params.iter().enumerate() {
        // SAFETY: stmt is valid, index is 1-based
        let rc = unsafe { types::bind_value(stmt.raw, (i + 1) as c_int, param) };
        if rc != ffi::SQLITE_OK {
            return Err(bind_error(db, sql, i + 1));
        }
    }

    // SAFETY: stmt is valid
    let col_count = unsafe { ffi::sqlite3_column_count(stmt.raw) };
    let mut col_names = Vec::with_capacity(col_count as usize);
    for i in 0..col_count {
        // SAFETY: stmt is valid, i < col_count
        let name = unsafe { types::column_name(stmt.raw, i) }.unwrap_or_else(|| format!("col{}", i));
        col_names.push(name);
    }
    let columns = Arc::new(ColumnInfo::new(col_names));

    let mut rows = Vec::new();
    loop {
        // SAFETY: stmt is valid
        match unsafe { ffi::sqlite3_step(stmt.raw) } {
            ffi::SQLITE_ROW => {
                let values = (0..col_count)
                    // SAFETY: we just got SQLITE_ROW
                    .map(|i| unsafe { types::read_column(stmt.raw, i) })
                    .collect();
                rows.push(Row::with_columns(Arc::clone(&columns), values));
            }
            ffi::SQLITE_DONE => break,
            _ => return Err(db_error(db, sql)),
        }
    }
    Ok(rows)
}

/// # Safety
/// `db` must be a valid handle.
unsafe fn errmsg(db: *mut ffi::sqlite3) -> String {
    // SAFETY: guaranteed by the caller
    unsafe { CStr::from_ptr(ffi::sqlite3_errmsg(db)) }
        .to_string_lossy()
        .into_owned()
}

fn error_string(code: c_int) -> String {
    // SAFETY: sqlite3_errstr returns a static string
    unsafe { CStr::from_ptr(ffi::sqlite3_errstr(code)) }
        .to_string_lossy()
        .into_owned()
}

fn query_error(kind: QueryErrorKind, sql: &str, message: impl Into<String>) -> Error {
    Error::Query(QueryError {
        kind,
        sql: Some(sql.to_string()),
        message: message.into(),
        source: None,
    })
}

fn db_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (msg, code) = unsafe { (errmsg(db), ffi::sqlite3_errcode(db)) };
    query_error(error_code_to_kind(code), sql, msg)
}

fn bind_error(db: *mut ffi::sqlite3, sql: &str, param_index: usize) -> Error {
    // SAFETY: db is valid
    let msg = unsafe { errmsg(db) };
    query_error(
        QueryErrorKind::Binding,
        sql,
        format!("Failed to bind parameter {}: {}", param_index, msg),
    )
}

fn binding_mismatch(sql: &str, expected: usize, actual: usize) -> Error {
    query_error(
        QueryErrorKind::Binding,
        sql,
        format!("Expected {} parameters, got {}", expected, actual),
    )
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH | ffi::SQLITE_READONLY => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        ffi::SQLITE_INTERRUPT => QueryErrorKind::Cancelled,
        ffi::SQLITE_RANGE => QueryErrorKind::Binding,
        _ => QueryErrorKind::Database,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordkit_core::FromValue;

    fn col<T: FromValue>(row: &Row, name: &str) -> T {
        let (_, value) = row.iter().find(|(n, _)| *n == name).unwrap();
        T::from_value(value).unwrap()
    }

    fn people() -> SqliteConnection {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
            .unwrap();
        conn
    }

    #[test]
    fn test_open_memory() {
        let conn = SqliteConnection::open_memory().unwrap();
        assert_eq!(conn.path(), ":memory:");
    }

    #[test]
    fn test_execute_raw() {
        let conn = people();
        conn.execute_raw("INSERT INTO test (name) VALUES ('Alice')")
            .unwrap();
        assert_eq!(conn.changes(), 1);
        assert_eq!(conn.last_insert_rowid(), 1);
    }

    #[test]
    fn test_parameterized_query() {
        let conn = people();
        conn.execute(
            "INSERT INTO test (name, age) VALUES (?, ?)",
            &[Value::Text("Alice".to_string()), Value::Int(30)],
        )
        .unwrap();

        let rows = conn
            .query("SELECT * FROM test WHERE name = ?", &[Value::from("Alice")])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(col::<String>(&rows[0], "name"), "Alice");
        assert_eq!(col::<i32>(&rows[0], "age"), 30);
    }

    #[test]
    fn test_null_handling() {
        let conn = people();
        conn.execute("INSERT INTO test (name) VALUES (?)", &[Value::Null])
            .unwrap();
        let rows = conn.query("SELECT * FROM test", &[]).unwrap();
        assert_eq!(col::<Option<String>>(&rows[0], "name"), None);
    }

    #[test]
    fn test_parameter_count_mismatch() {
        let conn = people();
        let err = conn
            .execute("INSERT INTO test (name, age) VALUES (?, ?)", &[Value::from("x")])
            .unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Binding));
        assert_eq!(err.sql(), Some("INSERT INTO test (name, age) VALUES (?, ?)"));
    }

    #[test]
    fn test_constraint_kind() {
        let conn = people();
        conn.execute("INSERT INTO test (id, name) VALUES (1, 'a')", &[]).unwrap();
        let err = conn
            .execute("INSERT INTO test (id, name) VALUES (1, 'b')", &[])
            .unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Constraint));
    }

    #[test]
    fn test_transaction() {
        let conn = people();

        conn.begin().unwrap();
        assert!(conn.in_transaction());
        conn.execute("INSERT INTO test (name) VALUES (?)", &[Value::from("Alice")])
            .unwrap();
        conn.rollback().unwrap();
        assert!(conn.query("SELECT * FROM test", &[]).unwrap().is_empty());

        conn.begin().unwrap();
        conn.execute("INSERT INTO test (name) VALUES (?)", &[Value::from("Bob")])
            .unwrap();
        conn.commit().unwrap();
        assert!(!conn.in_transaction());

        let rows = conn.query("SELECT * FROM test", &[]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(col::<String>(&rows[0], "name"), "Bob");
    }

    #[test]
    fn test_commit_without_begin() {
        let conn = people();
        assert!(matches!(
            conn.commit(),
            Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::NotActive,
                ..
            }))
        ));
    }

    #[test]
    fn test_insert_rowid() {
        let conn = people();
        let first = conn.insert("INSERT INTO test (name) VALUES (?)", &[Value::from("a")]).unwrap();
        let second = conn.insert("INSERT INTO test (name) VALUES (?)", &[Value::from("b")]).unwrap();
        assert_eq!((first, second), (1, 2));
    }

    #[test]
    fn test_query_sets_walks_statements() {
        let conn = people();
        conn.execute_raw("INSERT INTO test (name, age) VALUES ('a', 1), ('b', 2)")
            .unwrap();

        let sets = conn
            .query_sets(
                "SELECT name FROM test WHERE age = ?; UPDATE test SET age = 3 WHERE name = ?; SELECT COUNT(*) AS n FROM test",
                &[Value::Int(1), Value::from("b")],
                10,
            )
            .unwrap();
        assert_eq!(sets.len(), 2);
        assert_eq!(col::<String>(&sets[0][0], "name"), "a");
        assert_eq!(col::<i64>(&sets[1][0], "n"), 2);

        let capped = conn
            .query_sets("SELECT 1; SELECT 2; SELECT 3", &[], 2)
            .unwrap();
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn test_query_sets_rejects_extra_params() {
        let conn = people();
        let err = conn
            .query_sets("SELECT 1", &[Value::Int(1)], 10)
            .unwrap_err();
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Binding));
    }

    #[test]
    #[allow(clippy::approx_constant)]
    fn test_type_conversions() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE types (b BOOLEAN, i INTEGER, f REAL, t TEXT, bl BLOB, ts TEXT)")
            .unwrap();

        let ts = chrono::NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(7, 8, 9)
            .unwrap();
        conn.execute(
            "INSERT INTO types VALUES (?, ?, ?, ?, ?, ?)",
            &[
                Value::Bool(true),
                Value::BigInt(42),
                Value::Double(3.14),
                Value::Text("hello".to_string()),
                Value::Bytes(vec![1, 2, 3]),
                Value::Timestamp(ts),
            ],
        )
        .unwrap();

        let rows = conn.query("SELECT * FROM types", &[]).unwrap();
        assert_eq!(col::<i32>(&rows[0], "b"), 1);
        assert_eq!(col::<i32>(&rows[0], "i"), 42);
        assert!((col::<f64>(&rows[0], "f") - 3.14).abs() < 0.001);
        assert_eq!(col::<String>(&rows[0], "t"), "hello");
        assert_eq!(col::<Vec<u8>>(&rows[0], "bl"), vec![1, 2, 3]);
        assert_eq!(col::<String>(&rows[0], "ts"), "2024-05-06 07:08:09");
    }

    #[test]
    fn test_shared_memory_is_shared() {
        let config = SqliteConfig::shared_memory("connection_shared_test");
        let a = SqliteConnection::open(&config).unwrap();
        a.execute_raw("CREATE TABLE s (x INTEGER)").unwrap();
        a.execute_raw("INSERT INTO s VALUES (7)").unwrap();

        let b = SqliteConnection::open(&config).unwrap();
        let rows = b.query("SELECT x FROM s", &[]).unwrap();
        assert_eq!(col::<i32>(&rows[0], "x"), 7);
    }
}
