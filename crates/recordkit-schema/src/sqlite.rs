//! SQLite dialect.

use recordkit_core::Result;
use recordkit_query::{CreateTable, DbConfig, Dialect, Tx};

use crate::ddl::{self, Engine};
use crate::introspect;

/// SQLite SQL generation.
///
/// Paging and counting use the shared defaults; replaces are `INSERT OR REPLACE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        Engine::Sqlite.name()
    }

    fn replace_sql(&self, table: &str, columns: &[&str], _keys: &[&str]) -> String {
        let (cols, marks) = ddl::insert_lists(columns, Engine::Sqlite);
        format!(
            "INSERT OR REPLACE INTO {} ({}) VALUES ({})",
            self.quote(table),
            cols,
            marks
        )
    }

    fn create_table_statements(&self, table: &CreateTable) -> Vec<String> {
        ddl::create_table_statements(table, Engine::Sqlite)
    }

    fn get_create_table(&self, db: &DbConfig, tx: Option<&Tx>, table: &str) -> Result<CreateTable> {
        introspect::get_create_table(Engine::Sqlite, db, tx, table)
    }
}
