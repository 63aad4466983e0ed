//! DDL generation shared by the engine dialects.

use recordkit_core::SqlType;
use recordkit_query::{ColumnDef, CreateTable, IndexDef};

/// Engine whose SQL flavor is generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Sqlite,
    Mysql,
    Postgres,
}

impl Engine {
    pub const fn name(self) -> &'static str {
        match self {
            Engine::Sqlite => "sqlite",
            Engine::Mysql => "mysql",
            Engine::Postgres => "postgres",
        }
    }
}

/// Quote an identifier (table/column name) for SQL.
///
/// - SQLite/PostgreSQL: double quotes
/// - MySQL: backticks
pub fn quote_identifier(name: &str, engine: Engine) -> String {
    match engine {
        Engine::Mysql => format!("`{}`", name.replace('`', "``")),
        Engine::Sqlite | Engine::Postgres => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

/// Engine spelling of a column type.
pub fn type_name(sql_type: &SqlType, auto: bool, engine: Engine) -> String {
    match engine {
        // AUTOINCREMENT requires the exact spelling INTEGER.
        Engine::Sqlite if auto => "INTEGER".to_string(),
        Engine::Sqlite => sql_type.sql_name(),
        Engine::Mysql => match sql_type {
            SqlType::Double => "DOUBLE".to_string(),
            SqlType::Boolean => "TINYINT(1)".to_string(),
            SqlType::Timestamp => "DATETIME".to_string(),
            other => other.sql_name(),
        },
        Engine::Postgres => match sql_type {
            SqlType::Integer | SqlType::SmallInt | SqlType::TinyInt if auto => "SERIAL".to_string(),
            SqlType::BigInt if auto => "BIGSERIAL".to_string(),
            SqlType::TinyInt => "SMALLINT".to_string(),
            SqlType::DateTime => "TIMESTAMP".to_string(),
            SqlType::Blob => "BYTEA".to_string(),
            SqlType::Json => "JSONB".to_string(),
            other => other.sql_name(),
        },
    }
}

/// SQLite only allows AUTOINCREMENT on a lone `INTEGER PRIMARY KEY` column.
fn sqlite_inline_key(table: &CreateTable) -> Option<&str> {
    let keys = table.primary_keys();
    match keys.as_slice() {
        [only] => table
            .column(only)
            .filter(|c| c.auto)
            .map(|c| c.name.as_str()),
        _ => None,
    }
}

/// Format a column definition for CREATE TABLE.
fn format_column_def(col: &ColumnDef, engine: Engine, inline_key: bool) -> String {
    let mut parts = vec![
        quote_identifier(&col.name, engine),
        type_name(&col.sql_type, col.auto, engine),
    ];

    if inline_key {
        parts.push("PRIMARY KEY AUTOINCREMENT".to_string());
    } else if col.not_null {
        parts.push("NOT NULL".to_string());
    }

    if let Some(ref default) = col.default {
        parts.push(format!("DEFAULT {}", default));
    }

    if engine == Engine::Mysql && col.auto {
        parts.push("AUTO_INCREMENT".to_string());
    }

    parts.join(" ")
}

/// Generate `CREATE TABLE IF NOT EXISTS` for `table`.
pub fn generate_create_table(table: &CreateTable, engine: Engine) -> String {
    tracing::debug!(
        dialect = engine.name(),
        table = %table.name,
        columns = table.columns.len(),
        "Generating CREATE TABLE DDL"
    );

    let inline = if engine == Engine::Sqlite {
        sqlite_inline_key(table)
    } else {
        None
    };

    let mut parts: Vec<String> = table
        .columns
        .iter()
        .map(|col| {
            let is_inline = inline.is_some_and(|k| k == col.name);
            format!("  {}", format_column_def(col, engine, is_inline))
        })
        .collect();

    let keys = table.primary_keys();
    if inline.is_none() && !keys.is_empty() {
        let pk_cols: Vec<String> = keys.iter().map(|c| quote_identifier(c, engine)).collect();
        parts.push(format!("  PRIMARY KEY ({})", pk_cols.join(", ")));
    }

    let sql = format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
        quote_identifier(&table.name, engine),
        parts.join(",\n")
    );
    tracing::trace!(sql = %sql, "Generated CREATE TABLE statement");
    sql
}

/// Generate CREATE INDEX for `index` on `table`.
pub fn generate_create_index(table: &str, index: &IndexDef, engine: Engine) -> String {
    let unique = if index.unique { "UNIQUE " } else { "" };
    let cols: Vec<String> = index
        .columns
        .iter()
        .map(|c| quote_identifier(c, engine))
        .collect();
    // MySQL has no IF NOT EXISTS for indexes; the table was just created anyway.
    let if_not_exists = if engine == Engine::Mysql { "" } else { "IF NOT EXISTS " };

    format!(
        "CREATE {}INDEX {}{} ON {}({})",
        unique,
        if_not_exists,
        quote_identifier(&index.name, engine),
        quote_identifier(table, engine),
        cols.join(", ")
    )
}

/// CREATE TABLE followed by one CREATE INDEX per index.
pub fn create_table_statements(table: &CreateTable, engine: Engine) -> Vec<String> {
    let mut statements = vec![generate_create_table(table, engine)];
    statements.extend(
        table
            .indexes
            .iter()
            .map(|ix| generate_create_index(&table.name, ix, engine)),
    );
    statements
}

/// `INSERT ... VALUES (?, ...)` column and placeholder lists.
pub(crate) fn insert_lists(columns: &[&str], engine: Engine) -> (String, String) {
    let cols: Vec<String> = columns.iter().map(|c| quote_identifier(c, engine)).collect();
    let marks = vec!["?"; columns.len()].join(", ");
    (cols.join(", "), marks)
}
