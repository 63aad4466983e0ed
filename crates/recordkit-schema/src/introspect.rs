//! Database introspection.
//!
//! Reads the live structure of one table back into a [`CreateTable`], so that
//! history shadows and partitions can be cloned from it.
//!
//! # Database Support
//!
//! - SQLite: `PRAGMA table_info`, `PRAGMA index_list`, `PRAGMA index_info`
//! - PostgreSQL: `information_schema` plus the `pg_catalog` index tables
//! - MySQL: `SHOW FULL COLUMNS` and `SHOW INDEX`

use recordkit_core::{DataMap, Error, Result, SchemaError, SchemaErrorKind, SqlType, Value};
use recordkit_query::{ColumnDef, CreateTable, DbConfig, IndexDef, Query, Tx};

use crate::ddl::{Engine, quote_identifier};

/// Describe `table` as it exists on `db`.
pub fn get_create_table(
    engine: Engine,
    db: &DbConfig,
    tx: Option<&Tx>,
    table: &str,
) -> Result<CreateTable> {
    tracing::debug!(dialect = engine.name(), db = db.key(), table = %table, "Introspecting table");

    let described = match engine {
        Engine::Sqlite => sqlite_table(db, tx, table),
        Engine::Mysql => mysql_table(db, tx, table),
        Engine::Postgres => postgres_table(db, tx, table),
    }?;

    if described.columns.is_empty() {
        return Err(table_not_found(table, None));
    }
    tracing::trace!(
        table = %table,
        columns = described.columns.len(),
        indexes = described.indexes.len(),
        "Introspected table"
    );
    Ok(described)
}

fn table_not_found(table: &str, source: Option<Error>) -> Error {
    Error::Schema(SchemaError {
        kind: SchemaErrorKind::TableNotFound,
        message: format!("Table not found: {}", table),
        source: source.map(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
    })
}

fn rows(db: &DbConfig, tx: Option<&Tx>, sql: &str, params: Vec<Value>) -> Result<Vec<DataMap>> {
    Query::with_db(db).with_tx(tx).add(sql, params).list()
}

/// Append `column` to the index named `name`, creating it on first sight.
fn push_index_column(indexes: &mut Vec<IndexDef>, name: &str, column: String, unique: bool) {
    match indexes.iter_mut().find(|ix| ix.name == name) {
        Some(ix) => ix.columns.push(column),
        None => indexes.push(IndexDef {
            name: name.to_string(),
            columns: vec![column],
            unique,
        }),
    }
}

// ============================================================================
// SQLite
// ============================================================================

fn sqlite_table(db: &DbConfig, tx: Option<&Tx>, table: &str) -> Result<CreateTable> {
    let quoted = quote_identifier(table, Engine::Sqlite);
    let info = rows(db, tx, &format!("PRAGMA table_info({})", quoted), Vec::new())?;

    let mut pk: Vec<(i32, usize)> = Vec::new();
    let mut columns = Vec::with_capacity(info.len());
    for row in &info {
        let name = row.get_string_or("name", "");
        let declared = row.get_string_or("type", "");
        let mut col = ColumnDef::new(name, SqlType::from_declared(&declared));
        col.not_null = row.get_int("notnull", 0)? != 0;
        col.default = row.get_string("dflt_value");
        let pk_pos = row.get_int("pk", 0)?;
        if pk_pos > 0 {
            col.key = true;
            col.not_null = true;
            pk.push((pk_pos, columns.len()));
        }
        columns.push(col);
    }

    // A lone INTEGER key aliases the rowid and is assigned automatically.
    if let [(_, i)] = pk.as_slice() {
        if columns[*i].sql_type == SqlType::Integer {
            columns[*i].auto = true;
        }
    }

    let mut indexes = Vec::new();
    for ix in rows(db, tx, &format!("PRAGMA index_list({})", quoted), Vec::new())? {
        let origin = ix.get_string_or("origin", "c");
        if origin == "pk" {
            continue;
        }
        let ix_name = ix.get_string_or("name", "");
        let unique = ix.get_int("unique", 0)? != 0;
        let cols: Vec<String> = rows(
            db,
            tx,
            &format!("PRAGMA index_info({})", quote_identifier(&ix_name, Engine::Sqlite)),
            Vec::new(),
        )?
        .iter()
        .map(|c| c.get_string_or("name", ""))
        .collect();

        let name = if origin == "u" {
            sqlite_constraint_index_name(table, &cols)
        } else {
            ix_name
        };
        indexes.push(IndexDef {
            name,
            columns: cols,
            unique,
        });
    }

    Ok(CreateTable {
        name: table.to_string(),
        columns,
        indexes,
        ..CreateTable::default()
    })
}

/// Name for an index SQLite created for an inline UNIQUE constraint.
///
/// The engine's own `sqlite_autoindex_*` names cannot be used in CREATE INDEX.
pub(crate) fn sqlite_constraint_index_name(table: &str, columns: &[String]) -> String {
    format!("{}_uq_{}", table, columns.join("_"))
}

// ============================================================================
// MySQL
// ============================================================================

fn mysql_table(db: &DbConfig, tx: Option<&Tx>, table: &str) -> Result<CreateTable> {
    let quoted = quote_identifier(table, Engine::Mysql);
    // MySQL reports a missing table as an error rather than an empty set.
    let info = rows(db, tx, &format!("SHOW FULL COLUMNS FROM {}", quoted), Vec::new())
        .map_err(|e| table_not_found(table, Some(e)))?;

    let columns = info
        .iter()
        .map(|row| {
            let declared = row.get_string_or("Type", "");
            let mut col = ColumnDef::new(row.get_string_or("Field", ""), SqlType::from_declared(&declared));
            col.not_null = row.get_string_or("Null", "YES").eq_ignore_ascii_case("NO");
            col.key = row.get_string_or("Key", "").eq_ignore_ascii_case("PRI");
            col.auto = row
                .get_string_or("Extra", "")
                .to_ascii_lowercase()
                .contains("auto_increment");
            col.default = row
                .get_string("Default")
                .map(|d| mysql_default_expr(&d, &col.sql_type));
            col
        })
        .collect();

    let mut indexes = Vec::new();
    for row in rows(db, tx, &format!("SHOW INDEX FROM {}", quoted), Vec::new())? {
        let name = row.get_string_or("Key_name", "");
        if name == "PRIMARY" {
            continue;
        }
        let unique = row.get_int("Non_unique", 1)? == 0;
        push_index_column(&mut indexes, &name, row.get_string_or("Column_name", ""), unique);
    }

    Ok(CreateTable {
        name: table.to_string(),
        columns,
        indexes,
        ..CreateTable::default()
    })
}

/// MySQL reports defaults unquoted; turn them back into SQL expressions.
pub(crate) fn mysql_default_expr(raw: &str, sql_type: &SqlType) -> String {
    let upper = raw.to_ascii_uppercase();
    if sql_type.is_numeric() || upper.starts_with("CURRENT_TIMESTAMP") || upper == "NULL" {
        raw.to_string()
    } else {
        format!("'{}'", raw.replace('\'', "''"))
    }
}

// ============================================================================
// PostgreSQL
// ============================================================================

const PG_COLUMNS_SQL: &str = "SELECT column_name, data_type, character_maximum_length, \
     numeric_precision, numeric_scale, is_nullable, column_default \
     FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = ? \
     ORDER BY ordinal_position";

const PG_PRIMARY_KEY_SQL: &str = "SELECT kcu.column_name \
     FROM information_schema.table_constraints tc \
     JOIN information_schema.key_column_usage kcu \
       ON tc.constraint_name = kcu.constraint_name AND tc.table_schema = kcu.table_schema \
     WHERE tc.constraint_type = 'PRIMARY KEY' \
       AND tc.table_schema = current_schema() AND tc.table_name = ? \
     ORDER BY kcu.ordinal_position";

const PG_INDEXES_SQL: &str = "SELECT i.relname AS index_name, a.attname AS column_name, \
     ix.indisunique AS is_unique \
     FROM pg_class t \
     JOIN pg_index ix ON t.oid = ix.indrelid \
     JOIN pg_class i ON i.oid = ix.indexrelid \
     JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey) \
     JOIN pg_namespace n ON n.oid = t.relnamespace \
     WHERE t.relname = ? AND n.nspname = current_schema() AND NOT ix.indisprimary \
     ORDER BY i.relname, array_position(ix.indkey::int2[], a.attnum)";

fn postgres_table(db: &DbConfig, tx: Option<&Tx>, table: &str) -> Result<CreateTable> {
    let info = rows(db, tx, PG_COLUMNS_SQL, vec![Value::from(table)])?;
    let keys: Vec<String> = rows(db, tx, PG_PRIMARY_KEY_SQL, vec![Value::from(table)])?
        .iter()
        .filter_map(|r| r.get_string("column_name"))
        .collect();

    let mut columns = Vec::with_capacity(info.len());
    for row in &info {
        let name = row.get_string_or("column_name", "");
        let sql_type = postgres_type(
            &row.get_string_or("data_type", ""),
            row.get_integer("character_maximum_length")?,
            row.get_integer("numeric_precision")?,
            row.get_integer("numeric_scale")?,
        );
        let mut col = ColumnDef::new(name, sql_type);
        col.not_null = row.get_string_or("is_nullable", "YES").eq_ignore_ascii_case("NO");
        col.key = keys.iter().any(|k| *k == col.name);
        match row.get_string("column_default") {
            Some(d) if d.starts_with("nextval(") => col.auto = true,
            other => col.default = other,
        }
        columns.push(col);
    }

    let mut indexes = Vec::new();
    for row in rows(db, tx, PG_INDEXES_SQL, vec![Value::from(table)])? {
        push_index_column(
            &mut indexes,
            &row.get_string_or("index_name", ""),
            row.get_string_or("column_name", ""),
            row.get_bool("is_unique", false),
        );
    }

    Ok(CreateTable {
        name: table.to_string(),
        columns,
        indexes,
        ..CreateTable::default()
    })
}

/// Map an `information_schema.columns.data_type` to a descriptor.
pub(crate) fn postgres_type(
    data_type: &str,
    char_len: Option<i32>,
    precision: Option<i32>,
    scale: Option<i32>,
) -> SqlType {
    let len = |n: Option<i32>| n.and_then(|v| u32::try_from(v).ok());
    let small = |n: Option<i32>| n.and_then(|v| u8::try_from(v).ok()).unwrap_or(0);
    match data_type {
        "character varying" => len(char_len).map_or(SqlType::Text, SqlType::VarChar),
        "character" => SqlType::Char(len(char_len).unwrap_or(1)),
        "numeric" => SqlType::Decimal {
            precision: small(precision),
            scale: small(scale),
        },
        "timestamp without time zone" | "timestamp with time zone" => SqlType::Timestamp,
        "time without time zone" | "time with time zone" => SqlType::Time,
        "bytea" => SqlType::Blob,
        "jsonb" | "json" => SqlType::Json,
        other => SqlType::from_declared(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_postgres_type_mapping() {
        assert_eq!(postgres_type("character varying", Some(40), None, None), SqlType::VarChar(40));
        assert_eq!(postgres_type("character varying", None, None, None), SqlType::Text);
        assert_eq!(
            postgres_type("numeric", None, Some(10), Some(2)),
            SqlType::Decimal { precision: 10, scale: 2 }
        );
        assert_eq!(postgres_type("timestamp without time zone", None, None, None), SqlType::Timestamp);
        assert_eq!(postgres_type("bytea", None, None, None), SqlType::Blob);
        assert_eq!(postgres_type("bigint", None, Some(64), Some(0)), SqlType::BigInt);
    }

    #[test]
    fn test_mysql_default_quoting() {
        assert_eq!(mysql_default_expr("0", &SqlType::Integer), "0");
        assert_eq!(mysql_default_expr("it's", &SqlType::VarChar(10)), "'it''s'");
        assert_eq!(
            mysql_default_expr("CURRENT_TIMESTAMP", &SqlType::DateTime),
            "CURRENT_TIMESTAMP"
        );
    }

    #[test]
    fn test_unique_constraint_index_name() {
        let cols = vec!["a".to_string(), "b".to_string()];
        assert_eq!(sqlite_constraint_index_name("orders", &cols), "orders_uq_a_b");
    }

    #[test]
    fn test_push_index_column_groups() {
        let mut indexes = Vec::new();
        push_index_column(&mut indexes, "ix", "a".into(), true);
        push_index_column(&mut indexes, "ix", "b".into(), true);
        push_index_column(&mut indexes, "other", "c".into(), false);
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].columns, vec!["a", "b"]);
        assert!(!indexes[1].unique);
    }
}
