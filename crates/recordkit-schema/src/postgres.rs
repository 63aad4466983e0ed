//! PostgreSQL dialect.

use recordkit_core::Result;
use recordkit_query::{CreateTable, DbConfig, Dialect, Tx};

use crate::ddl::{self, Engine};
use crate::introspect;

/// PostgreSQL SQL generation.
///
/// Replaces become `INSERT ... ON CONFLICT (keys) DO UPDATE`; auto-increment
/// keys become `SERIAL`/`BIGSERIAL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        Engine::Postgres.name()
    }

    fn replace_sql(&self, table: &str, columns: &[&str], keys: &[&str]) -> String {
        let (cols, marks) = ddl::insert_lists(columns, Engine::Postgres);
        let mut sql = format!("INSERT INTO {} ({}) VALUES ({})", self.quote(table), cols, marks);
        if keys.is_empty() {
            return sql;
        }

        let conflict: Vec<String> = keys.iter().map(|k| self.quote(k)).collect();
        let updates: Vec<String> = columns
            .iter()
            .filter(|c| !keys.iter().any(|k| k.eq_ignore_ascii_case(c)))
            .map(|c| {
                let q = self.quote(c);
                format!("{} = EXCLUDED.{}", q, q)
            })
            .collect();

        sql.push_str(&format!(" ON CONFLICT ({})", conflict.join(", ")));
        if updates.is_empty() {
            sql.push_str(" DO NOTHING");
        } else {
            sql.push_str(&format!(" DO UPDATE SET {}", updates.join(", ")));
        }
        sql
    }

    fn create_table_statements(&self, table: &CreateTable) -> Vec<String> {
        ddl::create_table_statements(table, Engine::Postgres)
    }

    fn get_create_table(&self, db: &DbConfig, tx: Option<&Tx>, table: &str) -> Result<CreateTable> {
        introspect::get_create_table(Engine::Postgres, db, tx, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordkit_core::SqlType;
    use recordkit_query::ColumnDef;

    #[test]
    fn test_replace_is_upsert() {
        assert_eq!(
            PostgresDialect.replace_sql("users", &["id", "name", "age"], &["id"]),
            "INSERT INTO \"users\" (\"id\", \"name\", \"age\") VALUES (?, ?, ?) \
             ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\", \"age\" = EXCLUDED.\"age\""
        );
    }

    #[test]
    fn test_replace_keys_only_does_nothing() {
        let sql = PostgresDialect.replace_sql("tags", &["a", "b"], &["a", "b"]);
        assert!(sql.ends_with("ON CONFLICT (\"a\", \"b\") DO NOTHING"));
    }

    #[test]
    fn test_bigserial_and_bytea() {
        let table = CreateTable::new("files")
            .with_column(ColumnDef::new("id", SqlType::BigInt).primary_key().auto_increment())
            .with_column(ColumnDef::new("body", SqlType::Blob));
        let sql = PostgresDialect.create_table_sql(&table);
        assert!(sql.contains("\"id\" BIGSERIAL NOT NULL"));
        assert!(sql.contains("\"body\" BYTEA"));
    }
}
