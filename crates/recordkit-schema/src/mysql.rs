//! MySQL dialect.

use recordkit_core::Result;
use recordkit_query::{CreateTable, DbConfig, Dialect, Query, Tx};

use crate::ddl::{self, Engine, quote_identifier};
use crate::introspect;

/// MySQL SQL generation: backtick quoting, `LIMIT offset, count`, `REPLACE INTO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MysqlDialect;

impl Dialect for MysqlDialect {
    fn name(&self) -> &'static str {
        Engine::Mysql.name()
    }

    fn quote(&self, identifier: &str) -> String {
        quote_identifier(identifier, Engine::Mysql)
    }

    fn limit_query(&self, query: &Query, limit: usize, offset: usize) -> Query {
        query.derive(format!("{} LIMIT {}, {}", query.sql(), offset, limit))
    }

    fn empty_subquery(&self) -> &'static str {
        "SELECT NULL FROM DUAL WHERE 1=0"
    }

    fn replace_sql(&self, table: &str, columns: &[&str], _keys: &[&str]) -> String {
        let (cols, marks) = ddl::insert_lists(columns, Engine::Mysql);
        format!("REPLACE INTO {} ({}) VALUES ({})", self.quote(table), cols, marks)
    }

    fn create_table_statements(&self, table: &CreateTable) -> Vec<String> {
        ddl::create_table_statements(table, Engine::Mysql)
    }

    fn get_create_table(&self, db: &DbConfig, tx: Option<&Tx>, table: &str) -> Result<CreateTable> {
        introspect::get_create_table(Engine::Mysql, db, tx, table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_puts_offset_first() {
        let q = Query::new().add("SELECT * FROM t", ());
        assert_eq!(MysqlDialect.limit_query(&q, 10, 30).sql(), "SELECT * FROM t LIMIT 30, 10");
    }

    #[test]
    fn test_empty_in_uses_dual() {
        let q = MysqlDialect.in_values(Query::new().add("id", ()), Vec::new());
        assert_eq!(q.sql(), "id IN (SELECT NULL FROM DUAL WHERE 1=0)");
    }

    #[test]
    fn test_replace_sql_quotes_with_backticks() {
        assert_eq!(
            MysqlDialect.replace_sql("users", &["id", "name"], &["id"]),
            "REPLACE INTO `users` (`id`, `name`) VALUES (?, ?)"
        );
    }
}
