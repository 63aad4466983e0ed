//! Per-engine SQL strategy and table descriptions.

use recordkit_core::{Result, SqlType, Value};

use crate::db::DbConfig;
use crate::query::Query;
use crate::tx::Tx;

/// What a table description is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableType {
    #[default]
    Normal,
    /// Append-only audit shadow of another table.
    History,
    /// Physical table cloned from a template.
    Partition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: SqlType,
    pub key: bool,
    pub auto: bool,
    pub not_null: bool,
    /// Default as a SQL expression, emitted verbatim.
    pub default: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            key: false,
            auto: false,
            not_null: false,
            default: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.key = true;
        self.not_null = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

impl IndexDef {
    pub fn new(name: impl Into<String>, columns: &[&str], unique: bool) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            unique,
        }
    }
}

/// Description of a table, as introspected or as to be created.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateTable {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub indexes: Vec<IndexDef>,
    pub table_type: TableType,
}

impl CreateTable {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_keys(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.key)
            .map(|c| c.name.as_str())
            .collect()
    }

    /// History shadow of this table named `name`.
    ///
    /// Columns keep their types but lose key, auto-increment and not-null
    /// constraints; indexes are dropped; the four audit columns
    /// `<prefix>time`, `<prefix>type`, `<prefix>txid` and `<prefix>user` are appended.
    pub fn to_history(&self, name: &str, column_prefix: &str) -> CreateTable {
        let mut columns: Vec<ColumnDef> = self
            .columns
            .iter()
            .map(|c| ColumnDef {
                key: false,
                auto: false,
                not_null: false,
                ..c.clone()
            })
            .collect();
        columns.extend(history_columns(column_prefix));

        CreateTable {
            name: name.to_string(),
            columns,
            indexes: Vec::new(),
            table_type: TableType::History,
        }
    }

    /// Copy of this table named `name`, with index names rewritten for the new table.
    pub fn to_partition(&self, name: &str) -> CreateTable {
        let indexes = self
            .indexes
            .iter()
            .map(|ix| {
                let suffix = ix
                    .name
                    .strip_prefix(self.name.as_str())
                    .map_or_else(|| format!("_{}", ix.name), str::to_string);
                IndexDef {
                    name: format!("{}{}", name, suffix),
                    ..ix.clone()
                }
            })
            .collect();

        CreateTable {
            name: name.to_string(),
            columns: self.columns.clone(),
            indexes,
            table_type: TableType::Partition,
        }
    }
}

/// Audit columns appended to history tables.
pub fn history_columns(prefix: &str) -> Vec<ColumnDef> {
    vec![
        ColumnDef::new(format!("{}time", prefix), SqlType::DateTime),
        ColumnDef::new(format!("{}type", prefix), SqlType::VarChar(16)),
        ColumnDef::new(format!("{}txid", prefix), SqlType::VarChar(64)),
        ColumnDef::new(format!("{}user", prefix), SqlType::VarChar(128)),
    ]
}

/// Engine-specific SQL generation.
///
/// Defaults follow SQLite/PostgreSQL syntax; engines override what differs.
pub trait Dialect: Send + Sync {
    /// Short engine name, e.g. `"sqlite"`.
    fn name(&self) -> &'static str;

    fn quote(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// `query` restricted to `limit` rows starting at `offset`.
    fn limit_query(&self, query: &Query, limit: usize, offset: usize) -> Query {
        query.derive(format!("{} LIMIT {} OFFSET {}", query.sql(), limit, offset))
    }

    /// Query returning the number of rows `query` produces.
    fn count_query(&self, query: &Query) -> Query {
        query.derive(format!("SELECT COUNT(*) FROM ({}) t", query.sql()))
    }

    /// Subquery yielding no rows, used for empty `IN` lists.
    fn empty_subquery(&self) -> &'static str {
        "SELECT NULL WHERE 1=0"
    }

    /// Append ` IN (...)` for `values` to `query`.
    fn in_values(&self, query: Query, values: Vec<Value>) -> Query {
        in_list(query, values, " IN ", self.empty_subquery())
    }

    /// Append ` NOT IN (...)` for `values` to `query`.
    fn not_in(&self, query: Query, values: Vec<Value>) -> Query {
        in_list(query, values, " NOT IN ", self.empty_subquery())
    }

    /// Insert-or-replace statement for `columns`, keyed by `keys`.
    fn replace_sql(&self, table: &str, columns: &[&str], keys: &[&str]) -> String;

    /// DDL statements creating `table` and its indexes, if absent.
    fn create_table_statements(&self, table: &CreateTable) -> Vec<String>;

    fn create_table_sql(&self, table: &CreateTable) -> String {
        self.create_table_statements(table).join(";\n")
    }

    /// Execute the DDL for `table`.
    fn create_table(&self, db: &DbConfig, tx: Option<&Tx>, table: &CreateTable) -> Result<()> {
        tracing::debug!(db = db.key(), table = %table.name, kind = ?table.table_type, "Creating table");
        for statement in self.create_table_statements(table) {
            Query::with_db(db).with_tx(tx).add(statement, ()).execute()?;
        }
        Ok(())
    }

    /// Describe the existing table `table`.
    fn get_create_table(&self, db: &DbConfig, tx: Option<&Tx>, table: &str) -> Result<CreateTable>;
}

fn in_list(query: Query, values: Vec<Value>, keyword: &str, empty: &str) -> Query {
    let mut flat = Vec::with_capacity(values.len());
    for v in values {
        v.flatten_into(&mut flat);
    }
    if flat.is_empty() {
        return query.add(format!("{}({})", keyword, empty), ());
    }
    let marks = vec!["?"; flat.len()].join(", ");
    query.add(format!("{}({})", keyword, marks), flat)
}
