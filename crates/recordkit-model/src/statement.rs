//! SQL text for model operations.

use recordkit_query::Dialect;

fn quoted(dialect: &dyn Dialect, columns: &[&str]) -> Vec<String> {
    columns.iter().map(|c| dialect.quote(c)).collect()
}

/// `"a" = ? AND "b" = ?`
pub fn key_condition(dialect: &dyn Dialect, keys: &[&str]) -> String {
    quoted(dialect, keys)
        .into_iter()
        .map(|k| format!("{} = ?", k))
        .collect::<Vec<_>>()
        .join(" AND ")
}

pub fn insert_sql(dialect: &dyn Dialect, table: &str, columns: &[&str]) -> String {
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote(table),
        quoted(dialect, columns).join(", "),
        vec!["?"; columns.len()].join(", ")
    )
}

/// `UPDATE t SET a = ?, ...` followed by `extra` assignments and ` WHERE condition`.
pub fn update_sql(
    dialect: &dyn Dialect,
    table: &str,
    columns: &[&str],
    extra: &[String],
    condition: &str,
) -> String {
    let mut sets: Vec<String> = quoted(dialect, columns)
        .into_iter()
        .map(|c| format!("{} = ?", c))
        .collect();
    sets.extend(extra.iter().cloned());
    format!(
        "UPDATE {} SET {} WHERE {}",
        dialect.quote(table),
        sets.join(", "),
        condition
    )
}

/// `"v" = "v" + 1`
pub fn increment(dialect: &dyn Dialect, column: &str) -> String {
    let c = dialect.quote(column);
    format!("{} = {} + 1", c, c)
}

pub fn delete_sql(dialect: &dyn Dialect, table: &str, condition: &str) -> String {
    format!("DELETE FROM {} WHERE {}", dialect.quote(table), condition)
}

/// `SELECT <fields> FROM t`, with ` WHERE condition` when one is given.
pub fn select_sql(dialect: &dyn Dialect, table: &str, fields: &str, condition: Option<&str>) -> String {
    let mut sql = format!("SELECT {} FROM {}", fields, dialect.quote(table));
    if let Some(condition) = condition {
        sql.push_str(" WHERE ");
        sql.push_str(condition);
    }
    sql
}
