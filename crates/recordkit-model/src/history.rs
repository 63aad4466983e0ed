//! History shadow tables.
//!
//! Tables matching the `history.tables` patterns get every mutation copied
//! into `<history.prefix.table><table>`, together with the event time, event
//! type, transaction id and user.

use recordkit_core::{DataMap, DbProp, Error, Result, Value};
use recordkit_query::{DbConfig, Query, Tx};
use regex::Regex;

use crate::entity::Entity;
use crate::listener::ModelEvent;
use crate::model::Model;
use crate::statement;

/// Whether `table` is listed in `patterns`.
///
/// Patterns are separated by `,`, `;` or `|`; `%` matches any run of
/// characters and the whole table name must match. Tables that are
/// themselves history tables never match.
pub fn keeps_history(patterns: &str, history_prefix: &str, table: &str) -> Result<bool> {
    if !history_prefix.is_empty() && table.starts_with(history_prefix) {
        return Ok(false);
    }
    for pattern in patterns.split([',', ';', '|']) {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            continue;
        }
        let translated = pattern
            .split('%')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let re = Regex::new(&format!("^(?:{})$", translated))
            .map_err(|e| Error::config(format!("Invalid history table pattern {}: {}", pattern, e)))?;
        if re.is_match(table) {
            return Ok(true);
        }
    }
    Ok(false)
}

impl<E: Entity> Model<E> {
    /// Whether mutations of this model are shadowed into a history table.
    pub fn history(&self) -> Result<bool> {
        let Some(db) = self.db() else {
            return Ok(false);
        };
        let Some(patterns) = db.prop(DbProp::HistoryTables, self.table()) else {
            return Ok(false);
        };
        let prefix = db
            .prop(DbProp::HistoryTablePrefix, self.table())
            .unwrap_or_default();
        keeps_history(&patterns, &prefix, self.table())
    }

    fn history_db(&self, db: &DbConfig) -> Result<DbConfig> {
        match db.prop(DbProp::HistoryDb, self.table()) {
            Some(key) if !key.trim().is_empty() => db
                .lookup(key.trim())
                .map_err(|_| Error::config(format!("History db config: {} not found", key.trim()))),
            _ => Ok(db.clone()),
        }
    }

    /// Write the history row for `event` inside `tx`.
    pub(crate) fn save_history(&self, event: ModelEvent, tx: &Tx) -> Result<()> {
        if self.meta().keys.is_empty() {
            tracing::debug!(table = self.table(), "No primary key, history skipped");
            return Ok(());
        }
        let db = self.require_db()?;
        let table = self.resolve_table()?;
        let history_db = self.history_db(&db)?;
        let table_prefix = db.prop(DbProp::HistoryTablePrefix, &table).unwrap_or_default();
        let column_prefix = db.prop(DbProp::HistoryColumnPrefix, &table).unwrap_or_default();
        let history_table = format!("{}{}", table_prefix, table);

        let key = format!("{}:{}", history_db.key(), history_table);
        history_db.registry().insert_if_absent(Some(tx), &key, || {
            let origin = db.dialect().get_create_table(&db, Some(tx), &table)?;
            history_db.dialect().create_table(
                &history_db,
                Some(tx),
                &origin.to_history(&history_table, &column_prefix),
            )
        })?;

        // The row is gone after a delete; record what the model last held.
        let mut row = if event == ModelEvent::Delete {
            self.to_map(false)
        } else {
            let mut current = self.shallow();
            current.tx = Some(tx.clone());
            for field in self.meta().key_fields() {
                field.set(&mut current.entity, field.get(&self.entity))?;
            }
            current.load()?;
            current.to_map(false)
        };
        for i in self.holder.changes() {
            let field = &self.meta().fields[i];
            row.insert(field.column.name, field.get(&self.entity));
        }
        row.insert(format!("{}time", column_prefix), Value::now());
        row.insert(format!("{}type", column_prefix), event.name());
        row.insert(format!("{}txid", column_prefix), tx.id());
        row.insert(format!("{}user", column_prefix), tx.user().unwrap_or(Value::Null));

        insert_row(&history_db, tx, &history_table, &row)?;
        tracing::debug!(
            table = %table,
            history = %history_table,
            event = event.name(),
            txid = tx.id(),
            "Saved history row"
        );
        Ok(())
    }
}

fn insert_row(db: &DbConfig, tx: &Tx, table: &str, row: &DataMap) -> Result<u64> {
    let columns: Vec<&str> = row.keys().collect();
    let values: Vec<Value> = row.values().cloned().collect();
    let dialect = db.dialect();
    Query::with_db(db)
        .tx(tx)
        .add(statement::insert_sql(dialect.as_ref(), table, &columns), values)
        .execute()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcard_full_match() {
        assert!(keeps_history("order%", "history_", "orders").unwrap());
        assert!(keeps_history("users, order%", "history_", "users").unwrap());
        assert!(!keeps_history("order", "history_", "orders").unwrap());
        assert!(!keeps_history("order%", "history_", "my_orders").unwrap());
    }

    #[test]
    fn test_separators() {
        assert!(keeps_history("a;b|c", "history_", "b").unwrap());
        assert!(keeps_history("a;b|c", "history_", "c").unwrap());
        assert!(!keeps_history("a;b|c", "history_", "d").unwrap());
    }

    #[test]
    fn test_history_tables_excluded() {
        assert!(!keeps_history("%", "history_", "history_orders").unwrap());
        assert!(keeps_history("%", "", "history_orders").unwrap());
    }

    #[test]
    fn test_regex_characters_are_literal() {
        assert!(!keeps_history("a.c", "history_", "abc").unwrap());
        assert!(keeps_history("a.c", "history_", "a.c").unwrap());
    }
}
