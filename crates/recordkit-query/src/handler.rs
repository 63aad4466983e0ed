//! Row materialization and the exchange interception point.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use recordkit_core::{DataMap, FromDataMap, Result, Row};

use crate::query::Query;

type MapFn<T> = dyn Fn(&DataMap) -> Result<T> + Send + Sync;

/// Maps each result row to a `T`.
///
/// Rows are first turned into a case-insensitive [`DataMap`]; the mapper then
/// picks the columns it knows and ignores the rest.
pub struct ResultHandler<T> {
    mapper: Arc<MapFn<T>>,
}

impl<T: FromDataMap + 'static> ResultHandler<T> {
    /// Handler using `T`'s [`FromDataMap`] implementation.
    pub fn new() -> Self {
        Self {
            mapper: Arc::new(T::from_data_map),
        }
    }
}

impl<T: FromDataMap + 'static> Default for ResultHandler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultHandler<T> {
    /// Handler with a custom mapping.
    pub fn with<F>(mapper: F) -> Self
    where
        F: Fn(&DataMap) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            mapper: Arc::new(mapper),
        }
    }

    pub fn handle(&self, row: Row) -> Result<T> {
        self.handle_map(&row.into_data_map())
    }

    pub fn handle_map(&self, map: &DataMap) -> Result<T> {
        (self.mapper)(map)
    }

    pub fn handle_all(&self, rows: Vec<Row>) -> Result<Vec<T>> {
        rows.into_iter().map(|row| self.handle(row)).collect()
    }
}

impl<T> Clone for ResultHandler<T> {
    fn clone(&self) -> Self {
        Self {
            mapper: Arc::clone(&self.mapper),
        }
    }
}

impl<T> fmt::Debug for ResultHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultHandler")
            .field("target", &std::any::type_name::<T>())
            .finish()
    }
}

/// An existing value that a single result row can be loaded into.
pub trait LoadTarget {
    fn load_from(&mut self, row: &DataMap) -> Result<()>;
}

impl LoadTarget for DataMap {
    fn load_from(&mut self, row: &DataMap) -> Result<()> {
        self.clone_from(row);
        Ok(())
    }
}

/// Interception point consulted by read paths before touching the database.
///
/// When `claim` returns `true` the query is considered served out of band and
/// the read returns a neutral result (`None`, an empty list, an empty page or
/// the unchanged load target).
pub trait Exchange: Send + Sync {
    fn claim(&self, query: &Query) -> bool;
}

/// Exchange that claims every query and records its executable SQL.
#[derive(Debug, Default)]
pub struct RecordingExchange {
    claimed: Mutex<Vec<String>>,
}

impl RecordingExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executable SQL of every claimed query, oldest first.
    pub fn claimed(&self) -> Vec<String> {
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Exchange for RecordingExchange {
    fn claim(&self, query: &Query) -> bool {
        let sql = query.executable_sql();
        tracing::debug!(sql = %sql, "Query claimed by exchange");
        self.claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sql);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordkit_core::Value;

    #[derive(Debug, Clone, PartialEq)]
    struct Named {
        name: String,
    }

    impl FromDataMap for Named {
        fn from_data_map(map: &DataMap) -> Result<Self> {
            Ok(Named {
                name: map.get_string_or("NAME", ""),
            })
        }
    }

    fn row() -> Row {
        Row::new(
            vec!["Name".to_string(), "extra".to_string()],
            vec![Value::from("ann"), Value::Int(1)],
        )
    }

    #[test]
    fn test_from_data_map_handler_is_case_insensitive() {
        let handler = ResultHandler::<Named>::new();
        assert_eq!(
            handler.handle(row()).unwrap(),
            Named {
                name: "ann".to_string()
            }
        );
    }

    #[test]
    fn test_data_map_maps_to_itself() {
        let handler = ResultHandler::<DataMap>::new();
        let map = handler.handle(row()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("EXTRA"), Some(&Value::Int(1)));
    }

    #[test]
    fn test_custom_handler() {
        let handler = ResultHandler::with(|m| m.get_int("extra", 0));
        assert_eq!(handler.handle_all(vec![row(), row()]).unwrap(), vec![1, 1]);
    }

    #[test]
    fn test_recording_exchange_claims() {
        let exchange = RecordingExchange::new();
        let query = Query::new().add("SELECT * FROM t WHERE id = ?", [5]);
        assert!(exchange.claim(&query));
        assert_eq!(exchange.claimed(), vec!["SELECT * FROM t WHERE id = 5"]);
    }

    #[test]
    fn test_load_target_replaces_map() {
        let mut target = DataMap::new();
        target.insert("old", 1);
        target.load_from(&row().into_data_map()).unwrap();
        assert!(!target.contains_key("old"));
        assert_eq!(target.get_string("name").as_deref(), Some("ann"));
    }
}
