//! Table partitioning.
//!
//! A partitioned entity declares its template table as [`Entity::TABLE`]; each
//! model value is stored in a physical table whose name a [`Partition`]
//! computes from the prefix and the model. Physical tables are created from
//! the introspected template on first use.

use std::fmt::{self, Write};
use std::sync::Arc;

use chrono::NaiveDateTime;
use recordkit_core::{Error, Result, Value};

use crate::entity::Entity;
use crate::model::Model;

/// Computes the physical table a model value belongs to.
pub trait Partition<E: Entity>: Send + Sync {
    fn table_name(&self, prefix: &str, model: &Model<E>) -> Result<String>;
}

/// A partition strategy bound to a table name prefix.
pub struct MetaPartition<E: Entity> {
    prefix: String,
    partition: Arc<dyn Partition<E>>,
}

impl<E: Entity> MetaPartition<E> {
    /// Partitions prefixed with the entity's template table name.
    pub fn new(partition: impl Partition<E> + 'static) -> Self {
        Self::with_prefix(E::TABLE, partition)
    }

    pub fn with_prefix(prefix: impl Into<String>, partition: impl Partition<E> + 'static) -> Self {
        Self {
            prefix: prefix.into(),
            partition: Arc::new(partition),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn table_name(&self, model: &Model<E>) -> Result<String> {
        self.partition.table_name(&self.prefix, model)
    }
}

impl<E: Entity> fmt::Debug for MetaPartition<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaPartition")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

/// `prefix` followed by a date formatted with a chrono format string.
///
/// The date is read from `field` when set and not null, else the current
/// local time is used.
#[derive(Debug, Clone)]
pub struct DatePartition {
    format: String,
    field: Option<String>,
}

impl DatePartition {
    /// Partition on the current time, e.g. `DatePartition::new("_%Y%m")`.
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            field: None,
        }
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn format_date(&self, prefix: &str, when: NaiveDateTime) -> Result<String> {
        let mut name = prefix.to_string();
        write!(name, "{}", when.format(&self.format))
            .map_err(|_| Error::config(format!("Invalid partition date format: {}", self.format)))?;
        Ok(name)
    }
}

impl<E: Entity> Partition<E> for DatePartition {
    fn table_name(&self, prefix: &str, model: &Model<E>) -> Result<String> {
        let value = match &self.field {
            Some(field) => model
                .get(field)
                .ok_or_else(|| Error::config(format!("Partition field not found: {}", field)))?,
            None => Value::Null,
        };
        let when = match value.as_datetime(None)? {
            Some(when) => when,
            None => chrono::Local::now().naive_local(),
        };
        self.format_date(prefix, when)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::tests::Note;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap()
    }

    #[test]
    fn test_format_date() {
        let p = DatePartition::new("_%Y%m");
        assert_eq!(p.format_date("logs", at(2024, 3, 9)).unwrap(), "logs_202403");
    }

    #[test]
    fn test_invalid_format_is_error() {
        let p = DatePartition::new("_%Q");
        assert!(p.format_date("logs", at(2024, 3, 9)).is_err());
    }

    #[test]
    fn test_missing_field_is_error() {
        let part = MetaPartition::<Note>::new(DatePartition::new("_%Y").on_field("nope"));
        assert_eq!(part.prefix(), "notes");
        let model = Model::<Note>::new();
        assert!(part.table_name(&model).is_err());
    }

    #[test]
    fn test_field_date_is_used() {
        let part = MetaPartition::<Note>::with_prefix("n", DatePartition::new("_%Y").on_field("title"));
        let mut model = Model::<Note>::new();
        model.set("title", "2023-05-01").unwrap();
        assert_eq!(part.table_name(&model).unwrap(), "n_2023");
    }
}
