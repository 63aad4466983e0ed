//! Static descriptions of entity types.
//!
//! An entity is a plain struct plus a `&'static [Field<Self>]` table that
//! names each column and gives typed access to the struct field behind it.
//! The model layer works only through that table.
//!
//! ```ignore
//! #[derive(Debug, Clone, Default)]
//! struct Order {
//!     id: Option<i64>,
//!     title: Option<String>,
//! }
//!
//! static ORDER_FIELDS: &[Field<Order>] = &[
//!     Field::new("id", Column::new("id", SqlType::Integer).key().auto(),
//!         |o| Value::from(o.id), |o, v| assign(&mut o.id, &v)),
//!     Field::new("title", Column::new("title", SqlType::VarChar(64)),
//!         |o| Value::from(o.title.clone()), |o, v| assign(&mut o.title, &v)),
//! ];
//!
//! impl Entity for Order {
//!     const TABLE: &'static str = "orders";
//!     fn fields() -> &'static [Field<Self>] { ORDER_FIELDS }
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use recordkit_core::{DataMap, FromValue, Result, SqlType, Value};
use recordkit_query::{ColumnDef, CreateTable, DbConfig, IndexDef};

use crate::listener::ModelListener;
use crate::partition::MetaPartition;

/// Column metadata of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub sql_type: SqlType,
    pub key: bool,
    pub auto: bool,
    pub not_null: bool,
    /// Default expression as written in DDL, e.g. `'new'` or `0`.
    pub default: Option<&'static str>,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: SqlType) -> Self {
        Self {
            name,
            sql_type,
            key: false,
            auto: false,
            not_null: false,
            default: None,
        }
    }

    /// Part of the primary key; implies NOT NULL.
    pub const fn key(mut self) -> Self {
        self.key = true;
        self.not_null = true;
        self
    }

    pub const fn auto(mut self) -> Self {
        self.auto = true;
        self
    }

    pub const fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub const fn default(mut self, expr: &'static str) -> Self {
        self.default = Some(expr);
        self
    }

    /// Declared length of sized character columns.
    pub const fn length(&self) -> Option<u32> {
        self.sql_type.length()
    }

    pub fn to_column_def(&self) -> ColumnDef {
        ColumnDef {
            name: self.name.to_string(),
            sql_type: self.sql_type.clone(),
            key: self.key,
            auto: self.auto,
            not_null: self.not_null,
            default: self.default.map(str::to_string),
        }
    }
}

pub type Getter<E> = fn(&E) -> Value;
pub type Setter<E> = fn(&mut E, Value) -> Result<()>;

/// One persistent field of `E`: its name, its column and typed access.
pub struct Field<E> {
    pub name: &'static str,
    pub column: Column,
    getter: Getter<E>,
    setter: Setter<E>,
}

impl<E> Field<E> {
    pub const fn new(name: &'static str, column: Column, getter: Getter<E>, setter: Setter<E>) -> Self {
        Self {
            name,
            column,
            getter,
            setter,
        }
    }

    pub fn get(&self, entity: &E) -> Value {
        (self.getter)(entity)
    }

    pub fn set(&self, entity: &mut E, value: Value) -> Result<()> {
        (self.setter)(entity, value)
    }

    pub fn column_name(&self) -> &'static str {
        self.column.name
    }
}

impl<E> Clone for Field<E> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            column: self.column.clone(),
            getter: self.getter,
            setter: self.setter,
        }
    }
}

impl<E> fmt::Debug for Field<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// Convert `value` into the field slot's type.
pub fn assign<T: FromValue>(slot: &mut T, value: &Value) -> Result<()> {
    *slot = T::from_value(value)?;
    Ok(())
}

/// A struct persisted in one table.
pub trait Entity: Default + Clone + Send + Sync + 'static {
    /// Table name; for partitioned entities, the template table.
    const TABLE: &'static str;

    fn fields() -> &'static [Field<Self>];

    fn indexes() -> Vec<IndexDef> {
        Vec::new()
    }

    fn listener() -> Option<Arc<dyn ModelListener<Self>>> {
        None
    }

    fn partition() -> Option<MetaPartition<Self>> {
        None
    }

    /// Database used when a model is not given one explicitly.
    fn db() -> Option<DbConfig> {
        None
    }

    /// Forget field changes once a load completes.
    fn clear_changes_after_load() -> bool {
        false
    }

    /// DDL description built from the field table.
    fn create_table() -> CreateTable {
        let table = Self::fields()
            .iter()
            .fold(CreateTable::new(Self::TABLE), |t, f| t.with_column(f.column.to_column_def()));
        Self::indexes().into_iter().fold(table, CreateTable::with_index)
    }

    /// Build an entity from a result row.
    ///
    /// Columns match by column name, then by field name, ignoring case.
    /// Columns without a field are skipped.
    fn from_map(map: &DataMap) -> Result<Self> {
        let mut entity = Self::default();
        for field in Self::fields() {
            let value = map.get(field.column.name).or_else(|| map.get(field.name));
            if let Some(value) = value {
                field.set(&mut entity, value.clone())?;
            }
        }
        Ok(entity)
    }
}
