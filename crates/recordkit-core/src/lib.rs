//! Core types and traits for recordkit.
//!
//! This crate provides the foundations every other recordkit crate builds on:
//!
//! - [`Value`] and [`Row`] for data coming back from drivers
//! - [`DataMap`], the case-insensitive, ordered record used for query results
//! - [`Connection`] and [`DataSource`] for the driver boundary
//! - [`Cache`] and [`CacheKey`] for result caching
//! - [`Properties`] and [`DbProp`] for per-database configuration
//! - [`Error`] for everything that can go wrong

pub mod cache;
pub mod config;
pub mod connection;
pub mod data_map;
pub mod error;
pub mod row;
pub mod types;
pub mod value;

pub use cache::{Cache, CacheKey, CachedValue, MemoryCache};
pub use config::{DbProp, Properties, UnknownFieldPolicy};
pub use connection::{Connection, DataSource};
pub use data_map::{DataMap, FromDataMap};
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, FieldValidationError, QueryError,
    QueryErrorKind, Result, SchemaError, SchemaErrorKind, TransactionError, TransactionErrorKind,
    TypeError, ValidationError, ValidationErrorKind,
};
pub use row::{ColumnInfo, FromValue, Row};
pub use types::SqlType;
pub use value::{TIMESTAMP_FORMAT, Value, parse_datetime};
