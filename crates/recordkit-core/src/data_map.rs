//! Case-insensitive, insertion-ordered row map with lenient typed accessors.
//!
//! A `DataMap` is what a query yields for one row when no typed target is
//! requested. Keys keep the spelling reported by the database but are looked
//! up without regard to case. Accessors come in pairs: one returning `Option`
//! (missing key or NULL gives `None`) and one taking a default.
//!
//! Numeric accessors are lenient: floating values truncate toward zero when an
//! integer is requested, and any other value is parsed from its string form.
//! A value that cannot be parsed is an error, not a silent default.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDateTime;

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;

/// One result row keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataMap {
    entries: Vec<(String, Value)>,
    index: HashMap<String, usize>,
}

impl DataMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert or replace a value. Replacing keeps the original position and spelling.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        let key = key.into();
        let folded = key.to_lowercase();
        let value = value.into();
        if let Some(&i) = self.index.get(&folded) {
            return Some(std::mem::replace(&mut self.entries[i].1, value));
        }
        self.index.insert(folded, self.entries.len());
        self.entries.push((key, value));
        None
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index
            .get(&key.to_lowercase())
            .map(|&i| &self.entries[i].1)
    }

    /// Value at zero-based column position.
    pub fn get_at(&self, index: usize) -> Option<&Value> {
        self.entries.get(index).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(&key.to_lowercase())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        let i = self.index.remove(&key.to_lowercase())?;
        let (_, value) = self.entries.remove(i);
        for slot in self.index.values_mut() {
            if *slot > i {
                *slot -= 1;
            }
        }
        Some(value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Copy this row into a target type.
    pub fn as_type<T: FromDataMap>(&self) -> Result<T> {
        T::from_data_map(self)
    }

    // ---- strings -------------------------------------------------------

    pub fn get_string(&self, key: &str) -> Option<String> {
        string_of(self.get(key))
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    pub fn get_string_at(&self, index: usize) -> Option<String> {
        string_of(self.get_at(index))
    }

    pub fn get_string_at_or(&self, index: usize, default: &str) -> String {
        self.get_string_at(index)
            .unwrap_or_else(|| default.to_string())
    }

    // ---- booleans ------------------------------------------------------

    pub fn get_boolean(&self, key: &str) -> Option<bool> {
        boolean_of(self.get(key))
    }

    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        self.get_boolean(key).unwrap_or(default)
    }

    pub fn get_boolean_at(&self, index: usize) -> Option<bool> {
        boolean_of(self.get_at(index))
    }

    pub fn get_bool_at(&self, index: usize, default: bool) -> bool {
        self.get_boolean_at(index).unwrap_or(default)
    }

    // ---- integers ------------------------------------------------------

    pub fn get_integer(&self, key: &str) -> Result<Option<i32>> {
        integer_of(self.get(key), key)
    }

    pub fn get_int(&self, key: &str, default: i32) -> Result<i32> {
        Ok(self.get_integer(key)?.unwrap_or(default))
    }

    pub fn get_integer_at(&self, index: usize) -> Result<Option<i32>> {
        integer_of(self.get_at(index), &index.to_string())
    }

    pub fn get_int_at(&self, index: usize, default: i32) -> Result<i32> {
        Ok(self.get_integer_at(index)?.unwrap_or(default))
    }

    pub fn get_long(&self, key: &str) -> Result<Option<i64>> {
        long_of(self.get(key), key)
    }

    pub fn get_long_or(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self.get_long(key)?.unwrap_or(default))
    }

    pub fn get_long_at(&self, index: usize) -> Result<Option<i64>> {
        long_of(self.get_at(index), &index.to_string())
    }

    pub fn get_long_at_or(&self, index: usize, default: i64) -> Result<i64> {
        Ok(self.get_long_at(index)?.unwrap_or(default))
    }

    // ---- floating ------------------------------------------------------

    pub fn get_float(&self, key: &str) -> Result<Option<f32>> {
        match self.get(key) {
            Some(Value::Float(v)) => Ok(Some(*v)),
            other => parsed(other, key, "f32"),
        }
    }

    pub fn get_float_or(&self, key: &str, default: f32) -> Result<f32> {
        Ok(self.get_float(key)?.unwrap_or(default))
    }

    pub fn get_float_at(&self, index: usize) -> Result<Option<f32>> {
        match self.get_at(index) {
            Some(Value::Float(v)) => Ok(Some(*v)),
            other => parsed(other, &index.to_string(), "f32"),
        }
    }

    pub fn get_float_at_or(&self, index: usize, default: f32) -> Result<f32> {
        Ok(self.get_float_at(index)?.unwrap_or(default))
    }

    pub fn get_double(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            Some(Value::Double(v)) => Ok(Some(*v)),
            other => parsed(other, key, "f64"),
        }
    }

    pub fn get_double_or(&self, key: &str, default: f64) -> Result<f64> {
        Ok(self.get_double(key)?.unwrap_or(default))
    }

    pub fn get_double_at(&self, index: usize) -> Result<Option<f64>> {
        match self.get_at(index) {
            Some(Value::Double(v)) => Ok(Some(*v)),
            other => parsed(other, &index.to_string(), "f64"),
        }
    }

    pub fn get_double_at_or(&self, index: usize, default: f64) -> Result<f64> {
        Ok(self.get_double_at(index)?.unwrap_or(default))
    }

    // ---- dates ---------------------------------------------------------

    /// Read a date, auto-detecting the text layout.
    pub fn get_date(&self, key: &str) -> Result<Option<NaiveDateTime>> {
        self.get_date_fmt(key, None)
    }

    pub fn get_date_or(&self, key: &str, default: NaiveDateTime) -> Result<NaiveDateTime> {
        Ok(self.get_date(key)?.unwrap_or(default))
    }

    /// Read a date with an explicit chrono format for text values.
    pub fn get_date_fmt(&self, key: &str, format: Option<&str>) -> Result<Option<NaiveDateTime>> {
        match self.get(key) {
            Some(v) => v.as_datetime(format).map_err(|e| with_column(e, key)),
            None => Ok(None),
        }
    }

    pub fn get_date_at(&self, index: usize) -> Result<Option<NaiveDateTime>> {
        match self.get_at(index) {
            Some(v) => v.as_datetime(None),
            None => Ok(None),
        }
    }

    pub fn get_date_at_or(
        &self,
        index: usize,
        format: Option<&str>,
        default: NaiveDateTime,
    ) -> Result<NaiveDateTime> {
        match self.get_at(index) {
            Some(v) => Ok(v.as_datetime(format)?.unwrap_or(default)),
            None => Ok(default),
        }
    }
}

impl IntoIterator for DataMap {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for DataMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = DataMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

fn string_of(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.to_string()),
    }
}

fn boolean_of(value: Option<&Value>) -> Option<bool> {
    match value {
        None | Some(Value::Null) => None,
        Some(Value::Bool(b)) => Some(*b),
        Some(v) => Some(v.to_string().eq_ignore_ascii_case("true")),
    }
}

fn integer_of(value: Option<&Value>, column: &str) -> Result<Option<i32>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Int(v)) => Ok(Some(*v)),
        Some(Value::Double(v)) => Ok(Some(v.trunc() as i32)),
        Some(Value::Float(v)) => Ok(Some(v.trunc() as i32)),
        other => parsed(other, column, "i32"),
    }
}

fn long_of(value: Option<&Value>, column: &str) -> Result<Option<i64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::BigInt(v)) => Ok(Some(*v)),
        Some(Value::Int(v)) => Ok(Some(i64::from(*v))),
        Some(Value::Double(v)) => Ok(Some(v.trunc() as i64)),
        Some(Value::Float(v)) => Ok(Some(v.trunc() as i64)),
        Some(Value::Timestamp(ts)) => Ok(Some(ts.and_utc().timestamp_millis())),
        Some(v) if v.is_blank() => Ok(None),
        other => parsed(other, column, "i64"),
    }
}

fn parsed<T: FromStr>(
    value: Option<&Value>,
    column: &str,
    expected: &'static str,
) -> Result<Option<T>> {
    let Some(value) = value else {
        return Ok(None);
    };
    if value.is_null() {
        return Ok(None);
    }
    let text = value.to_string();
    text.parse::<T>().map(Some).map_err(|_| {
        Error::Type(TypeError {
            expected,
            actual: format!("'{}'", text),
            column: Some(column.to_string()),
            rust_type: Some(expected),
        })
    })
}

fn with_column(err: Error, column: &str) -> Error {
    match err {
        Error::Type(mut te) => {
            te.column = Some(column.to_string());
            Error::Type(te)
        }
        other => other,
    }
}

/// Conversion from one result row.
///
/// Scalar implementations read the first column, which is how count and
/// aggregate queries are consumed.
pub trait FromDataMap: Sized {
    fn from_data_map(map: &DataMap) -> Result<Self>;
}

impl FromDataMap for DataMap {
    fn from_data_map(map: &DataMap) -> Result<Self> {
        Ok(map.clone())
    }
}

macro_rules! first_column_from_data_map {
    ($($ty:ty),*) => {
        $(
            impl FromDataMap for $ty {
                fn from_data_map(map: &DataMap) -> Result<Self> {
                    let value = map.get_at(0).cloned().unwrap_or(Value::Null);
                    <$ty as crate::row::FromValue>::from_value(&value)
                }
            }
        )*
    };
}

first_column_from_data_map!(i32, i64, f64, bool, String, Value, NaiveDateTime);

#[cfg(test)]
mod tests {
    use super::*;

    fn epoch() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap()
    }

    fn sample() -> DataMap {
        let mut m = DataMap::new();
        m.insert("ID", 7_i64);
        m.insert("Score", 3.9_f64);
        m.insert("name", "alice");
        m.insert("flag", "TRUE");
        m.insert("created", "2024-05-06 07:08");
        m.insert("empty", "  ");
        m.insert("nothing", Value::Null);
        m
    }

    #[test]
    fn test_case_insensitive_lookup_and_order() {
        let m = sample();
        assert_eq!(m.get("id"), Some(&Value::BigInt(7)));
        assert_eq!(m.get("SCORE"), Some(&Value::Double(3.9)));
        assert_eq!(m.get_at(2), Some(&Value::from("alice")));
        assert_eq!(m.keys().next(), Some("ID"));
    }

    #[test]
    fn test_insert_replaces_in_place() {
        let mut m = sample();
        let old = m.insert("NAME", "bob");
        assert_eq!(old, Some(Value::from("alice")));
        assert_eq!(m.get_at(2), Some(&Value::from("bob")));
        assert_eq!(m.len(), 7);
    }

    #[test]
    fn test_remove_reindexes() {
        let mut m = sample();
        assert_eq!(m.remove("score"), Some(Value::Double(3.9)));
        assert_eq!(m.get("name"), Some(&Value::from("alice")));
        assert_eq!(m.get_at(1), Some(&Value::from("alice")));
        assert!(!m.contains_key("Score"));
    }

    #[test]
    fn test_get_int_default_and_truncation() {
        let m = sample();
        assert_eq!(m.get_int("n", 5).unwrap(), 5);
        assert_eq!(m.get_int("score", 0).unwrap(), 3);
        assert_eq!(m.get_int("id", 0).unwrap(), 7);
        assert_eq!(m.get_int("nothing", 9).unwrap(), 9);
        assert_eq!(m.get_int_at(1, 0).unwrap(), 3);
        assert!(m.get_int("name", 0).is_err());
    }

    #[test]
    fn test_negative_floats_truncate_toward_zero() {
        let mut m = DataMap::new();
        m.insert("v", -2.7_f64);
        assert_eq!(m.get_int("v", 0).unwrap(), -2);
        assert_eq!(m.get_long_or("v", 0).unwrap(), -2);
    }

    #[test]
    fn test_long_conversions() {
        let m = sample();
        assert_eq!(m.get_long("empty").unwrap(), None);
        assert_eq!(m.get_long_or("missing", 11).unwrap(), 11);

        let mut t = DataMap::new();
        t.insert("at", Value::Timestamp(epoch()));
        t.insert("text", "42");
        assert_eq!(t.get_long("at").unwrap(), Some(0));
        assert_eq!(t.get_long_at(1).unwrap(), Some(42));
    }

    #[test]
    fn test_float_and_double() {
        let m = sample();
        assert_eq!(m.get_double("score").unwrap(), Some(3.9));
        assert_eq!(m.get_double_or("missing", 1.5).unwrap(), 1.5);
        assert_eq!(m.get_float("id").unwrap(), Some(7.0));
        assert!(m.get_float("name").is_err());
    }

    #[test]
    fn test_bool_and_string() {
        let m = sample();
        assert!(m.get_bool("flag", false));
        assert!(!m.get_bool("name", true));
        assert!(m.get_bool("missing", true));

        let mut flags = DataMap::new();
        flags.insert("one", 1);
        flags.insert("upper", "TRUE");
        flags.insert("yes", "yes");
        assert!(!flags.get_bool("one", true));
        assert!(flags.get_bool("upper", false));
        assert_eq!(flags.get_boolean("yes"), Some(false));
        assert_eq!(m.get_string("id"), Some("7".to_string()));
        assert_eq!(m.get_string_or("nothing", "dflt"), "dflt");
        assert_eq!(m.get_string_at(2), Some("alice".to_string()));
    }

    #[test]
    fn test_dates() {
        let m = sample();
        let created = m.get_date("created").unwrap().unwrap();
        assert_eq!(created.to_string(), "2024-05-06 07:08:00");
        assert_eq!(m.get_date("missing").unwrap(), None);
        assert!(m.get_date("name").is_err());

        let fallback = epoch();
        assert_eq!(m.get_date_or("nothing", fallback).unwrap(), fallback);
    }

    #[test]
    fn test_scalar_from_data_map() {
        let mut m = DataMap::new();
        m.insert("COUNT(*)", 12_i64);
        assert_eq!(m.as_type::<i64>().unwrap(), 12);
        assert_eq!(m.as_type::<DataMap>().unwrap(), m);
    }
}
