//! Dynamic SQL values.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{Error, TypeError};

/// Canonical text form used when timestamps are bound as text or rendered into SQL.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A dynamically-typed SQL value.
///
/// This enum represents all possible SQL values and is used
/// for parameter binding and result fetching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,

    /// Boolean value
    Bool(bool),

    /// 32-bit signed integer
    Int(i32),

    /// 64-bit signed integer
    BigInt(i64),

    /// 32-bit floating point
    Float(f32),

    /// 64-bit floating point
    Double(f64),

    /// Arbitrary precision decimal (stored as string)
    Decimal(String),

    /// Text string
    Text(String),

    /// Binary data
    Bytes(Vec<u8>),

    /// Calendar date
    Date(NaiveDate),

    /// Date and time without zone
    Timestamp(NaiveDateTime),

    /// JSON value
    Json(serde_json::Value),

    /// A collection argument; flattened by `Query::add`
    Array(Vec<Value>),
}

impl Value {
    /// The current local time truncated to whole seconds.
    pub fn now() -> Self {
        let now = chrono::Local::now().naive_local();
        Value::Timestamp(now.with_nanosecond(0).unwrap_or(now))
    }

    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// NULL, or text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Bool(_) => "BOOLEAN",
            Value::Int(_) => "INTEGER",
            Value::BigInt(_) => "BIGINT",
            Value::Float(_) => "REAL",
            Value::Double(_) => "DOUBLE",
            Value::Decimal(_) => "DECIMAL",
            Value::Text(_) => "TEXT",
            Value::Bytes(_) => "BLOB",
            Value::Date(_) => "DATE",
            Value::Timestamp(_) => "TIMESTAMP",
            Value::Json(_) => "JSON",
            Value::Array(_) => "ARRAY",
        }
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int(v) => Some(*v != 0),
            Value::BigInt(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1 } else { 0 }),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(f64::from(*v)),
            Value::Double(v) => Some(*v),
            Value::Int(v) => Some(f64::from(*v)),
            Value::BigInt(v) => Some(*v as f64),
            Value::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            Value::Text(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Interpret this value as a point in time.
    ///
    /// Text is parsed with `format` when given, otherwise with [`parse_datetime`].
    /// Integers are epoch milliseconds.
    pub fn as_datetime(&self, format: Option<&str>) -> crate::Result<Option<NaiveDateTime>> {
        match self {
            Value::Null => Ok(None),
            Value::Timestamp(ts) => Ok(Some(*ts)),
            Value::Date(d) => Ok(d.and_hms_opt(0, 0, 0)),
            Value::Int(_) | Value::BigInt(_) => {
                let millis = self.as_i64().unwrap_or_default();
                Ok(chrono::DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc()))
            }
            Value::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                let parsed = match format {
                    Some(fmt) => NaiveDateTime::parse_from_str(s, fmt).ok().or_else(|| {
                        NaiveDate::parse_from_str(s, fmt)
                            .ok()
                            .and_then(|d| d.and_hms_opt(0, 0, 0))
                    }),
                    None => parse_datetime(s),
                };
                parsed.map(Some).ok_or_else(|| {
                    Error::Type(TypeError {
                        expected: "date time",
                        actual: format!("unparseable text '{}'", s),
                        column: None,
                        rust_type: Some("NaiveDateTime"),
                    })
                })
            }
            other => Err(Error::Type(TypeError {
                expected: "date time",
                actual: other.type_name().to_string(),
                column: None,
                rust_type: Some("NaiveDateTime"),
            })),
        }
    }

    /// Flatten collection values into their elements, in order.
    pub fn flatten_into(self, out: &mut Vec<Value>) {
        match self {
            Value::Array(items) => out.extend(items),
            other => out.push(other),
        }
    }
}

/// Parse text in one of the layouts `yyyy-MM-dd`, `yyyy-MM-dd HH`, `yyyy-MM-dd HH:mm`,
/// `yyyy-MM-dd HH:mm:ss` (optionally with fractional seconds or a `T` separator).
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    match s.len() {
        10 => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        13 => {
            let (date, hour) = s.split_at(10);
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            let hour: u32 = hour.trim().parse().ok()?;
            date.and_hms_opt(hour, 0, 0)
        }
        16 => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M"))
            .ok(),
        _ => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
            .ok(),
    }
}

impl fmt::Display for Value {
    /// The string form used for cache keys and lenient parsing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Decimal(s) | Value::Text(s) => write!(f, "{}", s),
            Value::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            Value::Json(v) => write!(f, "{}", v),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Int(i32::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::BigInt(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        Value::Json(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Array(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_detection() {
        assert!(Value::Null.is_blank());
        assert!(Value::Text("   ".to_string()).is_blank());
        assert!(!Value::Text(" v ".to_string()).is_blank());
        assert!(!Value::Int(0).is_blank());
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(Value::Null.to_string(), "null");
        assert_eq!(Value::Int(7).to_string(), "7");
        assert_eq!(Value::Double(3.5).to_string(), "3.5");
        assert_eq!(Value::Bytes(vec![0xde, 0xad]).to_string(), "dead");
        let ts = parse_datetime("2024-02-03 04:05:06").unwrap();
        assert_eq!(Value::Timestamp(ts).to_string(), "2024-02-03 04:05:06");
        assert_eq!(
            Value::Array(vec![Value::Int(1), Value::from("a")]).to_string(),
            "[1, a]"
        );
    }

    #[test]
    fn test_parse_datetime_layouts() {
        let day = parse_datetime("2024-02-03").unwrap();
        assert_eq!(day.format(TIMESTAMP_FORMAT).to_string(), "2024-02-03 00:00:00");

        let hour = parse_datetime("2024-02-03 17").unwrap();
        assert_eq!(hour.format(TIMESTAMP_FORMAT).to_string(), "2024-02-03 17:00:00");

        let minute = parse_datetime("2024-02-03 17:45").unwrap();
        assert_eq!(minute.format(TIMESTAMP_FORMAT).to_string(), "2024-02-03 17:45:00");

        let second = parse_datetime("2024-02-03 17:45:09").unwrap();
        assert_eq!(second.format(TIMESTAMP_FORMAT).to_string(), "2024-02-03 17:45:09");

        assert!(parse_datetime("yesterday").is_none());
    }

    #[test]
    fn test_as_datetime_sources() {
        let v = Value::BigInt(0);
        let epoch = v.as_datetime(None).unwrap().unwrap();
        assert_eq!(epoch.format(TIMESTAMP_FORMAT).to_string(), "1970-01-01 00:00:00");

        let custom = Value::from("03/02/2024")
            .as_datetime(Some("%d/%m/%Y"))
            .unwrap()
            .unwrap();
        assert_eq!(custom.format("%Y-%m-%d").to_string(), "2024-02-03");

        assert_eq!(Value::from("  ").as_datetime(None).unwrap(), None);
        assert!(Value::from("not a date").as_datetime(None).is_err());
        assert!(Value::Bool(true).as_datetime(None).is_err());
    }

    #[test]
    fn test_flatten_into() {
        let mut out = Vec::new();
        Value::Array(vec![Value::Int(1), Value::Int(2)]).flatten_into(&mut out);
        Value::Int(3).flatten_into(&mut out);
        assert_eq!(out, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::Text("x".to_string()));
    }
}
