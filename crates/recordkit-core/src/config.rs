//! Database properties.
//!
//! Every database carries a flat string property map. A property may be
//! overridden for one table by suffixing its key with `.<table>`, e.g.
//! `auto.create_time.orders`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Known property keys with their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbProp {
    /// Log every executed statement with its parameters substituted.
    SqlDebug,
    /// Maximum number of result sets read from one multi-statement query.
    MultiResultSetDepth,
    /// Table name patterns (`%` wildcard, separated by `,` `;` `|`) that keep history.
    HistoryTables,
    /// Name of the database that receives history rows; defaults to the origin db.
    HistoryDb,
    /// Prefix of history table names.
    HistoryTablePrefix,
    /// Prefix of the audit columns in history tables.
    HistoryColumnPrefix,
    AutoCreateTime,
    AutoCreateBy,
    AutoUpdateTime,
    AutoUpdateBy,
    /// What `Model::set` does with a field name the model does not have.
    UnknownField,
    /// Column used by versioned updates.
    VersionName,
    /// Fail mutating operations whose model does not validate.
    Validate,
}

impl DbProp {
    pub const fn key(self) -> &'static str {
        match self {
            DbProp::SqlDebug => "sql.debug",
            DbProp::MultiResultSetDepth => "multi.resultset.depth",
            DbProp::HistoryTables => "history.tables",
            DbProp::HistoryDb => "history.db",
            DbProp::HistoryTablePrefix => "history.prefix.table",
            DbProp::HistoryColumnPrefix => "history.prefix.column",
            DbProp::AutoCreateTime => "auto.create_time",
            DbProp::AutoCreateBy => "auto.create_by",
            DbProp::AutoUpdateTime => "auto.update_time",
            DbProp::AutoUpdateBy => "auto.update_by",
            DbProp::UnknownField => "set.unknown_field",
            DbProp::VersionName => "version.name",
            DbProp::Validate => "validate",
        }
    }

    pub const fn default_value(self) -> Option<&'static str> {
        match self {
            DbProp::SqlDebug | DbProp::Validate => Some("false"),
            DbProp::MultiResultSetDepth => Some("100"),
            DbProp::HistoryTables | DbProp::HistoryDb => None,
            DbProp::HistoryTablePrefix | DbProp::HistoryColumnPrefix => Some("history_"),
            DbProp::AutoCreateTime => Some("create_time"),
            DbProp::AutoCreateBy => Some("create_by"),
            DbProp::AutoUpdateTime => Some("update_time"),
            DbProp::AutoUpdateBy => Some("update_by"),
            DbProp::UnknownField => Some("ignore"),
            DbProp::VersionName => Some("version"),
        }
    }
}

/// Policy for `set(name, value)` when `name` is not a field of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFieldPolicy {
    /// Skip the write silently.
    #[default]
    Ignore,
    /// Fail with a configuration error.
    Reject,
}

impl FromStr for UnknownFieldPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" | "false" => Ok(UnknownFieldPolicy::Ignore),
            "reject" | "throw" | "true" => Ok(UnknownFieldPolicy::Reject),
            other => Err(Error::config(format!(
                "Invalid value for {}: {}",
                DbProp::UnknownField.key(),
                other
            ))),
        }
    }
}

/// String properties with table-scoped overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON object of string values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw lookup without defaults.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Configured value of `prop`, else its default.
    pub fn value(&self, prop: DbProp) -> Option<String> {
        self.get(prop.key())
            .map(str::to_string)
            .or_else(|| prop.default_value().map(str::to_string))
    }

    /// Table override of `prop`, else the db-wide value, else the default.
    pub fn table_value(&self, prop: DbProp, table: &str) -> Option<String> {
        let scoped = format!("{}.{}", prop.key(), table);
        self.get(&scoped)
            .map(str::to_string)
            .or_else(|| self.value(prop))
    }

    pub fn bool_value(&self, prop: DbProp) -> bool {
        self.value(prop)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
    }

    pub fn usize_value(&self, prop: DbProp) -> Option<usize> {
        self.value(prop).and_then(|v| v.trim().parse().ok())
    }

    pub fn unknown_field_policy(&self, table: &str) -> Result<UnknownFieldPolicy> {
        self.table_value(DbProp::UnknownField, table)
            .map_or(Ok(UnknownFieldPolicy::default()), |v| v.parse())
    }
}

impl fmt::Display for Properties {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.values {
            writeln!(f, "{}={}", k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_apply() {
        let p = Properties::new();
        assert_eq!(p.value(DbProp::HistoryTablePrefix).as_deref(), Some("history_"));
        assert_eq!(p.usize_value(DbProp::MultiResultSetDepth), Some(100));
        assert_eq!(p.value(DbProp::HistoryTables), None);
        assert!(!p.bool_value(DbProp::SqlDebug));
    }

    #[test]
    fn test_table_override_wins() {
        let p = Properties::new()
            .with("auto.create_time", "created_at")
            .with("auto.create_time.orders", "ordered_at");
        assert_eq!(
            p.table_value(DbProp::AutoCreateTime, "orders").as_deref(),
            Some("ordered_at")
        );
        assert_eq!(
            p.table_value(DbProp::AutoCreateTime, "users").as_deref(),
            Some("created_at")
        );
    }

    #[test]
    fn test_unknown_field_policy() {
        let p = Properties::new().with("set.unknown_field.strict_t", "reject");
        assert_eq!(p.unknown_field_policy("loose_t").unwrap(), UnknownFieldPolicy::Ignore);
        assert_eq!(p.unknown_field_policy("strict_t").unwrap(), UnknownFieldPolicy::Reject);

        let bad = Properties::new().with("set.unknown_field", "maybe");
        assert!(bad.unknown_field_policy("t").is_err());
    }

    #[test]
    fn test_from_json() {
        let p = Properties::from_json_str(r#"{"sql.debug":"TRUE","history.tables":"t_%"}"#).unwrap();
        assert!(p.bool_value(DbProp::SqlDebug));
        assert_eq!(p.get("history.tables"), Some("t_%"));
        assert!(Properties::from_json_str("[1]").is_err());
    }
}
