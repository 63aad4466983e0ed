//! Column type descriptors.

use std::fmt;

/// Declared SQL type of a column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SqlType {
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal { precision: u8, scale: u8 },
    Boolean,
    Char(u32),
    VarChar(u32),
    Text,
    Blob,
    Date,
    Time,
    DateTime,
    Timestamp,
    Json,
    /// Type name reported by the database that has no closer match.
    Custom(String),
}

impl SqlType {
    /// Generic SQL spelling; dialects may override.
    pub fn sql_name(&self) -> String {
        match self {
            SqlType::TinyInt => "TINYINT".to_string(),
            SqlType::SmallInt => "SMALLINT".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Real => "REAL".to_string(),
            SqlType::Double => "DOUBLE PRECISION".to_string(),
            SqlType::Decimal { precision, scale } => format!("DECIMAL({}, {})", precision, scale),
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Char(len) => format!("CHAR({})", len),
            SqlType::VarChar(len) => format!("VARCHAR({})", len),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Blob => "BLOB".to_string(),
            SqlType::Date => "DATE".to_string(),
            SqlType::Time => "TIME".to_string(),
            SqlType::DateTime => "DATETIME".to_string(),
            SqlType::Timestamp => "TIMESTAMP".to_string(),
            SqlType::Json => "JSON".to_string(),
            SqlType::Custom(name) => name.clone(),
        }
    }

    /// Map a declared type name (as returned by introspection) to a descriptor.
    ///
    /// Unknown names are kept verbatim as [`SqlType::Custom`].
    pub fn from_declared(declared: &str) -> SqlType {
        let upper = declared.trim().to_ascii_uppercase();
        let (base, args) = match upper.find('(') {
            Some(open) => {
                let close = upper.rfind(')').unwrap_or(upper.len());
                (upper[..open].trim(), Some(&upper[open + 1..close.max(open + 1)]))
            }
            None => (upper.as_str(), None),
        };
        let first_arg = || {
            args.and_then(|a| a.split(',').next())
                .and_then(|n| n.trim().parse::<u32>().ok())
        };

        match base {
            "TINYINT" => SqlType::TinyInt,
            "SMALLINT" | "INT2" => SqlType::SmallInt,
            "INT" | "INTEGER" | "INT4" | "MEDIUMINT" | "SERIAL" => SqlType::Integer,
            "BIGINT" | "INT8" | "BIGSERIAL" => SqlType::BigInt,
            "REAL" | "FLOAT" | "FLOAT4" => SqlType::Real,
            "DOUBLE" | "DOUBLE PRECISION" | "FLOAT8" => SqlType::Double,
            "DECIMAL" | "NUMERIC" => {
                let mut parts = args
                    .unwrap_or("")
                    .split(',')
                    .map(|n| n.trim().parse::<u8>().ok());
                SqlType::Decimal {
                    precision: parts.next().flatten().unwrap_or(10),
                    scale: parts.next().flatten().unwrap_or(0),
                }
            }
            "BOOLEAN" | "BOOL" | "BIT" => SqlType::Boolean,
            "CHAR" | "CHARACTER" => SqlType::Char(first_arg().unwrap_or(1)),
            "VARCHAR" | "CHARACTER VARYING" | "NVARCHAR" => match first_arg() {
                Some(len) => SqlType::VarChar(len),
                None => SqlType::Text,
            },
            "TEXT" | "CLOB" | "LONGTEXT" | "MEDIUMTEXT" => SqlType::Text,
            "BLOB" | "BYTEA" | "LONGBLOB" | "MEDIUMBLOB" | "VARBINARY" | "BINARY" => SqlType::Blob,
            "DATE" => SqlType::Date,
            "TIME" => SqlType::Time,
            "DATETIME" => SqlType::DateTime,
            "TIMESTAMP" | "TIMESTAMPTZ" | "TIMESTAMP WITHOUT TIME ZONE" => SqlType::Timestamp,
            "JSON" | "JSONB" => SqlType::Json,
            _ => SqlType::Custom(declared.trim().to_string()),
        }
    }

    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt
                | SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Real
                | SqlType::Double
                | SqlType::Decimal { .. }
        )
    }

    pub const fn is_text(&self) -> bool {
        matches!(self, SqlType::Char(_) | SqlType::VarChar(_) | SqlType::Text)
    }

    pub const fn is_temporal(&self) -> bool {
        matches!(
            self,
            SqlType::Date | SqlType::Time | SqlType::DateTime | SqlType::Timestamp
        )
    }

    /// Large-object types skipped by blob-excluding selects.
    pub const fn is_large_object(&self) -> bool {
        matches!(self, SqlType::Blob | SqlType::Text)
    }

    /// Declared length for sized character types.
    pub const fn length(&self) -> Option<u32> {
        match self {
            SqlType::Char(n) | SqlType::VarChar(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_declared() {
        assert_eq!(SqlType::from_declared("int"), SqlType::Integer);
        assert_eq!(SqlType::from_declared("VARCHAR(64)"), SqlType::VarChar(64));
        assert_eq!(SqlType::from_declared("varchar"), SqlType::Text);
        assert_eq!(
            SqlType::from_declared("numeric(12, 2)"),
            SqlType::Decimal { precision: 12, scale: 2 }
        );
        assert_eq!(SqlType::from_declared("bytea"), SqlType::Blob);
        assert_eq!(
            SqlType::from_declared("geometry"),
            SqlType::Custom("geometry".to_string())
        );
    }

    #[test]
    fn test_classification() {
        assert!(SqlType::BigInt.is_numeric());
        assert!(SqlType::VarChar(4).is_text());
        assert!(SqlType::Timestamp.is_temporal());
        assert!(SqlType::Blob.is_large_object());
        assert_eq!(SqlType::Char(3).length(), Some(3));
        assert_eq!(SqlType::Integer.length(), None);
        assert_eq!(SqlType::VarChar(10).to_string(), "VARCHAR(10)");
    }
}
