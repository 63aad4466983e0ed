//! Error types for recordkit operations.

use std::fmt;

/// Frame drawn around the rendered SQL in query error messages.
const SQL_RULE: &str =
    "========================================================================";

/// The primary error type for all recordkit operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (open, close, lost)
    Connection(ConnectionError),
    /// Query execution errors, carrying the rendered SQL when known
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Transaction errors
    Transaction(TransactionError),
    /// Table creation and introspection errors
    Schema(SchemaError),
    /// Configuration errors (missing db, unknown history db, readonly model)
    Config(ConfigError),
    /// Validation errors
    Validation(ValidationError),
    /// I/O errors
    Io(std::io::Error),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to establish connection
    Connect,
    /// Connection lost or already closed
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Parameter count or type could not be bound
    Binding,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Database busy or locked
    Busy,
    /// Interrupted
    Cancelled,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
    pub rust_type: Option<&'static str>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// Already committed or rolled back
    Finished,
    /// BEGIN issued while a transaction is open
    AlreadyActive,
    /// COMMIT or ROLLBACK without a transaction
    NotActive,
}

#[derive(Debug)]
pub struct SchemaError {
    pub kind: SchemaErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaErrorKind {
    /// Table not found during introspection
    TableNotFound,
    /// CREATE TABLE failed
    CreateFailed,
    /// Invalid table description
    Invalid,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConfigError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }
}

/// Validation error for field-level and model-level validation.
#[derive(Debug, Clone, Default)]
pub struct ValidationError {
    /// The errors grouped by field name (or "_model" for model-level)
    pub errors: Vec<FieldValidationError>,
}

/// A single validation error for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidationError {
    /// The field name that failed validation
    pub field: String,
    /// The kind of validation that failed
    pub kind: ValidationErrorKind,
    /// Human-readable error message
    pub message: String,
}

/// The type of validation constraint that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Required field is missing/null
    Required,
    /// String is longer than the column length
    MaxLength,
    /// Custom validation failed
    Custom,
}

impl ValidationError {
    /// Create a new empty validation error container.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Check if there are any validation errors.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add a field validation error.
    pub fn add(
        &mut self,
        field: impl Into<String>,
        kind: ValidationErrorKind,
        message: impl Into<String>,
    ) {
        self.errors.push(FieldValidationError {
            field: field.into(),
            kind,
            message: message.into(),
        });
    }

    /// Add a required-field error.
    pub fn add_required(&mut self, field: impl Into<String>) {
        let field = field.into();
        let message = format!("{} can not be null", field);
        self.add(field, ValidationErrorKind::Required, message);
    }

    /// Add a max-length error.
    pub fn add_max_length(&mut self, field: impl Into<String>, max: usize, actual: usize) {
        let field = field.into();
        let message = format!("{} length {} exceeds the max length {}", field, actual, max);
        self.add(field, ValidationErrorKind::MaxLength, message);
    }

    /// Convert into a result: `Ok(())` when empty.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl Error {
    /// Build a query error that is not tied to rendered SQL yet.
    pub fn query(kind: QueryErrorKind, message: impl Into<String>) -> Self {
        Error::Query(QueryError {
            kind,
            sql: None,
            message: message.into(),
            source: None,
        })
    }

    /// Shortcut for a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(ConfigError::new(message))
    }

    /// Attach the rendered SQL to a query error.
    ///
    /// Errors of other kinds are wrapped into a query error whose source is the original.
    #[must_use]
    pub fn with_sql(self, sql: impl Into<String>) -> Self {
        match self {
            Error::Query(mut q) => {
                q.sql = Some(sql.into());
                Error::Query(q)
            }
            other => Error::Query(QueryError {
                kind: QueryErrorKind::Database,
                sql: Some(sql.into()),
                message: other.to_string(),
                source: Some(Box::new(other)),
            }),
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Kind of a query error, if this is one.
    pub fn query_kind(&self) -> Option<QueryErrorKind> {
        match self {
            Error::Query(q) => Some(q.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "{}", e),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Schema(e) => write!(f, "Schema error: {}", e.message),
            Error::Config(e) => write!(f, "{}", e.message),
            Error::Validation(e) => write!(f, "Validation error: {}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Schema(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sql {
            Some(sql) => write!(
                f,
                "SQL ERROR: {}\n{}\n{}\n{}",
                self.message, SQL_RULE, sql, SQL_RULE
            ),
            None => write!(f, "{}", self.message),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            write!(f, "validation passed")
        } else if self.errors.len() == 1 {
            let err = &self.errors[0];
            write!(f, "validation error on '{}': {}", err.field, err.message)
        } else {
            writeln!(f, "validation errors:")?;
            for err in &self.errors {
                writeln!(f, "  - {}: {}", err.field, err.message)?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<SchemaError> for Error {
    fn from(err: SchemaError) -> Self {
        Error::Schema(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for recordkit operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_error_renders_sql_frame() {
        let err = Error::query(QueryErrorKind::Constraint, "UNIQUE constraint failed: t.id")
            .with_sql("INSERT INTO t(id) VALUES(1)");

        let text = err.to_string();
        assert!(text.starts_with("SQL ERROR: UNIQUE constraint failed"));
        assert!(text.contains(SQL_RULE));
        assert!(text.contains("INSERT INTO t(id) VALUES(1)"));
        assert_eq!(err.sql(), Some("INSERT INTO t(id) VALUES(1)"));
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Constraint));
    }

    #[test]
    fn with_sql_wraps_foreign_errors() {
        let err = Error::Custom("boom".to_string()).with_sql("SELECT 1");
        assert_eq!(err.query_kind(), Some(QueryErrorKind::Database));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn validation_collects_messages() {
        let mut v = ValidationError::new();
        assert!(v.clone().into_result().is_ok());

        v.add_required("name");
        v.add_max_length("title", 8, 12);
        assert_eq!(v.errors.len(), 2);
        assert_eq!(v.errors[0].kind, ValidationErrorKind::Required);
        assert!(v.to_string().contains("title length 12 exceeds the max length 8"));
        assert!(matches!(v.into_result(), Err(Error::Validation(_))));
    }

    #[test]
    fn config_error_message_is_verbatim() {
        let err = Error::config("Query must use db!");
        assert_eq!(err.to_string(), "Query must use db!");
    }
}
