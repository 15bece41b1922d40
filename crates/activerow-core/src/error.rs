//! Error types for activerow operations.

use crate::value::Value;
use std::fmt;

/// The primary error type for all activerow operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (connect, disconnect, missing session)
    Connection(ConnectionError),
    /// Query execution errors reported by the driver
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Transaction state errors
    Transaction(TransactionError),
    /// Pool errors
    Pool(PoolError),
    /// Configuration and usage errors (unknown relationship, missing table,
    /// read-only writes, ...). These are never retried.
    Config(ConfigError),
    /// Validation failures raised before a write
    Validation(ValidationError),
    /// Lookup by primary key matched no row
    RecordNotFound(RecordNotFoundError),
    /// I/O errors
    Io(std::io::Error),
    /// The scope's wall-clock deadline elapsed
    Timeout,
    /// Operation was cancelled via asupersync
    Cancelled,
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
    /// Authentication failed
    Authentication,
    /// Connection lost during operation
    Disconnected,
    /// No connection/session has been established yet
    NotConnected,
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
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Deadlock or busy database
    Deadlock,
    /// Cancelled
    Cancelled,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// Commit/rollback without an open transaction
    NotActive,
    /// A transaction was abandoned mid-flight and the connection is unusable
    Broken,
}

#[derive(Debug)]
pub struct PoolError {
    pub kind: PoolErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolErrorKind {
    /// Pool is closed
    Closed,
    /// The connection factory failed
    Spawn,
}

#[derive(Debug)]
pub struct ConfigError {
    pub kind: ConfigErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    /// Unknown relationship name on an entity
    UnknownRelationship,
    /// Unknown attribute name on an entity
    UnknownAttribute,
    /// Unknown entity name in the registry
    UnknownEntity,
    /// Table missing from the database
    TableNotFound,
    /// Column missing from a table
    ColumnNotFound,
    /// No scoped or global connection, or no such database identifier
    NotInitialized,
    /// Write attempted through a read-only database identifier
    ReadOnly,
    /// Operation on a destroyed or otherwise unusable record
    InvalidState,
    /// Malformed definition (join spec, schema, ...)
    Invalid,
}

/// Raised by find-by-primary-key when no row matches.
#[derive(Debug, Clone)]
pub struct RecordNotFoundError {
    pub entity: String,
    pub primary_key: String,
    pub value: Value,
}

/// Validation failures collected across every validator of a record.
#[derive(Debug, Clone, Default)]
pub struct ValidationError {
    /// Entity name of the failing record
    pub entity: Option<String>,
    /// Primary key of the failing record, when it has one
    pub record_id: Option<Value>,
    /// Violations in validator declaration order
    pub errors: Vec<FieldValidationError>,
}

/// A single violation on one attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldValidationError {
    /// The attribute that failed validation
    pub field: String,
    /// The kind of validation that failed
    pub kind: ValidationErrorKind,
    /// Full human-readable message, e.g. `Name can't be blank`
    pub message: String,
}

/// The type of validation constraint that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationErrorKind {
    /// Value is missing or blank
    Blank,
    /// Value already exists on another row
    Taken,
    /// String is shorter than minimum length
    TooShort,
    /// String is longer than maximum length
    TooLong,
    /// Value doesn't match the configured pattern
    Invalid,
    /// Custom validation failed
    Custom,
}

impl ValidationError {
    /// Create a new empty validation error container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a container for a specific record.
    pub fn for_record(entity: impl Into<String>, record_id: Option<Value>) -> Self {
        Self {
            entity: Some(entity.into()),
            record_id,
            errors: Vec::new(),
        }
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

    /// All violations recorded for one attribute.
    pub fn errors_for<'a>(
        &'a self,
        field: &'a str,
    ) -> impl Iterator<Item = &'a FieldValidationError> + 'a {
        self.errors.iter().filter(move |e| e.field == field)
    }

    /// Whether a violation of the given kind was recorded for `field`.
    pub fn has(&self, field: &str, kind: ValidationErrorKind) -> bool {
        self.errors_for(field).any(|e| e.kind == kind)
    }

    /// Human-readable messages in declaration order.
    pub fn full_messages(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.message.as_str()).collect()
    }

    /// Convert to Result, returning Ok(()) if no errors, Err(self) otherwise.
    pub fn into_result(self) -> std::result::Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl Error {
    /// Build a configuration error.
    pub fn config(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Error::Config(ConfigError {
            kind,
            message: message.into(),
        })
    }

    /// Is this a connection error that a reconnect can fix?
    ///
    /// Only a missing or dropped session qualifies; authentication and
    /// connect failures are surfaced as-is.
    pub fn is_reconnectable(&self) -> bool {
        matches!(
            self,
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::NotConnected | ConnectionErrorKind::Disconnected,
                ..
            })
        )
    }

    /// Is this a configuration/usage error?
    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config(_))
    }

    /// Kind of the configuration error, if this is one.
    pub fn config_kind(&self) -> Option<ConfigErrorKind> {
        match self {
            Error::Config(e) => Some(e.kind),
            _ => None,
        }
    }

    /// The validation error, if this is one.
    pub fn as_validation(&self) -> Option<&ValidationError> {
        match self {
            Error::Validation(e) => Some(e),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Pool(e) => write!(f, "Pool error: {}", e.message),
            Error::Config(e) => write!(f, "{}", e),
            Error::Validation(e) => write!(f, "{}", e),
            Error::RecordNotFound(e) => write!(f, "{}", e),
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::Cancelled => write!(f, "Operation cancelled"),
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
            Error::Validation(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for TransactionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for RecordNotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Couldn't find {} with '{}'={}",
            self.entity, self.primary_key, self.value
        )
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "validation passed");
        }
        write!(f, "{}", self.full_messages().join(", "))
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

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        Error::Pool(err)
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

impl From<RecordNotFoundError> for Error {
    fn from(err: RecordNotFoundError) -> Self {
        Error::RecordNotFound(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for activerow operations.
pub type Result<T> = std::result::Result<T, Error>;
