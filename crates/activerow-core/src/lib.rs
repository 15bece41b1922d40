//! Core types and traits for activerow.
//!
//! This crate provides the foundations shared by every other layer:
//!
//! - `Value` and `Row` for data moving to and from the database
//! - `Driver` and `SqlDialect`, the seam to a concrete engine
//! - `EntitySchema` and `Registry`, the immutable description of record types
//! - `Error` and the validation error model
//! - `Outcome` and `Cx` re-exported from asupersync for cancel-correct operations

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Budget, Cx, Outcome, RegionId, TaskId};

pub mod dialect;
pub mod driver;
pub mod entity;
pub mod error;
pub mod introspect;
pub mod registry;
pub mod relationship;
pub mod row;
pub mod validate;
pub mod value;

pub use dialect::{Dialect, SqlDialect};
pub use driver::{BoxFuture, Driver, DriverFactory};
pub use entity::{
    AttributeDefinition, EntitySchema, EntitySchemaBuilder, PrimaryKeyStrategy,
    RelationshipBuilder, TranslationConfig, snake_case,
};
pub use error::{
    ConfigError, ConfigErrorKind, ConnectionError, ConnectionErrorKind, Error,
    FieldValidationError, PoolError, PoolErrorKind, QueryError, QueryErrorKind,
    RecordNotFoundError, Result, TransactionError, TransactionErrorKind, TypeError,
    ValidationError, ValidationErrorKind,
};
pub use introspect::{Column, Table, get_table_by_name, get_table_by_name_or_fail};
pub use registry::{Registry, RegistryBuilder};
pub use relationship::{
    ComparisonOp, RelationshipDefinition, RelationshipOptions, Scope, ScopeCondition,
};
pub use row::{ColumnInfo, FromValue, Row};
pub use validate::{AttributeValidator, CheckResult, CustomCheck, Validator};
pub use value::Value;

/// Unwrap an `Outcome::Ok`, returning any other variant from the
/// enclosing function (which must itself return an `Outcome`).
///
/// The error type is converted with `From`, like `?`.
#[macro_export]
macro_rules! try_outcome {
    ($expr:expr) => {
        match $expr {
            $crate::Outcome::Ok(value) => value,
            $crate::Outcome::Err(e) => return $crate::Outcome::Err(::core::convert::From::from(e)),
            $crate::Outcome::Cancelled(r) => return $crate::Outcome::Cancelled(r),
            $crate::Outcome::Panicked(p) => return $crate::Outcome::Panicked(p),
        }
    };
}

/// Lift a `Result` into an `Outcome`, returning early on error.
#[macro_export]
macro_rules! try_result {
    ($expr:expr) => {
        match $expr {
            Ok(value) => value,
            Err(e) => return $crate::Outcome::Err(::core::convert::From::from(e)),
        }
    };
}

/// Return `Outcome::Cancelled` from the enclosing function if `cx` has been
/// asked to cancel.
#[macro_export]
macro_rules! check_cancelled {
    ($cx:expr) => {
        if let Some(reason) = $cx.cancel_reason() {
            return $crate::Outcome::Cancelled(reason);
        }
    };
}
