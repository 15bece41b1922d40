//! activerow - relational records over pooled, scoped connections.
//!
//! activerow provides:
//!
//! - Entity schemas declared once, read and written by attribute name
//! - Records with dirty tracking, validation, relationships and translated
//!   attributes
//! - A query builder that joins relationship paths under stable aliases
//! - Connection pools bound to an explicit execution scope, with nested
//!   transactions mapped to savepoints
//!
//! # Quick Start
//!
//! ```ignore
//! use activerow::prelude::*;
//!
//! let registry = Registry::builder()
//!     .entity(
//!         EntitySchema::builder("Project", "projects")
//!             .attribute("name")
//!             .validates_presence("name")
//!             .has_many("tasks", "Task", |r| r.dependent_destroy())
//!             .build(),
//!     )
//!     .entity(
//!         EntitySchema::builder("Task", "tasks")
//!             .attribute("name")
//!             .belongs_to("project", "Project", |r| r)
//!             .build(),
//!     )
//!     .build()?;
//!
//! let configuration = Configuration::builder()
//!     .database(activerow::sqlite_database("default", "app.db"))
//!     .registry(registry)
//!     .build()?;
//!
//! async fn create(cx: &Cx, session: &Session) -> Outcome<Record, Error> {
//!     let mut task = try_result!(session.build("Task"));
//!     try_result!(task.set("name", "Write docs"));
//!     try_result!(try_result!(task.build_relationship("project")).set("name", "Docs"));
//!     try_outcome!(task.save(cx, session).await);
//!     Outcome::Ok(task)
//! }
//! ```
//!
//! # Layers
//!
//! - `activerow-core`: values, rows, errors, schemas, the driver seam
//! - `activerow-query`: expressions, join tracking, SELECT and DML builders
//! - `activerow-pool`: pools, connections, execution scopes, configuration
//! - `activerow-record`: records, sessions and finders
//! - `activerow-sqlite`: the bundled SQLite driver

use std::sync::Arc;

pub use activerow_core::{
    // asupersync re-exports
    Budget,
    Cx,
    Outcome,
    RegionId,
    TaskId,
    // Values and rows
    Row,
    Value,
    // Schemas
    AttributeDefinition,
    EntitySchema,
    EntitySchemaBuilder,
    PrimaryKeyStrategy,
    Registry,
    RelationshipBuilder,
    RelationshipDefinition,
    Scope,
    TranslationConfig,
    Validator,
    // Drivers
    Dialect,
    Driver,
    DriverFactory,
    SqlDialect,
    // Introspection
    Column,
    Table,
    get_table_by_name,
    get_table_by_name_or_fail,
    // Errors
    ConfigErrorKind,
    Error,
    RecordNotFoundError,
    Result,
    ValidationError,
    ValidationErrorKind,
    check_cancelled,
    try_outcome,
    try_result,
};

pub use activerow_query::{
    BinaryOp, DeleteStatement, Expr, InsertStatement, JoinSpec, JoinTracker, OrderBy,
    OrderDirection, Query, UpdateStatement,
};

pub use activerow_pool::{
    Configuration, ConfigurationBuilder, Connection, ConnectionPool, DatabaseIdentifier,
    ExecutionScope, PoolConfig, PoolStats,
};

pub use activerow_record::{InstanceRelationship, Record, RecordState, RelationshipValue, Session};

pub use activerow_sqlite::{SqliteConfig, SqliteConnection, SqliteFactory};

/// Database identifier backed by the SQLite file at `path`.
pub fn sqlite_database(name: impl Into<String>, path: impl Into<String>) -> DatabaseIdentifier {
    DatabaseIdentifier::new(name, Arc::new(SqliteFactory::new(SqliteConfig::file(path))))
}

/// Prelude module for convenient imports.
///
/// ```ignore
/// use activerow::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Configuration, Connection, Cx, DatabaseIdentifier, EntitySchema, Error, Expr,
        ExecutionScope, JoinSpec, OrderDirection, Outcome, PoolConfig, PrimaryKeyStrategy,
        Query, Record, Registry, RelationshipValue, Result, Scope, Session, Validator, Value,
        try_outcome, try_result,
    };
}
