//! Relationship-aware SQL query builder for activerow.
//!
//! `activerow-query` is the **query construction layer**. It turns entity
//! schemas from the [`Registry`](activerow_core::Registry) into SQL text plus
//! bound parameters, for any [`SqlDialect`](activerow_core::SqlDialect).
//!
//! # Role In The Architecture
//!
//! - **Expressions**: [`Expr`] builds WHERE/ON predicates; literals are bound.
//! - **Joins**: [`JoinSpec`] names relationship paths and [`JoinTracker`]
//!   aliases each distinct path once (`tasks__project__tasks`).
//! - **Statements**: [`Query`] for SELECT, plus [`InsertStatement`],
//!   [`UpdateStatement`] and [`DeleteStatement`].
//!
//! Nothing here touches a connection; the record layer executes the
//! statements through a pooled connection.
//!
//! ```ignore
//! let (sql, params) = Query::new(registry, "Task")?
//!     .joins(JoinSpec::new().path(&["project"]))
//!     .where_path(&["project"], "name", "Alpha")
//!     .order("name", OrderDirection::Asc)
//!     .to_sql(&*driver)?;
//! ```

pub mod clause;
pub mod dml;
pub mod expr;
pub mod join;
pub mod select;

#[cfg(test)]
mod testing;

pub use clause::{OrderBy, OrderDirection};
pub use dml::{DeleteStatement, InsertStatement, UpdateStatement};
pub use expr::{BinaryOp, Expr};
pub use join::{ALIAS_SEPARATOR, JoinSpec, JoinTracker, TrackedJoin};
pub use select::Query;
