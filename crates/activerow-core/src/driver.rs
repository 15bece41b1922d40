//! Driver capability interface.
//!
//! A driver is the dialect-specific backend for one database engine: it runs
//! SQL, quotes identifiers and exposes the low-level transaction primitives.
//! Everything above this layer (pool, query builder, records) talks to a
//! driver through `dyn Driver`, so the trait is object-safe and returns
//! boxed futures.
//!
//! Futures returned by a driver borrow only the driver itself. Arguments such
//! as the SQL text are consumed before the future is returned, which lets a
//! driver execute synchronously (SQLite) or copy what it needs into an owned
//! request (network drivers).

use crate::dialect::SqlDialect;
use crate::introspect::Table;
use crate::{Cx, Error, Outcome, Row, Value};
use std::future::Future;
use std::pin::Pin;

/// Boxed, sendable future used at the object-safe driver seam.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A connected database session.
pub trait Driver: SqlDialect {
    /// Short engine name used in logs (e.g. `"sqlite"`).
    fn name(&self) -> &'static str;

    /// Run a statement that returns rows.
    fn query(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> BoxFuture<'_, Outcome<Vec<Row>, Error>>;

    /// Run a statement and return the number of affected rows.
    fn execute(&self, cx: &Cx, sql: &str, params: &[Value]) -> BoxFuture<'_, Outcome<u64, Error>>;

    /// Run an INSERT and return the generated key, if the engine reports one.
    fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> BoxFuture<'_, Outcome<Option<Value>, Error>>;

    /// Open a transaction.
    fn start_transaction(&self, cx: &Cx) -> BoxFuture<'_, Outcome<(), Error>> {
        discard_count(self.execute(cx, "BEGIN", &[]))
    }

    /// Commit the open transaction.
    fn commit(&self, cx: &Cx) -> BoxFuture<'_, Outcome<(), Error>> {
        discard_count(self.execute(cx, "COMMIT", &[]))
    }

    /// Roll back the open transaction.
    fn rollback(&self, cx: &Cx) -> BoxFuture<'_, Outcome<(), Error>> {
        discard_count(self.execute(cx, "ROLLBACK", &[]))
    }

    /// Create a named savepoint inside the open transaction.
    fn savepoint(&self, cx: &Cx, name: &str) -> BoxFuture<'_, Outcome<(), Error>> {
        let sql = format!("SAVEPOINT {}", self.quote_identifier(name));
        discard_count(self.execute(cx, &sql, &[]))
    }

    /// Roll back to a named savepoint.
    fn rollback_to_savepoint(&self, cx: &Cx, name: &str) -> BoxFuture<'_, Outcome<(), Error>> {
        let sql = format!("ROLLBACK TO SAVEPOINT {}", self.quote_identifier(name));
        discard_count(self.execute(cx, &sql, &[]))
    }

    /// Release (forget) a named savepoint.
    fn release_savepoint(&self, cx: &Cx, name: &str) -> BoxFuture<'_, Outcome<(), Error>> {
        let sql = format!("RELEASE SAVEPOINT {}", self.quote_identifier(name));
        discard_count(self.execute(cx, &sql, &[]))
    }

    /// Introspect the user tables of the database.
    fn tables(&self, cx: &Cx) -> BoxFuture<'_, Outcome<Vec<Table>, Error>>;

    /// Whether the engine can generate UUID primary keys server-side.
    ///
    /// When `false`, records generate UUID keys client-side before insert.
    fn supports_default_primary_key_uuid(&self) -> bool {
        false
    }

    /// Close the session. Further calls fail with a connection error.
    fn close(&self, cx: &Cx) -> BoxFuture<'_, Outcome<(), Error>>;
}

/// Creates drivers for a connection pool.
pub trait DriverFactory: Send + Sync {
    /// Open a new driver session.
    fn connect(&self, cx: &Cx) -> BoxFuture<'_, Outcome<Box<dyn Driver>, Error>>;
}

fn discard_count(fut: BoxFuture<'_, Outcome<u64, Error>>) -> BoxFuture<'_, Outcome<(), Error>> {
    Box::pin(async move {
        match fut.await {
            Outcome::Ok(_) => Outcome::Ok(()),
            Outcome::Err(e) => Outcome::Err(e),
            Outcome::Cancelled(r) => Outcome::Cancelled(r),
            Outcome::Panicked(p) => Outcome::Panicked(p),
        }
    })
}
