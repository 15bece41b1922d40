//! Pooled connections and nested transactions.
//!
//! A [`Connection`] owns one driver session plus the bookkeeping the pool and
//! the transaction machinery need. Every driver round trip goes through
//! [`Connection::round_trip`], which checks cancellation and the scope
//! deadline first and re-issues the call once after a reconnect when the
//! session was lost outside a transaction.

use activerow_core::{
    BoxFuture, ConfigErrorKind, Cx, Driver, DriverFactory, Error, Outcome, Row, Table, Value,
    check_cancelled, get_table_by_name_or_fail, try_outcome, try_result,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

/// A live driver session owned by a [`ConnectionPool`](crate::ConnectionPool).
pub struct Connection {
    id: u64,
    database: String,
    factory: Arc<dyn DriverFactory>,
    driver: RwLock<Arc<dyn Driver>>,
    read_only: bool,
    /// Number of open transaction levels (0 = autocommit)
    depth: AtomicUsize,
    broken: AtomicBool,
    deadline: Mutex<Option<Instant>>,
}

impl Connection {
    pub(crate) fn new(
        id: u64,
        database: impl Into<String>,
        factory: Arc<dyn DriverFactory>,
        driver: Box<dyn Driver>,
        read_only: bool,
    ) -> Self {
        Self {
            id,
            database: database.into(),
            factory,
            driver: RwLock::new(Arc::from(driver)),
            read_only,
            depth: AtomicUsize::new(0),
            broken: AtomicBool::new(false),
            deadline: Mutex::new(None),
        }
    }

    /// Pool-unique connection id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Database identifier of the owning pool.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// The current driver session. Used for quoting and placeholders.
    pub fn driver(&self) -> Arc<dyn Driver> {
        Arc::clone(&self.driver.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Whether writes are rejected.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Number of open transaction levels.
    pub fn transaction_depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Whether a transaction is open.
    pub fn in_transaction(&self) -> bool {
        self.transaction_depth() > 0
    }

    /// Whether a transaction was abandoned mid-flight. Broken connections
    /// are discarded on checkin.
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    /// Deadline of the scope currently holding this connection.
    pub fn deadline(&self) -> Option<Instant> {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_deadline(&self, deadline: Option<Instant>) {
        *self.deadline.lock().unwrap_or_else(PoisonError::into_inner) = deadline;
    }

    fn check_deadline(&self) -> Result<(), Error> {
        match self.deadline() {
            Some(deadline) if Instant::now() >= deadline => {
                tracing::debug!(connection = self.id, database = %self.database, "Scope deadline elapsed");
                Err(Error::Timeout)
            }
            _ => Ok(()),
        }
    }

    fn check_writable(&self, sql: &str) -> Result<(), Error> {
        if self.read_only {
            return Err(Error::config(
                ConfigErrorKind::ReadOnly,
                format!(
                    "Database \"{}\" is read-only; refusing to run: {}",
                    self.database, sql
                ),
            ));
        }
        Ok(())
    }

    async fn reconnect(&self, cx: &Cx) -> Outcome<Arc<dyn Driver>, Error> {
        let fresh: Arc<dyn Driver> = Arc::from(try_outcome!(self.factory.connect(cx).await));
        *self.driver.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&fresh);
        tracing::debug!(connection = self.id, database = %self.database, "Reconnected");
        Outcome::Ok(fresh)
    }

    /// Run one driver call with cancellation, deadline and reconnect handling.
    async fn round_trip<T, F>(&self, cx: &Cx, call: F) -> Outcome<T, Error>
    where
        F: for<'d> Fn(&'d dyn Driver) -> BoxFuture<'d, Outcome<T, Error>>,
    {
        check_cancelled!(cx);
        try_result!(self.check_deadline());

        let driver = self.driver();
        match call(&*driver).await {
            Outcome::Err(e) if e.is_reconnectable() && !self.in_transaction() => {
                tracing::warn!(
                    connection = self.id,
                    database = %self.database,
                    error = %e,
                    "Connection lost, reconnecting once"
                );
                let driver = try_outcome!(self.reconnect(cx).await);
                call(&*driver).await
            }
            other => other,
        }
    }

    /// Run a statement that returns rows.
    pub async fn query(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<Vec<Row>, Error> {
        tracing::trace!(connection = self.id, sql = %sql, params = params.len(), "query");
        self.round_trip(cx, |driver| driver.query(cx, sql, params))
            .await
    }

    /// Run a statement and return its first row, if any.
    pub async fn query_one(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Option<Row>, Error> {
        let rows = try_outcome!(self.query(cx, sql, params).await);
        Outcome::Ok(rows.into_iter().next())
    }

    /// Run a write statement and return the number of affected rows.
    pub async fn execute(&self, cx: &Cx, sql: &str, params: &[Value]) -> Outcome<u64, Error> {
        try_result!(self.check_writable(sql));
        tracing::trace!(connection = self.id, sql = %sql, params = params.len(), "execute");
        self.round_trip(cx, |driver| driver.execute(cx, sql, params))
            .await
    }

    /// Run an INSERT and return the generated key, if any.
    pub async fn insert(
        &self,
        cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> Outcome<Option<Value>, Error> {
        try_result!(self.check_writable(sql));
        tracing::trace!(connection = self.id, sql = %sql, params = params.len(), "insert");
        self.round_trip(cx, |driver| driver.insert(cx, sql, params))
            .await
    }

    /// Introspect the database tables.
    pub async fn tables(&self, cx: &Cx) -> Outcome<Vec<Table>, Error> {
        self.round_trip(cx, |driver| driver.tables(cx)).await
    }

    /// Look up a table by name.
    pub async fn get_table_by_name(&self, cx: &Cx, name: &str) -> Outcome<Option<Table>, Error> {
        let tables = try_outcome!(self.tables(cx).await);
        Outcome::Ok(tables.into_iter().find(|t| t.name == name))
    }

    /// Look up a table by name; the error lists every known table.
    pub async fn get_table_by_name_or_fail(&self, cx: &Cx, name: &str) -> Outcome<Table, Error> {
        let tables = try_outcome!(self.tables(cx).await);
        let table = try_result!(get_table_by_name_or_fail(&tables, name)).clone();
        Outcome::Ok(table)
    }

    /// Run `body` inside a transaction.
    ///
    /// At depth 0 this issues `BEGIN` and `COMMIT`/`ROLLBACK`. Nested calls
    /// use `SAVEPOINT sp_<depth>`: on failure the savepoint is rolled back
    /// and released, and the failure keeps propagating to the caller, who
    /// may handle it and let the outer transaction commit.
    #[tracing::instrument(level = "debug", skip_all, fields(connection = self.id, depth = self.transaction_depth()))]
    pub async fn transaction<T, F>(&self, cx: &Cx, body: F) -> Outcome<T, Error>
    where
        F: AsyncFnOnce() -> Outcome<T, Error>,
    {
        let depth = self.transaction_depth();
        let savepoint = (depth > 0).then(|| format!("sp_{}", depth));
        let savepoint = savepoint.as_deref();

        try_outcome!(self.open_level(cx, savepoint).await);
        self.depth.fetch_add(1, Ordering::SeqCst);
        let mut guard = TransactionGuard {
            connection: self,
            armed: true,
        };

        let finished = match body().await {
            Outcome::Ok(value) => match self.close_level(cx, savepoint).await {
                Outcome::Ok(()) => Outcome::Ok(value),
                Outcome::Err(e) => {
                    self.abort_level(cx, savepoint).await;
                    Outcome::Err(e)
                }
                Outcome::Cancelled(r) => {
                    self.abort_level(cx, savepoint).await;
                    Outcome::Cancelled(r)
                }
                Outcome::Panicked(p) => {
                    self.abort_level(cx, savepoint).await;
                    Outcome::Panicked(p)
                }
            },
            failed => {
                self.abort_level(cx, savepoint).await;
                failed
            }
        };

        guard.armed = false;
        self.depth.fetch_sub(1, Ordering::SeqCst);
        finished
    }

    async fn open_level(&self, cx: &Cx, savepoint: Option<&str>) -> Outcome<(), Error> {
        match savepoint {
            None => {
                tracing::debug!(connection = self.id, "BEGIN");
                self.round_trip(cx, |driver| driver.start_transaction(cx))
                    .await
            }
            Some(name) => {
                tracing::debug!(connection = self.id, savepoint = name, "SAVEPOINT");
                self.round_trip(cx, |driver| driver.savepoint(cx, name))
                    .await
            }
        }
    }

    async fn close_level(&self, cx: &Cx, savepoint: Option<&str>) -> Outcome<(), Error> {
        match savepoint {
            None => {
                tracing::debug!(connection = self.id, "COMMIT");
                self.round_trip(cx, |driver| driver.commit(cx)).await
            }
            Some(name) => {
                tracing::debug!(connection = self.id, savepoint = name, "RELEASE SAVEPOINT");
                self.round_trip(cx, |driver| driver.release_savepoint(cx, name))
                    .await
            }
        }
    }

    /// Roll back one level. Runs even when `cx` is cancelled; a failure here
    /// leaves the session in an unknown state, so the connection is marked
    /// broken.
    async fn abort_level(&self, cx: &Cx, savepoint: Option<&str>) {
        let driver = self.driver();
        let outcome = match savepoint {
            None => {
                tracing::debug!(connection = self.id, "ROLLBACK");
                driver.rollback(cx).await
            }
            Some(name) => {
                tracing::debug!(connection = self.id, savepoint = name, "ROLLBACK TO SAVEPOINT");
                match driver.rollback_to_savepoint(cx, name).await {
                    Outcome::Ok(()) => driver.release_savepoint(cx, name).await,
                    other => other,
                }
            }
        };
        if !matches!(outcome, Outcome::Ok(())) {
            tracing::warn!(connection = self.id, database = %self.database, "Rollback failed; connection marked broken");
            self.broken.store(true, Ordering::SeqCst);
        }
    }

    /// Close the driver session.
    pub async fn close(&self, cx: &Cx) -> Outcome<(), Error> {
        self.driver().close(cx).await
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("database", &self.database)
            .field("depth", &self.transaction_depth())
            .field("broken", &self.is_broken())
            .finish_non_exhaustive()
    }
}

/// Marks the connection broken when a transaction future is dropped before
/// it finished.
struct TransactionGuard<'a> {
    connection: &'a Connection,
    armed: bool,
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!(
                connection = self.connection.id,
                database = %self.connection.database,
                "Transaction dropped mid-flight; connection marked broken"
            );
            self.connection.broken.store(true, Ordering::SeqCst);
        }
    }
}
