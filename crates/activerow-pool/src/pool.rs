//! Connection pool bound to explicit execution scopes.

use crate::config::{DatabaseIdentifier, PoolStats};
use crate::connection::Connection;
use crate::scope::ExecutionScope;
use activerow_core::error::{PoolError, PoolErrorKind};
use activerow_core::{ConfigErrorKind, Cx, Error, Outcome, try_outcome};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

#[derive(Default)]
struct PoolState {
    free: Vec<Arc<Connection>>,
    in_use: HashMap<u64, Arc<Connection>>,
    global: Option<Arc<Connection>>,
    closed: bool,
}

/// Connections of one database identifier.
///
/// Checkout moves a connection from the free list into the in-use map and
/// checkin moves it back, each under a single lock, so a connection is
/// never handed to two scopes at once. The global fallback connection lives
/// outside both.
pub struct ConnectionPool {
    identifier: DatabaseIdentifier,
    state: Mutex<PoolState>,
    next_id: AtomicU64,
    spawned: AtomicUsize,
}

impl ConnectionPool {
    /// Create an empty pool. Connections are opened lazily.
    pub fn new(identifier: DatabaseIdentifier) -> Self {
        Self {
            identifier,
            state: Mutex::new(PoolState::default()),
            next_id: AtomicU64::new(1),
            spawned: AtomicUsize::new(0),
        }
    }

    /// Database identifier name.
    pub fn name(&self) -> &str {
        &self.identifier.name
    }

    /// The identifier this pool serves.
    pub fn identifier(&self) -> &DatabaseIdentifier {
        &self.identifier
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a new connection that the pool does not track.
    #[tracing::instrument(level = "debug", skip_all, fields(database = %self.identifier.name))]
    pub async fn spawn_connection(&self, cx: &Cx) -> Outcome<Arc<Connection>, Error> {
        if self.lock().closed {
            return Outcome::Err(self.closed_error());
        }
        let driver = match self.identifier.factory.connect(cx).await {
            Outcome::Ok(driver) => driver,
            Outcome::Err(e) => {
                return Outcome::Err(Error::Pool(PoolError {
                    kind: PoolErrorKind::Spawn,
                    message: format!(
                        "Failed to open a connection to \"{}\": {}",
                        self.identifier.name, e
                    ),
                }));
            }
            Outcome::Cancelled(r) => return Outcome::Cancelled(r),
            Outcome::Panicked(p) => return Outcome::Panicked(p),
        };
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.spawned.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(connection = id, driver = driver.name(), "Spawned connection");
        Outcome::Ok(Arc::new(Connection::new(
            id,
            self.identifier.name.clone(),
            Arc::clone(&self.identifier.factory),
            driver,
            self.identifier.read_only,
        )))
    }

    /// The global fallback connection, created on first call.
    ///
    /// Concurrent first calls race to spawn; the loser closes its
    /// connection and returns the winner's.
    pub async fn ensure_global_connection(&self, cx: &Cx) -> Outcome<Arc<Connection>, Error> {
        if let Some(global) = self.lock().global.clone() {
            return Outcome::Ok(global);
        }
        let spawned = try_outcome!(self.spawn_connection(cx).await);
        let existing = {
            let mut state = self.lock();
            match &state.global {
                Some(existing) => Some(Arc::clone(existing)),
                None => {
                    state.global = Some(Arc::clone(&spawned));
                    None
                }
            }
        };
        match existing {
            Some(existing) => {
                let _ = spawned.close(cx).await;
                Outcome::Ok(existing)
            }
            None => {
                tracing::debug!(database = %self.identifier.name, connection = spawned.id(), "Global connection created");
                Outcome::Ok(spawned)
            }
        }
    }

    /// The connection bound in `scope`, else the global fallback.
    pub fn get_current_connection(&self, scope: &ExecutionScope) -> Result<Arc<Connection>, Error> {
        if let Some(connection) = self.get_current_context_connection(scope) {
            return Ok(connection);
        }
        self.lock().global.clone().ok_or_else(|| {
            Error::config(
                ConfigErrorKind::NotInitialized,
                format!(
                    "Driver not initialized for database \"{}\"",
                    self.identifier.name
                ),
            )
        })
    }

    /// The connection bound in `scope`, if any.
    pub fn get_current_context_connection(&self, scope: &ExecutionScope) -> Option<Arc<Connection>> {
        scope.get(&self.identifier.name).cloned()
    }

    async fn checkout(&self, cx: &Cx) -> Outcome<Arc<Connection>, Error> {
        let reused = {
            let mut state = self.lock();
            if state.closed {
                return Outcome::Err(self.closed_error());
            }
            let reused = state.free.pop();
            if let Some(connection) = &reused {
                state.in_use.insert(connection.id(), Arc::clone(connection));
            }
            reused
        };
        let connection = match reused {
            Some(connection) => connection,
            None => {
                let connection = try_outcome!(self.spawn_connection(cx).await);
                self.lock()
                    .in_use
                    .insert(connection.id(), Arc::clone(&connection));
                connection
            }
        };
        connection.set_deadline(
            self.identifier
                .pool
                .scope_timeout
                .map(|timeout| Instant::now() + timeout),
        );
        tracing::debug!(database = %self.identifier.name, connection = connection.id(), "Checked out");
        Outcome::Ok(connection)
    }

    fn checkin(&self, connection: &Arc<Connection>) {
        connection.set_deadline(None);
        let mut state = self.lock();
        state.in_use.remove(&connection.id());
        if connection.is_broken() {
            tracing::warn!(database = %self.identifier.name, connection = connection.id(), "Discarding broken connection");
        } else if state.closed || connection.in_transaction() {
            tracing::debug!(database = %self.identifier.name, connection = connection.id(), "Discarding connection");
        } else if state.free.len() >= self.identifier.pool.max_idle {
            tracing::debug!(database = %self.identifier.name, connection = connection.id(), "Free list full; dropping connection");
        } else {
            tracing::debug!(database = %self.identifier.name, connection = connection.id(), "Checked in");
            state.free.push(Arc::clone(connection));
        }
    }

    /// Run `body` with a connection bound in its scope.
    ///
    /// When `scope` already binds a connection of this pool, `body` runs
    /// re-entrantly on it. Otherwise a free connection is checked out (or
    /// spawned), bound in a child scope, and checked back in however `body`
    /// ends, including when the future is dropped.
    pub async fn with_connection<T, F>(
        &self,
        cx: &Cx,
        scope: &ExecutionScope,
        body: F,
    ) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(ExecutionScope) -> Outcome<T, Error>,
    {
        let (scope, _checkin) = try_outcome!(self.bind(cx, scope).await);
        body(scope).await
    }

    /// Child of `scope` with a connection of this pool bound, plus the guard
    /// returning it on drop. Already-bound scopes come back unchanged with
    /// no guard.
    pub(crate) async fn bind(
        &self,
        cx: &Cx,
        scope: &ExecutionScope,
    ) -> Outcome<(ExecutionScope, Option<Checkin<'_>>), Error> {
        if scope.is_bound(&self.identifier.name) {
            return Outcome::Ok((scope.clone(), None));
        }
        let connection = try_outcome!(self.checkout(cx).await);
        let child = scope.with_binding(self.identifier.name.clone(), Arc::clone(&connection));
        Outcome::Ok((
            child,
            Some(Checkin {
                pool: self,
                connection,
            }),
        ))
    }

    /// Run `body` inside a transaction on the scope's connection.
    pub async fn transaction<T, F>(
        &self,
        cx: &Cx,
        scope: &ExecutionScope,
        body: F,
    ) -> Outcome<T, Error>
    where
        F: AsyncFnOnce(ExecutionScope) -> Outcome<T, Error>,
    {
        let name = self.identifier.name.clone();
        self.with_connection(cx, scope, async move |scope: ExecutionScope| {
            let connection = match scope.get(&name) {
                Some(connection) => Arc::clone(connection),
                None => {
                    return Outcome::Err(Error::config(
                        ConfigErrorKind::NotInitialized,
                        format!("No connection bound for database \"{}\"", name),
                    ));
                }
            };
            connection
                .transaction(cx, async move || body(scope).await)
                .await
        })
        .await
    }

    /// Current pool statistics.
    pub fn stats(&self) -> PoolStats {
        let state = self.lock();
        PoolStats {
            total_connections: state.free.len() + state.in_use.len(),
            idle_connections: state.free.len(),
            active_connections: state.in_use.len(),
            has_global_connection: state.global.is_some(),
            spawned_connections: self.spawned.load(Ordering::SeqCst),
        }
    }

    /// Close idle connections and the global fallback. Connections still in
    /// use are discarded when they are checked in.
    #[tracing::instrument(level = "debug", skip_all, fields(database = %self.identifier.name))]
    pub async fn close(&self, cx: &Cx) -> Outcome<(), Error> {
        let (idle, global) = {
            let mut state = self.lock();
            state.closed = true;
            (std::mem::take(&mut state.free), state.global.take())
        };
        for connection in idle.iter().chain(global.iter()) {
            if let Outcome::Err(e) = connection.close(cx).await {
                tracing::warn!(connection = connection.id(), error = %e, "Failed to close connection");
            }
        }
        Outcome::Ok(())
    }

    fn closed_error(&self) -> Error {
        Error::Pool(PoolError {
            kind: PoolErrorKind::Closed,
            message: format!("Pool for \"{}\" is closed", self.identifier.name),
        })
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("identifier", &self.identifier)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Returns a checked-out connection to its pool on drop.
pub(crate) struct Checkin<'a> {
    pool: &'a ConnectionPool,
    connection: Arc<Connection>,
}

impl Drop for Checkin<'_> {
    fn drop(&mut self) {
        self.pool.checkin(&self.connection);
    }
}
