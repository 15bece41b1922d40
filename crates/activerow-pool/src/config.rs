//! Pool and database configuration.

use activerow_core::DriverFactory;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of idle connections kept on checkin; extra ones are
    /// closed
    pub max_idle: usize,
    /// Wall-clock budget of one checked-out scope
    pub scope_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 10,
            scope_timeout: None,
        }
    }
}

impl PoolConfig {
    /// Create a new pool configuration keeping at most `max_idle` idle
    /// connections.
    pub fn new(max_idle: usize) -> Self {
        Self {
            max_idle,
            ..Default::default()
        }
    }

    /// Set max idle connections.
    pub fn max_idle(mut self, n: usize) -> Self {
        self.max_idle = n;
        self
    }

    /// Set the scope timeout.
    pub fn scope_timeout(mut self, timeout: Duration) -> Self {
        self.scope_timeout = Some(timeout);
        self
    }
}

/// Pool statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Idle plus in-use connections (the fallback is counted separately)
    pub total_connections: usize,
    /// Connections in the free list
    pub idle_connections: usize,
    /// Connections checked out by a scope
    pub active_connections: usize,
    /// Whether the global fallback connection exists
    pub has_global_connection: bool,
    /// Connections ever opened through the factory
    pub spawned_connections: usize,
}

/// A named database: how to connect to it and how to pool its connections.
#[derive(Clone)]
pub struct DatabaseIdentifier {
    pub name: String,
    pub factory: Arc<dyn DriverFactory>,
    pub pool: PoolConfig,
    /// Reject every write issued through this identifier
    pub read_only: bool,
}

impl DatabaseIdentifier {
    /// Create an identifier with the default pool configuration.
    pub fn new(name: impl Into<String>, factory: Arc<dyn DriverFactory>) -> Self {
        Self {
            name: name.into(),
            factory,
            pool: PoolConfig::default(),
            read_only: false,
        }
    }

    /// Set the pool configuration.
    pub fn pool_config(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    /// Mark the database read-only.
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
}

impl fmt::Debug for DatabaseIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseIdentifier")
            .field("name", &self.name)
            .field("pool", &self.pool)
            .field("read_only", &self.read_only)
            .finish_non_exhaustive()
    }
}
