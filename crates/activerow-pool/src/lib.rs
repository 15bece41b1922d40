//! Connection pooling for activerow using asupersync.
//!
//! Each configured database identifier owns a [`ConnectionPool`]. Code that
//! needs a connection passes an [`ExecutionScope`] explicitly: binding a
//! connection yields a child scope, so nested calls see the same connection
//! and sibling call chains never share one.
//!
//! ```ignore
//! pool.with_connection(&cx, &scope, async |scope| {
//!     let conn = pool.get_current_connection(&scope)?;
//!     conn.transaction(&cx, async || {
//!         conn.execute(&cx, "UPDATE tasks SET done = 1", &[]).await
//!     })
//!     .await
//! })
//! .await
//! ```

pub mod config;
pub mod configuration;
pub mod connection;
pub mod pool;
pub mod scope;

#[cfg(test)]
mod testing;

pub use config::{DatabaseIdentifier, PoolConfig, PoolStats};
pub use configuration::{Configuration, ConfigurationBuilder};
pub use connection::Connection;
pub use pool::ConnectionPool;
pub use scope::ExecutionScope;
