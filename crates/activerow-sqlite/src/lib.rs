//! SQLite driver for activerow.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! This crate provides a SQLite database driver using FFI bindings to libsqlite3.
//! It implements the `Driver` trait from activerow-core, and [`SqliteFactory`]
//! lets a connection pool open new sessions on demand.
//!
//! # Example
//!
//! ```rust,ignore
//! use activerow_sqlite::{SqliteConfig, SqliteFactory};
//! use activerow_pool::DatabaseIdentifier;
//! use std::sync::Arc;
//!
//! let factory = SqliteFactory::new(SqliteConfig::file("app.db"));
//! let identifier = DatabaseIdentifier::new("default", Arc::new(factory));
//! ```
//!
//! # Thread Safety
//!
//! `SqliteConnection` is both `Send` and `Sync`, using internal mutex
//! synchronization to protect the underlying SQLite handle.

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection, SqliteFactory};

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
