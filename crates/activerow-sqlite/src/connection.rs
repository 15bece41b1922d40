//! SQLite connection implementation.
//!
//! This module provides safe wrappers around SQLite's C API and implements
//! the `Driver` trait from activerow-core.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::borrow_as_ptr)] // FFI requires raw pointers
#![allow(clippy::if_not_else)] // Clearer for error handling

use crate::ffi;
use crate::types;
use activerow_core::{
    BoxFuture, Column, Cx, Dialect, Driver, DriverFactory, Error, Outcome, Row, SqlDialect, Table,
    Value,
    error::{ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind},
    row::ColumnInfo,
};
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in serialized mode (connections can be shared).
    pub full_mutex: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        } else {
            flags |= ffi::SQLITE_OPEN_NOMUTEX;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for a private in-memory database.
    ///
    /// Every connection opened from this config sees its own empty database,
    /// so pools should use [`SqliteConfig::file`] instead.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

/// Inner state of the SQLite connection, protected by a mutex.
struct SqliteInner {
    /// Null once the connection has been closed.
    db: *mut ffi::sqlite3,
}

// SAFETY: the handle is only touched while the Mutex is held.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
///
/// This is a thread-safe wrapper around a SQLite database handle.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self, Error> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "Invalid path: contains null byte".to_string(),
                source: None,
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if !db.is_null() {
                // SAFETY: db is valid, errmsg returns a valid C string
                unsafe {
                    let msg = errmsg(db);
                    ffi::sqlite3_close_v2(db);
                    msg
                }
            } else {
                ffi::error_string(rc).to_string()
            };

            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: format!("Failed to open database: {}", msg),
                source: None,
            }));
        }

        if config.busy_timeout_ms > 0 {
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, config.busy_timeout_ms as c_int);
            }
        }

        tracing::debug!(path = %config.path, "Opened SQLite database");

        Ok(Self {
            inner: Mutex::new(SqliteInner { db }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, Error> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self, Error> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, SqliteInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, inner: &SqliteInner) -> Result<*mut ffi::sqlite3, Error> {
        if inner.db.is_null() {
            Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Disconnected,
                message: format!("SQLite connection to {} is closed", self.path),
                source: None,
            }))
        } else {
            Ok(inner.db)
        }
    }

    /// Execute SQL directly without preparing (DDL, multiple statements).
    pub fn execute_raw(&self, sql: &str) -> Result<(), Error> {
        let inner = self.lock();
        let db = self.handle(&inner)?;
        let c_sql = CString::new(sql).map_err(|_| null_byte_error(sql))?;

        let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe { ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg) };

        if rc != ffi::SQLITE_OK {
            let msg = if !errmsg.is_null() {
                // SAFETY: errmsg is valid and owned by us
                let msg = unsafe { CStr::from_ptr(errmsg).to_string_lossy().into_owned() };
                unsafe { ffi::sqlite3_free(errmsg.cast()) };
                msg
            } else {
                ffi::error_string(rc).to_string()
            };

            return Err(Error::Query(QueryError {
                kind: error_code_to_kind(rc),
                sql: Some(sql.to_string()),
                message: msg,
                source: None,
            }));
        }

        Ok(())
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&self) -> i64 {
        let inner = self.lock();
        if inner.db.is_null() {
            return 0;
        }
        // SAFETY: db is valid
        unsafe { ffi::sqlite3_last_insert_rowid(inner.db) }
    }

    /// Prepare and execute a query, returning all rows.
    pub fn query_sync(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>, Error> {
        let inner = self.lock();
        let db = self.handle(&inner)?;
        let stmt = Statement::prepare(db, sql)?;
        stmt.bind_all(sql, params)?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt.raw) };
        let mut col_names = Vec::with_capacity(col_count as usize);
        for i in 0..col_count {
            // SAFETY: stmt is valid, i is in range
            let name = unsafe { types::column_name(stmt.raw, i) }.unwrap_or_else(|| format!("col{}", i));
            col_names.push(name);
        }
        let columns = Arc::new(ColumnInfo::new(col_names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            let rc = unsafe { ffi::sqlite3_step(stmt.raw) };
            match rc {
                ffi::SQLITE_ROW => {
                    let mut values = Vec::with_capacity(col_count as usize);
                    for i in 0..col_count {
                        // SAFETY: stmt is valid, we just got SQLITE_ROW
                        values.push(unsafe { types::read_column(stmt.raw, i) });
                    }
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(step_error(db, sql)),
            }
        }

        tracing::trace!(sql = %sql, rows = rows.len(), "sqlite query");
        Ok(rows)
    }

    /// Prepare and execute a statement, returning rows affected.
    pub fn execute_sync(&self, sql: &str, params: &[Value]) -> Result<u64, Error> {
        let inner = self.lock();
        let db = self.handle(&inner)?;
        let stmt = Statement::prepare(db, sql)?;
        stmt.bind_all(sql, params)?;

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(stmt.raw) };
        match rc {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid
                let changes = unsafe { ffi::sqlite3_changes(db) };
                tracing::trace!(sql = %sql, changes, "sqlite execute");
                Ok(changes as u64)
            }
            _ => Err(step_error(db, sql)),
        }
    }

    /// Execute an INSERT and return the last inserted rowid.
    pub fn insert_sync(&self, sql: &str, params: &[Value]) -> Result<i64, Error> {
        self.execute_sync(sql, params)?;
        Ok(self.last_insert_rowid())
    }

    /// List user tables with their columns.
    pub fn tables_sync(&self) -> Result<Vec<Table>, Error> {
        let names = self.query_sync(
            "SELECT name FROM sqlite_master WHERE type = 'table' \
             AND name NOT LIKE 'sqlite_%' ORDER BY name",
            &[],
        )?;

        let mut tables = Vec::with_capacity(names.len());
        for row in names {
            let name: String = row.get_named("name")?;
            let info = self.query_sync(
                &format!("PRAGMA table_info({})", Dialect::Sqlite.quote_identifier(&name)),
                &[],
            )?;
            let mut columns = Vec::with_capacity(info.len());
            for column in info {
                columns.push(Column {
                    name: column.get_named("name")?,
                    sql_type: column.get_named("type")?,
                    nullable: column.get_named::<i64>("notnull")? == 0,
                    default: column.get_named("dflt_value")?,
                    primary_key: column.get_named::<i64>("pk")? > 0,
                });
            }
            tables.push(Table::new(name, columns));
        }
        Ok(tables)
    }

    /// Close the handle. Later calls fail with a disconnected error.
    pub fn close_sync(&self) {
        let mut inner = self.lock();
        if !inner.db.is_null() {
            // SAFETY: db is valid and never used again
            unsafe {
                ffi::sqlite3_close_v2(inner.db);
            }
            inner.db = ptr::null_mut();
            tracing::debug!(path = %self.path, "Closed SQLite database");
        }
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        self.close_sync();
    }
}

impl SqlDialect for SqliteConnection {
    fn quote_identifier(&self, name: &str) -> String {
        Dialect::Sqlite.quote_identifier(name)
    }

    fn placeholder(&self, index: usize) -> String {
        Dialect::Sqlite.placeholder(index)
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        Dialect::Sqlite.unbounded_limit()
    }
}

impl Driver for SqliteConnection {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> BoxFuture<'_, Outcome<Vec<Row>, Error>> {
        let result = self.query_sync(sql, params);
        Box::pin(async move { result.map_or_else(Outcome::Err, Outcome::Ok) })
    }

    fn execute(&self, _cx: &Cx, sql: &str, params: &[Value]) -> BoxFuture<'_, Outcome<u64, Error>> {
        let result = self.execute_sync(sql, params);
        Box::pin(async move { result.map_or_else(Outcome::Err, Outcome::Ok) })
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        params: &[Value],
    ) -> BoxFuture<'_, Outcome<Option<Value>, Error>> {
        let result = self
            .insert_sync(sql, params)
            .map(|rowid| Some(Value::BigInt(rowid)));
        Box::pin(async move { result.map_or_else(Outcome::Err, Outcome::Ok) })
    }

    fn tables(&self, _cx: &Cx) -> BoxFuture<'_, Outcome<Vec<Table>, Error>> {
        let result = self.tables_sync();
        Box::pin(async move { result.map_or_else(Outcome::Err, Outcome::Ok) })
    }

    fn close(&self, _cx: &Cx) -> BoxFuture<'_, Outcome<(), Error>> {
        self.close_sync();
        Box::pin(async move { Outcome::Ok(()) })
    }
}

/// Opens [`SqliteConnection`]s for a pool.
#[derive(Debug, Clone)]
pub struct SqliteFactory {
    config: SqliteConfig,
}

impl SqliteFactory {
    /// Create a factory opening connections with `config`.
    pub fn new(config: SqliteConfig) -> Self {
        Self { config }
    }

    /// The configuration new connections use.
    pub fn config(&self) -> &SqliteConfig {
        &self.config
    }
}

impl DriverFactory for SqliteFactory {
    fn connect(&self, _cx: &Cx) -> BoxFuture<'_, Outcome<Box<dyn Driver>, Error>> {
        let result = SqliteConnection::open(&self.config).map(|conn| Box::new(conn) as Box<dyn Driver>);
        Box::pin(async move { result.map_or_else(Outcome::Err, Outcome::Ok) })
    }
}

/// A prepared statement, finalized on drop.
struct Statement {
    raw: *mut ffi::sqlite3_stmt,
    db: *mut ffi::sqlite3,
}

impl Statement {
    fn prepare(db: *mut ffi::sqlite3, sql: &str) -> Result<Self, Error> {
        let c_sql = CString::new(sql).map_err(|_| null_byte_error(sql))?;
        let mut stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();

        // SAFETY: All pointers are valid
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(
                db,
                c_sql.as_ptr(),
                c_sql.as_bytes().len() as c_int,
                &mut stmt,
                ptr::null_mut(),
            )
        };

        if rc != ffi::SQLITE_OK {
            return Err(step_error(db, sql));
        }
        Ok(Self { raw: stmt, db })
    }

    fn bind_all(&self, sql: &str, params: &[Value]) -> Result<(), Error> {
        for (i, param) in params.iter().enumerate() {
            // SAFETY: stmt is valid, index is 1-based
            let rc = unsafe { types::bind_value(self.raw, (i + 1) as c_int, param) };
            if rc != ffi::SQLITE_OK {
                // SAFETY: db is valid
                let msg = unsafe { errmsg(self.db) };
                return Err(Error::Query(QueryError {
                    kind: QueryErrorKind::Database,
                    sql: Some(sql.to_string()),
                    message: format!("Failed to bind parameter {}: {}", i + 1, msg),
                    source: None,
                }));
            }
        }
        Ok(())
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            // SAFETY: stmt is valid and finalized exactly once
            unsafe { ffi::sqlite3_finalize(self.raw) };
        }
    }
}

/// # Safety
/// `db` must be a valid handle.
unsafe fn errmsg(db: *mut ffi::sqlite3) -> String {
    // SAFETY: errmsg returns a valid C string for a valid handle
    unsafe {
        let ptr = ffi::sqlite3_errmsg(db);
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}

fn null_byte_error(sql: &str) -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::Syntax,
        sql: Some(sql.to_string()),
        message: "SQL contains null byte".to_string(),
        source: None,
    })
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    // SAFETY: db is valid
    let (msg, code) = unsafe { (errmsg(db), ffi::sqlite3_errcode(db)) };

    Error::Query(QueryError {
        kind: error_code_to_kind(code),
        sql: Some(sql.to_string()),
        message: msg,
        source: None,
    })
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    match code {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Deadlock,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH | ffi::SQLITE_READONLY => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        ffi::SQLITE_INTERRUPT => QueryErrorKind::Cancelled,
        ffi::SQLITE_ERROR => QueryErrorKind::Syntax,
        _ => QueryErrorKind::Database,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asupersync::runtime::RuntimeBuilder;

    fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
        match outcome {
            Outcome::Ok(v) => v,
            Outcome::Err(e) => panic!("unexpected error: {e}"),
            Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
            Outcome::Panicked(p) => panic!("panicked: {p:?}"),
        }
    }

    #[test]
    fn test_open_memory() {
        let conn = SqliteConnection::open_memory().unwrap();
        assert_eq!(conn.path(), ":memory:");
    }

    #[test]
    fn test_execute_raw_and_rowid() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
            .unwrap();
        conn.execute_raw("INSERT INTO test (name) VALUES ('Alice')")
            .unwrap();
        assert_eq!(conn.last_insert_rowid(), 1);
    }

    #[test]
    fn test_parameterized_query() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT, age INTEGER)")
            .unwrap();

        conn.execute_sync(
            "INSERT INTO test (name, age) VALUES (?1, ?2)",
            &[Value::Text("Alice".to_string()), Value::BigInt(30)],
        )
        .unwrap();

        let rows = conn
            .query_sync(
                "SELECT * FROM test WHERE name = ?1",
                &[Value::Text("Alice".to_string())],
            )
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<String>("name").unwrap(), "Alice");
        assert_eq!(rows[0].get_by_name("age"), Some(&Value::BigInt(30)));
    }

    #[test]
    fn test_null_and_uuid_handling() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw("CREATE TABLE test (id TEXT PRIMARY KEY, name TEXT)")
            .unwrap();

        let id = Value::new_uuid();
        conn.execute_sync(
            "INSERT INTO test (id, name) VALUES (?1, ?2)",
            &[id.clone(), Value::Null],
        )
        .unwrap();

        let rows = conn
            .query_sync("SELECT * FROM test WHERE id = ?1", &[id.clone()])
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_named::<Option<String>>("name").unwrap(), None);
        assert_eq!(
            rows[0].get_by_name("id").and_then(Value::as_uuid),
            id.as_uuid()
        );
    }

    #[test]
    fn test_tables_introspection() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw(
            "CREATE TABLE tasks (id INTEGER PRIMARY KEY, name TEXT NOT NULL DEFAULT 'x');
             CREATE TABLE projects (id INTEGER PRIMARY KEY)",
        )
        .unwrap();

        let tables = conn.tables_sync().unwrap();
        let names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["projects", "tasks"]);

        let name = tables[1].get_column_by_name("name").unwrap();
        assert!(!name.nullable);
        assert_eq!(name.default.as_deref(), Some("'x'"));
        assert!(tables[1].get_column_by_name("id").unwrap().primary_key);
    }

    #[test]
    fn test_closed_connection_is_disconnected() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.close_sync();
        let err = conn.query_sync("SELECT 1", &[]).unwrap_err();
        assert!(err.is_reconnectable());
    }

    #[test]
    fn test_driver_transactions_and_savepoints() {
        let rt = RuntimeBuilder::current_thread()
            .build()
            .expect("create asupersync runtime");
        let cx = Cx::for_testing();

        rt.block_on(async {
            let conn = SqliteConnection::open_memory().unwrap();
            conn.execute_raw("CREATE TABLE test (id INTEGER PRIMARY KEY, name TEXT)")
                .unwrap();
            let driver: &dyn Driver = &conn;

            unwrap_outcome(driver.start_transaction(&cx).await);
            unwrap_outcome(
                driver
                    .execute(&cx, "INSERT INTO test (name) VALUES ('kept')", &[])
                    .await,
            );
            unwrap_outcome(driver.savepoint(&cx, "sp_1").await);
            unwrap_outcome(
                driver
                    .execute(&cx, "INSERT INTO test (name) VALUES ('dropped')", &[])
                    .await,
            );
            unwrap_outcome(driver.rollback_to_savepoint(&cx, "sp_1").await);
            unwrap_outcome(driver.release_savepoint(&cx, "sp_1").await);
            unwrap_outcome(driver.commit(&cx).await);

            let rows = unwrap_outcome(driver.query(&cx, "SELECT name FROM test", &[]).await);
            assert_eq!(rows.len(), 1);
            assert_eq!(rows[0].get_named::<String>("name").unwrap(), "kept");

            let key = unwrap_outcome(
                driver
                    .insert(&cx, "INSERT INTO test (name) VALUES ('next')", &[])
                    .await,
            );
            assert_eq!(key, Some(Value::BigInt(2)));
        });
    }

    #[test]
    fn test_read_only_open() {
        let tmp = std::env::temp_dir().join(format!("activerow_ro_{}.db", std::process::id()));
        let _ = std::fs::remove_file(&tmp);

        let path = tmp.to_string_lossy().to_string();
        let conn = SqliteConnection::open(&SqliteConfig::file(path.clone())).unwrap();
        conn.execute_raw("CREATE TABLE test (id INTEGER)").unwrap();
        drop(conn);

        let conn =
            SqliteConnection::open(&SqliteConfig::file(path).flags(OpenFlags::read_only())).unwrap();
        assert!(conn.query_sync("SELECT * FROM test", &[]).unwrap().is_empty());
        assert!(conn.execute_raw("INSERT INTO test VALUES (1)").is_err());

        drop(conn);
        let _ = std::fs::remove_file(&tmp);
    }
}
