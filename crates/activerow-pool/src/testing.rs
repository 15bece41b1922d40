//! Recording mock driver for unit tests.

use activerow_core::error::{ConnectionError, ConnectionErrorKind};
use activerow_core::{
    BoxFuture, Column, Cx, Dialect, Driver, DriverFactory, Error, Outcome, Row, SqlDialect, Table,
    Value,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub(crate) fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

#[derive(Default)]
struct Shared {
    log: Mutex<Vec<String>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
    disconnects: AtomicUsize,
    tables: Vec<String>,
}

/// Factory whose drivers share one SQL log.
#[derive(Default)]
pub(crate) struct MockFactory {
    shared: Arc<Shared>,
}

impl MockFactory {
    pub(crate) fn with_tables(tables: &[&str]) -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: tables.iter().map(|t| (*t).to_string()).collect(),
                ..Shared::default()
            }),
        }
    }

    pub(crate) fn driver(&self) -> MockDriver {
        self.shared.connects.fetch_add(1, Ordering::SeqCst);
        MockDriver {
            shared: Arc::clone(&self.shared),
        }
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.shared.log.lock().unwrap().clone()
    }

    pub(crate) fn connects(&self) -> usize {
        self.shared.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn closes(&self) -> usize {
        self.shared.closes.load(Ordering::SeqCst)
    }

    /// Fail the next `n` statements with a lost-session error.
    pub(crate) fn disconnect_next(&self, n: usize) {
        self.shared.disconnects.store(n, Ordering::SeqCst);
    }
}

impl DriverFactory for MockFactory {
    fn connect(&self, _cx: &Cx) -> BoxFuture<'_, Outcome<Box<dyn Driver>, Error>> {
        let driver: Box<dyn Driver> = Box::new(self.driver());
        Box::pin(async move { Outcome::Ok(driver) })
    }
}

pub(crate) struct MockDriver {
    shared: Arc<Shared>,
}

impl MockDriver {
    fn record(&self, sql: &str) -> Result<(), Error> {
        let pending = self.shared.disconnects.load(Ordering::SeqCst);
        if pending > 0 {
            self.shared.disconnects.store(pending - 1, Ordering::SeqCst);
            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::NotConnected,
                message: "mock session lost".to_string(),
                source: None,
            }));
        }
        self.shared.log.lock().unwrap().push(sql.to_string());
        Ok(())
    }
}

impl SqlDialect for MockDriver {
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

impl Driver for MockDriver {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn query(
        &self,
        _cx: &Cx,
        sql: &str,
        _params: &[Value],
    ) -> BoxFuture<'_, Outcome<Vec<Row>, Error>> {
        let result = self.record(sql).map(|()| Vec::new());
        Box::pin(async move { result.map_or_else(Outcome::Err, Outcome::Ok) })
    }

    fn execute(&self, _cx: &Cx, sql: &str, _params: &[Value]) -> BoxFuture<'_, Outcome<u64, Error>> {
        let result = self.record(sql).map(|()| 1);
        Box::pin(async move { result.map_or_else(Outcome::Err, Outcome::Ok) })
    }

    fn insert(
        &self,
        _cx: &Cx,
        sql: &str,
        _params: &[Value],
    ) -> BoxFuture<'_, Outcome<Option<Value>, Error>> {
        let result = self.record(sql).map(|()| Some(Value::BigInt(1)));
        Box::pin(async move { result.map_or_else(Outcome::Err, Outcome::Ok) })
    }

    fn tables(&self, _cx: &Cx) -> BoxFuture<'_, Outcome<Vec<Table>, Error>> {
        let tables = self
            .shared
            .tables
            .iter()
            .map(|name| {
                Table::new(
                    name.clone(),
                    vec![Column {
                        name: "id".to_string(),
                        sql_type: "INTEGER".to_string(),
                        nullable: false,
                        default: None,
                        primary_key: true,
                    }],
                )
            })
            .collect();
        Box::pin(async move { Outcome::Ok(tables) })
    }

    fn close(&self, _cx: &Cx) -> BoxFuture<'_, Outcome<(), Error>> {
        self.shared.closes.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Outcome::Ok(()) })
    }
}
