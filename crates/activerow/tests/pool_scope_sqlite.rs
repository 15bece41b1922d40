#![recursion_limit = "256"]

mod common;

use activerow::prelude::*;
use activerow::{ConfigErrorKind, sqlite_database};
use asupersync::runtime::RuntimeBuilder;
use common::{TestDb, expect_err, names, unwrap_outcome};
use std::sync::Arc;

fn run<F: std::future::Future<Output = ()>>(test: impl FnOnce(Cx) -> F) {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    rt.block_on(test(cx));
}

async fn save_task(cx: &Cx, session: &Session, name: &str) -> Outcome<Record, Error> {
    let mut task = try_result!(session.build("Task"));
    try_result!(task.set("name", name));
    try_outcome!(task.save(cx, session).await);
    Outcome::Ok(task)
}

#[test]
fn scoped_connections_shadow_the_global_one() {
    let db = TestDb::new("scoped");
    run(|cx| async move {
        let pool = Arc::clone(db.configuration.get_database_pool("default").unwrap());
        let outside = ExecutionScope::new();
        assert!(pool.get_current_connection(&outside).is_err());

        let global = unwrap_outcome(pool.ensure_global_connection(&cx).await);
        let current = pool.get_current_connection(&outside).unwrap();
        assert!(Arc::ptr_eq(&global, &current));
        assert!(pool.get_current_context_connection(&outside).is_none());

        let scoped = unwrap_outcome(
            pool.with_connection(&cx, &outside, async |scope: ExecutionScope| {
                let bound = pool.get_current_connection(&scope).unwrap();
                let nested = pool
                    .with_connection(&cx, &scope, async |inner: ExecutionScope| {
                        Outcome::Ok(pool.get_current_connection(&inner).unwrap().id())
                    })
                    .await;
                assert_eq!(unwrap_outcome(nested), bound.id());
                Outcome::Ok(bound)
            })
            .await,
        );
        assert!(!Arc::ptr_eq(&global, &scoped));

        let stats = pool.stats();
        assert_eq!(stats.idle_connections, 1);
        assert_eq!(stats.active_connections, 0);
        assert!(stats.has_global_connection);

        let reused = unwrap_outcome(
            pool.with_connection(&cx, &outside, async |scope: ExecutionScope| {
                Outcome::Ok(pool.get_current_connection(&scope).unwrap().id())
            })
            .await,
        );
        assert_eq!(reused, scoped.id());
        assert_eq!(pool.stats().spawned_connections, 2);
    });
}

#[test]
fn sessions_bind_every_database() {
    let db = TestDb::new("with-connections");
    run(|cx| async move {
        let session = db.session();
        assert!(session.scope().is_empty());

        let ids = unwrap_outcome(
            session
                .with_connections(&cx, async |bound: Session| {
                    assert!(bound.scope().is_bound("default"));
                    let first = try_outcome!(bound.connection(&cx, "default").await).id();
                    let again = try_outcome!(
                        bound
                            .ensure_connections(&cx, async |same: Session| {
                                let connection = try_outcome!(same.connection(&cx, "default").await);
                                Outcome::Ok(connection.id())
                            })
                            .await
                    );
                    Outcome::Ok((first, again))
                })
                .await,
        );
        assert_eq!(ids.0, ids.1);

        let global = unwrap_outcome(session.connection(&cx, "default").await);
        assert_ne!(global.id(), ids.0);
    });
}

#[test]
fn failed_nested_transactions_roll_back_to_their_savepoint() {
    let db = TestDb::new("nested");
    run(|cx| async move {
        let session = db.session();
        let outcome = session
            .transaction(&cx, "default", async |outer: Session| {
                try_outcome!(save_task(&cx, &outer, "Task 1").await);
                outer
                    .transaction(&cx, "default", async |middle: Session| {
                        try_outcome!(save_task(&cx, &middle, "Task 2").await);
                        let innermost = middle
                            .transaction(&cx, "default", async |inner: Session| {
                                try_outcome!(save_task(&cx, &inner, "Task 3").await);
                                let mut invalid = try_result!(inner.build("Task"));
                                try_outcome!(invalid.save(&cx, &inner).await);
                                Outcome::Ok(())
                            })
                            .await;
                        assert!(matches!(innermost, Outcome::Err(Error::Validation(_))));
                        Outcome::Ok(())
                    })
                    .await
            })
            .await;
        unwrap_outcome(outcome);

        assert_eq!(names(&cx, &session, "Task").await, vec!["Task 1", "Task 2"]);
    });
}

#[test]
fn failed_transactions_roll_back_every_write() {
    let db = TestDb::new("rollback");
    run(|cx| async move {
        let session = db.session();
        let outcome = session
            .transaction(&cx, "default", async |scoped: Session| {
                try_outcome!(save_task(&cx, &scoped, "Doomed").await);
                let connection = try_outcome!(scoped.connection(&cx, "default").await);
                assert_eq!(connection.transaction_depth(), 1);
                Outcome::<(), Error>::Err(Error::Custom("abort".to_string()))
            })
            .await;
        assert_eq!(expect_err(outcome).to_string(), "abort");
        assert!(names(&cx, &session, "Task").await.is_empty());

        let pool = db.configuration.get_database_pool("default").unwrap();
        assert_eq!(pool.stats().active_connections, 0);
    });
}

#[test]
fn read_only_databases_refuse_writes() {
    let db = TestDb::with("read-only", |builder, path| {
        builder.database(sqlite_database("archive", path).read_only(true))
    });
    run(|cx| async move {
        let session = db.session();
        let archive = unwrap_outcome(session.connection(&cx, "archive").await);
        assert!(archive.is_read_only());

        let err = expect_err(
            archive
                .execute(&cx, "INSERT INTO tasks (name) VALUES ('sneaky')", &[])
                .await,
        );
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::ReadOnly));
        assert!(err.to_string().contains("read-only"));

        let rows = unwrap_outcome(archive.query(&cx, "SELECT COUNT(*) FROM tasks", &[]).await);
        assert_eq!(rows[0].get(0), Some(&Value::BigInt(0)));
    });
}

#[test]
fn missing_tables_list_the_known_ones() {
    let db = TestDb::new("introspect");
    run(|cx| async move {
        let session = db.session();
        let connection = unwrap_outcome(session.connection(&cx, "default").await);

        let tasks = unwrap_outcome(connection.get_table_by_name_or_fail(&cx, "tasks").await);
        let columns: Vec<&str> = tasks.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(columns, vec!["id", "name", "done", "project_id"]);

        let err = expect_err(connection.get_table_by_name_or_fail(&cx, "missing").await);
        assert_eq!(
            err.to_string(),
            "Couldn't find a table by that name \"missing\" in: article_translations, articles, \
             project_details, projects, tasks, users"
        );

        let unknown = expect_err(session.connection(&cx, "reporting").await);
        assert_eq!(unknown.config_kind(), Some(ConfigErrorKind::NotInitialized));
    });
}
