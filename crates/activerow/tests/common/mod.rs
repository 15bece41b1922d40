//! Shared fixtures for the SQLite integration tests.

#![allow(dead_code)]

use activerow::prelude::*;
use activerow::{SqliteConnection, sqlite_database};
use regex::Regex;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn unwrap_outcome<T>(outcome: Outcome<T, Error>) -> T {
    match outcome {
        Outcome::Ok(v) => v,
        Outcome::Err(e) => panic!("unexpected error: {e}"),
        Outcome::Cancelled(r) => panic!("cancelled: {r:?}"),
        Outcome::Panicked(p) => panic!("panicked: {p:?}"),
    }
}

pub fn expect_err<T: std::fmt::Debug>(outcome: Outcome<T, Error>) -> Error {
    match outcome {
        Outcome::Err(e) => e,
        other => panic!("expected an error, got {other:?}"),
    }
}

const SCHEMA: &str = "
    CREATE TABLE projects (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, code TEXT);
    CREATE TABLE tasks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT,
        done INTEGER NOT NULL DEFAULT 0,
        project_id INTEGER
    );
    CREATE TABLE project_details (id INTEGER PRIMARY KEY AUTOINCREMENT, summary TEXT, project_id INTEGER);
    CREATE TABLE users (id TEXT PRIMARY KEY, email TEXT);
    CREATE TABLE articles (id INTEGER PRIMARY KEY AUTOINCREMENT, slug TEXT);
    CREATE TABLE article_translations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id INTEGER,
        locale TEXT,
        title TEXT
    );
";

/// Projects, tasks, details, UUID-keyed users and translated articles.
///
/// SQLite has no boolean type, so `done` is declared as an integer flag.
pub fn registry() -> Arc<Registry> {
    Registry::builder()
        .entity(
            EntitySchema::builder("Project", "projects")
                .attributes(&["name", "code"])
                .validates_presence("name")
                .validates_uniqueness("name")
                .has_many("tasks", "Task", |r| r.dependent_destroy())
                .has_many("done_tasks", "Task", |r| r.scope(Scope::new().eq("done", 1)))
                .has_one("project_detail", "ProjectDetail", |r| r.dependent_destroy())
                .build(),
        )
        .entity(
            EntitySchema::builder("Task", "tasks")
                .attribute("name")
                .attribute_with_default("done", 0)
                .validates_presence("name")
                .validates_length("name", None, Some(40))
                .belongs_to("project", "Project", |r| r)
                .build(),
        )
        .entity(
            EntitySchema::builder("ProjectDetail", "project_details")
                .attribute("summary")
                .belongs_to("project", "Project", |r| r)
                .build(),
        )
        .entity(
            EntitySchema::builder("User", "users")
                .primary_key("id", PrimaryKeyStrategy::Uuid)
                .attribute("email")
                .validates_uniqueness("email")
                .validates_format("email", Regex::new(r"^[^@\s]+@[^@\s]+$").unwrap())
                .build(),
        )
        .entity(
            EntitySchema::builder("Article", "articles")
                .attribute("slug")
                .translates("ArticleTranslation", &["title"])
                .build(),
        )
        .entity(
            EntitySchema::builder("ArticleTranslation", "article_translations")
                .attributes(&["article_id", "locale", "title"])
                .build(),
        )
        .build()
        .expect("valid registry")
}

static NEXT_DB: AtomicUsize = AtomicUsize::new(0);

/// A fresh SQLite file with the test schema, removed on drop.
pub struct TestDb {
    pub path: PathBuf,
    pub configuration: Arc<Configuration>,
}

impl TestDb {
    pub fn new(label: &str) -> Self {
        Self::with(label, |builder, _| builder)
    }

    /// Like [`TestDb::new`], letting the caller add databases or locales.
    /// `configure` also receives the database file path.
    pub fn with(
        label: &str,
        configure: impl FnOnce(activerow::ConfigurationBuilder, &str) -> activerow::ConfigurationBuilder,
    ) -> Self {
        let path = std::env::temp_dir().join(format!(
            "activerow-{}-{}-{}.db",
            label,
            std::process::id(),
            NEXT_DB.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = std::fs::remove_file(&path);
        let setup = SqliteConnection::open_file(path.to_string_lossy()).expect("open sqlite file");
        setup.execute_raw(SCHEMA).expect("create schema");
        drop(setup);

        let file = path.to_string_lossy().into_owned();
        let builder = Configuration::builder()
            .database(sqlite_database("default", file.as_str()))
            .registry(registry());
        let configuration = configure(builder, &file)
            .build()
            .expect("valid configuration");
        Self {
            path,
            configuration,
        }
    }

    pub fn session(&self) -> Session {
        Session::new(Arc::clone(&self.configuration))
    }
}

impl Drop for TestDb {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Names of every row in `table`, ordered by id.
pub async fn names(cx: &Cx, session: &Session, entity: &str) -> Vec<String> {
    let query = session
        .where_query(entity)
        .expect("known entity")
        .order("id", OrderDirection::Asc);
    unwrap_outcome(session.load_all(cx, &query).await)
        .iter()
        .map(|r| r.get("name").unwrap().as_str().unwrap_or_default().to_string())
        .collect()
}
