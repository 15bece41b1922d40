mod common;

use activerow::prelude::*;
use activerow::{ConfigErrorKind, RecordState, ValidationErrorKind};
use asupersync::runtime::RuntimeBuilder;
use common::{TestDb, expect_err, names, unwrap_outcome};

fn run<F: std::future::Future<Output = ()>>(test: impl FnOnce(Cx) -> F) {
    let rt = RuntimeBuilder::current_thread()
        .build()
        .expect("create asupersync runtime");
    let cx = Cx::for_testing();
    rt.block_on(test(cx));
}

#[test]
fn saved_records_read_back_identically() {
    let db = TestDb::new("roundtrip");
    run(|cx| async move {
        let session = db.session();
        let mut project = session.build("Project").unwrap();
        project.set("name", "Launch").unwrap();
        project.set("code", "L-1").unwrap();
        unwrap_outcome(project.save(&cx, &session).await);

        assert!(!project.is_new_record());
        assert!(!project.has_changes());
        assert_eq!(project.id(), &Value::BigInt(1));

        let found = unwrap_outcome(session.find(&cx, "Project", 1).await);
        assert_eq!(found.attributes(), project.attributes());
    });
}

#[test]
fn belongs_to_targets_are_saved_first() {
    let db = TestDb::new("belongs-to");
    run(|cx| async move {
        let session = db.session();
        let mut task = session.build("Task").unwrap();
        task.set("name", "Write docs").unwrap();
        task.build_relationship("project")
            .unwrap()
            .set("name", "Docs")
            .unwrap();
        unwrap_outcome(task.save(&cx, &session).await);

        let project = task
            .relationship("project")
            .unwrap()
            .and_then(RelationshipValue::as_one)
            .expect("project kept in memory");
        assert!(project.is_persisted());
        assert_eq!(task.get("project_id").unwrap(), project.id());

        let mut found = unwrap_outcome(session.find(&cx, "Task", task.id().clone()).await);
        let loaded = unwrap_outcome(found.load_relationship(&cx, &session, "project").await);
        assert_eq!(
            loaded.as_one().unwrap().get("name").unwrap(),
            &Value::from("Docs")
        );
    });
}

#[test]
fn built_belongs_to_targets_get_their_inverse_collection() {
    // Project also declares the scoped `done_tasks` over the same key.
    let mut task = Record::new(common::registry(), "Task").unwrap();
    let project = task.build_relationship("project").unwrap();
    let inverse = project
        .relationship_state("tasks")
        .expect("inverse collection wired");
    assert!(inverse.is_preloaded());
    assert!(!inverse.auto_save());
    assert!(inverse.value().is_empty());
    assert!(project.relationship_state("done_tasks").is_none());
}

#[test]
fn has_many_children_receive_the_owner_key() {
    let db = TestDb::new("has-many");
    run(|cx| async move {
        let session = db.session();
        let mut project = session.build("Project").unwrap();
        project.set("name", "Launch").unwrap();
        project
            .build_relationship("tasks")
            .unwrap()
            .set("name", "Plan")
            .unwrap();
        let shipped = project.build_relationship("tasks").unwrap();
        shipped.set("name", "Ship").unwrap();
        shipped.set("done", 1).unwrap();
        unwrap_outcome(project.save(&cx, &session).await);

        let mut found = unwrap_outcome(session.find(&cx, "Project", project.id().clone()).await);
        let tasks = unwrap_outcome(found.load_relationship(&cx, &session, "tasks").await);
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.get("project_id").unwrap() == project.id()));

        let done = unwrap_outcome(found.load_relationship(&cx, &session, "done_tasks").await);
        assert_eq!(done.len(), 1);
        assert_eq!(
            done.as_many()[0].get("name").unwrap(),
            &Value::from("Ship")
        );
    });
}

#[test]
fn updates_write_only_changed_columns() {
    let db = TestDb::new("partial-update");
    run(|cx| async move {
        let session = db.session();
        let mut task = session.build("Task").unwrap();
        task.set("name", "Draft").unwrap();
        unwrap_outcome(task.save(&cx, &session).await);

        let mut renamed = unwrap_outcome(session.find(&cx, "Task", task.id().clone()).await);
        let mut finished = renamed.clone();
        renamed.set("name", "Final").unwrap();
        finished.set("done", 1).unwrap();
        unwrap_outcome(renamed.save(&cx, &session).await);
        unwrap_outcome(finished.save(&cx, &session).await);

        unwrap_outcome(session.reload(&cx, &mut task).await);
        assert_eq!(task.get("name").unwrap(), &Value::from("Final"));
        assert_eq!(task.get("done").unwrap(), &Value::BigInt(1));
    });
}

#[test]
fn validation_collects_messages_and_writes_nothing() {
    let db = TestDb::new("validation");
    run(|cx| async move {
        let session = db.session();
        let mut blank = session.build("Project").unwrap();
        let err = expect_err(blank.save(&cx, &session).await);
        assert_eq!(err.to_string(), "Name can't be blank");
        assert!(blank.is_new_record());

        let mut first = session.build("Project").unwrap();
        first.set("name", "Launch").unwrap();
        unwrap_outcome(first.save(&cx, &session).await);

        let mut duplicate = session.build("Project").unwrap();
        duplicate.set("name", "Launch").unwrap();
        let err = expect_err(duplicate.save(&cx, &session).await);
        let errors = err.as_validation().expect("validation error");
        assert!(errors.has("name", ValidationErrorKind::Taken));
        assert_eq!(err.to_string(), "Name has already been taken");

        // Uniqueness ignores the record's own row.
        first.set("code", "launch").unwrap();
        unwrap_outcome(first.save(&cx, &session).await);

        let mut task = session.build("Task").unwrap();
        task.set("name", "x".repeat(41)).unwrap();
        let err = expect_err(task.save(&cx, &session).await);
        assert_eq!(
            err.to_string(),
            "Name is too long (maximum is 40 characters)"
        );
        assert_eq!(names(&cx, &session, "Task").await, Vec::<String>::new());
    });
}

#[test]
fn failed_saves_restore_the_record_tree() {
    let db = TestDb::new("restore");
    run(|cx| async move {
        let session = db.session();
        let mut task = session.build("Task").unwrap();
        task.set("name", "Orphan").unwrap();
        // The project is invalid: no name.
        task.build_relationship("project").unwrap();

        let err = expect_err(task.save(&cx, &session).await);
        assert_eq!(err.to_string(), "Name can't be blank");
        assert!(task.is_new_record());
        assert_eq!(task.id(), &Value::Null);
        assert!(names(&cx, &session, "Task").await.is_empty());
        assert!(names(&cx, &session, "Project").await.is_empty());
    });
}

#[test]
fn failed_saves_inside_a_transaction_roll_back_to_their_savepoint() {
    let db = TestDb::new("save-savepoint");
    run(|cx| async move {
        let session = db.session();
        let outcome = session
            .transaction(&cx, "default", async |scoped: Session| {
                let mut kept = try_result!(scoped.build("Project"));
                try_result!(kept.set("name", "Upkeep"));
                try_outcome!(kept.save(&cx, &scoped).await);

                let mut project = try_result!(scoped.build("Project"));
                try_result!(project.set("name", "Launch"));
                // The task has no name, so it fails after the project row is written.
                try_result!(project.build_relationship("tasks"));
                let failed = project.save(&cx, &scoped).await;
                assert!(matches!(failed, Outcome::Err(Error::Validation(_))));
                assert!(project.is_new_record());

                let connection = try_outcome!(scoped.connection(&cx, "default").await);
                assert_eq!(connection.transaction_depth(), 1);
                Outcome::Ok(())
            })
            .await;
        unwrap_outcome(outcome);

        assert_eq!(names(&cx, &session, "Project").await, vec!["Upkeep"]);
        assert!(names(&cx, &session, "Task").await.is_empty());
    });
}

#[test]
fn find_reports_missing_rows() {
    let db = TestDb::new("find");
    run(|cx| async move {
        let session = db.session();
        let err = expect_err(session.find(&cx, "Project", 42).await);
        assert!(matches!(err, Error::RecordNotFound(_)));
        assert_eq!(err.to_string(), "Couldn't find Project with 'id'=42");

        let none = unwrap_outcome(
            session
                .find_by(&cx, "Task", &[("name", Value::from("nothing"))])
                .await,
        );
        assert!(none.is_none());
    });
}

#[test]
fn destroy_removes_dependents_first() {
    let db = TestDb::new("destroy");
    run(|cx| async move {
        let session = db.session();
        let mut project = session.build("Project").unwrap();
        project.set("name", "Launch").unwrap();
        for name in ["Plan", "Ship"] {
            project
                .build_relationship("tasks")
                .unwrap()
                .set("name", name)
                .unwrap();
        }
        project
            .build_relationship("project_detail")
            .unwrap()
            .set("summary", "All of it")
            .unwrap();
        unwrap_outcome(project.save(&cx, &session).await);

        let mut stranger = session.build("Task").unwrap();
        stranger.set("name", "Unrelated").unwrap();
        unwrap_outcome(stranger.save(&cx, &session).await);

        let mut found = unwrap_outcome(session.find(&cx, "Project", project.id().clone()).await);
        unwrap_outcome(found.destroy(&cx, &session).await);
        assert_eq!(found.state(), RecordState::Destroyed);

        assert_eq!(names(&cx, &session, "Task").await, vec!["Unrelated"]);
        assert!(names(&cx, &session, "Project").await.is_empty());
        let details = session.where_query("ProjectDetail").unwrap();
        assert_eq!(unwrap_outcome(session.count(&cx, &details).await), 0);

        let err = found.set("name", "Again").unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidState));
        let err = expect_err(found.save(&cx, &session).await);
        assert_eq!(err.to_string(), "Cannot use a destroyed Project record");
    });
}

#[test]
fn uuid_keys_are_generated_client_side_for_sqlite() {
    let db = TestDb::new("uuid");
    run(|cx| async move {
        let session = db.session();
        let mut user = session.build("User").unwrap();
        user.set("email", "ada@example.com").unwrap();
        unwrap_outcome(user.save(&cx, &session).await);

        let id = user.id().as_str().expect("text key").to_string();
        assert_eq!(id.len(), 36);
        assert!(Value::from(id.as_str()).as_uuid().is_some());

        let found = unwrap_outcome(session.find(&cx, "User", id.as_str()).await);
        assert_eq!(found.get("email").unwrap(), &Value::from("ada@example.com"));

        let mut twin = session.build("User").unwrap();
        twin.set("email", "ada@example.com").unwrap();
        let err = expect_err(twin.save(&cx, &session).await);
        assert_eq!(err.to_string(), "Email has already been taken");

        let mut malformed = session.build("User").unwrap();
        malformed.set("email", "not an address").unwrap();
        let err = expect_err(malformed.save(&cx, &session).await);
        assert_eq!(err.to_string(), "Email is invalid");
    });
}

#[test]
fn translations_follow_the_locale_chain() {
    let db = TestDb::with("translations", |builder, _| {
        builder.locale_fallbacks("fr-CA", &["fr"])
    });
    run(|cx| async move {
        let session = db.session();
        let mut article = session.build("Article").unwrap();
        article.set("slug", "hello").unwrap();
        unwrap_outcome(
            article
                .set_translated_attribute(&cx, &session, "title", "en", "Hello")
                .await,
        );
        unwrap_outcome(
            article
                .set_translated_attribute(&cx, &session, "title", "fr", "Bonjour")
                .await,
        );
        unwrap_outcome(article.save(&cx, &session).await);

        let mut found = unwrap_outcome(session.find(&cx, "Article", article.id().clone()).await);
        let title = unwrap_outcome(
            found
                .translated_attribute(&cx, &session, "title", &session.locale_chain("fr-CA"))
                .await,
        );
        assert_eq!(title, Some(Value::from("Bonjour")));
        let title = unwrap_outcome(
            found
                .translated_attribute(&cx, &session, "title", &session.locale_chain("de"))
                .await,
        );
        assert_eq!(title, Some(Value::from("Hello")));

        unwrap_outcome(
            found
                .set_translated_attribute(&cx, &session, "title", "fr", "Salut")
                .await,
        );
        unwrap_outcome(found.save(&cx, &session).await);
        let rows = session.where_query("ArticleTranslation").unwrap();
        assert_eq!(unwrap_outcome(session.count(&cx, &rows).await), 2);

        let err = expect_err(
            found
                .translated_attribute(&cx, &session, "slug", &session.locale_chain("en"))
                .await,
        );
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnknownAttribute));
    });
}
