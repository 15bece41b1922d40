//! Shared test fixtures.

use activerow_core::{EntitySchema, Registry, Scope};
use regex::Regex;
use std::sync::Arc;

/// Projects with tasks and details, plus translated articles.
pub(crate) fn registry() -> Arc<Registry> {
    Registry::builder()
        .entity(
            EntitySchema::builder("Project", "projects")
                .attributes(&["name", "code"])
                .validates_presence("name")
                .validates_format("code", Regex::new("^[a-z0-9-]+$").unwrap())
                .has_many("tasks", "Task", |r| r.dependent_destroy())
                .has_many("done_tasks", "Task", |r| r.scope(Scope::new().eq("done", true)))
                .has_one("project_detail", "ProjectDetail", |r| r)
                .build(),
        )
        .entity(
            EntitySchema::builder("Task", "tasks")
                .attribute("name")
                .attribute_with_default("done", false)
                .validates_presence("name")
                .belongs_to("project", "Project", |r| r)
                .build(),
        )
        .entity(
            EntitySchema::builder("ProjectDetail", "project_details")
                .attributes(&["summary"])
                .belongs_to("project", "Project", |r| r)
                .build(),
        )
        .entity(
            EntitySchema::builder("Article", "articles")
                .attributes(&["slug"])
                .translates("ArticleTranslation", &["title"])
                .build(),
        )
        .entity(
            EntitySchema::builder("ArticleTranslation", "article_translations")
                .attributes(&["article_id", "locale", "title"])
                .build(),
        )
        .build()
        .expect("valid test registry")
}
