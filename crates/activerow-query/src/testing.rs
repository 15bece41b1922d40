//! Shared test fixtures.

use activerow_core::{EntitySchema, Registry, Scope};
use std::sync::Arc;

/// Projects with tasks, a scoped `done_tasks` and one detail row.
pub(crate) fn registry() -> Arc<Registry> {
    Registry::builder()
        .entity(
            EntitySchema::builder("Project", "projects")
                .attributes(&["name"])
                .has_many("tasks", "Task", |r| r)
                .has_many("done_tasks", "Task", |r| r.scope(Scope::new().eq("done", true)))
                .has_one("project_detail", "ProjectDetail", |r| r)
                .build(),
        )
        .entity(
            EntitySchema::builder("Task", "tasks")
                .attributes(&["name", "done"])
                .belongs_to("project", "Project", |r| r)
                .build(),
        )
        .entity(
            EntitySchema::builder("ProjectDetail", "project_details")
                .attributes(&["summary"])
                .belongs_to("project", "Project", |r| r)
                .build(),
        )
        .build()
        .expect("valid test registry")
}
