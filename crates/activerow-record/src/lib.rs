//! Records for activerow.
//!
//! `activerow-record` is the **lifecycle layer**. A [`Record`] is one row of
//! an entity, read and written by attribute name through its schema, with
//! dirty tracking, cached relationships, validation and translated
//! attributes. A [`Session`] carries the configuration and execution scope
//! every operation resolves its connection through, and hosts the finders.
//!
//! # Lifecycle
//!
//! - **New → Persisted**: `save` validates, inserts, and saves loaded
//!   related records in dependency order inside one transaction.
//! - **Persisted**: `save` updates only changed columns; nothing to do means
//!   no SQL at all.
//! - **Destroyed**: `destroy` deletes dependents first; every later
//!   operation fails.
//!
//! # Example
//!
//! ```ignore
//! let session = Session::new(configuration);
//! let found = session
//!     .with_connections(&cx, async |session: Session| {
//!         let mut task = try_result!(session.build("Task"));
//!         try_result!(task.set("name", "Write docs"));
//!         try_result!(try_result!(task.build_relationship("project")).set("name", "Docs"));
//!         try_outcome!(task.save(&cx, &session).await);
//!         session.find(&cx, "Task", task.id().clone()).await
//!     })
//!     .await;
//! ```

pub mod lifecycle;
pub mod record;
pub mod relationships;
pub mod session;
pub mod translations;
pub mod validation;

#[cfg(test)]
mod testing;

pub use lifecycle::LocalBoxFuture;
pub use record::{Record, RecordState};
pub use relationships::{InstanceRelationship, RelationshipValue};
pub use session::Session;
