//! Saving and destroying records.
//!
//! `save` validates, then runs in its own transaction (a savepoint when the
//! connection already has one open): loaded belongs-to targets are saved
//! first and their keys copied into this record, the row is inserted or its
//! changed columns updated, and loaded has-many/has-one targets are saved
//! last with this record's key. Related records recurse through boxed
//! futures.
//!
//! When a save or destroy fails, the record tree is restored to its state
//! before the call and the rows written so far are rolled back with its
//! transaction or savepoint.

use crate::record::{Record, RecordState};
use crate::relationships::InstanceRelationship;
use crate::session::Session;
use activerow_core::{
    Cx, Error, Outcome, PrimaryKeyStrategy, RelationshipDefinition, Value, try_outcome,
    try_result,
};
use activerow_query::{DeleteStatement, Expr, InsertStatement, UpdateStatement};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;

/// Boxed future for recursive record operations.
pub type LocalBoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

impl Record {
    /// Persist this record and its auto-saved relationships.
    ///
    /// A persisted record without changes or pending related saves is left
    /// alone. Validation failures surface as [`Error::Validation`] before
    /// any SQL runs for this record.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %self.schema.name()))]
    pub async fn save(&mut self, cx: &Cx, session: &Session) -> Outcome<(), Error> {
        try_result!(self.ensure_usable());
        if !self.needs_save() {
            tracing::trace!("Nothing to save");
            return Outcome::Ok(());
        }

        let errors = try_outcome!(self.validate(cx, session).await);
        if !errors.is_empty() {
            tracing::debug!(violations = errors.errors.len(), "Validation failed");
            return Outcome::Err(Error::Validation(errors));
        }

        let connection = try_outcome!(session.connection(cx, self.schema.database()).await);
        let snapshot = self.clone();
        let outcome = connection
            .transaction(cx, async || self.persist_tree(cx, session, true).await)
            .await;
        if !matches!(outcome, Outcome::Ok(())) {
            *self = snapshot;
        }
        outcome
    }

    fn persist_tree<'a>(
        &'a mut self,
        cx: &'a Cx,
        session: &'a Session,
        validated: bool,
    ) -> LocalBoxFuture<'a, Outcome<(), Error>> {
        Box::pin(async move {
            try_result!(self.ensure_usable());
            if !self.needs_save() {
                return Outcome::Ok(());
            }
            if !validated {
                let errors = try_outcome!(self.validate(cx, session).await);
                if !errors.is_empty() {
                    return Outcome::Err(Error::Validation(errors));
                }
            }

            let mut related = std::mem::take(&mut self.relationships);
            let outcome = self.persist_with(cx, session, &mut related).await;
            self.relationships = related;
            outcome
        })
    }

    async fn persist_with(
        &mut self,
        cx: &Cx,
        session: &Session,
        related: &mut BTreeMap<String, InstanceRelationship>,
    ) -> Outcome<(), Error> {
        let definitions = self.schema.relationships().to_vec();

        for definition in &definitions {
            let RelationshipDefinition::BelongsTo {
                name,
                foreign_key,
                primary_key,
                ..
            } = definition
            else {
                continue;
            };
            let Some(state) = related.get_mut(name) else {
                continue;
            };
            if !state.auto_save {
                continue;
            }
            match state.value.as_one_mut() {
                Some(target) => {
                    if !target.is_destroyed() {
                        try_outcome!(target.persist_tree(cx, session, false).await);
                    }
                    let key = try_result!(target.get(primary_key)).clone();
                    self.write_attribute(foreign_key, key);
                }
                None if state.dirty => self.write_attribute(foreign_key, Value::Null),
                None => {}
            }
        }

        if self.is_new_record() {
            try_outcome!(self.insert_row(cx, session).await);
        } else if self.has_changes() {
            try_outcome!(self.update_row(cx, session).await);
        }

        for definition in &definitions {
            let (RelationshipDefinition::HasMany {
                name,
                foreign_key,
                primary_key,
                ..
            }
            | RelationshipDefinition::HasOne {
                name,
                foreign_key,
                primary_key,
                ..
            }) = definition
            else {
                continue;
            };
            let Some(state) = related.get_mut(name) else {
                continue;
            };
            if !state.auto_save {
                continue;
            }
            let key = try_result!(self.get(primary_key)).clone();
            for child in state.value.iter_mut().filter(|r| !r.is_destroyed()) {
                if child.get(foreign_key).ok() != Some(&key) {
                    child.write_attribute(foreign_key, key.clone());
                }
                try_outcome!(child.persist_tree(cx, session, false).await);
            }
        }

        for state in related.values_mut() {
            state.dirty = false;
        }
        Outcome::Ok(())
    }

    /// Primary key to insert for a record that has none yet.
    fn key_for_insert(&self, supports_default_uuid: bool) -> Option<Value> {
        match self.schema.key_strategy() {
            PrimaryKeyStrategy::AutoIncrement | PrimaryKeyStrategy::Manual => None,
            PrimaryKeyStrategy::Uuid if supports_default_uuid => Some(Value::Default),
            PrimaryKeyStrategy::Uuid => Some(Value::Text(uuid::Uuid::new_v4().to_string())),
        }
    }

    async fn insert_row(&mut self, cx: &Cx, session: &Session) -> Outcome<(), Error> {
        let connection = try_outcome!(session.connection(cx, self.schema.database()).await);
        let driver = connection.driver();
        let primary_key = self.schema.primary_key().to_string();

        if self.id().is_null() {
            match self.key_for_insert(driver.supports_default_primary_key_uuid()) {
                Some(Value::Default) => {}
                Some(key) => self.write_attribute(&primary_key, key),
                None => {}
            }
        }

        let mut statement = InsertStatement::new(self.schema.table());
        for name in self.schema.attribute_names() {
            let value = self.value_of(name);
            if name == primary_key && value.is_null() {
                if self.schema.key_strategy() == PrimaryKeyStrategy::Uuid {
                    statement = statement.value(name, Value::Default);
                }
                continue;
            }
            statement = statement.value(name, value);
        }

        let (sql, params) = statement.build(&*driver);
        let generated = try_outcome!(connection.insert(cx, &sql, &params).await);
        let assigned = self.id().is_null() && self.schema.key_strategy() != PrimaryKeyStrategy::Manual;
        self.mark_persisted();
        if assigned {
            if let Some(key) = generated.filter(|k| !k.is_null()) {
                self.persisted.insert(primary_key, key);
            }
        }
        tracing::debug!(entity = %self.schema.name(), id = %self.id(), "Inserted record");
        Outcome::Ok(())
    }

    fn value_of(&self, name: &str) -> Value {
        self.get(name).cloned().unwrap_or(Value::Null)
    }

    async fn update_row(&mut self, cx: &Cx, session: &Session) -> Outcome<(), Error> {
        let connection = try_outcome!(session.connection(cx, self.schema.database()).await);
        let driver = connection.driver();
        let primary_key = self.schema.primary_key();
        let persisted_key = self
            .persisted
            .get(primary_key)
            .cloned()
            .unwrap_or(Value::Null);

        let mut statement = UpdateStatement::new(self.schema.table());
        for (name, value) in &self.changes {
            statement = statement.set(name.clone(), value.clone());
        }
        let (sql, params) = statement
            .filter(Expr::col(primary_key).eq(persisted_key))
            .build(&*driver);
        let affected = try_outcome!(connection.execute(cx, &sql, &params).await);
        tracing::debug!(
            entity = %self.schema.name(),
            id = %self.id(),
            columns = self.changes.len(),
            affected,
            "Updated record"
        );
        self.mark_persisted();
        Outcome::Ok(())
    }

    /// Delete this record, destroying dependent related records first.
    ///
    /// Dependent has-many/has-one targets are loaded when needed and
    /// destroyed before the row is deleted; a dependent belongs-to target is
    /// destroyed after it. A new record is only marked destroyed.
    #[tracing::instrument(level = "debug", skip_all, fields(entity = %self.schema.name()))]
    pub async fn destroy(&mut self, cx: &Cx, session: &Session) -> Outcome<(), Error> {
        try_result!(self.ensure_usable());
        if self.is_new_record() {
            self.state = RecordState::Destroyed;
            return Outcome::Ok(());
        }
        let connection = try_outcome!(session.connection(cx, self.schema.database()).await);
        let snapshot = self.clone();
        let outcome = connection
            .transaction(cx, async || self.destroy_tree(cx, session).await)
            .await;
        if !matches!(outcome, Outcome::Ok(())) {
            *self = snapshot;
        }
        outcome
    }

    fn destroy_tree<'a>(
        &'a mut self,
        cx: &'a Cx,
        session: &'a Session,
    ) -> LocalBoxFuture<'a, Outcome<(), Error>> {
        Box::pin(async move {
            if self.is_destroyed() {
                return Outcome::Ok(());
            }
            if self.is_new_record() {
                self.state = RecordState::Destroyed;
                return Outcome::Ok(());
            }

            let dependents: Vec<RelationshipDefinition> = self
                .schema
                .relationships()
                .iter()
                .filter(|r| r.options().dependent_destroy)
                .cloned()
                .collect();
            for definition in &dependents {
                try_outcome!(self.load_relationship(cx, session, definition.name()).await);
            }

            for definition in dependents.iter().filter(|r| r.owner_foreign_key().is_none()) {
                try_outcome!(self.destroy_related(cx, session, definition.name()).await);
            }

            try_outcome!(self.delete_row(cx, session).await);
            self.state = RecordState::Destroyed;

            for definition in dependents.iter().filter(|r| r.owner_foreign_key().is_some()) {
                try_outcome!(self.destroy_related(cx, session, definition.name()).await);
            }
            Outcome::Ok(())
        })
    }

    async fn destroy_related(&mut self, cx: &Cx, session: &Session, name: &str) -> Outcome<(), Error> {
        let Some(state) = self.relationships.get_mut(name) else {
            return Outcome::Ok(());
        };
        for record in state.value.iter_mut() {
            try_outcome!(record.destroy_tree(cx, session).await);
        }
        Outcome::Ok(())
    }

    async fn delete_row(&self, cx: &Cx, session: &Session) -> Outcome<(), Error> {
        let connection = try_outcome!(session.connection(cx, self.schema.database()).await);
        let driver = connection.driver();
        let primary_key = self.schema.primary_key();
        let key = self
            .persisted
            .get(primary_key)
            .cloned()
            .unwrap_or(Value::Null);
        let (sql, params) = DeleteStatement::new(self.schema.table())
            .filter(Expr::col(primary_key).eq(key))
            .build(&*driver);
        try_outcome!(connection.execute(cx, &sql, &params).await);
        tracing::debug!(entity = %self.schema.name(), id = %self.id(), "Deleted record");
        Outcome::Ok(())
    }
}
