//! Per-record relationship state.
//!
//! Each record caches what it knows about its relationships: the related
//! records, whether that value reflects the database (`preloaded`), whether
//! it was assigned or built since the last save (`dirty`), and whether the
//! related records are persisted together with the owner (`auto_save`).

use crate::record::Record;
use crate::session::Session;
use activerow_core::{
    ComparisonOp, ConfigErrorKind, Cx, EntitySchema, Error, Outcome, RelationshipDefinition,
    Result, ScopeCondition, Value, try_outcome, try_result,
};
use activerow_query::Query;
use std::sync::Arc;

/// Related records held by a record.
#[derive(Debug, Clone)]
pub enum RelationshipValue {
    /// Belongs-to or has-one target; `None` when there is none.
    One(Option<Box<Record>>),
    /// Has-many targets.
    Many(Vec<Record>),
}

impl RelationshipValue {
    /// The single target, if this is a to-one value holding one.
    pub fn as_one(&self) -> Option<&Record> {
        match self {
            RelationshipValue::One(target) => target.as_deref(),
            RelationshipValue::Many(_) => None,
        }
    }

    pub fn as_one_mut(&mut self) -> Option<&mut Record> {
        match self {
            RelationshipValue::One(target) => target.as_deref_mut(),
            RelationshipValue::Many(_) => None,
        }
    }

    /// The targets of a to-many value; empty for to-one values.
    pub fn as_many(&self) -> &[Record] {
        match self {
            RelationshipValue::Many(records) => records,
            RelationshipValue::One(_) => &[],
        }
    }

    /// Every related record.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        let (one, many) = match self {
            RelationshipValue::One(target) => (target.as_deref(), <&[Record]>::default()),
            RelationshipValue::Many(records) => (None, records.as_slice()),
        };
        one.into_iter().chain(many)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Record> {
        let (one, many) = match self {
            RelationshipValue::One(target) => (target.as_deref_mut(), <&mut [Record]>::default()),
            RelationshipValue::Many(records) => (None, records.as_mut_slice()),
        };
        one.into_iter().chain(many)
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn empty_for(definition: &RelationshipDefinition) -> Self {
        if definition.is_collection() {
            RelationshipValue::Many(Vec::new())
        } else {
            RelationshipValue::One(None)
        }
    }
}

/// Cached state of one relationship on one record.
#[derive(Debug, Clone)]
pub struct InstanceRelationship {
    pub(crate) value: RelationshipValue,
    pub(crate) preloaded: bool,
    pub(crate) dirty: bool,
    pub(crate) auto_save: bool,
}

impl InstanceRelationship {
    pub(crate) fn loaded(value: RelationshipValue, auto_save: bool) -> Self {
        Self {
            value,
            preloaded: true,
            dirty: false,
            auto_save,
        }
    }

    pub fn value(&self) -> &RelationshipValue {
        &self.value
    }

    /// The value reflects the database or an explicit assignment, so reads
    /// need no query.
    pub fn is_preloaded(&self) -> bool {
        self.preloaded
    }

    /// Assigned or built since the last save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn auto_save(&self) -> bool {
        self.auto_save
    }

    /// Whether saving the owner has work to do for this relationship.
    pub(crate) fn needs_save(&self) -> bool {
        self.auto_save
            && (self.dirty
                || self
                    .value
                    .iter()
                    .any(|r| !r.is_destroyed() && r.needs_save()))
    }
}

impl Record {
    /// Definition of `name` and its target schema.
    pub(crate) fn resolve_relationship(
        &self,
        name: &str,
    ) -> Result<(RelationshipDefinition, Arc<EntitySchema>)> {
        let (definition, target) = self.registry.relationship(self.schema.name(), name)?;
        Ok((definition.clone(), Arc::clone(target)))
    }

    /// Cached value of a relationship; `None` until loaded, assigned or
    /// built.
    pub fn relationship(&self, name: &str) -> Result<Option<&RelationshipValue>> {
        self.resolve_relationship(name)?;
        Ok(self.relationships.get(name).map(|r| &r.value))
    }

    /// Mutable access to a cached relationship value. Changes made to the
    /// related records are saved with the owner when the relationship
    /// auto-saves.
    pub fn relationship_mut(&mut self, name: &str) -> Result<Option<&mut RelationshipValue>> {
        self.resolve_relationship(name)?;
        Ok(self.relationships.get_mut(name).map(|r| &mut r.value))
    }

    /// Full cached state of a relationship.
    pub fn relationship_state(&self, name: &str) -> Option<&InstanceRelationship> {
        self.relationships.get(name)
    }

    /// Whether `name` holds a value that reflects the database.
    pub fn is_relationship_loaded(&self, name: &str) -> bool {
        self.relationships.get(name).is_some_and(|r| r.preloaded)
    }

    /// Assign a relationship.
    ///
    /// To-one relationships take [`RelationshipValue::One`], has-many takes
    /// [`RelationshipValue::Many`]. Assigning a belongs-to copies the
    /// target's key into the foreign key right away when the target has
    /// one; otherwise the key is copied when the owner is saved.
    pub fn set_relationship(&mut self, name: &str, value: RelationshipValue) -> Result<()> {
        self.ensure_usable()?;
        let (definition, target) = self.resolve_relationship(name)?;
        let shape_matches = matches!(
            (&value, definition.is_collection()),
            (RelationshipValue::Many(_), true) | (RelationshipValue::One(_), false)
        );
        if !shape_matches {
            let expected = if definition.is_collection() { "many records" } else { "one record" };
            return Err(Error::config(
                ConfigErrorKind::Invalid,
                format!(
                    "Relationship \"{}\" on {} holds {}",
                    name,
                    self.schema.name(),
                    expected
                ),
            ));
        }
        if let Some(other) = value.iter().find(|r| r.entity() != target.name()) {
            return Err(Error::config(
                ConfigErrorKind::Invalid,
                format!(
                    "Relationship \"{}\" on {} expects {} records, got {}",
                    name,
                    self.schema.name(),
                    target.name(),
                    other.entity()
                ),
            ));
        }

        if let RelationshipDefinition::BelongsTo {
            foreign_key,
            primary_key,
            ..
        } = &definition
        {
            match value.as_one() {
                Some(target) => {
                    let key = target.get(primary_key)?.clone();
                    if !key.is_null() {
                        self.write_attribute(foreign_key, key);
                    }
                }
                None => self.write_attribute(foreign_key, Value::Null),
            }
        }

        self.relationships.insert(
            name.to_string(),
            InstanceRelationship {
                value,
                preloaded: true,
                dirty: true,
                auto_save: definition.options().auto_save,
            },
        );
        Ok(())
    }

    /// Build a new related record and attach it.
    ///
    /// Belongs-to: the built record replaces the target, and its inverse
    /// has-one/has-many is marked preloaded (it cannot have rows yet) and
    /// not auto-saved. Has-many: the record is appended to the collection.
    /// Has-one: the record replaces the target. To-many and has-one builds
    /// receive the owner's key (when it has one) and the equality
    /// conditions of the relationship's scope.
    pub fn build_relationship(&mut self, name: &str) -> Result<&mut Record> {
        self.ensure_usable()?;
        let (definition, target) = self.resolve_relationship(name)?;
        let mut built = Record::with_schema(Arc::clone(&self.registry), target);
        let auto_save = definition.options().auto_save;

        match &definition {
            RelationshipDefinition::BelongsTo { .. } => {
                if let Some(inverse) = self.registry.inverse_of(self.schema.name(), name) {
                    built.relationships.insert(
                        inverse.name().to_string(),
                        InstanceRelationship {
                            value: RelationshipValue::empty_for(inverse),
                            preloaded: true,
                            dirty: false,
                            auto_save: false,
                        },
                    );
                }
                self.relationships.insert(
                    name.to_string(),
                    InstanceRelationship {
                        value: RelationshipValue::One(Some(Box::new(built))),
                        preloaded: true,
                        dirty: true,
                        auto_save,
                    },
                );
            }
            RelationshipDefinition::HasMany {
                foreign_key,
                primary_key,
                ..
            }
            | RelationshipDefinition::HasOne {
                foreign_key,
                primary_key,
                ..
            } => {
                for condition in definition.scope().map(|s| s.conditions()).unwrap_or_default() {
                    if let ScopeCondition::Compare {
                        column,
                        op: ComparisonOp::Eq,
                        value,
                    } = condition
                    {
                        built.write_attribute(column, value.clone());
                    }
                }
                let owner_key = self.get(primary_key)?.clone();
                if !owner_key.is_null() {
                    built.write_attribute(foreign_key, owner_key);
                }

                if definition.is_collection() {
                    let owner_is_new = self.is_new_record();
                    let state = self
                        .relationships
                        .entry(name.to_string())
                        .or_insert_with(|| InstanceRelationship {
                            value: RelationshipValue::Many(Vec::new()),
                            // A new owner has no rows to load.
                            preloaded: owner_is_new,
                            dirty: false,
                            auto_save,
                        });
                    if let RelationshipValue::Many(records) = &mut state.value {
                        records.push(built);
                    }
                    state.dirty = true;
                } else {
                    self.relationships.insert(
                        name.to_string(),
                        InstanceRelationship {
                            value: RelationshipValue::One(Some(Box::new(built))),
                            preloaded: true,
                            dirty: true,
                            auto_save,
                        },
                    );
                }
            }
        }

        tracing::trace!(
            entity = %self.schema.name(),
            relationship = %name,
            "Built related record"
        );
        let built = self.relationships.get_mut(name).and_then(|r| match &mut r.value {
            RelationshipValue::One(target) => target.as_deref_mut(),
            RelationshipValue::Many(records) => records.last_mut(),
        });
        built.ok_or_else(|| {
            Error::config(
                ConfigErrorKind::InvalidState,
                format!("Relationship \"{}\" lost its built record", name),
            )
        })
    }

    /// Load a relationship unless it is already preloaded, and return it.
    ///
    /// Scopes are applied to the target table. Unsaved records built into a
    /// not-yet-loaded collection are kept after the loaded rows.
    #[tracing::instrument(level = "debug", skip(self, cx, session), fields(entity = %self.schema.name()))]
    pub async fn load_relationship(
        &mut self,
        cx: &Cx,
        session: &Session,
        name: &str,
    ) -> Outcome<&RelationshipValue, Error> {
        try_result!(self.ensure_usable());
        let (definition, target) = try_result!(self.resolve_relationship(name));

        if !self.is_relationship_loaded(name) {
            let (target_column, owner_column) = definition.join_columns();
            let key = try_result!(self.get(owner_column)).clone();
            let owner_has_rows = match &definition {
                RelationshipDefinition::BelongsTo { .. } => true,
                RelationshipDefinition::HasMany { .. } | RelationshipDefinition::HasOne { .. } => {
                    self.is_persisted()
                }
            };

            let fetched = if key.is_null() || !owner_has_rows {
                Vec::new()
            } else {
                let mut query = try_result!(Query::new(Arc::clone(&self.registry), target.name()))
                    .where_eq(target_column, key);
                if let Some(scope) = definition.scope() {
                    query = query.apply_scope(scope);
                }
                if !definition.is_collection() {
                    query = query.limit(1);
                }
                try_outcome!(session.load_all(cx, &query).await)
            };
            tracing::debug!(
                relationship = %name,
                loaded = fetched.len(),
                "Relationship loaded"
            );

            let previous = self.relationships.remove(name);
            let mut state = InstanceRelationship::loaded(
                RelationshipValue::empty_for(&definition),
                definition.options().auto_save,
            );
            state.value = if definition.is_collection() {
                let mut records = fetched;
                if let Some(previous) = previous {
                    let pending: Vec<Record> = match previous.value {
                        RelationshipValue::Many(records) => {
                            records.into_iter().filter(Record::is_new_record).collect()
                        }
                        RelationshipValue::One(_) => Vec::new(),
                    };
                    state.dirty = !pending.is_empty();
                    records.extend(pending);
                }
                RelationshipValue::Many(records)
            } else {
                RelationshipValue::One(fetched.into_iter().next().map(Box::new))
            };
            self.relationships.insert(name.to_string(), state);
        }

        match self.relationships.get(name) {
            Some(state) => Outcome::Ok(&state.value),
            None => Outcome::Err(Error::config(
                ConfigErrorKind::InvalidState,
                format!("Relationship \"{}\" was not loaded", name),
            )),
        }
    }

    /// Whether saving this record has any work to do.
    pub(crate) fn needs_save(&self) -> bool {
        self.is_new_record()
            || self.has_changes()
            || self.relationships.values().any(InstanceRelationship::needs_save)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::registry;

    fn persisted(entity: &str, id: i64) -> Record {
        let mut record = Record::new(registry(), entity).unwrap();
        record.write_attribute("id", Value::BigInt(id));
        record.mark_persisted();
        record
    }

    #[test]
    fn building_belongs_to_wires_the_inverse() {
        let mut task = Record::new(registry(), "Task").unwrap();
        let project = task.build_relationship("project").unwrap();
        project.set("name", "Launch").unwrap();

        let inverse = project.relationship_state("tasks").unwrap();
        assert!(inverse.is_preloaded());
        assert!(!inverse.auto_save());
        assert!(inverse.value().is_empty());

        let state = task.relationship_state("project").unwrap();
        assert!(state.is_dirty());
        assert_eq!(
            state.value().as_one().unwrap().get("name").unwrap(),
            &Value::from("Launch")
        );
    }

    #[test]
    fn building_has_many_applies_key_and_scope() {
        let mut project = persisted("Project", 7);
        let task = project.build_relationship("done_tasks").unwrap();
        assert_eq!(task.get("project_id").unwrap(), &Value::BigInt(7));
        assert_eq!(task.get("done").unwrap(), &Value::Bool(true));

        project.build_relationship("done_tasks").unwrap();
        let state = project.relationship_state("done_tasks").unwrap();
        assert_eq!(state.value().len(), 2);
        // The owner has rows of its own that are not loaded yet.
        assert!(!state.is_preloaded());
        assert!(project.needs_save());
    }

    #[test]
    fn assigning_belongs_to_copies_the_key() {
        let mut task = persisted("Task", 1);
        let project = persisted("Project", 3);
        task.set_relationship("project", RelationshipValue::One(Some(Box::new(project))))
            .unwrap();
        assert_eq!(task.get("project_id").unwrap(), &Value::BigInt(3));
        assert!(task.attribute_changed("project_id"));
        assert!(task.is_relationship_loaded("project"));

        task.set_relationship("project", RelationshipValue::One(None))
            .unwrap();
        assert_eq!(task.get("project_id").unwrap(), &Value::Null);
        assert!(!task.has_changes());
    }

    #[test]
    fn writing_the_foreign_key_drops_the_cached_target() {
        let mut task = persisted("Task", 1);
        let project = persisted("Project", 3);
        task.set_relationship("project", RelationshipValue::One(Some(Box::new(project))))
            .unwrap();
        task.set("project_id", 9).unwrap();
        assert!(task.relationship("project").unwrap().is_none());
    }

    #[test]
    fn assignments_are_checked() {
        let mut project = persisted("Project", 1);
        let err = project
            .set_relationship("tasks", RelationshipValue::One(None))
            .unwrap_err();
        assert_eq!(err.to_string(), "Relationship \"tasks\" on Project holds many records");

        let other = persisted("Project", 2);
        let err = project
            .set_relationship("tasks", RelationshipValue::Many(vec![other]))
            .unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::Invalid));

        let err = project.relationship("owner").unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnknownRelationship));
    }

    #[test]
    fn persisted_records_without_changes_need_no_save() {
        let mut project = persisted("Project", 1);
        assert!(!project.needs_save());
        project
            .set_relationship("tasks", RelationshipValue::Many(vec![persisted("Task", 4)]))
            .unwrap();
        assert!(project.needs_save());
    }
}
