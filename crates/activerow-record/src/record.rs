//! Records and dirty tracking.
//!
//! A [`Record`] is one row of an entity, addressed through its schema by
//! attribute name. It keeps the values last read from (or written to) the
//! database apart from the pending changes, so an update writes only the
//! changed columns and writing back the persisted value is not a change.

use crate::relationships::InstanceRelationship;
use activerow_core::{ConfigErrorKind, EntitySchema, Error, Registry, Result, Row, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Lifecycle state of a record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RecordState {
    /// Built in memory, not inserted yet.
    #[default]
    New,
    /// Backed by a row.
    Persisted,
    /// Deleted; every further operation fails.
    Destroyed,
}

/// One row of an entity.
#[derive(Debug, Clone)]
pub struct Record {
    pub(crate) registry: Arc<Registry>,
    pub(crate) schema: Arc<EntitySchema>,
    pub(crate) state: RecordState,
    /// Values as last read from or written to the database
    pub(crate) persisted: BTreeMap<String, Value>,
    /// Pending writes, keyed by attribute
    pub(crate) changes: BTreeMap<String, Value>,
    pub(crate) relationships: BTreeMap<String, InstanceRelationship>,
}

impl Record {
    /// Build a new record of `entity` with its attribute defaults.
    pub fn new(registry: Arc<Registry>, entity: &str) -> Result<Self> {
        let schema = Arc::clone(registry.get_or_fail(entity)?);
        Ok(Self::with_schema(registry, schema))
    }

    pub(crate) fn with_schema(registry: Arc<Registry>, schema: Arc<EntitySchema>) -> Self {
        let persisted = schema
            .attributes()
            .iter()
            .map(|a| (a.name.clone(), a.default.clone().unwrap_or(Value::Null)))
            .collect();
        Self {
            registry,
            schema,
            state: RecordState::New,
            persisted,
            changes: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    /// Hydrate a persisted record from a fetched row. Columns the schema
    /// does not declare are ignored; declared attributes missing from the
    /// row read as NULL.
    pub fn from_row(registry: Arc<Registry>, schema: Arc<EntitySchema>, row: &Row) -> Self {
        let persisted = Self::attributes_from_row(&schema, row);
        Self {
            registry,
            schema,
            state: RecordState::Persisted,
            persisted,
            changes: BTreeMap::new(),
            relationships: BTreeMap::new(),
        }
    }

    fn attributes_from_row(schema: &EntitySchema, row: &Row) -> BTreeMap<String, Value> {
        schema
            .attribute_names()
            .map(|name| {
                let value = row.get_by_name(name).cloned().unwrap_or(Value::Null);
                (name.to_string(), value)
            })
            .collect()
    }

    pub fn schema(&self) -> &Arc<EntitySchema> {
        &self.schema
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Entity name.
    pub fn entity(&self) -> &str {
        self.schema.name()
    }

    pub fn state(&self) -> RecordState {
        self.state
    }

    pub fn is_new_record(&self) -> bool {
        self.state == RecordState::New
    }

    pub fn is_persisted(&self) -> bool {
        self.state == RecordState::Persisted
    }

    pub fn is_destroyed(&self) -> bool {
        self.state == RecordState::Destroyed
    }

    /// Current primary key value; NULL until one is assigned.
    pub fn id(&self) -> &Value {
        self.read(self.schema.primary_key()).unwrap_or(&Value::Null)
    }

    /// Read an attribute, pending change first.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.read(name).ok_or_else(|| self.unknown_attribute(name))
    }

    fn read(&self, name: &str) -> Option<&Value> {
        self.changes.get(name).or_else(|| self.persisted.get(name))
    }

    /// Write an attribute.
    ///
    /// Writing the persisted value back clears the pending change. Writing
    /// a foreign key drops the cached belongs-to relationships that depend
    /// on it, so the next read reloads them.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.ensure_usable()?;
        if !self.schema.has_attribute(name) {
            return Err(self.unknown_attribute(name));
        }
        let value = value.into();
        if self.read(name) == Some(&value) {
            return Ok(());
        }
        let stale: Vec<String> = self
            .schema
            .relationships_depending_on(name)
            .map(|r| r.name().to_string())
            .collect();
        for relationship in stale {
            tracing::trace!(
                entity = %self.schema.name(),
                relationship = %relationship,
                attribute = %name,
                "Foreign key written, dropping cached relationship"
            );
            self.relationships.remove(&relationship);
        }
        self.write_attribute(name, value);
        Ok(())
    }

    /// Record a change without any cache invalidation. Used when the
    /// lifecycle copies keys between related records.
    pub(crate) fn write_attribute(&mut self, name: &str, value: Value) {
        if self.persisted.get(name) == Some(&value) {
            self.changes.remove(name);
        } else {
            self.changes.insert(name.to_string(), value);
        }
    }

    /// Pending changes.
    pub fn changes(&self) -> &BTreeMap<String, Value> {
        &self.changes
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Whether `name` has a pending change.
    pub fn attribute_changed(&self, name: &str) -> bool {
        self.changes.contains_key(name)
    }

    /// Every attribute with pending changes applied.
    pub fn attributes(&self) -> BTreeMap<String, Value> {
        let mut merged = self.persisted.clone();
        merged.extend(self.changes.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Fold pending changes into the persisted state.
    pub(crate) fn mark_persisted(&mut self) {
        let changes = std::mem::take(&mut self.changes);
        self.persisted.extend(changes);
        self.state = RecordState::Persisted;
    }

    /// Take over the persisted state of a freshly read copy, dropping
    /// pending changes and cached relationships.
    pub(crate) fn replace_persisted(&mut self, fresh: Record) {
        self.persisted = fresh.persisted;
        self.changes.clear();
        self.relationships.clear();
        self.state = RecordState::Persisted;
    }

    pub(crate) fn ensure_usable(&self) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::config(
                ConfigErrorKind::InvalidState,
                format!("Cannot use a destroyed {} record", self.schema.name()),
            ));
        }
        Ok(())
    }

    fn unknown_attribute(&self, name: &str) -> Error {
        Error::config(
            ConfigErrorKind::UnknownAttribute,
            format!("Unknown attribute \"{}\" on {}", name, self.schema.name()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::registry;

    #[test]
    fn new_records_start_with_defaults() {
        let task = Record::new(registry(), "Task").unwrap();
        assert!(task.is_new_record());
        assert_eq!(task.get("done").unwrap(), &Value::Bool(false));
        assert_eq!(task.get("name").unwrap(), &Value::Null);
        assert_eq!(task.id(), &Value::Null);
        assert!(!task.has_changes());
    }

    #[test]
    fn writing_the_persisted_value_clears_the_change() {
        let row = Row::new(
            vec!["id".into(), "name".into(), "done".into(), "project_id".into()],
            vec![
                Value::BigInt(1),
                Value::from("Write docs"),
                Value::BigInt(0),
                Value::Null,
            ],
        );
        let registry = registry();
        let schema = Arc::clone(registry.get("Task").unwrap());
        let mut task = Record::from_row(registry, schema, &row);
        assert!(task.is_persisted());

        task.set("name", "Review docs").unwrap();
        assert!(task.attribute_changed("name"));
        assert_eq!(task.get("name").unwrap(), &Value::from("Review docs"));

        task.set("name", "Write docs").unwrap();
        assert!(!task.has_changes());
    }

    #[test]
    fn unknown_attributes_are_config_errors() {
        let mut task = Record::new(registry(), "Task").unwrap();
        let err = task.set("colour", "red").unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnknownAttribute));
        assert_eq!(err.to_string(), "Unknown attribute \"colour\" on Task");
        assert!(task.get("colour").is_err());
    }

    #[test]
    fn destroyed_records_reject_writes() {
        let mut task = Record::new(registry(), "Task").unwrap();
        task.state = RecordState::Destroyed;
        let err = task.set("name", "x").unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::InvalidState));
    }

    #[test]
    fn rows_hydrate_declared_attributes_only() {
        let row = Row::new(
            vec!["id".into(), "name".into(), "extra".into()],
            vec![Value::BigInt(4), Value::from("Ship"), Value::from("ignored")],
        );
        let registry = registry();
        let schema = Arc::clone(registry.get("Task").unwrap());
        let task = Record::from_row(registry, schema, &row);
        let attributes = task.attributes();
        assert_eq!(attributes.get("id"), Some(&Value::BigInt(4)));
        assert_eq!(attributes.get("project_id"), Some(&Value::Null));
        assert!(!attributes.contains_key("extra"));
    }
}
