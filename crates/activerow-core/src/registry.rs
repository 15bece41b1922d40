//! Entity registry.
//!
//! Relationships name their target entity by string; the registry resolves
//! those names and checks the whole graph once, at build time, so later
//! lookups can only fail for names supplied at runtime.

use crate::Result;
use crate::entity::EntitySchema;
use crate::error::{ConfigErrorKind, Error};
use crate::relationship::RelationshipDefinition;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Immutable set of entity schemas.
#[derive(Debug, Default)]
pub struct Registry {
    entities: BTreeMap<String, Arc<EntitySchema>>,
}

impl Registry {
    /// Start building a registry.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up an entity schema.
    pub fn get(&self, entity: &str) -> Option<&Arc<EntitySchema>> {
        self.entities.get(entity)
    }

    /// Look up an entity schema, failing with a configuration error.
    pub fn get_or_fail(&self, entity: &str) -> Result<&Arc<EntitySchema>> {
        self.get(entity).ok_or_else(|| {
            Error::config(
                ConfigErrorKind::UnknownEntity,
                format!("Unknown entity \"{}\"", entity),
            )
        })
    }

    /// All schemas, ordered by entity name.
    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntitySchema>> {
        self.entities.values()
    }

    /// Resolve `relationship` on `entity`, returning the definition and the
    /// target schema.
    pub fn relationship(
        &self,
        entity: &str,
        relationship: &str,
    ) -> Result<(&RelationshipDefinition, &Arc<EntitySchema>)> {
        let owner = self.get_or_fail(entity)?;
        let definition = owner.relationship(relationship).ok_or_else(|| {
            Error::config(
                ConfigErrorKind::UnknownRelationship,
                format!(
                    "Unknown relationship \"{}\" on {}",
                    relationship,
                    owner.name()
                ),
            )
        })?;
        let target = self.get_or_fail(definition.target())?;
        Ok((definition, target))
    }

    /// The relationship on the target that points back at `entity`.
    ///
    /// An explicit `inverse_of` wins. Otherwise the inverse is inferred: a
    /// relationship on the target of the opposite direction, aimed at
    /// `entity`, over the same foreign key. When several match, the single
    /// unscoped one is taken.
    pub fn inverse_of(&self, entity: &str, relationship: &str) -> Option<&RelationshipDefinition> {
        let (definition, target) = self.relationship(entity, relationship).ok()?;
        if let Some(name) = &definition.options().inverse_of {
            return target.relationship(name);
        }
        let owner_side = matches!(definition, RelationshipDefinition::BelongsTo { .. });
        let candidates: Vec<&RelationshipDefinition> = target
            .relationships()
            .iter()
            .filter(|candidate| {
                candidate.target() == entity
                    && candidate.foreign_key() == definition.foreign_key()
                    && candidate.primary_key() == definition.primary_key()
                    && owner_side != matches!(candidate, RelationshipDefinition::BelongsTo { .. })
            })
            .collect();
        if let [only] = candidates.as_slice() {
            return Some(*only);
        }
        // Scoped siblings cover a subset of the rows; the unscoped one is
        // the inverse. Several unscoped candidates are ambiguous.
        let mut unscoped = candidates.into_iter().filter(|c| c.scope().is_none());
        let first = unscoped.next()?;
        unscoped.next().is_none().then_some(first)
    }
}

/// Builder for [`Registry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entities: Vec<EntitySchema>,
}

impl RegistryBuilder {
    /// Add an entity schema.
    pub fn entity(mut self, schema: EntitySchema) -> Self {
        self.entities.push(schema);
        self
    }

    /// Validate the entity graph and freeze it.
    pub fn build(self) -> Result<Arc<Registry>> {
        let mut entities = BTreeMap::new();
        for schema in self.entities {
            let name = schema.name().to_string();
            if entities.insert(name.clone(), Arc::new(schema)).is_some() {
                return Err(invalid(format!("Entity \"{}\" is declared twice", name)));
            }
        }
        let registry = Registry { entities };
        for schema in registry.entities.values() {
            check_entity(&registry, schema)?;
        }
        tracing::debug!(
            entities = registry.entities.len(),
            "Entity registry built"
        );
        Ok(Arc::new(registry))
    }
}

fn invalid(message: String) -> Error {
    Error::config(ConfigErrorKind::Invalid, message)
}

fn require_attribute(schema: &EntitySchema, attribute: &str, context: &str) -> Result<()> {
    if schema.has_attribute(attribute) {
        Ok(())
    } else {
        Err(Error::config(
            ConfigErrorKind::UnknownAttribute,
            format!(
                "Unknown attribute \"{}\" on {} ({})",
                attribute,
                schema.name(),
                context
            ),
        ))
    }
}

fn check_entity(registry: &Registry, schema: &EntitySchema) -> Result<()> {
    for validator in schema.validators() {
        require_attribute(schema, &validator.attribute, "validator")?;
    }

    for definition in schema.relationships() {
        let target = registry.get(definition.target()).ok_or_else(|| {
            Error::config(
                ConfigErrorKind::UnknownEntity,
                format!(
                    "Relationship \"{}\" on {} targets unknown entity \"{}\"",
                    definition.name(),
                    schema.name(),
                    definition.target()
                ),
            )
        })?;
        let context = format!("relationship \"{}\"", definition.name());
        match definition {
            RelationshipDefinition::BelongsTo {
                foreign_key,
                primary_key,
                ..
            } => {
                require_attribute(schema, foreign_key, &context)?;
                require_attribute(target, primary_key, &context)?;
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
                require_attribute(target, foreign_key, &context)?;
                require_attribute(schema, primary_key, &context)?;
            }
        }
        if let Some(scope) = definition.scope() {
            for condition in scope.conditions() {
                require_attribute(target, condition.column(), &context)?;
            }
        }
        if let Some(inverse) = &definition.options().inverse_of {
            if target.relationship(inverse).is_none() {
                return Err(Error::config(
                    ConfigErrorKind::UnknownRelationship,
                    format!(
                        "Inverse \"{}\" of {}.{} not found on {}",
                        inverse,
                        schema.name(),
                        definition.name(),
                        target.name()
                    ),
                ));
            }
        }
    }

    if let Some(config) = schema.translations() {
        let target = registry.get_or_fail(&config.entity)?;
        let context = "translations";
        require_attribute(target, &config.foreign_key, context)?;
        require_attribute(target, &config.locale_column, context)?;
        for attribute in &config.attributes {
            require_attribute(target, attribute, context)?;
            if schema.has_attribute(attribute) {
                return Err(invalid(format!(
                    "Translated attribute \"{}\" is also a column of {}",
                    attribute,
                    schema.name()
                )));
            }
        }
    }
    Ok(())
}
