//! Entity schemas.
//!
//! An [`EntitySchema`] describes one record type: its table, key, attributes,
//! validators, relationships and translated attributes. Schemas are built
//! once with [`EntitySchemaBuilder`] and never mutated; records and queries
//! look everything up through them instead of through per-name generated
//! accessors.

use crate::relationship::{RelationshipDefinition, RelationshipOptions, Scope};
use crate::validate::{AttributeValidator, CustomCheck, Validator};
use crate::value::Value;
use regex::Regex;

/// How primary key values come into existence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PrimaryKeyStrategy {
    /// The database assigns an integer key on insert.
    #[default]
    AutoIncrement,
    /// UUID key: generated server-side when the driver supports it,
    /// client-side otherwise.
    Uuid,
    /// The application always assigns the key.
    Manual,
}

/// A persisted attribute (column) of an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDefinition {
    pub name: String,
    /// Value assigned to freshly built records
    pub default: Option<Value>,
}

/// Translated (localized) attributes stored in a companion entity.
///
/// Each row of the translation entity holds one locale's values for the
/// owner identified by `foreign_key`.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationConfig {
    /// Name of the has-many relationship to the translation rows
    pub relationship: String,
    /// Translation entity name
    pub entity: String,
    /// Column on the translation entity pointing at the owner
    pub foreign_key: String,
    /// Column holding the locale code
    pub locale_column: String,
    /// Attributes stored per locale
    pub attributes: Vec<String>,
}

/// Immutable description of one record type.
#[derive(Debug, Clone)]
pub struct EntitySchema {
    name: String,
    table: String,
    database: String,
    primary_key: String,
    key_strategy: PrimaryKeyStrategy,
    attributes: Vec<AttributeDefinition>,
    validators: Vec<AttributeValidator>,
    relationships: Vec<RelationshipDefinition>,
    translations: Option<TranslationConfig>,
}

impl EntitySchema {
    /// Start building a schema for entity `name` stored in `table`.
    pub fn builder(name: impl Into<String>, table: impl Into<String>) -> EntitySchemaBuilder {
        EntitySchemaBuilder::new(name, table)
    }

    /// Entity name, e.g. `"Task"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table name, e.g. `"tasks"`.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Database identifier whose pool serves this entity.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Primary key column.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Primary key strategy.
    pub fn key_strategy(&self) -> PrimaryKeyStrategy {
        self.key_strategy
    }

    /// Attributes in declaration order (primary key first).
    pub fn attributes(&self) -> &[AttributeDefinition] {
        &self.attributes
    }

    /// Look up an attribute.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Whether `name` is a declared attribute.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    /// Attribute names in declaration order.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        self.attributes.iter().map(|a| a.name.as_str())
    }

    /// Validators in declaration order.
    pub fn validators(&self) -> &[AttributeValidator] {
        &self.validators
    }

    /// Relationships in declaration order.
    pub fn relationships(&self) -> &[RelationshipDefinition] {
        &self.relationships
    }

    /// Look up a relationship.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDefinition> {
        self.relationships.iter().find(|r| r.name() == name)
    }

    /// Relationships whose cached value depends on `attribute`.
    pub fn relationships_depending_on<'a>(
        &'a self,
        attribute: &'a str,
    ) -> impl Iterator<Item = &'a RelationshipDefinition> + 'a {
        self.relationships
            .iter()
            .filter(move |r| r.owner_foreign_key() == Some(attribute))
    }

    /// Translation settings, if the entity has translated attributes.
    pub fn translations(&self) -> Option<&TranslationConfig> {
        self.translations.as_ref()
    }

    /// Human attribute label used in validation messages:
    /// `"name"` → `"Name"`, `"project_id"` → `"Project"`,
    /// `"due_date"` → `"Due date"`.
    pub fn human_attribute_name(&self, attribute: &str) -> String {
        let base = attribute.strip_suffix("_id").unwrap_or(attribute);
        let spaced = base.replace('_', " ");
        let mut chars = spaced.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }
}

/// Builder for [`EntitySchema`].
#[derive(Debug)]
pub struct EntitySchemaBuilder {
    schema: EntitySchema,
}

impl EntitySchemaBuilder {
    fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: EntitySchema {
                name: name.into(),
                table: table.into(),
                database: "default".to_string(),
                primary_key: "id".to_string(),
                key_strategy: PrimaryKeyStrategy::AutoIncrement,
                attributes: Vec::new(),
                validators: Vec::new(),
                relationships: Vec::new(),
                translations: None,
            },
        }
    }

    /// Serve this entity from another database identifier.
    pub fn database(mut self, identifier: impl Into<String>) -> Self {
        self.schema.database = identifier.into();
        self
    }

    /// Set the primary key column and strategy.
    pub fn primary_key(mut self, column: impl Into<String>, strategy: PrimaryKeyStrategy) -> Self {
        self.schema.primary_key = column.into();
        self.schema.key_strategy = strategy;
        self
    }

    /// Declare an attribute.
    pub fn attribute(mut self, name: impl Into<String>) -> Self {
        self.push_attribute(name.into(), None);
        self
    }

    /// Declare an attribute with a default value for new records.
    pub fn attribute_with_default(
        mut self,
        name: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        self.push_attribute(name.into(), Some(default.into()));
        self
    }

    /// Declare several attributes at once.
    pub fn attributes(mut self, names: &[&str]) -> Self {
        for name in names {
            self.push_attribute((*name).to_string(), None);
        }
        self
    }

    fn push_attribute(&mut self, name: String, default: Option<Value>) {
        if let Some(existing) = self.schema.attributes.iter_mut().find(|a| a.name == name) {
            existing.default = default;
        } else {
            self.schema
                .attributes
                .push(AttributeDefinition { name, default });
        }
    }

    /// Attach a validator to an attribute.
    pub fn validates(mut self, attribute: impl Into<String>, validator: Validator) -> Self {
        self.schema.validators.push(AttributeValidator {
            attribute: attribute.into(),
            validator,
        });
        self
    }

    /// Shorthand for a presence validator.
    pub fn validates_presence(self, attribute: impl Into<String>) -> Self {
        self.validates(attribute, Validator::Presence)
    }

    /// Shorthand for a uniqueness validator.
    pub fn validates_uniqueness(self, attribute: impl Into<String>) -> Self {
        self.validates(attribute, Validator::Uniqueness { scope: Vec::new() })
    }

    /// Shorthand for a length validator.
    pub fn validates_length(
        self,
        attribute: impl Into<String>,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Self {
        self.validates(attribute, Validator::Length { min, max })
    }

    /// Shorthand for a format validator.
    pub fn validates_format(self, attribute: impl Into<String>, pattern: Regex) -> Self {
        self.validates(attribute, Validator::Format { pattern })
    }

    /// Shorthand for a custom validator.
    pub fn validates_with(self, attribute: impl Into<String>, check: CustomCheck) -> Self {
        self.validates(attribute, Validator::Custom(check))
    }

    /// Declare a belongs-to relationship. The foreign key defaults to
    /// `<name>_id` and is added as an attribute.
    pub fn belongs_to(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        configure: impl FnOnce(RelationshipBuilder) -> RelationshipBuilder,
    ) -> Self {
        let name = name.into();
        let foreign_key = format!("{}_id", name);
        self.push_relationship(
            RelationshipKindTag::BelongsTo,
            name,
            target.into(),
            foreign_key,
            configure,
        )
    }

    /// Declare a has-many relationship. The foreign key defaults to
    /// `<owner>_id` (snake-cased entity name).
    pub fn has_many(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        configure: impl FnOnce(RelationshipBuilder) -> RelationshipBuilder,
    ) -> Self {
        let foreign_key = format!("{}_id", snake_case(&self.schema.name));
        self.push_relationship(
            RelationshipKindTag::HasMany,
            name.into(),
            target.into(),
            foreign_key,
            configure,
        )
    }

    /// Declare a has-one relationship. The foreign key defaults to
    /// `<owner>_id` (snake-cased entity name).
    pub fn has_one(
        self,
        name: impl Into<String>,
        target: impl Into<String>,
        configure: impl FnOnce(RelationshipBuilder) -> RelationshipBuilder,
    ) -> Self {
        let foreign_key = format!("{}_id", snake_case(&self.schema.name));
        self.push_relationship(
            RelationshipKindTag::HasOne,
            name.into(),
            target.into(),
            foreign_key,
            configure,
        )
    }

    /// Store `attributes` per locale in the `entity` table. Declares a
    /// has-many `translations` relationship with auto-save.
    pub fn translates(mut self, entity: impl Into<String>, attributes: &[&str]) -> Self {
        let foreign_key = format!("{}_id", snake_case(&self.schema.name));
        let entity = entity.into();
        self.schema.translations = Some(TranslationConfig {
            relationship: "translations".to_string(),
            entity: entity.clone(),
            foreign_key: foreign_key.clone(),
            locale_column: "locale".to_string(),
            attributes: attributes.iter().map(|a| (*a).to_string()).collect(),
        });
        self.push_relationship(
            RelationshipKindTag::HasMany,
            "translations".to_string(),
            entity,
            foreign_key,
            |r| r.dependent_destroy(),
        )
    }

    fn push_relationship(
        mut self,
        kind: RelationshipKindTag,
        name: String,
        target: String,
        default_foreign_key: String,
        configure: impl FnOnce(RelationshipBuilder) -> RelationshipBuilder,
    ) -> Self {
        let built = configure(RelationshipBuilder {
            foreign_key: default_foreign_key,
            primary_key: "id".to_string(),
            options: RelationshipOptions {
                auto_save: true,
                ..RelationshipOptions::default()
            },
        });
        let definition = match kind {
            RelationshipKindTag::BelongsTo => {
                self.push_attribute(built.foreign_key.clone(), None);
                RelationshipDefinition::BelongsTo {
                    name,
                    target,
                    foreign_key: built.foreign_key,
                    primary_key: built.primary_key,
                    options: built.options,
                }
            }
            RelationshipKindTag::HasMany => RelationshipDefinition::HasMany {
                name,
                target,
                foreign_key: built.foreign_key,
                primary_key: built.primary_key,
                options: built.options,
            },
            RelationshipKindTag::HasOne => RelationshipDefinition::HasOne {
                name,
                target,
                foreign_key: built.foreign_key,
                primary_key: built.primary_key,
                options: built.options,
            },
        };
        self.schema
            .relationships
            .retain(|r| r.name() != definition.name());
        self.schema.relationships.push(definition);
        self
    }

    /// Finish the schema. The primary key is always the first attribute.
    pub fn build(mut self) -> EntitySchema {
        let pk = self.schema.primary_key.clone();
        self.schema.attributes.retain(|a| a.name != pk);
        self.schema.attributes.insert(
            0,
            AttributeDefinition {
                name: pk,
                default: None,
            },
        );
        self.schema
    }
}

#[derive(Debug, Clone, Copy)]
enum RelationshipKindTag {
    BelongsTo,
    HasMany,
    HasOne,
}

/// Options for a relationship being declared.
#[derive(Debug, Clone)]
pub struct RelationshipBuilder {
    foreign_key: String,
    primary_key: String,
    options: RelationshipOptions,
}

impl RelationshipBuilder {
    /// Override the foreign key column.
    pub fn foreign_key(mut self, column: impl Into<String>) -> Self {
        self.foreign_key = column.into();
        self
    }

    /// Override the referenced key column.
    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// Restrict the target rows.
    pub fn scope(mut self, scope: Scope) -> Self {
        self.options.scope = Some(scope);
        self
    }

    /// Destroy related records before the owner.
    pub fn dependent_destroy(mut self) -> Self {
        self.options.dependent_destroy = true;
        self
    }

    /// Name the relationship on the target that points back.
    pub fn inverse_of(mut self, name: impl Into<String>) -> Self {
        self.options.inverse_of = Some(name.into());
        self
    }

    /// Never persist related records as a side effect of saving the owner.
    pub fn without_auto_save(mut self) -> Self {
        self.options.auto_save = false;
        self
    }
}

/// `"ProjectDetail"` → `"project_detail"`.
pub fn snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
