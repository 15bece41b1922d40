//! Relationship metadata.
//!
//! Relationships are declared once per entity (see
//! [`EntitySchemaBuilder`](crate::entity::EntitySchemaBuilder)) and are
//! immutable afterwards. Each kind carries its own key columns; code that
//! behaves differently per kind matches on [`RelationshipDefinition`]
//! exhaustively instead of comparing kind names.
//!
//! A relationship may carry a [`Scope`]: a declarative filter on the target
//! rows. Scopes never name a table. Whoever renders them supplies the table
//! or join alias to qualify the columns with, which is what lets the same
//! target entity be joined several times under different filters.

use crate::value::Value;

/// Comparison operators available to scope conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
}

impl ComparisonOp {
    /// SQL spelling of the operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Ne => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Like => "LIKE",
        }
    }

    /// Evaluate the operator against two in-memory values.
    ///
    /// Used when filtering already-loaded records; `Like` only supports the
    /// `%` wildcard.
    pub fn matches(self, left: &Value, right: &Value) -> bool {
        match self {
            ComparisonOp::Eq => left == right,
            ComparisonOp::Ne => left != right,
            ComparisonOp::Like => match (left.as_str(), right.as_str()) {
                (Some(haystack), Some(pattern)) => like_matches(haystack, pattern),
                _ => false,
            },
            ComparisonOp::Lt | ComparisonOp::Le | ComparisonOp::Gt | ComparisonOp::Ge => {
                let ordering = match (left, right) {
                    (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
                    _ => match (left.as_f64(), right.as_f64()) {
                        (Some(a), Some(b)) => a.partial_cmp(&b),
                        _ => None,
                    },
                };
                let Some(ordering) = ordering else {
                    return false;
                };
                match self {
                    ComparisonOp::Lt => ordering.is_lt(),
                    ComparisonOp::Le => ordering.is_le(),
                    ComparisonOp::Gt => ordering.is_gt(),
                    _ => ordering.is_ge(),
                }
            }
        }
    }
}

fn like_matches(haystack: &str, pattern: &str) -> bool {
    let parts: Vec<&str> = pattern.split('%').collect();
    if parts.len() == 1 {
        return haystack == pattern;
    }
    let mut rest = haystack;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            let Some(stripped) = rest.strip_prefix(part) else {
                return false;
            };
            rest = stripped;
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            let Some(pos) = rest.find(part) else {
                return false;
            };
            rest = &rest[pos + part.len()..];
        }
    }
    true
}

/// One condition of a scope.
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeCondition {
    /// `<column> <op> <value>`
    Compare {
        column: String,
        op: ComparisonOp,
        value: Value,
    },
    /// `<column> IS [NOT] NULL`
    IsNull { column: String, negated: bool },
    /// `<column> IN (<values>)`
    In { column: String, values: Vec<Value> },
}

impl ScopeCondition {
    /// The column this condition filters on.
    pub fn column(&self) -> &str {
        match self {
            ScopeCondition::Compare { column, .. }
            | ScopeCondition::IsNull { column, .. }
            | ScopeCondition::In { column, .. } => column,
        }
    }

    /// Evaluate against an in-memory attribute value.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ScopeCondition::Compare { op, value: v, .. } => op.matches(value, v),
            ScopeCondition::IsNull { negated, .. } => value.is_null() != *negated,
            ScopeCondition::In { values, .. } => values.contains(value),
        }
    }
}

/// A reusable, table-agnostic filter on a relationship's target rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    conditions: Vec<ScopeCondition>,
}

impl Scope {
    /// An empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `<column> = <value>`.
    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, ComparisonOp::Eq, value)
    }

    /// Add `<column> <> <value>`.
    pub fn ne(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.compare(column, ComparisonOp::Ne, value)
    }

    /// Add `<column> <op> <value>`.
    pub fn compare(
        mut self,
        column: impl Into<String>,
        op: ComparisonOp,
        value: impl Into<Value>,
    ) -> Self {
        self.conditions.push(ScopeCondition::Compare {
            column: column.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Add `<column> IS NULL`.
    pub fn is_null(mut self, column: impl Into<String>) -> Self {
        self.conditions.push(ScopeCondition::IsNull {
            column: column.into(),
            negated: false,
        });
        self
    }

    /// Add `<column> IS NOT NULL`.
    pub fn is_not_null(mut self, column: impl Into<String>) -> Self {
        self.conditions.push(ScopeCondition::IsNull {
            column: column.into(),
            negated: true,
        });
        self
    }

    /// Add `<column> IN (<values>)`.
    pub fn in_list(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(ScopeCondition::In {
            column: column.into(),
            values,
        });
        self
    }

    /// Conditions in declaration order.
    pub fn conditions(&self) -> &[ScopeCondition] {
        &self.conditions
    }

    /// Whether the scope has no conditions.
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Options shared by every relationship kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipOptions {
    /// Filter applied to the target rows
    pub scope: Option<Scope>,
    /// Destroy the related record(s) before the owner
    pub dependent_destroy: bool,
    /// Name of the relationship on the target that points back
    pub inverse_of: Option<String>,
    /// Persist loaded related records when the owner is saved
    pub auto_save: bool,
}

/// Immutable relationship descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationshipDefinition {
    /// The owner row holds `foreign_key`, pointing at `primary_key` on the target.
    BelongsTo {
        name: String,
        target: String,
        foreign_key: String,
        primary_key: String,
        options: RelationshipOptions,
    },
    /// Target rows hold `foreign_key`, pointing at `primary_key` on the owner.
    HasMany {
        name: String,
        target: String,
        foreign_key: String,
        primary_key: String,
        options: RelationshipOptions,
    },
    /// Like `HasMany`, but at most one target row is expected.
    HasOne {
        name: String,
        target: String,
        foreign_key: String,
        primary_key: String,
        options: RelationshipOptions,
    },
}

impl RelationshipDefinition {
    /// Relationship name.
    pub fn name(&self) -> &str {
        match self {
            RelationshipDefinition::BelongsTo { name, .. }
            | RelationshipDefinition::HasMany { name, .. }
            | RelationshipDefinition::HasOne { name, .. } => name,
        }
    }

    /// Target entity name.
    pub fn target(&self) -> &str {
        match self {
            RelationshipDefinition::BelongsTo { target, .. }
            | RelationshipDefinition::HasMany { target, .. }
            | RelationshipDefinition::HasOne { target, .. } => target,
        }
    }

    /// The foreign key column.
    pub fn foreign_key(&self) -> &str {
        match self {
            RelationshipDefinition::BelongsTo { foreign_key, .. }
            | RelationshipDefinition::HasMany { foreign_key, .. }
            | RelationshipDefinition::HasOne { foreign_key, .. } => foreign_key,
        }
    }

    /// The referenced key column.
    pub fn primary_key(&self) -> &str {
        match self {
            RelationshipDefinition::BelongsTo { primary_key, .. }
            | RelationshipDefinition::HasMany { primary_key, .. }
            | RelationshipDefinition::HasOne { primary_key, .. } => primary_key,
        }
    }

    /// Shared options.
    pub fn options(&self) -> &RelationshipOptions {
        match self {
            RelationshipDefinition::BelongsTo { options, .. }
            | RelationshipDefinition::HasMany { options, .. }
            | RelationshipDefinition::HasOne { options, .. } => options,
        }
    }

    /// The relationship's scope, if any.
    pub fn scope(&self) -> Option<&Scope> {
        self.options().scope.as_ref()
    }

    /// Whether the relationship yields a collection.
    pub fn is_collection(&self) -> bool {
        matches!(self, RelationshipDefinition::HasMany { .. })
    }

    /// Columns used to join the target onto the owner:
    /// `(column on target, column on owner)`.
    pub fn join_columns(&self) -> (&str, &str) {
        match self {
            RelationshipDefinition::BelongsTo {
                foreign_key,
                primary_key,
                ..
            } => (primary_key, foreign_key),
            RelationshipDefinition::HasMany {
                foreign_key,
                primary_key,
                ..
            }
            | RelationshipDefinition::HasOne {
                foreign_key,
                primary_key,
                ..
            } => (foreign_key, primary_key),
        }
    }

    /// Attribute on the owner whose change invalidates a cached value.
    ///
    /// Only belongs-to relationships depend on an owner attribute other than
    /// the primary key.
    pub fn owner_foreign_key(&self) -> Option<&str> {
        match self {
            RelationshipDefinition::BelongsTo { foreign_key, .. } => Some(foreign_key),
            RelationshipDefinition::HasMany { .. } | RelationshipDefinition::HasOne { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn belongs_to() -> RelationshipDefinition {
        RelationshipDefinition::BelongsTo {
            name: "project".to_string(),
            target: "Project".to_string(),
            foreign_key: "project_id".to_string(),
            primary_key: "id".to_string(),
            options: RelationshipOptions::default(),
        }
    }

    #[test]
    fn join_columns_follow_kind() {
        assert_eq!(belongs_to().join_columns(), ("id", "project_id"));

        let has_many = RelationshipDefinition::HasMany {
            name: "tasks".to_string(),
            target: "Task".to_string(),
            foreign_key: "project_id".to_string(),
            primary_key: "id".to_string(),
            options: RelationshipOptions::default(),
        };
        assert_eq!(has_many.join_columns(), ("project_id", "id"));
        assert!(has_many.is_collection());
        assert_eq!(has_many.owner_foreign_key(), None);
        assert_eq!(belongs_to().owner_foreign_key(), Some("project_id"));
    }

    #[test]
    fn scope_conditions_evaluate_in_memory() {
        let scope = Scope::new()
            .eq("state", "done")
            .is_not_null("finished_at")
            .compare("priority", ComparisonOp::Ge, 2);
        let [state, finished, priority] = scope.conditions() else {
            panic!("expected three conditions");
        };

        assert!(state.matches(&Value::from("done")));
        assert!(!state.matches(&Value::from("open")));
        assert!(finished.matches(&Value::Timestamp(1)));
        assert!(!finished.matches(&Value::Null));
        assert!(priority.matches(&Value::BigInt(3)));
        assert!(!priority.matches(&Value::BigInt(1)));
    }

    #[test]
    fn like_supports_percent_wildcards() {
        assert!(ComparisonOp::Like.matches(&Value::from("Task 12"), &Value::from("Task%")));
        assert!(ComparisonOp::Like.matches(&Value::from("my task"), &Value::from("%task")));
        assert!(ComparisonOp::Like.matches(&Value::from("a-b-c"), &Value::from("a%b%c")));
        assert!(!ComparisonOp::Like.matches(&Value::from("Project"), &Value::from("Task%")));
    }
}
