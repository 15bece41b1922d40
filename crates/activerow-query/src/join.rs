//! Join specifications and join-path aliasing.
//!
//! A [`JoinSpec`] names the relationship paths a query should join, as a
//! tree keyed by relationship name. A [`JoinTracker`] turns the tree into
//! `LEFT JOIN`s against a [`Registry`], one per distinct path, each under an
//! alias derived from the path alone:
//!
//! ```text
//! tasks + [project]          -> tasks__project
//! tasks + [project, tasks]   -> tasks__project__tasks
//! ```
//!
//! Because the alias is a pure function of the path, the same path reached
//! through different branches of a spec collapses into one join, and a
//! caller can compute the alias of a path before or after it was joined.

use crate::expr::Expr;
use activerow_core::{
    ConfigErrorKind, EntitySchema, Error, Registry, RelationshipDefinition, Result, SqlDialect,
    Value,
};
use std::sync::Arc;

/// Separator between path segments in a join alias.
pub const ALIAS_SEPARATOR: &str = "__";

/// A tree of relationship names to join.
///
/// Children keep insertion order, so parents are always emitted before
/// their children and sibling order follows the spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinSpec {
    children: Vec<(String, JoinSpec)>,
}

impl JoinSpec {
    /// An empty spec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a path of relationship names, e.g. `&["project", "tasks"]`.
    pub fn path(mut self, path: &[&str]) -> Self {
        self.add_path(path);
        self
    }

    /// Add a path of relationship names in place.
    pub fn add_path<S: AsRef<str>>(&mut self, path: &[S]) {
        let Some((first, rest)) = path.split_first() else {
            return;
        };
        self.child_mut(first.as_ref()).add_path(rest);
    }

    fn child_mut(&mut self, name: &str) -> &mut JoinSpec {
        let index = match self.children.iter().position(|(n, _)| n == name) {
            Some(index) => index,
            None => {
                self.children.push((name.to_string(), JoinSpec::new()));
                self.children.len() - 1
            }
        };
        &mut self.children[index].1
    }

    /// Union `other` into this spec.
    pub fn merge(&mut self, other: JoinSpec) {
        for (name, child) in other.children {
            self.child_mut(&name).merge(child);
        }
    }

    /// Parse the JSON form.
    ///
    /// Objects map relationship names to `true` (join), `false` (ignored) or
    /// a nested spec. Arrays merge their elements by union. Bare strings
    /// mean `{name: true}`.
    ///
    /// ```text
    /// [{"project": {"translations": true}}, {"project": {"projectDetail": true}}, "owner"]
    /// ```
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let mut spec = JoinSpec::new();
        spec.merge_json(value)?;
        Ok(spec)
    }

    fn merge_json(&mut self, value: &serde_json::Value) -> Result<()> {
        match value {
            serde_json::Value::String(name) => {
                self.child_mut(name);
            }
            serde_json::Value::Array(items) => {
                for item in items {
                    self.merge_json(item)?;
                }
            }
            serde_json::Value::Object(map) => {
                for (name, nested) in map {
                    match nested {
                        serde_json::Value::Bool(false) => {}
                        serde_json::Value::Bool(true) => {
                            self.child_mut(name);
                        }
                        other => self.child_mut(name).merge_json(other)?,
                    }
                }
            }
            other => {
                return Err(Error::config(
                    ConfigErrorKind::Invalid,
                    format!("Invalid join specification: {}", other),
                ));
            }
        }
        Ok(())
    }

    /// Whether nothing is joined.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Direct children.
    pub fn children(&self) -> impl Iterator<Item = (&str, &JoinSpec)> {
        self.children.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    /// Nested spec of a direct child.
    pub fn get(&self, name: &str) -> Option<&JoinSpec> {
        self.children
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, spec)| spec)
    }

    /// Every path in the tree, parents before children.
    pub fn paths(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        self.collect_paths(&mut Vec::new(), &mut out);
        out
    }

    fn collect_paths(&self, prefix: &mut Vec<String>, out: &mut Vec<Vec<String>>) {
        for (name, child) in &self.children {
            prefix.push(name.clone());
            out.push(prefix.clone());
            child.collect_paths(prefix, out);
            prefix.pop();
        }
    }
}

/// One joined path.
#[derive(Debug, Clone)]
pub struct TrackedJoin {
    pub path: Vec<String>,
    pub alias: String,
    pub parent_alias: String,
    pub schema: Arc<EntitySchema>,
    pub relationship: RelationshipDefinition,
}

impl TrackedJoin {
    /// `<alias>.<target col> = <parent>.<owner col>`, plus the relationship
    /// scope qualified by the alias.
    pub fn on_expr(&self) -> Expr {
        let (target_column, owner_column) = self.relationship.join_columns();
        let link = Expr::qualified(&self.alias, target_column)
            .eq(Expr::qualified(&self.parent_alias, owner_column));
        let scope = self
            .relationship
            .scope()
            .into_iter()
            .flat_map(|scope| scope.conditions())
            .map(|condition| Expr::scope_condition(&self.alias, condition));
        Expr::all(std::iter::once(link).chain(scope)).unwrap_or_else(|| Expr::raw("1 = 1"))
    }
}

/// Tracks the joins of one query rooted at one entity.
#[derive(Debug, Clone)]
pub struct JoinTracker<'r> {
    registry: &'r Registry,
    root: Arc<EntitySchema>,
    joins: Vec<TrackedJoin>,
}

impl<'r> JoinTracker<'r> {
    /// Tracker for queries on `root`.
    pub fn new(registry: &'r Registry, root: &str) -> Result<Self> {
        Ok(Self {
            registry,
            root: Arc::clone(registry.get_or_fail(root)?),
            joins: Vec::new(),
        })
    }

    /// Schema of the query root.
    pub fn root(&self) -> &Arc<EntitySchema> {
        &self.root
    }

    /// Alias of `path`, without checking that it resolves.
    pub fn alias_for<S: AsRef<str>>(&self, path: &[S]) -> String {
        let mut alias = self.root.table().to_string();
        for segment in path {
            alias.push_str(ALIAS_SEPARATOR);
            alias.push_str(segment.as_ref());
        }
        alias
    }

    /// Walk `path` from the root, returning each step's relationship and
    /// target schema.
    fn resolve<S: AsRef<str>>(
        &self,
        path: &[S],
    ) -> Result<Vec<(&'r RelationshipDefinition, &'r Arc<EntitySchema>)>> {
        let mut entity = self.root.name().to_string();
        let mut steps = Vec::with_capacity(path.len());
        for segment in path {
            let (definition, target) = self.registry.relationship(&entity, segment.as_ref())?;
            entity = target.name().to_string();
            steps.push((definition, target));
        }
        Ok(steps)
    }

    /// Alias under which `path` is (or would be) joined. The empty path is
    /// the root table. Does not add a join.
    pub fn get_table_for_join<S: AsRef<str>>(&self, path: &[S]) -> Result<String> {
        self.resolve(path)?;
        Ok(self.alias_for(path))
    }

    /// Schema of the entity at the end of `path`.
    pub fn schema_for<S: AsRef<str>>(&self, path: &[S]) -> Result<Arc<EntitySchema>> {
        Ok(match self.resolve(path)?.last() {
            Some((_, schema)) => Arc::clone(schema),
            None => Arc::clone(&self.root),
        })
    }

    /// Join `path` and every prefix of it not joined yet.
    pub fn add_path<S: AsRef<str>>(&mut self, path: &[S]) -> Result<()> {
        let steps = self.resolve(path)?;
        for (depth, (definition, schema)) in steps.into_iter().enumerate() {
            let prefix: Vec<String> = path[..=depth]
                .iter()
                .map(|s| s.as_ref().to_string())
                .collect();
            if self.joins.iter().any(|join| join.path == prefix) {
                continue;
            }
            let join = TrackedJoin {
                alias: self.alias_for(&prefix),
                parent_alias: self.alias_for(&prefix[..depth]),
                path: prefix,
                schema: Arc::clone(schema),
                relationship: definition.clone(),
            };
            tracing::trace!(alias = %join.alias, table = join.schema.table(), "Join added");
            self.joins.push(join);
        }
        Ok(())
    }

    /// Join every path of `spec`.
    pub fn add_spec(&mut self, spec: &JoinSpec) -> Result<()> {
        for path in spec.paths() {
            self.add_path(&path)?;
        }
        Ok(())
    }

    /// Joined paths in emission order.
    pub fn joins(&self) -> &[TrackedJoin] {
        &self.joins
    }

    /// Render every join, each prefixed by a space.
    pub fn build<D: SqlDialect + ?Sized>(
        &self,
        dialect: &D,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        let mut sql = String::new();
        for join in &self.joins {
            sql.push_str(&format!(
                " LEFT JOIN {} AS {} ON {}",
                dialect.quote_table(join.schema.table()),
                dialect.quote_identifier(&join.alias),
                join.on_expr().build(dialect, params, offset)
            ));
        }
        sql
    }
}
