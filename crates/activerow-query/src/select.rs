//! SELECT query builder.

use crate::clause::{OrderBy, OrderDirection};
use crate::expr::Expr;
use crate::join::{JoinSpec, JoinTracker};
use activerow_core::{EntitySchema, Registry, Result, Scope, SqlDialect, Value};
use std::sync::Arc;

/// A SELECT query on one entity.
///
/// The builder only accumulates; SQL is produced by [`Query::to_sql`] and
/// [`Query::count_sql`], which is also where join paths are resolved.
/// Columns added through the builder are qualified by the root table, and
/// path columns by their join alias, so joined queries stay unambiguous.
#[derive(Debug, Clone)]
pub struct Query {
    registry: Arc<Registry>,
    entity: Arc<EntitySchema>,
    /// Columns to select (empty = every column of the root)
    columns: Vec<Expr>,
    joins: JoinSpec,
    predicates: Vec<Expr>,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
    distinct: bool,
}

impl Query {
    /// Query on `entity`.
    pub fn new(registry: Arc<Registry>, entity: &str) -> Result<Self> {
        let entity = Arc::clone(registry.get_or_fail(entity)?);
        Ok(Self {
            registry,
            entity,
            columns: Vec::new(),
            joins: JoinSpec::new(),
            predicates: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            distinct: false,
        })
    }

    /// Schema of the queried entity.
    pub fn entity(&self) -> &Arc<EntitySchema> {
        &self.entity
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn root_column(&self, column: impl Into<String>) -> Expr {
        Expr::qualified(self.entity.table(), column)
    }

    /// Select only these root columns.
    pub fn select(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| self.root_column(*c)).collect();
        self
    }

    /// Add an arbitrary expression to the select list.
    pub fn select_expr(mut self, expr: Expr) -> Self {
        self.columns.push(expr);
        self
    }

    /// Join the paths of `spec` (union with earlier joins).
    pub fn joins(mut self, spec: JoinSpec) -> Self {
        self.joins.merge(spec);
        self
    }

    /// Add a predicate, AND-ed with the others.
    pub fn where_expr(mut self, expr: Expr) -> Self {
        self.predicates.push(expr);
        self
    }

    /// `<root>.<column> = <value>`
    pub fn where_eq(self, column: &str, value: impl Into<Value>) -> Self {
        let expr = self.root_column(column).eq(Expr::Literal(value.into()));
        self.where_expr(expr)
    }

    /// `<root>.<column> IN (<values>)`
    pub fn where_in(self, column: &str, values: Vec<Value>) -> Self {
        let expr = self
            .root_column(column)
            .in_list(values.into_iter().map(Expr::Literal).collect());
        self.where_expr(expr)
    }

    /// `<alias of path>.<column> = <value>`; joins the path.
    pub fn where_path(mut self, path: &[&str], column: &str, value: impl Into<Value>) -> Self {
        self.joins.add_path(path);
        self.where_expr(Expr::path(path, column).eq(Expr::Literal(value.into())))
    }

    /// Order by a root column.
    pub fn order(mut self, column: &str, direction: OrderDirection) -> Self {
        let expr = self.root_column(column);
        self.order_by.push(OrderBy::new(expr, direction));
        self
    }

    /// Order by a column of a joined path; joins the path.
    pub fn order_path(mut self, path: &[&str], column: &str, direction: OrderDirection) -> Self {
        self.joins.add_path(path);
        self.order_by
            .push(OrderBy::new(Expr::path(path, column), direction));
        self
    }

    /// Add an arbitrary ORDER BY term.
    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order_by.push(order);
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    /// SELECT DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Restrict to rows matching `scope`, qualified by the root table.
    pub fn apply_scope(mut self, scope: &Scope) -> Self {
        let table = self.entity.table().to_string();
        self.predicates.extend(
            scope
                .conditions()
                .iter()
                .map(|condition| Expr::scope_condition(&table, condition)),
        );
        self
    }

    /// Tracker with every explicit join and every path referenced by a
    /// predicate or ordering.
    pub fn tracker(&self) -> Result<JoinTracker<'_>> {
        let mut tracker = JoinTracker::new(&self.registry, self.entity.name())?;
        tracker.add_spec(&self.joins)?;
        let referenced = self
            .predicates
            .iter()
            .chain(self.order_by.iter().map(|o| &o.expr))
            .chain(self.columns.iter())
            .flat_map(Expr::paths);
        for path in referenced {
            tracker.add_path(path)?;
        }
        Ok(tracker)
    }

    fn resolve(tracker: &JoinTracker<'_>, expr: &Expr) -> Result<Expr> {
        expr.resolve_paths(&mut |path: &[String]| tracker.get_table_for_join(path))
    }

    fn build_from_where<D: SqlDialect + ?Sized>(
        &self,
        tracker: &JoinTracker<'_>,
        dialect: &D,
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> Result<()> {
        sql.push_str(" FROM ");
        sql.push_str(&dialect.quote_table(self.entity.table()));
        sql.push_str(&tracker.build(dialect, params, 0));

        let predicates = self
            .predicates
            .iter()
            .map(|p| Self::resolve(tracker, p))
            .collect::<Result<Vec<_>>>()?;
        if let Some(filter) = Expr::all(predicates) {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.build(dialect, params, 0));
        }
        Ok(())
    }

    /// Build the SQL query and parameters.
    ///
    /// Fails with a configuration error when a join path names an unknown
    /// relationship.
    pub fn to_sql<D: SqlDialect + ?Sized>(&self, dialect: &D) -> Result<(String, Vec<Value>)> {
        let tracker = self.tracker()?;
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            sql.push_str(&dialect.quote_identifier(self.entity.table()));
            sql.push_str(".*");
        } else {
            let columns = self
                .columns
                .iter()
                .map(|c| -> Result<String> {
                    Ok(Self::resolve(&tracker, c)?.build(dialect, &mut params, 0))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&columns.join(", "));
        }

        self.build_from_where(&tracker, dialect, &mut sql, &mut params)?;

        if !self.order_by.is_empty() {
            let terms = self
                .order_by
                .iter()
                .map(|o| -> Result<String> {
                    let resolved = OrderBy::new(Self::resolve(&tracker, &o.expr)?, o.direction);
                    Ok(resolved.build(dialect, &mut params, 0))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }

        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {}", n));
        }
        if let Some(n) = self.offset {
            if let (None, Some(unbounded)) = (self.limit, dialect.unbounded_limit()) {
                sql.push_str(&format!(" LIMIT {}", unbounded));
            }
            sql.push_str(&format!(" OFFSET {}", n));
        }

        tracing::trace!(sql = %sql, params = params.len(), "Built select");
        Ok((sql, params))
    }

    /// `SELECT COUNT(...)` over the same joins and predicates, ignoring
    /// ordering and pagination. With joins the root primary key is counted
    /// distinctly.
    pub fn count_sql<D: SqlDialect + ?Sized>(&self, dialect: &D) -> Result<(String, Vec<Value>)> {
        let tracker = self.tracker()?;
        let mut params = Vec::new();
        let mut sql = if tracker.joins().is_empty() && !self.distinct {
            String::from("SELECT COUNT(*)")
        } else {
            format!(
                "SELECT COUNT(DISTINCT {}.{})",
                dialect.quote_identifier(self.entity.table()),
                dialect.quote_column(self.entity.primary_key())
            )
        };
        self.build_from_where(&tracker, dialect, &mut sql, &mut params)?;
        Ok((sql, params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::registry;
    use activerow_core::{ConfigErrorKind, Dialect};

    fn tasks() -> Query {
        Query::new(registry(), "Task").unwrap()
    }

    #[test]
    fn test_select_all_columns() {
        let (sql, params) = tasks().to_sql(&Dialect::Sqlite).unwrap();
        assert_eq!(sql, "SELECT \"tasks\".* FROM \"tasks\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_specific_columns_distinct() {
        let (sql, _) = tasks()
            .select(&["project_id"])
            .distinct()
            .to_sql(&Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql, "SELECT DISTINCT \"tasks\".\"project_id\" FROM \"tasks\"");
    }

    #[test]
    fn test_full_clause_order() {
        let (sql, params) = tasks()
            .joins(JoinSpec::new().path(&["project"]))
            .where_eq("done", false)
            .where_path(&["project"], "name", "Alpha")
            .order("name", OrderDirection::Asc)
            .limit(10)
            .offset(20)
            .to_sql(&Dialect::Postgres)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT \"tasks\".* FROM \"tasks\" \
             LEFT JOIN \"projects\" AS \"tasks__project\" ON \"tasks__project\".\"id\" = \"tasks\".\"project_id\" \
             WHERE \"tasks\".\"done\" = $1 AND \"tasks__project\".\"name\" = $2 \
             ORDER BY \"tasks\".\"name\" ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(
            params,
            vec![Value::Bool(false), Value::Text("Alpha".to_string())]
        );
    }

    #[test]
    fn test_join_params_precede_where_params() {
        let (sql, params) = Query::new(registry(), "Project")
            .unwrap()
            .joins(JoinSpec::new().path(&["done_tasks"]))
            .where_eq("name", "Alpha")
            .to_sql(&Dialect::Sqlite)
            .unwrap();
        assert!(sql.ends_with("\"projects__done_tasks\".\"done\" = ?1 WHERE \"projects\".\"name\" = ?2"));
        assert_eq!(params, vec![Value::Bool(true), Value::Text("Alpha".to_string())]);
    }

    #[test]
    fn test_order_path_joins_path() {
        let (sql, _) = Query::new(registry(), "Project")
            .unwrap()
            .order_path(&["project_detail"], "summary", OrderDirection::Desc)
            .to_sql(&Dialect::Sqlite)
            .unwrap();
        assert!(sql.contains(
            "LEFT JOIN \"project_details\" AS \"projects__project_detail\" \
             ON \"projects__project_detail\".\"project_id\" = \"projects\".\"id\""
        ));
        assert!(sql.ends_with("ORDER BY \"projects__project_detail\".\"summary\" DESC"));
    }

    #[test]
    fn test_path_in_where_expr_is_joined() {
        let (sql, _) = tasks()
            .where_expr(Expr::path(&["project", "project_detail"], "summary").is_null())
            .to_sql(&Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql.matches("LEFT JOIN").count(), 2);
        assert!(sql.ends_with("WHERE \"tasks__project__project_detail\".\"summary\" IS NULL"));
    }

    #[test]
    fn test_apply_scope_qualifies_by_table() {
        let scope = Scope::new().eq("done", true);
        let (sql, _) = tasks().apply_scope(&scope).to_sql(&Dialect::Sqlite).unwrap();
        assert_eq!(sql, "SELECT \"tasks\".* FROM \"tasks\" WHERE \"tasks\".\"done\" = ?1");
    }

    #[test]
    fn test_offset_without_limit_on_sqlite() {
        let (sql, _) = tasks().offset(5).to_sql(&Dialect::Sqlite).unwrap();
        assert!(sql.ends_with("LIMIT -1 OFFSET 5"));
        let (sql, _) = tasks().offset(5).to_sql(&Dialect::Postgres).unwrap();
        assert!(sql.ends_with("\"tasks\" OFFSET 5"));
    }

    #[test]
    fn test_count_sql() {
        let (sql, _) = tasks()
            .where_eq("done", true)
            .order("name", OrderDirection::Asc)
            .limit(1)
            .count_sql(&Dialect::Sqlite)
            .unwrap();
        assert_eq!(sql, "SELECT COUNT(*) FROM \"tasks\" WHERE \"tasks\".\"done\" = ?1");

        let (sql, _) = Query::new(registry(), "Project")
            .unwrap()
            .joins(JoinSpec::new().path(&["tasks"]))
            .count_sql(&Dialect::Sqlite)
            .unwrap();
        assert!(sql.starts_with("SELECT COUNT(DISTINCT \"projects\".\"id\") FROM \"projects\" LEFT JOIN"));
    }

    #[test]
    fn test_unknown_path_fails_at_build() {
        let query = tasks().where_path(&["owner"], "name", "x");
        let err = query.to_sql(&Dialect::Sqlite).unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnknownRelationship));

        let err = Query::new(registry(), "Nope").unwrap_err();
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::UnknownEntity));
    }
}
