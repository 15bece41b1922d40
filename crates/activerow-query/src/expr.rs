//! SQL expressions for query building.
//!
//! Expressions render against any [`SqlDialect`]; literals become bound
//! parameters and are appended to the caller's parameter list in rendering
//! order.

use crate::clause::{OrderBy, OrderDirection};
use activerow_core::{ComparisonOp, ScopeCondition, SqlDialect, Value};

/// A SQL expression that can be used in WHERE, ON, ORDER BY, etc.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column reference with optional table qualifier
    Column {
        /// Optional table name or alias
        table: Option<String>,
        /// Column name
        name: String,
    },

    /// Column of the entity reached through a join path.
    ///
    /// `Query::to_sql` rewrites it into a column qualified by the path's
    /// join alias and joins the path if needed.
    Path { path: Vec<String>, column: String },

    /// Literal value
    Literal(Value),

    /// Binary operation (e.g., a = b, a > b)
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },

    /// NOT expr
    Not(Box<Expr>),

    /// IN expression
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// LIKE / NOT LIKE pattern
    Like {
        expr: Box<Expr>,
        pattern: String,
        negated: bool,
    },

    /// Function call (e.g., COUNT(x), LOWER(name))
    Function { name: String, args: Vec<Expr> },

    /// Raw SQL fragment (escape hatch)
    Raw(String),

    /// Parenthesized expression
    Paren(Box<Expr>),

    /// Special aggregate: COUNT(*)
    CountStar,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// Equal (=)
    Eq,
    /// Not equal (<>)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
    /// Logical AND
    And,
    /// Logical OR
    Or,
}

impl BinaryOp {
    /// Get the SQL representation of this operator.
    pub const fn as_str(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "<>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
        }
    }

    /// Get the precedence of this operator (higher = binds tighter).
    pub const fn precedence(self) -> u8 {
        match self {
            BinaryOp::Or => 1,
            BinaryOp::And => 2,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge => 3,
        }
    }
}

impl Expr {
    // ==================== Constructors ====================

    /// Create a column reference expression.
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column {
            table: None,
            name: name.into(),
        }
    }

    /// Create a qualified column reference (table.column).
    pub fn qualified(table: impl Into<String>, column: impl Into<String>) -> Self {
        Expr::Column {
            table: Some(table.into()),
            name: column.into(),
        }
    }

    /// Column of the entity at the end of a join path.
    pub fn path(path: &[&str], column: impl Into<String>) -> Self {
        Expr::Path {
            path: path.iter().map(|s| (*s).to_string()).collect(),
            column: column.into(),
        }
    }

    /// Create a literal value expression.
    pub fn lit(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    /// Create a raw SQL expression (escape hatch).
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    /// Create a function call.
    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Function {
            name: name.into(),
            args,
        }
    }

    /// COUNT(*)
    pub fn count_star() -> Self {
        Expr::CountStar
    }

    /// Render one scope condition with its column qualified by `qualifier`.
    pub fn scope_condition(qualifier: &str, condition: &ScopeCondition) -> Self {
        let column = Expr::qualified(qualifier, condition.column());
        match condition {
            ScopeCondition::Compare { op, value, .. } => match op {
                ComparisonOp::Like => Expr::Like {
                    expr: Box::new(column),
                    pattern: value.as_str().unwrap_or_default().to_string(),
                    negated: false,
                },
                ComparisonOp::Eq => column.eq(value.clone()),
                ComparisonOp::Ne => column.ne(value.clone()),
                ComparisonOp::Lt => column.lt(value.clone()),
                ComparisonOp::Le => column.le(value.clone()),
                ComparisonOp::Gt => column.gt(value.clone()),
                ComparisonOp::Ge => column.ge(value.clone()),
            },
            ScopeCondition::IsNull { negated, .. } => Expr::IsNull {
                expr: Box::new(column),
                negated: *negated,
            },
            ScopeCondition::In { values, .. } => {
                column.in_list(values.iter().cloned().map(Expr::Literal).collect())
            }
        }
    }

    /// AND of all `exprs`, or `None` when empty.
    pub fn all(exprs: impl IntoIterator<Item = Expr>) -> Option<Expr> {
        exprs.into_iter().reduce(Expr::and)
    }

    // ==================== Comparison Operators ====================

    fn binary(self, op: BinaryOp, other: impl Into<Expr>) -> Self {
        Expr::Binary {
            left: Box::new(self),
            op,
            right: Box::new(other.into()),
        }
    }

    /// Equal to (=)
    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Eq, other)
    }

    /// Not equal to (<>)
    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ne, other)
    }

    /// Less than (<)
    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Lt, other)
    }

    /// Less than or equal to (<=)
    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Le, other)
    }

    /// Greater than (>)
    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Gt, other)
    }

    /// Greater than or equal to (>=)
    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Ge, other)
    }

    // ==================== Logical Operators ====================

    /// Logical AND
    pub fn and(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    /// Logical OR
    pub fn or(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    /// Logical NOT
    pub fn not(self) -> Self {
        Expr::Not(Box::new(self))
    }

    // ==================== Null Checks ====================

    /// IS NULL
    pub fn is_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: false,
        }
    }

    /// IS NOT NULL
    pub fn is_not_null(self) -> Self {
        Expr::IsNull {
            expr: Box::new(self),
            negated: true,
        }
    }

    // ==================== Pattern Matching ====================

    /// LIKE pattern match
    pub fn like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: false,
        }
    }

    /// NOT LIKE pattern match
    pub fn not_like(self, pattern: impl Into<String>) -> Self {
        Expr::Like {
            expr: Box::new(self),
            pattern: pattern.into(),
            negated: true,
        }
    }

    // ==================== IN ====================

    /// IN list of values
    pub fn in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    /// NOT IN list of values
    pub fn not_in_list(self, values: Vec<impl Into<Expr>>) -> Self {
        Expr::In {
            expr: Box::new(self),
            values: values.into_iter().map(Into::into).collect(),
            negated: true,
        }
    }

    // ==================== Ordering ====================

    /// Create an ascending ORDER BY expression.
    pub fn asc(self) -> OrderBy {
        OrderBy::new(self, OrderDirection::Asc)
    }

    /// Create a descending ORDER BY expression.
    pub fn desc(self) -> OrderBy {
        OrderBy::new(self, OrderDirection::Desc)
    }

    /// Wrap expression in parentheses.
    pub fn paren(self) -> Self {
        Expr::Paren(Box::new(self))
    }

    // ==================== Join paths ====================

    /// Every join path referenced by a `Path` column, in rendering order.
    pub fn paths(&self) -> Vec<&[String]> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a [String]>) {
        match self {
            Expr::Path { path, .. } => out.push(path),
            Expr::Binary { left, right, .. } => {
                left.collect_paths(out);
                right.collect_paths(out);
            }
            Expr::Not(expr)
            | Expr::Paren(expr)
            | Expr::IsNull { expr, .. }
            | Expr::Like { expr, .. } => expr.collect_paths(out),
            Expr::In { expr, values, .. } => {
                expr.collect_paths(out);
                for value in values {
                    value.collect_paths(out);
                }
            }
            Expr::Function { args, .. } => {
                for arg in args {
                    arg.collect_paths(out);
                }
            }
            Expr::Column { .. } | Expr::Literal(_) | Expr::Raw(_) | Expr::CountStar => {}
        }
    }

    /// Rewrite `Path` columns into columns qualified by `alias_for(path)`.
    pub fn resolve_paths<E>(
        &self,
        alias_for: &mut impl FnMut(&[String]) -> Result<String, E>,
    ) -> Result<Expr, E> {
        Ok(match self {
            Expr::Path { path, column } => Expr::qualified(alias_for(path)?, column.clone()),
            Expr::Binary { left, op, right } => Expr::Binary {
                left: Box::new(left.resolve_paths(alias_for)?),
                op: *op,
                right: Box::new(right.resolve_paths(alias_for)?),
            },
            Expr::Not(expr) => Expr::Not(Box::new(expr.resolve_paths(alias_for)?)),
            Expr::Paren(expr) => Expr::Paren(Box::new(expr.resolve_paths(alias_for)?)),
            Expr::IsNull { expr, negated } => Expr::IsNull {
                expr: Box::new(expr.resolve_paths(alias_for)?),
                negated: *negated,
            },
            Expr::Like {
                expr,
                pattern,
                negated,
            } => Expr::Like {
                expr: Box::new(expr.resolve_paths(alias_for)?),
                pattern: pattern.clone(),
                negated: *negated,
            },
            Expr::In {
                expr,
                values,
                negated,
            } => Expr::In {
                expr: Box::new(expr.resolve_paths(alias_for)?),
                values: values
                    .iter()
                    .map(|v| v.resolve_paths(alias_for))
                    .collect::<Result<_, E>>()?,
                negated: *negated,
            },
            Expr::Function { name, args } => Expr::Function {
                name: name.clone(),
                args: args
                    .iter()
                    .map(|a| a.resolve_paths(alias_for))
                    .collect::<Result<_, E>>()?,
            },
            other @ (Expr::Column { .. } | Expr::Literal(_) | Expr::Raw(_) | Expr::CountStar) => {
                other.clone()
            }
        })
    }

    // ==================== SQL Generation ====================

    /// Build SQL for `dialect`, pushing bound values onto `params`.
    ///
    /// Placeholders are numbered `offset + params.len()`, so one parameter
    /// list can be shared by every clause of a statement.
    pub fn build<D: SqlDialect + ?Sized>(
        &self,
        dialect: &D,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        match self {
            Expr::Column { table, name } => {
                if let Some(t) = table {
                    format!(
                        "{}.{}",
                        dialect.quote_identifier(t),
                        dialect.quote_column(name)
                    )
                } else {
                    dialect.quote_column(name)
                }
            }

            // Only reached when rendered outside a query.
            Expr::Path { path, column } => format!(
                "{}.{}",
                dialect.quote_identifier(&path.join("__")),
                dialect.quote_column(column)
            ),

            Expr::Literal(value) => {
                if matches!(value, Value::Default) {
                    "DEFAULT".to_string()
                } else {
                    params.push(value.clone());
                    dialect.placeholder(offset + params.len())
                }
            }

            Expr::Binary { left, op, right } => {
                let left_sql = left.build_operand(dialect, params, offset, *op);
                let right_sql = right.build_operand(dialect, params, offset, *op);
                format!("{left_sql} {} {right_sql}", op.as_str())
            }

            Expr::Not(expr) => {
                let expr_sql = expr.build(dialect, params, offset);
                match **expr {
                    Expr::Binary { .. } => format!("NOT ({expr_sql})"),
                    _ => format!("NOT {expr_sql}"),
                }
            }

            Expr::In {
                expr,
                values,
                negated,
            } => {
                let expr_sql = expr.build(dialect, params, offset);
                let not_str = if *negated { "NOT " } else { "" };
                if values.is_empty() {
                    // `x IN ()` is not valid SQL; an empty list matches nothing.
                    return if *negated { "1 = 1" } else { "1 = 0" }.to_string();
                }
                let value_sqls: Vec<_> = values
                    .iter()
                    .map(|v| v.build(dialect, params, offset))
                    .collect();
                format!("{expr_sql} {not_str}IN ({})", value_sqls.join(", "))
            }

            Expr::IsNull { expr, negated } => {
                let expr_sql = expr.build(dialect, params, offset);
                let not_str = if *negated { " NOT" } else { "" };
                format!("{expr_sql} IS{not_str} NULL")
            }

            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let expr_sql = expr.build(dialect, params, offset);
                params.push(Value::Text(pattern.clone()));
                let param = dialect.placeholder(offset + params.len());
                let not_str = if *negated { "NOT " } else { "" };
                format!("{expr_sql} {not_str}LIKE {param}")
            }

            Expr::Function { name, args } => {
                let arg_sqls: Vec<_> = args
                    .iter()
                    .map(|a| a.build(dialect, params, offset))
                    .collect();
                format!("{name}({})", arg_sqls.join(", "))
            }

            Expr::Raw(sql) => sql.clone(),

            Expr::Paren(expr) => {
                let expr_sql = expr.build(dialect, params, offset);
                format!("({expr_sql})")
            }

            Expr::CountStar => "COUNT(*)".to_string(),
        }
    }

    /// Operands binding looser than their parent operator are parenthesized.
    fn build_operand<D: SqlDialect + ?Sized>(
        &self,
        dialect: &D,
        params: &mut Vec<Value>,
        offset: usize,
        parent: BinaryOp,
    ) -> String {
        let sql = self.build(dialect, params, offset);
        match self {
            Expr::Binary { op, .. } if op.precedence() < parent.precedence() => format!("({sql})"),
            _ => sql,
        }
    }
}

impl From<Value> for Expr {
    fn from(v: Value) -> Self {
        Expr::Literal(v)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Literal(Value::Text(s.to_string()))
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Literal(Value::Text(s))
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        Expr::Literal(Value::from(n))
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        Expr::Literal(Value::BigInt(n))
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        Expr::Literal(Value::Bool(b))
    }
}

impl From<f64> for Expr {
    fn from(n: f64) -> Self {
        Expr::Literal(Value::Double(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use activerow_core::{Dialect, Scope};

    fn build(expr: &Expr) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sql = expr.build(&Dialect::Postgres, &mut params, 0);
        (sql, params)
    }

    #[test]
    fn test_column_qualified() {
        let (sql, params) = build(&Expr::qualified("users", "name"));
        assert_eq!(sql, "\"users\".\"name\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_literal_binds_parameter() {
        let (sql, params) = build(&Expr::col("age").eq(18));
        assert_eq!(sql, "\"age\" = $1");
        assert_eq!(params, vec![Value::BigInt(18)]);
    }

    #[test]
    fn test_default_literal_is_inline() {
        let (sql, params) = build(&Expr::Literal(Value::Default));
        assert_eq!(sql, "DEFAULT");
        assert!(params.is_empty());
    }

    #[test]
    fn test_and_or_precedence() {
        let expr = Expr::col("a")
            .eq(1)
            .or(Expr::col("b").eq(2))
            .and(Expr::col("c").eq(3));
        let (sql, params) = build(&expr);
        assert_eq!(sql, "(\"a\" = $1 OR \"b\" = $2) AND \"c\" = $3");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_not_wraps_binary() {
        let (sql, _) = build(&Expr::col("done").eq(true).not());
        assert_eq!(sql, "NOT (\"done\" = $1)");
    }

    #[test]
    fn test_in_list_and_empty_list() {
        let (sql, params) = build(&Expr::col("id").in_list(vec![1, 2, 3]));
        assert_eq!(sql, "\"id\" IN ($1, $2, $3)");
        assert_eq!(params.len(), 3);

        let (sql, params) = build(&Expr::col("id").in_list(Vec::<Expr>::new()));
        assert_eq!(sql, "1 = 0");
        assert!(params.is_empty());
    }

    #[test]
    fn test_like_and_null_checks() {
        let (sql, params) = build(&Expr::col("name").like("Task%"));
        assert_eq!(sql, "\"name\" LIKE $1");
        assert_eq!(params, vec![Value::Text("Task%".to_string())]);

        let (sql, _) = build(&Expr::col("deleted_at").is_not_null());
        assert_eq!(sql, "\"deleted_at\" IS NOT NULL");
    }

    #[test]
    fn test_parameter_offset() {
        let mut params = vec![Value::Null];
        let sql = Expr::col("x")
            .eq(5)
            .build(&Dialect::Sqlite, &mut params, 0);
        assert_eq!(sql, "\"x\" = ?2");
    }

    #[test]
    fn test_scope_condition_is_qualified() {
        let scope = Scope::new().eq("state", "done").is_null("archived_at");
        let exprs: Vec<_> = scope
            .conditions()
            .iter()
            .map(|c| Expr::scope_condition("tasks__done_tasks", c))
            .collect();
        let (sql, params) = build(&Expr::all(exprs).unwrap());
        assert_eq!(
            sql,
            "\"tasks__done_tasks\".\"state\" = $1 AND \"tasks__done_tasks\".\"archived_at\" IS NULL"
        );
        assert_eq!(params, vec![Value::Text("done".to_string())]);
    }

    #[test]
    fn test_resolve_paths() {
        let expr = Expr::path(&["project"], "name")
            .eq("Alpha")
            .and(Expr::col("done").eq(false));
        assert_eq!(expr.paths(), vec![&["project".to_string()][..]]);

        let resolved = expr
            .resolve_paths(&mut |path: &[String]| {
                Ok::<_, ()>(format!("tasks__{}", path.join("__")))
            })
            .unwrap();
        let (sql, _) = build(&resolved);
        assert_eq!(sql, "\"tasks__project\".\"name\" = $1 AND \"done\" = $2");
    }
}
