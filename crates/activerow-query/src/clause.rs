//! ORDER BY clause types.

use crate::expr::Expr;
use activerow_core::{SqlDialect, Value};

/// ORDER BY clause.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expr: Expr,
    pub direction: OrderDirection,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

impl OrderBy {
    pub fn new(expr: Expr, direction: OrderDirection) -> Self {
        Self { expr, direction }
    }

    /// Create an ascending order by clause on an unqualified column.
    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(Expr::col(column), OrderDirection::Asc)
    }

    /// Create a descending order by clause on an unqualified column.
    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(Expr::col(column), OrderDirection::Desc)
    }

    /// Generate SQL for this ORDER BY term.
    pub fn build<D: SqlDialect + ?Sized>(
        &self,
        dialect: &D,
        params: &mut Vec<Value>,
        offset: usize,
    ) -> String {
        format!(
            "{} {}",
            self.expr.build(dialect, params, offset),
            self.direction.as_str()
        )
    }
}
