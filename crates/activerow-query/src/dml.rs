//! INSERT, UPDATE and DELETE statements.

use crate::expr::Expr;
use activerow_core::{SqlDialect, Value};

/// INSERT statement builder.
///
/// A `Value::Default` renders as the `DEFAULT` keyword instead of a bound
/// parameter, which lets the server generate a key.
#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    table: String,
    values: Vec<(String, Value)>,
}

impl InsertStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            values: Vec::new(),
        }
    }

    /// Set a column value.
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    /// Set several column values.
    pub fn values(mut self, values: impl IntoIterator<Item = (String, Value)>) -> Self {
        self.values.extend(values);
        self
    }

    /// Build the INSERT SQL and parameters.
    pub fn build<D: SqlDialect + ?Sized>(&self, dialect: &D) -> (String, Vec<Value>) {
        let table = dialect.quote_table(&self.table);
        if self.values.is_empty() {
            return (format!("INSERT INTO {} DEFAULT VALUES", table), Vec::new());
        }

        let mut params = Vec::new();
        let columns: Vec<_> = self
            .values
            .iter()
            .map(|(column, _)| dialect.quote_column(column))
            .collect();
        let placeholders: Vec<_> = self
            .values
            .iter()
            .map(|(_, value)| Expr::Literal(value.clone()).build(dialect, &mut params, 0))
            .collect();

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );
        (sql, params)
    }
}

/// UPDATE statement builder.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    table: String,
    sets: Vec<(String, Value)>,
    filter: Option<Expr>,
}

impl UpdateStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sets: Vec::new(),
            filter: None,
        }
    }

    /// Add `column = value`.
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push((column.into(), value.into()));
        self
    }

    /// Add a WHERE condition, AND-ed with earlier ones.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Whether there is nothing to update.
    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Build the UPDATE SQL and parameters.
    pub fn build<D: SqlDialect + ?Sized>(&self, dialect: &D) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let sets: Vec<_> = self
            .sets
            .iter()
            .map(|(column, value)| {
                format!(
                    "{} = {}",
                    dialect.quote_column(column),
                    Expr::Literal(value.clone()).build(dialect, &mut params, 0)
                )
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            dialect.quote_table(&self.table),
            sets.join(", ")
        );
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.build(dialect, &mut params, 0));
        }
        (sql, params)
    }
}

/// DELETE statement builder.
#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    table: String,
    filter: Option<Expr>,
}

impl DeleteStatement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filter: None,
        }
    }

    /// Add a WHERE condition, AND-ed with earlier ones.
    pub fn filter(mut self, expr: Expr) -> Self {
        self.filter = Some(match self.filter {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Build the DELETE SQL and parameters.
    pub fn build<D: SqlDialect + ?Sized>(&self, dialect: &D) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let mut sql = format!("DELETE FROM {}", dialect.quote_table(&self.table));
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter.build(dialect, &mut params, 0));
        }
        (sql, params)
    }
}
