//! Table and column introspection results.

use crate::Result;
use crate::error::{ConfigErrorKind, Error};
use serde::{Deserialize, Serialize};

/// A column as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Declared SQL type, as spelled by the engine
    pub sql_type: String,
    pub nullable: bool,
    /// Default expression, if any
    pub default: Option<String>,
    pub primary_key: bool,
}

/// A table as reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
}

impl Table {
    /// Create a table description.
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    /// Look up a column by name.
    pub fn get_column_by_name(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column by name, failing with a configuration error.
    pub fn get_column_by_name_or_fail(&self, name: &str) -> Result<&Column> {
        self.get_column_by_name(name).ok_or_else(|| {
            Error::config(
                ConfigErrorKind::ColumnNotFound,
                format!("Couldn't find a column by that name \"{}\"", name),
            )
        })
    }
}

/// Look up a table by name.
pub fn get_table_by_name<'a>(tables: &'a [Table], name: &str) -> Option<&'a Table> {
    tables.iter().find(|t| t.name == name)
}

/// Look up a table by name; the error lists every known table, sorted.
pub fn get_table_by_name_or_fail<'a>(tables: &'a [Table], name: &str) -> Result<&'a Table> {
    get_table_by_name(tables, name).ok_or_else(|| {
        let mut names: Vec<&str> = tables.iter().map(|t| t.name.as_str()).collect();
        names.sort_unstable();
        Error::config(
            ConfigErrorKind::TableNotFound,
            format!(
                "Couldn't find a table by that name \"{}\" in: {}",
                name,
                names.join(", ")
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str) -> Column {
        Column {
            name: name.to_string(),
            sql_type: "TEXT".to_string(),
            nullable: true,
            default: None,
            primary_key: false,
        }
    }

    #[test]
    fn missing_table_lists_sorted_tables() {
        let tables = vec![
            Table::new("tasks", vec![column("id")]),
            Table::new("projects", vec![column("id")]),
            Table::new("accounts", vec![]),
        ];

        assert!(get_table_by_name(&tables, "tasks").is_some());
        let err = get_table_by_name_or_fail(&tables, "missing").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Couldn't find a table by that name \"missing\" in: accounts, projects, tasks"
        );
        assert_eq!(err.config_kind(), Some(ConfigErrorKind::TableNotFound));
    }

    #[test]
    fn missing_column_message() {
        let table = Table::new("tasks", vec![column("id"), column("name")]);
        assert_eq!(table.get_column_by_name_or_fail("name").unwrap().name, "name");
        let err = table.get_column_by_name_or_fail("nope").unwrap_err();
        assert_eq!(err.to_string(), "Couldn't find a column by that name \"nope\"");
    }
}
