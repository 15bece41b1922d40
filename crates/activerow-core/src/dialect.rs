//! Identifier quoting, value escaping and placeholders.
//!
//! `SqlDialect` is the synchronous half of a driver: everything the query
//! builder needs to render SQL text without touching a connection. Drivers
//! implement it (usually by delegating to [`Dialect`]) and the builder only
//! ever sees `&dyn SqlDialect`.

use crate::value::Value;

/// Rendering capabilities of a SQL dialect.
pub trait SqlDialect: Send + Sync {
    /// Quote a bare identifier.
    fn quote_identifier(&self, name: &str) -> String;

    /// Quote a table name. Dotted names are quoted per segment.
    fn quote_table(&self, name: &str) -> String {
        name.split('.')
            .map(|segment| self.quote_identifier(segment))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Quote a column name.
    fn quote_column(&self, name: &str) -> String {
        self.quote_identifier(name)
    }

    /// Escape a string for inclusion inside a quoted literal.
    fn escape(&self, value: &str) -> String {
        value.replace('\'', "''")
    }

    /// Render a value as a literal.
    fn quote(&self, value: &Value) -> String {
        match value {
            Value::Text(s) => format!("'{}'", self.escape(s)),
            other => other.to_sql_literal(),
        }
    }

    /// Placeholder for the given 1-based parameter index.
    fn placeholder(&self, index: usize) -> String;

    /// `LIMIT` value meaning "no limit", for dialects that only accept
    /// `OFFSET` after a `LIMIT`.
    fn unbounded_limit(&self) -> Option<&'static str> {
        None
    }
}

/// Built-in dialects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Dialect {
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    #[default]
    Postgres,
    /// SQLite dialect (uses ?1, ?2 placeholders)
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
}

impl SqlDialect for Dialect {
    /// Embedded quote characters are doubled: `"` for Postgres/SQLite,
    /// `` ` `` for MySQL.
    fn quote_identifier(&self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                format!("\"{}\"", name.replace('"', "\"\""))
            }
            Dialect::Mysql => format!("`{}`", name.replace('`', "``")),
        }
    }

    fn escape(&self, value: &str) -> String {
        match self {
            Dialect::Mysql => value.replace('\\', "\\\\").replace('\'', "''"),
            Dialect::Postgres | Dialect::Sqlite => value.replace('\'', "''"),
        }
    }

    fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    fn unbounded_limit(&self) -> Option<&'static str> {
        match self {
            Dialect::Postgres => None,
            Dialect::Sqlite => Some("-1"),
            Dialect::Mysql => Some("18446744073709551615"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_doubles_embedded_quotes() {
        assert_eq!(Dialect::Sqlite.quote_identifier("tasks"), "\"tasks\"");
        assert_eq!(Dialect::Postgres.quote_identifier("a\"b"), "\"a\"\"b\"");
        assert_eq!(Dialect::Mysql.quote_identifier("a`b"), "`a``b`");
    }

    #[test]
    fn dotted_tables_are_quoted_per_segment() {
        assert_eq!(
            Dialect::Postgres.quote_table("public.tasks"),
            "\"public\".\"tasks\""
        );
    }

    #[test]
    fn placeholders_per_dialect() {
        assert_eq!(Dialect::Postgres.placeholder(2), "$2");
        assert_eq!(Dialect::Sqlite.placeholder(2), "?2");
        assert_eq!(Dialect::Mysql.placeholder(2), "?");
        assert_eq!(Dialect::Postgres.unbounded_limit(), None);
        assert_eq!(Dialect::Sqlite.unbounded_limit(), Some("-1"));
    }

    #[test]
    fn escaping_and_quoting_values() {
        assert_eq!(Dialect::Mysql.escape("a\\'b"), "a\\\\''b");
        assert_eq!(Dialect::Sqlite.quote(&Value::from("it's")), "'it''s'");
        assert_eq!(Dialect::Sqlite.quote(&Value::BigInt(5)), "5");
    }
}
