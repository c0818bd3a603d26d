//! Database-specific SQL syntax used by the statement generators.
//!
//! Each dialect is a strategy: the generators only call into the [`Dialect`] trait and
//! stay agnostic of quoting and identity-retrieval rules.

/// Identifier quoting, parameter placeholders and identity retrieval for one database.
pub trait Dialect: Send + Sync {
    /// Dialect identifier (e.g. "sqlserver", "postgres").
    fn name(&self) -> &str;

    /// Quote a possibly dotted identifier (`schema.table`, `column`).
    fn create_token(&self, name: &str) -> String;

    /// Placeholder for the parameter named `name` at 1-based `position`.
    fn parameter_placeholder(&self, name: &str, position: usize) -> String;

    /// Clause appended after an INSERT to read back generated values, if the database
    /// supports one. `return_columns` are the unquoted return-value column names.
    fn identity_clause(&self, return_columns: &[&str]) -> Option<String>;
}

/// Quote each dotted part with `open`/`close`, doubling embedded closing characters.
fn quote_parts(name: &str, open: char, close: char) -> String {
    name.split('.')
        .map(|part| {
            let escaped = part.replace(close, &format!("{close}{close}"));
            format!("{open}{escaped}{close}")
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Names pass through unquoted, parameters are `@name`, no identity clause.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDialect;

impl Dialect for DefaultDialect {
    fn name(&self) -> &str {
        "default"
    }

    fn create_token(&self, name: &str) -> String {
        name.to_string()
    }

    fn parameter_placeholder(&self, name: &str, _position: usize) -> String {
        format!("@{name}")
    }

    fn identity_clause(&self, _return_columns: &[&str]) -> Option<String> {
        None
    }
}

/// SQL Server: `[schema].[table]`, `@name`, `SCOPE_IDENTITY()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServerDialect;

impl Dialect for SqlServerDialect {
    fn name(&self) -> &str {
        "sqlserver"
    }

    fn create_token(&self, name: &str) -> String {
        quote_parts(name, '[', ']')
    }

    fn parameter_placeholder(&self, name: &str, _position: usize) -> String {
        format!("@{name}")
    }

    fn identity_clause(&self, _return_columns: &[&str]) -> Option<String> {
        Some(";SELECT SCOPE_IDENTITY();".to_string())
    }
}

/// SQLite: `"table"`, `@name`, `last_insert_rowid()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn create_token(&self, name: &str) -> String {
        quote_parts(name, '"', '"')
    }

    fn parameter_placeholder(&self, name: &str, _position: usize) -> String {
        format!("@{name}")
    }

    fn identity_clause(&self, _return_columns: &[&str]) -> Option<String> {
        Some(";SELECT last_insert_rowid();".to_string())
    }
}

/// PostgreSQL: `"schema"."table"`, `$n`, `RETURNING`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn create_token(&self, name: &str) -> String {
        quote_parts(name, '"', '"')
    }

    fn parameter_placeholder(&self, _name: &str, position: usize) -> String {
        format!("${position}")
    }

    fn identity_clause(&self, return_columns: &[&str]) -> Option<String> {
        if return_columns.is_empty() {
            return None;
        }
        let columns: Vec<String> = return_columns
            .iter()
            .map(|c| self.create_token(c))
            .collect();
        Some(format!(" RETURNING {}", columns.join(", ")))
    }
}
