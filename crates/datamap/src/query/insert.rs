use super::{bound_columns, log_generated};
use crate::command::Command;
use crate::dialect::Dialect;
use crate::error::{MapError, MapResult};
use crate::mapping::ColumnMapCollection;

/// INSERT generator over the parameters bound to a command.
pub struct InsertQuery<'a, E> {
    dialect: &'a dyn Dialect,
    columns: &'a ColumnMapCollection<E>,
    command: &'a Command,
    target: &'a str,
}

impl<'a, E> InsertQuery<'a, E> {
    pub fn new(
        dialect: &'a dyn Dialect,
        columns: &'a ColumnMapCollection<E>,
        command: &'a Command,
        target: &'a str,
    ) -> Self {
        Self {
            dialect,
            columns,
            command,
            target,
        }
    }

    /// `INSERT INTO <target> (<cols>) VALUES (<params>)`, plus the dialect's identity
    /// clause when the map has return-value columns.
    ///
    /// Auto-increment columns are left out of both lists.
    pub fn generate(&self) -> MapResult<String> {
        if self.columns.iter().all(|c| c.is_auto_increment()) {
            return Err(MapError::query_generation(format!(
                "cannot insert into {}: no non-auto-increment columns are mapped",
                self.target
            )));
        }

        let mut names = Vec::new();
        let mut values = Vec::new();
        for bound in bound_columns(self.columns, self.command) {
            if bound.column.is_auto_increment() {
                continue;
            }
            names.push(self.dialect.create_token(bound.column.name()));
            values.push(
                self.dialect
                    .parameter_placeholder(&bound.parameter.name, bound.position),
            );
        }
        if names.is_empty() {
            return Err(MapError::query_generation(format!(
                "cannot insert into {}: no parameters are bound to insertable columns",
                self.target
            )));
        }

        let mut sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.dialect.create_token(self.target),
            names.join(","),
            values.join(",")
        );

        let returning: Vec<&str> = self.columns.return_values().map(|c| c.name()).collect();
        if !returning.is_empty() {
            if let Some(clause) = self.dialect.identity_clause(&returning) {
                sql.push_str(&clause);
            }
        }

        log_generated("insert", &sql, names.len());
        Ok(sql)
    }
}
