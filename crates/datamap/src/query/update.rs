use super::{bound_columns, log_generated};
use crate::command::Command;
use crate::dialect::Dialect;
use crate::error::{MapError, MapResult};
use crate::mapping::ColumnMapCollection;

/// UPDATE generator over the parameters bound to a command.
///
/// Non-key, non-auto-increment columns form the SET list; key columns form the predicate.
pub struct UpdateQuery<'a, E> {
    dialect: &'a dyn Dialect,
    columns: &'a ColumnMapCollection<E>,
    command: &'a Command,
    target: &'a str,
}

impl<'a, E> UpdateQuery<'a, E> {
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

    /// `UPDATE <target> SET <col>=<param>,... WHERE <key>=<param> AND ...`.
    pub fn generate(&self) -> MapResult<String> {
        if self.columns.primary_keys().next().is_none() {
            return Err(MapError::query_generation(format!(
                "cannot update {}: no primary key columns are mapped",
                self.target
            )));
        }

        let bound = bound_columns(self.columns, self.command);

        let mut set = Vec::new();
        let mut predicate = Vec::new();
        for b in &bound {
            let assignment = format!(
                "{}={}",
                self.dialect.create_token(b.column.name()),
                self.dialect.parameter_placeholder(&b.parameter.name, b.position)
            );
            if b.column.is_primary_key() {
                predicate.push(assignment);
            } else if !b.column.is_auto_increment() {
                set.push(assignment);
            }
        }

        if let Some(missing) = self
            .columns
            .primary_keys()
            .find(|key| !bound.iter().any(|b| std::ptr::eq(b.column, *key)))
        {
            return Err(MapError::query_generation(format!(
                "cannot update {}: key column '{}' has no bound parameter",
                self.target,
                missing.name()
            )));
        }
        if set.is_empty() {
            return Err(MapError::query_generation(format!(
                "cannot update {}: no parameters are bound to updatable columns",
                self.target
            )));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {}",
            self.dialect.create_token(self.target),
            set.join(","),
            predicate.join(" AND ")
        );
        log_generated("update", &sql, bound.len());
        Ok(sql)
    }
}
