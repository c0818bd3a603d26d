//! Parameterized INSERT/UPDATE generation.
//!
//! Generators read the parameters already bound to a [`Command`] and turn them into
//! statement text, using the [`Dialect`](crate::Dialect) for identifier quoting,
//! placeholders and identity retrieval.
//!
//! ```ignore
//! use datamap::{Binder, Command, InsertQuery, SqlServerDialect};
//!
//! let map = repository.column_map::<Person>()?;
//! let mut command = Command::new("");
//! Binder::new(repository.converters()).bind_insert(&mut command, &map, &person)?;
//! let sql = InsertQuery::new(&SqlServerDialect, map.columns(), &command, "People").generate()?;
//! ```

mod insert;
mod update;

#[cfg(test)]
mod tests;

pub use insert::InsertQuery;
pub use update::UpdateQuery;

use crate::command::{Command, Parameter};
use crate::mapping::{ColumnMap, ColumnMapCollection};

/// A bound parameter matched to its column, with its 1-based position in the command.
struct BoundColumn<'a, E> {
    column: &'a ColumnMap<E>,
    parameter: &'a Parameter,
    position: usize,
}

/// Match parameters to columns in bound order, stopping at the first parameter that
/// names no mapped column. Trailing parameters are left for other uses.
fn bound_columns<'a, E>(
    columns: &'a ColumnMapCollection<E>,
    command: &'a Command,
) -> Vec<BoundColumn<'a, E>> {
    command
        .parameters()
        .iter()
        .enumerate()
        .map_while(|(index, parameter)| {
            columns.get(&parameter.name).map(|column| BoundColumn {
                column,
                parameter,
                position: index + 1,
            })
        })
        .collect()
}

fn log_generated(kind: &'static str, sql: &str, params: usize) {
    tracing::debug!(target: "datamap.sql", kind, params, sql, "generated statement");
}
