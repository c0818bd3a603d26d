//! Commands, parameters and the parameter binder.
//!
//! ```ignore
//! let binder = Binder::new(repository.converters());
//! let mut command = Command::new("");
//! binder.bind(&mut command, "Name", "Jordan".to_string())?.size(50).add();
//! binder.bind(&mut command, "Total", 0i32)?.output().add();
//! ```

use crate::convert::ConverterRegistry;
use crate::error::{MapError, MapResult};
use crate::mapping::{ColumnMap, EntityMap};
use crate::value::{ColumnValue, DbType, DbValue};
use std::fmt;

/// Direction of a command parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterDirection {
    #[default]
    Input,
    Output,
    InputOutput,
    ReturnValue,
}

/// A named, bound command parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub value: DbValue,
    pub direction: ParameterDirection,
    pub size: Option<u32>,
    pub precision: Option<u8>,
    pub scale: Option<u8>,
    pub db_type: Option<DbType>,
    pub is_nullable: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: DbValue) -> Self {
        let is_nullable = value.is_null();
        Self {
            name: name.into(),
            value,
            direction: ParameterDirection::Input,
            size: None,
            precision: None,
            scale: None,
            db_type: None,
            is_nullable,
        }
    }
}

/// SQL text plus its ordered parameter collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    sql: String,
    parameters: Vec<Parameter>,
}

impl Command {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameters: Vec::new(),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn set_sql(&mut self, sql: impl Into<String>) {
        self.sql = sql.into();
    }

    /// Parameters in bound order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Find a parameter by name, case-insensitively.
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Parameter values in bound order.
    pub fn values(&self) -> Vec<&DbValue> {
        self.parameters.iter().map(|p| &p.value).collect()
    }

    /// Append a fully configured parameter, returning its position.
    pub fn push(&mut self, parameter: Parameter) -> usize {
        self.parameters.push(parameter);
        self.parameters.len() - 1
    }

    pub fn clear_parameters(&mut self) {
        self.parameters.clear();
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Pending parameter configuration.
///
/// Nothing is added to the command until [`add`](Self::add) is called; the parameter
/// then appears with every configured attribute at once.
#[must_use = "the parameter is only added to the command by `add()`"]
pub struct ParameterBuilder<'c> {
    command: &'c mut Command,
    parameter: Parameter,
}

impl<'c> ParameterBuilder<'c> {
    fn new(command: &'c mut Command, parameter: Parameter) -> Self {
        Self { command, parameter }
    }

    pub fn direction(mut self, direction: ParameterDirection) -> Self {
        self.parameter.direction = direction;
        self
    }

    pub fn output(self) -> Self {
        self.direction(ParameterDirection::Output)
    }

    pub fn input_output(self) -> Self {
        self.direction(ParameterDirection::InputOutput)
    }

    pub fn return_value(self) -> Self {
        self.direction(ParameterDirection::ReturnValue)
    }

    pub fn size(mut self, size: u32) -> Self {
        self.parameter.size = Some(size);
        self
    }

    pub fn precision(mut self, precision: u8) -> Self {
        self.parameter.precision = Some(precision);
        self
    }

    pub fn scale(mut self, scale: u8) -> Self {
        self.parameter.scale = Some(scale);
        self
    }

    pub fn db_type(mut self, db_type: DbType) -> Self {
        self.parameter.db_type = Some(db_type);
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.parameter.is_nullable = nullable;
        self
    }

    /// Rename the parameter.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.parameter.name = name.into();
        self
    }

    /// The parameter as currently configured.
    pub fn pending(&self) -> &Parameter {
        &self.parameter
    }

    /// Append the configured parameter to the command, returning its position.
    pub fn add(self) -> usize {
        self.command.push(self.parameter)
    }
}

/// Binds values and entities onto commands through a converter registry.
#[derive(Debug, Clone, Copy)]
pub struct Binder<'r> {
    converters: &'r ConverterRegistry,
}

impl<'r> Binder<'r> {
    pub fn new(converters: &'r ConverterRegistry) -> Self {
        Self { converters }
    }

    /// Start a parameter named `name` holding `value`.
    ///
    /// The value goes through the converter registered for `T` (for `Option<T>`, the
    /// one registered for `T`) and is otherwise bound as-is. `None` always binds null.
    pub fn bind<'c, T: ColumnValue>(
        &self,
        command: &'c mut Command,
        name: &str,
        value: T,
    ) -> MapResult<ParameterBuilder<'c>> {
        let natural = value.to_db_value().map_err(|e| e.for_column(name))?;
        let converter = self.converters.get(T::value_type());
        let db_type = converter
            .as_ref()
            .and_then(|c| c.db_type())
            .unwrap_or_else(T::db_type);
        let stored = self
            .converters
            .to_database(T::value_type(), natural)
            .map_err(|e| e.for_column(name))?;

        let mut parameter = Parameter::new(name, stored);
        parameter.is_nullable = T::is_nullable() || parameter.value.is_null();
        if db_type != DbType::Variant {
            parameter.db_type = Some(db_type);
        }
        Ok(ParameterBuilder::new(command, parameter))
    }

    /// Start a parameter from an already-converted database value.
    pub fn bind_value<'c>(
        &self,
        command: &'c mut Command,
        name: &str,
        value: impl Into<DbValue>,
    ) -> ParameterBuilder<'c> {
        ParameterBuilder::new(command, Parameter::new(name, value.into()))
    }

    /// Bind every insertable (non-auto-increment) column of `entity`, in map order.
    ///
    /// Parameters are named after their columns. Returns the number bound.
    pub fn bind_insert<E>(
        &self,
        command: &mut Command,
        map: &EntityMap<E>,
        entity: &E,
    ) -> MapResult<usize> {
        let mut bound = 0;
        for column in map.columns().iter().filter(|c| !c.is_auto_increment()) {
            self.bind_column(command, column, entity)?;
            bound += 1;
        }
        Ok(bound)
    }

    /// Bind the SET columns (non-key, non-auto-increment) of `entity`, then its keys.
    pub fn bind_update<E>(
        &self,
        command: &mut Command,
        map: &EntityMap<E>,
        entity: &E,
    ) -> MapResult<usize> {
        let mut bound = 0;
        for column in map
            .columns()
            .iter()
            .filter(|c| !c.is_primary_key() && !c.is_auto_increment())
        {
            self.bind_column(command, column, entity)?;
            bound += 1;
        }
        for column in map.columns().primary_keys() {
            self.bind_column(command, column, entity)?;
            bound += 1;
        }
        Ok(bound)
    }

    fn bind_column<E>(
        &self,
        command: &mut Command,
        column: &ColumnMap<E>,
        entity: &E,
    ) -> MapResult<()> {
        let value = column.read_for_write(entity, self.converters)?;
        let mut parameter = Parameter::new(column.name(), value);
        parameter.is_nullable = column.is_nullable() || parameter.value.is_null();
        if column.db_type() != DbType::Variant {
            parameter.db_type = Some(column.db_type());
        }
        command.push(parameter);
        Ok(())
    }
}

/// Write a statement's returned scalar into the entity's generated-value column.
///
/// Targets the first return-value column, falling back to the first auto-increment
/// column. A null scalar leaves the entity unchanged. Returns whether a value was written.
pub fn apply_return_value<E>(
    entity: &mut E,
    map: &EntityMap<E>,
    value: DbValue,
    converters: &ConverterRegistry,
) -> MapResult<bool> {
    if value.is_null() {
        return Ok(false);
    }
    let column = map
        .columns()
        .return_values()
        .next()
        .or_else(|| map.columns().auto_increments().next())
        .ok_or_else(|| {
            MapError::query_generation(format!(
                "{} has no return-value or auto-increment column to receive the generated value",
                map.type_name()
            ))
        })?;
    column.assign_from_db(entity, value, converters)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::BoolCharConverter;
    use crate::value::TypeKey;
    use std::sync::Arc;

    #[test]
    fn builder_appends_only_when_added() {
        let registry = ConverterRegistry::new();
        let binder = Binder::new(&registry);
        let mut command = Command::new("");

        let pending = binder.bind(&mut command, "Name", "Ann".to_string()).unwrap();
        assert_eq!(pending.pending().name, "Name");
        let position = pending.size(20).add();
        assert_eq!(position, 0);
        assert_eq!(command.len(), 1);
        assert_eq!(command.parameters()[0].size, Some(20));
        assert_eq!(command.parameters()[0].db_type, Some(DbType::VarChar));
    }

    #[test]
    fn chain_applies_in_order_last_write_wins() {
        let registry = ConverterRegistry::new();
        let binder = Binder::new(&registry);
        let mut command = Command::new("");
        binder
            .bind(&mut command, "Amount", 0i32)
            .unwrap()
            .output()
            .precision(10)
            .scale(2)
            .size(4)
            .size(8)
            .input_output()
            .name("Total")
            .add();

        let p = command.parameter("total").unwrap();
        assert_eq!(p.direction, ParameterDirection::InputOutput);
        assert_eq!(p.size, Some(8));
        assert_eq!(p.precision, Some(10));
        assert_eq!(p.scale, Some(2));
        assert!(command.parameter("Amount").is_none());
    }

    #[test]
    fn bind_converts_by_static_type_and_normalizes_null() {
        let registry = ConverterRegistry::new();
        registry.register(TypeKey::of::<bool>(), Arc::new(BoolCharConverter::default()));
        let binder = Binder::new(&registry);
        let mut command = Command::new("");

        binder.bind(&mut command, "Happy", true).unwrap().add();
        binder.bind(&mut command, "Maybe", None::<bool>).unwrap().add();

        assert_eq!(command.parameters()[0].value, DbValue::Text("Y".into()));
        assert_eq!(command.parameters()[0].db_type, Some(DbType::Char));
        assert_eq!(command.parameters()[1].value, DbValue::Null);
        assert!(command.parameters()[1].is_nullable);
    }
}
