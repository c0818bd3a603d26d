//! Type converter registry.
//!
//! A [`Converter`] rewrites a field's natural [`DbValue`] into the representation the
//! database actually stores (and back). Converters are looked up by the field's
//! [`TypeKey`]; when none is registered the value passes through unchanged.

use crate::error::MapResult;
use crate::value::{DbType, DbValue, TypeKey};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Bidirectional transform between a field's natural value and its stored value.
pub trait Converter: Send + Sync {
    /// Convert an in-memory value into its database representation.
    ///
    /// Never called with [`DbValue::Null`]: null is written as null.
    fn to_db(&self, value: DbValue) -> MapResult<DbValue>;

    /// Convert a database value into the field's natural value.
    ///
    /// Called with [`DbValue::Null`] as well; return `Null` to keep the field's
    /// null/default representation.
    fn from_db(&self, value: DbValue) -> MapResult<DbValue>;

    /// Database type of the stored representation, if it differs from the field's.
    fn db_type(&self) -> Option<DbType> {
        None
    }
}

/// Stores `bool` as an integer (`1`/`0`).
#[derive(Debug, Clone, Copy, Default)]
pub struct BoolIntConverter;

impl Converter for BoolIntConverter {
    fn to_db(&self, value: DbValue) -> MapResult<DbValue> {
        match value {
            DbValue::Bool(b) => Ok(DbValue::I32(i32::from(b))),
            other => Ok(other),
        }
    }

    fn from_db(&self, value: DbValue) -> MapResult<DbValue> {
        match value {
            DbValue::Null => Ok(DbValue::Null),
            other => match other.as_i64() {
                Some(v) => Ok(DbValue::Bool(v != 0)),
                None => Ok(other),
            },
        }
    }

    fn db_type(&self) -> Option<DbType> {
        Some(DbType::Integer)
    }
}

/// Stores `bool` as a single-character flag, `"Y"`/`"N"` by default.
#[derive(Debug, Clone)]
pub struct BoolCharConverter {
    true_value: String,
    false_value: String,
}

impl Default for BoolCharConverter {
    fn default() -> Self {
        Self::new("Y", "N")
    }
}

impl BoolCharConverter {
    pub fn new(true_value: impl Into<String>, false_value: impl Into<String>) -> Self {
        Self {
            true_value: true_value.into(),
            false_value: false_value.into(),
        }
    }
}

impl Converter for BoolCharConverter {
    fn to_db(&self, value: DbValue) -> MapResult<DbValue> {
        match value {
            DbValue::Bool(true) => Ok(DbValue::Text(self.true_value.clone())),
            DbValue::Bool(false) => Ok(DbValue::Text(self.false_value.clone())),
            other => Ok(other),
        }
    }

    fn from_db(&self, value: DbValue) -> MapResult<DbValue> {
        match value {
            DbValue::Text(s) if s.eq_ignore_ascii_case(&self.true_value) => Ok(DbValue::Bool(true)),
            DbValue::Text(s) if s.eq_ignore_ascii_case(&self.false_value) => {
                Ok(DbValue::Bool(false))
            }
            DbValue::Text(s) => Err(crate::error::MapError::conversion(
                "",
                format!(
                    "expected '{}' or '{}', got '{s}'",
                    self.true_value, self.false_value
                ),
            )),
            other => Ok(other),
        }
    }

    fn db_type(&self) -> Option<DbType> {
        Some(DbType::Char)
    }
}

/// Stores a JSON value as text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTextConverter;

impl Converter for JsonTextConverter {
    fn to_db(&self, value: DbValue) -> MapResult<DbValue> {
        match value {
            DbValue::Json(j) => Ok(DbValue::Text(j.to_string())),
            other => Ok(other),
        }
    }

    fn from_db(&self, value: DbValue) -> MapResult<DbValue> {
        match value {
            DbValue::Text(s) => serde_json::from_str(&s)
                .map(DbValue::Json)
                .map_err(|e| crate::error::MapError::conversion("", e.to_string())),
            other => Ok(other),
        }
    }

    fn db_type(&self) -> Option<DbType> {
        Some(DbType::Text)
    }
}

type ConvertFn = Box<dyn Fn(DbValue) -> MapResult<DbValue> + Send + Sync>;

/// A converter assembled from a pair of closures.
pub struct FnConverter {
    to_db: ConvertFn,
    from_db: ConvertFn,
    db_type: Option<DbType>,
}

impl FnConverter {
    pub fn new<T, F>(to_db: T, from_db: F) -> Self
    where
        T: Fn(DbValue) -> MapResult<DbValue> + Send + Sync + 'static,
        F: Fn(DbValue) -> MapResult<DbValue> + Send + Sync + 'static,
    {
        Self {
            to_db: Box::new(to_db),
            from_db: Box::new(from_db),
            db_type: None,
        }
    }

    /// Set the database type of the stored representation.
    pub fn with_db_type(mut self, db_type: DbType) -> Self {
        self.db_type = Some(db_type);
        self
    }
}

impl fmt::Debug for FnConverter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnConverter")
            .field("db_type", &self.db_type)
            .finish_non_exhaustive()
    }
}

impl Converter for FnConverter {
    fn to_db(&self, value: DbValue) -> MapResult<DbValue> {
        (self.to_db)(value)
    }

    fn from_db(&self, value: DbValue) -> MapResult<DbValue> {
        (self.from_db)(value)
    }

    fn db_type(&self) -> Option<DbType> {
        self.db_type
    }
}

/// Registry of converters keyed by value type.
#[derive(Default)]
pub struct ConverterRegistry {
    converters: RwLock<HashMap<TypeKey, Arc<dyn Converter>>>,
}

impl ConverterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the converter for a value type.
    pub fn register(&self, value_type: TypeKey, converter: Arc<dyn Converter>) {
        tracing::debug!(
            target: "datamap.mapping",
            value_type = value_type.name(),
            "registering converter"
        );
        self.converters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(value_type, converter);
    }

    /// Look up the converter registered for exactly this value type.
    pub fn get(&self, value_type: TypeKey) -> Option<Arc<dyn Converter>> {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&value_type)
            .cloned()
    }

    pub fn contains(&self, value_type: TypeKey) -> bool {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&value_type)
    }

    /// Convert a value for writing. Null stays null; unregistered types pass through.
    pub fn to_database(&self, value_type: TypeKey, value: DbValue) -> MapResult<DbValue> {
        match self.get(value_type) {
            Some(converter) => write_through(converter.as_ref(), value),
            None => Ok(value),
        }
    }

    /// Convert a value read from the database. Unregistered types pass through.
    pub fn from_database(&self, value_type: TypeKey, value: DbValue) -> MapResult<DbValue> {
        match self.get(value_type) {
            Some(converter) => converter.from_db(value),
            None => Ok(value),
        }
    }

    pub fn len(&self) -> usize {
        self.converters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.converters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl fmt::Debug for ConverterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterRegistry")
            .field("len", &self.len())
            .finish()
    }
}

/// Apply a converter on the write path, keeping null as null.
pub(crate) fn write_through(converter: &dyn Converter, value: DbValue) -> MapResult<DbValue> {
    if value.is_null() {
        return Ok(DbValue::Null);
    }
    converter.to_db(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(converter: &dyn Converter, value: DbValue) -> DbValue {
        let stored = converter.to_db(value).unwrap();
        converter.from_db(stored).unwrap()
    }

    #[test]
    fn bool_int_round_trip() {
        let c = BoolIntConverter;
        assert_eq!(c.to_db(DbValue::Bool(true)).unwrap(), DbValue::I32(1));
        assert_eq!(round_trip(&c, DbValue::Bool(true)), DbValue::Bool(true));
        assert_eq!(round_trip(&c, DbValue::Bool(false)), DbValue::Bool(false));
    }

    #[test]
    fn bool_char_round_trip() {
        let c = BoolCharConverter::default();
        assert_eq!(c.to_db(DbValue::Bool(false)).unwrap(), DbValue::Text("N".into()));
        assert_eq!(round_trip(&c, DbValue::Bool(true)), DbValue::Bool(true));
        assert_eq!(round_trip(&c, DbValue::Bool(false)), DbValue::Bool(false));
        assert!(c.from_db(DbValue::Text("maybe".into())).is_err());
    }

    #[test]
    fn json_text_round_trip() {
        let c = JsonTextConverter;
        let value = DbValue::Json(serde_json::json!({"a": [1, 2]}));
        assert_eq!(round_trip(&c, value.clone()), value);
    }

    #[test]
    fn fn_converter_round_trip() {
        let c = FnConverter::new(
            |v| match v {
                DbValue::Text(s) => Ok(DbValue::Text(s.to_uppercase())),
                other => Ok(other),
            },
            |v| match v {
                DbValue::Text(s) => Ok(DbValue::Text(s.to_lowercase())),
                other => Ok(other),
            },
        );
        assert_eq!(round_trip(&c, DbValue::Text("red".into())), DbValue::Text("red".into()));
    }

    #[test]
    fn registry_passes_through_unregistered_types() {
        let registry = ConverterRegistry::new();
        let v = registry
            .to_database(TypeKey::of::<bool>(), DbValue::Bool(true))
            .unwrap();
        assert_eq!(v, DbValue::Bool(true));
    }

    #[test]
    fn registry_never_converts_null_on_write() {
        let registry = ConverterRegistry::new();
        registry.register(TypeKey::of::<bool>(), Arc::new(BoolCharConverter::default()));
        assert_eq!(
            registry.to_database(TypeKey::of::<bool>(), DbValue::Null).unwrap(),
            DbValue::Null
        );
        assert_eq!(
            registry
                .to_database(TypeKey::of::<bool>(), DbValue::Bool(true))
                .unwrap(),
            DbValue::Text("Y".into())
        );
    }

    #[test]
    fn registry_lookup_is_exact() {
        let registry = ConverterRegistry::new();
        registry.register(TypeKey::of::<bool>(), Arc::new(BoolIntConverter));
        assert!(registry.contains(TypeKey::of::<bool>()));
        assert!(!registry.contains(TypeKey::of::<i32>()));
        registry.clear();
        assert!(registry.is_empty());
    }
}
