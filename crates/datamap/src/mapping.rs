//! Column and relationship mapping model.
//!
//! An [`EntityMap`] describes how one Rust type corresponds to database columns
//! ([`ColumnMap`]) and to related entities ([`RelationshipMap`]). Maps are built from the
//! code-constructed [`EntityMapping`] returned by [`Entity::mapping`], usually generated by
//! `#[derive(Entity)]`, and cached by the [`MappingRepository`](crate::MappingRepository).
//!
//! ```ignore
//! use datamap::{ColumnMap, Entity, EntityMapping};
//!
//! #[derive(Default)]
//! struct Person {
//!     id: i32,
//!     name: String,
//! }
//!
//! impl Entity for Person {
//!     fn mapping() -> EntityMapping<Self> {
//!         EntityMapping::new()
//!             .table("people")
//!             .column(ColumnMap::new("id", |p: &Person| &p.id, |p: &mut Person| &mut p.id)
//!                 .column("ID")
//!                 .primary_key()
//!                 .auto_increment()
//!                 .return_value())
//!             .field("Name", |p: &Person| &p.name, |p: &mut Person| &mut p.name)
//!     }
//! }
//! ```

use crate::convert::{Converter, ConverterRegistry, write_through};
use crate::error::{MapError, MapResult};
use crate::graph::{BuildContext, ChildLoader, loader_for_many, loader_for_one};
use crate::value::{ColumnValue, DbType, DbValue, TypeKey};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// A type that can be materialized from result rows and bound to statements.
///
/// Entities start from `Default`; columns absent from a result set keep their default.
pub trait Entity: Default + 'static {
    /// Describe this type's columns and relationships.
    ///
    /// Called at most once per repository; the result is validated and cached.
    fn mapping() -> EntityMapping<Self>;
}

type Getter<E> = Box<dyn Fn(&E) -> MapResult<DbValue> + Send + Sync>;
type Setter<E> = Box<dyn Fn(&mut E, DbValue) -> MapResult<()> + Send + Sync>;

/// Metadata for one persisted field.
pub struct ColumnMap<E> {
    field_name: String,
    name: String,
    alt_name: Option<String>,
    value_type: TypeKey,
    db_type: DbType,
    explicit_db_type: bool,
    is_primary_key: bool,
    is_auto_increment: bool,
    is_return_value: bool,
    is_nullable: bool,
    converter: Option<Arc<dyn Converter>>,
    getter: Getter<E>,
    setter: Setter<E>,
}

impl<E: 'static> ColumnMap<E> {
    /// Map a field. The column name defaults to `field_name`.
    pub fn new<F: ColumnValue>(
        field_name: &str,
        get: fn(&E) -> &F,
        get_mut: fn(&mut E) -> &mut F,
    ) -> Self {
        Self {
            field_name: field_name.to_string(),
            name: field_name.to_string(),
            alt_name: None,
            value_type: F::value_type(),
            db_type: F::db_type(),
            explicit_db_type: false,
            is_primary_key: false,
            is_auto_increment: false,
            is_return_value: false,
            is_nullable: F::is_nullable(),
            converter: None,
            getter: Box::new(move |entity| get(entity).to_db_value()),
            setter: Box::new(move |entity, value| {
                *get_mut(entity) = F::from_db_value(value)?;
                Ok(())
            }),
        }
    }

    /// Override the database column name.
    pub fn column(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Alternate column name, tried before the column name when reading rows.
    ///
    /// Useful for aliasing columns that collide in joined result sets.
    pub fn with_alt_name(mut self, name: &str) -> Self {
        self.alt_name = Some(name.to_string());
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    /// The database assigns this column on insert; it is never inserted explicitly.
    pub fn auto_increment(mut self) -> Self {
        self.is_auto_increment = true;
        self
    }

    /// The column's generated value is read back after insert.
    pub fn return_value(mut self) -> Self {
        self.is_return_value = true;
        self
    }

    /// Explicit database type tag.
    pub fn with_db_type(mut self, db_type: DbType) -> Self {
        self.db_type = db_type;
        self.explicit_db_type = true;
        self
    }

    /// Force nullability (inferred from `Option<T>` otherwise).
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.is_nullable = nullable;
        self
    }

    /// Per-column converter, taking precedence over the repository's registry.
    pub fn converter(mut self, converter: Arc<dyn Converter>) -> Self {
        if !self.explicit_db_type {
            if let Some(db_type) = converter.db_type() {
                self.db_type = db_type;
            }
        }
        self.converter = Some(converter);
        self
    }
}

impl<E> ColumnMap<E> {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Database column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn alt_name(&self) -> Option<&str> {
        self.alt_name.as_deref()
    }

    pub fn value_type(&self) -> TypeKey {
        self.value_type
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }

    pub fn is_primary_key(&self) -> bool {
        self.is_primary_key
    }

    pub fn is_auto_increment(&self) -> bool {
        self.is_auto_increment
    }

    pub fn is_return_value(&self) -> bool {
        self.is_return_value
    }

    pub fn is_nullable(&self) -> bool {
        self.is_nullable
    }

    pub fn has_converter(&self) -> bool {
        self.converter.is_some()
    }

    /// Read the field's natural value (before conversion).
    pub fn get_value(&self, entity: &E) -> MapResult<DbValue> {
        (self.getter)(entity).map_err(|e| e.for_column(&self.name))
    }

    /// Assign a natural value (after conversion) to the field.
    pub fn set_value(&self, entity: &mut E, value: DbValue) -> MapResult<()> {
        (self.setter)(entity, value).map_err(|e| e.for_column(&self.name))
    }

    /// Read the field and convert it for writing.
    pub(crate) fn read_for_write(
        &self,
        entity: &E,
        converters: &ConverterRegistry,
    ) -> MapResult<DbValue> {
        let natural = self.get_value(entity)?;
        self.to_database(natural, converters)
    }

    pub(crate) fn to_database(
        &self,
        value: DbValue,
        converters: &ConverterRegistry,
    ) -> MapResult<DbValue> {
        let converted = match &self.converter {
            Some(converter) => write_through(converter.as_ref(), value),
            None => converters.to_database(self.value_type, value),
        };
        converted.map_err(|e| e.for_column(&self.name))
    }

    /// Convert a raw database value and assign it to the field.
    pub(crate) fn assign_from_db(
        &self,
        entity: &mut E,
        raw: DbValue,
        converters: &ConverterRegistry,
    ) -> MapResult<()> {
        let natural = match &self.converter {
            Some(converter) => converter.from_db(raw),
            None => converters.from_database(self.value_type, raw),
        }
        .map_err(|e| e.for_column(&self.name))?;
        self.set_value(entity, natural)
    }
}

impl<E> fmt::Debug for ColumnMap<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ColumnMap")
            .field("field_name", &self.field_name)
            .field("name", &self.name)
            .field("alt_name", &self.alt_name)
            .field("value_type", &self.value_type.name())
            .field("db_type", &self.db_type)
            .field("is_primary_key", &self.is_primary_key)
            .field("is_auto_increment", &self.is_auto_increment)
            .field("is_return_value", &self.is_return_value)
            .field("is_nullable", &self.is_nullable)
            .field("has_converter", &self.converter.is_some())
            .finish()
    }
}

/// Ordered column maps of one entity type.
pub struct ColumnMapCollection<E> {
    columns: Vec<ColumnMap<E>>,
}

impl<E> ColumnMapCollection<E> {
    /// Look up a column by column (or parameter) name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<&ColumnMap<E>> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Look up a column by its Rust field name.
    pub fn by_field(&self, field_name: &str) -> Option<&ColumnMap<E>> {
        self.columns.iter().find(|c| c.field_name == field_name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ColumnMap<E>> {
        self.columns.iter()
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &ColumnMap<E>> {
        self.columns.iter().filter(|c| c.is_primary_key)
    }

    /// Columns whose generated value is read back after insert.
    pub fn return_values(&self) -> impl Iterator<Item = &ColumnMap<E>> {
        self.columns.iter().filter(|c| c.is_return_value)
    }

    pub fn auto_increments(&self) -> impl Iterator<Item = &ColumnMap<E>> {
        self.columns.iter().filter(|c| c.is_auto_increment)
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<'a, E> IntoIterator for &'a ColumnMapCollection<E> {
    type Item = &'a ColumnMap<E>;
    type IntoIter = std::slice::Iter<'a, ColumnMap<E>>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

impl<E> fmt::Debug for ColumnMapCollection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.columns.iter()).finish()
    }
}

/// Cardinality of a relationship field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipKind {
    /// `Option<C>`: many-to-one or one-to-one.
    One,
    /// `Vec<C>`: one-to-many.
    Many,
}

/// Type-erased description of a relationship, as returned by
/// [`MappingRepository::relationships`](crate::MappingRepository::relationships).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipInfo {
    pub field_name: String,
    pub kind: RelationshipKind,
    pub target: TypeKey,
}

/// Builds graph loaders for one relationship of a parent type `P`.
pub(crate) trait RelationshipAccess<P>: Send + Sync {
    fn loader(&self, ctx: &mut BuildContext<'_>) -> MapResult<Option<Box<dyn ChildLoader<P>>>>;
}

struct HasMany<P, C> {
    items: fn(&mut P) -> &mut Vec<C>,
}

impl<P: Entity, C: Entity> RelationshipAccess<P> for HasMany<P, C> {
    fn loader(&self, ctx: &mut BuildContext<'_>) -> MapResult<Option<Box<dyn ChildLoader<P>>>> {
        loader_for_many::<P, C>(ctx, self.items)
    }
}

struct HasOne<P, C> {
    slot: fn(&mut P) -> &mut Option<C>,
}

impl<P: Entity, C: Entity> RelationshipAccess<P> for HasOne<P, C> {
    fn loader(&self, ctx: &mut BuildContext<'_>) -> MapResult<Option<Box<dyn ChildLoader<P>>>> {
        loader_for_one::<P, C>(ctx, self.slot)
    }
}

/// Metadata for a field holding related entities.
///
/// The target's column maps are fetched from the repository when a graph is materialized,
/// so self-referencing and mutually-referencing types can be declared.
pub struct RelationshipMap<E> {
    field_name: String,
    kind: RelationshipKind,
    target: TypeKey,
    access: Box<dyn RelationshipAccess<E>>,
}

impl<E> RelationshipMap<E> {
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    pub fn kind(&self) -> RelationshipKind {
        self.kind
    }

    pub fn target(&self) -> TypeKey {
        self.target
    }

    pub fn info(&self) -> RelationshipInfo {
        RelationshipInfo {
            field_name: self.field_name.clone(),
            kind: self.kind,
            target: self.target,
        }
    }

    /// Resolve the target type's map, checking that `C` is the declared target.
    pub fn target_map<C: Entity>(
        &self,
        repository: &crate::MappingRepository,
    ) -> MapResult<Arc<EntityMap<C>>> {
        if TypeKey::of::<C>() != self.target {
            return Err(MapError::configuration(format!(
                "relationship '{}' targets {}, not {}",
                self.field_name,
                self.target.name(),
                std::any::type_name::<C>()
            )));
        }
        repository.column_map::<C>()
    }

    pub(crate) fn access(&self) -> &dyn RelationshipAccess<E> {
        self.access.as_ref()
    }
}

impl<E> fmt::Debug for RelationshipMap<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationshipMap")
            .field("field_name", &self.field_name)
            .field("kind", &self.kind)
            .field("target", &self.target.name())
            .finish()
    }
}

/// Validated, cached mapping of one entity type.
pub struct EntityMap<E> {
    type_name: &'static str,
    table: Option<String>,
    columns: ColumnMapCollection<E>,
    relationships: Vec<RelationshipMap<E>>,
}

impl<E> EntityMap<E> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Declared table name, if any.
    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    /// Declared table name, or the unqualified type name.
    pub fn table_name(&self) -> &str {
        match &self.table {
            Some(table) => table,
            None => short_type_name(self.type_name),
        }
    }

    pub fn columns(&self) -> &ColumnMapCollection<E> {
        &self.columns
    }

    pub fn relationships(&self) -> &[RelationshipMap<E>] {
        &self.relationships
    }
}

impl<E> fmt::Debug for EntityMap<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMap")
            .field("type_name", &self.type_name)
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("relationships", &self.relationships)
            .finish()
    }
}

fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Code-constructed mapping description for an entity type.
pub struct EntityMapping<E> {
    table: Option<String>,
    columns: Vec<ColumnMap<E>>,
    relationships: Vec<RelationshipMap<E>>,
    declared_keys: Vec<String>,
}

impl<E: Entity> Default for EntityMapping<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> EntityMapping<E> {
    pub fn new() -> Self {
        Self {
            table: None,
            columns: Vec::new(),
            relationships: Vec::new(),
            declared_keys: Vec::new(),
        }
    }

    pub fn table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn column(mut self, column: ColumnMap<E>) -> Self {
        self.columns.push(column);
        self
    }

    /// Shorthand for a plain column whose name equals `column_name`.
    pub fn field<F: ColumnValue>(
        self,
        column_name: &str,
        get: fn(&E) -> &F,
        get_mut: fn(&mut E) -> &mut F,
    ) -> Self {
        self.column(ColumnMap::new(column_name, get, get_mut))
    }

    /// Declare a primary key by column name.
    ///
    /// Building the map fails if no column has this name.
    pub fn primary_key(mut self, column_name: &str) -> Self {
        self.declared_keys.push(column_name.to_string());
        self
    }

    /// One-to-many relationship stored in a `Vec<C>`.
    pub fn has_many<C: Entity>(mut self, field_name: &str, items: fn(&mut E) -> &mut Vec<C>) -> Self {
        self.relationships.push(RelationshipMap {
            field_name: field_name.to_string(),
            kind: RelationshipKind::Many,
            target: TypeKey::of::<C>(),
            access: Box::new(HasMany { items }),
        });
        self
    }

    /// Single related entity stored in an `Option<C>`.
    pub fn has_one<C: Entity>(mut self, field_name: &str, slot: fn(&mut E) -> &mut Option<C>) -> Self {
        self.relationships.push(RelationshipMap {
            field_name: field_name.to_string(),
            kind: RelationshipKind::One,
            target: TypeKey::of::<C>(),
            access: Box::new(HasOne { slot }),
        });
        self
    }

    /// Validate and freeze the description.
    pub fn build(self) -> MapResult<EntityMap<E>> {
        let type_name = std::any::type_name::<E>();
        let mut columns = self.columns;

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.to_ascii_lowercase()) {
                return Err(MapError::configuration(format!(
                    "{type_name}: column '{}' is claimed by more than one field",
                    column.name
                )));
            }
        }

        for key in &self.declared_keys {
            match columns.iter_mut().find(|c| c.name.eq_ignore_ascii_case(key)) {
                Some(column) => column.is_primary_key = true,
                None => {
                    return Err(MapError::configuration(format!(
                        "{type_name}: primary key '{key}' does not resolve to a mapped column"
                    )));
                }
            }
        }

        let mut seen_relationships = HashSet::new();
        for relationship in &self.relationships {
            if !seen_relationships.insert(relationship.field_name.as_str()) {
                return Err(MapError::configuration(format!(
                    "{type_name}: relationship '{}' is declared more than once",
                    relationship.field_name
                )));
            }
        }

        Ok(EntityMap {
            type_name,
            table: self.table,
            columns: ColumnMapCollection { columns },
            relationships: self.relationships,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::BoolCharConverter;
    use rust_decimal::Decimal;

    #[derive(Debug, Default)]
    struct Item {
        id: i32,
        price: Decimal,
        label: Option<String>,
        active: bool,
    }

    impl Entity for Item {
        fn mapping() -> EntityMapping<Self> {
            EntityMapping::new()
                .table("items")
                .column(
                    ColumnMap::new("id", |i: &Item| &i.id, |i: &mut Item| &mut i.id)
                        .column("ItemID")
                        .primary_key()
                        .auto_increment()
                        .return_value(),
                )
                .field("Price", |i: &Item| &i.price, |i: &mut Item| &mut i.price)
                .field("Label", |i: &Item| &i.label, |i: &mut Item| &mut i.label)
                .column(
                    ColumnMap::new("active", |i: &Item| &i.active, |i: &mut Item| &mut i.active)
                        .column("Active")
                        .converter(Arc::new(BoolCharConverter::default())),
                )
        }
    }

    #[test]
    fn column_roles_and_inference() {
        let map = Item::mapping().build().unwrap();
        let id = map.columns().get("itemid").unwrap();
        assert!(id.is_primary_key());
        assert!(id.is_auto_increment());
        assert!(id.is_return_value());
        assert_eq!(id.db_type(), DbType::Integer);
        assert_eq!(id.field_name(), "id");

        let label = map.columns().get("Label").unwrap();
        assert!(label.is_nullable());
        assert_eq!(label.value_type(), TypeKey::of::<String>());

        let active = map.columns().get("Active").unwrap();
        assert_eq!(active.db_type(), DbType::Char);
        assert!(active.has_converter());

        assert_eq!(map.columns().primary_keys().count(), 1);
        assert_eq!(map.columns().return_values().count(), 1);
        assert_eq!(map.table_name(), "items");
    }

    #[test]
    fn builder_setters_feed_the_getters() {
        let column = ColumnMap::new("price", |i: &Item| &i.price, |i: &mut Item| &mut i.price)
            .column("Price")
            .with_alt_name("UnitPrice")
            .with_db_type(DbType::Double);
        assert_eq!(column.alt_name(), Some("UnitPrice"));
        assert_eq!(column.db_type(), DbType::Double);

        // An explicit type survives a converter that reports its own.
        let column = ColumnMap::new("active", |i: &Item| &i.active, |i: &mut Item| &mut i.active)
            .with_db_type(DbType::Boolean)
            .converter(Arc::new(BoolCharConverter::default()));
        assert_eq!(column.db_type(), DbType::Boolean);
        assert_eq!(column.alt_name(), None);
    }

    #[test]
    fn column_override_converter_applies_both_ways() {
        let map = Item::mapping().build().unwrap();
        let registry = ConverterRegistry::new();
        let active = map.columns().get("Active").unwrap();

        let item = Item {
            active: true,
            ..Default::default()
        };
        assert_eq!(
            active.read_for_write(&item, &registry).unwrap(),
            DbValue::Text("Y".into())
        );

        let mut loaded = Item::default();
        active
            .assign_from_db(&mut loaded, DbValue::Text("Y".into()), &registry)
            .unwrap();
        assert!(loaded.active);
    }

    #[test]
    fn conversion_errors_name_the_column() {
        let map = Item::mapping().build().unwrap();
        let mut item = Item::default();
        let err = map
            .columns()
            .get("Price")
            .unwrap()
            .set_value(&mut item, DbValue::Text("not a number".into()))
            .unwrap_err();
        match err {
            MapError::Conversion { column, .. } => assert_eq!(column, "Price"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn duplicate_column_names_are_rejected() {
        let result = EntityMapping::<Item>::new()
            .field("Price", |i: &Item| &i.price, |i: &mut Item| &mut i.price)
            .field("PRICE", |i: &Item| &i.id, |i: &mut Item| &mut i.id)
            .build();
        assert!(result.unwrap_err().is_mapping_configuration());
    }

    #[test]
    fn declared_key_must_resolve() {
        let result = EntityMapping::<Item>::new()
            .field("Price", |i: &Item| &i.price, |i: &mut Item| &mut i.price)
            .primary_key("ItemID")
            .build();
        assert!(result.unwrap_err().is_mapping_configuration());

        let map = EntityMapping::<Item>::new()
            .field("ItemID", |i: &Item| &i.id, |i: &mut Item| &mut i.id)
            .primary_key("itemid")
            .build()
            .unwrap();
        assert!(map.columns().get("ItemID").unwrap().is_primary_key());
    }

    #[test]
    fn table_name_falls_back_to_type_name() {
        let map = EntityMapping::<Item>::new().build().unwrap();
        assert_eq!(map.table_name(), "Item");
    }
}
