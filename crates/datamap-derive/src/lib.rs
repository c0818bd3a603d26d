//! Derive macros for datamap
//!
//! Provides `#[derive(Entity)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod common;
mod entity;

/// Derive the `Entity` mapping for a struct.
///
/// # Example
///
/// ```ignore
/// use datamap::Entity;
///
/// #[derive(Default, Entity)]
/// #[orm(table = "People", rename_all = "PascalCase")]
/// struct Person {
///     #[orm(id, auto_increment, return_value, column = "ID")]
///     id: i32,
///     name: String,
///     #[orm(converter = "datamap::BoolIntConverter")]
///     is_happy: bool,
///     #[orm(has_many)]
///     pets: Vec<Pet>,
///     #[orm(skip)]
///     cached_score: u32,
/// }
/// ```
///
/// # Struct attributes
///
/// - `#[orm(table = "name")]` - Table used by generated INSERT/UPDATE statements
/// - `#[orm(rename_all = "PascalCase")]` - Column naming for fields without `column`
///   (`PascalCase`, `camelCase`, `snake_case`, `SCREAMING_SNAKE_CASE`)
///
/// # Field attributes
///
/// - `#[orm(column = "name")]` - Map field to a different column name
/// - `#[orm(alt_name = "name")]` - Result column tried before `column` when reading rows
/// - `#[orm(id)]` - Primary key
/// - `#[orm(auto_increment)]` - Generated by the database; skipped by INSERT and UPDATE SET
/// - `#[orm(return_value)]` - Receives the value read back after INSERT
/// - `#[orm(db_type = "Integer")]` - Override the `DbType` variant
/// - `#[orm(converter = "path::Type")]` - Column converter (`Default` + `Converter`)
/// - `#[orm(has_many)]` - `Vec<T>` of related entities
/// - `#[orm(has_one)]` - `Option<T>` related entity
/// - `#[orm(skip)]` - Not mapped
#[proc_macro_derive(Entity, attributes(orm))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    entity::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
