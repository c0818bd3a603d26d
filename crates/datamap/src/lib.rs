//! # datamap
//!
//! Typed mapping between relational result sets, in-memory entity graphs and
//! parameterized statements. SQL text stays in the caller's hands.
//!
//! ## Features
//!
//! - **Explicit mapping**: each type describes its columns and relationships in code
//!   (`Entity::mapping()`), usually via `#[derive(Entity)]`
//! - **Graph materialization**: fold a joined, parent-sorted result set into roots that own
//!   their children, in one forward pass; unsorted input fails with `MapError::DataMapping`
//! - **Statement generation**: INSERT/UPDATE text from bound parameters, with
//!   auto-increment skipping and identity read-back per dialect
//! - **Converters**: per-type (or per-column) transforms between field values and stored values
//! - **tokio-postgres adapter**: `PgCursor`, `ToSql for DbValue` and `GenericClient` impls
//!
//! ## Graph mapping
//!
//! ```ignore
//! use datamap::{Entity, MappingRepository, MemoryCursor, map_graph, row};
//!
//! #[derive(Debug, Default, Entity)]
//! struct Order {
//!     #[orm(id, column = "ID")]
//!     id: i32,
//!     #[orm(column = "OrderName")]
//!     name: String,
//!     #[orm(has_many)]
//!     items: Vec<OrderItem>,
//! }
//!
//! #[derive(Debug, Default, Entity)]
//! struct OrderItem {
//!     #[orm(id, column = "OrderItemID")]
//!     id: i32,
//!     #[orm(column = "ItemDescription")]
//!     description: String,
//! }
//!
//! let cursor = MemoryCursor::new(["ID", "OrderName", "OrderItemID", "ItemDescription"])
//!     .row(row![1, "Order1", 50, "Red car"])
//!     .row(row![1, "Order1", 51, "Blue wagon"]);
//! let orders: Vec<Order> = map_graph(MappingRepository::global(), cursor)?;
//! assert_eq!(orders[0].items.len(), 2);
//! ```

pub mod client;
pub mod command;
pub mod convert;
pub mod cursor;
pub mod dialect;
pub mod error;
pub mod graph;
pub mod mapper;
pub mod mapping;
pub mod prelude;
pub mod query;
pub mod repository;
pub mod row;
pub mod value;

#[cfg(feature = "postgres")]
pub mod pg;

pub use client::GenericClient;
pub use command::{
    Binder, Command, Parameter, ParameterBuilder, ParameterDirection, apply_return_value,
};
pub use convert::{
    BoolCharConverter, BoolIntConverter, Converter, ConverterRegistry, FnConverter,
    JsonTextConverter,
};
pub use cursor::{MemoryCursor, ResultCursor};
pub use dialect::{DefaultDialect, Dialect, PostgresDialect, SqlServerDialect, SqliteDialect};
pub use error::{MapError, MapResult};
pub use graph::{EntityGraph, map_graph};
pub use mapper::{DataMapper, DataMapperConfig};
pub use mapping::{
    ColumnMap, ColumnMapCollection, Entity, EntityMap, EntityMapping, RelationshipInfo,
    RelationshipKind, RelationshipMap,
};
pub use query::{InsertQuery, UpdateQuery};
pub use repository::MappingRepository;
pub use row::{RowMapper, find, find_into, resolve_ordinals};
pub use value::{ColumnValue, DbType, DbValue, Json, TypeKey};

#[cfg(feature = "postgres")]
pub use pg::PgCursor;

#[cfg(feature = "postgres")]
pub use tokio_postgres;

#[cfg(feature = "derive")]
pub use datamap_derive::Entity;
