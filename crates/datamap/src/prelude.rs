//! Convenient imports for typical `datamap` usage.
//!
//! ```ignore
//! use datamap::prelude::*;
//! ```

pub use crate::{
    Binder, ColumnMap, Command, DataMapper, DataMapperConfig, DbValue, Dialect, Entity,
    EntityMapping, GenericClient, MapError, MapResult, MappingRepository, MemoryCursor,
    ResultCursor, map_graph, row,
};

#[cfg(feature = "postgres")]
pub use crate::PgCursor;
