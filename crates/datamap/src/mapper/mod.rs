//! Async facade tying the mapping core to a database client.
//!
//! ```ignore
//! use datamap::{DataMapper, DataMapperConfig};
//! use std::time::Duration;
//!
//! let mapper = DataMapper::new(&client)
//!     .config(DataMapperConfig::new().timeout(Duration::from_secs(5)).with_logging());
//!
//! let orders: Vec<Order> = mapper
//!     .query_to_graph(
//!         "SELECT o.ID, o.OrderName, i.OrderItemID, i.ItemDescription, i.Price \
//!          FROM Orders o LEFT JOIN OrderItems i ON i.OrderID = o.ID ORDER BY o.ID",
//!         &[],
//!     )
//!     .await?;
//!
//! let mut person = Person { name: "Jordan".into(), ..Default::default() };
//! mapper.insert(&mut person).await?; // person.id now holds the generated key
//! ```

mod config;

pub use config::DataMapperConfig;

use crate::client::GenericClient;
use crate::command::{Binder, Command, apply_return_value};
use crate::error::{MapError, MapResult};
use crate::graph::map_graph;
use crate::mapping::{Entity, EntityMap};
use crate::query::{InsertQuery, UpdateQuery};
use crate::repository::MappingRepository;
use crate::row;
use crate::value::DbValue;
use std::future::Future;
use std::time::Instant;
use tracing::Level;

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN  => tracing::warn!($($field)*),
            Level::INFO  => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

/// Runs mapped queries and entity writes on a [`GenericClient`].
pub struct DataMapper<'r, C> {
    client: C,
    repository: &'r MappingRepository,
    config: DataMapperConfig,
}

impl<C: GenericClient> DataMapper<'static, C> {
    /// Create a mapper using the process-wide [`MappingRepository`].
    pub fn new(client: C) -> Self {
        Self::with_repository(client, MappingRepository::global())
    }
}

impl<'r, C: GenericClient> DataMapper<'r, C> {
    pub fn with_repository(client: C, repository: &'r MappingRepository) -> Self {
        Self {
            client,
            repository,
            config: DataMapperConfig::default(),
        }
    }

    /// Replace the configuration.
    pub fn config(mut self, config: DataMapperConfig) -> Self {
        self.config = config;
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn repository(&self) -> &'r MappingRepository {
        self.repository
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    /// Binder over this mapper's converters.
    pub fn binder(&self) -> Binder<'r> {
        Binder::new(self.repository.converters())
    }

    /// First row as `E`, or `None` when the query returns no rows.
    pub async fn find<E: Entity>(&self, sql: &str, params: &[&DbValue]) -> MapResult<Option<E>> {
        let cursor = self.timed("query", sql, params.len(), self.client.query(sql, params)).await?;
        row::find(self.repository, cursor)
    }

    /// Load the first row into `entity`; `false` (and `entity` untouched) when there is none.
    pub async fn find_into<E: Entity>(
        &self,
        sql: &str,
        params: &[&DbValue],
        entity: &mut E,
    ) -> MapResult<bool> {
        let cursor = self.timed("query", sql, params.len(), self.client.query(sql, params)).await?;
        row::find_into(self.repository, cursor, entity)
    }

    /// Every row as an `E`.
    pub async fn query<E: Entity>(&self, sql: &str, params: &[&DbValue]) -> MapResult<Vec<E>> {
        let cursor = self.timed("query", sql, params.len(), self.client.query(sql, params)).await?;
        row::query(self.repository, cursor)
    }

    /// Fold a joined, parent-sorted result set into `E` roots with their children.
    pub async fn query_to_graph<E: Entity>(
        &self,
        sql: &str,
        params: &[&DbValue],
    ) -> MapResult<Vec<E>> {
        let cursor = self.timed("query", sql, params.len(), self.client.query(sql, params)).await?;
        map_graph(self.repository, cursor)
    }

    /// Insert `entity` into its mapped table, writing any generated key back into it.
    pub async fn insert<E: Entity>(&self, entity: &mut E) -> MapResult<()> {
        let map = self.repository.column_map::<E>()?;
        let mut command = Command::new("");
        self.binder().bind_insert(&mut command, &map, entity)?;
        let sql = InsertQuery::new(
            self.client.dialect(),
            map.columns(),
            &command,
            map.table_name(),
        )
        .generate()?;
        command.set_sql(sql);
        self.run_insert(&command, &map, entity).await
    }

    /// Insert `entity` with caller-provided SQL text, binding its columns by name.
    pub async fn insert_sql<E: Entity>(&self, entity: &mut E, sql: &str) -> MapResult<()> {
        let map = self.repository.column_map::<E>()?;
        let mut command = Command::new(sql);
        self.binder().bind_insert(&mut command, &map, entity)?;
        self.run_insert(&command, &map, entity).await
    }

    /// Update `entity`'s row in its mapped table by primary key. Returns affected rows.
    pub async fn update<E: Entity>(&self, entity: &E) -> MapResult<u64> {
        let map = self.repository.column_map::<E>()?;
        let mut command = Command::new("");
        self.binder().bind_update(&mut command, &map, entity)?;
        let sql = UpdateQuery::new(
            self.client.dialect(),
            map.columns(),
            &command,
            map.table_name(),
        )
        .generate()?;
        command.set_sql(sql);
        self.execute(&command).await
    }

    /// Update with caller-provided SQL text, binding SET columns then keys by name.
    pub async fn update_sql<E: Entity>(&self, entity: &E, sql: &str) -> MapResult<u64> {
        let map = self.repository.column_map::<E>()?;
        let mut command = Command::new(sql);
        self.binder().bind_update(&mut command, &map, entity)?;
        self.execute(&command).await
    }

    /// Execute a prepared command and return the number of affected rows.
    pub async fn execute(&self, command: &Command) -> MapResult<u64> {
        let params = command.values();
        self.timed(
            "execute",
            command.sql(),
            params.len(),
            self.client.execute(command.sql(), &params),
        )
        .await
    }

    /// Execute a prepared command and return the first column of its first row.
    pub async fn execute_scalar(&self, command: &Command) -> MapResult<DbValue> {
        let params = command.values();
        self.timed(
            "scalar",
            command.sql(),
            params.len(),
            self.client.execute_scalar(command.sql(), &params),
        )
        .await
    }

    async fn run_insert<E: Entity>(
        &self,
        command: &Command,
        map: &EntityMap<E>,
        entity: &mut E,
    ) -> MapResult<()> {
        if map.columns().return_values().next().is_none() {
            self.execute(command).await?;
            return Ok(());
        }
        let generated = self.execute_scalar(command).await?;
        apply_return_value(entity, map, generated, self.repository.converters())?;
        Ok(())
    }

    async fn timed<T>(
        &self,
        kind: &'static str,
        sql: &str,
        param_count: usize,
        fut: impl Future<Output = MapResult<T>>,
    ) -> MapResult<T> {
        let start = Instant::now();
        let result = match self.config.query_timeout {
            Some(limit) => match tokio::time::timeout(limit, fut).await {
                Ok(result) => result,
                Err(_) => Err(MapError::Timeout(limit)),
            },
            None => fut.await,
        };

        if self.config.logging_enabled {
            let sql = self.config.display_sql(sql);
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => emit_at_level!(
                    self.config.log_level,
                    target: "datamap.sql",
                    kind,
                    param_count,
                    elapsed_ms,
                    sql = %sql,
                    "executed statement"
                ),
                Err(err) => emit_at_level!(
                    self.config.log_level,
                    target: "datamap.sql",
                    kind,
                    param_count,
                    elapsed_ms,
                    sql = %sql,
                    error = %err,
                    "statement failed"
                ),
            }
        }
        result
    }
}
