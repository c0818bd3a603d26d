//! Generic client trait for executing commands.

use crate::cursor::ResultCursor;
use crate::dialect::Dialect;
use crate::error::MapResult;
use crate::value::DbValue;

/// A database client or transaction the [`DataMapper`](crate::DataMapper) runs commands on.
///
/// Implemented for `tokio_postgres::Client` and `tokio_postgres::Transaction` with the
/// `postgres` feature. Other drivers (or test doubles) implement it directly.
pub trait GenericClient: Send + Sync {
    /// Cursor over the rows returned by [`query`](Self::query).
    type Cursor: ResultCursor + Send;

    /// SQL dialect of the connected database.
    fn dialect(&self) -> &dyn Dialect;

    /// Execute a query and return a cursor over its rows.
    fn query(
        &self,
        sql: &str,
        params: &[&DbValue],
    ) -> impl std::future::Future<Output = MapResult<Self::Cursor>> + Send;

    /// Execute a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[&DbValue],
    ) -> impl std::future::Future<Output = MapResult<u64>> + Send;

    /// Execute a statement and return the first column of its first row.
    ///
    /// Returns [`DbValue::Null`] when the statement produces no rows.
    fn execute_scalar(
        &self,
        sql: &str,
        params: &[&DbValue],
    ) -> impl std::future::Future<Output = MapResult<DbValue>> + Send {
        async move {
            let mut cursor = self.query(sql, params).await?;
            if cursor.advance()? && cursor.field_count() > 0 {
                cursor.value(0)
            } else {
                Ok(DbValue::Null)
            }
        }
    }
}

impl<C: GenericClient> GenericClient for &C {
    type Cursor = C::Cursor;

    fn dialect(&self) -> &dyn Dialect {
        (**self).dialect()
    }

    async fn query(&self, sql: &str, params: &[&DbValue]) -> MapResult<Self::Cursor> {
        (**self).query(sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[&DbValue]) -> MapResult<u64> {
        (**self).execute(sql, params).await
    }

    async fn execute_scalar(&self, sql: &str, params: &[&DbValue]) -> MapResult<DbValue> {
        (**self).execute_scalar(sql, params).await
    }
}
