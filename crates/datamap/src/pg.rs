//! tokio-postgres adapter: result cursor, parameter encoding and client impls.

use crate::client::GenericClient;
use crate::cursor::ResultCursor;
use crate::dialect::{Dialect, PostgresDialect};
use crate::error::{MapError, MapResult};
use crate::value::DbValue;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::error::Error;
use tokio_postgres::Row;
use tokio_postgres::types::{IsNull, ToSql, Type};
use uuid::Uuid;

/// Forward-only cursor over rows returned by tokio-postgres.
///
/// Column names and types are taken from the first row; an empty result has no columns.
#[derive(Debug)]
pub struct PgCursor {
    rows: Vec<Row>,
    columns: Vec<String>,
    types: Vec<Type>,
    position: Option<usize>,
}

impl PgCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        let (columns, types): (Vec<String>, Vec<Type>) = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|c| (c.name().to_string(), c.type_().clone()))
                    .unzip()
            })
            .unwrap_or_default();
        Self {
            rows,
            columns,
            types,
            position: None,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

impl ResultCursor for PgCursor {
    fn advance(&mut self) -> MapResult<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn field_name(&self, ordinal: usize) -> &str {
        self.columns.get(ordinal).map_or("", String::as_str)
    }

    fn value(&self, ordinal: usize) -> MapResult<DbValue> {
        let row = self
            .position
            .and_then(|p| self.rows.get(p))
            .ok_or_else(|| MapError::Other("cursor is not positioned on a row".to_string()))?;
        let ty = self.types.get(ordinal).ok_or_else(|| {
            MapError::Other(format!(
                "ordinal {ordinal} is out of range for {} columns",
                self.columns.len()
            ))
        })?;
        decode(row, ordinal, ty).map_err(|e| match e {
            MapError::Conversion { message, .. } => {
                MapError::conversion(self.field_name(ordinal), message)
            }
            other => other,
        })
    }
}

fn get<T>(row: &Row, ordinal: usize, wrap: fn(T) -> DbValue) -> MapResult<DbValue>
where
    T: for<'a> tokio_postgres::types::FromSql<'a>,
{
    let value: Option<T> = row.try_get(ordinal)?;
    Ok(value.map_or(DbValue::Null, wrap))
}

fn decode(row: &Row, ordinal: usize, ty: &Type) -> MapResult<DbValue> {
    if *ty == Type::BOOL {
        get::<bool>(row, ordinal, DbValue::Bool)
    } else if *ty == Type::INT2 {
        get::<i16>(row, ordinal, DbValue::I16)
    } else if *ty == Type::INT4 {
        get::<i32>(row, ordinal, DbValue::I32)
    } else if *ty == Type::INT8 {
        get::<i64>(row, ordinal, DbValue::I64)
    } else if *ty == Type::OID {
        get::<u32>(row, ordinal, |v| DbValue::I64(i64::from(v)))
    } else if *ty == Type::FLOAT4 {
        get::<f32>(row, ordinal, DbValue::F32)
    } else if *ty == Type::FLOAT8 {
        get::<f64>(row, ordinal, DbValue::F64)
    } else if *ty == Type::NUMERIC {
        get::<Decimal>(row, ordinal, DbValue::Decimal)
    } else if *ty == Type::TEXT
        || *ty == Type::VARCHAR
        || *ty == Type::BPCHAR
        || *ty == Type::NAME
        || *ty == Type::UNKNOWN
    {
        get::<String>(row, ordinal, DbValue::Text)
    } else if *ty == Type::BYTEA {
        get::<Vec<u8>>(row, ordinal, DbValue::Bytes)
    } else if *ty == Type::DATE {
        get::<NaiveDate>(row, ordinal, DbValue::Date)
    } else if *ty == Type::TIME {
        get::<NaiveTime>(row, ordinal, DbValue::Time)
    } else if *ty == Type::TIMESTAMP {
        get::<NaiveDateTime>(row, ordinal, DbValue::Timestamp)
    } else if *ty == Type::TIMESTAMPTZ {
        get::<DateTime<Utc>>(row, ordinal, DbValue::TimestampTz)
    } else if *ty == Type::UUID {
        get::<Uuid>(row, ordinal, DbValue::Uuid)
    } else if *ty == Type::JSON || *ty == Type::JSONB {
        get::<serde_json::Value>(row, ordinal, DbValue::Json)
    } else {
        Err(MapError::conversion(
            "",
            format!("unsupported postgres type '{}'", ty.name()),
        ))
    }
}

type BoxError = Box<dyn Error + Sync + Send>;

fn int_to_sql(value: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::INT2 {
        i16::try_from(value)?.to_sql(ty, out)
    } else if *ty == Type::INT4 {
        i32::try_from(value)?.to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::from(value).to_sql(ty, out)
    } else if *ty == Type::FLOAT4 {
        (value as f32).to_sql(ty, out)
    } else if *ty == Type::FLOAT8 {
        (value as f64).to_sql(ty, out)
    } else {
        value.to_sql_checked(ty, out)
    }
}

fn float_to_sql(value: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    if *ty == Type::FLOAT4 {
        (value as f32).to_sql(ty, out)
    } else if *ty == Type::NUMERIC {
        Decimal::try_from(value)?.to_sql(ty, out)
    } else {
        value.to_sql_checked(ty, out)
    }
}

fn decimal_to_sql(value: Decimal, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
    let is_int = *ty == Type::INT2 || *ty == Type::INT4 || *ty == Type::INT8;
    if *ty == Type::FLOAT4 || *ty == Type::FLOAT8 {
        let float = value
            .to_f64()
            .ok_or_else(|| format!("decimal {value} does not fit a float"))?;
        float_to_sql(float, ty, out)
    } else if is_int && value.fract().is_zero() {
        let int = value
            .to_i64()
            .ok_or_else(|| format!("decimal {value} does not fit an integer"))?;
        int_to_sql(int, ty, out)
    } else {
        value.to_sql_checked(ty, out)
    }
}

/// Values are encoded for the parameter type the server inferred. Integers, floats and
/// decimals are narrowed or widened to fit a numeric parameter; any other mismatch is
/// rejected with `WrongType`.
impl ToSql for DbValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        match self {
            DbValue::Null => Ok(IsNull::Yes),
            DbValue::Bool(v) => v.to_sql_checked(ty, out),
            DbValue::I16(v) => int_to_sql(i64::from(*v), ty, out),
            DbValue::I32(v) => int_to_sql(i64::from(*v), ty, out),
            DbValue::I64(v) => int_to_sql(*v, ty, out),
            DbValue::F32(v) => float_to_sql(f64::from(*v), ty, out),
            DbValue::F64(v) => float_to_sql(*v, ty, out),
            DbValue::Decimal(v) => decimal_to_sql(*v, ty, out),
            DbValue::Text(v) => v.to_sql_checked(ty, out),
            DbValue::Bytes(v) => v.to_sql_checked(ty, out),
            DbValue::Date(v) => v.to_sql_checked(ty, out),
            DbValue::Time(v) => v.to_sql_checked(ty, out),
            DbValue::Timestamp(v) => v.to_sql_checked(ty, out),
            DbValue::TimestampTz(v) => v.to_sql_checked(ty, out),
            DbValue::Uuid(v) => v.to_sql_checked(ty, out),
            DbValue::Json(v) => v.to_sql_checked(ty, out),
        }
    }

    /// Every type some variant can encode; the variant itself is checked in `to_sql`.
    fn accepts(ty: &Type) -> bool {
        <bool as ToSql>::accepts(ty)
            || <i16 as ToSql>::accepts(ty)
            || <i32 as ToSql>::accepts(ty)
            || <i64 as ToSql>::accepts(ty)
            || <f32 as ToSql>::accepts(ty)
            || <f64 as ToSql>::accepts(ty)
            || <Decimal as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || <Vec<u8> as ToSql>::accepts(ty)
            || <NaiveDate as ToSql>::accepts(ty)
            || <NaiveTime as ToSql>::accepts(ty)
            || <NaiveDateTime as ToSql>::accepts(ty)
            || <DateTime<Utc> as ToSql>::accepts(ty)
            || <Uuid as ToSql>::accepts(ty)
            || <serde_json::Value as ToSql>::accepts(ty)
    }

    tokio_postgres::types::to_sql_checked!();
}

fn sql_params<'a>(params: &'a [&'a DbValue]) -> Vec<&'a (dyn ToSql + Sync)> {
    params.iter().map(|p| *p as &(dyn ToSql + Sync)).collect()
}

impl GenericClient for tokio_postgres::Client {
    type Cursor = PgCursor;

    fn dialect(&self) -> &dyn Dialect {
        &PostgresDialect
    }

    async fn query(&self, sql: &str, params: &[&DbValue]) -> MapResult<PgCursor> {
        let params = sql_params(params);
        let rows = tokio_postgres::Client::query(self, sql, &params).await?;
        Ok(PgCursor::new(rows))
    }

    async fn execute(&self, sql: &str, params: &[&DbValue]) -> MapResult<u64> {
        let params = sql_params(params);
        Ok(tokio_postgres::Client::execute(self, sql, &params).await?)
    }
}

impl GenericClient for tokio_postgres::Transaction<'_> {
    type Cursor = PgCursor;

    fn dialect(&self) -> &dyn Dialect {
        &PostgresDialect
    }

    async fn query(&self, sql: &str, params: &[&DbValue]) -> MapResult<PgCursor> {
        let params = sql_params(params);
        let rows = tokio_postgres::Transaction::query(self, sql, &params).await?;
        Ok(PgCursor::new(rows))
    }

    async fn execute(&self, sql: &str, params: &[&DbValue]) -> MapResult<u64> {
        let params = sql_params(params);
        Ok(tokio_postgres::Transaction::execute(self, sql, &params).await?)
    }
}
