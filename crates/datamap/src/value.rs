//! Database values and the Rust types that map onto them.
//!
//! [`DbValue`] is the database-side representation of a single cell or parameter.
//! [`ColumnValue`] connects a Rust field type to it in both directions, including the
//! lenient coercions drivers tend to need (`i64` cell into an `i32` field, `numeric` into
//! `f64`, textual dates, ...).

use crate::error::{MapError, MapResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::any::TypeId;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use uuid::Uuid;

/// A database-representable value.
///
/// `Null` is the database null marker. It is distinct from an in-memory `None`: a `None`
/// field is written as `Null`, and `Null` is read back as `None` (or the field's default).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DbValue {
    #[default]
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Text(String),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
}

impl DbValue {
    /// Whether this is the database null marker.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::I16(_) => "i16",
            Self::I32(_) => "i32",
            Self::I64(_) => "i64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Decimal(_) => "decimal",
            Self::Text(_) => "text",
            Self::Bytes(_) => "bytes",
            Self::Date(_) => "date",
            Self::Time(_) => "time",
            Self::Timestamp(_) => "timestamp",
            Self::TimestampTz(_) => "timestamptz",
            Self::Uuid(_) => "uuid",
            Self::Json(_) => "json",
        }
    }

    /// The value as an `i64`, if it is any integer variant.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I16(v) => Some(i64::from(*v)),
            Self::I32(v) => Some(i64::from(*v)),
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// The value as a string slice, if it is `Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// A stable identifier for a Rust type, used to key converters.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Type name for diagnostics only; not guaranteed stable across compiler versions.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Explicit database type tag carried by columns and parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Decimal,
    Text,
    VarChar,
    Char,
    Binary,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Uuid,
    Json,
    /// No specific type; the driver decides.
    Variant,
}

/// A Rust type that can be stored in a mapped column or bound as a parameter.
pub trait ColumnValue: Sized + 'static {
    /// Key used for converter lookup. `Option<T>` reports `T`'s key, so a converter
    /// registered for `T` also applies to nullable `T` fields.
    fn value_type() -> TypeKey {
        TypeKey::of::<Self>()
    }

    /// Database type inferred for this Rust type.
    fn db_type() -> DbType {
        DbType::Variant
    }

    /// Whether `None`/null is a legal in-memory value.
    fn is_nullable() -> bool {
        false
    }

    fn to_db_value(&self) -> MapResult<DbValue>;

    fn from_db_value(value: DbValue) -> MapResult<Self>;
}

fn mismatch<T>(value: &DbValue) -> MapError {
    MapError::conversion(
        "",
        format!(
            "cannot convert {} value to {}",
            value.kind(),
            std::any::type_name::<T>()
        ),
    )
}

fn out_of_range<T>(value: impl std::fmt::Display) -> MapError {
    MapError::conversion(
        "",
        format!(
            "value {value} is out of range for {}",
            std::any::type_name::<T>()
        ),
    )
}

fn parse_failed<T>(text: &str, err: impl std::fmt::Display) -> MapError {
    MapError::conversion(
        "",
        format!(
            "cannot parse '{text}' as {}: {err}",
            std::any::type_name::<T>()
        ),
    )
}

fn parse_text<T>(text: &str) -> MapResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    text.trim().parse::<T>().map_err(|e| parse_failed::<T>(text, e))
}

macro_rules! impl_integer {
    ($ty:ty, $variant:ident, $db_type:expr) => {
        impl ColumnValue for $ty {
            fn db_type() -> DbType {
                $db_type
            }

            fn to_db_value(&self) -> MapResult<DbValue> {
                Ok(DbValue::$variant(*self))
            }

            fn from_db_value(value: DbValue) -> MapResult<Self> {
                match value {
                    DbValue::Null => Ok(0),
                    DbValue::I16(v) => <$ty>::try_from(v).map_err(|_| out_of_range::<$ty>(v)),
                    DbValue::I32(v) => <$ty>::try_from(v).map_err(|_| out_of_range::<$ty>(v)),
                    DbValue::I64(v) => <$ty>::try_from(v).map_err(|_| out_of_range::<$ty>(v)),
                    DbValue::Bool(b) => Ok(<$ty>::from(b)),
                    DbValue::Decimal(d) if d.fract().is_zero() => d
                        .to_i64()
                        .and_then(|v| <$ty>::try_from(v).ok())
                        .ok_or_else(|| out_of_range::<$ty>(d)),
                    DbValue::Text(ref s) => parse_text::<$ty>(s),
                    other => Err(mismatch::<$ty>(&other)),
                }
            }
        }
    };
}

impl_integer!(i16, I16, DbType::SmallInt);
impl_integer!(i32, I32, DbType::Integer);
impl_integer!(i64, I64, DbType::BigInt);

impl ColumnValue for f64 {
    fn db_type() -> DbType {
        DbType::Double
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::F64(*self))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(0.0),
            DbValue::F64(v) => Ok(v),
            DbValue::F32(v) => Ok(f64::from(v)),
            DbValue::I16(v) => Ok(f64::from(v)),
            DbValue::I32(v) => Ok(f64::from(v)),
            DbValue::I64(v) => Ok(v as f64),
            DbValue::Decimal(d) => d.to_f64().ok_or_else(|| out_of_range::<f64>(d)),
            DbValue::Text(ref s) => parse_text::<f64>(s),
            other => Err(mismatch::<f64>(&other)),
        }
    }
}

impl ColumnValue for f32 {
    fn db_type() -> DbType {
        DbType::Real
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::F32(*self))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(0.0),
            DbValue::F32(v) => Ok(v),
            DbValue::F64(v) => Ok(v as f32),
            DbValue::I16(v) => Ok(f32::from(v)),
            DbValue::I32(v) => Ok(v as f32),
            DbValue::I64(v) => Ok(v as f32),
            DbValue::Decimal(d) => d.to_f32().ok_or_else(|| out_of_range::<f32>(d)),
            DbValue::Text(ref s) => parse_text::<f32>(s),
            other => Err(mismatch::<f32>(&other)),
        }
    }
}

impl ColumnValue for bool {
    fn db_type() -> DbType {
        DbType::Boolean
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::Bool(*self))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(false),
            DbValue::Bool(b) => Ok(b),
            DbValue::I16(v) => Ok(v != 0),
            DbValue::I32(v) => Ok(v != 0),
            DbValue::I64(v) => Ok(v != 0),
            DbValue::Text(ref s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "y" | "yes" => Ok(true),
                "false" | "f" | "0" | "n" | "no" => Ok(false),
                _ => Err(parse_failed::<bool>(s, "unrecognized boolean literal")),
            },
            other => Err(mismatch::<bool>(&other)),
        }
    }
}

impl ColumnValue for Decimal {
    fn db_type() -> DbType {
        DbType::Decimal
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::Decimal(*self))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(Decimal::ZERO),
            DbValue::Decimal(d) => Ok(d),
            DbValue::I16(v) => Ok(Decimal::from(v)),
            DbValue::I32(v) => Ok(Decimal::from(v)),
            DbValue::I64(v) => Ok(Decimal::from(v)),
            DbValue::F64(v) => Decimal::try_from(v).map_err(|e| parse_failed::<Decimal>(&v.to_string(), e)),
            DbValue::F32(v) => Decimal::try_from(v).map_err(|e| parse_failed::<Decimal>(&v.to_string(), e)),
            DbValue::Text(ref s) => parse_text::<Decimal>(s),
            other => Err(mismatch::<Decimal>(&other)),
        }
    }
}

impl ColumnValue for String {
    fn db_type() -> DbType {
        DbType::VarChar
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::Text(self.clone()))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(String::new()),
            DbValue::Text(s) => Ok(s),
            DbValue::Bool(v) => Ok(v.to_string()),
            DbValue::I16(v) => Ok(v.to_string()),
            DbValue::I32(v) => Ok(v.to_string()),
            DbValue::I64(v) => Ok(v.to_string()),
            DbValue::F32(v) => Ok(v.to_string()),
            DbValue::F64(v) => Ok(v.to_string()),
            DbValue::Decimal(d) => Ok(d.to_string()),
            DbValue::Uuid(u) => Ok(u.to_string()),
            DbValue::Json(j) => Ok(j.to_string()),
            DbValue::Date(d) => Ok(d.to_string()),
            DbValue::Time(t) => Ok(t.to_string()),
            DbValue::Timestamp(t) => Ok(t.to_string()),
            DbValue::TimestampTz(t) => Ok(t.to_rfc3339()),
            DbValue::Bytes(b) => String::from_utf8(b)
                .map_err(|e| MapError::conversion("", format!("bytes are not valid UTF-8: {e}"))),
        }
    }
}

impl ColumnValue for char {
    fn db_type() -> DbType {
        DbType::Char
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::Text(self.to_string()))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok('\0'),
            DbValue::Text(ref s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(c),
                    _ => Err(parse_failed::<char>(s, "expected exactly one character")),
                }
            }
            other => Err(mismatch::<char>(&other)),
        }
    }
}

impl ColumnValue for Vec<u8> {
    fn db_type() -> DbType {
        DbType::Binary
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::Bytes(self.clone()))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(Vec::new()),
            DbValue::Bytes(b) => Ok(b),
            DbValue::Text(s) => Ok(s.into_bytes()),
            other => Err(mismatch::<Vec<u8>>(&other)),
        }
    }
}

impl ColumnValue for NaiveDate {
    fn db_type() -> DbType {
        DbType::Date
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::Date(*self))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(NaiveDate::default()),
            DbValue::Date(d) => Ok(d),
            DbValue::Timestamp(t) => Ok(t.date()),
            DbValue::TimestampTz(t) => Ok(t.date_naive()),
            DbValue::Text(ref s) => parse_text::<NaiveDate>(s),
            other => Err(mismatch::<NaiveDate>(&other)),
        }
    }
}

impl ColumnValue for NaiveTime {
    fn db_type() -> DbType {
        DbType::Time
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::Time(*self))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(NaiveTime::default()),
            DbValue::Time(t) => Ok(t),
            DbValue::Timestamp(t) => Ok(t.time()),
            DbValue::Text(ref s) => parse_text::<NaiveTime>(s),
            other => Err(mismatch::<NaiveTime>(&other)),
        }
    }
}

impl ColumnValue for NaiveDateTime {
    fn db_type() -> DbType {
        DbType::Timestamp
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::Timestamp(*self))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(NaiveDateTime::default()),
            DbValue::Timestamp(t) => Ok(t),
            DbValue::TimestampTz(t) => Ok(t.naive_utc()),
            DbValue::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
            DbValue::Text(ref s) => parse_text::<NaiveDateTime>(s),
            other => Err(mismatch::<NaiveDateTime>(&other)),
        }
    }
}

impl ColumnValue for DateTime<Utc> {
    fn db_type() -> DbType {
        DbType::TimestampTz
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::TimestampTz(*self))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(DateTime::<Utc>::default()),
            DbValue::TimestampTz(t) => Ok(t),
            DbValue::Timestamp(t) => Ok(t.and_utc()),
            DbValue::Date(d) => Ok(d.and_time(NaiveTime::MIN).and_utc()),
            DbValue::Text(ref s) => parse_text::<DateTime<Utc>>(s),
            other => Err(mismatch::<DateTime<Utc>>(&other)),
        }
    }
}

impl ColumnValue for Uuid {
    fn db_type() -> DbType {
        DbType::Uuid
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::Uuid(*self))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(Uuid::nil()),
            DbValue::Uuid(u) => Ok(u),
            DbValue::Text(ref s) => parse_text::<Uuid>(s),
            DbValue::Bytes(ref b) => {
                Uuid::from_slice(b).map_err(|e| MapError::conversion("", e.to_string()))
            }
            other => Err(mismatch::<Uuid>(&other)),
        }
    }
}

impl ColumnValue for serde_json::Value {
    fn db_type() -> DbType {
        DbType::Json
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        Ok(DbValue::Json(self.clone()))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(serde_json::Value::Null),
            DbValue::Json(j) => Ok(j),
            DbValue::Text(ref s) => serde_json::from_str(s)
                .map_err(|e| parse_failed::<serde_json::Value>(s, e)),
            other => Err(mismatch::<serde_json::Value>(&other)),
        }
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    fn value_type() -> TypeKey {
        T::value_type()
    }

    fn db_type() -> DbType {
        T::db_type()
    }

    fn is_nullable() -> bool {
        true
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        match self {
            Some(v) => v.to_db_value(),
            None => Ok(DbValue::Null),
        }
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        match value {
            DbValue::Null => Ok(None),
            other => T::from_db_value(other).map(Some),
        }
    }
}

/// Wrapper storing any serde type as a JSON column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Json<T>(pub T);

impl<T> ColumnValue for Json<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned + 'static,
{
    fn db_type() -> DbType {
        DbType::Json
    }

    fn to_db_value(&self) -> MapResult<DbValue> {
        serde_json::to_value(&self.0)
            .map(DbValue::Json)
            .map_err(|e| MapError::conversion("", e.to_string()))
    }

    fn from_db_value(value: DbValue) -> MapResult<Self> {
        let json = match value {
            DbValue::Null => serde_json::Value::Null,
            DbValue::Json(j) => j,
            DbValue::Text(ref s) => {
                serde_json::from_str(s).map_err(|e| parse_failed::<T>(s, e))?
            }
            other => return Err(mismatch::<T>(&other)),
        };
        serde_json::from_value(json)
            .map(Json)
            .map_err(|e| MapError::conversion("", e.to_string()))
    }
}

macro_rules! impl_from_for_db_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for DbValue {
                fn from(v: $ty) -> Self {
                    DbValue::$variant(v)
                }
            }
        )*
    };
}

impl_from_for_db_value!(
    bool => Bool,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    String => Text,
    Vec<u8> => Bytes,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    Uuid => Uuid,
    serde_json::Value => Json,
);

impl From<&str> for DbValue {
    fn from(v: &str) -> Self {
        DbValue::Text(v.to_string())
    }
}

impl<T: Into<DbValue>> From<Option<T>> for DbValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(DbValue::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_widen_and_narrow_checked() {
        assert_eq!(i64::from_db_value(DbValue::I32(7)).unwrap(), 7);
        assert_eq!(i32::from_db_value(DbValue::I64(33)).unwrap(), 33);
        let err = i16::from_db_value(DbValue::I64(i64::from(i16::MAX) + 1)).unwrap_err();
        assert!(err.is_conversion());
    }

    #[test]
    fn null_reads_as_default_or_none() {
        assert_eq!(i32::from_db_value(DbValue::Null).unwrap(), 0);
        assert_eq!(String::from_db_value(DbValue::Null).unwrap(), "");
        assert_eq!(Option::<Decimal>::from_db_value(DbValue::Null).unwrap(), None);
    }

    #[test]
    fn none_writes_null() {
        let v: Option<i32> = None;
        assert_eq!(v.to_db_value().unwrap(), DbValue::Null);
        assert_eq!(Some(5i32).to_db_value().unwrap(), DbValue::I32(5));
    }

    #[test]
    fn option_reports_inner_type_key() {
        assert_eq!(<Option<bool>>::value_type(), TypeKey::of::<bool>());
        assert_eq!(<Option<bool>>::db_type(), DbType::Boolean);
        assert!(<Option<bool>>::is_nullable());
        assert!(!bool::is_nullable());
    }

    #[test]
    fn text_coercions() {
        assert_eq!(
            NaiveDate::from_db_value(DbValue::Text("1977-01-22".into())).unwrap(),
            NaiveDate::from_ymd_opt(1977, 1, 22).unwrap()
        );
        assert!(bool::from_db_value(DbValue::Text("Y".into())).unwrap());
        assert_eq!(
            Decimal::from_db_value(DbValue::Text("100.35".into())).unwrap(),
            Decimal::new(10035, 2)
        );
        assert!(i32::from_db_value(DbValue::Text("abc".into())).is_err());
    }

    #[test]
    fn integral_decimal_reads_into_integer() {
        assert_eq!(i32::from_db_value(DbValue::Decimal(Decimal::new(55, 0))).unwrap(), 55);
        assert!(i32::from_db_value(DbValue::Decimal(Decimal::new(555, 1))).is_err());
    }

    #[test]
    fn date_into_timestamp() {
        let d = NaiveDate::from_ymd_opt(1979, 10, 19).unwrap();
        let ts = NaiveDateTime::from_db_value(DbValue::Date(d)).unwrap();
        assert_eq!(ts.date(), d);
    }

    #[test]
    fn json_wrapper_accepts_text() {
        let v: Json<Vec<i32>> = Json::from_db_value(DbValue::Text("[1,2,3]".into())).unwrap();
        assert_eq!(v.0, vec![1, 2, 3]);
        assert_eq!(
            Json(vec![1]).to_db_value().unwrap(),
            DbValue::Json(serde_json::json!([1]))
        );
    }

    #[test]
    fn db_value_from_option() {
        assert_eq!(DbValue::from(None::<i32>), DbValue::Null);
        assert_eq!(DbValue::from(Some("x")), DbValue::Text("x".into()));
    }
}
