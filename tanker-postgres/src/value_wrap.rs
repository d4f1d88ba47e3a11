use postgres_types::{FromSql, IsNull, ToSql, Type, to_sql_checked};
use std::error::Error as StdError;
use tanker_core::{Parse, Value};
use time::{Date, OffsetDateTime, PrimitiveDateTime};
use tokio_postgres::types::private::BytesMut;

type BoxError = Box<dyn StdError + Sync + Send>;

/// Bridges [`Value`] and the postgres wire types in both directions.
#[derive(Debug)]
pub(crate) struct ValueWrap(pub(crate) Value);

impl From<Value> for ValueWrap {
    fn from(value: Value) -> Self {
        ValueWrap(value)
    }
}

impl<'a> FromSql<'a> for ValueWrap {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, BoxError> {
        let value = match *ty {
            Type::BOOL => Value::Boolean(Some(bool::from_sql(ty, raw)?)),
            Type::INT2 => Value::Int32(Some(i16::from_sql(ty, raw)? as i32)),
            Type::INT4 => Value::Int32(Some(i32::from_sql(ty, raw)?)),
            Type::INT8 => Value::Int64(Some(i64::from_sql(ty, raw)?)),
            Type::OID => Value::Int64(Some(u32::from_sql(ty, raw)? as i64)),
            Type::FLOAT4 => Value::Float64(Some(f32::from_sql(ty, raw)? as f64)),
            Type::FLOAT8 => Value::Float64(Some(f64::from_sql(ty, raw)?)),
            Type::VARCHAR | Type::TEXT | Type::NAME | Type::BPCHAR | Type::JSON | Type::XML => {
                Value::Varchar(Some(String::from_sql(ty, raw)?))
            }
            Type::BYTEA => Value::Blob(Some(Vec::<u8>::from_sql(ty, raw)?.into())),
            Type::DATE => Value::Date(Some(Date::from_sql(ty, raw)?)),
            Type::TIMESTAMP => Value::Timestamp(Some(PrimitiveDateTime::from_sql(ty, raw)?)),
            Type::TIMESTAMPTZ => {
                Value::TimestampWithTimezone(Some(OffsetDateTime::from_sql(ty, raw)?))
            }
            Type::BOOL_ARRAY => list(Vec::<bool>::from_sql(ty, raw)?, |v| {
                Value::Boolean(Some(v))
            }),
            Type::INT4_ARRAY => list(Vec::<i32>::from_sql(ty, raw)?, |v| Value::Int32(Some(v))),
            Type::INT8_ARRAY => list(Vec::<i64>::from_sql(ty, raw)?, |v| Value::Int64(Some(v))),
            Type::FLOAT8_ARRAY => list(Vec::<f64>::from_sql(ty, raw)?, |v| {
                Value::Float64(Some(v))
            }),
            Type::VARCHAR_ARRAY | Type::TEXT_ARRAY => {
                list(Vec::<String>::from_sql(ty, raw)?, |v| {
                    Value::Varchar(Some(v))
                })
            }
            _ => {
                return Err(tanker_core::Error::driver_msg(format!(
                    "unsupported postgres value type `{}`",
                    ty
                ))
                .into());
            }
        };
        Ok(ValueWrap(value))
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, BoxError> {
        Ok(ValueWrap(Value::Null))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn list<T>(values: Vec<T>, wrap: impl Fn(T) -> Value) -> Value {
    Value::List(Some(values.into_iter().map(wrap).collect()))
}

impl ToSql for ValueWrap {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if self.0.is_null() {
            return Ok(IsNull::Yes);
        }
        // Encode for the type the statement expects, widening or parsing
        // where the bound value allows it.
        match *ty {
            Type::BOOL => match &self.0 {
                Value::Boolean(Some(v)) => v.to_sql(ty, out),
                other => Err(mismatch(ty, other)),
            },
            Type::INT2 => match self.0.as_i64() {
                Some(v) => (v as i16).to_sql(ty, out),
                None => Err(mismatch(ty, &self.0)),
            },
            Type::INT4 => match self.0.as_i64() {
                Some(v) => (v as i32).to_sql(ty, out),
                None => Err(mismatch(ty, &self.0)),
            },
            Type::INT8 => match self.0.as_i64() {
                Some(v) => v.to_sql(ty, out),
                None => Err(mismatch(ty, &self.0)),
            },
            Type::FLOAT4 => match &self.0 {
                Value::Float64(Some(v)) => (*v as f32).to_sql(ty, out),
                other => match other.as_i64() {
                    Some(v) => (v as f32).to_sql(ty, out),
                    None => Err(mismatch(ty, other)),
                },
            },
            Type::FLOAT8 => match &self.0 {
                Value::Float64(Some(v)) => v.to_sql(ty, out),
                other => match other.as_i64() {
                    Some(v) => (v as f64).to_sql(ty, out),
                    None => Err(mismatch(ty, other)),
                },
            },
            Type::VARCHAR | Type::TEXT | Type::BPCHAR | Type::NAME | Type::UNKNOWN => {
                match &self.0 {
                    Value::Varchar(Some(v)) => v.to_sql(ty, out),
                    other => other.to_string().to_sql(ty, out),
                }
            }
            Type::BYTEA => match &self.0 {
                Value::Blob(Some(v)) => (&v[..]).to_sql(ty, out),
                other => Err(mismatch(ty, other)),
            },
            Type::DATE => match &self.0 {
                Value::Date(Some(v)) => v.to_sql(ty, out),
                Value::Varchar(Some(v)) => <Date as Parse>::parse(v)?.to_sql(ty, out),
                other => Err(mismatch(ty, other)),
            },
            Type::TIMESTAMP => match &self.0 {
                Value::Timestamp(Some(v)) => v.to_sql(ty, out),
                Value::Varchar(Some(v)) => {
                    <PrimitiveDateTime as Parse>::parse(v)?.to_sql(ty, out)
                }
                other => Err(mismatch(ty, other)),
            },
            Type::TIMESTAMPTZ => match &self.0 {
                Value::TimestampWithTimezone(Some(v)) => v.to_sql(ty, out),
                Value::Varchar(Some(v)) => {
                    <OffsetDateTime as Parse>::parse(v)?.to_sql(ty, out)
                }
                other => Err(mismatch(ty, other)),
            },
            Type::BOOL_ARRAY => encode_list(&self.0, ty, out, |v| match v {
                Value::Boolean(Some(b)) => Some(*b),
                _ => None,
            }),
            Type::INT4_ARRAY => encode_list(&self.0, ty, out, |v| {
                v.as_i64().map(|n| n as i32)
            }),
            Type::INT8_ARRAY => encode_list(&self.0, ty, out, Value::as_i64),
            Type::FLOAT8_ARRAY => encode_list(&self.0, ty, out, |v| match v {
                Value::Float64(Some(f)) => Some(*f),
                other => other.as_i64().map(|n| n as f64),
            }),
            Type::VARCHAR_ARRAY | Type::TEXT_ARRAY => encode_list(&self.0, ty, out, |v| {
                v.as_str().map(str::to_string)
            }),
            _ => Err(mismatch(ty, &self.0)),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn mismatch(ty: &Type, value: &Value) -> BoxError {
    tanker_core::Error::driver_msg(format!(
        "cannot bind value `{}` as postgres type `{}`",
        value, ty
    ))
    .into()
}

fn encode_list<T: ToSql>(
    value: &Value,
    ty: &Type,
    out: &mut BytesMut,
    element: impl Fn(&Value) -> Option<T>,
) -> Result<IsNull, BoxError> {
    let Value::List(Some(items)) = value else {
        return Err(mismatch(ty, value));
    };
    let converted = items
        .iter()
        .map(|item| element(item).ok_or_else(|| mismatch(ty, item)))
        .collect::<Result<Vec<T>, BoxError>>()?;
    converted.to_sql(ty, out)
}
