use crate::{Error, Parse, Result, Value};
use std::fmt;
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// Scalar and relational column types.
///
/// `M2o` is stored as an integer foreign key; `O2m` is purely virtual and
/// only exists for the path resolver.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnType {
    Varchar,
    Integer,
    BigInt,
    Float,
    Bool,
    Date,
    Timestamp,
    TimestampTz,
    Bytea,
    Array(Box<ColumnType>),
    M2o { table: String, column: String },
    O2m { table: String, column: String },
}

impl ColumnType {
    /// Parse a declaration type-spec: a scalar name, `<scalar>[]`,
    /// `m2o <table>.<col>` or `o2m <table>.<col>`.
    pub fn parse(spec: &str) -> Result<ColumnType> {
        let spec = spec.trim();
        if let Some((kind, target)) = spec.split_once(char::is_whitespace) {
            let target = target.trim();
            let (table, column) = target.split_once('.').ok_or_else(|| {
                Error::schema(format!(
                    "malformed relation target `{}`, expected <table>.<column>",
                    target
                ))
            })?;
            let (table, column) = (table.to_string(), column.to_string());
            return match kind.to_ascii_lowercase().as_str() {
                "m2o" => Ok(ColumnType::M2o { table, column }),
                "o2m" => Ok(ColumnType::O2m { table, column }),
                other => Err(Error::schema(format!("unknown relation kind `{}`", other))),
            };
        }
        if let Some(inner) = spec.strip_suffix("[]") {
            let inner = ColumnType::parse(inner)?;
            if inner.is_relation() || matches!(inner, ColumnType::Array(..)) {
                return Err(Error::schema(format!(
                    "array type is not supported over `{}`",
                    inner
                )));
            }
            return Ok(ColumnType::Array(Box::new(inner)));
        }
        match spec.to_ascii_lowercase().as_str() {
            "varchar" => Ok(ColumnType::Varchar),
            "integer" => Ok(ColumnType::Integer),
            "bigint" => Ok(ColumnType::BigInt),
            "float" => Ok(ColumnType::Float),
            "bool" => Ok(ColumnType::Bool),
            "date" => Ok(ColumnType::Date),
            "timestamp" => Ok(ColumnType::Timestamp),
            "timestamptz" => Ok(ColumnType::TimestampTz),
            "bytea" => Ok(ColumnType::Bytea),
            other => Err(Error::schema(format!("unknown column type `{}`", other))),
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, ColumnType::M2o { .. } | ColumnType::O2m { .. })
    }

    pub fn is_virtual(&self) -> bool {
        matches!(self, ColumnType::O2m { .. })
    }

    /// The type of the value actually stored in the column.
    pub fn storage(&self) -> &ColumnType {
        match self {
            ColumnType::M2o { .. } => &ColumnType::Integer,
            other => other,
        }
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Varchar => write!(f, "varchar"),
            ColumnType::Integer => write!(f, "integer"),
            ColumnType::BigInt => write!(f, "bigint"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Bool => write!(f, "bool"),
            ColumnType::Date => write!(f, "date"),
            ColumnType::Timestamp => write!(f, "timestamp"),
            ColumnType::TimestampTz => write!(f, "timestamptz"),
            ColumnType::Bytea => write!(f, "bytea"),
            ColumnType::Array(inner) => write!(f, "{}[]", inner),
            ColumnType::M2o { table, column } => write!(f, "m2o {}.{}", table, column),
            ColumnType::O2m { table, column } => write!(f, "o2m {}.{}", table, column),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub ctype: ColumnType,
    pub not_null: bool,
    /// Raw SQL default expression from the declaration.
    pub default: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, ctype: ColumnType) -> Self {
        Self {
            name: name.into(),
            ctype,
            not_null: false,
            default: None,
        }
    }

    /// The relation target, for `m2o`/`o2m` columns.
    pub fn relation(&self) -> Option<(&str, &str)> {
        match &self.ctype {
            ColumnType::M2o { table, column } | ColumnType::O2m { table, column } => {
                Some((table, column))
            }
            _ => None,
        }
    }

    /// Coerce an input value to the column's storage type, parsing temporal
    /// strings and widening integers on the way.
    pub fn format_value(&self, value: Value) -> Result<Value> {
        coerce_value(value, self.ctype.storage(), &self.name)
    }
}

pub(crate) fn coerce_value(value: Value, ctype: &ColumnType, column: &str) -> Result<Value> {
    if value.is_null() {
        return Ok(typed_null(ctype));
    }
    let mismatch = |value: &Value| {
        Error::arg(format!(
            "unexpected value `{}` for column `{}` of type {}",
            value, column, ctype
        ))
    };
    Ok(match (ctype, value) {
        (ColumnType::Varchar, Value::Varchar(v)) => Value::Varchar(v),
        (ColumnType::Integer, Value::Int32(v)) => Value::Int32(v),
        (ColumnType::Integer, Value::Int64(Some(v))) => {
            Value::Int32(Some(i32::try_from(v).map_err(|_| {
                Error::arg(format!("value `{}` overflows integer column `{}`", v, column))
            })?))
        }
        (ColumnType::Integer, Value::Varchar(Some(v))) => Value::Int32(Some(
            v.trim().parse().map_err(|_| mismatch(&Value::Varchar(Some(v.clone()))))?,
        )),
        (ColumnType::BigInt, Value::Int32(Some(v))) => Value::Int64(Some(v as i64)),
        (ColumnType::BigInt, Value::Int64(v)) => Value::Int64(v),
        (ColumnType::BigInt, Value::Varchar(Some(v))) => Value::Int64(Some(
            v.trim().parse().map_err(|_| mismatch(&Value::Varchar(Some(v.clone()))))?,
        )),
        (ColumnType::Float, Value::Float64(v)) => Value::Float64(v),
        (ColumnType::Float, Value::Int32(Some(v))) => Value::Float64(Some(v as f64)),
        (ColumnType::Float, Value::Int64(Some(v))) => Value::Float64(Some(v as f64)),
        (ColumnType::Float, Value::Varchar(Some(v))) => Value::Float64(Some(
            v.trim().parse().map_err(|_| mismatch(&Value::Varchar(Some(v.clone()))))?,
        )),
        (ColumnType::Bool, Value::Boolean(v)) => Value::Boolean(v),
        (ColumnType::Bool, Value::Varchar(Some(v))) => match v.trim() {
            "true" | "t" | "1" => Value::Boolean(Some(true)),
            "false" | "f" | "0" => Value::Boolean(Some(false)),
            _ => return Err(mismatch(&Value::Varchar(Some(v)))),
        },
        (ColumnType::Date, Value::Date(v)) => Value::Date(v),
        (ColumnType::Date, Value::Varchar(Some(v))) => {
            Value::Date(Some(<Date as Parse>::parse(&v)?))
        }
        (ColumnType::Timestamp, Value::Timestamp(v)) => Value::Timestamp(v),
        (ColumnType::Timestamp, Value::Varchar(Some(v))) => {
            Value::Timestamp(Some(<PrimitiveDateTime as Parse>::parse(&v)?))
        }
        (ColumnType::TimestampTz, Value::TimestampWithTimezone(v)) => {
            Value::TimestampWithTimezone(v)
        }
        (ColumnType::TimestampTz, Value::Varchar(Some(v))) => {
            Value::TimestampWithTimezone(Some(<OffsetDateTime as Parse>::parse(&v)?))
        }
        (ColumnType::Bytea, Value::Blob(v)) => Value::Blob(v),
        (ColumnType::Array(inner), Value::List(Some(items))) => Value::List(Some(
            items
                .into_iter()
                .map(|item| coerce_value(item, inner, column))
                .collect::<Result<Vec<_>>>()?,
        )),
        (_, other) => return Err(mismatch(&other)),
    })
}

fn typed_null(ctype: &ColumnType) -> Value {
    match ctype {
        ColumnType::Varchar => Value::Varchar(None),
        ColumnType::Integer => Value::Int32(None),
        ColumnType::BigInt => Value::Int64(None),
        ColumnType::Float => Value::Float64(None),
        ColumnType::Bool => Value::Boolean(None),
        ColumnType::Date => Value::Date(None),
        ColumnType::Timestamp => Value::Timestamp(None),
        ColumnType::TimestampTz => Value::TimestampWithTimezone(None),
        ColumnType::Bytea => Value::Blob(None),
        ColumnType::Array(..) => Value::List(None),
        ColumnType::M2o { .. } | ColumnType::O2m { .. } => Value::Int32(None),
    }
}
