use crate::{Error, Result};
use std::{collections::HashMap, fmt, sync::Arc};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

/// A database value, typed and nullable.
///
/// Each variant carries an `Option` so a typed `NULL` keeps the column type
/// it belongs to (needed when binding parameters and when staging rows).
#[derive(Default, Debug, Clone, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    Float64(Option<f64>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
    Date(Option<Date>),
    Timestamp(Option<PrimitiveDateTime>),
    TimestampWithTimezone(Option<OffsetDateTime>),
    List(Option<Vec<Value>>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        match self {
            Value::Null
            | Value::Boolean(None)
            | Value::Int32(None)
            | Value::Int64(None)
            | Value::Float64(None)
            | Value::Varchar(None)
            | Value::Blob(None)
            | Value::Date(None)
            | Value::Timestamp(None)
            | Value::TimestampWithTimezone(None)
            | Value::List(None) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(Some(v)) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(Some(v)) => Some(*v as i64),
            Value::Int64(Some(v)) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            _ if self.is_null() => write!(f, "null"),
            Value::Boolean(Some(v)) => write!(f, "{}", v),
            Value::Int32(Some(v)) => write!(f, "{}", v),
            Value::Int64(Some(v)) => write!(f, "{}", v),
            Value::Float64(Some(v)) => write!(f, "{}", v),
            Value::Varchar(Some(v)) => write!(f, "{}", v),
            Value::Blob(Some(v)) => write!(f, "<{} bytes>", v.len()),
            Value::Date(Some(v)) => write!(f, "{}", v),
            Value::Timestamp(Some(v)) => write!(f, "{}", v),
            Value::TimestampWithTimezone(Some(v)) => write!(f, "{}", v),
            Value::List(Some(v)) => {
                write!(f, "[")?;
                for (i, item) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            _ => unreachable!(),
        }
    }
}

/// Conversion of plain Rust values into [`Value`].
pub trait AsValue {
    fn as_value(self) -> Value;
}

macro_rules! impl_as_value {
    ($($source:ty => $variant:ident,)+) => {
        $(impl AsValue for $source {
            fn as_value(self) -> Value {
                Value::$variant(Some(self))
            }
        }
        impl AsValue for Option<$source> {
            fn as_value(self) -> Value {
                match self {
                    Some(v) => v.as_value(),
                    None => Value::$variant(None),
                }
            }
        }
        impl From<$source> for Value {
            fn from(value: $source) -> Value {
                value.as_value()
            }
        }
        impl From<Option<$source>> for Value {
            fn from(value: Option<$source>) -> Value {
                value.as_value()
            }
        })+
    };
}

impl_as_value! {
    bool => Boolean,
    i32 => Int32,
    i64 => Int64,
    f64 => Float64,
    String => Varchar,
    Date => Date,
    PrimitiveDateTime => Timestamp,
    OffsetDateTime => TimestampWithTimezone,
}

impl AsValue for &str {
    fn as_value(self) -> Value {
        Value::Varchar(Some(self.to_string()))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Value {
        value.as_value()
    }
}

impl AsValue for Vec<u8> {
    fn as_value(self) -> Value {
        Value::Blob(Some(self.into()))
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Value {
        value.as_value()
    }
}

impl AsValue for Value {
    fn as_value(self) -> Value {
        self
    }
}

/// An argument bound to a `{…}` placeholder.
///
/// Scalars bind as one parameter, lists expand to one parameter per item,
/// maps are traversed by the dotted attribute chain of the placeholder.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Scalar(Value),
    List(Vec<ArgValue>),
    Map(HashMap<String, ArgValue>),
}

impl ArgValue {
    /// Follow one step of a placeholder attribute chain.
    pub fn attr(&self, name: &str) -> Result<&ArgValue> {
        match self {
            ArgValue::Map(entries) => entries
                .get(name)
                .ok_or_else(|| Error::arg(format!("no attribute `{}` in argument", name))),
            _ => Err(Error::arg(format!(
                "cannot look up attribute `{}` in a non-map argument",
                name
            ))),
        }
    }
}

impl<T: AsValue> From<T> for ArgValue {
    fn from(value: T) -> Self {
        ArgValue::Scalar(value.as_value())
    }
}

impl From<Vec<ArgValue>> for ArgValue {
    fn from(values: Vec<ArgValue>) -> Self {
        ArgValue::List(values)
    }
}

impl From<HashMap<String, ArgValue>> for ArgValue {
    fn from(entries: HashMap<String, ArgValue>) -> Self {
        ArgValue::Map(entries)
    }
}

/// Placeholder bindings for one read/write call: positional values consumed
/// by `{}`/`{0}` and named values consumed by `{name}`.
#[derive(Debug, Clone, Default)]
pub struct Args {
    pub positional: Vec<ArgValue>,
    pub named: HashMap<String, ArgValue>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, value: impl Into<ArgValue>) -> &mut Self {
        self.positional.push(value.into());
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<ArgValue>) -> &mut Self {
        self.named.insert(name.into(), value.into());
        self
    }
}

pub type RowNames = Arc<[String]>;
pub type Row = Box<[Value]>;

#[derive(Debug)]
pub struct RowLabeled {
    pub labels: RowNames,
    pub values: Row,
}

impl RowLabeled {
    pub fn new(labels: RowNames, values: Row) -> Self {
        Self { labels, values }
    }
}
