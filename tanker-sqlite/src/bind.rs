use crate::connection::classify;
use libsqlite3_sys::{
    SQLITE_OK, SQLITE_TRANSIENT, sqlite3, sqlite3_bind_blob, sqlite3_bind_double,
    sqlite3_bind_int, sqlite3_bind_int64, sqlite3_bind_null, sqlite3_bind_text, sqlite3_stmt,
};
use std::ffi::{c_char, c_int, c_void};
use tanker_core::{Result, Value, format_date, format_timestamp, format_timestamptz};

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Boolean(Some(v)) => serde_json::Value::Bool(*v),
        Value::Int32(Some(v)) => serde_json::Value::from(*v),
        Value::Int64(Some(v)) => serde_json::Value::from(*v),
        Value::Float64(Some(v)) => serde_json::Value::from(*v),
        Value::Varchar(Some(v)) => serde_json::Value::String(v.clone()),
        Value::List(Some(items)) => {
            serde_json::Value::Array(items.iter().map(json_value).collect())
        }
        other if other.is_null() => serde_json::Value::Null,
        other => serde_json::Value::String(other.to_string()),
    }
}

fn bind_text(
    statement: *mut sqlite3_stmt,
    index: c_int,
    text: &str,
) -> c_int {
    unsafe {
        sqlite3_bind_text(
            statement,
            index,
            text.as_ptr() as *const c_char,
            text.len() as c_int,
            SQLITE_TRANSIENT(),
        )
    }
}

/// Bind one parameter by 1-based index. Temporal values bind as their
/// textual form, arrays as JSON text.
pub(crate) fn bind_value(
    db: *mut sqlite3,
    statement: *mut sqlite3_stmt,
    index: c_int,
    value: &Value,
) -> Result<()> {
    let rc = unsafe {
        match value {
            v if v.is_null() => sqlite3_bind_null(statement, index),
            Value::Boolean(Some(v)) => sqlite3_bind_int(statement, index, *v as c_int),
            Value::Int32(Some(v)) => sqlite3_bind_int(statement, index, *v),
            Value::Int64(Some(v)) => sqlite3_bind_int64(statement, index, *v),
            Value::Float64(Some(v)) => sqlite3_bind_double(statement, index, *v),
            Value::Varchar(Some(v)) => bind_text(statement, index, v),
            Value::Blob(Some(v)) => sqlite3_bind_blob(
                statement,
                index,
                v.as_ptr() as *const c_void,
                v.len() as c_int,
                SQLITE_TRANSIENT(),
            ),
            Value::Date(Some(v)) => bind_text(statement, index, &format_date(v)),
            Value::Timestamp(Some(v)) => bind_text(statement, index, &format_timestamp(v)),
            Value::TimestampWithTimezone(Some(v)) => {
                bind_text(statement, index, &format_timestamptz(v))
            }
            Value::List(Some(..)) => {
                let json = json_value(value).to_string();
                bind_text(statement, index, &json)
            }
            _ => unreachable!("null variants handled above"),
        }
    };
    if rc != SQLITE_OK {
        let error = classify(db, rc);
        log::error!("{}", error);
        return Err(error);
    }
    Ok(())
}
