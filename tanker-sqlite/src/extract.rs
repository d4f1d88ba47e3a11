use libsqlite3_sys::{
    SQLITE_BLOB, SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_NULL, SQLITE_TEXT, sqlite3_column_blob,
    sqlite3_column_bytes, sqlite3_column_count, sqlite3_column_decltype, sqlite3_column_double,
    sqlite3_column_int64, sqlite3_column_name, sqlite3_column_text, sqlite3_column_type,
    sqlite3_stmt,
};
use std::ffi::{CStr, c_int};
use tanker_core::{Error, Parse, Result, RowNames, Value};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

pub(crate) fn extract_labels(statement: *mut sqlite3_stmt) -> Result<RowNames> {
    unsafe {
        (0..sqlite3_column_count(statement))
            .map(|i| {
                Ok(CStr::from_ptr(sqlite3_column_name(statement, i))
                    .to_str()
                    .map_err(Error::driver)?
                    .to_string())
            })
            .collect()
    }
}

fn declared_type(statement: *mut sqlite3_stmt, index: c_int) -> Option<String> {
    unsafe {
        let decltype = sqlite3_column_decltype(statement, index);
        if decltype.is_null() {
            return None;
        }
        CStr::from_ptr(decltype)
            .to_str()
            .ok()
            .map(|s| s.to_ascii_uppercase())
    }
}

fn text_at(statement: *mut sqlite3_stmt, index: c_int) -> Result<String> {
    unsafe {
        let ptr = sqlite3_column_text(statement, index);
        let len = sqlite3_column_bytes(statement, index) as usize;
        let bytes = std::slice::from_raw_parts(ptr, len);
        String::from_utf8(bytes.to_vec()).map_err(Error::driver)
    }
}

fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(v) => Value::Boolean(Some(*v)),
        serde_json::Value::Number(v) if v.is_i64() => Value::Int64(v.as_i64()),
        serde_json::Value::Number(v) => Value::Float64(v.as_f64()),
        serde_json::Value::String(v) => Value::Varchar(Some(v.clone())),
        serde_json::Value::Array(items) => {
            Value::List(Some(items.iter().map(json_to_value).collect()))
        }
        serde_json::Value::Object(..) => Value::Varchar(Some(json.to_string())),
    }
}

/// Decode one column, steering by the declared column type so dates,
/// booleans and JSON-encoded arrays come back as what the schema says.
pub(crate) fn extract_value(statement: *mut sqlite3_stmt, index: c_int) -> Result<Value> {
    unsafe {
        let storage = sqlite3_column_type(statement, index);
        let declared = declared_type(statement, index);
        Ok(match storage {
            SQLITE_NULL => Value::Null,
            SQLITE_INTEGER => {
                let raw = sqlite3_column_int64(statement, index);
                match declared.as_deref() {
                    Some("BOOL") => Value::Boolean(Some(raw != 0)),
                    Some("INTEGER") => Value::Int32(Some(raw as i32)),
                    _ => Value::Int64(Some(raw)),
                }
            }
            SQLITE_FLOAT => Value::Float64(Some(sqlite3_column_double(statement, index))),
            SQLITE_BLOB => {
                let ptr = sqlite3_column_blob(statement, index) as *const u8;
                let len = sqlite3_column_bytes(statement, index) as usize;
                Value::Blob(Some(std::slice::from_raw_parts(ptr, len).into()))
            }
            SQLITE_TEXT => {
                let text = text_at(statement, index)?;
                match declared.as_deref() {
                    Some("DATE") => Value::Date(Some(<Date as Parse>::parse(&text)?)),
                    Some("TIMESTAMP") => {
                        Value::Timestamp(Some(<PrimitiveDateTime as Parse>::parse(&text)?))
                    }
                    Some("TIMESTAMPTZ") => Value::TimestampWithTimezone(Some(
                        <OffsetDateTime as Parse>::parse(&text)?,
                    )),
                    Some(decl) if decl.ends_with("[]") => {
                        let json: serde_json::Value =
                            serde_json::from_str(&text).map_err(Error::driver)?;
                        json_to_value(&json)
                    }
                    _ => Value::Varchar(Some(text)),
                }
            }
            other => {
                return Err(Error::driver_msg(format!(
                    "unexpected sqlite column storage class {}",
                    other
                )));
            }
        })
    }
}
