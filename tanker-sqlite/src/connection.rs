use crate::{
    CBox, SqliteDriver,
    bind::bind_value,
    extract::{extract_labels, extract_value},
};
use async_stream::try_stream;
use futures::Stream;
use libsqlite3_sys::{
    SQLITE_BUSY, SQLITE_CONSTRAINT, SQLITE_DONE, SQLITE_OK, SQLITE_OPEN_CREATE,
    SQLITE_OPEN_READWRITE, SQLITE_OPEN_URI, SQLITE_ROW, sqlite3, sqlite3_changes,
    sqlite3_close, sqlite3_column_count, sqlite3_errmsg, sqlite3_finalize, sqlite3_open_v2,
    sqlite3_prepare_v2, sqlite3_step, sqlite3_stmt,
};
use std::{
    ffi::{CStr, CString, c_char, c_int},
    ptr,
};
use tanker_core::{
    Connection, Driver, Error, Executor, Query, QueryResult, Result, RowLabeled, RowsAffected,
};

pub struct SqliteConnection {
    pub(crate) connection: CBox<*mut sqlite3>,
}

pub(crate) fn error_message(db: *mut sqlite3) -> String {
    unsafe {
        let message = sqlite3_errmsg(db);
        if message.is_null() {
            "unknown sqlite error".to_string()
        } else {
            CStr::from_ptr(message).to_string_lossy().into_owned()
        }
    }
}

/// Classify a non-OK return code, recognising constraint violations.
pub(crate) fn classify(db: *mut sqlite3, code: c_int) -> Error {
    let message = error_message(db);
    if code & 0xff == SQLITE_CONSTRAINT {
        Error::constraint(None, None, message)
    } else {
        Error::driver_msg(message)
    }
}

impl SqliteConnection {
    fn prepare(&self, sql: &str) -> Result<CBox<*mut sqlite3_stmt>> {
        unsafe {
            let db = *self.connection;
            let sql_c = CString::new(sql).map_err(Error::driver)?;
            let mut statement: *mut sqlite3_stmt = ptr::null_mut();
            let mut tail: *const c_char = ptr::null();
            let rc = sqlite3_prepare_v2(
                db,
                sql_c.as_ptr(),
                sql_c.as_bytes().len() as c_int + 1,
                &mut statement,
                &mut tail,
            );
            if rc != SQLITE_OK {
                return Err(classify(db, rc));
            }
            if !tail.is_null() && !CStr::from_ptr(tail).to_bytes().iter().all(|b| b.is_ascii_whitespace())
            {
                sqlite3_finalize(statement);
                return Err(Error::driver_msg(
                    "cannot run more than one statement at a time",
                ));
            }
            Ok(CBox::new(statement, |p| {
                unsafe { sqlite3_finalize(p) };
            }))
        }
    }
}

impl Executor for SqliteConnection {
    type Driver = SqliteDriver;

    fn driver(&self) -> &Self::Driver {
        &SqliteDriver {}
    }

    fn run(&mut self, query: Query) -> impl Stream<Item = Result<QueryResult>> + Send {
        let db = CBox::new(*self.connection, |_| {});
        let statement = self.prepare(&query.sql);
        try_stream! {
            let statement = statement?;
            unsafe {
                for (i, value) in query.params.iter().enumerate() {
                    bind_value(*db, *statement, i as c_int + 1, value)?;
                }
                let columns = sqlite3_column_count(*statement);
                let labels = if columns > 0 {
                    Some(extract_labels(*statement)?)
                } else {
                    None
                };
                loop {
                    match sqlite3_step(*statement) {
                        SQLITE_BUSY => continue,
                        SQLITE_DONE => {
                            if labels.is_none() {
                                yield QueryResult::Affected(RowsAffected {
                                    rows_affected: sqlite3_changes(*db).max(0) as u64,
                                });
                            }
                            break;
                        }
                        SQLITE_ROW => {
                            let labels = labels.clone().expect("row without columns");
                            let values = (0..columns)
                                .map(|i| extract_value(*statement, i))
                                .collect::<Result<_>>()?;
                            yield QueryResult::Row(RowLabeled::new(labels, values));
                        }
                        code => {
                            let error = classify(*db, code);
                            log::error!("{}", error);
                            Err(error)?;
                        }
                    }
                }
            }
        }
    }
}

impl Connection for SqliteConnection {
    async fn connect(url: &str) -> Result<SqliteConnection> {
        let prefix = format!("{}://", <SqliteDriver as Driver>::NAME);
        let Some(path) = url.strip_prefix(&prefix) else {
            return Err(Error::driver_msg(format!(
                "expected sqlite connection url to start with `{}`",
                prefix
            )));
        };
        let path_c = CString::new(path).map_err(Error::driver)?;
        let mut connection = {
            let mut db: *mut sqlite3 = ptr::null_mut();
            let rc = unsafe {
                sqlite3_open_v2(
                    path_c.as_ptr(),
                    &mut db,
                    SQLITE_OPEN_READWRITE | SQLITE_OPEN_CREATE | SQLITE_OPEN_URI,
                    ptr::null(),
                )
            };
            if rc != SQLITE_OK {
                let error = if db.is_null() {
                    Error::driver_msg(format!("cannot open sqlite database `{}`", path))
                } else {
                    let error = classify(db, rc);
                    unsafe { sqlite3_close(db) };
                    error
                };
                log::error!("{}", error);
                return Err(error);
            }
            SqliteConnection {
                connection: CBox::new(db, |p| {
                    unsafe { sqlite3_close(p) };
                }),
            }
        };
        connection
            .execute(Query::new("PRAGMA foreign_keys = ON"))
            .await?;
        Ok(connection)
    }

    async fn close(self) -> Result<()> {
        drop(self);
        Ok(())
    }
}
