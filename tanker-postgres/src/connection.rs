use crate::{PostgresDriver, value_wrap::ValueWrap};
use async_stream::try_stream;
use bytes::Bytes;
use futures::{SinkExt, Stream, StreamExt, pin_mut};
use std::pin::pin;
use tanker_core::{
    ColumnType, Connection, Driver, Error, Executor, Query, QueryResult, Result, Row,
    RowLabeled, RowNames, RowsAffected, Value, format_date, format_timestamp,
    format_timestamptz,
};
use tokio::{spawn, task::JoinHandle};
use tokio_postgres::{NoTls, error::SqlState, types::ToSql};

fn slice_iter<'a>(
    params: &'a [ValueWrap],
) -> impl ExactSizeIterator<Item = &'a (dyn ToSql + Sync)> + 'a {
    params.iter().map(|p| p as _)
}

pub struct PostgresConnection {
    pub(crate) client: tokio_postgres::Client,
    handle: JoinHandle<()>,
}

/// Wrap a driver error, recognising constraint violations and carrying
/// over the table and column the server reports.
pub(crate) fn classify(error: tokio_postgres::Error) -> Error {
    if let Some(db_error) = error.as_db_error() {
        let constraint = matches!(
            *db_error.code(),
            SqlState::NOT_NULL_VIOLATION
                | SqlState::FOREIGN_KEY_VIOLATION
                | SqlState::UNIQUE_VIOLATION
                | SqlState::CHECK_VIOLATION
        );
        if constraint {
            return Error::constraint(
                db_error.table().map(str::to_string),
                db_error.column().map(str::to_string),
                db_error.message().to_string(),
            );
        }
    }
    Error::driver(error)
}

impl Executor for PostgresConnection {
    type Driver = PostgresDriver;

    fn driver(&self) -> &Self::Driver {
        &PostgresDriver {}
    }

    fn run(&mut self, query: Query) -> impl Stream<Item = Result<QueryResult>> + Send {
        try_stream! {
            let statement = self.client.prepare(&query.sql).await.map_err(classify)?;
            let params: Vec<ValueWrap> = query.params.into_iter().map(Into::into).collect();
            if statement.columns().is_empty() {
                let rows_affected = self
                    .client
                    .execute_raw(&statement, slice_iter(&params))
                    .await
                    .map_err(classify)?;
                yield QueryResult::Affected(RowsAffected { rows_affected });
            } else {
                let labels: RowNames = statement
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect();
                let rows = self
                    .client
                    .query_raw(&statement, slice_iter(&params))
                    .await
                    .map_err(classify)?;
                let mut rows = pin!(rows);
                while let Some(row) = rows.next().await.transpose().map_err(classify)? {
                    let values: Row = (0..row.len())
                        .map(|i| row.try_get::<_, ValueWrap>(i).map(|v| v.0).map_err(classify))
                        .collect::<Result<Row>>()?;
                    yield QueryResult::Row(RowLabeled::new(labels.clone(), values));
                }
            }
        }
    }

    /// Stage rows through `COPY … FROM STDIN (FORMAT csv)`.
    fn bulk_load(
        &mut self,
        table: &str,
        columns: &[String],
        types: &[ColumnType],
        rows: Vec<Row>,
    ) -> impl Future<Output = Result<u64>> + Send {
        let _ = types;
        let mut sql = String::from("COPY \"");
        sql.push_str(table);
        sql.push_str("\" (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('"');
            sql.push_str(column);
            sql.push('"');
        }
        sql.push_str(") FROM STDIN (FORMAT csv)");
        async move {
            let sink = self.client.copy_in(&sql).await.map_err(classify)?;
            pin_mut!(sink);
            let mut buffer = String::new();
            for row in &rows {
                for (i, value) in row.iter().enumerate() {
                    if i > 0 {
                        buffer.push(',');
                    }
                    csv_field(&mut buffer, value);
                }
                buffer.push('\n');
                if buffer.len() > 1 << 16 {
                    sink.send(Bytes::from(std::mem::take(&mut buffer)))
                        .await
                        .map_err(classify)?;
                }
            }
            if !buffer.is_empty() {
                sink.send(Bytes::from(buffer)).await.map_err(classify)?;
            }
            sink.finish().await.map_err(classify)
        }
    }
}

/// One CSV field: empty for NULL, quoted when the text needs it.
fn csv_field(out: &mut String, value: &Value) {
    if value.is_null() {
        return;
    }
    let text = match value {
        Value::Boolean(Some(v)) => if *v { "t" } else { "f" }.to_string(),
        Value::Int32(Some(v)) => v.to_string(),
        Value::Int64(Some(v)) => v.to_string(),
        Value::Float64(Some(v)) => v.to_string(),
        Value::Varchar(Some(v)) => v.clone(),
        Value::Blob(Some(v)) => {
            let mut text = String::from("\\x");
            for byte in v.iter() {
                text.push_str(&format!("{:02x}", byte));
            }
            text
        }
        Value::Date(Some(v)) => format_date(v),
        Value::Timestamp(Some(v)) => format_timestamp(v),
        Value::TimestampWithTimezone(Some(v)) => format_timestamptz(v),
        Value::List(Some(items)) => {
            // Postgres array literal; the CSV quoting wraps it below.
            let mut text = String::from("{");
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    text.push(',');
                }
                match item {
                    Value::Varchar(Some(v)) => {
                        text.push('"');
                        text.push_str(&v.replace('\\', "\\\\").replace('"', "\\\""));
                        text.push('"');
                    }
                    other if other.is_null() => text.push_str("NULL"),
                    other => text.push_str(&other.to_string()),
                }
            }
            text.push('}');
            text
        }
        _ => String::new(),
    };
    let must_quote = text.is_empty()
        || text.contains(',')
        || text.contains('"')
        || text.contains('\n')
        || text.contains('\r');
    if must_quote {
        out.push('"');
        out.push_str(&text.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(&text);
    }
}

impl Connection for PostgresConnection {
    async fn connect(url: &str) -> Result<PostgresConnection> {
        let prefix = format!("{}://", <PostgresDriver as Driver>::NAME);
        if !url.starts_with(&prefix) {
            return Err(Error::driver_msg(format!(
                "expected postgres connection url to start with `{}`",
                prefix
            )));
        }
        let (client, connection) = tokio_postgres::connect(url, NoTls)
            .await
            .map_err(classify)?;
        let handle = spawn(async move {
            if let Err(e) = connection.await {
                if !e.is_closed() {
                    log::error!("postgres connection error: {:#}", e);
                }
            }
        });
        Ok(PostgresConnection { client, handle })
    }

    async fn close(self) -> Result<()> {
        drop(self.client);
        self.handle.await.map_err(Error::driver)
    }
}
