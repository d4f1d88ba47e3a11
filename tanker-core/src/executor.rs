use crate::{
    ColumnType, Driver, Query, QueryResult, Result, Row, RowLabeled, RowsAffected, SqlWriter,
};
use futures::{Stream, StreamExt, TryStreamExt};

/// Anything that can run queries: a connection, or a connection borrowed
/// through an open scope.
pub trait Executor: Send {
    type Driver: Driver;

    fn driver(&self) -> &Self::Driver;

    /// Send one statement and stream back whatever the database returns,
    /// rows or an affected-row count.
    fn run(&mut self, query: Query) -> impl Stream<Item = Result<QueryResult>> + Send;

    /// Run the query and keep only the rows.
    fn fetch(&mut self, query: Query) -> impl Stream<Item = Result<RowLabeled>> + Send {
        self.run(query).filter_map(|item| async move {
            match item {
                Ok(QueryResult::Row(row)) => Some(Ok(row)),
                Ok(QueryResult::Affected(..)) => None,
                Err(e) => Some(Err(e)),
            }
        })
    }

    /// Run the query and return the total number of affected rows.
    fn execute(&mut self, query: Query) -> impl Future<Output = Result<RowsAffected>> + Send {
        self.run(query)
            .filter_map(|item| async move {
                match item {
                    Ok(QueryResult::Affected(affected)) => Some(Ok(affected)),
                    Ok(QueryResult::Row(..)) => None,
                    Err(e) => Some(Err(e)),
                }
            })
            .try_fold(RowsAffected::default(), |mut acc, item| async move {
                acc.rows_affected += item.rows_affected;
                Ok(acc)
            })
    }

    /// Load many rows into a table in one batch. The default issues
    /// multi-row parameterised INSERTs; drivers with a faster path
    /// (Postgres COPY) override it.
    fn bulk_load(
        &mut self,
        table: &str,
        columns: &[String],
        types: &[ColumnType],
        rows: Vec<Row>,
    ) -> impl Future<Output = Result<u64>> + Send {
        async move {
            let _ = types;
            let writer = self.driver().sql_writer();
            let mut total = 0;
            // Keep each statement under a conservative parameter budget.
            let batch_rows = (900 / columns.len().max(1)).max(1);
            for chunk in rows.chunks(batch_rows) {
                let mut sql = String::new();
                sql.push_str("INSERT INTO ");
                writer.write_identifier(&mut sql, table);
                sql.push_str(" (");
                for (i, column) in columns.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(", ");
                    }
                    writer.write_identifier(&mut sql, column);
                }
                sql.push_str(") VALUES ");
                let mut params = Vec::with_capacity(chunk.len() * columns.len());
                for (r, row) in chunk.iter().enumerate() {
                    if r > 0 {
                        sql.push_str(", ");
                    }
                    sql.push('(');
                    for (i, value) in row.iter().enumerate() {
                        if i > 0 {
                            sql.push_str(", ");
                        }
                        params.push(value.clone());
                        writer.write_placeholder(&mut sql, params.len());
                    }
                    sql.push(')');
                }
                let affected = self.execute(Query::with_params(sql, params)).await?;
                total += affected.rows_affected;
            }
            Ok(total)
        }
    }
}
