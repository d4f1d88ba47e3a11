use crate::driver::Driver;
use crate::writer::SqlWriter;
use crate::{Executor, Query, Result, RowLabeled, TableDecl, Value};
use futures::TryStreamExt;
use std::collections::HashMap;

fn string_at(row: &RowLabeled, index: usize) -> String {
    match row.values.get(index) {
        Some(Value::Varchar(Some(v))) => v.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

/// Map a catalog type name back to a declaration type-spec; unknown types
/// are skipped entirely.
fn type_spec(catalog_type: &str) -> Option<&'static str> {
    match catalog_type.to_ascii_uppercase().as_str() {
        "CHARACTER VARYING" | "TEXT" | "VARCHAR" => Some("varchar"),
        "INTEGER" | "INT" | "SMALLINT" => Some("integer"),
        "BIGINT" => Some("bigint"),
        "DOUBLE PRECISION" | "REAL" | "NUMERIC" | "FLOAT" => Some("float"),
        "BOOLEAN" | "BOOL" => Some("bool"),
        "DATE" => Some("date"),
        "TIMESTAMP" | "TIMESTAMP WITHOUT TIME ZONE" => Some("timestamp"),
        "TIMESTAMP WITH TIME ZONE" | "TIMESTAMPTZ" => Some("timestamptz"),
        "BYTEA" | "BLOB" => Some("bytea"),
        _ => None,
    }
}

/// Fabricate schema declarations from the live catalog: columns mapped
/// back from their reported types, `m2o` edges from foreign-key metadata,
/// the natural key from the first unique index (falling back to `id`).
pub async fn introspect_schema<E: Executor>(
    executor: &mut E,
    namespace: Option<&str>,
) -> Result<Vec<TableDecl>> {
    let writer = executor.driver().sql_writer();
    let table_rows: Vec<_> = executor
        .fetch(Query::new(writer.tables_query(namespace)))
        .try_collect()
        .await?;
    let mut tables: Vec<String> = table_rows.iter().map(|row| string_at(row, 0)).collect();
    tables.sort_unstable();

    let mut decls = Vec::with_capacity(tables.len());
    for table in &tables {
        let column_rows: Vec<_> = executor
            .fetch(Query::new(writer.columns_query(table, namespace)))
            .try_collect()
            .await?;
        let fk_rows: Vec<_> = executor
            .fetch(Query::new(writer.foreign_keys_query(table)))
            .try_collect()
            .await?;
        let foreign_keys: HashMap<String, (String, String)> = fk_rows
            .iter()
            .map(|row| {
                (
                    string_at(row, 0),
                    (string_at(row, 1), string_at(row, 2)),
                )
            })
            .collect();
        let unique_rows: Vec<_> = executor
            .fetch(Query::new(writer.unique_indexes_query(table)))
            .try_collect()
            .await?;
        // Keep the columns of the first unique index only.
        let mut key: Vec<String> = Vec::new();
        let mut key_index: Option<String> = None;
        for row in &unique_rows {
            let index = string_at(row, 0);
            match &key_index {
                None => key_index = Some(index),
                Some(first) if *first != index => continue,
                Some(..) => {}
            }
            key.push(string_at(row, 1));
        }
        if key.is_empty() {
            key.push("id".to_string());
        }

        let mut decl = TableDecl::new(table.clone());
        for row in &column_rows {
            let name = string_at(row, 0);
            if name == "id" {
                continue;
            }
            let spec = match foreign_keys.get(&name) {
                Some((remote_table, remote_column)) => {
                    format!("m2o {}.{}", remote_table, remote_column)
                }
                None => match type_spec(&string_at(row, 1)) {
                    Some(spec) => spec.to_string(),
                    None => continue,
                },
            };
            decl.columns.push((name, spec));
        }
        decl.key = Some(key);
        decls.push(decl);
    }
    Ok(decls)
}
