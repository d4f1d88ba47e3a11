use crate::driver::Driver;
use crate::{
    Column, ColumnType, Error, Executor, Query, Registry, Result, SqlWriter, Table, Value,
};
use futures::TryStreamExt;
use std::collections::{HashMap, HashSet};

/// What already exists in the live database, collected before deploying.
#[derive(Debug, Default)]
pub(crate) struct Catalog {
    pub tables: HashSet<String>,
    pub columns: HashMap<String, HashSet<String>>,
    pub indexes: HashSet<String>,
    pub constraints: HashSet<String>,
}

fn string_at(row: &crate::RowLabeled, index: usize) -> String {
    match row.values.get(index) {
        Some(Value::Varchar(Some(v))) => v.clone(),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

pub(crate) async fn read_catalog<E: Executor>(
    executor: &mut E,
    namespace: Option<&str>,
) -> Result<Catalog> {
    let writer = executor.driver().sql_writer();
    let mut catalog = Catalog::default();
    let rows: Vec<_> = executor
        .fetch(Query::new(writer.tables_query(namespace)))
        .try_collect()
        .await?;
    for row in &rows {
        catalog.tables.insert(string_at(row, 0));
    }
    for table in catalog.tables.clone() {
        let rows: Vec<_> = executor
            .fetch(Query::new(writer.columns_query(&table, namespace)))
            .try_collect()
            .await?;
        let columns = rows.iter().map(|row| string_at(row, 0)).collect();
        catalog.columns.insert(table, columns);
    }
    let rows: Vec<_> = executor
        .fetch(Query::new(writer.indexes_query(namespace)))
        .try_collect()
        .await?;
    for row in &rows {
        catalog.indexes.insert(string_at(row, 0));
    }
    if let Some(query) = writer.constraints_query() {
        let rows: Vec<_> = executor.fetch(Query::new(query)).try_collect().await?;
        for row in &rows {
            catalog.constraints.insert(string_at(row, 0));
        }
    }
    Ok(catalog)
}

fn column_definition(
    writer: &dyn SqlWriter,
    table: &Table,
    column: &Column,
    out: &mut String,
) {
    writer.write_identifier(out, &column.name);
    out.push(' ');
    match &column.ctype {
        ColumnType::M2o {
            table: target,
            column: remote,
        } => {
            out.push_str("INTEGER REFERENCES ");
            writer.write_identifier(out, target);
            out.push_str(" (");
            writer.write_identifier(out, remote);
            out.push_str(") ON DELETE CASCADE");
        }
        ctype => writer.write_column_type(out, ctype),
    }
    if let Some(default) = &column.default {
        out.push_str(" DEFAULT ");
        out.push_str(default);
    }
    if column.not_null || table.is_key(&column.name) {
        out.push_str(" NOT NULL");
    }
}

/// Deploy the registry: create missing tables with their scalar columns,
/// then add relation columns through ALTER TABLE (so cyclic references
/// work), then create the natural-key unique indexes. Idempotent against
/// whatever part of the schema already exists.
pub async fn create_tables<E: Executor>(
    executor: &mut E,
    registry: &Registry,
    namespace: Option<&str>,
) -> Result<()> {
    let writer = executor.driver().sql_writer();
    let mut catalog = read_catalog(executor, namespace).await?;

    // Tables with their surrogate id and scalar columns.
    for table in registry.tables() {
        if catalog.tables.contains(&table.name) {
            continue;
        }
        let mut sql = String::new();
        sql.push_str("CREATE TABLE ");
        writer.write_identifier(&mut sql, &table.name);
        sql.push_str(" (");
        writer.write_identifier(&mut sql, "id");
        sql.push(' ');
        writer.write_id_column(&mut sql);
        let mut created = HashSet::from(["id".to_string()]);
        for column in table.own_columns() {
            if column.ctype.is_relation() {
                continue;
            }
            sql.push_str(", ");
            column_definition(&writer, table, column, &mut sql);
            created.insert(column.name.clone());
        }
        sql.push(')');
        executor.execute(Query::new(sql)).await?;
        log::info!("table `{}` created", table.name);
        catalog.tables.insert(table.name.clone());
        catalog.columns.insert(table.name.clone(), created);
    }

    // Missing columns, relation columns included.
    for table in registry.tables() {
        let existing = catalog.columns.entry(table.name.clone()).or_default();
        for column in table.own_columns() {
            if existing.contains(&column.name) {
                continue;
            }
            let mut sql = String::new();
            sql.push_str("ALTER TABLE ");
            writer.write_identifier(&mut sql, &table.name);
            sql.push_str(" ADD COLUMN ");
            let mut definition = String::new();
            column_definition(&writer, table, column, &mut definition);
            if !writer.alter_supports_not_null() {
                definition = definition.trim_end_matches(" NOT NULL").to_string();
            }
            sql.push_str(&definition);
            executor.execute(Query::new(sql)).await?;
            existing.insert(column.name.clone());
        }
    }

    // Natural-key unique index, then secondary unique column sets.
    for table in registry.tables() {
        let index = format!("unique_index_{}", table.name);
        if !catalog.indexes.contains(&index) {
            let mut sql = String::new();
            sql.push_str("CREATE UNIQUE INDEX ");
            writer.write_identifier(&mut sql, &index);
            sql.push_str(" ON ");
            writer.write_identifier(&mut sql, &table.name);
            sql.push_str(" (");
            for (i, key_col) in table.key.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                writer.write_identifier(&mut sql, key_col);
            }
            sql.push(')');
            executor.execute(Query::new(sql)).await?;
            catalog.indexes.insert(index);
        }
        for columns in &table.unique {
            let name = format!("unique_{}", columns.join("_"));
            if name.len() > 63 {
                return Err(Error::schema(format!(
                    "constraint name `{}` is too long",
                    name
                )));
            }
            let mut sql = String::new();
            if writer.supports_unique_constraints() {
                if catalog.constraints.contains(&name) {
                    continue;
                }
                sql.push_str("ALTER TABLE ");
                writer.write_identifier(&mut sql, &table.name);
                sql.push_str(" ADD CONSTRAINT ");
                writer.write_identifier(&mut sql, &name);
                sql.push_str(" UNIQUE (");
                catalog.constraints.insert(name.clone());
            } else {
                if catalog.indexes.contains(&name) {
                    continue;
                }
                sql.push_str("CREATE UNIQUE INDEX ");
                writer.write_identifier(&mut sql, &name);
                sql.push_str(" ON ");
                writer.write_identifier(&mut sql, &table.name);
                sql.push_str(" (");
                catalog.indexes.insert(name.clone());
            }
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    sql.push_str(", ");
                }
                writer.write_identifier(&mut sql, column);
            }
            sql.push(')');
            executor.execute(Query::new(sql)).await?;
        }
    }
    Ok(())
}
