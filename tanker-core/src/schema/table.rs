use crate::{Column, ColumnType, Error, Result};
use std::collections::HashMap;

/// A table declaration after registry linking: ordered columns (surrogate
/// `id` first), the natural key, and optional secondary unique column sets.
#[derive(Debug)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub key: Vec<String>,
    pub unique: Vec<Vec<String>>,
    index: HashMap<String, usize>,
}

impl Table {
    pub fn new(
        name: impl Into<String>,
        mut columns: Vec<Column>,
        key: Option<Vec<String>>,
        unique: Vec<Vec<String>>,
    ) -> Result<Table> {
        let name = name.into();
        if !columns.iter().any(|c| c.name == "id") {
            columns.insert(0, Column::new("id", ColumnType::Integer));
        }
        let index: HashMap<_, _> = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        if index.len() != columns.len() {
            return Err(Error::schema(format!(
                "duplicate column in table `{}`",
                name
            )));
        }

        let key = match key {
            Some(key) if !key.is_empty() => key,
            _ => {
                // Single-column shorthand: the only non-id column is the key.
                let own: Vec<_> = columns
                    .iter()
                    .filter(|c| c.name != "id" && !c.ctype.is_virtual())
                    .collect();
                if own.len() == 1 {
                    vec![own[0].name.clone()]
                } else {
                    return Err(Error::schema(format!("no key defined on `{}`", name)));
                }
            }
        };

        let table = Table {
            name,
            columns,
            key,
            unique,
            index,
        };
        for key_col in &table.key {
            let column = table.column(key_col).map_err(|_| {
                Error::schema(format!(
                    "key column `{}` does not exist in table `{}`",
                    key_col, table.name
                ))
            })?;
            if column.ctype.is_virtual() {
                return Err(Error::schema(format!(
                    "key column `{}` of table `{}` cannot be a one-to-many relation",
                    key_col, table.name
                )));
            }
            if matches!(column.ctype, ColumnType::Array(..)) {
                return Err(Error::schema(format!(
                    "key column `{}` of table `{}` cannot be an array",
                    key_col, table.name
                )));
            }
        }
        Ok(table)
    }

    pub fn column(&self, name: &str) -> Result<&Column> {
        self.index
            .get(name)
            .map(|i| &self.columns[*i])
            .ok_or_else(|| Error::resolve(&self.name, name))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Concrete columns: everything stored in the database except `id`.
    pub fn own_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| c.name != "id" && !c.ctype.is_virtual())
    }

    pub fn is_key(&self, column: &str) -> bool {
        self.key.iter().any(|k| k == column)
    }
}
