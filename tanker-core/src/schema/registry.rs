use crate::{Column, ColumnType, Error, Result, TableDecl, schema::table::Table};
use std::{collections::HashMap, sync::Arc};

/// The process-wide schema: every declared table, linked and validated.
/// Immutable once built; shared across scopes through an `Arc`.
#[derive(Debug, Default)]
pub struct Registry {
    tables: Vec<Arc<Table>>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    pub fn build(decls: &[TableDecl]) -> Result<Registry> {
        let mut registry = Registry::default();
        for decl in decls {
            if registry.by_name.contains_key(&decl.table) {
                return Err(Error::schema(format!(
                    "table `{}` is declared twice",
                    decl.table
                )));
            }
            let mut columns = Vec::with_capacity(decl.columns.len());
            for (name, spec) in &decl.columns {
                let mut column = Column::new(name, ColumnType::parse(spec)?);
                column.default = decl.defaults.get(name).cloned();
                columns.push(column);
            }
            let table = Table::new(
                decl.table.clone(),
                columns,
                decl.key.clone(),
                decl.unique.clone(),
            )?;
            registry.by_name.insert(decl.table.clone(), registry.tables.len());
            registry.tables.push(Arc::new(table));
        }
        registry.link()?;
        Ok(registry)
    }

    /// Check every relation edge against the registry: `m2o` targets must
    /// exist and point at a unique column, `o2m` back-columns must be an
    /// existing `m2o` pointing back at the declaring table.
    fn link(&self) -> Result<()> {
        for table in &self.tables {
            for column in &table.columns {
                match &column.ctype {
                    ColumnType::M2o {
                        table: target,
                        column: target_col,
                    } => {
                        let target = self.get(target).map_err(|_| {
                            Error::schema(format!(
                                "column `{}.{}` references unknown table `{}`",
                                table.name, column.name, target
                            ))
                        })?;
                        let remote = target.column(target_col).map_err(|_| {
                            Error::schema(format!(
                                "column `{}.{}` references unknown column `{}.{}`",
                                table.name, column.name, target.name, target_col
                            ))
                        })?;
                        let unique = remote.name == "id"
                            || target.key == [remote.name.clone()]
                            || target.unique.iter().any(|u| u == &[remote.name.clone()]);
                        if !unique {
                            return Err(Error::schema(format!(
                                "column `{}.{}` must reference a unique column, `{}.{}` is not",
                                table.name, column.name, target.name, target_col
                            )));
                        }
                    }
                    ColumnType::O2m {
                        table: source,
                        column: back_col,
                    } => {
                        let source = self.get(source).map_err(|_| {
                            Error::schema(format!(
                                "column `{}.{}` references unknown table `{}`",
                                table.name, column.name, source
                            ))
                        })?;
                        let back = source.column(back_col).map_err(|_| {
                            Error::schema(format!(
                                "column `{}.{}` references unknown column `{}.{}`",
                                table.name, column.name, source.name, back_col
                            ))
                        })?;
                        match &back.ctype {
                            ColumnType::M2o { table: t, .. } if t == &table.name => {}
                            _ => {
                                return Err(Error::schema(format!(
                                    "column `{}.{}` must name a many-to-one column of `{}` \
                                     pointing back at `{}`",
                                    table.name, column.name, source.name, table.name
                                )));
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&Arc<Table>> {
        self.by_name
            .get(name)
            .map(|i| &self.tables[*i])
            .ok_or_else(|| Error::schema(format!("unknown table `{}`", name)))
    }

    pub fn tables(&self) -> impl Iterator<Item = &Arc<Table>> {
        self.tables.iter()
    }

    /// Tables referenced by at least one `m2o` edge.
    pub fn referenced_tables(&self) -> impl Iterator<Item = &str> {
        let mut seen: Vec<&str> = self
            .tables
            .iter()
            .flat_map(|t| t.columns.iter())
            .filter_map(|c| match &c.ctype {
                ColumnType::M2o { table, .. } => Some(table.as_str()),
                _ => None,
            })
            .collect();
        seen.sort_unstable();
        seen.dedup();
        seen.into_iter()
    }

    /// The default field set of a table: every concrete column, with `m2o`
    /// columns expanded to the natural key of their target.
    pub fn default_fields(&self, table: &Table) -> Result<Vec<String>> {
        let mut fields = Vec::new();
        for column in table.own_columns() {
            match &column.ctype {
                ColumnType::M2o { table: target, .. } => {
                    let target = self.get(target)?;
                    for key_col in &target.key {
                        fields.push(format!("{}.{}", column.name, key_col));
                    }
                }
                _ => fields.push(column.name.clone()),
            }
        }
        Ok(fields)
    }
}
