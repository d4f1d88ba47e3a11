mod read;
mod result;
mod write;

pub use read::*;
pub use result::*;
pub use write::*;

use crate::{Ast, ColumnType, Error, Registry, Result, Table, Value, expr};
use std::sync::Arc;

/// How one view field projects out of the base table.
#[derive(Debug, Clone)]
pub enum FieldKind {
    /// Plain column of the base table (`id`, a scalar, or a raw `m2o` fk).
    Column,
    /// Dotted path through one or more relations; `column` is the first
    /// segment.
    Path { column: String },
    /// S-expression over paths, parsed eagerly.
    Expression(Ast),
}

#[derive(Debug, Clone)]
pub struct ViewField {
    /// User-facing name; labels result rows and staged columns.
    pub name: String,
    /// The dotted path or s-expression text.
    pub desc: String,
    pub kind: FieldKind,
    /// Storage type of the terminal column; `None` for expressions.
    pub ftype: Option<ColumnType>,
}

impl ViewField {
    fn new(name: &str, desc: &str, table: &Table, registry: &Registry) -> Result<ViewField> {
        let name = name.trim().to_string();
        let desc = desc.trim().to_string();
        if desc.starts_with('(') {
            let ast = expr::parse(&desc)?;
            return Ok(ViewField {
                name,
                desc,
                kind: FieldKind::Expression(ast),
                ftype: None,
            });
        }
        let terminal = terminal_type(registry, table, &desc)?;
        let kind = match desc.split_once('.') {
            Some((head, _)) => FieldKind::Path {
                column: head.to_string(),
            },
            None => FieldKind::Column,
        };
        Ok(ViewField {
            name,
            desc,
            kind,
            ftype: Some(terminal),
        })
    }

    /// The target-table column this field feeds on write, if any.
    pub fn target_column(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Column => Some(&self.desc),
            FieldKind::Path { column } => Some(column),
            FieldKind::Expression(..) => None,
        }
    }
}

/// Storage type of the column a dotted path lands on; validates the whole
/// chain against the registry.
fn terminal_type(registry: &Registry, table: &Table, path: &str) -> Result<ColumnType> {
    let mut table = table;
    let mut rest = path;
    loop {
        match rest.split_once('.') {
            None => {
                let column = table.column(rest)?;
                if column.ctype.is_virtual() {
                    return Err(Error::resolve(&table.name, path));
                }
                return Ok(column.ctype.storage().clone());
            }
            Some((head, tail)) => {
                let column = table.column(head).map_err(|_| Error::resolve(&table.name, path))?;
                let Some((target, _)) = column.relation() else {
                    return Err(Error::resolve(&table.name, path));
                };
                table = registry.get(target)?.as_ref();
                rest = tail;
            }
        }
    }
}

/// A declarative projection over one base table. Owns no connection and no
/// state across calls; `read()`, `write()` and `delete()` each compile and
/// run independently inside whatever scope they are handed.
#[derive(Debug, Clone)]
pub struct View {
    pub(crate) registry: Arc<Registry>,
    pub(crate) table: Arc<Table>,
    pub(crate) fields: Vec<ViewField>,
}

impl View {
    pub fn new(registry: &Arc<Registry>, table: &str, fields: &[&str]) -> Result<View> {
        let named: Vec<(&str, &str)> = fields.iter().map(|f| (*f, *f)).collect();
        View::with_named_fields(registry, table, &named)
    }

    pub fn with_named_fields(
        registry: &Arc<Registry>,
        table: &str,
        fields: &[(&str, &str)],
    ) -> Result<View> {
        let table = registry.get(table)?.clone();
        let fields = fields
            .iter()
            .map(|(name, desc)| ViewField::new(name, desc, &table, registry))
            .collect::<Result<Vec<_>>>()?;
        if fields.is_empty() {
            return Err(Error::schema(format!(
                "view over `{}` has no fields",
                table.name
            )));
        }
        // A non-relational column may appear only once.
        for (i, field) in fields.iter().enumerate() {
            if let Some(column) = field.target_column() {
                let duplicated = fields[..i]
                    .iter()
                    .any(|other| other.target_column() == Some(column));
                if duplicated && !table.column(column)?.ctype.is_relation() {
                    return Err(Error::schema(format!(
                        "column `{}` is referenced twice in view over `{}`",
                        column, table.name
                    )));
                }
            }
        }
        Ok(View {
            registry: registry.clone(),
            table,
            fields,
        })
    }

    pub fn with_default_fields(registry: &Arc<Registry>, table: &str) -> Result<View> {
        let resolved = registry.get(table)?;
        let fields = registry.default_fields(resolved)?;
        let borrowed: Vec<&str> = fields.iter().map(String::as_str).collect();
        View::new(registry, table, &borrowed)
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn fields(&self) -> &[ViewField] {
        &self.fields
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn read(&self) -> ReadQuery<'_> {
        ReadQuery::new(self)
    }

    pub fn write(&self) -> WriteQuery<'_> {
        WriteQuery::new(self)
    }

    pub fn delete(&self) -> DeleteQuery<'_> {
        DeleteQuery::new(self)
    }

    /// The columns used to identify rows on write and delete: the surrogate
    /// `id` when the view carries it, the natural key otherwise.
    pub(crate) fn key_columns(&self) -> Vec<String> {
        if self
            .fields
            .iter()
            .any(|f| f.target_column() == Some("id"))
        {
            vec!["id".to_string()]
        } else {
            self.table.key.clone()
        }
    }

    /// Writing or deleting rows requires an unambiguous row identity: the
    /// full natural key, or the `id` column.
    pub(crate) fn validate_key(&self) -> Result<()> {
        let columns: Vec<&str> = self.fields.iter().filter_map(|f| f.target_column()).collect();
        if columns.contains(&"id") {
            return Ok(());
        }
        let missing: Vec<&String> = self
            .table
            .key
            .iter()
            .filter(|k| !columns.contains(&k.as_str()))
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        Err(Error::schema(format!(
            "view over `{}` must cover the natural key (or include `id`) to write or \
             delete rows; missing: {}",
            self.table.name,
            missing
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

/// One filter handed to a read, write or delete: an s-expression, or an
/// equality sugar entry (the mapping form of the original language).
#[derive(Debug, Clone)]
pub enum FilterSpec {
    Expr(String),
    Eq(String, Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}
