use std::collections::HashMap;

/// One record of the schema file: table name, ordered `name -> type-spec`
/// columns, natural key, optional secondary unique column sets and raw SQL
/// defaults. This is the interface the YAML loader (or any other frontend)
/// fills in.
#[derive(Debug, Clone, Default)]
pub struct TableDecl {
    pub table: String,
    pub columns: Vec<(String, String)>,
    pub key: Option<Vec<String>>,
    pub unique: Vec<Vec<String>>,
    pub defaults: HashMap<String, String>,
}

impl TableDecl {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    pub fn column(mut self, name: impl Into<String>, spec: impl Into<String>) -> Self {
        self.columns.push((name.into(), spec.into()));
        self
    }

    pub fn key(mut self, columns: &[&str]) -> Self {
        self.key = Some(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn unique(mut self, columns: &[&str]) -> Self {
        self.unique
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn default_value(mut self, column: impl Into<String>, sql: impl Into<String>) -> Self {
        self.defaults.insert(column.into(), sql.into());
        self
    }
}
