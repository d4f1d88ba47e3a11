use crate::{ArgValue, TableDecl};
use std::collections::HashMap;

pub const DEFAULT_DB_URI: &str = "sqlite://:memory:";

/// Connection-scope configuration: where to connect, what the schema is,
/// per-table access filters, and free-form values usable as `{key}` in
/// expressions.
#[derive(Debug, Clone)]
pub struct Config {
    pub db_uri: String,
    pub schema: Vec<TableDecl>,
    pub acl_read: HashMap<String, Vec<String>>,
    pub acl_write: HashMap<String, Vec<String>>,
    pub vars: HashMap<String, ArgValue>,
    pub max_connections: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_uri: DEFAULT_DB_URI.to_string(),
            schema: Vec::new(),
            acl_read: HashMap::new(),
            acl_write: HashMap::new(),
            vars: HashMap::new(),
            max_connections: 10,
        }
    }
}

impl Config {
    pub fn new(db_uri: impl Into<String>) -> Config {
        Config {
            db_uri: db_uri.into(),
            ..Default::default()
        }
    }

    pub fn schema(mut self, schema: Vec<TableDecl>) -> Config {
        self.schema = schema;
        self
    }

    pub fn acl_read(mut self, table: impl Into<String>, filter: impl Into<String>) -> Config {
        self.acl_read
            .entry(table.into())
            .or_default()
            .push(filter.into());
        self
    }

    pub fn acl_write(mut self, table: impl Into<String>, filter: impl Into<String>) -> Config {
        self.acl_write
            .entry(table.into())
            .or_default()
            .push(filter.into());
        self
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Config {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// `(scheme, url without fragment, fragment)`; the fragment selects a
    /// Postgres schema namespace.
    pub fn parse_db_uri(&self) -> (Option<&str>, &str, Option<&str>) {
        let (uri, fragment) = match self.db_uri.split_once('#') {
            Some((uri, fragment)) => (uri, Some(fragment)),
            None => (self.db_uri.as_str(), None),
        };
        let scheme = uri.split_once("://").map(|(scheme, _)| scheme);
        (scheme, uri, fragment)
    }
}
