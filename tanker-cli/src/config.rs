use anyhow::{Context, Result, bail};
use serde_yaml::Value as Yaml;
use std::path::Path;
use tanker_core::{ArgValue, Config, TableDecl, Value};

/// Load the CLI configuration file: `db_uri`, `schema` (inline or a path
/// to a schema file), `acl-read`/`acl-write`, and free-form keys exposed
/// as `{key}` values in expressions.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::default();
    if !path.exists() {
        return Ok(config);
    }
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config file {}", path.display()))?;
    let yaml: Yaml = serde_yaml::from_str(&text)
        .with_context(|| format!("cannot parse config file {}", path.display()))?;
    let Yaml::Mapping(entries) = yaml else {
        bail!("config file {} must be a mapping", path.display());
    };
    for (key, value) in entries {
        let Yaml::String(key) = key else {
            bail!("config keys must be strings");
        };
        match key.as_str() {
            "db_uri" => {
                config.db_uri = string(&value).context("db_uri must be a string")?;
            }
            "schema" => {
                let schema_yaml = match &value {
                    // A string is a path to the schema file.
                    Yaml::String(schema_path) => {
                        let schema_path = Path::new(schema_path);
                        let resolved = if schema_path.is_relative() {
                            path.parent().unwrap_or(Path::new(".")).join(schema_path)
                        } else {
                            schema_path.to_path_buf()
                        };
                        let text = std::fs::read_to_string(&resolved).with_context(|| {
                            format!("cannot read schema file {}", resolved.display())
                        })?;
                        serde_yaml::from_str(&text)?
                    }
                    other => other.clone(),
                };
                config.schema = schema_decls(&schema_yaml)?;
            }
            "acl-read" => config.acl_read = acl(&value).context("bad acl-read section")?,
            "acl-write" => config.acl_write = acl(&value).context("bad acl-write section")?,
            "max_connections" => {
                if let Yaml::Number(n) = &value {
                    config.max_connections = n.as_u64().unwrap_or(10) as usize;
                }
            }
            other => {
                config.vars.insert(other.to_string(), arg_value(&value)?);
            }
        }
    }
    Ok(config)
}

/// Parse the schema file: a sequence of table records.
pub fn schema_decls(yaml: &Yaml) -> Result<Vec<TableDecl>> {
    let Yaml::Sequence(records) = yaml else {
        bail!("schema must be a sequence of table records");
    };
    let mut decls = Vec::with_capacity(records.len());
    for record in records {
        let Yaml::Mapping(entries) = record else {
            bail!("each schema record must be a mapping");
        };
        let mut decl = TableDecl::default();
        for (key, value) in entries {
            let Yaml::String(key) = key else {
                bail!("schema record keys must be strings");
            };
            match key.as_str() {
                "table" => decl.table = string(value).context("table name must be a string")?,
                "columns" => {
                    let Yaml::Mapping(columns) = value else {
                        bail!("columns must be a name to type-spec mapping");
                    };
                    for (name, spec) in columns {
                        decl.columns.push((
                            string(name).context("column names must be strings")?,
                            string(spec).context("column type-specs must be strings")?,
                        ));
                    }
                }
                "key" | "index" => decl.key = Some(string_list(value)?),
                "unique" => {
                    let Yaml::Sequence(sets) = value else {
                        bail!("unique must be a sequence of column lists");
                    };
                    for set in sets {
                        decl.unique.push(string_list(set)?);
                    }
                }
                "defaults" => {
                    let Yaml::Mapping(defaults) = value else {
                        bail!("defaults must be a column to value mapping");
                    };
                    for (name, default) in defaults {
                        decl.defaults.insert(string(name)?, yaml_literal(default));
                    }
                }
                other => bail!("unknown schema record key `{}`", other),
            }
        }
        if decl.table.is_empty() {
            bail!("schema record without a table name");
        }
        decls.push(decl);
    }
    Ok(decls)
}

fn string(yaml: &Yaml) -> Result<String> {
    match yaml {
        Yaml::String(v) => Ok(v.clone()),
        other => bail!("expected a string, got {:?}", other),
    }
}

/// A single string or a sequence of strings.
fn string_list(yaml: &Yaml) -> Result<Vec<String>> {
    match yaml {
        Yaml::String(v) => Ok(vec![v.clone()]),
        Yaml::Sequence(items) => items.iter().map(string).collect(),
        other => bail!("expected a string or a list of strings, got {:?}", other),
    }
}

fn acl(yaml: &Yaml) -> Result<std::collections::HashMap<String, Vec<String>>> {
    let Yaml::Mapping(entries) = yaml else {
        bail!("expected a table to filter mapping");
    };
    let mut result = std::collections::HashMap::new();
    for (table, filters) in entries {
        result.insert(string(table)?, string_list(filters)?);
    }
    Ok(result)
}

fn arg_value(yaml: &Yaml) -> Result<ArgValue> {
    Ok(match yaml {
        Yaml::Null => ArgValue::Scalar(Value::Null),
        Yaml::Bool(v) => ArgValue::from(*v),
        Yaml::Number(v) if v.is_i64() => ArgValue::from(v.as_i64().unwrap()),
        Yaml::Number(v) => ArgValue::from(v.as_f64().unwrap_or_default()),
        Yaml::String(v) => ArgValue::from(v.as_str()),
        Yaml::Sequence(items) => {
            ArgValue::List(items.iter().map(arg_value).collect::<Result<_>>()?)
        }
        Yaml::Mapping(entries) => {
            let mut map = std::collections::HashMap::new();
            for (key, value) in entries {
                map.insert(string(key)?, arg_value(value)?);
            }
            ArgValue::Map(map)
        }
        other => bail!("unsupported config value {:?}", other),
    })
}

/// SQL literal form of a YAML default value.
fn yaml_literal(yaml: &Yaml) -> String {
    match yaml {
        Yaml::String(v) => format!("'{}'", v.replace('\'', "''")),
        Yaml::Bool(v) => v.to_string(),
        Yaml::Number(v) => v.to_string(),
        other => serde_yaml::to_string(other).unwrap_or_default().trim().to_string(),
    }
}
