mod config;
mod csv;
mod output;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tanker_core::{
    ColumnType, Driver, Error, Scope, SortOrder, Value, connect,
};
use tanker_postgres::PostgresDriver;
use tanker_sqlite::SqliteDriver;

#[derive(Parser, Debug)]
#[command(name = "tk")]
#[command(about = "Tanker CLI - schema-driven database access")]
struct Cli {
    /// Config file
    #[arg(long, default_value = ".tk.yaml", global = true)]
    config: PathBuf,

    /// Database URI (overrides the config file)
    #[arg(short = 'D', long, global = true)]
    db_uri: Option<String>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tables, or the columns of one table
    Info { table: Option<String> },
    /// Read rows as CSV (or an aligned table with -t)
    Read {
        table: String,
        /// Fields to project; defaults to every column
        fields: Vec<String>,
        #[arg(short = 'F', long = "filter")]
        filters: Vec<String>,
        #[arg(short, long)]
        limit: Option<u64>,
        #[arg(short, long)]
        offset: Option<u64>,
        /// Sort by field; append `:desc` to invert
        #[arg(short = 's', long = "sort")]
        sort: Vec<String>,
        /// Aligned text table instead of CSV
        #[arg(short = 't', long)]
        ascii_table: bool,
        #[arg(short = 'H', long)]
        hide_headers: bool,
        /// Write to a file instead of stdout
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
    },
    /// Write CSV rows (stdin, or a file with -f)
    Write {
        table: String,
        fields: Vec<String>,
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
        /// Delete rows absent from the input
        #[arg(short, long)]
        purge: bool,
    },
    /// Delete rows matching a filter, or matching CSV input rows
    Delete {
        table: String,
        #[arg(short = 'F', long = "filter")]
        filters: Vec<String>,
        #[arg(short = 'f', long)]
        file: Option<PathBuf>,
    },
    /// Create missing tables, columns and indexes
    Init,
    /// Print the version
    Version,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    env_logger::builder()
        .filter_level(if cli.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        })
        .init();
    if matches!(cli.command, Command::Version) {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return;
    }
    if let Err(e) = run(cli).await {
        eprintln!("error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

/// 1 user error, 2 connection error, 3 constraint violation.
fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<Error>() {
        Some(Error::Constraint { .. }) => 3,
        Some(Error::Driver(..)) | Some(Error::NotInScope) => 2,
        Some(..) => 1,
        None => 1,
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::load_config(&cli.config)?;
    if let Some(db_uri) = &cli.db_uri {
        config.db_uri = db_uri.clone();
    }
    let scheme = config.parse_db_uri().0.map(str::to_string);
    match scheme.as_deref() {
        Some("sqlite") => dispatch::<SqliteDriver>(config, cli.command).await,
        Some("postgresql") => dispatch::<PostgresDriver>(config, cli.command).await,
        Some(other) => bail!("unsupported db_uri scheme `{}`", other),
        None => bail!("malformed db_uri `{}`", config.db_uri),
    }
}

async fn dispatch<D: Driver>(config: tanker_core::Config, command: Command) -> Result<()> {
    let mut scope = connect::<D>(config).await?;
    let outcome = execute(&mut scope, command).await;
    match &outcome {
        Ok(..) => scope.commit().await?,
        Err(..) => {
            let _ = scope.rollback().await;
        }
    }
    outcome
}

async fn execute<D: Driver>(scope: &mut Scope<D>, command: Command) -> Result<()> {
    match command {
        Command::Info { table } => info(scope, table.as_deref()),
        Command::Read {
            table,
            fields,
            filters,
            limit,
            offset,
            sort,
            ascii_table,
            hide_headers,
            file,
        } => {
            let view = make_view(scope, &table, &fields)?;
            let mut read = view.read();
            for filter in filters {
                read = read.filter(filter);
            }
            for sort in sort {
                read = match sort.split_once(':') {
                    Some((field, "desc")) => read.order_by(field, SortOrder::Desc),
                    Some((field, _)) => read.order(field),
                    None => read.order(&sort),
                };
            }
            if let Some(limit) = limit {
                read = read.limit(limit);
            }
            if let Some(offset) = offset {
                read = read.offset(offset);
            }
            let result = read.fetch(scope).await?;
            let text = if ascii_table {
                output::ascii_table(&result, hide_headers)
            } else {
                output::csv(&result, hide_headers)
            };
            match file {
                Some(path) => std::fs::write(&path, text)
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => print!("{}", text),
            }
            Ok(())
        }
        Command::Write {
            table,
            fields,
            file,
            purge,
        } => {
            let (fields, rows) = input_rows(&fields, file.as_deref())?;
            let borrowed: Vec<&str> = fields.iter().map(String::as_str).collect();
            let view = scope.view_fields(&table, &borrowed)?;
            let mut write = view.write();
            if purge {
                write = write.purge();
            }
            let result = write.exec(scope, rows).await?;
            if result.filtered > 0 || result.deleted > 0 {
                eprintln!(
                    "filtered: {}, deleted: {}",
                    result.filtered, result.deleted
                );
            }
            Ok(())
        }
        Command::Delete {
            table,
            filters,
            file,
        } => {
            if let Some(path) = file {
                let (fields, rows) = input_rows(&[], Some(&path))?;
                let borrowed: Vec<&str> = fields.iter().map(String::as_str).collect();
                let view = scope.view_fields(&table, &borrowed)?;
                view.delete().exec_data(scope, rows).await?;
            } else {
                let view = scope.view(&table)?;
                let mut delete = view.delete();
                for filter in filters {
                    delete = delete.filter(filter);
                }
                delete.exec(scope).await?;
            }
            Ok(())
        }
        Command::Init => {
            scope.create_tables().await?;
            Ok(())
        }
        Command::Version => unreachable!("handled before connecting"),
    }
}

fn make_view<D: Driver>(
    scope: &Scope<D>,
    table: &str,
    fields: &[String],
) -> Result<tanker_core::View> {
    if fields.is_empty() {
        Ok(scope.view(table)?)
    } else {
        let borrowed: Vec<&str> = fields.iter().map(String::as_str).collect();
        Ok(scope.view_fields(table, &borrowed)?)
    }
}

fn info<D: Driver>(scope: &mut Scope<D>, table: Option<&str>) -> Result<()> {
    let registry = scope.registry().clone();
    match table {
        Some(name) => {
            let table = registry.get(name)?;
            let mut columns: Vec<_> = table.columns.iter().collect();
            columns.sort_by(|a, b| a.name.cmp(&b.name));
            for column in columns {
                match &column.ctype {
                    ColumnType::M2o { table, column: c } => {
                        println!("{} (m2o -> {}.{})", column.name, table, c)
                    }
                    ColumnType::O2m { table, column: c } => {
                        println!("{} (o2m -> {}.{})", column.name, table, c)
                    }
                    ctype => println!("{} ({})", column.name, ctype),
                }
            }
        }
        None => {
            let mut names: Vec<_> = registry.tables().map(|t| t.name.clone()).collect();
            names.sort();
            for name in names {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

/// CSV input from a file or stdin; without explicit fields, the header row
/// names them.
fn input_rows(
    fields: &[String],
    file: Option<&Path>,
) -> Result<(Vec<String>, Vec<Vec<Value>>)> {
    let text = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?,
        None => std::io::read_to_string(std::io::stdin())?,
    };
    let mut rows = csv::parse(&text)?;
    let fields = if fields.is_empty() {
        if rows.is_empty() {
            return Err(anyhow!("empty input and no fields given"));
        }
        rows.remove(0)
    } else {
        fields.to_vec()
    };
    let rows = rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|field| {
                    if field.is_empty() {
                        Value::Null
                    } else {
                        Value::Varchar(Some(field))
                    }
                })
                .collect()
        })
        .collect();
    Ok((fields, rows))
}
