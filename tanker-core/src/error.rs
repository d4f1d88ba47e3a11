use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure kinds surfaced by the library.
///
/// Compilation problems (`Schema`, `Resolve`, `Parse`, `Arg`) are raised
/// before any SQL is sent; `Constraint` and `Driver` wrap what the database
/// reports back.
#[derive(Debug, Error)]
pub enum Error {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("cannot resolve `{field}` from table `{table}`")]
    Resolve { table: String, field: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("argument error: {0}")]
    Arg(String),

    #[error("no active database scope")]
    NotInScope,

    #[error("constraint violation{}: {message}", table_suffix(.table))]
    Constraint {
        table: Option<String>,
        column: Option<String>,
        message: String,
    },

    #[error("driver error: {0}")]
    Driver(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

fn table_suffix(table: &Option<String>) -> String {
    match table {
        Some(t) => format!(" on `{}`", t),
        None => String::new(),
    }
}

impl Error {
    pub fn schema(message: impl Into<String>) -> Self {
        Error::Schema(message.into())
    }

    pub fn resolve(table: impl Into<String>, field: impl Into<String>) -> Self {
        Error::Resolve {
            table: table.into(),
            field: field.into(),
        }
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Error::Parse(message.into())
    }

    pub fn arg(message: impl Into<String>) -> Self {
        Error::Arg(message.into())
    }

    pub fn constraint(
        table: Option<String>,
        column: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::Constraint {
            table,
            column,
            message: message.into(),
        }
    }

    pub fn driver(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Driver(Box::new(source))
    }

    /// Free-form driver-side failure with no structured source.
    pub fn driver_msg(message: impl Into<String>) -> Self {
        #[derive(Debug, Error)]
        #[error("{0}")]
        struct Message(String);
        Error::Driver(Box::new(Message(message.into())))
    }

    pub fn is_constraint(&self) -> bool {
        matches!(self, Error::Constraint { .. })
    }
}
