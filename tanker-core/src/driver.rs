use crate::{Connection, SqlWriter};

/// A database backend: names the connection type and the dialect writer.
pub trait Driver: Send + Sync + Sized + 'static {
    type Connection: Connection<Driver = Self>;
    type SqlWriter: SqlWriter;

    /// The `db_uri` scheme this driver answers to.
    const NAME: &'static str;

    fn sql_writer(&self) -> Self::SqlWriter;
}
