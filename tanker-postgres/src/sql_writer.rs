use tanker_core::SqlWriter;

/// The trait defaults are already the Postgres spellings.
pub struct PostgresSqlWriter {}

impl SqlWriter for PostgresSqlWriter {
    fn as_dyn(&self) -> &dyn SqlWriter {
        self
    }
}
