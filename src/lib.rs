pub use tanker_core::*;

#[cfg(feature = "postgres")]
pub use tanker_postgres::{PostgresConnection, PostgresDriver};
#[cfg(feature = "sqlite")]
pub use tanker_sqlite::{SqliteConnection, SqliteDriver};
