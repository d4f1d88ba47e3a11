use crate::{Executor, Result};

pub trait Connection: Executor + Sized {
    /// Open a connection to the given `db_uri`. The scheme must match the
    /// driver's [`crate::Driver::NAME`].
    fn connect(url: &str) -> impl Future<Output = Result<Self>> + Send;

    fn close(self) -> impl Future<Output = Result<()>> + Send;
}
