use crate::{
    ColumnType, Config, Connection, Driver, Error, Executor, Query, Registry, Result, Row,
    RowLabeled, RowsAffected, SqlWriter, TableDecl, View, schema,
};
use futures::TryStreamExt;
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::Semaphore;

/// Per-process handle on one database: parsed configuration, the schema
/// registry (built once, then immutable), and a bounded set of idle
/// connections.
pub struct Pool<D: Driver> {
    config: Config,
    url: String,
    namespace: Option<String>,
    registry: OnceLock<Arc<Registry>>,
    idle: Mutex<Vec<D::Connection>>,
    permits: Semaphore,
}

impl<D: Driver> Pool<D> {
    pub fn new(config: Config) -> Result<Arc<Pool<D>>> {
        let (scheme, url, namespace) = config.parse_db_uri();
        let scheme = scheme.ok_or_else(|| {
            Error::schema(format!("malformed db_uri `{}`", config.db_uri))
        })?;
        if scheme != D::NAME {
            return Err(Error::schema(format!(
                "db_uri scheme `{}` does not match the `{}` driver",
                scheme,
                D::NAME
            )));
        }
        let url = url.to_string();
        let namespace = namespace.map(str::to_string);
        let permits = Semaphore::new(config.max_connections.max(1));
        Ok(Arc::new(Pool {
            config,
            url,
            namespace,
            registry: OnceLock::new(),
            idle: Mutex::new(Vec::new()),
            permits,
        }))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Registry accessor; available once the first scope has been opened.
    pub fn registry(&self) -> Option<&Arc<Registry>> {
        self.registry.get()
    }

    /// Open a scope: acquire a connection, begin a transaction, and make
    /// sure the schema registry exists (declared, or introspected from the
    /// live database when the configuration carries no schema).
    pub async fn scope(self: Arc<Self>) -> Result<Scope<D>> {
        self.permits
            .acquire()
            .await
            .expect("connection pool semaphore closed")
            .forget();
        let connection = match self.open_connection().await {
            Ok(connection) => connection,
            Err(e) => {
                self.permits.add_permits(1);
                return Err(e);
            }
        };
        let registry = self.registry.get().expect("registry just built").clone();
        Ok(Scope {
            pool: self,
            connection: Some(connection),
            registry,
            depth: 0,
        })
    }

    /// Acquire or open a connection, build the registry on first use, and
    /// begin the transaction.
    async fn open_connection(&self) -> Result<D::Connection> {
        let recycled = self.idle.lock().unwrap().pop();
        let mut connection = match recycled {
            Some(connection) => connection,
            None => D::Connection::connect(&self.url).await?,
        };
        if let Some(namespace) = &self.namespace {
            connection
                .execute(Query::new(format!("SET search_path TO {}", namespace)))
                .await?;
        }
        if self.registry.get().is_none() {
            let decls = if self.config.schema.is_empty() {
                schema::introspect_schema(&mut connection, self.namespace.as_deref()).await?
            } else {
                self.config.schema.clone()
            };
            let registry = Arc::new(Registry::build(&decls)?);
            let _ = self.registry.set(registry);
        }
        let mut begin = String::new();
        connection
            .driver()
            .sql_writer()
            .write_transaction_begin(&mut begin);
        connection.execute(Query::new(begin)).await?;
        Ok(connection)
    }
}

/// One-shot scope over a fresh pool; the pool lives as long as the scope.
pub async fn connect<D: Driver>(config: Config) -> Result<Scope<D>> {
    Pool::<D>::new(config)?.scope().await
}

/// The dynamic extent of a database session: holds the connection, the
/// open transaction, the schema registry and the configuration. Every
/// read/write goes through a scope; once committed or rolled back, further
/// calls fail with [`Error::NotInScope`].
pub struct Scope<D: Driver> {
    pool: Arc<Pool<D>>,
    connection: Option<D::Connection>,
    registry: Arc<Registry>,
    depth: usize,
}

impl<D: Driver> Scope<D> {
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        self.pool.config()
    }

    pub fn writer(&self) -> Result<D::SqlWriter> {
        Ok(self
            .connection
            .as_ref()
            .ok_or(Error::NotInScope)?
            .driver()
            .sql_writer())
    }

    fn executor(&mut self) -> Result<&mut D::Connection> {
        self.connection.as_mut().ok_or(Error::NotInScope)
    }

    /// A view over `table` with its default field set (every concrete
    /// column, `m2o` columns expanded to their target's natural key).
    pub fn view(&self, table: &str) -> Result<View> {
        View::with_default_fields(&self.registry, table)
    }

    pub fn view_fields(&self, table: &str, fields: &[&str]) -> Result<View> {
        View::new(&self.registry, table, fields)
    }

    /// A view with named fields, e.g. `("year", "(extract \"year\" date)")`.
    pub fn view_named(&self, table: &str, fields: &[(&str, &str)]) -> Result<View> {
        View::with_named_fields(&self.registry, table, fields)
    }

    pub async fn fetch_all(&mut self, query: Query) -> Result<Vec<RowLabeled>> {
        log::debug!("SQL: {}", query);
        self.executor()?.fetch(query).try_collect().await
    }

    pub async fn execute(&mut self, query: Query) -> Result<RowsAffected> {
        log::debug!("SQL: {}", query);
        self.executor()?.execute(query).await
    }

    pub async fn bulk_load(
        &mut self,
        table: &str,
        columns: &[String],
        types: &[ColumnType],
        rows: Vec<Row>,
    ) -> Result<u64> {
        log::debug!("bulk load of {} rows into {}", rows.len(), table);
        self.executor()?.bulk_load(table, columns, types, rows).await
    }

    /// Deploy the registry against the live database: create missing
    /// tables, then relation columns, then key indexes. Idempotent.
    pub async fn create_tables(&mut self) -> Result<()> {
        let registry = self.registry.clone();
        let namespace = self.pool.namespace().map(str::to_string);
        schema::create_tables(self.executor()?, &registry, namespace.as_deref()).await
    }

    /// Fabricate schema declarations from the live catalog.
    pub async fn introspect_schema(&mut self) -> Result<Vec<TableDecl>> {
        let namespace = self.pool.namespace().map(str::to_string);
        schema::introspect_schema(self.executor()?, namespace.as_deref()).await
    }

    async fn transaction_statement(
        &mut self,
        write: impl FnOnce(&D::SqlWriter, &mut String),
    ) -> Result<()> {
        let executor = self.executor()?;
        let mut sql = String::new();
        write(&executor.driver().sql_writer(), &mut sql);
        log::debug!("SQL: {}", sql);
        executor.execute(Query::new(sql)).await?;
        Ok(())
    }

    /// Open a nested transaction level (savepoint).
    pub async fn begin_nested(&mut self) -> Result<()> {
        self.depth += 1;
        let name = format!("sp_{}", self.depth);
        self.transaction_statement(|w, out| w.write_savepoint(out, &name))
            .await
    }

    pub async fn commit_nested(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::driver_msg("no nested transaction to commit"));
        }
        let name = format!("sp_{}", self.depth);
        self.depth -= 1;
        self.transaction_statement(|w, out| w.write_release_savepoint(out, &name))
            .await
    }

    pub async fn rollback_nested(&mut self) -> Result<()> {
        if self.depth == 0 {
            return Err(Error::driver_msg("no nested transaction to roll back"));
        }
        let name = format!("sp_{}", self.depth);
        self.depth -= 1;
        self.transaction_statement(|w, out| w.write_rollback_savepoint(out, &name))
            .await
    }

    /// Commit the transaction and release the connection back to the pool.
    pub async fn commit(&mut self) -> Result<()> {
        self.transaction_statement(|w, out| w.write_transaction_commit(out))
            .await?;
        self.release();
        Ok(())
    }

    /// Roll the transaction back and release the connection.
    pub async fn rollback(&mut self) -> Result<()> {
        self.transaction_statement(|w, out| w.write_transaction_rollback(out))
            .await?;
        self.release();
        Ok(())
    }

    fn release(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.idle.lock().unwrap().push(connection);
            self.pool.permits.add_permits(1);
        }
    }
}

impl<D: Driver> Drop for Scope<D> {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            // Dropping the raw connection aborts the open transaction
            // server-side; the permit goes back, the connection does not.
            log::warn!("scope dropped without commit or rollback, transaction aborted");
            drop(connection);
            self.pool.permits.add_permits(1);
        }
    }
}
