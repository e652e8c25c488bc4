use crate::{MemoryDriver, MemoryTransaction, database::Database};
use anyhow::anyhow;
use async_stream::stream;
use std::sync::Arc;
use strata_core::{
    Connection, Context, Driver, EntityMetadata, Error, Executor, Locking, QueryResult, Result,
    SqlWriter, Statement, stream::Stream, truncate_long,
};
use url::Url;

/// A private database living as long as the connection.
///
/// Every statement is applied atomically: a failing insert, update or delete leaves the
/// tables untouched.
#[derive(Debug, Default)]
pub struct MemoryConnection {
    pub(crate) database: Database,
}

impl Executor for MemoryConnection {
    type Driver = MemoryDriver;

    fn driver(&self) -> &MemoryDriver {
        &MemoryDriver {}
    }

    fn run(&mut self, statement: Statement) -> impl Stream<Item = Result<QueryResult>> + Send {
        if log::log_enabled!(log::Level::Debug) {
            let mut sql = String::new();
            self.driver()
                .sql_writer()
                .write_statement(&mut sql, &statement);
            log::debug!("{}", truncate_long!(sql));
        }
        if let Statement::Select(plan) = &statement
            && plan.lock == Locking::ForUpdate
        {
            log::trace!("`{}` is only reachable from this connection, no lock taken", plan.table);
        }
        let result = self.database.execute(statement);
        if let Err(e) = &result {
            log::debug!("Statement failed: {e}");
        }
        stream! {
            match result {
                Ok(results) => {
                    for result in results {
                        yield Ok(result);
                    }
                }
                Err(e) => yield Err(e),
            }
        }
    }
}

impl Connection for MemoryConnection {
    type Transaction<'c> = MemoryTransaction<'c>;

    #[allow(refining_impl_trait)]
    async fn connect(url: &str) -> Result<MemoryConnection> {
        let parsed =
            Url::parse(url).with_context(|| format!("Invalid connection URL `{url}`"))?;
        if parsed.scheme() != MemoryDriver::NAME {
            return Err(Error::Executor(anyhow!(
                "Expected memory connection url to start with `{}://`, found `{url}`",
                MemoryDriver::NAME
            )));
        }
        Ok(MemoryConnection::default())
    }

    #[allow(refining_impl_trait)]
    async fn begin(&mut self) -> Result<MemoryTransaction<'_>> {
        Ok(MemoryTransaction::new(self))
    }

    #[allow(refining_impl_trait)]
    async fn ensure_schema(&mut self, entities: &[Arc<EntityMetadata>]) -> Result<()> {
        for metadata in entities {
            if self.database.create_table(metadata) {
                let mut sql = String::new();
                self.driver()
                    .sql_writer()
                    .write_create_table(&mut sql, metadata);
                log::debug!("{sql}");
            }
        }
        Ok(())
    }
}
