use crate::{MemoryConnection, MemoryDriver, database::Database};
use strata_core::{Executor, QueryResult, Result, Statement, Transaction, stream::Stream};

/// Snapshot isolation over a [`MemoryConnection`]: the tables as they were at `begin`
/// are put back on rollback, or when the transaction is dropped without a commit.
pub struct MemoryTransaction<'c> {
    connection: &'c mut MemoryConnection,
    snapshot: Option<Database>,
}

impl<'c> MemoryTransaction<'c> {
    pub(crate) fn new(connection: &'c mut MemoryConnection) -> Self {
        log::debug!("BEGIN;");
        let snapshot = Some(connection.database.clone());
        Self {
            connection,
            snapshot,
        }
    }

    fn restore(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.connection.database = snapshot;
        }
    }
}

impl<'c> Executor for MemoryTransaction<'c> {
    type Driver = MemoryDriver;

    fn driver(&self) -> &MemoryDriver {
        self.connection.driver()
    }

    fn run(&mut self, statement: Statement) -> impl Stream<Item = Result<QueryResult>> + Send {
        self.connection.run(statement)
    }
}

impl<'c> Transaction<'c> for MemoryTransaction<'c> {
    #[allow(refining_impl_trait)]
    async fn commit(mut self) -> Result<()> {
        log::debug!("COMMIT;");
        self.snapshot = None;
        Ok(())
    }

    #[allow(refining_impl_trait)]
    async fn rollback(mut self) -> Result<()> {
        log::debug!("ROLLBACK;");
        self.restore();
        Ok(())
    }
}

impl Drop for MemoryTransaction<'_> {
    fn drop(&mut self) {
        if self.snapshot.is_some() {
            log::debug!("Transaction dropped without a commit, rolling back");
            self.restore();
        }
    }
}
