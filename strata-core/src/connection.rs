use crate::{EntityMetadata, Executor, Result, Transaction};
use std::{future::Future, sync::Arc};

pub trait Connection: Executor {
    type Transaction<'c>: Transaction<'c>
    where
        Self: 'c;

    /// Open a connection to the given URL, the scheme selects the backend.
    fn connect(url: &str) -> impl Future<Output = Result<Self>> + Send;

    /// Start a transaction, it rolls back when dropped without a commit.
    fn begin(&mut self) -> impl Future<Output = Result<Self::Transaction<'_>>> + Send;

    /// Create the tables (and unique indexes) of the given entities when missing. Called
    /// once at startup.
    fn ensure_schema(
        &mut self,
        entities: &[Arc<EntityMetadata>],
    ) -> impl Future<Output = Result<()>> + Send;
}
