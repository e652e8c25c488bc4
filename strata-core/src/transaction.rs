use crate::{Connection, Error, Executor, Result};
use std::future::Future;

pub trait Transaction<'c>: Executor {
    fn commit(self) -> impl Future<Output = Result<()>> + Send;
    fn rollback(self) -> impl Future<Output = Result<()>> + Send;
}

/// Result of a unit of work run inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Keep the effects.
    Commit(T),
    /// Discard the effects, with a reason.
    Rollback(String),
}

impl<T> Outcome<T> {
    pub fn is_commit(&self) -> bool {
        matches!(self, Outcome::Commit(..))
    }
    pub fn rollback(reason: impl Into<String>) -> Self {
        Outcome::Rollback(reason.into())
    }
}

/// Runs `work` in a new transaction.
///
/// Commits on `Ok(Outcome::Commit(_))`. Rolls back on `Ok(Outcome::Rollback(_))` and on
/// `Err(_)`, in which case the error is returned once the rollback completed. Nothing
/// `work` did is visible outside the transaction unless it commits.
///
/// ```ignore
/// let outcome = run_in_transaction(&mut connection, async |tx| {
///     registry.query::<Log>()?.where_pk_in([1u64]).delete(tx).await?;
///     Ok(Outcome::Rollback("dry run".into()))
/// })
/// .await?;
/// ```
pub async fn run_in_transaction<'c, C, T, F>(connection: &'c mut C, work: F) -> Result<Outcome<T>>
where
    C: Connection,
    F: AsyncFnOnce(&mut C::Transaction<'c>) -> Result<Outcome<T>>,
{
    let mut transaction = connection.begin().await?;
    match work(&mut transaction).await {
        Ok(Outcome::Commit(v)) => {
            transaction.commit().await?;
            Ok(Outcome::Commit(v))
        }
        Ok(Outcome::Rollback(reason)) => {
            log::debug!("Rolling back: {reason}");
            transaction.rollback().await?;
            Ok(Outcome::Rollback(reason))
        }
        Err(e) => {
            if let Err(rollback) = transaction.rollback().await {
                log::error!("Rollback after `{e}` failed: {rollback:#}");
            }
            Err(e)
        }
    }
}

/// Runs `work` inside an already open transaction, without a savepoint.
///
/// `Commit(v)` yields `v`. `Rollback(reason)` yields [`Error::RolledBack`], so the
/// enclosing unit of work fails and rolls everything back.
pub async fn join_transaction<X, T, F>(transaction: &mut X, work: F) -> Result<T>
where
    X: Executor,
    F: AsyncFnOnce(&mut X) -> Result<Outcome<T>>,
{
    match work(transaction).await? {
        Outcome::Commit(v) => Ok(v),
        Outcome::Rollback(reason) => Err(Error::RolledBack(reason)),
    }
}
