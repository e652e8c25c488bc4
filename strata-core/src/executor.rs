use crate::{
    Driver, QueryResult, Result, RowLabeled, RowsAffected, Statement, StatementPlan,
    stream::{Stream, StreamExt, TryStreamExt},
};
use std::future::Future;

/// The storage collaborator every terminal operation talks to.
///
/// Backends implement [`Executor::run`], the other methods are derived from it.
pub trait Executor: Send + Sized {
    type Driver: Driver;

    fn driver(&self) -> &Self::Driver;

    /// General method to send any statement and return any result type (either row or count)
    fn run(&mut self, statement: Statement) -> impl Stream<Item = Result<QueryResult>> + Send;

    /// Execute the read and returns the rows.
    fn fetch(&mut self, plan: StatementPlan) -> impl Stream<Item = Result<RowLabeled>> + Send {
        self.run(plan.into()).filter_map(|v| async move {
            match v {
                Ok(QueryResult::Row(v)) => Some(Ok(v)),
                Err(e) => Some(Err(e)),
                _ => None,
            }
        })
    }

    /// Execute the statement and return the total number of rows affected.
    fn execute(
        &mut self,
        statement: impl Into<Statement>,
    ) -> impl Future<Output = Result<RowsAffected>> + Send {
        self.run(statement.into())
            .filter_map(|v| async move {
                match v {
                    Ok(QueryResult::Affected(v)) => Some(Ok(v)),
                    Err(e) => Some(Err(e)),
                    _ => None,
                }
            })
            .try_collect()
    }
}
