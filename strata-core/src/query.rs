use crate::{Error, Result, Value};
use std::{mem, sync::Arc};

/// Shared reference-counted column name list.
pub type RowNames = Arc<[String]>;
/// Owned row value slice matching `RowNames` length.
pub type Row = Box<[Value]>;

/// A result row with its corresponding column labels.
#[derive(Debug, Clone, PartialEq)]
pub struct RowLabeled {
    /// Column names.
    pub labels: RowNames,
    /// Data values (aligned by index with `labels`).
    pub values: Row,
}

impl RowLabeled {
    pub fn new(labels: RowNames, values: Row) -> Self {
        Self { labels, values }
    }
    pub fn names(&self) -> &[String] {
        &self.labels
    }
    pub fn values(&self) -> &[Value] {
        &self.values
    }
    pub fn get_column(&self, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|v| v == name)
            .map(|i| &self.values[i])
    }
    /// Moves the value of a column out of the row, leaving `NULL` behind.
    pub fn take_column(&mut self, name: &str) -> Option<Value> {
        self.labels
            .iter()
            .position(|v| v == name)
            .map(|i| mem::take(&mut self.values[i]))
    }
}

/// Metadata about modify operations (INSERT/UPDATE/DELETE).
#[derive(Default, Debug, Clone, PartialEq)]
pub struct RowsAffected {
    /// Total number of rows impacted.
    pub rows_affected: u64,
    /// Primary keys of the inserted rows, in the order the rows were given.
    pub generated_keys: Vec<Value>,
    /// Rows produced by a RETURNING clause.
    pub returning: Vec<RowLabeled>,
}

impl Extend<RowsAffected> for RowsAffected {
    fn extend<T: IntoIterator<Item = RowsAffected>>(&mut self, iter: T) {
        for elem in iter {
            self.rows_affected += elem.rows_affected;
            self.generated_keys.extend(elem.generated_keys);
            self.returning.extend(elem.returning);
        }
    }
}

/// Heterogeneous items emitted by `Executor::run` combining rows and modify results.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// A labeled row.
    Row(RowLabeled),
    /// A modify effect aggregation.
    Affected(RowsAffected),
}

impl From<RowLabeled> for QueryResult {
    fn from(value: RowLabeled) -> Self {
        QueryResult::Row(value)
    }
}

impl From<RowsAffected> for QueryResult {
    fn from(value: RowsAffected) -> Self {
        QueryResult::Affected(value)
    }
}

/// Outcome of a singular fetch.
///
/// "No row" is a variant of its own, callers can not mistake it for a fault.
#[derive(Debug)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Fault(Error),
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Lookup::Found(..))
    }
    pub fn is_not_found(&self) -> bool {
        matches!(self, Lookup::NotFound)
    }
    /// The record, `None` for both `NotFound` and `Fault`.
    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(v) => Some(v),
            _ => None,
        }
    }
    /// Converts into a `Result` where "no row" is [`Error::NotFound`].
    pub fn into_result(self) -> Result<T> {
        match self {
            Lookup::Found(v) => Ok(v),
            Lookup::NotFound => Err(Error::NotFound),
            Lookup::Fault(e) => Err(e),
        }
    }
    /// Converts into a `Result` keeping "no row" as `Ok(None)`.
    pub fn into_option(self) -> Result<Option<T>> {
        match self {
            Lookup::Found(v) => Ok(Some(v)),
            Lookup::NotFound => Ok(None),
            Lookup::Fault(e) => Err(e),
        }
    }
}

impl<T> From<Result<Option<T>>> for Lookup<T> {
    fn from(value: Result<Option<T>>) -> Self {
        match value {
            Ok(Some(v)) => Lookup::Found(v),
            Ok(None) => Lookup::NotFound,
            Err(e) if e.is_not_found() => Lookup::NotFound,
            Err(e) => Lookup::Fault(e),
        }
    }
}
