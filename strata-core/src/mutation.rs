use crate::{
    Assignment, Condition, DeletePlan, Entity, EntityMetadata, Error, Executor, InsertPlan,
    Lookup, OnConflict, Passive, Query, Result, RowsAffected, UpdatePlan, Value,
};
use std::{borrow::Cow, slice};

/// Ordered record payloads of a bulk insert, split into chunks of `chunk_size` rows.
///
/// A chunk size of `0` produces a single statement with every row.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MutationBatch {
    pub table: &'static str,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<Value>>,
    pub chunk_size: usize,
    pub on_conflict: OnConflict,
    pub conflict_target: Vec<&'static str>,
    pub returning: Vec<Cow<'static, str>>,
}

impl MutationBatch {
    /// Lays out `records` as rows of `metadata`.
    ///
    /// A column is part of the insert when at least one record has it set and, if
    /// `selected` is not empty, when it is selected or is the primary key. Records where
    /// the column is `Passive::NotSet` contribute `NULL`, which makes the backend generate
    /// auto increment values.
    pub fn new<'a, E: Entity>(
        metadata: &EntityMetadata,
        records: impl IntoIterator<Item = &'a E>,
        selected: &[Cow<'static, str>],
    ) -> Self {
        let records = records.into_iter().map(Entity::row).collect::<Vec<_>>();
        let key = metadata.primary_key().name;
        let included = metadata
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| {
                selected.is_empty() || c.name == key || selected.iter().any(|s| s == c.name)
            })
            .filter(|(i, _)| {
                records
                    .iter()
                    .any(|row| matches!(row.get(*i), Some((_, Passive::Set(..)))))
            })
            .map(|(i, c)| (i, c.name))
            .collect::<Vec<_>>();
        let rows = records
            .into_iter()
            .map(|mut row| {
                included
                    .iter()
                    .map(|(i, _)| match row.get_mut(*i) {
                        Some((_, Passive::Set(v))) => std::mem::take(v),
                        _ => Value::Null,
                    })
                    .collect()
            })
            .collect();
        Self {
            table: metadata.table,
            columns: included.into_iter().map(|(_, name)| name).collect(),
            rows,
            chunk_size: 0,
            on_conflict: OnConflict::None,
            conflict_target: vec![key],
            returning: Vec::new(),
        }
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.on_conflict = on_conflict;
        self
    }

    pub fn returning(mut self, returning: Vec<Cow<'static, str>>) -> Self {
        self.returning = returning;
        self
    }

    fn rows_per_chunk(&self) -> usize {
        match self.chunk_size {
            0 => self.rows.len().max(1),
            n => n,
        }
    }

    /// Number of statements the batch turns into.
    pub fn chunks(&self) -> usize {
        self.rows.len().div_ceil(self.rows_per_chunk())
    }

    /// One insert per chunk, in record order.
    pub fn plans(&self) -> impl Iterator<Item = InsertPlan> + '_ {
        self.rows.chunks(self.rows_per_chunk()).map(|rows| InsertPlan {
            table: self.table,
            columns: self.columns.clone(),
            rows: rows.to_vec(),
            on_conflict: self.on_conflict.clone(),
            conflict_target: self.conflict_target.clone(),
            returning: self.returning.clone(),
        })
    }
}

impl<'r, E: Entity> Query<'r, E> {
    /// Inserts `record` and writes the generated primary key back into it.
    ///
    /// With a conflict mode set (see [`Query::on_conflict`]) the record is refreshed from
    /// the row stored by the backend.
    pub async fn create<X: Executor>(
        self,
        executor: &mut X,
        record: &mut E,
    ) -> Result<RowsAffected> {
        self.create_in_batches(executor, slice::from_mut(record), 0)
            .await
            .map_err(|e| match e {
                Error::PartialBatch { source, .. } => *source,
                e => e,
            })
    }

    /// Inserts `records` with one statement per `chunk_size` records (`0` means a single
    /// statement), in order. Generated keys are written back in record order.
    ///
    /// The [`Hooks`](crate::Hooks) of every record run first, a failing hook sends nothing. A failing
    /// chunk stops the operation. Chunks already applied stay applied unless the call runs
    /// inside a transaction, and the error reports how many records made it.
    pub async fn create_in_batches<X: Executor>(
        self,
        executor: &mut X,
        records: &mut [E],
        chunk_size: usize,
    ) -> Result<RowsAffected> {
        for record in records.iter_mut() {
            record.before_save()?;
            record.before_create()?;
        }
        self.insert(executor, records, chunk_size).await
    }

    async fn insert<X: Executor>(
        self,
        executor: &mut X,
        records: &mut [E],
        chunk_size: usize,
    ) -> Result<RowsAffected> {
        if records.is_empty() {
            return Ok(RowsAffected::default());
        }
        let refresh = self.plan.on_conflict != OnConflict::None && self.plan.returning.is_empty();
        let returning = if refresh {
            self.metadata.column_names().map(Into::into).collect()
        } else {
            self.plan.returning.clone()
        };
        let batch = MutationBatch::new(&self.metadata, records.iter(), &self.plan.columns)
            .chunk_size(chunk_size)
            .on_conflict(self.plan.on_conflict.clone())
            .returning(returning);
        let per_chunk = batch.rows_per_chunk();
        let mut total = RowsAffected::default();
        let mut applied = 0;
        for (plan, records) in batch.plans().zip(records.chunks_mut(per_chunk)) {
            let mut result = match executor.execute(plan).await {
                Ok(v) => v,
                Err(e) if applied > 0 => {
                    log::info!(
                        "Batch insert into `{}` stopped after {applied} records",
                        self.metadata.table
                    );
                    return Err(Error::PartialBatch {
                        applied,
                        source: e.into(),
                    });
                }
                Err(e) => return Err(e),
            };
            if result.generated_keys.len() == records.len() {
                for (record, key) in records.iter_mut().zip(&result.generated_keys) {
                    if !key.is_null() {
                        record.set_primary_key(key.clone())?;
                    }
                }
            }
            if refresh {
                if result.returning.len() == records.len() {
                    for (record, row) in records.iter_mut().zip(result.returning.drain(..)) {
                        *record = E::from_row(row)?;
                    }
                } else {
                    log::debug!(
                        "Expected {} returned rows from `{}`, got {}",
                        records.len(),
                        self.metadata.table,
                        result.returning.len()
                    );
                }
            }
            applied += records.len();
            total.extend([result]);
        }
        Ok(total)
    }

    /// Updates every column of `record` by primary key, or inserts it when the key is not
    /// set or no row has that key.
    ///
    /// `before_save` runs once, `before_create` only on the insert path.
    pub async fn save<X: Executor>(
        self,
        executor: &mut X,
        record: &mut E,
    ) -> Result<RowsAffected> {
        record.before_save()?;
        if !record.has_primary_key() {
            record.before_create()?;
            return self.insert(executor, slice::from_mut(record), 0).await;
        }
        let key = self.metadata.primary_key().name;
        let assignments = record
            .row()
            .into_iter()
            .filter(|(column, _)| *column != key)
            .filter_map(|(column, value)| match value {
                Passive::Set(v) => Some((column.into(), Assignment::Literal(v))),
                Passive::NotSet => None,
            })
            .collect();
        let plan = UpdatePlan {
            table: self.metadata.table,
            assignments,
            condition: Some(Condition::matching(key, record.primary_key())),
            returning: self.plan.returning.clone(),
        };
        let result = executor.execute(plan).await?;
        if result.rows_affected > 0 {
            return Ok(result);
        }
        log::debug!(
            "No `{}` row with key {}, inserting",
            self.metadata.table,
            record.primary_key()
        );
        record.before_create()?;
        self.insert(executor, slice::from_mut(record), 0).await
    }

    /// First record matching the accumulated condition and the populated fields of
    /// `record`, ordered by primary key. When there is none, `record` is inserted.
    ///
    /// The lookup and the insert are separate statements. Two concurrent callers can both
    /// miss and both insert: with a unique constraint the second insert fails with
    /// [`Error::Conflict`], the call is never retried.
    pub async fn first_or_create<X: Executor>(
        self,
        executor: &mut X,
        mut record: E,
    ) -> Result<E> {
        let query = self.clone().filter(&record);
        if query.plan.condition.is_none() {
            log::warn!(
                "No condition and no populated field on `{}`, first_or_create returns any row",
                self.metadata.name
            );
        }
        let lookup = query.first(executor).await;
        match lookup {
            Lookup::Found(v) => Ok(v),
            Lookup::NotFound => {
                self.create(executor, &mut record).await?;
                Ok(record)
            }
            Lookup::Fault(e) => Err(e),
        }
    }

    /// Sets one column on every matching row.
    pub async fn update<X: Executor>(
        self,
        executor: &mut X,
        column: impl Into<Cow<'static, str>>,
        value: impl Into<Assignment>,
    ) -> Result<RowsAffected> {
        self.updates(executor, [(column.into(), value.into())]).await
    }

    /// Sets the given columns, and only those, on every matching row.
    pub async fn updates<X: Executor, K: Into<Cow<'static, str>>>(
        self,
        executor: &mut X,
        assignments: impl IntoIterator<Item = (K, Assignment)>,
    ) -> Result<RowsAffected> {
        let table = self.metadata.table;
        let Some(condition) = self.plan.condition else {
            return Err(Error::UnsafeUpdate {
                table: table.into(),
            });
        };
        let assignments = assignments
            .into_iter()
            .map(|(column, assignment)| {
                let column = column.into();
                if self.metadata.column(&column).is_none() {
                    return Err(Error::invalid(format!(
                        "`{column}` is not a column of `{table}`"
                    )));
                }
                Ok((column, assignment))
            })
            .collect::<Result<Vec<_>>>()?;
        let plan = UpdatePlan {
            table,
            assignments,
            condition: Some(condition),
            returning: self.plan.returning,
        };
        executor.execute(plan).await
    }

    /// Deletes every matching row. Refuses to run without a condition.
    pub async fn delete<X: Executor>(self, executor: &mut X) -> Result<RowsAffected> {
        let table = self.metadata.table;
        let Some(condition) = self.plan.condition else {
            return Err(Error::UnsafeDelete {
                table: table.into(),
            });
        };
        executor
            .execute(DeletePlan {
                table,
                condition: Some(condition),
                returning: self.plan.returning,
            })
            .await
    }

    /// Deletes `record` by primary key, restricted further by the accumulated condition.
    /// Refuses to run when there is neither a key nor a condition.
    pub async fn delete_record<X: Executor>(
        self,
        executor: &mut X,
        record: &E,
    ) -> Result<RowsAffected> {
        let query = if record.has_primary_key() {
            let key = self.metadata.primary_key().name;
            self.filter(Condition::matching(key, record.primary_key()))
        } else {
            self
        };
        query.delete(executor).await
    }
}
