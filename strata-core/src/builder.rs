use crate::{
    Condition, Entity, EntityMetadata, Executor, Fields, IntoCondition, Locking, Lookup,
    OnConflict, Operator, Registry, Result, RowLabeled, StatementPlan, Value, preload,
    stream::TryStreamExt,
};
use std::{borrow::Cow, fmt, marker::PhantomData, sync::Arc};

/// Chainable query over the entity `E`.
///
/// Obtained from [`Registry::query`]. Condition and clause methods only accumulate state;
/// nothing reaches the executor until a terminal (`find`, `first`, `create`, `delete`, ...)
/// consumes the query.
///
/// ```ignore
/// let logs = registry
///     .query::<Log>()?
///     .where_raw("level >= ?", [2u8])
///     .or([("message", Value::from("boot"))])
///     .order("level DESC")
///     .limit(10)
///     .find(&mut connection)
///     .await?;
/// ```
pub struct Query<'r, E: Entity> {
    pub(crate) registry: &'r Registry,
    pub(crate) metadata: Arc<EntityMetadata>,
    pub(crate) plan: StatementPlan,
    pub(crate) preload: Vec<Cow<'static, str>>,
    _entity: PhantomData<fn() -> E>,
}

impl<'r, E: Entity> Clone for Query<'r, E> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry,
            metadata: self.metadata.clone(),
            plan: self.plan.clone(),
            preload: self.preload.clone(),
            _entity: PhantomData,
        }
    }
}

impl<'r, E: Entity> fmt::Debug for Query<'r, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("entity", &self.metadata.name)
            .field("plan", &self.plan)
            .field("preload", &self.preload)
            .finish()
    }
}

fn cows<C: Into<Cow<'static, str>>>(
    values: impl IntoIterator<Item = C>,
) -> impl Iterator<Item = Cow<'static, str>> {
    values.into_iter().map(Into::into)
}

impl<'r, E: Entity> Query<'r, E> {
    pub(crate) fn new(registry: &'r Registry, metadata: Arc<EntityMetadata>) -> Self {
        Self {
            registry,
            plan: StatementPlan::new(metadata.table),
            metadata,
            preload: Vec::new(),
            _entity: PhantomData,
        }
    }

    pub fn metadata(&self) -> &Arc<EntityMetadata> {
        &self.metadata
    }

    /// The statement accumulated so far.
    pub fn plan(&self) -> &StatementPlan {
        &self.plan
    }

    pub fn into_plan(self) -> StatementPlan {
        self.plan
    }

    fn and_leaves(mut self, leaves: Vec<Condition>) -> Self {
        for leaf in leaves {
            self.plan.condition = Condition::and_opt(self.plan.condition.take(), leaf);
        }
        self
    }

    /// Filters on the populated fields of `record`, zero valued fields are skipped.
    ///
    /// A record with no populated field adds no condition at all: use
    /// [`Query::where_map`] to filter on a zero value.
    pub fn where_struct(self, record: &E) -> Self {
        let leaves = record.into_leaves();
        if leaves.is_empty() {
            log::warn!(
                "Every field of the `{}` filter is zero valued, the query is not restricted by it",
                self.metadata.name
            );
        }
        self.and_leaves(leaves)
    }

    /// Filters on every `Passive::Set` entry, zero values included.
    pub fn where_fields(self, fields: Fields) -> Self {
        self.and_leaves(fields.into_leaves())
    }

    /// Filters on every entry of the mapping: `IS NULL` for null values, `IN` for lists,
    /// equality otherwise.
    pub fn where_map<K, V>(self, mapping: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<Cow<'static, str>>,
        V: Into<Value>,
    {
        let leaves = mapping
            .into_iter()
            .map(|(k, v)| Condition::matching(k, v.into()))
            .collect();
        self.and_leaves(leaves)
    }

    /// Trusted expression with positional `?` arguments. A list argument expands to a
    /// parenthesized list, as in `level IN ?`.
    pub fn where_raw<A: Into<Value>>(
        self,
        expression: impl Into<Cow<'static, str>>,
        args: impl IntoIterator<Item = A>,
    ) -> Self {
        let leaf = Condition::raw(expression, args.into_iter().map(Into::into).collect());
        self.and_leaves(vec![leaf])
    }

    /// Restricts to the given primary keys.
    pub fn where_pk_in<V: Into<Value>>(self, keys: impl IntoIterator<Item = V>) -> Self {
        let leaf = Condition::Leaf {
            column: self.metadata.primary_key().name.into(),
            operator: Operator::In,
            values: keys.into_iter().map(Into::into).collect(),
        };
        self.and_leaves(vec![leaf])
    }

    /// Adds a fragment of AND-joined leaves, with the same resolution rules as `or`.
    pub fn filter(self, fragment: impl IntoCondition) -> Self {
        self.and_leaves(fragment.into_leaves())
    }

    /// Negates every leaf of the fragment and appends them with AND.
    pub fn not(self, fragment: impl IntoCondition) -> Self {
        let leaves = fragment
            .into_leaves()
            .into_iter()
            .map(Condition::negated)
            .collect();
        self.and_leaves(leaves)
    }

    /// `(accumulated) OR (fragment)`: the whole tree built so far becomes the left side.
    pub fn or(mut self, fragment: impl IntoCondition) -> Self {
        let Some(fragment) = Condition::all(fragment.into_leaves()) else {
            log::warn!("Ignoring an empty OR fragment on `{}`", self.metadata.name);
            return self;
        };
        self.plan.condition = Some(match self.plan.condition.take() {
            Some(tree) => tree.or(fragment),
            None => fragment,
        });
        self
    }

    /// Projected columns or expressions, for example `level` or `count(*) AS total`.
    pub fn select<C: Into<Cow<'static, str>>>(
        mut self,
        columns: impl IntoIterator<Item = C>,
    ) -> Self {
        self.plan.columns.extend(cows(columns));
        self
    }

    /// `SELECT DISTINCT`, optionally projecting the given columns.
    pub fn distinct<C: Into<Cow<'static, str>>>(
        mut self,
        columns: impl IntoIterator<Item = C>,
    ) -> Self {
        self.plan.distinct = true;
        self.plan.columns.extend(cows(columns));
        self
    }

    /// Join fragment, for example `LEFT JOIN log_details ON log_details.log_id = logs.id`.
    pub fn join(mut self, fragment: impl Into<Cow<'static, str>>) -> Self {
        self.plan.joins.push(fragment.into());
        self
    }

    pub fn group<C: Into<Cow<'static, str>>>(
        mut self,
        columns: impl IntoIterator<Item = C>,
    ) -> Self {
        self.plan.group_by.extend(cows(columns));
        self
    }

    /// Trusted expression over groups, appended with AND to previous `having` calls.
    pub fn having<A: Into<Value>>(
        mut self,
        expression: impl Into<Cow<'static, str>>,
        args: impl IntoIterator<Item = A>,
    ) -> Self {
        let leaf = Condition::raw(expression, args.into_iter().map(Into::into).collect());
        self.plan.having = Condition::and_opt(self.plan.having.take(), leaf);
        self
    }

    /// Order fragment, for example `level DESC` or `level DESC, id`.
    pub fn order(mut self, fragment: impl Into<Cow<'static, str>>) -> Self {
        self.plan.order_by.push(fragment.into());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.plan.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.plan.offset = Some(offset);
        self
    }

    pub fn lock(mut self, lock: Locking) -> Self {
        self.plan.lock = lock;
        self
    }

    pub fn returning<C: Into<Cow<'static, str>>>(
        mut self,
        columns: impl IntoIterator<Item = C>,
    ) -> Self {
        self.plan.returning.extend(cows(columns));
        self
    }

    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.plan.on_conflict = on_conflict;
        self
    }

    /// Loads the association `name` together with the records, in one extra query.
    pub fn preload(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.preload.push(name.into());
        self
    }

    fn qualified_primary_key(&self) -> String {
        format!("{}.{}", self.metadata.table, self.metadata.primary_key().name)
    }

    /// Every record matching the query, with the requested associations loaded.
    ///
    /// With a preload, a projection that leaves out the primary key gets it added.
    pub async fn find<X: Executor>(self, executor: &mut X) -> Result<Vec<E>> {
        let key = self.qualified_primary_key();
        let Query {
            registry,
            metadata,
            mut plan,
            preload: associations,
            ..
        } = self;
        if !associations.is_empty() && !plan.columns.is_empty() {
            let name = metadata.primary_key().name;
            let projected = plan.columns.iter().any(|c| {
                *c == name || *c == key || *c == "*" || c.ends_with(".*")
            });
            if !projected {
                // Children are matched on the parent key
                plan.columns.push(key.into());
            }
        }
        let rows = executor.fetch(plan).try_collect::<Vec<_>>().await?;
        let mut records = rows
            .into_iter()
            .map(E::from_row)
            .collect::<Result<Vec<_>>>()?;
        preload::load(registry, &metadata, executor, &mut records, &associations).await?;
        Ok(records)
    }

    /// First record ordered by primary key.
    pub async fn first<X: Executor>(mut self, executor: &mut X) -> Lookup<E> {
        let key = self.qualified_primary_key();
        self.plan.order_by.push(key.into());
        self.take(executor).await
    }

    /// Last record ordered by primary key.
    pub async fn last<X: Executor>(mut self, executor: &mut X) -> Lookup<E> {
        let key = self.qualified_primary_key();
        self.plan.order_by.push(format!("{key} DESC").into());
        self.take(executor).await
    }

    /// One record, in no particular order.
    pub async fn take<X: Executor>(mut self, executor: &mut X) -> Lookup<E> {
        self.plan.limit = Some(1);
        self.find(executor).await.map(|mut v| v.pop()).into()
    }

    /// Number of matching rows, or of groups for a grouped query.
    pub async fn count<X: Executor>(self, executor: &mut X) -> Result<u64> {
        let mut plan = self.plan;
        if !plan.group_by.is_empty() || plan.distinct {
            let rows = executor.fetch(plan).try_collect::<Vec<_>>().await?;
            return Ok(rows.len() as u64);
        }
        plan.columns = vec!["count(*)".into()];
        plan.order_by.clear();
        plan.limit = None;
        plan.offset = None;
        let rows = executor.fetch(plan).try_collect::<Vec<_>>().await?;
        Ok(rows
            .first()
            .and_then(|row| row.values().first())
            .and_then(Value::as_i128)
            .unwrap_or_default() as u64)
    }

    /// The raw rows of the query, for projections that do not map onto `E`.
    pub async fn rows<X: Executor>(self, executor: &mut X) -> Result<Vec<RowLabeled>> {
        executor.fetch(self.plan).try_collect().await
    }
}
