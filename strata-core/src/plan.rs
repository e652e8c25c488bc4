use crate::{Condition, Value};
use std::borrow::Cow;

/// Row locking requested by a read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Locking {
    #[default]
    None,
    ForUpdate,
}

/// What an insert does when it collides with an existing key.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum OnConflict {
    /// The collision is reported as [`crate::Error::Conflict`].
    #[default]
    None,
    /// Overwrite every non key column of the existing row.
    UpdateAll,
    /// Keep the existing row.
    DoNothing,
    /// Overwrite only the listed columns.
    UpdateColumns(Vec<Cow<'static, str>>),
}

/// Everything accumulated by a query before a terminal runs it.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct StatementPlan {
    pub table: &'static str,
    pub condition: Option<Condition>,
    /// Projected columns or expressions, empty means every column.
    pub columns: Vec<Cow<'static, str>>,
    pub distinct: bool,
    /// Join fragments, for example `LEFT JOIN details ON details.log_id = logs.id`.
    pub joins: Vec<Cow<'static, str>>,
    pub group_by: Vec<Cow<'static, str>>,
    pub having: Option<Condition>,
    /// Order fragments, for example `level DESC`.
    pub order_by: Vec<Cow<'static, str>>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub lock: Locking,
    pub returning: Vec<Cow<'static, str>>,
    pub on_conflict: OnConflict,
}

impl StatementPlan {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            ..Default::default()
        }
    }
}

/// One multi row INSERT.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct InsertPlan {
    pub table: &'static str,
    pub columns: Vec<&'static str>,
    /// One entry per record, aligned with `columns`.
    pub rows: Vec<Vec<Value>>,
    pub on_conflict: OnConflict,
    /// Columns identifying a collision, the primary key by default.
    pub conflict_target: Vec<&'static str>,
    pub returning: Vec<Cow<'static, str>>,
}

/// Value assigned to a column by an UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Literal(Value),
    /// Trusted expression evaluated by the backend, for example `level + ?`. Never
    /// build it from user input.
    Expression {
        template: Cow<'static, str>,
        args: Vec<Value>,
    },
}

impl From<Value> for Assignment {
    fn from(value: Value) -> Self {
        Assignment::Literal(value)
    }
}

/// Shorthand for an [`Assignment::Expression`].
pub fn expr<A: Into<Value>>(
    template: impl Into<Cow<'static, str>>,
    args: impl IntoIterator<Item = A>,
) -> Assignment {
    Assignment::Expression {
        template: template.into(),
        args: args.into_iter().map(Into::into).collect(),
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdatePlan {
    pub table: &'static str,
    pub assignments: Vec<(Cow<'static, str>, Assignment)>,
    pub condition: Option<Condition>,
    pub returning: Vec<Cow<'static, str>>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct DeletePlan {
    pub table: &'static str,
    pub condition: Option<Condition>,
    pub returning: Vec<Cow<'static, str>>,
}

/// Abstract statement handed to an [`crate::Executor`].
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(StatementPlan),
    Insert(InsertPlan),
    Update(UpdatePlan),
    Delete(DeletePlan),
}

impl Statement {
    pub fn table(&self) -> &'static str {
        match self {
            Statement::Select(v) => v.table,
            Statement::Insert(v) => v.table,
            Statement::Update(v) => v.table,
            Statement::Delete(v) => v.table,
        }
    }
}

impl From<StatementPlan> for Statement {
    fn from(value: StatementPlan) -> Self {
        Statement::Select(value)
    }
}

impl From<InsertPlan> for Statement {
    fn from(value: InsertPlan) -> Self {
        Statement::Insert(value)
    }
}

impl From<UpdatePlan> for Statement {
    fn from(value: UpdatePlan) -> Self {
        Statement::Update(value)
    }
}

impl From<DeletePlan> for Statement {
    fn from(value: DeletePlan) -> Self {
        Statement::Delete(value)
    }
}
