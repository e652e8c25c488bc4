use std::borrow::Cow;

/// Every failure a strata operation can report.
///
/// Callers branch on the variant (or on the `is_*` predicates), never on the message:
/// "no row matched" is [`Error::NotFound`] and is distinct from a real fault.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The entity description is unusable (missing or ambiguous primary key, duplicate
    /// columns, unknown association). Fatal for that entity type.
    #[error("Schema error: {0}")]
    Schema(Cow<'static, str>),
    /// A singular fetch matched no row.
    #[error("Record not found")]
    NotFound,
    /// Unique or primary key collision while inserting without a conflict resolution mode.
    #[error("Conflict on table `{table}`: {detail}")]
    Conflict { table: String, detail: String },
    /// A delete had neither a condition nor a primary key to restrict it.
    #[error("Refusing to delete from `{table}` without a condition or a primary key")]
    UnsafeDelete { table: String },
    /// An update had no condition to restrict it.
    #[error("Refusing to update `{table}` without a condition")]
    UnsafeUpdate { table: String },
    /// The statement is structurally invalid (for example a placeholder count mismatch).
    #[error("Invalid statement: {0}")]
    InvalidStatement(Cow<'static, str>),
    /// A value could not be converted to the requested Rust type.
    #[error("Conversion error: {0}")]
    Conversion(Cow<'static, str>),
    /// A nested unit of work asked for its enclosing transaction to be rolled back.
    #[error("Transaction rolled back: {0}")]
    RolledBack(String),
    /// A chunked insert failed after some chunks were already applied.
    #[error("Batch insert stopped after {applied} records: {source}")]
    PartialBatch {
        applied: usize,
        #[source]
        source: Box<Error>,
    },
    /// Opaque fault from the storage collaborator, surfaced verbatim.
    #[error(transparent)]
    Executor(#[from] anyhow::Error),
}

impl Error {
    pub fn schema(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Schema(message.into())
    }
    pub fn conversion(message: impl Into<Cow<'static, str>>) -> Self {
        Error::Conversion(message.into())
    }
    pub fn invalid(message: impl Into<Cow<'static, str>>) -> Self {
        Error::InvalidStatement(message.into())
    }
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
    /// True for a collision, also when it is the cause of a partial batch.
    pub fn is_conflict(&self) -> bool {
        match self {
            Error::Conflict { .. } => true,
            Error::PartialBatch { source, .. } => source.is_conflict(),
            _ => false,
        }
    }
    pub fn is_unsafe_delete(&self) -> bool {
        matches!(self, Error::UnsafeDelete { .. })
    }
    pub fn is_unsafe_update(&self) -> bool {
        matches!(self, Error::UnsafeUpdate { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
