use crate::{EntityDescriptor, Passive, Result, RowLabeled, Value};

/// Presence-tagged `column -> value` mapping used at the struct to condition boundary.
///
/// Only `Passive::Set` entries turn into filter leaves.
pub type Fields = Vec<(&'static str, Passive<Value>)>;

/// Callbacks run on a record before it is written.
///
/// `#[derive(Entity)]` implements this trait with no callbacks. Add
/// `#[strata(hooks)]` to the struct to write the implementation by hand:
/// ```ignore
/// #[derive(Entity, Default)]
/// #[strata(name = "logs", hooks)]
/// struct Log {
///     #[strata(primary_key, auto_increment)]
///     id: Passive<u64>,
///     message: String,
/// }
///
/// impl Hooks for Log {
///     fn before_create(&mut self) -> Result<()> {
///         if self.message.is_empty() {
///             return Err(Error::invalid("A log needs a message"));
///         }
///         Ok(())
///     }
/// }
/// ```
///
/// An error aborts the operation before any statement reaches the executor.
pub trait Hooks {
    /// Runs before `save` and before every record of `create` or `create_in_batches`.
    fn before_save(&mut self) -> Result<()> {
        Ok(())
    }

    /// Runs after `before_save`, only when the record is about to be inserted.
    fn before_create(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A record type persisted in one table.
///
/// Usually implemented through `#[derive(Entity)]`:
/// ```ignore
/// #[derive(Entity, Default)]
/// #[strata(name = "logs")]
/// struct Log {
///     #[strata(primary_key, auto_increment)]
///     id: Passive<u64>,
///     level: u8,
///     message: String,
///     #[strata(foreign_key = "log_id")]
///     details: Association<LogDetail>,
/// }
/// ```
pub trait Entity: Hooks + Send + Sync + Sized + 'static {
    /// Unvalidated description of the table, its columns and its associations.
    fn describe() -> EntityDescriptor;

    /// Every column with its current value, in declaration order. `Passive::NotSet`
    /// fields are reported as such.
    fn row(&self) -> Fields;

    /// Builds a record from a row. Columns absent from the row take their default value.
    fn from_row(row: RowLabeled) -> Result<Self>;

    /// Current primary key value, `NULL` when not set.
    fn primary_key(&self) -> Value;

    /// Writes a key generated by the backend back into the record.
    fn set_primary_key(&mut self, value: Value) -> Result<()>;

    /// Fills the association slot `name` with the given child rows.
    fn attach(&mut self, name: &str, rows: Vec<RowLabeled>) -> Result<()>;

    /// The populated fields of the record.
    ///
    /// A field is populated when it is `Passive::Set` and its value is not the zero
    /// value of its type (see [`Value::is_zero`]). This is the single place where zero
    /// values are elided from struct based conditions.
    fn fields(&self) -> Fields {
        self.row()
            .into_iter()
            .filter(|(_, v)| matches!(v, Passive::Set(v) if !v.is_zero()))
            .collect()
    }

    /// True when the primary key holds a non zero value.
    fn has_primary_key(&self) -> bool {
        !self.primary_key().is_zero()
    }
}
