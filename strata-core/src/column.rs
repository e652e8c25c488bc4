use crate::Value;

/// Description of one persisted column.
#[derive(Debug, Clone, Default)]
pub struct ColumnDef {
    /// Column name as stored by the backend.
    pub name: &'static str,
    /// Type prototype: a payload-less [`Value`] such as `Value::Int64(None)`.
    pub value: Value,
    pub nullable: bool,
    pub primary_key: bool,
    /// The backend generates the value when the column is omitted from an insert.
    pub auto_increment: bool,
    pub unique: bool,
}

impl ColumnDef {
    pub fn name(&self) -> &'static str {
        self.name
    }
}
