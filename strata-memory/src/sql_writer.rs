use strata_core::{EntityMetadata, SqlWriter, Value, separated_by};

/// Renders statements the way the memory backend logs them, with backtick quoted
/// identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemorySqlWriter {}

impl MemorySqlWriter {
    pub fn write_column_type(&self, out: &mut String, value: &Value) {
        out.push_str(match value {
            Value::Boolean(..) => "BOOLEAN",
            Value::Int8(..) => "TINYINT",
            Value::Int16(..) => "SMALLINT",
            Value::Int32(..) => "INTEGER",
            Value::Int64(..) => "BIGINT",
            Value::UInt8(..) => "UTINYINT",
            Value::UInt16(..) => "USMALLINT",
            Value::UInt32(..) => "UINTEGER",
            Value::UInt64(..) => "UBIGINT",
            Value::Float32(..) => "FLOAT",
            Value::Float64(..) => "DOUBLE",
            Value::Decimal(..) => "DECIMAL",
            Value::Varchar(..) => "VARCHAR",
            Value::Blob(..) => "BLOB",
            Value::Date(..) => "DATE",
            Value::Time(..) => "TIME",
            Value::Timestamp(..) => "TIMESTAMP",
            Value::TimestampWithTimezone(..) => "TIMESTAMPTZ",
            Value::Uuid(..) => "UUID",
            Value::List(..) => "LIST",
            Value::Null => "NULL",
        });
    }

    pub fn write_create_table(&self, out: &mut String, metadata: &EntityMetadata) {
        out.push_str("CREATE TABLE IF NOT EXISTS ");
        self.write_identifier_quoted(out, metadata.table);
        out.push_str(" (\n");
        separated_by(
            out,
            &metadata.columns,
            |out, column| {
                self.write_identifier_quoted(out, column.name);
                out.push(' ');
                self.write_column_type(out, &column.value);
                if column.primary_key {
                    out.push_str(" PRIMARY KEY");
                }
                if column.auto_increment {
                    out.push_str(" AUTOINCREMENT");
                }
                if column.unique {
                    out.push_str(" UNIQUE");
                }
                if !column.nullable && !column.primary_key {
                    out.push_str(" NOT NULL");
                }
            },
            ",\n",
        );
        out.push_str("\n);");
    }
}

impl SqlWriter for MemorySqlWriter {
    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('`');
        self.write_escaped(out, value, '`', "``");
        out.push('`');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{Condition, DeletePlan, Statement};

    #[test]
    fn backtick_identifiers() {
        let mut out = String::new();
        MemorySqlWriter {}.write_statement(
            &mut out,
            &Statement::Delete(DeletePlan {
                table: "logs",
                condition: Some(Condition::matching("level", Value::UInt8(Some(3)))),
                returning: vec![],
            }),
        );
        assert_eq!(out, "DELETE FROM `logs`\nWHERE `level` = 3;");
    }
}
