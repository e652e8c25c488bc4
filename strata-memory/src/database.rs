use crate::{
    eval::{Context, Labels, Scope, compile, eval, passes, select},
    parse::{Expr, parse_expression},
};
use anyhow::anyhow;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use std::{borrow::Cow, collections::BTreeMap};
use strata_core::{
    Assignment, ColumnDef, Condition, DeletePlan, EntityMetadata, Error, InsertPlan, OnConflict,
    QueryResult, Result, RowLabeled, RowsAffected, Statement, UpdatePlan, Value,
};

#[derive(Debug, Clone)]
pub(crate) struct Table {
    pub(crate) name: String,
    pub(crate) columns: Vec<ColumnDef>,
    pub(crate) rows: Vec<Vec<Value>>,
    primary_key: Option<usize>,
    next_id: i128,
}

impl Table {
    pub(crate) fn new(metadata: &EntityMetadata) -> Self {
        Self {
            name: metadata.table.into(),
            columns: metadata.columns.clone(),
            rows: Vec::new(),
            primary_key: metadata.columns.iter().position(|c| c.primary_key),
            next_id: 1,
        }
    }

    pub(crate) fn labels(&self, qualifier: &str) -> Labels {
        self.columns
            .iter()
            .map(|c| (qualifier.to_string(), c.name.to_string()))
            .collect()
    }

    fn position(&self, column: &str) -> Result<usize> {
        let column = column
            .strip_prefix(&self.name)
            .and_then(|v| v.strip_prefix('.'))
            .unwrap_or(column);
        self.columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| {
                Error::invalid(format!("`{column}` is not a column of `{}`", self.name))
            })
    }

    fn key(&self, row: &[Value]) -> Value {
        self.primary_key
            .map(|i| row[i].clone())
            .unwrap_or_default()
    }

    /// Index of the row, other than `skip`, equal to `row` on every column of `columns`.
    fn find(&self, row: &[Value], columns: &[usize], skip: Option<usize>) -> Option<usize> {
        if columns.is_empty() || columns.iter().any(|i| row[*i].is_null()) {
            return None;
        }
        (0..self.rows.len()).find(|i| {
            Some(*i) != skip && columns.iter().all(|c| self.rows[*i][*c].loose_eq(&row[*c]))
        })
    }

    /// Fails when `row` collides with a row other than `skip` on the primary key or on a
    /// unique column.
    fn check_unique(&self, row: &[Value], skip: Option<usize>) -> Result<()> {
        for (i, column) in self.columns.iter().enumerate() {
            if (column.primary_key || column.unique) && self.find(row, &[i], skip).is_some() {
                return Err(Error::Conflict {
                    table: self.name.clone(),
                    detail: format!("duplicate value {} for `{}`", row[i], column.name),
                });
            }
        }
        Ok(())
    }

    fn generate_key(&mut self, row: &mut [Value]) -> Result<()> {
        let Some(i) = self.primary_key else {
            return Ok(());
        };
        if row[i].is_null() && self.columns[i].auto_increment {
            row[i] = coerce(Value::Int64(Some(self.next_id as _)), &self.columns[i].value)?;
        }
        if let Some(key) = row[i].as_i128() {
            self.next_id = self.next_id.max(key + 1);
        }
        Ok(())
    }

    fn returning(&self, columns: &[Cow<'static, str>], row: &[Value]) -> Result<RowLabeled> {
        let positions = if columns.iter().any(|c| c == "*") {
            (0..self.columns.len()).collect()
        } else {
            columns
                .iter()
                .map(|c| self.position(c))
                .collect::<Result<Vec<_>>>()?
        };
        Ok(RowLabeled::new(
            positions
                .iter()
                .map(|i| self.columns[*i].name.to_string())
                .collect(),
            positions.iter().map(|i| row[*i].clone()).collect(),
        ))
    }

    fn scope(&self, labels: &Labels, row: &[Value]) -> Scope {
        Scope {
            labels: labels.clone(),
            values: row.to_vec(),
        }
    }

    /// Indexes of the rows matching `condition`, all of them when there is none.
    fn matching(&self, condition: Option<&Condition>) -> Result<Vec<usize>> {
        let Some(condition) = condition else {
            return Ok((0..self.rows.len()).collect());
        };
        let condition = compile(condition)?;
        let labels = self.labels(&self.name);
        let mut result = Vec::new();
        for (i, row) in self.rows.iter().enumerate() {
            if passes(&eval(&condition, &Context::row(&self.scope(&labels, row)))?) {
                result.push(i);
            }
        }
        Ok(result)
    }
}

/// Value of `column` for a row that does not mention it.
fn default_value(column: &ColumnDef) -> Value {
    if column.nullable || column.auto_increment {
        return column.value.clone();
    }
    let zero = match column.value {
        Value::Boolean(..) => Value::Boolean(Some(false)),
        Value::Varchar(..) => Value::Varchar(Some(String::new())),
        Value::Blob(..) => Value::Blob(Some(Box::default())),
        Value::Decimal(..) => Value::Decimal(Some(Decimal::ZERO)),
        Value::Float32(..) | Value::Float64(..) => Value::Float64(Some(0.0)),
        Value::Int8(..)
        | Value::Int16(..)
        | Value::Int32(..)
        | Value::Int64(..)
        | Value::UInt8(..)
        | Value::UInt16(..)
        | Value::UInt32(..)
        | Value::UInt64(..) => Value::Int64(Some(0)),
        _ => return column.value.clone(),
    };
    coerce(zero, &column.value).unwrap_or_else(|_| column.value.clone())
}

/// Converts `value` to the type of the column prototype. Values of unrelated types are
/// stored as they are.
pub(crate) fn coerce(value: Value, prototype: &Value) -> Result<Value> {
    if value.is_null() {
        return Ok(prototype.clone());
    }
    if value.same_type(prototype) {
        return Ok(value);
    }
    macro_rules! integer {
        ($variant:path) => {
            match value.as_i128() {
                Some(v) => $variant(Some(v.try_into().map_err(|_| {
                    Error::conversion(format!("{v} is out of range for {prototype:?}"))
                })?)),
                None => value,
            }
        };
    }
    Ok(match prototype {
        Value::Int8(..) => integer!(Value::Int8),
        Value::Int16(..) => integer!(Value::Int16),
        Value::Int32(..) => integer!(Value::Int32),
        Value::Int64(..) => integer!(Value::Int64),
        Value::UInt8(..) => integer!(Value::UInt8),
        Value::UInt16(..) => integer!(Value::UInt16),
        Value::UInt32(..) => integer!(Value::UInt32),
        Value::UInt64(..) => integer!(Value::UInt64),
        Value::Float32(..) => match value.as_f64() {
            Some(v) => Value::Float32(Some(v as _)),
            None => value,
        },
        Value::Float64(..) => match value.as_f64() {
            Some(v) => Value::Float64(Some(v)),
            None => value,
        },
        Value::Decimal(..) => match value
            .as_i128()
            .and_then(Decimal::from_i128)
            .or_else(|| value.as_f64().and_then(Decimal::from_f64))
        {
            Some(v) => Value::Decimal(Some(v)),
            None => value,
        },
        _ => value,
    })
}

/// Every table of a memory connection.
#[derive(Debug, Clone, Default)]
pub(crate) struct Database {
    tables: BTreeMap<String, Table>,
}

impl Database {
    /// Creates the table of `metadata` unless it exists. Returns true when it was created.
    pub(crate) fn create_table(&mut self, metadata: &EntityMetadata) -> bool {
        if self.tables.contains_key(metadata.table) {
            return false;
        }
        self.tables
            .insert(metadata.table.into(), Table::new(metadata));
        true
    }

    pub(crate) fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::Executor(anyhow!("Table `{name}` does not exist")))
    }

    /// Runs one statement. Writes go to a copy of the table, stored back only when the
    /// whole statement succeeded.
    pub(crate) fn execute(&mut self, statement: Statement) -> Result<Vec<QueryResult>> {
        Ok(match statement {
            Statement::Select(plan) => select(self, &plan)?
                .into_iter()
                .map(QueryResult::Row)
                .collect(),
            Statement::Insert(plan) => vec![self.insert(plan)?.into()],
            Statement::Update(plan) => vec![self.update(plan)?.into()],
            Statement::Delete(plan) => vec![self.delete(plan)?.into()],
        })
    }

    fn insert(&mut self, plan: InsertPlan) -> Result<RowsAffected> {
        let mut table = self.table(plan.table)?.clone();
        let positions = plan
            .columns
            .iter()
            .map(|c| table.position(c))
            .collect::<Result<Vec<_>>>()?;
        let target = plan
            .conflict_target
            .iter()
            .map(|c| table.position(c))
            .collect::<Result<Vec<_>>>()?;
        let overwritten = match &plan.on_conflict {
            OnConflict::UpdateAll => positions
                .iter()
                .copied()
                .filter(|i| !target.contains(i))
                .collect(),
            // A named column the insert does not carry keeps its stored value
            OnConflict::UpdateColumns(columns) => columns
                .iter()
                .map(|c| table.position(c))
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .filter(|i| positions.contains(i) && !target.contains(i))
                .collect(),
            _ => Vec::new(),
        };
        let mut result = RowsAffected::default();
        for values in plan.rows {
            if values.len() != positions.len() {
                return Err(Error::invalid(format!(
                    "Insert into `{}` has {} columns but a row with {} values",
                    table.name,
                    positions.len(),
                    values.len()
                )));
            }
            let mut row = table.columns.iter().map(default_value).collect::<Vec<_>>();
            for (i, value) in positions.iter().zip(values) {
                row[*i] = coerce(value, &table.columns[*i].value)?;
            }
            let index = match table.find(&row, &target, None) {
                Some(existing) => match plan.on_conflict {
                    OnConflict::None => {
                        return Err(Error::Conflict {
                            table: table.name.clone(),
                            detail: format!(
                                "a row with the same {} already exists",
                                plan.conflict_target.join(", ")
                            ),
                        });
                    }
                    OnConflict::DoNothing => {
                        result.generated_keys.push(table.key(&table.rows[existing]));
                        if !plan.returning.is_empty() {
                            result
                                .returning
                                .push(table.returning(&plan.returning, &table.rows[existing])?);
                        }
                        continue;
                    }
                    OnConflict::UpdateAll | OnConflict::UpdateColumns(..) => {
                        let mut updated = table.rows[existing].clone();
                        for i in &overwritten {
                            updated[*i] = row[*i].clone();
                        }
                        table.check_unique(&updated, Some(existing))?;
                        table.rows[existing] = updated;
                        existing
                    }
                },
                None => {
                    table.generate_key(&mut row)?;
                    table.check_unique(&row, None)?;
                    table.rows.push(row);
                    table.rows.len() - 1
                }
            };
            result.rows_affected += 1;
            result.generated_keys.push(table.key(&table.rows[index]));
            if !plan.returning.is_empty() {
                result
                    .returning
                    .push(table.returning(&plan.returning, &table.rows[index])?);
            }
        }
        self.tables.insert(table.name.clone(), table);
        Ok(result)
    }

    fn update(&mut self, plan: UpdatePlan) -> Result<RowsAffected> {
        let mut table = self.table(plan.table)?.clone();
        let assignments = plan
            .assignments
            .iter()
            .map(|(column, assignment)| {
                let expr = match assignment {
                    Assignment::Literal(v) => Expr::Literal(v.clone()),
                    Assignment::Expression { template, args } => {
                        parse_expression(template, args.clone())?
                    }
                };
                Ok((table.position(column)?, expr))
            })
            .collect::<Result<Vec<_>>>()?;
        let labels = table.labels(&table.name);
        let mut result = RowsAffected::default();
        for index in table.matching(plan.condition.as_ref())? {
            let scope = table.scope(&labels, &table.rows[index]);
            let context = Context::row(&scope);
            let mut updated = table.rows[index].clone();
            for (i, expr) in &assignments {
                updated[*i] = coerce(eval(expr, &context)?, &table.columns[*i].value)?;
            }
            table.check_unique(&updated, Some(index))?;
            table.rows[index] = updated;
            result.rows_affected += 1;
            if !plan.returning.is_empty() {
                result
                    .returning
                    .push(table.returning(&plan.returning, &table.rows[index])?);
            }
        }
        self.tables.insert(table.name.clone(), table);
        Ok(result)
    }

    fn delete(&mut self, plan: DeletePlan) -> Result<RowsAffected> {
        let table = self
            .tables
            .get_mut(plan.table)
            .ok_or_else(|| Error::Executor(anyhow!("Table `{}` does not exist", plan.table)))?;
        let matching = table.matching(plan.condition.as_ref())?;
        let mut result = RowsAffected {
            rows_affected: matching.len() as _,
            ..Default::default()
        };
        if !plan.returning.is_empty() {
            for index in &matching {
                result
                    .returning
                    .push(table.returning(&plan.returning, &table.rows[*index])?);
            }
        }
        let mut index = 0;
        table.rows.retain(|_| {
            let keep = !matching.contains(&index);
            index += 1;
            keep
        });
        Ok(result)
    }
}
