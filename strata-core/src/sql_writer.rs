use crate::{
    Assignment, Condition, DeletePlan, InsertPlan, Locking, OnConflict, Operator, Statement,
    StatementPlan, UpdatePlan, Value, is_identifier, possibly_parenthesized, separated_by,
};
use std::fmt::{self, Display, Write};

/// Renders abstract statements as SQL text.
///
/// Backends use it to log what they run. Values are inlined as literals, strings only get
/// their single quotes doubled: the output is meant for humans, not for a server.
pub trait SqlWriter {
    fn write_escaped(&self, out: &mut String, value: &str, search: char, replace: &str) {
        let mut position = 0;
        for (i, c) in value.char_indices() {
            if c == search {
                out.push_str(&value[position..i]);
                out.push_str(replace);
                position = i + c.len_utf8();
            }
        }
        out.push_str(&value[position..]);
    }

    fn write_identifier_quoted(&self, out: &mut String, value: &str) {
        out.push('"');
        self.write_escaped(out, value, '"', r#""""#);
        out.push('"');
    }

    /// Quotes bare identifiers, leaves qualified names and expressions untouched.
    fn write_identifier(&self, out: &mut String, value: &str) {
        if is_identifier(value) {
            self.write_identifier_quoted(out, value);
        } else {
            out.push_str(value);
        }
    }

    fn write_value(&self, out: &mut String, value: &Value) {
        let _ = write!(out, "{value}");
    }

    /// Writes a trusted template, replacing each `?` outside of string literals with the
    /// next argument. Markers without an argument are left as they are.
    fn write_template(&self, out: &mut String, template: &str, args: &[Value]) {
        let mut args = args.iter();
        let mut quoted = false;
        for c in template.chars() {
            match c {
                '\'' => {
                    quoted = !quoted;
                    out.push(c);
                }
                '?' if !quoted => match args.next() {
                    Some(v) => self.write_value(out, v),
                    None => out.push(c),
                },
                _ => out.push(c),
            }
        }
    }

    fn write_operator(&self, out: &mut String, operator: Operator) {
        out.push_str(match operator {
            Operator::Eq => " = ",
            Operator::Ne => " <> ",
            Operator::In => " IN ",
            Operator::NotIn => " NOT IN ",
            Operator::IsNull => " IS NULL",
            Operator::IsNotNull => " IS NOT NULL",
        });
    }

    fn write_leaf(&self, out: &mut String, column: &str, operator: Operator, values: &[Value]) {
        self.write_identifier(out, column);
        self.write_operator(out, operator);
        match operator {
            Operator::Eq | Operator::Ne => match values.first() {
                Some(v) => self.write_value(out, v),
                None => out.push_str("NULL"),
            },
            Operator::In | Operator::NotIn => {
                out.push('(');
                if values.is_empty() {
                    out.push_str("NULL");
                }
                separated_by(out, values, |out, v| self.write_value(out, v), ", ");
                out.push(')');
            }
            Operator::IsNull | Operator::IsNotNull => {}
        }
    }

    /// `OR` nested in `AND` and anything under `NOT` gets parenthesized.
    fn write_condition(&self, out: &mut String, condition: &Condition, nested: bool) {
        match condition {
            Condition::Leaf {
                column,
                operator,
                values,
            } => self.write_leaf(out, column, *operator, values),
            Condition::And(l, r) => {
                self.write_condition(out, l, true);
                out.push_str(" AND ");
                self.write_condition(out, r, true);
            }
            Condition::Or(l, r) => {
                possibly_parenthesized!(out, nested, {
                    self.write_condition(out, l, false);
                    out.push_str(" OR ");
                    self.write_condition(out, r, false);
                })
            }
            Condition::Not(c) => match c.as_ref() {
                Condition::Leaf {
                    column,
                    operator,
                    values,
                } => self.write_leaf(out, column, operator.negate(), values),
                c => {
                    out.push_str("NOT (");
                    self.write_condition(out, c, false);
                    out.push(')');
                }
            },
            Condition::Raw { expression, args } => {
                let compound = condition_is_compound(expression);
                possibly_parenthesized!(
                    out,
                    nested && compound,
                    self.write_template(out, expression, args)
                )
            }
        }
    }

    fn write_where(&self, out: &mut String, condition: &Option<Condition>) {
        if let Some(condition) = condition {
            out.push_str("\nWHERE ");
            self.write_condition(out, condition, false);
        }
    }

    fn write_returning(&self, out: &mut String, columns: &[impl AsRef<str>]) {
        if columns.is_empty() {
            return;
        }
        out.push_str("\nRETURNING ");
        separated_by(
            out,
            columns,
            |out, v| self.write_identifier(out, v.as_ref()),
            ", ",
        );
    }

    fn write_select(&self, out: &mut String, plan: &StatementPlan) {
        out.push_str("SELECT ");
        if plan.distinct {
            out.push_str("DISTINCT ");
        }
        if plan.columns.is_empty() {
            out.push('*');
        }
        separated_by(
            out,
            &plan.columns,
            |out, v| self.write_identifier(out, v),
            ", ",
        );
        out.push_str("\nFROM ");
        self.write_identifier(out, plan.table);
        for join in &plan.joins {
            out.push('\n');
            out.push_str(join);
        }
        self.write_where(out, &plan.condition);
        if !plan.group_by.is_empty() {
            out.push_str("\nGROUP BY ");
            separated_by(
                out,
                &plan.group_by,
                |out, v| self.write_identifier(out, v),
                ", ",
            );
        }
        if let Some(having) = &plan.having {
            out.push_str("\nHAVING ");
            self.write_condition(out, having, false);
        }
        if !plan.order_by.is_empty() {
            out.push_str("\nORDER BY ");
            separated_by(out, &plan.order_by, |out, v| out.push_str(v), ", ");
        }
        if let Some(limit) = plan.limit {
            let _ = write!(out, "\nLIMIT {limit}");
        }
        if let Some(offset) = plan.offset {
            let _ = write!(out, "\nOFFSET {offset}");
        }
        if plan.lock == Locking::ForUpdate {
            out.push_str("\nFOR UPDATE");
        }
        out.push(';');
    }

    fn write_insert(&self, out: &mut String, plan: &InsertPlan) {
        out.push_str("INSERT INTO ");
        self.write_identifier(out, plan.table);
        out.push_str(" (");
        separated_by(
            out,
            &plan.columns,
            |out, v| self.write_identifier(out, v),
            ", ",
        );
        out.push_str(") VALUES\n");
        separated_by(
            out,
            &plan.rows,
            |out, row| {
                out.push('(');
                separated_by(out, row, |out, v| self.write_value(out, v), ", ");
                out.push(')');
            },
            ",\n",
        );
        self.write_on_conflict(out, plan);
        self.write_returning(out, &plan.returning);
        out.push(';');
    }

    fn write_on_conflict(&self, out: &mut String, plan: &InsertPlan) {
        let columns = match &plan.on_conflict {
            OnConflict::None => return,
            OnConflict::DoNothing => None,
            OnConflict::UpdateAll => Some(
                plan.columns
                    .iter()
                    .filter(|c| !plan.conflict_target.contains(*c))
                    .copied()
                    .collect::<Vec<_>>(),
            ),
            OnConflict::UpdateColumns(columns) => {
                Some(columns.iter().map(|v| v.as_ref()).collect::<Vec<_>>())
            }
        };
        out.push_str("\nON CONFLICT (");
        separated_by(
            out,
            &plan.conflict_target,
            |out, v| self.write_identifier(out, v),
            ", ",
        );
        out.push(')');
        match columns {
            Some(columns) if !columns.is_empty() => {
                out.push_str(" DO UPDATE SET\n");
                separated_by(
                    out,
                    columns,
                    |out, v| {
                        self.write_identifier(out, v);
                        out.push_str(" = EXCLUDED.");
                        self.write_identifier(out, v);
                    },
                    ",\n",
                );
            }
            _ => out.push_str(" DO NOTHING"),
        }
    }

    fn write_update(&self, out: &mut String, plan: &UpdatePlan) {
        out.push_str("UPDATE ");
        self.write_identifier(out, plan.table);
        out.push_str(" SET ");
        separated_by(
            out,
            &plan.assignments,
            |out, (column, assignment)| {
                self.write_identifier(out, column);
                out.push_str(" = ");
                match assignment {
                    Assignment::Literal(v) => self.write_value(out, v),
                    Assignment::Expression { template, args } => {
                        self.write_template(out, template, args)
                    }
                }
            },
            ", ",
        );
        self.write_where(out, &plan.condition);
        self.write_returning(out, &plan.returning);
        out.push(';');
    }

    fn write_delete(&self, out: &mut String, plan: &DeletePlan) {
        out.push_str("DELETE FROM ");
        self.write_identifier(out, plan.table);
        self.write_where(out, &plan.condition);
        self.write_returning(out, &plan.returning);
        out.push(';');
    }

    fn write_statement(&self, out: &mut String, statement: &Statement) {
        match statement {
            Statement::Select(v) => self.write_select(out, v),
            Statement::Insert(v) => self.write_insert(out, v),
            Statement::Update(v) => self.write_update(out, v),
            Statement::Delete(v) => self.write_delete(out, v),
        }
    }
}

/// Top level `AND`/`OR` outside of parentheses and quotes.
fn condition_is_compound(expression: &str) -> bool {
    let mut depth = 0i32;
    let mut quoted = false;
    let mut word = String::new();
    for c in expression.chars().chain(std::iter::once(' ')) {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth -= 1,
            _ => {}
        }
        if c.is_ascii_alphabetic() && !quoted {
            word.push(c.to_ascii_uppercase());
            continue;
        }
        if depth == 0 && (word == "AND" || word == "OR") {
            return true;
        }
        word.clear();
    }
    false
}

#[derive(Default, Clone, Copy)]
pub struct GenericSqlWriter;
impl GenericSqlWriter {
    pub fn new() -> Self {
        Self {}
    }
}
impl SqlWriter for GenericSqlWriter {}

impl Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        GenericSqlWriter.write_statement(&mut out, self);
        f.write_str(&out)
    }
}
