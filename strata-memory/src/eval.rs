use crate::{
    database::Database,
    parse::{
        BinaryOp, Expr, JoinKind, Projection, parse_expression, parse_expressions, parse_join,
        parse_ordering, parse_projection,
    },
};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use std::{
    cmp::Ordering,
    collections::{HashMap, HashSet},
    slice,
    sync::Arc,
};
use strata_core::{
    Condition, Error, Operator, Result, RowLabeled, StatementPlan, Value, separated_by,
};

/// `(qualifier, column)` of every value in a [`Scope`].
pub(crate) type Labels = Arc<[(String, String)]>;

/// One source row: the values of the base table followed by those of the joined tables.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    pub(crate) labels: Labels,
    pub(crate) values: Vec<Value>,
}

impl Scope {
    fn lookup(&self, table: Option<&str>, name: &str) -> Option<&Value> {
        self.labels
            .iter()
            .position(|(t, c)| c == name && table.is_none_or(|table| t == table))
            .map(|i| &self.values[i])
    }
}

/// What an expression can see while it is evaluated.
pub(crate) struct Context<'a> {
    /// Rows aggregates run over, the first one answers plain column references.
    rows: &'a [Scope],
    /// Projected labels and values, visible to HAVING and ORDER BY.
    outputs: Option<(&'a [String], &'a [Value])>,
}

impl<'a> Context<'a> {
    pub(crate) fn row(scope: &'a Scope) -> Self {
        Self {
            rows: slice::from_ref(scope),
            outputs: None,
        }
    }

    fn column(&self, table: Option<&str>, name: &str) -> Result<Value> {
        if table.is_none()
            && let Some((labels, values)) = self.outputs
            && let Some(i) = labels.iter().position(|v| v == name)
        {
            return Ok(values[i].clone());
        }
        let Some(first) = self.rows.first() else {
            return Ok(Value::Null);
        };
        first.lookup(table, name).cloned().ok_or_else(|| {
            Error::invalid(match table {
                Some(table) => format!("Unknown column `{table}.{name}`"),
                None => format!("Unknown column `{name}`"),
            })
        })
    }
}

/// Only a true value lets a row through, `NULL` does not.
pub(crate) fn passes(value: &Value) -> bool {
    truth(value) == Some(true)
}

fn truth(value: &Value) -> Option<bool> {
    match value {
        Value::Boolean(v) => *v,
        v => v.as_f64().map(|v| v != 0.0),
    }
}

fn equals(left: &Value, right: &Value) -> Option<bool> {
    if left.is_null() || right.is_null() {
        return None;
    }
    Some(left.loose_eq(right))
}

fn is_aggregate(name: &str) -> bool {
    matches!(name, "count" | "sum" | "min" | "max" | "avg")
}

fn contains_aggregate(expr: &Expr) -> bool {
    match expr {
        Expr::Function { name, args, .. } => {
            is_aggregate(name) || args.iter().any(contains_aggregate)
        }
        Expr::Not(v) | Expr::Negate(v) => contains_aggregate(v),
        Expr::Binary(l, _, r) => contains_aggregate(l) || contains_aggregate(r),
        Expr::In { expr, list, .. } => {
            contains_aggregate(expr) || list.iter().any(contains_aggregate)
        }
        Expr::Between {
            expr, low, high, ..
        } => contains_aggregate(expr) || contains_aggregate(low) || contains_aggregate(high),
        Expr::IsNull { expr, .. } => contains_aggregate(expr),
        Expr::Like { expr, pattern, .. } => contains_aggregate(expr) || contains_aggregate(pattern),
        Expr::Literal(..) | Expr::Column { .. } | Expr::Star => false,
    }
}

fn column_reference(column: &str) -> Expr {
    match column.split_once('.') {
        Some((table, name)) => Expr::Column {
            table: Some(table.into()),
            name: name.into(),
        },
        None => Expr::Column {
            table: None,
            name: column.into(),
        },
    }
}

/// Turns a condition tree into an expression, parsing the raw fragments once.
pub(crate) fn compile(condition: &Condition) -> Result<Expr> {
    Ok(match condition {
        Condition::Leaf {
            column,
            operator,
            values,
        } => {
            let column = Box::new(column_reference(column));
            let first = || {
                values.first().cloned().map(Expr::Literal).ok_or_else(|| {
                    Error::invalid(format!("Comparison on `{column:?}` without a value"))
                })
            };
            match operator {
                Operator::Eq => Expr::Binary(column.clone(), BinaryOp::Eq, first()?.into()),
                Operator::Ne => Expr::Binary(column.clone(), BinaryOp::Ne, first()?.into()),
                Operator::In | Operator::NotIn => Expr::In {
                    expr: column,
                    list: values.iter().cloned().map(Expr::Literal).collect(),
                    negated: *operator == Operator::NotIn,
                },
                Operator::IsNull | Operator::IsNotNull => Expr::IsNull {
                    expr: column,
                    negated: *operator == Operator::IsNotNull,
                },
            }
        }
        Condition::And(l, r) => Expr::Binary(compile(l)?.into(), BinaryOp::And, compile(r)?.into()),
        Condition::Or(l, r) => Expr::Binary(compile(l)?.into(), BinaryOp::Or, compile(r)?.into()),
        Condition::Not(v) => Expr::Not(compile(v)?.into()),
        Condition::Raw { expression, args } => parse_expression(expression, args.clone())?,
    })
}

pub(crate) fn eval(expr: &Expr, context: &Context) -> Result<Value> {
    Ok(match expr {
        Expr::Literal(v) => v.clone(),
        Expr::Column { table, name } => context.column(table.as_deref(), name)?,
        Expr::Star => return Err(Error::invalid("`*` is only allowed in count(*)")),
        Expr::Not(v) => Value::Boolean(truth(&eval(v, context)?).map(|v| !v)),
        Expr::Negate(v) => {
            arithmetic(Value::Int64(Some(0)), BinaryOp::Sub, eval(v, context)?)?
        }
        Expr::Binary(l, op, r) => {
            let left = eval(l, context)?;
            match op {
                BinaryOp::And => {
                    let left = truth(&left);
                    if left == Some(false) {
                        return Ok(Value::Boolean(Some(false)));
                    }
                    match (left, truth(&eval(r, context)?)) {
                        (_, Some(false)) => Value::Boolean(Some(false)),
                        (Some(true), Some(true)) => Value::Boolean(Some(true)),
                        _ => Value::Boolean(None),
                    }
                }
                BinaryOp::Or => {
                    let left = truth(&left);
                    if left == Some(true) {
                        return Ok(Value::Boolean(Some(true)));
                    }
                    match (left, truth(&eval(r, context)?)) {
                        (_, Some(true)) => Value::Boolean(Some(true)),
                        (Some(false), Some(false)) => Value::Boolean(Some(false)),
                        _ => Value::Boolean(None),
                    }
                }
                BinaryOp::Eq => Value::Boolean(equals(&left, &eval(r, context)?)),
                BinaryOp::Ne => Value::Boolean(equals(&left, &eval(r, context)?).map(|v| !v)),
                BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                    let right = eval(r, context)?;
                    Value::Boolean(left.compare(&right).map(|ordering| match op {
                        BinaryOp::Lt => ordering.is_lt(),
                        BinaryOp::Le => ordering.is_le(),
                        BinaryOp::Gt => ordering.is_gt(),
                        _ => ordering.is_ge(),
                    }))
                }
                BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                    arithmetic(left, *op, eval(r, context)?)?
                }
            }
        }
        Expr::In {
            expr,
            list,
            negated,
        } => {
            let value = eval(expr, context)?;
            let mut result = Some(false);
            if !list.is_empty() {
                if value.is_null() {
                    result = None;
                } else {
                    for item in list {
                        if value.loose_eq(&eval(item, context)?) {
                            result = Some(true);
                            break;
                        }
                    }
                }
            }
            Value::Boolean(result.map(|v| v != *negated))
        }
        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let value = eval(expr, context)?;
            let low = value.compare(&eval(low, context)?);
            let high = value.compare(&eval(high, context)?);
            Value::Boolean(match (low, high) {
                (Some(low), Some(high)) => Some((low.is_ge() && high.is_le()) != *negated),
                _ => None,
            })
        }
        Expr::IsNull { expr, negated } => {
            Value::Boolean(Some(eval(expr, context)?.is_null() != *negated))
        }
        Expr::Like {
            expr,
            pattern,
            negated,
        } => {
            let value = eval(expr, context)?;
            let pattern = eval(pattern, context)?;
            Value::Boolean(match (value.as_str(), pattern.as_str()) {
                (Some(value), Some(pattern)) => {
                    let value = value.chars().collect::<Vec<_>>();
                    let pattern = pattern.chars().collect::<Vec<_>>();
                    Some(like(&value, &pattern) != *negated)
                }
                _ => None,
            })
        }
        Expr::Function {
            name,
            args,
            distinct,
        } => function(name, args, *distinct, context)?,
    })
}

/// `%` matches any run of characters, `_` exactly one.
///
/// On a mismatch only the latest `%` is retried one character further, so the cost stays
/// within `value.len() * pattern.len()`.
fn like(value: &[char], pattern: &[char]) -> bool {
    let (mut v, mut p) = (0, 0);
    // Position of the latest `%` and of the value character it resumes from
    let mut retry = None;
    while v < value.len() {
        match pattern.get(p) {
            Some('%') => {
                retry = Some((p, v));
                p += 1;
            }
            Some(c) if *c == '_' || *c == value[v] => {
                v += 1;
                p += 1;
            }
            _ => match retry {
                Some((star, resume)) => {
                    retry = Some((star, resume + 1));
                    p = star + 1;
                    v = resume + 1;
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

fn decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Decimal(v) => *v,
        v => v
            .as_i128()
            .and_then(Decimal::from_i128)
            .or_else(|| v.as_f64().and_then(Decimal::from_f64)),
    }
}

fn arithmetic(left: Value, op: BinaryOp, right: Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let overflow = || Error::invalid(format!("Overflow computing {left} {op:?} {right}"));
    if matches!(op, BinaryOp::Div) && right.as_f64() == Some(0.0) {
        return Err(Error::invalid(format!("Division by zero: {left} / {right}")));
    }
    if let (Some(l), Some(r)) = (left.as_i128(), right.as_i128()) {
        let result = match op {
            BinaryOp::Add => l.checked_add(r),
            BinaryOp::Sub => l.checked_sub(r),
            BinaryOp::Mul => l.checked_mul(r),
            _ => l.checked_div(r),
        };
        let result = result.and_then(|v| i64::try_from(v).ok()).ok_or_else(overflow)?;
        return Ok(Value::Int64(Some(result)));
    }
    if matches!(left, Value::Decimal(..)) || matches!(right, Value::Decimal(..)) {
        if let (Some(l), Some(r)) = (decimal(&left), decimal(&right)) {
            let result = match op {
                BinaryOp::Add => l.checked_add(r),
                BinaryOp::Sub => l.checked_sub(r),
                BinaryOp::Mul => l.checked_mul(r),
                _ => l.checked_div(r),
            };
            return Ok(Value::Decimal(Some(result.ok_or_else(overflow)?)));
        }
    }
    if let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) {
        return Ok(Value::Float64(Some(match op {
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l * r,
            _ => l / r,
        })));
    }
    Err(Error::invalid(format!(
        "Can not apply {op:?} to {left} and {right}"
    )))
}

fn function(name: &str, args: &[Expr], distinct: bool, context: &Context) -> Result<Value> {
    let argument = |i: usize| {
        args.get(i)
            .ok_or_else(|| Error::invalid(format!("Missing argument {} of `{name}`", i + 1)))
    };
    if is_aggregate(name) {
        let arg = argument(0)?;
        if matches!(arg, Expr::Star) {
            return if name == "count" {
                Ok(Value::Int64(Some(context.rows.len() as _)))
            } else {
                Err(Error::invalid(format!("`{name}(*)` is not supported")))
            };
        }
        let mut values = Vec::with_capacity(context.rows.len());
        let mut seen = HashSet::new();
        for row in context.rows {
            let value = eval(arg, &Context::row(row))?;
            if !value.is_null() && (!distinct || seen.insert(value.to_string())) {
                values.push(value);
            }
        }
        return Ok(match name {
            "count" => Value::Int64(Some(values.len() as _)),
            "sum" => {
                let mut sum = Value::Null;
                for v in values {
                    sum = if sum.is_null() {
                        v
                    } else {
                        arithmetic(sum, BinaryOp::Add, v)?
                    };
                }
                sum
            }
            "avg" => match values.len() {
                0 => Value::Float64(None),
                n => Value::Float64(Some(
                    values.iter().filter_map(Value::as_f64).sum::<f64>() / n as f64,
                )),
            },
            _ => {
                let wanted = if name == "min" {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                values
                    .into_iter()
                    .reduce(|best, v| match v.compare(&best) {
                        Some(ordering) if ordering == wanted => v,
                        _ => best,
                    })
                    .unwrap_or(Value::Null)
            }
        });
    }
    let value = eval(argument(0)?, context)?;
    Ok(match name {
        "lower" => Value::Varchar(value.as_str().map(str::to_lowercase)),
        "upper" => Value::Varchar(value.as_str().map(str::to_uppercase)),
        "length" => Value::Int64(value.as_str().map(|v| v.chars().count() as _)),
        "abs" => {
            if value.compare(&Value::Int64(Some(0))).is_some_and(Ordering::is_lt) {
                arithmetic(Value::Int64(Some(0)), BinaryOp::Sub, value)?
            } else {
                value
            }
        }
        "coalesce" => {
            if !value.is_null() {
                return Ok(value);
            }
            for arg in &args[1..] {
                let value = eval(arg, context)?;
                if !value.is_null() {
                    return Ok(value);
                }
            }
            Value::Null
        }
        _ => return Err(Error::invalid(format!("Unknown function `{name}`"))),
    })
}

/// Runs a read against `database`.
///
/// Order of evaluation: joins, WHERE, grouping, projection, HAVING, DISTINCT, ORDER BY,
/// OFFSET, LIMIT.
pub(crate) fn select(database: &Database, plan: &StatementPlan) -> Result<Vec<RowLabeled>> {
    let table = database.table(plan.table)?;
    let mut labels = table.labels(plan.table);
    let mut scopes = table
        .rows
        .iter()
        .map(|row| Scope {
            labels: labels.clone(),
            values: row.clone(),
        })
        .collect::<Vec<_>>();
    for fragment in &plan.joins {
        let join = parse_join(fragment)?;
        let other = database.table(&join.table)?;
        labels = labels
            .iter()
            .cloned()
            .chain(other.labels(&join.alias).iter().cloned())
            .collect();
        let mut joined = Vec::new();
        for scope in scopes {
            let mut matched = false;
            for row in &other.rows {
                let candidate = Scope {
                    labels: labels.clone(),
                    values: scope.values.iter().chain(row).cloned().collect(),
                };
                if passes(&eval(&join.on, &Context::row(&candidate))?) {
                    matched = true;
                    joined.push(candidate);
                }
            }
            if !matched && join.kind == JoinKind::Left {
                let mut values = scope.values;
                values.resize(labels.len(), Value::Null);
                joined.push(Scope {
                    labels: labels.clone(),
                    values,
                });
            }
        }
        scopes = joined;
    }
    if let Some(condition) = &plan.condition {
        let condition = compile(condition)?;
        let mut filtered = Vec::with_capacity(scopes.len());
        for scope in scopes {
            if passes(&eval(&condition, &Context::row(&scope))?) {
                filtered.push(scope);
            }
        }
        scopes = filtered;
    }

    let mut projection = Vec::new();
    for fragment in &plan.columns {
        projection.extend(parse_projection(fragment)?);
    }
    if projection.is_empty() {
        projection.push(Projection::All(None));
    }
    let having = plan.having.as_ref().map(compile).transpose()?;
    let aggregated = !plan.group_by.is_empty()
        || having.is_some()
        || projection
            .iter()
            .any(|p| matches!(p, Projection::Expr { expr, .. } if contains_aggregate(expr)));
    let groups = if !plan.group_by.is_empty() {
        let mut keys = Vec::new();
        for fragment in &plan.group_by {
            keys.extend(parse_expressions(fragment)?);
        }
        let mut index = HashMap::new();
        let mut groups: Vec<Vec<Scope>> = Vec::new();
        for scope in scopes {
            let mut key = String::new();
            for expr in &keys {
                key.push_str(&eval(expr, &Context::row(&scope))?.to_string());
                key.push('\u{1f}');
            }
            let position = *index.entry(key).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[position].push(scope);
        }
        groups
    } else if aggregated {
        vec![scopes]
    } else {
        scopes.into_iter().map(|v| vec![v]).collect()
    };

    let mut names = Vec::new();
    for item in &projection {
        match item {
            Projection::All(qualifier) => names.extend(
                labels
                    .iter()
                    .filter(|(t, _)| qualifier.as_ref().is_none_or(|q| q == t))
                    .map(|(_, c)| c.clone()),
            ),
            Projection::Expr { label, .. } => names.push(label.clone()),
        }
    }
    let ordering = plan
        .order_by
        .iter()
        .map(|v| parse_ordering(v))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect::<Vec<_>>();

    let mut output = Vec::with_capacity(groups.len());
    for group in &groups {
        let context = Context {
            rows: group,
            outputs: None,
        };
        let mut values = Vec::with_capacity(names.len());
        for item in &projection {
            match item {
                Projection::All(qualifier) => {
                    for (i, (t, _)) in labels.iter().enumerate() {
                        if qualifier.as_ref().is_none_or(|q| q == t) {
                            values.push(
                                group
                                    .first()
                                    .map(|v| v.values[i].clone())
                                    .unwrap_or_default(),
                            );
                        }
                    }
                }
                Projection::Expr { expr, .. } => values.push(eval(expr, &context)?),
            }
        }
        let context = Context {
            rows: group,
            outputs: Some((names.as_slice(), values.as_slice())),
        };
        if let Some(having) = &having
            && !passes(&eval(having, &context)?)
        {
            continue;
        }
        let keys = ordering
            .iter()
            .map(|(expr, _)| eval(expr, &context))
            .collect::<Result<Vec<_>>>()?;
        output.push((keys, values));
    }
    if plan.distinct {
        let mut seen = HashSet::new();
        output.retain(|(_, values)| {
            let mut key = String::new();
            separated_by(&mut key, values, |out, v| out.push_str(&v.to_string()), "\u{1f}");
            seen.insert(key)
        });
    }
    if !ordering.is_empty() {
        output.sort_by(|(l, _), (r, _)| {
            for ((l, r), (_, descending)) in l.iter().zip(r).zip(&ordering) {
                // NULL sorts first
                let order = match (l.is_null(), r.is_null()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Less,
                    (false, true) => Ordering::Greater,
                    _ => l.compare(r).unwrap_or(Ordering::Equal),
                };
                let order = if *descending { order.reverse() } else { order };
                if order.is_ne() {
                    return order;
                }
            }
            Ordering::Equal
        });
    }
    let names: Arc<[String]> = names.into();
    Ok(output
        .into_iter()
        .skip(plan.offset.unwrap_or(0) as usize)
        .take(plan.limit.map_or(usize::MAX, |v| v as usize))
        .map(|(_, values)| RowLabeled::new(names.clone(), values.into()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope {
            labels: [
                ("logs".to_string(), "level".to_string()),
                ("logs".to_string(), "message".to_string()),
            ]
            .into(),
            values: vec![Value::UInt8(Some(3)), Value::Varchar(Some("disk full".into()))],
        }
    }

    fn check(expression: &str, args: Vec<Value>) -> Value {
        let scope = scope();
        eval(
            &parse_expression(expression, args).unwrap(),
            &Context::row(&scope),
        )
        .unwrap()
    }

    #[test]
    fn comparisons_across_widths() {
        assert!(passes(&check("level = ?", vec![Value::Int64(Some(3))])));
        assert!(passes(&check("logs.level BETWEEN 1 AND 3", vec![])));
        assert!(!passes(&check("level > 3", vec![])));
    }

    #[test]
    fn null_is_unknown() {
        assert_eq!(check("level = NULL", vec![]), Value::Boolean(None));
        assert_eq!(check("NOT (level = NULL)", vec![]), Value::Boolean(None));
        assert!(passes(&check("level = NULL OR level = 3", vec![])));
        assert!(!passes(&check("level = NULL AND level = 3", vec![])));
    }

    #[test]
    fn like_patterns() {
        assert!(passes(&check("message LIKE 'disk%'", vec![])));
        assert!(passes(&check("message LIKE '%_full'", vec![])));
        assert!(passes(&check("message NOT LIKE 'net%'", vec![])));
        assert!(!passes(&check("message LIKE 'disk'", vec![])));
        assert!(passes(&check("message LIKE '%%'", vec![])));
        assert!(passes(&check("message LIKE 'd_s% f%l'", vec![])));
    }

    #[test]
    fn like_many_wildcards() {
        let chars = |v: &str| v.chars().collect::<Vec<_>>();
        let value = chars(&"a".repeat(200));
        assert!(!like(&value, &chars("%a%a%a%a%a%a%a%a%a%a%b")));
        assert!(like(&value, &chars("%a%a%a%a%a%a%a%a%a%a%")));
        assert!(like(&chars("abcabd"), &chars("%ab_")));
        assert!(!like(&chars("abc"), &chars("_b")));
        assert!(like(&chars(""), &chars("%")));
        assert!(!like(&chars(""), &chars("_")));
    }

    #[test]
    fn arithmetic_widening() {
        assert_eq!(check("level + ?", vec![Value::Int8(Some(2))]), Value::Int64(Some(5)));
        assert_eq!(check("level / 2.0", vec![]), Value::Float64(Some(1.5)));
        let scope = scope();
        assert!(
            eval(
                &parse_expression("level / 0", vec![]).unwrap(),
                &Context::row(&scope)
            )
            .is_err()
        );
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let condition = Condition::Leaf {
            column: "level".into(),
            operator: Operator::In,
            values: vec![],
        };
        let scope = scope();
        let expr = compile(&condition).unwrap();
        assert!(!passes(&eval(&expr, &Context::row(&scope)).unwrap()));
        let expr = compile(&condition.negated()).unwrap();
        assert!(passes(&eval(&expr, &Context::row(&scope)).unwrap()));
    }

    #[test]
    fn unknown_column() {
        let scope = scope();
        let expr = parse_expression("missing = 1", vec![]).unwrap();
        assert!(matches!(
            eval(&expr, &Context::row(&scope)),
            Err(Error::InvalidStatement(..))
        ));
    }
}
