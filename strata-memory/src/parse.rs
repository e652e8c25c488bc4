use sqlparser::{
    ast::{
        self, BinaryOperator, DuplicateTreatment, FunctionArg, FunctionArgExpr,
        FunctionArguments, SelectItem, UnaryOperator,
    },
    dialect::GenericDialect,
    keywords::Keyword,
    parser::{Parser, ParserError},
    tokenizer::Token,
};
use std::{borrow::Cow, vec};
use strata_core::{Error, Result, Value};

/// Expression tree of the SQL fragments the memory backend understands.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Literal(Value),
    Column {
        table: Option<String>,
        name: String,
    },
    /// The `*` of `count(*)`.
    Star,
    Not(Box<Expr>),
    Negate(Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    In {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    Function {
        name: String,
        args: Vec<Expr>,
        distinct: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
}

/// One item of a projection list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Projection {
    /// `*` or `table.*`
    All(Option<String>),
    Expr { expr: Expr, label: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Join {
    pub(crate) kind: JoinKind,
    pub(crate) table: String,
    pub(crate) alias: String,
    pub(crate) on: Expr,
}

/// Runs `parse` over the whole of `source`, trailing tokens are an error.
fn parse_with<T>(
    source: &str,
    parse: impl FnOnce(&mut Parser<'_>) -> std::result::Result<T, ParserError>,
) -> Result<T> {
    let dialect = GenericDialect {};
    Parser::new(&dialect)
        .try_with_sql(source)
        .and_then(|mut parser| {
            let result = parse(&mut parser)?;
            parser.expect_token(&Token::EOF)?;
            Ok(result)
        })
        .map_err(|e| Error::invalid(format!("Could not parse `{source}`: {e}")))
}

/// Wraps the placeholders bound to a list in parentheses, so that `level IN ?` reads as
/// `level IN (?)`. Quoted text is left alone.
fn parenthesize_lists<'s>(source: &'s str, args: &[Value]) -> Cow<'s, str> {
    if !args.iter().any(|v| matches!(v, Value::List(..))) {
        return source.into();
    }
    let mut out = String::with_capacity(source.len() + 8);
    let mut quote = None;
    let mut index = 0;
    for c in source.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(..), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '?') => {
                let list = matches!(args.get(index), Some(Value::List(..)));
                index += 1;
                if list {
                    out.push_str("(?)");
                    continue;
                }
            }
            _ => {}
        }
        out.push(c);
    }
    out.into()
}

/// Turns `sqlparser` trees into [`Expr`], binding `?` placeholders to arguments in the
/// order they appear.
struct Lowering<'s> {
    source: &'s str,
    args: vec::IntoIter<Value>,
}

impl<'s> Lowering<'s> {
    fn new(source: &'s str, args: Vec<Value>) -> Self {
        Self {
            source,
            args: args.into_iter(),
        }
    }

    /// Every argument must have been bound.
    fn finish(mut self) -> Result<()> {
        let extra = self.args.by_ref().count();
        if extra > 0 {
            return Err(Error::invalid(format!(
                "{extra} argument(s) left over by `{}`",
                self.source
            )));
        }
        Ok(())
    }

    fn unsupported(&self, what: impl std::fmt::Display) -> Error {
        Error::invalid(format!("Unsupported `{what}` in `{}`", self.source))
    }

    fn argument(&mut self) -> Result<Value> {
        self.args.next().ok_or_else(|| {
            Error::invalid(format!("Not enough arguments for `{}`", self.source))
        })
    }

    fn boxed(&mut self, expr: ast::Expr) -> Result<Box<Expr>> {
        self.expr(expr).map(Box::new)
    }

    fn expr(&mut self, expr: ast::Expr) -> Result<Expr> {
        Ok(match expr {
            ast::Expr::Identifier(ident) => Expr::Column {
                table: None,
                name: ident.value,
            },
            ast::Expr::CompoundIdentifier(mut parts) if (1..=2).contains(&parts.len()) => {
                let name = parts.pop().map(|v| v.value).unwrap_or_default();
                Expr::Column {
                    table: parts.pop().map(|v| v.value),
                    name,
                }
            }
            ast::Expr::Value(value) => self.value(value.value)?,
            ast::Expr::Nested(inner) => self.expr(*inner)?,
            ast::Expr::UnaryOp { op, expr } => match op {
                UnaryOperator::Not => Expr::Not(self.boxed(*expr)?),
                UnaryOperator::Minus => Expr::Negate(self.boxed(*expr)?),
                UnaryOperator::Plus => self.expr(*expr)?,
                op => return Err(self.unsupported(op)),
            },
            ast::Expr::BinaryOp { left, op, right } => {
                let op = match op {
                    BinaryOperator::And => BinaryOp::And,
                    BinaryOperator::Or => BinaryOp::Or,
                    BinaryOperator::Eq => BinaryOp::Eq,
                    BinaryOperator::NotEq => BinaryOp::Ne,
                    BinaryOperator::Lt => BinaryOp::Lt,
                    BinaryOperator::LtEq => BinaryOp::Le,
                    BinaryOperator::Gt => BinaryOp::Gt,
                    BinaryOperator::GtEq => BinaryOp::Ge,
                    BinaryOperator::Plus => BinaryOp::Add,
                    BinaryOperator::Minus => BinaryOp::Sub,
                    BinaryOperator::Multiply => BinaryOp::Mul,
                    BinaryOperator::Divide => BinaryOp::Div,
                    op => return Err(self.unsupported(op)),
                };
                let left = self.boxed(*left)?;
                Expr::Binary(left, op, self.boxed(*right)?)
            }
            ast::Expr::IsNull(expr) => Expr::IsNull {
                expr: self.boxed(*expr)?,
                negated: false,
            },
            ast::Expr::IsNotNull(expr) => Expr::IsNull {
                expr: self.boxed(*expr)?,
                negated: true,
            },
            ast::Expr::InList {
                expr,
                list,
                negated,
            } => {
                let expr = self.boxed(*expr)?;
                let mut items = Vec::with_capacity(list.len());
                for item in list {
                    match self.expr(item)? {
                        Expr::Literal(Value::List(Some(values), ..)) => {
                            items.extend(values.into_iter().map(Expr::Literal))
                        }
                        Expr::Literal(Value::List(None, ..)) => {}
                        v => items.push(v),
                    }
                }
                Expr::In {
                    expr,
                    list: items,
                    negated,
                }
            }
            ast::Expr::Between {
                expr,
                negated,
                low,
                high,
            } => {
                let expr = self.boxed(*expr)?;
                let low = self.boxed(*low)?;
                Expr::Between {
                    expr,
                    low,
                    high: self.boxed(*high)?,
                    negated,
                }
            }
            ast::Expr::Like {
                negated,
                expr,
                pattern,
                ..
            } => {
                let expr = self.boxed(*expr)?;
                Expr::Like {
                    expr,
                    pattern: self.boxed(*pattern)?,
                    negated,
                }
            }
            ast::Expr::Function(function) => self.function(function)?,
            other => return Err(self.unsupported(other)),
        })
    }

    fn value(&mut self, value: ast::Value) -> Result<Expr> {
        Ok(Expr::Literal(match value {
            ast::Value::Null => Value::Null,
            ast::Value::Boolean(v) => Value::Boolean(Some(v)),
            ast::Value::Number(v, _) => return number(&v),
            ast::Value::SingleQuotedString(v)
            | ast::Value::DoubleQuotedString(v)
            | ast::Value::EscapedStringLiteral(v)
            | ast::Value::NationalStringLiteral(v) => Value::Varchar(Some(v)),
            ast::Value::Placeholder(..) => self.argument()?,
            other => return Err(self.unsupported(other)),
        }))
    }

    fn function(&mut self, function: ast::Function) -> Result<Expr> {
        let name = function.name.to_string().to_ascii_lowercase();
        if function.over.is_some() || function.filter.is_some() {
            return Err(self.unsupported(&function));
        }
        let (args, distinct) = match function.args {
            FunctionArguments::None => (Vec::new(), false),
            FunctionArguments::List(list) => (
                list.args,
                matches!(list.duplicate_treatment, Some(DuplicateTreatment::Distinct)),
            ),
            FunctionArguments::Subquery(query) => return Err(self.unsupported(query)),
        };
        let mut lowered = Vec::with_capacity(args.len());
        for arg in args {
            lowered.push(match arg {
                FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => self.expr(expr)?,
                FunctionArg::Unnamed(FunctionArgExpr::Wildcard) => Expr::Star,
                other => return Err(self.unsupported(other)),
            });
        }
        Ok(Expr::Function {
            name,
            args: lowered,
            distinct,
        })
    }
}

fn number(value: &str) -> Result<Expr> {
    let invalid = || Error::invalid(format!("Invalid number `{value}`"));
    Ok(Expr::Literal(if value.contains(['.', 'e', 'E']) {
        Value::Float64(Some(value.parse().map_err(|_| invalid())?))
    } else if let Ok(v) = value.parse::<i64>() {
        Value::Int64(Some(v))
    } else {
        Value::UInt64(Some(value.parse().map_err(|_| invalid())?))
    }))
}

pub(crate) fn parse_expression(source: &str, args: Vec<Value>) -> Result<Expr> {
    let sql = parenthesize_lists(source, &args);
    let expr = parse_with(&sql, |p| p.parse_expr())?;
    let mut lowering = Lowering::new(source, args);
    let result = lowering.expr(expr)?;
    lowering.finish()?;
    Ok(result)
}

/// Comma separated expressions, as in GROUP BY.
pub(crate) fn parse_expressions(source: &str) -> Result<Vec<Expr>> {
    let exprs = parse_with(source, |p| p.parse_comma_separated(|p| p.parse_expr()))?;
    let mut lowering = Lowering::new(source, Vec::new());
    let result = exprs
        .into_iter()
        .map(|v| lowering.expr(v))
        .collect::<Result<Vec<_>>>()?;
    lowering.finish()?;
    Ok(result)
}

/// `expr [AS alias], table.*, *`
///
/// Items without alias are labeled with their column name, or with the text of the
/// expression.
pub(crate) fn parse_projection(source: &str) -> Result<Vec<Projection>> {
    let items = parse_with(source, |p| p.parse_comma_separated(|p| p.parse_select_item()))?;
    let mut lowering = Lowering::new(source, Vec::new());
    let mut result = Vec::with_capacity(items.len());
    for item in items {
        result.push(match item {
            SelectItem::Wildcard(..) => Projection::All(None),
            item @ SelectItem::QualifiedWildcard(..) => {
                let text = item.to_string();
                Projection::All(Some(text.trim_end_matches(".*").to_string()))
            }
            SelectItem::UnnamedExpr(expr) => {
                let label = match &expr {
                    ast::Expr::Identifier(ident) => ident.value.clone(),
                    ast::Expr::CompoundIdentifier(parts) => {
                        parts.last().map(|v| v.value.clone()).unwrap_or_default()
                    }
                    expr => expr.to_string(),
                };
                Projection::Expr {
                    expr: lowering.expr(expr)?,
                    label,
                }
            }
            SelectItem::ExprWithAlias { expr, alias } => Projection::Expr {
                expr: lowering.expr(expr)?,
                label: alias.value,
            },
            #[allow(unreachable_patterns)]
            other => return Err(lowering.unsupported(other)),
        });
    }
    lowering.finish()?;
    Ok(result)
}

/// `expr [ASC|DESC], ...`, the flag is true for descending.
pub(crate) fn parse_ordering(source: &str) -> Result<Vec<(Expr, bool)>> {
    let items = parse_with(source, |p| {
        p.parse_comma_separated(|p| {
            let expr = p.parse_expr()?;
            let descending = p.parse_keyword(Keyword::DESC);
            if !descending {
                let _ = p.parse_keyword(Keyword::ASC);
            }
            Ok((expr, descending))
        })
    })?;
    let mut lowering = Lowering::new(source, Vec::new());
    let result = items
        .into_iter()
        .map(|(expr, descending)| Ok((lowering.expr(expr)?, descending)))
        .collect::<Result<Vec<_>>>()?;
    lowering.finish()?;
    Ok(result)
}

/// `[LEFT [OUTER] | INNER] JOIN table [[AS] alias] ON expr`
pub(crate) fn parse_join(source: &str) -> Result<Join> {
    let (kind, table, alias, on) = parse_with(source, |p| {
        let kind = if p.parse_keyword(Keyword::LEFT) {
            let _ = p.parse_keyword(Keyword::OUTER);
            JoinKind::Left
        } else {
            let _ = p.parse_keyword(Keyword::INNER);
            JoinKind::Inner
        };
        p.expect_keyword(Keyword::JOIN)?;
        let table = p.parse_identifier()?.value;
        let _ = p.parse_keyword(Keyword::AS);
        let alias = if p.parse_keyword(Keyword::ON) {
            table.clone()
        } else {
            let alias = p.parse_identifier()?.value;
            p.expect_keyword(Keyword::ON)?;
            alias
        };
        Ok((kind, table, alias, p.parse_expr()?))
    })?;
    let mut lowering = Lowering::new(source, Vec::new());
    let on = lowering.expr(on)?;
    lowering.finish()?;
    Ok(Join {
        kind,
        table,
        alias,
        on,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str) -> Box<Expr> {
        Expr::Column {
            table: None,
            name: name.into(),
        }
        .into()
    }

    #[test]
    fn precedence() {
        let expr = parse_expression(
            "a = ? OR b = 2 AND NOT c IS NULL",
            vec![Value::Int32(Some(1))],
        )
        .unwrap();
        let Expr::Binary(left, BinaryOp::Or, right) = expr else {
            panic!("Expected OR at the root");
        };
        assert_eq!(
            *left,
            Expr::Binary(
                column("a"),
                BinaryOp::Eq,
                Expr::Literal(Value::Int32(Some(1))).into()
            )
        );
        assert!(matches!(*right, Expr::Binary(_, BinaryOp::And, _)));
    }

    #[test]
    fn placeholders_bind_in_order() {
        let expr = parse_expression(
            "level BETWEEN ? AND ? AND message LIKE ?",
            vec![
                Value::Int32(Some(1)),
                Value::Int32(Some(4)),
                Value::Varchar(Some("disk%".into())),
            ],
        )
        .unwrap();
        let Expr::Binary(between, BinaryOp::And, like) = expr else {
            panic!("Expected AND at the root");
        };
        assert!(matches!(
            *between,
            Expr::Between { ref low, ref high, .. }
                if **low == Expr::Literal(Value::Int32(Some(1)))
                    && **high == Expr::Literal(Value::Int32(Some(4)))
        ));
        assert!(matches!(
            *like,
            Expr::Like { ref pattern, .. }
                if **pattern == Expr::Literal(Value::Varchar(Some("disk%".into())))
        ));
    }

    #[test]
    fn in_placeholder_list() {
        let list = Value::List(
            Some(vec![Value::Int64(Some(1)), Value::Int64(Some(2))]),
            Box::new(Value::Int64(None)),
        );
        for source in ["level NOT IN ?", "level NOT IN (?)"] {
            let expr = parse_expression(source, vec![list.clone()]).unwrap();
            let Expr::In { list, negated, .. } = expr else {
                panic!("Expected IN from `{source}`");
            };
            assert!(negated);
            assert_eq!(list.len(), 2);
        }
        let expr = parse_expression(
            "message <> '?' AND level IN ?",
            vec![Value::List(Some(vec![]), Box::new(Value::Int64(None)))],
        )
        .unwrap();
        let Expr::Binary(_, BinaryOp::And, right) = expr else {
            panic!("Expected AND at the root");
        };
        assert!(matches!(*right, Expr::In { ref list, .. } if list.is_empty()));
    }

    #[test]
    fn placeholder_count() {
        assert!(parse_expression("a = ? AND b = ?", vec![Value::Null]).is_err());
        assert!(parse_expression("a = ?", vec![Value::Null, Value::Null]).is_err());
        assert!(parse_expression("a = '?'", vec![]).is_ok());
    }

    #[test]
    fn malformed() {
        assert!(matches!(
            parse_expression("level = = 1", vec![]),
            Err(Error::InvalidStatement(..))
        ));
        assert!(parse_expression("level = 1 garbage", vec![]).is_err());
        assert!(parse_expression("a.b.c = 1", vec![]).is_err());
    }

    #[test]
    fn projection_labels() {
        let projection =
            parse_projection("logs.level, count(*) AS total, sum(level), details.*").unwrap();
        let labels = projection
            .iter()
            .map(|v| match v {
                Projection::All(table) => format!("{}.*", table.as_deref().unwrap_or("")),
                Projection::Expr { label, .. } => label.clone(),
            })
            .collect::<Vec<_>>();
        assert_eq!(labels, ["level", "total", "sum(level)", "details.*"]);
        assert!(matches!(
            &projection[1],
            Projection::Expr { expr: Expr::Function { name, args, distinct: false }, .. }
                if name == "count" && args == &[Expr::Star]
        ));
        let projection = parse_projection("count(DISTINCT product) AS products").unwrap();
        assert!(matches!(
            &projection[0],
            Projection::Expr { expr: Expr::Function { distinct: true, .. }, .. }
        ));
    }

    #[test]
    fn ordering() {
        let ordering = parse_ordering("sales.amount DESC, id ASC, region").unwrap();
        assert_eq!(
            ordering.iter().map(|(_, v)| *v).collect::<Vec<_>>(),
            [true, false, false]
        );
        assert_eq!(
            ordering[0].0,
            Expr::Column {
                table: Some("sales".into()),
                name: "amount".into(),
            }
        );
    }

    #[test]
    fn join_fragment() {
        let join = parse_join("LEFT JOIN log_details d ON d.log_id = logs.id").unwrap();
        assert_eq!(join.kind, JoinKind::Left);
        assert_eq!(join.table, "log_details");
        assert_eq!(join.alias, "d");
        let join = parse_join("JOIN regions ON regions.code = sales.region").unwrap();
        assert_eq!(join.kind, JoinKind::Inner);
        assert_eq!(join.alias, "regions");
    }

    #[test]
    fn strings() {
        let expr = parse_expression("message LIKE 'it''s%'", vec![]).unwrap();
        let Expr::Like { pattern, .. } = expr else {
            panic!("Expected LIKE");
        };
        assert_eq!(*pattern, Expr::Literal(Value::Varchar(Some("it's%".into()))));
    }
}
