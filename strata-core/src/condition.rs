use crate::{Entity, Fields, Passive, Value};
use std::{borrow::Cow, collections::BTreeMap};

/// Comparison applied by a [`Condition::Leaf`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

impl Operator {
    pub fn negate(self) -> Self {
        match self {
            Operator::Eq => Operator::Ne,
            Operator::Ne => Operator::Eq,
            Operator::In => Operator::NotIn,
            Operator::NotIn => Operator::In,
            Operator::IsNull => Operator::IsNotNull,
            Operator::IsNotNull => Operator::IsNull,
        }
    }
}

/// Boolean expression tree over row level predicates.
///
/// The absence of a filter is `Option::<Condition>::None`, there is no empty node.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Leaf {
        column: Cow<'static, str>,
        operator: Operator,
        values: Vec<Value>,
    },
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
    /// Trusted expression, `?` markers are replaced by `args` in order.
    Raw {
        expression: Cow<'static, str>,
        args: Vec<Value>,
    },
}

impl Condition {
    /// Leaf comparing `column` with `value`: `IS NULL` for a null value, `IN` for a
    /// list, equality otherwise.
    pub fn matching(column: impl Into<Cow<'static, str>>, value: Value) -> Self {
        let column = column.into();
        match value {
            v if v.is_null() => Condition::Leaf {
                column,
                operator: Operator::IsNull,
                values: Vec::new(),
            },
            Value::List(Some(values), ..) => Condition::Leaf {
                column,
                operator: Operator::In,
                values,
            },
            v => Condition::Leaf {
                column,
                operator: Operator::Eq,
                values: vec![v],
            },
        }
    }

    pub fn raw(expression: impl Into<Cow<'static, str>>, args: Vec<Value>) -> Self {
        Condition::Raw {
            expression: expression.into(),
            args,
        }
    }

    pub fn and(self, other: Condition) -> Self {
        Condition::And(self.into(), other.into())
    }

    pub fn or(self, other: Condition) -> Self {
        Condition::Or(self.into(), other.into())
    }

    pub fn negated(self) -> Self {
        Condition::Not(self.into())
    }

    /// Left deep AND of all the conditions, `None` when there are none.
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Option<Self> {
        conditions.into_iter().reduce(Condition::and)
    }

    /// Appends `other` to an optional tree with AND.
    pub fn and_opt(tree: Option<Condition>, other: Condition) -> Option<Self> {
        Some(match tree {
            Some(tree) => tree.and(other),
            None => other,
        })
    }

    /// Number of leaves (including raw fragments) in the tree.
    pub fn leaves(&self) -> usize {
        match self {
            Condition::Leaf { .. } | Condition::Raw { .. } => 1,
            Condition::And(l, r) | Condition::Or(l, r) => l.leaves() + r.leaves(),
            Condition::Not(c) => c.leaves(),
        }
    }
}

/// Trusted SQL fragment with positional `?` arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Raw {
    pub expression: Cow<'static, str>,
    pub args: Vec<Value>,
}

/// Shorthand for a [`Raw`] fragment.
///
/// ```rust
/// use strata_core::{Value, raw};
/// let fragment = raw("level >= ? AND message LIKE ?", [Value::from(2u8), "%disk%".into()]);
/// assert_eq!(fragment.args.len(), 2);
/// ```
pub fn raw<A: Into<Value>>(
    expression: impl Into<Cow<'static, str>>,
    args: impl IntoIterator<Item = A>,
) -> Raw {
    Raw {
        expression: expression.into(),
        args: args.into_iter().map(Into::into).collect(),
    }
}

/// Anything that resolves to a list of AND-joined condition leaves.
///
/// Struct fragments follow the zero value rule of [`Entity::fields`], mappings keep every
/// entry, raw fragments become a single [`Condition::Raw`] leaf.
pub trait IntoCondition {
    fn into_leaves(self) -> Vec<Condition>;
}

impl<E: Entity> IntoCondition for &E {
    fn into_leaves(self) -> Vec<Condition> {
        self.fields().into_leaves()
    }
}

impl IntoCondition for Fields {
    fn into_leaves(self) -> Vec<Condition> {
        self.into_iter()
            .filter_map(|(column, value)| match value {
                Passive::Set(v) => Some(Condition::matching(column, v)),
                Passive::NotSet => None,
            })
            .collect()
    }
}

impl IntoCondition for Vec<(&'static str, Value)> {
    fn into_leaves(self) -> Vec<Condition> {
        self.into_iter()
            .map(|(column, value)| Condition::matching(column, value))
            .collect()
    }
}

impl<const N: usize> IntoCondition for [(&'static str, Value); N] {
    fn into_leaves(self) -> Vec<Condition> {
        Vec::from(self).into_leaves()
    }
}

impl IntoCondition for BTreeMap<String, Value> {
    fn into_leaves(self) -> Vec<Condition> {
        self.into_iter()
            .map(|(column, value)| Condition::matching(column, value))
            .collect()
    }
}

impl IntoCondition for Raw {
    fn into_leaves(self) -> Vec<Condition> {
        vec![Condition::Raw {
            expression: self.expression,
            args: self.args,
        }]
    }
}

impl IntoCondition for Condition {
    fn into_leaves(self) -> Vec<Condition> {
        vec![self]
    }
}
