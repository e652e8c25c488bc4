use rust_decimal::{Decimal, prelude::ToPrimitive};
use std::{
    cmp::Ordering,
    fmt::{self, Display, Formatter, Write},
};
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Dynamically typed value flowing through conditions, plans and rows.
///
/// Every typed variant carries an `Option`, `None` being SQL `NULL` of that type. The
/// payload-less form (for example `Value::Int64(None)`) doubles as a column type
/// prototype inside [`crate::ColumnDef`].
#[derive(Default, Debug, Clone)]
pub enum Value {
    #[default]
    Null,
    Boolean(Option<bool>),
    Int8(Option<i8>),
    Int16(Option<i16>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    UInt8(Option<u8>),
    UInt16(Option<u16>),
    UInt32(Option<u32>),
    UInt64(Option<u64>),
    Float32(Option<f32>),
    Float64(Option<f64>),
    Decimal(Option<Decimal>),
    Varchar(Option<String>),
    Blob(Option<Box<[u8]>>),
    Date(Option<Date>),
    Time(Option<Time>),
    Timestamp(Option<PrimitiveDateTime>),
    TimestampWithTimezone(Option<OffsetDateTime>),
    Uuid(Option<Uuid>),
    List(Option<Vec<Value>>, /* type: */ Box<Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(l), Self::Boolean(r)) => l == r,
            (Self::Int8(l), Self::Int8(r)) => l == r,
            (Self::Int16(l), Self::Int16(r)) => l == r,
            (Self::Int32(l), Self::Int32(r)) => l == r,
            (Self::Int64(l), Self::Int64(r)) => l == r,
            (Self::UInt8(l), Self::UInt8(r)) => l == r,
            (Self::UInt16(l), Self::UInt16(r)) => l == r,
            (Self::UInt32(l), Self::UInt32(r)) => l == r,
            (Self::UInt64(l), Self::UInt64(r)) => l == r,
            (Self::Float32(l), Self::Float32(r)) => l == r,
            (Self::Float64(l), Self::Float64(r)) => l == r,
            (Self::Decimal(l), Self::Decimal(r)) => l == r,
            (Self::Varchar(l), Self::Varchar(r)) => l == r,
            (Self::Blob(l), Self::Blob(r)) => l == r,
            (Self::Date(l), Self::Date(r)) => l == r,
            (Self::Time(l), Self::Time(r)) => l == r,
            (Self::Timestamp(l), Self::Timestamp(r)) => l == r,
            (Self::TimestampWithTimezone(l), Self::TimestampWithTimezone(r)) => l == r,
            (Self::Uuid(l), Self::Uuid(r)) => l == r,
            (Self::List(l, ..), Self::List(r, ..)) => l == r && self.same_type(other),
            _ => false,
        }
    }
}

impl Value {
    pub fn same_type(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(.., l), Self::List(.., r)) => l.same_type(r),
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }

    /// True for `Null` and for any typed variant holding `None`.
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Value::Null
                | Value::Boolean(None)
                | Value::Int8(None)
                | Value::Int16(None)
                | Value::Int32(None)
                | Value::Int64(None)
                | Value::UInt8(None)
                | Value::UInt16(None)
                | Value::UInt32(None)
                | Value::UInt64(None)
                | Value::Float32(None)
                | Value::Float64(None)
                | Value::Decimal(None)
                | Value::Varchar(None)
                | Value::Blob(None)
                | Value::Date(None)
                | Value::Time(None)
                | Value::Timestamp(None)
                | Value::TimestampWithTimezone(None)
                | Value::Uuid(None)
                | Value::List(None, ..)
        )
    }

    /// The zero value of its type: `NULL`, `0`, `0.0`, `false`, `""`, an empty list or
    /// blob, the nil uuid.
    ///
    /// This is the rule used by [`crate::Entity::fields`] to drop fields from struct
    /// based filters. Temporal values are zero only when `NULL`.
    pub fn is_zero(&self) -> bool {
        if self.is_null() {
            return true;
        }
        match self {
            Value::Boolean(Some(v)) => !v,
            Value::Float32(Some(v)) => *v == 0.0,
            Value::Float64(Some(v)) => *v == 0.0,
            Value::Decimal(Some(v)) => v.is_zero(),
            Value::Varchar(Some(v)) => v.is_empty(),
            Value::Blob(Some(v)) => v.is_empty(),
            Value::Uuid(Some(v)) => v.is_nil(),
            Value::List(Some(v), ..) => v.is_empty(),
            _ => self.as_i128() == Some(0),
        }
    }

    /// Integer payload widened to `i128`, `None` for non integer variants or `NULL`.
    pub fn as_i128(&self) -> Option<i128> {
        match *self {
            Value::Int8(Some(v)) => Some(v as _),
            Value::Int16(Some(v)) => Some(v as _),
            Value::Int32(Some(v)) => Some(v as _),
            Value::Int64(Some(v)) => Some(v as _),
            Value::UInt8(Some(v)) => Some(v as _),
            Value::UInt16(Some(v)) => Some(v as _),
            Value::UInt32(Some(v)) => Some(v as _),
            Value::UInt64(Some(v)) => Some(v as _),
            _ => None,
        }
    }

    /// Any numeric payload as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(Some(v)) => Some(*v as _),
            Value::Float64(Some(v)) => Some(*v),
            Value::Decimal(Some(v)) => v.to_f64(),
            _ => self.as_i128().map(|v| v as _),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Varchar(Some(v)) => Some(v),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Compares two values the way a storage engine would: numbers compare across
    /// widths, other types only with themselves. `NULL` compares with nothing.
    pub fn compare(&self, other: &Self) -> Option<Ordering> {
        if self.is_null() || other.is_null() {
            return None;
        }
        if let (Some(l), Some(r)) = (self.as_i128(), other.as_i128()) {
            return Some(l.cmp(&r));
        }
        if let (Value::Decimal(Some(l)), Value::Decimal(Some(r))) = (self, other) {
            return Some(l.cmp(r));
        }
        if let (Some(l), Some(r)) = (self.as_f64(), other.as_f64()) {
            return l.partial_cmp(&r);
        }
        match (self, other) {
            (Value::Boolean(Some(l)), Value::Boolean(Some(r))) => Some(l.cmp(r)),
            (Value::Varchar(Some(l)), Value::Varchar(Some(r))) => Some(l.cmp(r)),
            (Value::Blob(Some(l)), Value::Blob(Some(r))) => Some(l.cmp(r)),
            (Value::Date(Some(l)), Value::Date(Some(r))) => Some(l.cmp(r)),
            (Value::Time(Some(l)), Value::Time(Some(r))) => Some(l.cmp(r)),
            (Value::Timestamp(Some(l)), Value::Timestamp(Some(r))) => Some(l.cmp(r)),
            (Value::TimestampWithTimezone(Some(l)), Value::TimestampWithTimezone(Some(r))) => {
                Some(l.cmp(r))
            }
            (Value::Uuid(Some(l)), Value::Uuid(Some(r))) => Some(l.cmp(r)),
            _ => None,
        }
    }

    /// Equality under [`Value::compare`], `false` whenever either side is `NULL`.
    pub fn loose_eq(&self, other: &Self) -> bool {
        self.compare(other) == Some(Ordering::Equal)
    }
}

/// Renders the value as a SQL literal. Used by [`crate::SqlWriter`] and for grouping keys.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("NULL");
        }
        match self {
            Value::Boolean(Some(v)) => write!(f, "{v}"),
            Value::Float32(Some(v)) => write!(f, "{v}"),
            Value::Float64(Some(v)) => write!(f, "{v}"),
            Value::Decimal(Some(v)) => write!(f, "{v}"),
            Value::Varchar(Some(v)) => {
                f.write_char('\'')?;
                for c in v.chars() {
                    if c == '\'' {
                        f.write_char('\'')?;
                    }
                    f.write_char(c)?;
                }
                f.write_char('\'')
            }
            Value::Blob(Some(v)) => write!(f, "X'{}'", hex::encode_upper(v)),
            Value::Date(Some(v)) => write!(f, "'{v}'"),
            Value::Time(Some(v)) => write!(f, "'{v}'"),
            Value::Timestamp(Some(v)) => write!(f, "'{v}'"),
            Value::TimestampWithTimezone(Some(v)) => write!(f, "'{v}'"),
            Value::Uuid(Some(v)) => write!(f, "'{v}'"),
            Value::List(Some(values), ..) => {
                f.write_char('(')?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_char(')')
            }
            _ => match self.as_i128() {
                Some(v) => write!(f, "{v}"),
                None => f.write_str("NULL"),
            },
        }
    }
}
