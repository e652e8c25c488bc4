use crate::{Error, Passive, Result, Value};
use rust_decimal::{Decimal, prelude::FromPrimitive};
use std::any;
use time::{Date, OffsetDateTime, PrimitiveDateTime, Time};
use uuid::Uuid;

/// Conversion between native Rust types and the dynamically typed [`Value`].
///
/// Every column type of an entity implements it: the derive macro uses
/// `as_empty_value` to build column prototypes, `as_value` to build rows and filters,
/// and `try_from_value` to decode rows coming back from a backend.
///
/// Decoding is lenient across integer widths (a backend may hand back `Int64` for a
/// `u8` column) but always range checked.
///
/// ```rust
/// use strata_core::{AsValue, Value};
/// let v = 42i32.as_value();
/// assert!(matches!(v, Value::Int32(Some(42))));
/// let n: u8 = AsValue::try_from_value(Value::Int64(Some(42))).unwrap();
/// assert_eq!(n, 42);
/// ```
pub trait AsValue {
    /// The `NULL` variant for this type, also used as the column type prototype.
    fn as_empty_value() -> Value;
    /// Convert into the owned [`Value`] representation.
    fn as_value(self) -> Value;
    /// Attempt to convert a dynamic [`Value`] into `Self`.
    fn try_from_value(value: Value) -> Result<Self>
    where
        Self: Sized;
}

impl<T: AsValue> From<T> for Value {
    fn from(value: T) -> Self {
        value.as_value()
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Varchar(Some(value.into()))
    }
}

fn cannot_convert<T>(value: &Value) -> Error {
    Error::conversion(format!(
        "Cannot convert {value:?} to {}",
        any::type_name::<T>()
    ))
}

macro_rules! impl_as_value {
    ($source:ty, $destination:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                if let $destination(Some(v)) = value {
                    return Ok(v);
                }
                if let Some(v) = value.as_i128() {
                    return <$source>::try_from(v).map_err(|_| {
                        Error::conversion(format!(
                            "Value {v} is out of range for {}",
                            any::type_name::<Self>(),
                        ))
                    });
                }
                Err(cannot_convert::<Self>(&value))
            }
        }
    };
}
impl_as_value!(i8, Value::Int8);
impl_as_value!(i16, Value::Int16);
impl_as_value!(i32, Value::Int32);
impl_as_value!(i64, Value::Int64);
impl_as_value!(u8, Value::UInt8);
impl_as_value!(u16, Value::UInt16);
impl_as_value!(u32, Value::UInt32);
impl_as_value!(u64, Value::UInt64);

impl AsValue for bool {
    fn as_empty_value() -> Value {
        Value::Boolean(None)
    }
    fn as_value(self) -> Value {
        Value::Boolean(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if let Value::Boolean(Some(v)) = value {
            return Ok(v);
        }
        value
            .as_i128()
            .map(|v| v != 0)
            .ok_or_else(|| cannot_convert::<Self>(&value))
    }
}

impl AsValue for f32 {
    fn as_empty_value() -> Value {
        Value::Float32(None)
    }
    fn as_value(self) -> Value {
        Value::Float32(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float32(Some(v)) => Ok(v),
            _ => value
                .as_f64()
                .map(|v| v as f32)
                .ok_or_else(|| cannot_convert::<Self>(&value)),
        }
    }
}

impl AsValue for f64 {
    fn as_empty_value() -> Value {
        Value::Float64(None)
    }
    fn as_value(self) -> Value {
        Value::Float64(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| cannot_convert::<Self>(&value))
    }
}

impl AsValue for Decimal {
    fn as_empty_value() -> Value {
        Value::Decimal(None)
    }
    fn as_value(self) -> Value {
        Value::Decimal(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Decimal(Some(v)) => Ok(v),
            Value::Float32(Some(v)) => {
                Decimal::from_f32(v).ok_or_else(|| cannot_convert::<Self>(&value))
            }
            Value::Float64(Some(v)) => {
                Decimal::from_f64(v).ok_or_else(|| cannot_convert::<Self>(&value))
            }
            _ => value
                .as_i128()
                .and_then(Decimal::from_i128)
                .ok_or_else(|| cannot_convert::<Self>(&value)),
        }
    }
}

impl AsValue for String {
    fn as_empty_value() -> Value {
        Value::Varchar(None)
    }
    fn as_value(self) -> Value {
        Value::Varchar(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Varchar(Some(v)) => Ok(v),
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
}

impl AsValue for Box<[u8]> {
    fn as_empty_value() -> Value {
        Value::Blob(None)
    }
    fn as_value(self) -> Value {
        Value::Blob(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Blob(Some(v)) => Ok(v),
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
}

macro_rules! impl_as_value_exact {
    ($source:ty, $destination:path) => {
        impl AsValue for $source {
            fn as_empty_value() -> Value {
                $destination(None)
            }
            fn as_value(self) -> Value {
                $destination(Some(self))
            }
            fn try_from_value(value: Value) -> Result<Self> {
                match value {
                    $destination(Some(v)) => Ok(v),
                    _ => Err(cannot_convert::<Self>(&value)),
                }
            }
        }
    };
}
impl_as_value_exact!(Date, Value::Date);
impl_as_value_exact!(Time, Value::Time);
impl_as_value_exact!(PrimitiveDateTime, Value::Timestamp);
impl_as_value_exact!(OffsetDateTime, Value::TimestampWithTimezone);

impl AsValue for Uuid {
    fn as_empty_value() -> Value {
        Value::Uuid(None)
    }
    fn as_value(self) -> Value {
        Value::Uuid(Some(self))
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::Uuid(Some(v)) => Ok(v),
            Value::Varchar(Some(ref v)) => {
                Uuid::parse_str(v).map_err(|e| Error::conversion(format!("{e}: `{v}`")))
            }
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
}

impl<T: AsValue> AsValue for Option<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Some(v) => v.as_value(),
            None => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::try_from_value(value).map(Some)
        }
    }
}

impl<T: AsValue> AsValue for Vec<T> {
    fn as_empty_value() -> Value {
        Value::List(None, Box::new(T::as_empty_value()))
    }
    fn as_value(self) -> Value {
        Value::List(
            Some(self.into_iter().map(AsValue::as_value).collect()),
            Box::new(T::as_empty_value()),
        )
    }
    fn try_from_value(value: Value) -> Result<Self> {
        match value {
            Value::List(Some(values), ..) => values.into_iter().map(T::try_from_value).collect(),
            _ => Err(cannot_convert::<Self>(&value)),
        }
    }
}

impl<T: AsValue> AsValue for Passive<T> {
    fn as_empty_value() -> Value {
        T::as_empty_value()
    }
    fn as_value(self) -> Value {
        match self {
            Passive::Set(v) => v.as_value(),
            Passive::NotSet => T::as_empty_value(),
        }
    }
    fn try_from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            Ok(Passive::NotSet)
        } else {
            T::try_from_value(value).map(Passive::Set)
        }
    }
}
