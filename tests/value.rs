#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use std::{cmp::Ordering, str::FromStr};
    use strata::{AsValue, Error, Passive, Value};
    use time::macros::{date, datetime};
    use uuid::Uuid;

    #[test]
    fn integers() {
        assert_eq!(u8::try_from_value(Value::Int64(Some(255))).unwrap(), 255);
        assert!(matches!(
            u8::try_from_value(Value::Int64(Some(256))),
            Err(Error::Conversion(..))
        ));
        assert!(matches!(
            u32::try_from_value(Value::Int8(Some(-1))),
            Err(Error::Conversion(..))
        ));
        assert_eq!(i64::try_from_value(Value::UInt32(Some(7))).unwrap(), 7);
        assert!(i64::try_from_value(Value::Float64(Some(1.0))).is_err());
        assert!(bool::try_from_value(Value::Int32(Some(1))).unwrap());
        assert!(!bool::try_from_value(Value::UInt8(Some(0))).unwrap());
    }

    #[test]
    fn nullable() {
        assert_eq!(Option::<i32>::try_from_value(Value::Null).unwrap(), None);
        assert_eq!(Option::<i32>::try_from_value(Value::Int32(None)).unwrap(), None);
        assert_eq!(
            Option::<i32>::try_from_value(Value::Int64(Some(4))).unwrap(),
            Some(4)
        );
        assert!(String::try_from_value(Value::Varchar(None)).is_err());
        assert_eq!(
            Passive::<u64>::try_from_value(Value::Null).unwrap(),
            Passive::NotSet
        );
        assert!(matches!(Passive::<u64>::as_empty_value(), Value::UInt64(None)));
        assert!(matches!(Some(3i16).as_value(), Value::Int16(Some(3))));
        assert!(matches!(None::<i16>.as_value(), Value::Int16(None)));
    }

    #[test]
    fn other_types() {
        let decimal = Decimal::from_str("12.345").unwrap();
        assert_eq!(
            Decimal::try_from_value(Value::Decimal(Some(decimal))).unwrap(),
            decimal
        );
        assert_eq!(
            Decimal::try_from_value(Value::Int32(Some(12))).unwrap(),
            Decimal::from(12)
        );
        assert_eq!(f64::try_from_value(Value::Int16(Some(3))).unwrap(), 3.0);
        let uuid = Uuid::from_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        assert_eq!(
            Uuid::try_from_value(Value::from("67e55044-10b1-426f-9247-bb680e5fe0c8")).unwrap(),
            uuid
        );
        assert!(Uuid::try_from_value(Value::from("not a uuid")).is_err());
        assert_eq!(
            time::Date::try_from_value(Value::Date(Some(date!(2025 - 01 - 31)))).unwrap(),
            date!(2025 - 01 - 31)
        );
        assert!(time::Date::try_from_value(Value::from("2025-01-31")).is_err());
        assert_eq!(
            Vec::<u8>::try_from_value(Value::from(vec![1u8, 2, 3])).unwrap(),
            [1, 2, 3]
        );
    }

    #[test]
    fn zero_values() {
        let zeros = [
            Value::Null,
            Value::Int64(None),
            Value::UInt8(Some(0)),
            Value::Float64(Some(0.0)),
            Value::Boolean(Some(false)),
            Value::from(""),
            Value::Decimal(Some(Decimal::ZERO)),
            Value::Uuid(Some(Uuid::nil())),
            Value::from(Vec::<i32>::new()),
        ];
        for value in &zeros {
            assert!(value.is_zero(), "{value:?} should be zero");
        }
        let populated = [
            Value::Int8(Some(-1)),
            Value::Boolean(Some(true)),
            Value::from(" "),
            Value::Date(Some(date!(1970 - 01 - 01))),
            Value::Timestamp(Some(datetime!(1970-01-01 0:00))),
        ];
        for value in &populated {
            assert!(!value.is_zero(), "{value:?} should not be zero");
        }
    }

    #[test]
    fn comparisons() {
        assert_eq!(
            Value::UInt8(Some(3)).compare(&Value::Int64(Some(10))),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Float32(Some(2.5)).compare(&Value::Int32(Some(2))),
            Some(Ordering::Greater)
        );
        assert_eq!(Value::Int32(None).compare(&Value::Int32(None)), None);
        assert_eq!(Value::from("a").compare(&Value::Int32(Some(1))), None);
        assert!(Value::UInt64(Some(1)).loose_eq(&Value::Int8(Some(1))));
        assert!(!Value::Null.loose_eq(&Value::Null));
        // Structural equality is exact
        assert_ne!(Value::UInt64(Some(1)), Value::Int8(Some(1)));
        assert_eq!(Value::Varchar(None), Value::Varchar(None));
        assert!(Value::from(vec![1i32]).same_type(&Value::List(None, Box::new(Value::Int32(None)))));
        assert!(!Value::from(vec![1i32]).same_type(&Value::from(vec![1i64])));
    }
}
