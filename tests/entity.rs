#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use std::str::FromStr;
    use strata::{
        Association, Entity, Passive, Registry, RowLabeled, Value,
    };
    use time::macros::date;
    use uuid::Uuid;

    #[derive(Entity, Debug, Default, Clone, PartialEq)]
    struct InventoryItem {
        #[strata(primary_key, auto_increment)]
        id: Passive<i64>,
        #[strata(name = "item_code", unique)]
        code: String,
        _quantity: u16,
        price: Option<Decimal>,
        restocked: Option<time::Date>,
        reference: Uuid,
        #[strata(foreign_key = "item_id")]
        movements: Association<StockMovement>,
    }

    #[derive(Entity, Debug, Default, Clone, PartialEq)]
    #[strata(name = "movements")]
    struct StockMovement {
        #[strata(primary_key)]
        id: i32,
        item_id: i64,
        delta: i32,
    }

    #[test]
    fn describe_entity() {
        let descriptor = InventoryItem::describe();
        assert_eq!(descriptor.name, "InventoryItem");
        assert_eq!(descriptor.table, "inventory_item");
        let names = descriptor
            .columns
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            ["id", "item_code", "quantity", "price", "restocked", "reference"]
        );

        let id = &descriptor.columns[0];
        assert!(id.primary_key && id.auto_increment && !id.nullable);
        assert!(matches!(id.value, Value::Int64(None)));
        let code = &descriptor.columns[1];
        assert!(code.unique && !code.nullable && !code.primary_key);
        assert!(matches!(code.value, Value::Varchar(None)));
        assert!(matches!(descriptor.columns[2].value, Value::UInt16(None)));
        assert!(descriptor.columns[3].nullable);
        assert!(matches!(descriptor.columns[3].value, Value::Decimal(None)));
        assert!(descriptor.columns[4].nullable);
        assert!(matches!(descriptor.columns[5].value, Value::Uuid(None)));

        let [movements] = &descriptor.associations[..] else {
            panic!("Expected one association");
        };
        assert_eq!(movements.name, "movements");
        assert_eq!(movements.foreign_key, "item_id");
        assert_eq!((movements.child)().table, "movements");
    }

    #[test]
    fn row_and_fields() {
        let item = InventoryItem {
            code: "A-1".into(),
            price: Some(Decimal::from_str("2.50").unwrap()),
            ..Default::default()
        };
        let row = item.row();
        assert_eq!(row.len(), 6);
        assert_eq!(row[0], ("id", Passive::NotSet));
        assert_eq!(row[1], ("item_code", Passive::Set(Value::from("A-1"))));
        assert_eq!(row[2], ("quantity", Passive::Set(Value::UInt16(Some(0)))));
        assert_eq!(row[4], ("restocked", Passive::Set(Value::Date(None))));

        // Zero values, NULLs and unset keys are not populated fields
        let fields = item.fields();
        let names = fields.iter().map(|(name, _)| *name).collect::<Vec<_>>();
        assert_eq!(names, ["item_code", "price"]);
        assert!(!item.has_primary_key());
        assert!(item.primary_key().is_null());
    }

    #[test]
    fn from_row() {
        let reference = Uuid::from_str("67e55044-10b1-426f-9247-bb680e5fe0c8").unwrap();
        let row = RowLabeled::new(
            ["id", "item_code", "quantity", "restocked", "reference", "extra"]
                .map(String::from)
                .into(),
            [
                Value::Int64(Some(9)),
                Value::from("B-2"),
                Value::Int64(Some(12)),
                Value::Date(Some(date!(2024 - 02 - 29))),
                Value::Uuid(Some(reference)),
                Value::from("ignored"),
            ]
            .into(),
        );
        let item = InventoryItem::from_row(row).expect("The row should decode");
        assert_eq!(
            item,
            InventoryItem {
                id: Passive::Set(9),
                code: "B-2".into(),
                _quantity: 12,
                price: None,
                restocked: Some(date!(2024 - 02 - 29)),
                reference,
                movements: Association::NotLoaded,
            }
        );
        assert!(item.has_primary_key());
        assert_eq!(item.primary_key(), Value::Int64(Some(9)));

        let row = RowLabeled::new(
            ["quantity"].map(String::from).into(),
            [Value::Int64(Some(70_000))].into(),
        );
        let error = InventoryItem::from_row(row).expect_err("70000 does not fit in u16");
        assert!(matches!(error, strata::Error::Conversion(..)), "{error:?}");
        assert!(error.to_string().contains("quantity"));
    }

    #[test]
    fn primary_key_and_attach() {
        let mut item = InventoryItem::default();
        item.set_primary_key(Value::Int64(Some(3)))
            .expect("Could not set the key");
        assert_eq!(item.id, Passive::Set(3));
        item.set_primary_key(Value::UInt64(Some(4)))
            .expect("Keys are decoded across integer widths");
        assert_eq!(item.id, Passive::Set(4));
        assert!(
            item.set_primary_key(Value::from("five")).is_err(),
            "A string is not an integer key"
        );

        assert!(!item.movements.is_loaded());
        let rows = (1..=2)
            .map(|i| {
                RowLabeled::new(
                    ["id", "item_id", "delta"].map(String::from).into(),
                    [Value::Int32(Some(i)), Value::Int64(Some(4)), Value::Int32(Some(-i))].into(),
                )
            })
            .collect();
        item.attach("movements", rows)
            .expect("Could not attach the movements");
        assert_eq!(
            item.movements.as_slice(),
            [
                StockMovement {
                    id: 1,
                    item_id: 4,
                    delta: -1
                },
                StockMovement {
                    id: 2,
                    item_id: 4,
                    delta: -2
                },
            ]
        );
        let error = item
            .attach("locations", Vec::new())
            .expect_err("There is no such association");
        assert!(matches!(error, strata::Error::Schema(..)));
    }

    #[test]
    fn resolve_entity() {
        let registry = Registry::new();
        let metadata = registry
            .resolve::<InventoryItem>()
            .expect("InventoryItem should be a valid entity");
        assert_eq!(metadata.primary_key().name, "id");
        assert_eq!(metadata.column("item_code").map(|c| c.unique), Some(true));
        assert!(metadata.column("code").is_none());
        assert!(metadata.association("movements").is_some());
        assert_eq!(
            metadata.column_names().collect::<Vec<_>>(),
            ["id", "item_code", "quantity", "price", "restocked", "reference"]
        );
    }
}
