#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use strata::{Condition, Entity, Operator, Passive, Registry, Value, raw};

    #[derive(Entity, Debug, Default, Clone, PartialEq)]
    #[strata(name = "logs")]
    struct Log {
        #[strata(primary_key, auto_increment)]
        id: Passive<u64>,
        level: u8,
        message: String,
        source: Option<String>,
    }

    fn leaf(column: &'static str, operator: Operator, values: Vec<Value>) -> Condition {
        Condition::Leaf {
            column: column.into(),
            operator,
            values,
        }
    }

    #[test]
    fn matching_leaves() {
        assert_eq!(
            Condition::matching("level", Value::from(3u8)),
            leaf("level", Operator::Eq, vec![Value::UInt8(Some(3))])
        );
        assert_eq!(
            Condition::matching("source", Value::Varchar(None)),
            leaf("source", Operator::IsNull, vec![])
        );
        assert_eq!(
            Condition::matching("level", Value::from(vec![1u8, 2])),
            leaf(
                "level",
                Operator::In,
                vec![Value::UInt8(Some(1)), Value::UInt8(Some(2))]
            )
        );
    }

    #[test]
    fn struct_filters_skip_zero_values() {
        let registry = Registry::new();
        let query = registry.query::<Log>().unwrap().where_struct(&Log {
            level: 2,
            message: String::new(),
            source: Some("kernel".into()),
            ..Default::default()
        });
        assert_eq!(
            query.plan().condition,
            Some(Condition::And(
                leaf("level", Operator::Eq, vec![Value::UInt8(Some(2))]).into(),
                leaf("source", Operator::Eq, vec![Value::from("kernel")]).into(),
            ))
        );
    }

    #[test]
    fn mappings_keep_every_entry() {
        let registry = Registry::new();
        let query = registry.query::<Log>().unwrap().where_map([
            ("level", Value::from(0u8)),
            ("message", Value::from("")),
            ("source", Value::Null),
        ]);
        let condition = query.plan().condition.clone().expect("A condition");
        assert_eq!(condition.leaves(), 3);
        assert_eq!(
            condition,
            Condition::And(
                Condition::And(
                    leaf("level", Operator::Eq, vec![Value::UInt8(Some(0))]).into(),
                    leaf("message", Operator::Eq, vec![Value::from("")]).into(),
                )
                .into(),
                leaf("source", Operator::IsNull, vec![]).into(),
            )
        );

        let mut map = BTreeMap::new();
        map.insert("message".to_string(), Value::from("boot"));
        map.insert("level".to_string(), Value::from(1u8));
        let query = registry.query::<Log>().unwrap().filter(map);
        // Sorted by key
        let Some(Condition::And(first, _)) = &query.plan().condition else {
            panic!("Expected an AND of two leaves");
        };
        assert!(matches!(**first, Condition::Leaf { ref column, .. } if column == "level"));
    }

    #[test]
    fn or_wraps_the_accumulated_tree() {
        let registry = Registry::new();
        let query = registry
            .query::<Log>()
            .unwrap()
            .where_raw("level > ?", [3u8])
            .filter([("source", Value::from("disk"))])
            .or([("message", Value::from("boot"))])
            .or(raw("message LIKE ?", ["%panic%"]));
        let expected = Condition::Or(
            Condition::Or(
                Condition::And(
                    Condition::raw("level > ?", vec![Value::from(3u8)]).into(),
                    leaf("source", Operator::Eq, vec![Value::from("disk")]).into(),
                )
                .into(),
                leaf("message", Operator::Eq, vec![Value::from("boot")]).into(),
            )
            .into(),
            Condition::raw("message LIKE ?", vec![Value::from("%panic%")]).into(),
        );
        assert_eq!(query.plan().condition, Some(expected));

        // AND after OR applies to the whole disjunction
        let query = query.filter([("level", Value::from(1u8))]);
        assert!(matches!(
            query.plan().condition,
            Some(Condition::And(ref left, _)) if matches!(**left, Condition::Or(..))
        ));
    }

    #[test]
    fn empty_fragments() {
        let registry = Registry::new();
        let query = registry
            .query::<Log>()
            .unwrap()
            .or(Vec::<(&'static str, Value)>::new())
            .where_struct(&Log::default());
        assert_eq!(query.plan().condition, None);

        let query = registry
            .query::<Log>()
            .unwrap()
            .where_pk_in(Vec::<u64>::new());
        assert_eq!(
            query.plan().condition,
            Some(leaf("id", Operator::In, vec![]))
        );
    }

    #[test]
    fn negation() {
        let registry = Registry::new();
        let query = registry
            .query::<Log>()
            .unwrap()
            .not([("level", Value::from(1u8)), ("source", Value::Null)]);
        let condition = query.plan().condition.clone().expect("A condition");
        assert_eq!(
            condition,
            Condition::And(
                Condition::Not(leaf("level", Operator::Eq, vec![Value::UInt8(Some(1))]).into())
                    .into(),
                Condition::Not(leaf("source", Operator::IsNull, vec![]).into()).into(),
            )
        );
        assert_eq!(Operator::IsNull.negate(), Operator::IsNotNull);
        assert_eq!(Operator::In.negate().negate(), Operator::In);
    }

    #[test]
    fn presence_tagged_fields() {
        let registry = Registry::new();
        let query = registry.query::<Log>().unwrap().where_fields(vec![
            ("level", Passive::Set(Value::from(0u8))),
            ("message", Passive::NotSet),
            ("source", Passive::Set(Value::Varchar(None))),
        ]);
        assert_eq!(
            query.plan().condition,
            Some(Condition::And(
                leaf("level", Operator::Eq, vec![Value::UInt8(Some(0))]).into(),
                leaf("source", Operator::IsNull, vec![]).into(),
            ))
        );
    }

    #[test]
    fn clauses_accumulate() {
        let registry = Registry::new();
        let plan = registry
            .query::<Log>()
            .unwrap()
            .select(["level", "count(*) AS total"])
            .group(["level"])
            .having("count(*) > ?", [1])
            .having("level < ?", [5])
            .order("level DESC")
            .limit(3)
            .offset(6)
            .into_plan();
        assert_eq!(plan.table, "logs");
        assert_eq!(plan.columns, ["level", "count(*) AS total"]);
        assert_eq!(plan.group_by, ["level"]);
        assert_eq!(plan.having.as_ref().map(Condition::leaves), Some(2));
        assert_eq!(plan.order_by, ["level DESC"]);
        assert_eq!((plan.limit, plan.offset), (Some(3), Some(6)));
        assert_eq!(plan.condition, None);
    }
}
