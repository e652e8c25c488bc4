#[cfg(test)]
mod tests {
    use indoc::indoc;
    use strata::{
        Assignment, Condition, DeletePlan, Entity, GenericSqlWriter, InsertPlan, Locking,
        MutationBatch, OnConflict, Passive, Registry, SqlWriter, Statement, UpdatePlan, Value,
        expr,
    };

    const WRITER: GenericSqlWriter = GenericSqlWriter {};

    #[derive(Entity, Debug, Default, Clone, PartialEq)]
    #[strata(name = "logs")]
    struct Log {
        #[strata(primary_key, auto_increment)]
        id: Passive<u64>,
        level: u8,
        message: String,
        archived: bool,
    }

    fn render(statement: impl Into<Statement>) -> String {
        let mut out = String::new();
        WRITER.write_statement(&mut out, &statement.into());
        out
    }

    #[test]
    fn select() {
        let registry = Registry::new();
        let plan = registry
            .query::<Log>()
            .unwrap()
            .select(["level", "count(*) AS total"])
            .where_raw("level > ? AND message <> 'it''s ?'", [1u8])
            .or([("archived", Value::from(true))])
            .group(["level"])
            .having("count(*) >= ?", [2])
            .order("level DESC")
            .limit(10)
            .offset(20)
            .lock(Locking::ForUpdate)
            .into_plan();
        assert_eq!(
            render(plan),
            indoc! {r#"
                SELECT "level", count(*) AS total
                FROM "logs"
                WHERE level > 1 AND message <> 'it''s ?' OR "archived" = true
                GROUP BY "level"
                HAVING count(*) >= 2
                ORDER BY level DESC
                LIMIT 10
                OFFSET 20
                FOR UPDATE;"#}
        );
    }

    #[test]
    fn select_everything() {
        let registry = Registry::new();
        let plan = registry
            .query::<Log>()
            .unwrap()
            .distinct(Vec::<&'static str>::new())
            .join("LEFT JOIN log_details d ON d.log_id = logs.id")
            .into_plan();
        assert_eq!(
            render(plan),
            indoc! {r#"
                SELECT DISTINCT *
                FROM "logs"
                LEFT JOIN log_details d ON d.log_id = logs.id;"#}
        );
    }

    #[test]
    fn parentheses() {
        let registry = Registry::new();
        // OR under AND
        let plan = registry
            .query::<Log>()
            .unwrap()
            .where_map([("level", 1u8)])
            .or([("level", Value::from(2u8))])
            .filter([("archived", Value::from(false))])
            .into_plan();
        assert_eq!(
            render(plan),
            indoc! {r#"
                SELECT *
                FROM "logs"
                WHERE ("level" = 1 OR "level" = 2) AND "archived" = false;"#}
        );
        // Compound raw fragment under AND, negated leaves
        let plan = registry
            .query::<Log>()
            .unwrap()
            .where_raw("level = ? OR level = ?", [1u8, 2])
            .not([("message", Value::from("boot")), ("level", Value::from(vec![7u8, 8]))])
            .into_plan();
        assert_eq!(
            render(plan),
            indoc! {r#"
                SELECT *
                FROM "logs"
                WHERE (level = 1 OR level = 2) AND "message" <> 'boot' AND "level" NOT IN (7, 8);"#}
        );
        // Raw fragment with its OR inside parentheses is left alone
        let plan = registry
            .query::<Log>()
            .unwrap()
            .where_raw("(level = ? OR level = ?)", [1u8, 2])
            .where_map([("source", Value::Null)])
            .into_plan();
        assert_eq!(
            render(plan),
            indoc! {r#"
                SELECT *
                FROM "logs"
                WHERE (level = 1 OR level = 2) AND "source" IS NULL;"#}
        );
        // Negated compound
        let plan = registry
            .query::<Log>()
            .unwrap()
            .not(Condition::matching("level", Value::from(1u8)).or(Condition::raw(
                "message LIKE ?",
                vec![Value::from("%x%")],
            )))
            .into_plan();
        assert_eq!(
            render(plan),
            indoc! {r#"
                SELECT *
                FROM "logs"
                WHERE NOT ("level" = 1 OR message LIKE '%x%');"#}
        );
    }

    #[test]
    fn insert() {
        let registry = Registry::new();
        let metadata = registry.resolve::<Log>().expect("Log should be valid");
        let records = [
            Log {
                level: 1,
                message: "boot".into(),
                ..Default::default()
            },
            Log {
                level: 3,
                message: "it's late".into(),
                archived: true,
                ..Default::default()
            },
            Log {
                level: 5,
                message: "halt".into(),
                ..Default::default()
            },
        ];
        let batch = MutationBatch::new(&metadata, records.iter(), &[]).chunk_size(2);
        assert_eq!(batch.chunks(), 2);
        let sql = batch.plans().map(render).collect::<Vec<_>>();
        assert_eq!(
            sql,
            [
                indoc! {r#"
                    INSERT INTO "logs" ("level", "message", "archived") VALUES
                    (1, 'boot', false),
                    (3, 'it''s late', true);"#},
                indoc! {r#"
                    INSERT INTO "logs" ("level", "message", "archived") VALUES
                    (5, 'halt', false);"#},
            ]
        );
    }

    #[test]
    fn insert_with_keys_and_selection() {
        let registry = Registry::new();
        let metadata = registry.resolve::<Log>().expect("Log should be valid");
        let records = [
            Log {
                id: Passive::Set(7),
                level: 1,
                message: "boot".into(),
                ..Default::default()
            },
            Log {
                level: 2,
                message: "halt".into(),
                ..Default::default()
            },
        ];
        let batch = MutationBatch::new(&metadata, records.iter(), &["message".into()]);
        assert_eq!(batch.columns, ["id", "message"]);
        assert_eq!(
            batch.rows,
            [
                vec![Value::UInt64(Some(7)), Value::from("boot")],
                vec![Value::Null, Value::from("halt")],
            ]
        );
        assert_eq!(batch.chunks(), 1);
    }

    #[test]
    fn upsert() {
        let plan = InsertPlan {
            table: "accounts",
            columns: vec!["code", "owner", "balance"],
            rows: vec![vec![Value::from("A1"), Value::from("ann"), Value::from(10i64)]],
            on_conflict: OnConflict::UpdateAll,
            conflict_target: vec!["code"],
            returning: vec!["code".into(), "owner".into(), "balance".into()],
        };
        assert_eq!(
            render(plan.clone()),
            indoc! {r#"
                INSERT INTO "accounts" ("code", "owner", "balance") VALUES
                ('A1', 'ann', 10)
                ON CONFLICT ("code") DO UPDATE SET
                "owner" = EXCLUDED."owner",
                "balance" = EXCLUDED."balance"
                RETURNING "code", "owner", "balance";"#}
        );
        let plan = InsertPlan {
            on_conflict: OnConflict::DoNothing,
            returning: Vec::new(),
            ..plan
        };
        assert_eq!(
            render(plan.clone()),
            indoc! {r#"
                INSERT INTO "accounts" ("code", "owner", "balance") VALUES
                ('A1', 'ann', 10)
                ON CONFLICT ("code") DO NOTHING;"#}
        );
        let plan = InsertPlan {
            on_conflict: OnConflict::UpdateColumns(vec!["balance".into()]),
            ..plan
        };
        assert_eq!(
            render(plan),
            indoc! {r#"
                INSERT INTO "accounts" ("code", "owner", "balance") VALUES
                ('A1', 'ann', 10)
                ON CONFLICT ("code") DO UPDATE SET
                "balance" = EXCLUDED."balance";"#}
        );
    }

    #[test]
    fn update_and_delete() {
        let plan = UpdatePlan {
            table: "logs",
            assignments: vec![
                ("level".into(), expr("level + ?", [1])),
                ("message".into(), Assignment::Literal(Value::from("seen"))),
                ("archived".into(), Value::Boolean(None).into()),
            ],
            condition: Some(Condition::matching("id", Value::from(vec![1u64, 2]))),
            returning: vec!["id".into()],
        };
        assert_eq!(
            render(plan),
            indoc! {r#"
                UPDATE "logs" SET "level" = level + 1, "message" = 'seen', "archived" = NULL
                WHERE "id" IN (1, 2)
                RETURNING "id";"#}
        );
        let plan = DeletePlan {
            table: "logs",
            condition: Some(Condition::matching("id", Value::from(Vec::<u64>::new()))),
            returning: Vec::new(),
        };
        assert_eq!(
            render(plan),
            indoc! {r#"
                DELETE FROM "logs"
                WHERE "id" IN (NULL);"#}
        );
    }

    #[test]
    fn display() {
        let statement = Statement::Delete(DeletePlan {
            table: "logs",
            condition: Some(Condition::raw("level < ?", vec![Value::from(2u8)])),
            returning: Vec::new(),
        });
        assert_eq!(statement.table(), "logs");
        assert_eq!(statement.to_string(), "DELETE FROM \"logs\"\nWHERE level < 2;");
    }

    #[test]
    fn literals() {
        let values = [
            Value::Null,
            Value::Int32(None),
            Value::Boolean(Some(true)),
            Value::Int8(Some(-3)),
            Value::UInt64(Some(u64::MAX)),
            Value::Float64(Some(1.5)),
            Value::from("O'Brien"),
            Value::Blob(Some([0xde, 0xad].into())),
            Value::from(vec![1i32, 2]),
        ]
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();
        assert_eq!(
            values,
            [
                "NULL",
                "NULL",
                "true",
                "-3",
                "18446744073709551615",
                "1.5",
                "'O''Brien'",
                "X'DEAD'",
                "(1, 2)",
            ]
        );
    }
}
