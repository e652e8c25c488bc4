use std::{collections::BTreeMap, sync::LazyLock};
use strata::{Condition, Connection, Entity, Passive, Registry, Value, raw};
use tokio::sync::Mutex;

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[strata(name = "condition_logs")]
struct ConditionLog {
    #[strata(primary_key, auto_increment)]
    id: Passive<u64>,
    level: u8,
    message: String,
    archived: bool,
}

impl ConditionLog {
    fn new(level: u8, message: &str, archived: bool) -> Self {
        Self {
            level,
            message: message.into(),
            archived,
            ..Default::default()
        }
    }
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn messages(logs: &[ConditionLog]) -> Vec<&str> {
    let mut result = logs.iter().map(|v| v.message.as_str()).collect::<Vec<_>>();
    result.sort();
    result
}

pub async fn conditions<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;
    let registry = Registry::new();
    connection
        .ensure_schema(&[registry
            .resolve::<ConditionLog>()
            .expect("ConditionLog should be a valid entity")])
        .await
        .expect("Could not create the condition_logs table");
    let mut logs = vec![
        ConditionLog::new(0, "boot", false),
        ConditionLog::new(0, "halt", true),
        ConditionLog::new(2, "boot", false),
        ConditionLog::new(5, "disk full", false),
    ];
    registry
        .query::<ConditionLog>()
        .unwrap()
        .create_in_batches(connection, &mut logs, 0)
        .await
        .expect("Could not insert the condition logs");

    // Zero valued fields are dropped from struct filters
    let query = registry
        .query::<ConditionLog>()
        .unwrap()
        .where_struct(&ConditionLog::new(0, "boot", false));
    assert_eq!(query.plan().condition.as_ref().map(Condition::leaves), Some(1));
    let found = query.find(connection).await.expect("where_struct failed");
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|v| v.message == "boot"));

    // But kept by mappings
    let query = registry.query::<ConditionLog>().unwrap().where_map([
        ("level", Value::from(0u8)),
        ("message", Value::from("boot")),
        ("archived", Value::from(false)),
    ]);
    assert_eq!(query.plan().condition.as_ref().map(Condition::leaves), Some(3));
    let found = query.find(connection).await.expect("where_map failed");
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].level, 0);
    assert_eq!(found[0].message, "boot");

    // A filter made of zero values restricts nothing
    let query;
    crate::silent_logs! {
        query = registry
            .query::<ConditionLog>()
            .unwrap()
            .where_struct(&ConditionLog::default());
    }
    assert!(query.plan().condition.is_none());
    assert_eq!(query.count(connection).await.expect("count failed"), 4);

    // Explicit presence keeps zero values
    let found = registry
        .query::<ConditionLog>()
        .unwrap()
        .where_fields(vec![
            ("level", Passive::Set(Value::from(0u8))),
            ("message", Passive::NotSet),
        ])
        .find(connection)
        .await
        .expect("where_fields failed");
    assert_eq!(messages(&found), ["boot", "halt"]);

    let found = registry
        .query::<ConditionLog>()
        .unwrap()
        .not([("message", Value::from("boot"))])
        .find(connection)
        .await
        .expect("not failed");
    assert_eq!(messages(&found), ["disk full", "halt"]);

    let found = registry
        .query::<ConditionLog>()
        .unwrap()
        .where_raw("level IN ?", [Value::from(vec![2u8, 5])])
        .find(connection)
        .await
        .expect("where_raw with a list failed");
    assert_eq!(messages(&found), ["boot", "disk full"]);

    let found = registry
        .query::<ConditionLog>()
        .unwrap()
        .where_raw(
            "level BETWEEN ? AND ? AND message LIKE ?",
            [Value::from(1u8), Value::from(9u8), Value::from("disk%")],
        )
        .find(connection)
        .await
        .expect("where_raw with a pattern failed");
    assert_eq!(messages(&found), ["disk full"]);

    let keys = logs
        .iter()
        .filter(|v| v.archived || v.level == 5)
        .map(|v| v.id.clone().into_option().expect("Keys are written back"))
        .collect::<Vec<_>>();
    let found = registry
        .query::<ConditionLog>()
        .unwrap()
        .where_pk_in(keys)
        .find(connection)
        .await
        .expect("where_pk_in failed");
    assert_eq!(messages(&found), ["disk full", "halt"]);

    let found = registry
        .query::<ConditionLog>()
        .unwrap()
        .where_pk_in(Vec::<u64>::new())
        .find(connection)
        .await
        .expect("where_pk_in with no keys failed");
    assert!(found.is_empty());

    let mut map = BTreeMap::new();
    map.insert("archived".to_string(), Value::from(true));
    let found = registry
        .query::<ConditionLog>()
        .unwrap()
        .where_map([("level", 0u8)])
        .filter(map)
        .find(connection)
        .await
        .expect("filter with a map failed");
    assert_eq!(messages(&found), ["halt"]);

    // Placeholder count mismatch is reported, not guessed
    let result = registry
        .query::<ConditionLog>()
        .unwrap()
        .where_raw("level = ? AND archived = ?", [1u8])
        .find(connection)
        .await;
    assert!(matches!(result, Err(strata::Error::InvalidStatement(..))));
}

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[strata(name = "precedence_rows")]
struct PrecedenceRow {
    #[strata(primary_key, auto_increment)]
    id: Passive<u64>,
    level: i32,
    tag: String,
    flagged: bool,
}

impl PrecedenceRow {
    fn new(level: i32, tag: &str, flagged: bool) -> Self {
        Self {
            level,
            tag: tag.into(),
            flagged,
            ..Default::default()
        }
    }
}

/// `A.or(x).or(y)` must mean `(A) OR (x) OR (y)`.
pub async fn or_precedence<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;
    let registry = Registry::new();
    connection
        .ensure_schema(&[registry
            .resolve::<PrecedenceRow>()
            .expect("PrecedenceRow should be a valid entity")])
        .await
        .expect("Could not create the precedence_rows table");

    // No row satisfies the AND chain: only `x` and `y` rows can come back
    let mut rows = vec![
        PrecedenceRow::new(1, "x", false),
        PrecedenceRow::new(1, "y", false),
        PrecedenceRow::new(1, "z", false),
        PrecedenceRow::new(50, "z", false),
    ];
    registry
        .query::<PrecedenceRow>()
        .unwrap()
        .create_in_batches(connection, &mut rows, 2)
        .await
        .expect("Could not insert the precedence rows");

    let query = registry
        .query::<PrecedenceRow>()
        .unwrap()
        .where_raw("level > ?", [10])
        .filter([("flagged", Value::from(true))])
        .or([("tag", Value::from("x"))])
        .or(raw("tag = ?", ["y"]));
    let Some(Condition::Or(left, right)) = &query.plan().condition else {
        panic!("The root of the tree should be the last OR");
    };
    assert!(matches!(**left, Condition::Or(..)));
    assert!(matches!(**right, Condition::Raw { .. }));
    let mut found = query
        .find(connection)
        .await
        .expect("OR query failed")
        .into_iter()
        .map(|v| v.tag)
        .collect::<Vec<_>>();
    found.sort();
    assert_eq!(found, ["x", "y"]);

    // A row satisfying the AND chain joins them
    registry
        .query::<PrecedenceRow>()
        .unwrap()
        .create(connection, &mut PrecedenceRow::new(60, "w", true))
        .await
        .expect("Could not insert the flagged row");
    let mut found = registry
        .query::<PrecedenceRow>()
        .unwrap()
        .where_raw("level > ?", [10])
        .filter([("flagged", Value::from(true))])
        .or([("tag", Value::from("x"))])
        .or([("tag", Value::from("y"))])
        .find(connection)
        .await
        .expect("OR query failed")
        .into_iter()
        .map(|v| v.tag)
        .collect::<Vec<_>>();
    found.sort();
    assert_eq!(found, ["w", "x", "y"]);

    // OR on an empty tree is the fragment itself
    let query = registry
        .query::<PrecedenceRow>()
        .unwrap()
        .or([("tag", Value::from("z"))]);
    assert!(matches!(
        query.plan().condition,
        Some(Condition::Leaf { .. })
    ));
    assert_eq!(query.count(connection).await.expect("count failed"), 2);
}
