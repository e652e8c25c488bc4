use crate::Recorder;
use std::sync::LazyLock;
use strata::{Assignment, Connection, Entity, Error, Passive, Registry, Value, expr};
use tokio::sync::Mutex;

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[strata(name = "tasks")]
struct Task {
    #[strata(primary_key, auto_increment)]
    id: Passive<u64>,
    title: String,
    priority: u8,
    done: bool,
}

impl Task {
    fn new(title: &str, priority: u8) -> Self {
        Self {
            title: title.into(),
            priority,
            ..Default::default()
        }
    }
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

async fn count<C: Connection>(registry: &Registry, connection: &mut C) -> u64 {
    registry
        .query::<Task>()
        .unwrap()
        .count(connection)
        .await
        .expect("count failed")
}

pub async fn deletes<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;
    let registry = Registry::new();
    connection
        .ensure_schema(&[registry
            .resolve::<Task>()
            .expect("Task should be a valid entity")])
        .await
        .expect("Could not create the tasks table");
    let mut tasks = vec![
        Task::new("write", 1),
        Task::new("review", 2),
        Task::new("deploy", 3),
        Task::new("celebrate", 3),
    ];
    registry
        .query::<Task>()
        .unwrap()
        .create_in_batches(connection, &mut tasks, 0)
        .await
        .expect("Could not insert the tasks");

    // Neither a condition nor a key: refused before reaching the backend
    let mut recorder = Recorder::new(connection);
    let error = registry
        .query::<Task>()
        .unwrap()
        .delete(&mut recorder)
        .await
        .expect_err("A delete without conditions should be refused");
    assert!(error.is_unsafe_delete(), "{error:?}");
    assert!(recorder.statements.is_empty());
    let error = registry
        .query::<Task>()
        .unwrap()
        .delete_record(&mut recorder, &Task::new("write", 1))
        .await
        .expect_err("A record without a key should be refused");
    assert!(error.is_unsafe_delete(), "{error:?}");
    let error = registry
        .query::<Task>()
        .unwrap()
        .update(&mut recorder, "done", Value::from(true))
        .await
        .expect_err("An update without conditions should be refused");
    assert!(error.is_unsafe_update(), "{error:?}");
    assert!(matches!(error, Error::UnsafeUpdate { ref table } if table == "tasks"));
    assert!(recorder.statements.is_empty());
    assert_eq!(count(&registry, connection).await, 4);

    // By key
    let result = registry
        .query::<Task>()
        .unwrap()
        .delete_record(connection, &tasks[0])
        .await
        .expect("Could not delete the first task");
    assert_eq!(result.rows_affected, 1);
    assert_eq!(count(&registry, connection).await, 3);
    // Deleting it again removes nothing and is not an error
    let result = registry
        .query::<Task>()
        .unwrap()
        .delete_record(connection, &tasks[0])
        .await
        .expect("Deleting a missing row should succeed");
    assert_eq!(result.rows_affected, 0);

    // Key and condition together
    let result = registry
        .query::<Task>()
        .unwrap()
        .where_map([("priority", 9u8)])
        .delete_record(connection, &tasks[1])
        .await
        .expect("Could not run the restricted delete");
    assert_eq!(result.rows_affected, 0);

    // Expressions are evaluated against the current row
    let result = registry
        .query::<Task>()
        .unwrap()
        .where_raw("priority >= ?", [2u8])
        .returning(["title", "priority"])
        .update(connection, "priority", expr("priority + ?", [1]))
        .await
        .expect("Could not bump the priorities");
    assert_eq!(result.rows_affected, 3);
    let mut bumped = result
        .returning
        .iter()
        .map(|row| {
            (
                row.get_column("title")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                row.get_column("priority")
                    .and_then(Value::as_i128)
                    .unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>();
    bumped.sort();
    assert_eq!(
        bumped,
        [
            ("celebrate".to_string(), 4),
            ("deploy".to_string(), 4),
            ("review".to_string(), 3),
        ]
    );

    // Only the named columns are touched, zero values included
    let result = registry
        .query::<Task>()
        .unwrap()
        .where_map([("title", "deploy")])
        .updates(
            connection,
            [
                ("done", Assignment::Literal(Value::from(true))),
                ("priority", Assignment::Literal(Value::from(0u8))),
            ],
        )
        .await
        .expect("Could not update the deploy task");
    assert_eq!(result.rows_affected, 1);
    let deploy = registry
        .query::<Task>()
        .unwrap()
        .where_map([("title", "deploy")])
        .take(connection)
        .await
        .into_result()
        .expect("The deploy task should exist");
    assert!(deploy.done);
    assert_eq!(deploy.priority, 0);
    assert_eq!(deploy.id, tasks[2].id);

    let error = registry
        .query::<Task>()
        .unwrap()
        .where_map([("title", "deploy")])
        .updates(connection, [("owner", Assignment::Literal(Value::from("me")))])
        .await
        .expect_err("Unknown columns are refused");
    assert!(matches!(error, Error::InvalidStatement(..)), "{error:?}");

    // Deleted rows can be handed back
    let result = registry
        .query::<Task>()
        .unwrap()
        .where_map([("done", true)])
        .returning(["title"])
        .delete(connection)
        .await
        .expect("Could not delete the finished tasks");
    assert_eq!(result.rows_affected, 1);
    assert_eq!(result.returning.len(), 1);
    assert_eq!(
        result.returning[0].get_column("title"),
        Some(&Value::from("deploy"))
    );
    let mut remaining = registry
        .query::<Task>()
        .unwrap()
        .find(connection)
        .await
        .expect("Could not read the remaining tasks")
        .into_iter()
        .map(|v| v.title)
        .collect::<Vec<_>>();
    remaining.sort();
    assert_eq!(remaining, ["celebrate", "review"]);
}
