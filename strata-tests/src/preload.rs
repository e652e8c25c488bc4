use crate::Recorder;
use std::sync::LazyLock;
use strata::{Association, Connection, Entity, Error, Passive, Registry, Statement, Value};
use tokio::sync::Mutex;

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[strata(name = "logs")]
struct Log {
    #[strata(primary_key, auto_increment)]
    id: Passive<u64>,
    level: u8,
    message: String,
    #[strata(foreign_key = "log_id")]
    details: Association<LogDetail>,
}

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[strata(name = "log_details")]
struct LogDetail {
    #[strata(primary_key, auto_increment)]
    id: Passive<u64>,
    log_id: u64,
    body: String,
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn preload<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;
    let registry = Registry::new();
    registry
        .resolve::<Log>()
        .expect("Log should be a valid entity");
    registry
        .resolve::<LogDetail>()
        .expect("LogDetail should be a valid entity");
    assert_eq!(registry.resolved().len(), 2);
    connection
        .ensure_schema(&registry.resolved())
        .await
        .expect("Could not create the logs tables");

    let mut logs = ["boot", "disk full", "halt"]
        .into_iter()
        .enumerate()
        .map(|(i, message)| Log {
            level: i as u8 + 1,
            message: message.into(),
            ..Default::default()
        })
        .collect::<Vec<_>>();
    registry
        .query::<Log>()
        .unwrap()
        .create_in_batches(connection, &mut logs, 0)
        .await
        .expect("Could not insert the logs");
    let key = |i: usize| *logs[i].id.as_option().expect("Keys are written back");
    let mut details = vec![
        LogDetail {
            log_id: key(0),
            body: "kernel loaded".into(),
            ..Default::default()
        },
        LogDetail {
            log_id: key(1),
            body: "/dev/sda1 at 100%".into(),
            ..Default::default()
        },
        LogDetail {
            log_id: key(0),
            body: "services started".into(),
            ..Default::default()
        },
    ];
    registry
        .query::<LogDetail>()
        .unwrap()
        .create_in_batches(connection, &mut details, 0)
        .await
        .expect("Could not insert the details");

    // One query for the parents, one for all of their children
    let mut recorder = Recorder::new(connection);
    let loaded = registry
        .query::<Log>()
        .unwrap()
        .preload("details")
        .order("id")
        .find(&mut recorder)
        .await
        .expect("Could not preload the details");
    assert_eq!(recorder.reads(), 2);
    let Statement::Select(plan) = &recorder.statements[1] else {
        panic!("The second statement should read the details");
    };
    assert_eq!(plan.table, "log_details");
    assert_eq!(loaded.len(), 3);
    fn bodies(log: &Log) -> Vec<&str> {
        log.details
            .as_slice()
            .iter()
            .map(|v| v.body.as_str())
            .collect::<Vec<_>>()
    }
    assert_eq!(bodies(&loaded[0]), ["kernel loaded", "services started"]);
    assert_eq!(bodies(&loaded[1]), ["/dev/sda1 at 100%"]);
    assert!(loaded[2].details.is_loaded());
    assert!(loaded[2].details.is_empty());

    // Without preload the slots stay untouched and no child query runs
    let mut recorder = Recorder::new(connection);
    let plain = registry
        .query::<Log>()
        .unwrap()
        .find(&mut recorder)
        .await
        .expect("Could not read the logs");
    assert_eq!(recorder.statements.len(), 1);
    assert!(plain.iter().all(|v| !v.details.is_loaded()));

    // Singular fetches preload as well
    let full = registry
        .query::<Log>()
        .unwrap()
        .where_map([("message", Value::from("disk full"))])
        .preload("details")
        .first(connection)
        .await
        .into_result()
        .expect("The disk log should exist");
    assert_eq!(full.details.len(), 1);

    // A projection without the key still finds the children
    let mut recorder = Recorder::new(connection);
    let narrow = registry
        .query::<Log>()
        .unwrap()
        .select(["message"])
        .where_map([("message", Value::from("boot"))])
        .preload("details")
        .find(&mut recorder)
        .await
        .expect("Could not preload through a projection");
    let Statement::Select(plan) = &recorder.statements[0] else {
        panic!("The first statement should read the logs");
    };
    assert_eq!(plan.columns, ["message", "logs.id"]);
    assert_eq!(narrow.len(), 1);
    assert_eq!(narrow[0].level, 0);
    assert_eq!(bodies(&narrow[0]), ["kernel loaded", "services started"]);

    // One parent row per joined detail, every copy gets the children
    let twice = registry
        .query::<Log>()
        .unwrap()
        .where_map([("message", Value::from("boot"))])
        .join("LEFT JOIN log_details ON log_details.log_id = logs.id")
        .select(["logs.*"])
        .preload("details")
        .find(connection)
        .await
        .expect("Could not preload duplicated parents");
    assert_eq!(twice.len(), 2);
    assert!(twice.iter().all(|v| bodies(v) == ["kernel loaded", "services started"]));

    // No parent, no child query
    let mut recorder = Recorder::new(connection);
    let none = registry
        .query::<Log>()
        .unwrap()
        .where_raw("level > ?", [10u8])
        .preload("details")
        .find(&mut recorder)
        .await
        .expect("Could not read the logs");
    assert!(none.is_empty());
    assert_eq!(recorder.statements.len(), 1);

    let error = registry
        .query::<Log>()
        .unwrap()
        .preload("comments")
        .find(connection)
        .await
        .expect_err("Unknown associations are refused");
    assert!(matches!(error, Error::Schema(..)), "{error:?}");
}
