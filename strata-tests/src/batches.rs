use crate::Recorder;
use std::sync::LazyLock;
use strata::{
    Connection, Entity, Error, MutationBatch, Outcome, Passive, Registry, Statement,
    run_in_transaction,
};
use tokio::sync::Mutex;

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[strata(name = "batch_events")]
struct BatchEvent {
    #[strata(primary_key, auto_increment)]
    id: Passive<u64>,
    #[strata(unique)]
    name: String,
    weight: i32,
}

impl BatchEvent {
    fn new(name: &str, weight: i32) -> Self {
        Self {
            name: name.into(),
            weight,
            ..Default::default()
        }
    }
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn batches<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;
    let registry = Registry::new();
    let metadata = registry
        .resolve::<BatchEvent>()
        .expect("BatchEvent should be a valid entity");
    connection
        .ensure_schema(&[metadata.clone()])
        .await
        .expect("Could not create the batch_events table");

    let mut events = (1..=6)
        .map(|i| BatchEvent::new(&format!("event {i}"), i * 10))
        .collect::<Vec<_>>();
    assert_eq!(
        MutationBatch::new(&metadata, events.iter(), &[])
            .chunk_size(2)
            .chunks(),
        3
    );

    let mut recorder = Recorder::new(connection);
    let result = registry
        .query::<BatchEvent>()
        .unwrap()
        .create_in_batches(&mut recorder, &mut events, 2)
        .await
        .expect("Could not insert the events in batches");
    assert_eq!(result.rows_affected, 6);
    assert_eq!(recorder.statements.len(), 3);
    for statement in &recorder.statements {
        let Statement::Insert(plan) = statement else {
            panic!("Expected only inserts, found {statement:?}");
        };
        assert_eq!(plan.rows.len(), 2);
        // The key is generated, not sent
        assert_eq!(plan.columns, ["name", "weight"]);
    }
    let keys = events
        .iter()
        .map(|v| *v.id.as_option().expect("Every key should be written back"))
        .collect::<Vec<_>>();
    assert!(keys.windows(2).all(|v| v[0] < v[1]), "Keys {keys:?}");

    let stored = registry
        .query::<BatchEvent>()
        .unwrap()
        .order("id")
        .find(connection)
        .await
        .expect("Could not read the events back");
    assert_eq!(stored, events);

    // The third record collides, the first chunk stays applied
    let mut more = vec![
        BatchEvent::new("event 7", 70),
        BatchEvent::new("event 8", 80),
        BatchEvent::new("event 1", 90),
        BatchEvent::new("event 9", 100),
    ];
    let error = registry
        .query::<BatchEvent>()
        .unwrap()
        .create_in_batches(connection, &mut more, 2)
        .await
        .expect_err("The second chunk should collide on the unique name");
    assert!(error.is_conflict());
    let Error::PartialBatch { applied, .. } = error else {
        panic!("Expected a partial batch, found {error:?}");
    };
    assert_eq!(applied, 2);
    assert!(more[0].id.is_set() && more[1].id.is_set());
    assert!(!more[2].id.is_set() && !more[3].id.is_set());
    let count = registry
        .query::<BatchEvent>()
        .unwrap()
        .count(connection)
        .await
        .expect("count failed");
    assert_eq!(count, 8);

    // Inside a transaction nothing stays applied
    let mut others = vec![
        BatchEvent::new("event 10", 1),
        BatchEvent::new("event 11", 1),
        BatchEvent::new("event 2", 1),
    ];
    let result = run_in_transaction(connection, async |transaction| {
        registry
            .query::<BatchEvent>()?
            .create_in_batches(transaction, &mut others, 1)
            .await?;
        Ok(Outcome::Commit(()))
    })
    .await;
    assert!(result.expect_err("The batch should fail").is_conflict());
    let count = registry
        .query::<BatchEvent>()
        .unwrap()
        .count(connection)
        .await
        .expect("count failed");
    assert_eq!(count, 8);

    // Only the selected columns (and the key) are written
    let mut partial = BatchEvent::new("event 12", 999);
    registry
        .query::<BatchEvent>()
        .unwrap()
        .select(["name"])
        .create(connection, &mut partial)
        .await
        .expect("Could not insert the selected columns");
    let stored = registry
        .query::<BatchEvent>()
        .unwrap()
        .where_map([("name", "event 12")])
        .first(connection)
        .await
        .into_result()
        .expect("The partial event should exist");
    assert_eq!(stored.id, partial.id);
    assert_eq!(stored.weight, 0);

    // Nothing to insert, nothing sent
    let mut recorder = Recorder::new(connection);
    let result = registry
        .query::<BatchEvent>()
        .unwrap()
        .create_in_batches(&mut recorder, &mut [], 3)
        .await
        .expect("An empty batch should succeed");
    assert_eq!(result.rows_affected, 0);
    assert!(recorder.statements.is_empty());
}
