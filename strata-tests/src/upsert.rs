use crate::Recorder;
use rust_decimal::Decimal;
use std::{str::FromStr, sync::LazyLock};
use strata::{Connection, Entity, OnConflict, Passive, Registry, Statement, Value};
use time::macros::datetime;
use tokio::sync::Mutex;

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[strata(name = "accounts")]
struct Account {
    #[strata(primary_key)]
    code: String,
    owner: String,
    balance: Decimal,
    note: Option<String>,
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

fn decimal(value: &str) -> Decimal {
    Decimal::from_str(value).expect("Valid decimal literal")
}

pub async fn upsert<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;
    let registry = Registry::new();
    connection
        .ensure_schema(&[registry
            .resolve::<Account>()
            .expect("Account should be a valid entity")])
        .await
        .expect("Could not create the accounts table");

    let mut account = Account {
        code: "A1".into(),
        owner: "ann".into(),
        balance: decimal("10.50"),
        note: Some("first".into()),
    };
    registry
        .query::<Account>()
        .unwrap()
        .create(connection, &mut account)
        .await
        .expect("Could not create the account");

    // Plain insert of a taken key
    let error = registry
        .query::<Account>()
        .unwrap()
        .create(connection, &mut account.clone())
        .await
        .expect_err("A duplicate key should be refused");
    assert!(error.is_conflict(), "{error:?}");

    // Overwrite everything but the key, nothing of the old row survives
    let mut replacement = Account {
        code: "A1".into(),
        owner: "bob".into(),
        balance: decimal("25"),
        note: None,
    };
    let result = registry
        .query::<Account>()
        .unwrap()
        .on_conflict(OnConflict::UpdateAll)
        .create(connection, &mut replacement)
        .await
        .expect("Upsert failed");
    assert_eq!(result.rows_affected, 1);
    let stored = registry
        .query::<Account>()
        .unwrap()
        .where_pk_in(["A1"])
        .take(connection)
        .await
        .into_result()
        .expect("The account should still exist");
    assert_eq!(
        stored,
        Account {
            code: "A1".into(),
            owner: "bob".into(),
            balance: decimal("25"),
            note: None,
        }
    );
    assert_eq!(replacement, stored);
    let count = registry
        .query::<Account>()
        .unwrap()
        .count(connection)
        .await
        .expect("count failed");
    assert_eq!(count, 1);

    // Keep the stored row, the record is refreshed from it
    let mut ignored = Account {
        code: "A1".into(),
        owner: "carol".into(),
        balance: decimal("1"),
        note: Some("ignored".into()),
    };
    let result = registry
        .query::<Account>()
        .unwrap()
        .on_conflict(OnConflict::DoNothing)
        .create(connection, &mut ignored)
        .await
        .expect("Upsert with do nothing failed");
    assert_eq!(result.rows_affected, 0);
    assert_eq!(ignored.owner, "bob");

    // Only the listed columns change
    let mut partial = Account {
        code: "A1".into(),
        owner: "dave".into(),
        balance: decimal("99.99"),
        note: Some("partial".into()),
    };
    registry
        .query::<Account>()
        .unwrap()
        .on_conflict(OnConflict::UpdateColumns(vec!["balance".into()]))
        .create(connection, &mut partial)
        .await
        .expect("Upsert of one column failed");
    assert_eq!(partial.owner, "bob");
    assert_eq!(partial.balance, decimal("99.99"));
    assert_eq!(partial.note, None);

    // A listed column left out of the insert keeps its stored value
    let mut renamed = Account {
        code: "A1".into(),
        owner: "hank".into(),
        balance: decimal("1"),
        note: None,
    };
    registry
        .query::<Account>()
        .unwrap()
        .select(["owner"])
        .on_conflict(OnConflict::UpdateColumns(vec![
            "owner".into(),
            "balance".into(),
        ]))
        .create(connection, &mut renamed)
        .await
        .expect("Upsert of the selected columns failed");
    let stored = registry
        .query::<Account>()
        .unwrap()
        .where_pk_in(["A1"])
        .take(connection)
        .await
        .into_result()
        .expect("The account should still exist");
    assert_eq!(stored.owner, "hank");
    assert_eq!(stored.balance, decimal("99.99"));
    assert_eq!(renamed, stored);

    // Rows without a collision are inserted as usual, in the same statement
    let mut accounts = vec![
        Account {
            code: "A1".into(),
            owner: "erin".into(),
            balance: decimal("5"),
            note: None,
        },
        Account {
            code: "B2".into(),
            owner: "frank".into(),
            balance: decimal("7"),
            note: None,
        },
    ];
    let result = registry
        .query::<Account>()
        .unwrap()
        .on_conflict(OnConflict::UpdateAll)
        .create_in_batches(connection, &mut accounts, 0)
        .await
        .expect("Mixed upsert failed");
    assert_eq!(result.rows_affected, 2);
    assert_eq!(
        result.generated_keys,
        [Value::from("A1"), Value::from("B2")]
    );
    assert_eq!(accounts[0].owner, "erin");

    // first_or_create: a miss inserts, a hit returns the stored row
    let mut recorder = Recorder::new(connection);
    let created = registry
        .query::<Account>()
        .unwrap()
        .first_or_create(
            &mut recorder,
            Account {
                code: "C3".into(),
                owner: "gina".into(),
                balance: decimal("3"),
                note: None,
            },
        )
        .await
        .expect("first_or_create failed");
    assert_eq!(created.code, "C3");
    assert!(matches!(recorder.statements[..], [Statement::Select(..), Statement::Insert(..)]));
    let mut recorder = Recorder::new(connection);
    let found = registry
        .query::<Account>()
        .unwrap()
        .where_map([("owner", "gina")])
        .first_or_create(
            &mut recorder,
            Account {
                code: "C3".into(),
                ..Default::default()
            },
        )
        .await
        .expect("first_or_create failed");
    assert_eq!(found, created);
    assert_eq!(recorder.statements.len(), 1);

    // The lookup misses but the key is taken, as when another caller inserted first
    let mut recorder = Recorder::new(connection);
    let error = registry
        .query::<Account>()
        .unwrap()
        .where_map([("owner", "nobody")])
        .first_or_create(
            &mut recorder,
            Account {
                code: "A1".into(),
                owner: "ivy".into(),
                ..Default::default()
            },
        )
        .await
        .expect_err("The insert should collide with the stored key");
    assert!(error.is_conflict(), "{error:?}");
    assert!(matches!(recorder.statements[..], [Statement::Select(..), Statement::Insert(..)]));

    // A record with no populated field looks up without any condition
    let mut recorder = Recorder::new(connection);
    let any = registry
        .query::<Account>()
        .unwrap()
        .first_or_create(&mut recorder, Account::default())
        .await
        .expect("first_or_create failed");
    assert_eq!(any.code, "A1");
    let [Statement::Select(plan)] = &recorder.statements[..] else {
        panic!("Expected one select, found {:?}", recorder.statements);
    };
    assert_eq!(plan.condition, None);
    let count = registry
        .query::<Account>()
        .unwrap()
        .count(connection)
        .await
        .expect("count failed");
    assert_eq!(count, 3);
}

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[strata(name = "saved_notes")]
struct SavedNote {
    #[strata(primary_key, auto_increment)]
    id: Passive<i64>,
    title: String,
    pinned: bool,
    edited: Option<time::PrimitiveDateTime>,
}

pub async fn save<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;
    let registry = Registry::new();
    connection
        .ensure_schema(&[registry
            .resolve::<SavedNote>()
            .expect("SavedNote should be a valid entity")])
        .await
        .expect("Could not create the saved_notes table");

    // No key: insert
    let mut note = SavedNote {
        title: "groceries".into(),
        pinned: true,
        ..Default::default()
    };
    registry
        .query::<SavedNote>()
        .unwrap()
        .save(connection, &mut note)
        .await
        .expect("Could not save a new note");
    assert!(note.id.is_set());

    // Key: full column update, zero values included
    note.title = "chores".into();
    note.pinned = false;
    note.edited = Some(datetime!(2024-05-01 10:30));
    let mut recorder = Recorder::new(connection);
    registry
        .query::<SavedNote>()
        .unwrap()
        .save(&mut recorder, &mut note)
        .await
        .expect("Could not update the note");
    let [Statement::Update(plan)] = &recorder.statements[..] else {
        panic!("Expected one update, found {:?}", recorder.statements);
    };
    assert_eq!(plan.assignments.len(), 3);
    let stored = registry
        .query::<SavedNote>()
        .unwrap()
        .first(connection)
        .await
        .into_result()
        .expect("The note should exist");
    assert_eq!(stored, note);

    // Key without a row: the update misses, then the record is inserted
    let mut ghost = SavedNote {
        id: Passive::Set(100),
        title: "ghost".into(),
        ..Default::default()
    };
    let mut recorder = Recorder::new(connection);
    registry
        .query::<SavedNote>()
        .unwrap()
        .save(&mut recorder, &mut ghost)
        .await
        .expect("Could not save the ghost note");
    assert!(matches!(
        recorder.statements[..],
        [Statement::Update(..), Statement::Insert(..)]
    ));
    let last = registry
        .query::<SavedNote>()
        .unwrap()
        .last(connection)
        .await
        .into_result()
        .expect("The ghost note should exist");
    assert_eq!(last, ghost);
    assert_eq!(
        registry
            .query::<SavedNote>()
            .unwrap()
            .count(connection)
            .await
            .expect("count failed"),
        2
    );
}
