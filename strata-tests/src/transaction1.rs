use std::sync::LazyLock;
use strata::{
    Connection, Entity, Error, Outcome, Passive, Registry, Transaction, Value, join_transaction,
    run_in_transaction,
};
use tokio::sync::Mutex;

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[strata(name = "ledger_entries")]
struct LedgerEntry {
    #[strata(primary_key, auto_increment)]
    id: Passive<u64>,
    label: String,
    amount: i64,
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

async fn labels<C: Connection>(registry: &Registry, connection: &mut C) -> Vec<String> {
    registry
        .query::<LedgerEntry>()
        .unwrap()
        .order("id")
        .find(connection)
        .await
        .expect("Could not read the ledger")
        .into_iter()
        .map(|v| v.label)
        .collect()
}

pub async fn transaction1<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;
    let registry = Registry::new();
    connection
        .ensure_schema(&[registry
            .resolve::<LedgerEntry>()
            .expect("LedgerEntry should be a valid entity")])
        .await
        .expect("Could not create the ledger_entries table");
    let mut entries = ["rent", "salary", "coffee"]
        .into_iter()
        .map(|label| LedgerEntry {
            label: label.into(),
            amount: 1,
            ..Default::default()
        })
        .collect::<Vec<_>>();
    registry
        .query::<LedgerEntry>()
        .unwrap()
        .create_in_batches(connection, &mut entries, 0)
        .await
        .expect("Could not insert the ledger entries");
    let coffee = entries[2].id.clone();

    // Rollback: the deleted row is still there afterwards
    let outcome = run_in_transaction(connection, async |transaction| {
        let deleted = registry
            .query::<LedgerEntry>()?
            .where_pk_in(coffee.as_option().copied())
            .delete(transaction)
            .await?;
        assert_eq!(deleted.rows_affected, 1);
        let inside = registry
            .query::<LedgerEntry>()?
            .count(transaction)
            .await?;
        assert_eq!(inside, 2);
        Ok(Outcome::<()>::rollback("dry run"))
    })
    .await
    .expect("The transaction should roll back cleanly");
    assert_eq!(outcome, Outcome::Rollback("dry run".into()));
    assert_eq!(labels(&registry, connection).await, ["rent", "salary", "coffee"]);
    let found = registry
        .query::<LedgerEntry>()
        .unwrap()
        .where_pk_in(coffee.as_option().copied())
        .take(connection)
        .await;
    assert!(found.is_found());

    // Commit: the row is gone
    let outcome = run_in_transaction(connection, async |transaction| {
        let deleted = registry
            .query::<LedgerEntry>()?
            .where_pk_in(coffee.as_option().copied())
            .delete(transaction)
            .await?;
        Ok(Outcome::Commit(deleted.rows_affected))
    })
    .await
    .expect("The transaction should commit");
    assert_eq!(outcome, Outcome::Commit(1));
    assert_eq!(labels(&registry, connection).await, ["rent", "salary"]);
    let found = registry
        .query::<LedgerEntry>()
        .unwrap()
        .where_pk_in(coffee.as_option().copied())
        .take(connection)
        .await;
    assert!(found.is_not_found());

    // An error rolls back and is handed back to the caller
    let result = run_in_transaction(connection, async |transaction| {
        registry
            .query::<LedgerEntry>()?
            .where_map([("label", "rent")])
            .update(transaction, "amount", Value::from(500i64))
            .await?;
        registry
            .query::<LedgerEntry>()?
            .delete(transaction)
            .await?;
        Ok(Outcome::Commit(()))
    })
    .await;
    assert!(result.expect_err("Unsafe delete").is_unsafe_delete());
    let rent = registry
        .query::<LedgerEntry>()
        .unwrap()
        .where_map([("label", "rent")])
        .first(connection)
        .await
        .into_result()
        .expect("The rent entry should exist");
    assert_eq!(rent.amount, 1);

    // A nested unit asking for a rollback takes the whole transaction down
    let result = run_in_transaction(connection, async |transaction| {
        let mut entry = LedgerEntry {
            label: "bonus".into(),
            amount: 10,
            ..Default::default()
        };
        registry
            .query::<LedgerEntry>()?
            .create(transaction, &mut entry)
            .await?;
        let total = join_transaction(transaction, async |transaction| {
            let count = registry
                .query::<LedgerEntry>()?
                .count(transaction)
                .await?;
            if count > 2 {
                return Ok(Outcome::rollback("too many entries"));
            }
            Ok(Outcome::Commit(count))
        })
        .await?;
        Ok(Outcome::Commit(total))
    })
    .await;
    let error = result.expect_err("The nested rollback should fail the transaction");
    assert!(
        matches!(&error, Error::RolledBack(reason) if reason == "too many entries"),
        "{error:?}"
    );
    assert_eq!(labels(&registry, connection).await, ["rent", "salary"]);

    // Dropped without a commit
    {
        let mut transaction = connection
            .begin()
            .await
            .expect("Could not begin a transaction");
        registry
            .query::<LedgerEntry>()
            .unwrap()
            .create(
                &mut transaction,
                &mut LedgerEntry {
                    label: "lost".into(),
                    ..Default::default()
                },
            )
            .await
            .expect("Could not insert inside the transaction");
    }
    assert_eq!(labels(&registry, connection).await, ["rent", "salary"]);

    // Explicit commit through the handle
    let mut transaction = connection
        .begin()
        .await
        .expect("Could not begin a transaction");
    registry
        .query::<LedgerEntry>()
        .unwrap()
        .create(
            &mut transaction,
            &mut LedgerEntry {
                label: "kept".into(),
                amount: 3,
                ..Default::default()
            },
        )
        .await
        .expect("Could not insert inside the transaction");
    transaction
        .commit()
        .await
        .expect("Failed to commit the transaction");
    assert_eq!(labels(&registry, connection).await, ["rent", "salary", "kept"]);
}
