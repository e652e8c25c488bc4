use crate::Recorder;
use std::sync::LazyLock;
use strata::{Connection, Entity, Locking, Passive, Registry, RowLabeled, Statement, Value};
use tokio::sync::Mutex;

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[strata(name = "sales")]
struct Sale {
    #[strata(primary_key, auto_increment)]
    id: Passive<u32>,
    region: String,
    product: String,
    amount: i32,
    discount: Option<i32>,
}

impl Sale {
    fn new(region: &str, product: &str, amount: i32, discount: Option<i32>) -> Self {
        Self {
            region: region.into(),
            product: product.into(),
            amount,
            discount,
            ..Default::default()
        }
    }
}

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[strata(name = "regions")]
struct Region {
    #[strata(primary_key)]
    code: String,
    manager: String,
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

async fn setup<C: Connection>(registry: &Registry, connection: &mut C) {
    registry
        .resolve::<Sale>()
        .expect("Sale should be a valid entity");
    registry
        .resolve::<Region>()
        .expect("Region should be a valid entity");
    connection
        .ensure_schema(&registry.resolved())
        .await
        .expect("Could not create the sales tables");
    let existing = registry
        .query::<Sale>()
        .unwrap()
        .count(connection)
        .await
        .expect("count failed");
    if existing > 0 {
        return;
    }
    registry
        .query::<Sale>()
        .unwrap()
        .create_in_batches(
            connection,
            &mut [
                Sale::new("north", "apple", 10, None),
                Sale::new("north", "pear", 20, Some(5)),
                Sale::new("south", "apple", 30, None),
                Sale::new("east", "pear", 40, Some(1)),
                Sale::new("south", "plum", 50, None),
            ],
            2,
        )
        .await
        .expect("Could not insert the sales");
    registry
        .query::<Region>()
        .unwrap()
        .create_in_batches(
            connection,
            &mut [
                Region {
                    code: "north".into(),
                    manager: "ann".into(),
                },
                Region {
                    code: "south".into(),
                    manager: "bob".into(),
                },
            ],
            0,
        )
        .await
        .expect("Could not insert the regions");
}

fn column(rows: &[RowLabeled], name: &str) -> Vec<Value> {
    rows.iter()
        .map(|row| row.get_column(name).cloned().unwrap_or_default())
        .collect()
}

fn integers(rows: &[RowLabeled], name: &str) -> Vec<Option<i128>> {
    rows.iter()
        .map(|row| row.get_column(name).and_then(Value::as_i128))
        .collect()
}

pub async fn reads<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;
    let registry = Registry::new();
    setup(&registry, connection).await;

    let first = registry
        .query::<Sale>()
        .unwrap()
        .first(connection)
        .await
        .into_result()
        .expect("There should be a first sale");
    assert_eq!(first.amount, 10);
    let last = registry
        .query::<Sale>()
        .unwrap()
        .last(connection)
        .await
        .into_result()
        .expect("There should be a last sale");
    assert_eq!(last.product, "plum");
    let taken = registry
        .query::<Sale>()
        .unwrap()
        .where_map([("region", "south")])
        .take(connection)
        .await
        .into_result()
        .expect("There should be a sale in the south");
    assert_eq!(taken.region, "south");

    // Singular fetch limits the statement to one row
    let mut recorder = Recorder::new(connection);
    let _ = registry
        .query::<Sale>()
        .unwrap()
        .where_map([("product", "apple")])
        .first(&mut recorder)
        .await;
    let [Statement::Select(plan)] = &recorder.statements[..] else {
        panic!("Expected one read, found {:?}", recorder.statements);
    };
    assert_eq!(plan.limit, Some(1));
    assert_eq!(plan.order_by, ["sales.id"]);

    // No row is not a fault
    let missing = registry
        .query::<Sale>()
        .unwrap()
        .where_map([("region", "west")])
        .first(connection)
        .await;
    assert!(missing.is_not_found());
    let missing = registry
        .query::<Sale>()
        .unwrap()
        .where_map([("region", "west")])
        .take(connection)
        .await
        .into_option()
        .expect("A missing row should not be an error here");
    assert_eq!(missing, None);
    let error = registry
        .query::<Sale>()
        .unwrap()
        .where_map([("region", "west")])
        .last(connection)
        .await
        .into_result()
        .expect_err("A missing row should be NotFound");
    assert!(error.is_not_found());
    let all = registry
        .query::<Sale>()
        .unwrap()
        .where_map([("region", "west")])
        .find(connection)
        .await
        .expect("An empty find should succeed");
    assert!(all.is_empty());

    let count = registry
        .query::<Sale>()
        .unwrap()
        .count(connection)
        .await
        .expect("count failed");
    assert_eq!(count, 5);
    let count = registry
        .query::<Sale>()
        .unwrap()
        .where_raw("amount > ?", [25])
        .order("amount")
        .limit(1)
        .count(connection)
        .await
        .expect("count failed");
    assert_eq!(count, 3);

    let amounts = |sales: Vec<Sale>| sales.into_iter().map(|v| v.amount).collect::<Vec<_>>();
    let page = registry
        .query::<Sale>()
        .unwrap()
        .order("amount DESC")
        .limit(2)
        .offset(1)
        .find(connection)
        .await
        .expect("Could not read a page");
    assert_eq!(amounts(page), [40, 30]);
    let sorted = registry
        .query::<Sale>()
        .unwrap()
        .order("region")
        .order("amount DESC")
        .find(connection)
        .await
        .expect("Could not sort on two columns");
    assert_eq!(amounts(sorted), [40, 20, 10, 50, 30]);
    let beyond = registry
        .query::<Sale>()
        .unwrap()
        .offset(10)
        .find(connection)
        .await
        .expect("An offset past the end should succeed");
    assert!(beyond.is_empty());

    let locked = registry
        .query::<Sale>()
        .unwrap()
        .where_pk_in([2u32])
        .lock(Locking::ForUpdate)
        .find(connection)
        .await
        .expect("Could not read with a lock");
    assert_eq!(locked.len(), 1);
    assert_eq!(locked[0].discount, Some(5));

    // NULL conditions
    let undiscounted = registry
        .query::<Sale>()
        .unwrap()
        .where_map([("discount", Value::Null)])
        .count(connection)
        .await
        .expect("count failed");
    assert_eq!(undiscounted, 3);
    let discounted = registry
        .query::<Sale>()
        .unwrap()
        .not([("discount", Value::Null)])
        .count(connection)
        .await
        .expect("count failed");
    assert_eq!(discounted, 2);
    // Comparing with NULL is unknown, so not a match either way
    let compared = registry
        .query::<Sale>()
        .unwrap()
        .where_raw("discount <> ?", [5])
        .count(connection)
        .await
        .expect("count failed");
    assert_eq!(compared, 1);

    // Projections
    let rows = registry
        .query::<Sale>()
        .unwrap()
        .select(["product", "amount * 2 AS doubled", "upper(region) AS area"])
        .where_map([("product", "apple")])
        .order("id")
        .rows(connection)
        .await
        .expect("Could not read the projection");
    assert_eq!(rows[0].names(), ["product", "doubled", "area"]);
    assert_eq!(integers(&rows, "doubled"), [Some(20), Some(60)]);
    assert_eq!(
        column(&rows, "area"),
        [Value::from("NORTH"), Value::from("SOUTH")]
    );

    let rows = registry
        .query::<Sale>()
        .unwrap()
        .distinct(["product"])
        .order("product")
        .rows(connection)
        .await
        .expect("Could not read the distinct products");
    assert_eq!(
        column(&rows, "product"),
        [Value::from("apple"), Value::from("pear"), Value::from("plum")]
    );
    let count = registry
        .query::<Sale>()
        .unwrap()
        .distinct(["region"])
        .count(connection)
        .await
        .expect("count failed");
    assert_eq!(count, 3);

    // Joins
    let rows = registry
        .query::<Sale>()
        .unwrap()
        .select(["sales.id", "r.manager"])
        .join("LEFT JOIN regions r ON r.code = sales.region")
        .order("sales.id")
        .rows(connection)
        .await
        .expect("Could not read the left join");
    assert_eq!(rows.len(), 5);
    assert_eq!(
        column(&rows, "manager"),
        [
            Value::from("ann"),
            Value::from("ann"),
            Value::from("bob"),
            Value::Null,
            Value::from("bob"),
        ]
    );
    let managed = registry
        .query::<Sale>()
        .unwrap()
        .join("JOIN regions ON regions.code = sales.region")
        .where_raw("regions.manager = ?", ["bob"])
        .order("sales.amount DESC")
        .find(connection)
        .await
        .expect("Could not read the inner join");
    assert_eq!(amounts(managed), [50, 30]);
}

pub async fn aggregates<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;
    let registry = Registry::new();
    setup(&registry, connection).await;

    let rows = registry
        .query::<Sale>()
        .unwrap()
        .select(["region", "count(*) AS orders", "sum(amount) AS total"])
        .group(["region"])
        .order("region")
        .rows(connection)
        .await
        .expect("Could not group the sales");
    assert_eq!(
        column(&rows, "region"),
        [Value::from("east"), Value::from("north"), Value::from("south")]
    );
    assert_eq!(integers(&rows, "orders"), [Some(1), Some(2), Some(2)]);
    assert_eq!(integers(&rows, "total"), [Some(40), Some(30), Some(80)]);

    let rows = registry
        .query::<Sale>()
        .unwrap()
        .select(["region", "sum(amount) AS total"])
        .group(["region"])
        .having("count(*) > ?", [1])
        .having("total >= ?", [50])
        .rows(connection)
        .await
        .expect("Could not filter the groups");
    assert_eq!(column(&rows, "region"), [Value::from("south")]);

    let groups = registry
        .query::<Sale>()
        .unwrap()
        .group(["product"])
        .select(["product"])
        .count(connection)
        .await
        .expect("count failed");
    assert_eq!(groups, 3);

    let rows = registry
        .query::<Sale>()
        .unwrap()
        .select([
            "max(amount) AS top",
            "min(amount) AS bottom",
            "avg(amount) AS mean",
            "count(discount) AS discounted",
            "count(DISTINCT product) AS products",
            "sum(coalesce(discount, 0)) AS discounts",
        ])
        .rows(connection)
        .await
        .expect("Could not aggregate the sales");
    let [row] = &rows[..] else {
        panic!("An aggregate without groups yields one row, found {rows:?}");
    };
    assert_eq!(row.get_column("top").and_then(Value::as_i128), Some(50));
    assert_eq!(row.get_column("bottom").and_then(Value::as_i128), Some(10));
    assert_eq!(row.get_column("mean").and_then(Value::as_f64), Some(30.0));
    assert_eq!(row.get_column("discounted").and_then(Value::as_i128), Some(2));
    assert_eq!(row.get_column("products").and_then(Value::as_i128), Some(3));
    assert_eq!(row.get_column("discounts").and_then(Value::as_i128), Some(6));

    // Aggregates over nothing still answer with one row
    let rows = registry
        .query::<Sale>()
        .unwrap()
        .select(["count(*) AS orders", "sum(amount) AS total"])
        .where_map([("region", "west")])
        .rows(connection)
        .await
        .expect("Could not aggregate an empty set");
    assert_eq!(integers(&rows, "orders"), [Some(0)]);
    assert_eq!(column(&rows, "total"), [Value::Null]);

    let error = registry
        .query::<Sale>()
        .unwrap()
        .select(["median(amount)"])
        .rows(connection)
        .await
        .expect_err("Unknown functions are refused");
    assert!(matches!(error, strata::Error::InvalidStatement(..)), "{error:?}");
}
