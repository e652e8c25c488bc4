#[cfg(test)]
mod tests {
    use strata::{Connection, Driver, Entity, Passive, Registry};
    use strata_memory::{MemoryConnection, MemoryDriver};
    use strata_tests::{execute_tests, init_logs, silent_logs};

    #[tokio::test]
    async fn memory() {
        init_logs();
        let driver = MemoryDriver::new();
        let connection = driver
            .connect("memory://".into())
            .await
            .expect("Could not open the database");
        execute_tests(connection).await;
    }

    #[tokio::test]
    async fn wrong_url() {
        silent_logs! {
            assert!(MemoryConnection::connect("sqlite://some_value").await.is_err());
            assert!(MemoryConnection::connect("not a url").await.is_err());
        };
    }

    #[derive(Entity, Debug, Default, Clone, PartialEq)]
    struct Counter {
        #[strata(primary_key, auto_increment)]
        id: Passive<u64>,
        value: i64,
    }

    #[tokio::test]
    async fn connections_are_isolated() {
        init_logs();
        let registry = Registry::new();
        let metadata = registry
            .resolve::<Counter>()
            .expect("Counter should be a valid entity");
        assert_eq!(metadata.table, "counter");
        let mut first = MemoryConnection::connect("memory://")
            .await
            .expect("Could not open the first database");
        let mut second = MemoryConnection::connect("memory://")
            .await
            .expect("Could not open the second database");
        for connection in [&mut first, &mut second] {
            connection
                .ensure_schema(&[metadata.clone()])
                .await
                .expect("Could not create the counter table");
        }
        registry
            .query::<Counter>()
            .unwrap()
            .create(
                &mut first,
                &mut Counter {
                    value: 7,
                    ..Default::default()
                },
            )
            .await
            .expect("Could not insert a counter");
        let counted = registry
            .query::<Counter>()
            .unwrap()
            .count(&mut first)
            .await
            .expect("count failed");
        assert_eq!(counted, 1);
        let counted = registry
            .query::<Counter>()
            .unwrap()
            .count(&mut second)
            .await
            .expect("count failed");
        assert_eq!(counted, 0);
    }

    #[tokio::test]
    async fn missing_table() {
        init_logs();
        let registry = Registry::new();
        let mut connection = MemoryConnection::connect("memory://")
            .await
            .expect("Could not open the database");
        let error = registry
            .query::<Counter>()
            .unwrap()
            .find(&mut connection)
            .await
            .expect_err("The table was never created");
        assert!(matches!(error, strata::Error::Executor(..)), "{error:?}");
    }
}
