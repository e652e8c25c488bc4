#[cfg(test)]
mod tests {
    use std::{
        any::TypeId,
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
    };
    use strata::{
        Association, ColumnDef, Entity, EntityDescriptor, Error, Passive, Registry, Value,
    };

    #[derive(Entity, Default)]
    struct NoKey {
        name: String,
    }

    #[derive(Entity, Default)]
    struct CompositeKey {
        #[strata(primary_key)]
        left: i32,
        #[strata(primary_key)]
        right: i32,
    }

    #[derive(Entity, Default)]
    struct DuplicateColumn {
        #[strata(primary_key)]
        id: i32,
        #[strata(name = "label")]
        title: String,
        label: String,
    }

    #[derive(Entity, Default)]
    struct Orphan {
        #[strata(primary_key)]
        id: i32,
        #[strata(foreign_key = "missing_id")]
        children: Association<Child>,
    }

    #[derive(Entity, Default)]
    struct Parent {
        #[strata(primary_key, auto_increment)]
        id: Passive<u32>,
        #[strata(foreign_key = "parent_id")]
        children: Association<Child>,
    }

    #[derive(Entity, Default)]
    struct Child {
        #[strata(primary_key, auto_increment)]
        id: Passive<u32>,
        parent_id: u32,
    }

    fn schema_error(result: strata::Result<Arc<strata::EntityMetadata>>) -> String {
        match result {
            Err(Error::Schema(message)) => message.into_owned(),
            other => panic!("Expected a schema error, found {other:?}"),
        }
    }

    #[test]
    fn missing_primary_key() {
        let registry = Registry::new();
        let message = schema_error(registry.resolve::<NoKey>());
        assert!(message.contains("no primary key"), "{message}");
        assert!(registry.query::<NoKey>().is_err());
    }

    #[test]
    fn composite_primary_key() {
        let registry = Registry::new();
        let message = schema_error(registry.resolve::<CompositeKey>());
        assert!(message.contains("composite"), "{message}");
        assert!(message.contains("left, right"), "{message}");
    }

    #[test]
    fn duplicate_column() {
        let registry = Registry::new();
        let message = schema_error(registry.resolve::<DuplicateColumn>());
        assert!(message.contains("`label`"), "{message}");
    }

    #[test]
    fn unknown_foreign_key() {
        let registry = Registry::new();
        let message = schema_error(registry.resolve::<Orphan>());
        assert!(message.contains("missing_id"), "{message}");
    }

    #[test]
    fn failures_are_cached() {
        let registry = Registry::new();
        assert!(registry.resolve::<NoKey>().is_err());
        assert!(registry.resolve::<NoKey>().is_err());
        registry.resolve::<Parent>().expect("Parent should be valid");
        // Only successes are reported, and the child is not resolved implicitly
        let resolved = registry.resolved();
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].table, "parent");
    }

    #[test]
    fn resolve_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        fn describe() -> EntityDescriptor {
            CALLS.fetch_add(1, Ordering::SeqCst);
            EntityDescriptor {
                name: "Counted",
                table: "counted",
                columns: vec![ColumnDef {
                    name: "id",
                    value: Value::Int64(None),
                    primary_key: true,
                    ..Default::default()
                }],
                associations: Vec::new(),
            }
        }
        struct Counted;
        let registry = Registry::new();
        let results = thread::scope(|scope| {
            let handles = (0..8)
                .map(|_| scope.spawn(|| registry.resolve_with(TypeId::of::<Counted>(), describe)))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|v| {
                    v.join()
                        .expect("Thread panicked")
                        .expect("Counted should be valid")
                })
                .collect::<Vec<_>>()
        });
        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|v| Arc::ptr_eq(&v[0], &v[1])));
    }

    #[test]
    fn registries_are_independent() {
        let first = Registry::new();
        let second = Registry::new();
        let a = first.resolve::<Child>().expect("Child should be valid");
        let b = second.resolve::<Child>().expect("Child should be valid");
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(
            &a,
            &first.resolve::<Child>().expect("Child should be valid")
        ));
        assert_eq!(second.resolved().len(), 1);
    }
}
