use crate::Recorder;
use std::sync::LazyLock;
use strata::{Connection, Entity, Error, Hooks, Passive, Registry, Result, Statement};
use tokio::sync::Mutex;

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[strata(name = "tags", hooks)]
struct Tag {
    #[strata(primary_key, auto_increment)]
    id: Passive<i64>,
    label: String,
    revision: u32,
}

impl Hooks for Tag {
    fn before_save(&mut self) -> Result<()> {
        self.label = self.label.trim().to_lowercase();
        if self.label.is_empty() {
            return Err(Error::invalid("A tag needs a label"));
        }
        self.revision += 1;
        Ok(())
    }

    fn before_create(&mut self) -> Result<()> {
        if self.label.starts_with('_') {
            return Err(Error::invalid(format!("`{}` is reserved", self.label)));
        }
        Ok(())
    }
}

static MUTEX: LazyLock<Mutex<()>> = LazyLock::new(|| Mutex::new(()));

pub async fn hooks<C: Connection>(connection: &mut C) {
    let _lock = MUTEX.lock().await;
    let registry = Registry::new();
    connection
        .ensure_schema(&[registry
            .resolve::<Tag>()
            .expect("Tag should be a valid entity")])
        .await
        .expect("Could not create the tags table");

    // The hook rewrites the record before it is inserted
    let mut tag = Tag {
        label: "  Rust ".into(),
        ..Default::default()
    };
    registry
        .query::<Tag>()
        .unwrap()
        .create(connection, &mut tag)
        .await
        .expect("Could not create the tag");
    assert_eq!(tag.label, "rust");
    assert_eq!(tag.revision, 1);
    let stored = registry
        .query::<Tag>()
        .unwrap()
        .first(connection)
        .await
        .into_result()
        .expect("The tag should exist");
    assert_eq!(stored, tag);

    // One failing record stops the whole batch before anything is sent
    let mut tags = vec![
        Tag {
            label: "orm".into(),
            ..Default::default()
        },
        Tag {
            label: "   ".into(),
            ..Default::default()
        },
    ];
    let mut recorder = Recorder::new(connection);
    let error = registry
        .query::<Tag>()
        .unwrap()
        .create_in_batches(&mut recorder, &mut tags, 1)
        .await
        .expect_err("An empty label should be refused");
    assert!(matches!(error, Error::InvalidStatement(..)), "{error:?}");
    assert!(recorder.statements.is_empty());

    // `before_create` only runs when save inserts
    tag.label = "_rust".into();
    let mut recorder = Recorder::new(connection);
    registry
        .query::<Tag>()
        .unwrap()
        .save(&mut recorder, &mut tag)
        .await
        .expect("Could not update the tag");
    assert!(matches!(recorder.statements[..], [Statement::Update(..)]));
    assert_eq!(tag.revision, 2);
    let mut reserved = Tag {
        label: "_internal".into(),
        ..Default::default()
    };
    let mut recorder = Recorder::new(connection);
    let error = registry
        .query::<Tag>()
        .unwrap()
        .save(&mut recorder, &mut reserved)
        .await
        .expect_err("Reserved labels cannot be inserted");
    assert!(matches!(error, Error::InvalidStatement(..)), "{error:?}");
    assert!(recorder.statements.is_empty());

    let stored = registry
        .query::<Tag>()
        .unwrap()
        .find(connection)
        .await
        .expect("Could not read the tags");
    assert_eq!(stored, [tag]);
}
