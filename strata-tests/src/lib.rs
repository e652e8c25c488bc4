mod batches;
mod conditions;
mod deletes;
mod hooks;
mod preload;
mod reads;
mod transaction1;
mod upsert;

use crate::{
    batches::batches,
    conditions::{conditions, or_precedence},
    deletes::deletes,
    hooks::hooks,
    preload::preload,
    reads::{aggregates, reads},
    transaction1::transaction1,
    upsert::{save, upsert},
};
use log::LevelFilter;
use std::env;
use strata::{Connection, Executor, QueryResult, Result, Statement, stream::Stream};

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

pub async fn execute_tests<C: Connection>(mut connection: C) {
    conditions(&mut connection).await;
    or_precedence(&mut connection).await;
    batches(&mut connection).await;
    upsert(&mut connection).await;
    save(&mut connection).await;
    hooks(&mut connection).await;
    preload(&mut connection).await;
    transaction1(&mut connection).await;
    deletes(&mut connection).await;
    reads(&mut connection).await;
    aggregates(&mut connection).await;
}

/// Executor wrapper keeping a copy of every statement it forwards.
pub struct Recorder<'a, X: Executor> {
    executor: &'a mut X,
    pub statements: Vec<Statement>,
}

impl<'a, X: Executor> Recorder<'a, X> {
    pub fn new(executor: &'a mut X) -> Self {
        Self {
            executor,
            statements: Vec::new(),
        }
    }

    pub fn reads(&self) -> usize {
        self.statements
            .iter()
            .filter(|v| matches!(v, Statement::Select(..)))
            .count()
    }
}

impl<X: Executor> Executor for Recorder<'_, X> {
    type Driver = X::Driver;

    fn driver(&self) -> &X::Driver {
        self.executor.driver()
    }

    fn run(&mut self, statement: Statement) -> impl Stream<Item = Result<QueryResult>> + Send {
        self.statements.push(statement.clone());
        self.executor.run(statement)
    }
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
