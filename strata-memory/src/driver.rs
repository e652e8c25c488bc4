use crate::{MemoryConnection, MemorySqlWriter};
use strata_core::Driver;

#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryDriver {}

impl MemoryDriver {
    pub const fn new() -> Self {
        Self {}
    }
}

impl Driver for MemoryDriver {
    type Connection = MemoryConnection;
    type SqlWriter = MemorySqlWriter;

    const NAME: &'static str = "memory";

    fn get_instance() -> Self {
        Self::new()
    }

    fn sql_writer(&self) -> MemorySqlWriter {
        MemorySqlWriter {}
    }
}
