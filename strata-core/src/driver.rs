use crate::{Connection, Result, SqlWriter};
use std::{borrow::Cow, future::Future};

/// A storage backend: its connection type and its statement renderer.
pub trait Driver {
    type Connection: Connection;
    type SqlWriter: SqlWriter;

    /// Name of the backend, also the URL scheme it accepts.
    const NAME: &'static str;

    fn get_instance() -> Self;
    fn sql_writer(&self) -> Self::SqlWriter;

    fn connect(&self, url: Cow<'static, str>) -> impl Future<Output = Result<Self::Connection>> {
        async move { Self::Connection::connect(&url).await }
    }
}
