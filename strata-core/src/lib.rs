mod as_value;
mod builder;
mod column;
mod condition;
mod connection;
mod driver;
mod entity;
mod error;
mod executor;
mod metadata;
mod mutation;
mod plan;
mod preload;
mod query;
mod relations;
mod sql_writer;
mod transaction;
mod util;
mod value;

pub use ::anyhow::Context;
pub use as_value::*;
pub use builder::*;
pub use column::*;
pub use condition::*;
pub use connection::*;
pub use driver::*;
pub use entity::*;
pub use error::*;
pub use executor::*;
pub use metadata::*;
pub use mutation::*;
pub use plan::*;
pub use query::*;
pub use relations::*;
pub use sql_writer::*;
pub use transaction::*;
pub use util::*;
pub use value::*;
pub mod stream {
    pub use ::futures::stream::*;
}
pub use ::futures::future;
