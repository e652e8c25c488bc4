mod connection;
mod database;
mod driver;
mod eval;
mod parse;
mod sql_writer;
mod transaction;

pub use connection::*;
pub use driver::*;
pub use sql_writer::*;
pub use transaction::*;
