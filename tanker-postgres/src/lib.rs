mod connection;
mod driver;
mod sql_writer;
mod value_wrap;

pub use connection::*;
pub use driver::*;
pub use sql_writer::*;
