mod config;
mod connection;
mod driver;
mod error;
mod executor;
mod expr;
mod parse;
mod query;
mod schema;
mod scope;
mod value;
mod view;
mod writer;

pub use config::*;
pub use connection::*;
pub use driver::*;
pub use error::*;
pub use executor::*;
pub use expr::*;
pub use parse::*;
pub use query::*;
pub use schema::*;
pub use scope::*;
pub use value::*;
pub use view::*;
pub use writer::*;

pub use futures::{Stream, StreamExt, TryStreamExt};
