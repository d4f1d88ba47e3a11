mod compiler;
mod heads;
mod reader;

pub use compiler::*;
pub use heads::*;
pub use reader::*;
