mod debug;
mod fourcc;
pub mod parser;
pub mod serializer;
mod time;

pub use debug::*;
pub use fourcc::*;
pub use time::*;
