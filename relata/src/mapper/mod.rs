//! The mapper boundary and its in-memory implementation.

mod collection;
mod mapper;
pub mod memory;

pub use collection::*;
pub use mapper::*;
pub use memory::{MapperCall, MapperOperation, MemoryMapper};
