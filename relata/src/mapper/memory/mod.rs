//! In-memory mapper: rows and pivot rows held in process, with a call journal.

mod journal;
mod matcher;
mod memory_mapper;

pub use journal::*;
pub use memory_mapper::*;
