//! Common types shared across the crate: values, sort order, naming constants and
//! lock-protected shared state.

mod constants;
mod sort_order;
mod util;
mod value;

pub use constants::*;
pub use sort_order::*;
pub use util::*;
pub use value::*;
