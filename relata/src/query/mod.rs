//! Structured query specification and the repository query state.
//!
//! - [`WhereClause`] / [`Clause`]: where and having trees
//! - [`SelectParams`]: the full query specification handed to the mapper
//! - [`QueryState`]: state accumulated by chained repository calls
//! - [`merge_select_params`]: combines accumulated state with explicit parameters

mod clause;
mod params_merger;
mod query_state;
mod select_params;

pub use clause::*;
pub use params_merger::*;
pub use query_state::*;
pub use select_params::*;
