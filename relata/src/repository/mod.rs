//! Repositories: the stateful query builder, entity lifecycle and relation manager of
//! one entity type.
//!
//! # Building queries
//!
//! Chained calls accumulate where/having clauses, joins, ordering, pagination and flags
//! on the repository. A terminal call merges that state with its explicit
//! [`SelectParams`](crate::query::SelectParams), hands the result to the mapper and
//! resets the state.
//!
//! ```rust,ignore
//! use relata::clause;
//! use relata::common::SortOrder;
//! use relata::query::SelectParams;
//!
//! let mut contacts = entity_manager.repository("Contact")?;
//! let count = contacts
//!     .where_eq("accountId", account_id)
//!     .count(SelectParams::new())?;
//! ```
//!
//! # Lifecycle and hooks
//!
//! `save` and `remove` run the [`RepositoryHooksProvider`] registered for the entity type.
//! Relation changes run the generic relate hooks plus the hooks of a
//! [`RelationOverrideProvider`] registered for the relation.
//!
//! # Relations
//!
//! - `find_related`, `count_related`, `is_related`
//! - `relate`, `unrelate` with a [`Foreign`] reference
//! - `update_relation`, `mass_relate`, `get_relation_column`

mod foreign;
mod hooks;
mod lock;
mod options;
mod relations;
mod repository;

pub use foreign::*;
pub use hooks::*;
pub use lock::*;
pub use options::*;
pub use repository::*;
