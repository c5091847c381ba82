//! # Relata - Repository Layer for Typed Records
//!
//! Relata is an object-relational access layer: calling code builds queries
//! declaratively, persists and retrieves typed records, and manages relationships
//! between record types without writing query text. Storage execution is delegated to
//! a pluggable mapper.
//!
//! ## Key Features
//!
//! - **Fluent query state**: where/having clauses, joins, projection, ordering and
//!   pagination accumulated across chained calls and merged with per-call parameters
//! - **Lifecycle hooks**: before/after save and remove, with a guaranteed release of
//!   the being-saved flag on every exit path
//! - **Relations**: belongs-to, polymorphic belongs-to-parent, has-many and
//!   many-to-many, with per-relation overrides
//! - **Scoped table locks**: released when the guard goes out of scope
//! - **In-memory mapper**: a complete mapper implementation for tests and prototyping
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use relata::common::SortOrder;
//! use relata::entity::{EntityDefs, Metadata, RelationDescriptor};
//! use relata::entity_manager::EntityManager;
//! use relata::query::SelectParams;
//! use relata::repository::SaveOptions;
//!
//! let metadata = Metadata::new()
//!     .with_entity(EntityDefs::new("Account").default_value("type", "Customer"))
//!     .with_entity(
//!         EntityDefs::new("Contact")
//!             .relation(RelationDescriptor::belongs_to("account", "Account")),
//!     );
//! let entity_manager = EntityManager::builder().metadata(metadata).build()?;
//!
//! let mut accounts = entity_manager.repository("Account")?;
//! let mut account = accounts.get_new()?;
//! account.set("name", "Acme");
//! accounts.save(&mut account, &SaveOptions::new())?;
//!
//! let found = accounts
//!     .where_eq("name", "Acme")
//!     .order("name", SortOrder::Ascending)
//!     .find(SelectParams::new())?;
//! ```
//!
//! ## Design Pattern
//!
//! Shared components (`EntityManager`, `RelataConfig`, `Mapper`, `MemoryMapper`) use the
//! PIMPL pattern: a thin handle around an `Arc` of the implementation, so clones are
//! cheap and observe the same state. Repositories are plain values owned by one call
//! chain.
//!
//! ## Module Organization
//!
//! - [`common`] - Values, sort order and naming constants
//! - [`config`] - Merge policy and query tracing
//! - [`entity`] - Entities, metadata and the entity factory
//! - [`entity_manager`] - Entry point handing out repositories
//! - [`entity_manager_builder`] - Builder of the entity manager
//! - [`errors`] - Error types and result definitions
//! - [`mapper`] - The storage boundary and the in-memory mapper
//! - [`query`] - Where clauses, select params, query state and the params merger
//! - [`repository`] - Repositories, hooks, relation overrides and table locks

pub mod common;
pub mod config;
pub mod entity;
pub mod entity_manager;
pub mod entity_manager_builder;
pub mod errors;
pub mod mapper;
pub mod query;
pub mod repository;

pub use entity::Entity;
pub use entity_manager::EntityManager;
pub use errors::{ErrorKind, RelataError, RelataResult};
pub use repository::Repository;
