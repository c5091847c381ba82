//! Entities and entity type metadata.
//!
//! - [`Entity`] is the typed record with attributes and lifecycle flags
//! - [`Metadata`] is the registry of [`EntityDefs`]: attribute defaults and
//!   [`RelationDescriptor`]s per entity type
//! - [`EntityFactory`] creates empty entities for a type

mod entity;
mod factory;
mod metadata;

pub use entity::*;
pub use factory::*;
pub use metadata::*;
