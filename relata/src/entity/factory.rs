use crate::entity::{Entity, Metadata};
use crate::errors::{ErrorKind, RelataError, RelataResult};
use std::sync::Arc;

/// Creates empty, type-correct entity instances.
///
/// Repositories call the factory for `get_new` and for the seed entity
/// handed to the mapper. Implementations must fail for unknown entity types rather
/// than produce an untyped record.
pub trait EntityFactory: Send + Sync {
    fn create(&self, entity_type: &str) -> RelataResult<Entity>;
}

/// Factory backed by the entity type registry.
pub struct MetadataEntityFactory {
    metadata: Arc<Metadata>,
}

impl MetadataEntityFactory {
    pub fn new(metadata: Arc<Metadata>) -> Self {
        MetadataEntityFactory { metadata }
    }
}

impl EntityFactory for MetadataEntityFactory {
    fn create(&self, entity_type: &str) -> RelataResult<Entity> {
        if !self.metadata.has_entity(entity_type) {
            log::error!("Cannot create entity of unknown type {}", entity_type);
            return Err(RelataError::new(
                &format!("Unknown entity type {}", entity_type),
                ErrorKind::MetadataError,
            ));
        }
        Ok(Entity::new(entity_type))
    }
}
