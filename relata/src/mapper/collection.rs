use crate::entity::Entity;
use crate::errors::RelataResult;

/// Delivery mode of a result collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionMode {
    /// Fully loaded and restartable.
    #[default]
    Materialized,
    /// Forward-only; rows are pulled from the mapper as the caller iterates.
    Streamed,
}

/// Result of a select: a materialized list or a streamed, forward-only cursor.
///
/// # Characteristics
/// - **Materialized**: every entity is loaded; [`EntityCollection::reset`] restarts
///   iteration and [`EntityCollection::len`] is known up front
/// - **Streamed**: entities are produced on demand; once consumed they are gone and
///   `reset` has no effect
///
/// Both forms iterate as `RelataResult<Entity>`; a streamed cursor may fail mid-way.
pub enum EntityCollection {
    Materialized {
        entities: Vec<Entity>,
        position: usize,
    },
    Streamed {
        underlying: Option<Box<dyn Iterator<Item = RelataResult<Entity>> + Send>>,
    },
}

impl EntityCollection {
    pub fn materialized(entities: Vec<Entity>) -> Self {
        EntityCollection::Materialized {
            entities,
            position: 0,
        }
    }

    pub fn streamed(iter: Box<dyn Iterator<Item = RelataResult<Entity>> + Send>) -> Self {
        EntityCollection::Streamed {
            underlying: Some(iter),
        }
    }

    pub fn empty() -> Self {
        EntityCollection::materialized(Vec::new())
    }

    pub fn mode(&self) -> CollectionMode {
        match self {
            EntityCollection::Materialized { .. } => CollectionMode::Materialized,
            EntityCollection::Streamed { .. } => CollectionMode::Streamed,
        }
    }

    pub fn is_restartable(&self) -> bool {
        self.mode() == CollectionMode::Materialized
    }

    /// Restarts a materialized collection. No effect on a streamed cursor.
    pub fn reset(&mut self) {
        if let EntityCollection::Materialized { position, .. } = self {
            *position = 0;
        }
    }

    /// Number of entities of a materialized collection, `None` for a streamed cursor.
    pub fn len(&self) -> Option<usize> {
        match self {
            EntityCollection::Materialized { entities, .. } => Some(entities.len()),
            EntityCollection::Streamed { .. } => None,
        }
    }

    /// `true` for an empty materialized collection. A streamed cursor is never known
    /// to be empty before it is consumed.
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    pub fn get(&self, index: usize) -> Option<&Entity> {
        match self {
            EntityCollection::Materialized { entities, .. } => entities.get(index),
            EntityCollection::Streamed { .. } => None,
        }
    }

    /// Returns the first entity: from the start for a materialized collection, the
    /// next one for a streamed cursor.
    pub fn first(&mut self) -> Option<RelataResult<Entity>> {
        self.reset();
        self.next()
    }

    /// Drains the remaining entities into a vector, stopping at the first failure.
    pub fn to_vec(&mut self) -> RelataResult<Vec<Entity>> {
        self.by_ref().collect()
    }
}

impl Iterator for EntityCollection {
    type Item = RelataResult<Entity>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            EntityCollection::Materialized { entities, position } => {
                let entity = entities.get(*position).cloned();
                if entity.is_some() {
                    *position += 1;
                }
                entity.map(Ok)
            }
            EntityCollection::Streamed { underlying } => {
                let next = underlying.as_mut().and_then(|iter| iter.next());
                if next.is_none() {
                    // Once exhausted, drop the underlying iterator.
                    *underlying = None;
                }
                next
            }
        }
    }
}

impl std::fmt::Debug for EntityCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityCollection::Materialized { entities, position } => f
                .debug_struct("Materialized")
                .field("len", &entities.len())
                .field("position", position)
                .finish(),
            EntityCollection::Streamed { underlying } => f
                .debug_struct("Streamed")
                .field("exhausted", &underlying.is_none())
                .finish(),
        }
    }
}

/// Result of a relation read: a collection for to-many relations, a single entity
/// (or none) for to-one relations.
#[derive(Debug)]
pub enum Related {
    Many(EntityCollection),
    One(Option<Entity>),
}

impl Related {
    /// Converts to a collection; a to-one result becomes a collection of zero or one.
    pub fn into_collection(self) -> EntityCollection {
        match self {
            Related::Many(collection) => collection,
            Related::One(entity) => EntityCollection::materialized(entity.into_iter().collect()),
        }
    }

    /// Returns the single entity of a to-one result.
    pub fn into_entity(self) -> Option<Entity> {
        match self {
            Related::One(entity) => entity,
            Related::Many(mut collection) => collection.first().and_then(|r| r.ok()),
        }
    }
}
