use crate::config::RelataConfig;
use crate::entity::{Entity, EntityFactory, Metadata};
use crate::entity_manager_builder::EntityManagerBuilder;
use crate::errors::{ErrorKind, RelataError, RelataResult};
use crate::mapper::Mapper;
use crate::query::SelectParams;
use crate::repository::{HookOptions, RelationOverride, Repository, RepositoryHooks, SaveOptions};
use dashmap::DashMap;
use std::sync::Arc;

/// Entry point of the access layer.
///
/// # Purpose
/// An `EntityManager` ties together the entity metadata, the entity factory, the mapper
/// and the per-type hooks and relation overrides, and hands out [`Repository`]
/// instances bound to one entity type.
///
/// # Characteristics
/// - **Cheap to clone**: all clones share the same state through `Arc<EntityManagerInner>`
/// - **Thread safe**: hooks and overrides live in concurrent maps and may be registered
///   while repositories are in use
/// - **Fresh repositories**: every call to [`EntityManager::repository`] returns a new
///   repository with empty query state
///
/// # Examples
///
/// ```rust,ignore
/// use relata::entity::{EntityDefs, Metadata, RelationDescriptor};
/// use relata::entity_manager::EntityManager;
///
/// let metadata = Metadata::new()
///     .with_entity(EntityDefs::new("Account"))
///     .with_entity(
///         EntityDefs::new("Contact")
///             .relation(RelationDescriptor::belongs_to("account", "Account")),
///     );
///
/// let entity_manager = EntityManager::builder().metadata(metadata).build()?;
/// let mut accounts = entity_manager.repository("Account")?;
/// ```
#[derive(Clone)]
pub struct EntityManager {
    inner: Arc<EntityManagerInner>,
}

impl EntityManager {
    pub(crate) fn new(
        config: RelataConfig,
        metadata: Arc<Metadata>,
        mapper: Mapper,
        entity_factory: Arc<dyn EntityFactory>,
    ) -> Self {
        EntityManager {
            inner: Arc::new(EntityManagerInner {
                config,
                metadata,
                mapper,
                entity_factory,
                hooks: DashMap::new(),
                overrides: DashMap::new(),
            }),
        }
    }

    /// Creates a new [`EntityManagerBuilder`].
    pub fn builder() -> EntityManagerBuilder {
        EntityManagerBuilder::new()
    }

    /// Returns a new repository for `entity_type`.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::MetadataError`] if the entity type is not defined.
    pub fn repository(&self, entity_type: &str) -> RelataResult<Repository> {
        if !self.inner.metadata.has_entity(entity_type) {
            log::error!("No metadata defined for entity type {}", entity_type);
            return Err(RelataError::new(
                &format!("Unknown entity type {}", entity_type),
                ErrorKind::MetadataError,
            ));
        }
        Repository::new(entity_type, self.clone())
    }

    pub fn config(&self) -> &RelataConfig {
        &self.inner.config
    }

    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.inner.metadata
    }

    pub fn mapper(&self) -> &Mapper {
        &self.inner.mapper
    }

    pub fn entity_factory(&self) -> &Arc<dyn EntityFactory> {
        &self.inner.entity_factory
    }

    /// Hooks registered for `entity_type`, if any.
    pub fn hooks(&self, entity_type: &str) -> Option<RepositoryHooks> {
        self.inner
            .hooks
            .get(entity_type)
            .map(|entry| entry.value().clone())
    }

    /// Override registered for `relation` of `entity_type`, if any.
    pub fn relation_override(&self, entity_type: &str, relation: &str) -> Option<RelationOverride> {
        self.inner
            .overrides
            .get(&(entity_type.to_string(), relation.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Registers the hooks of `entity_type`, replacing earlier ones.
    ///
    /// Repositories created before the call keep the hooks they were created with.
    pub fn register_hooks(&self, entity_type: &str, hooks: RepositoryHooks) -> RelataResult<()> {
        if !self.inner.metadata.has_entity(entity_type) {
            log::error!("Cannot register hooks for unknown entity type {}", entity_type);
            return Err(RelataError::new(
                &format!("Hooks registered for unknown entity type {}", entity_type),
                ErrorKind::ConfigError,
            ));
        }
        self.inner.hooks.insert(entity_type.to_string(), hooks);
        Ok(())
    }

    /// Registers the override of one relation, replacing an earlier one.
    pub fn register_relation_override(
        &self,
        entity_type: &str,
        relation: &str,
        relation_override: RelationOverride,
    ) -> RelataResult<()> {
        if self.inner.metadata.relation(entity_type, relation).is_none() {
            log::error!(
                "Cannot register override for unknown relation {} of {}",
                relation,
                entity_type
            );
            return Err(RelataError::new(
                &format!("Override registered for unknown relation {} of {}", relation, entity_type),
                ErrorKind::ConfigError,
            ));
        }
        self.inner
            .overrides
            .insert((entity_type.to_string(), relation.to_string()), relation_override);
        Ok(())
    }

    /// Loads an entity by type and id through a fresh repository.
    pub fn get_entity(&self, entity_type: &str, id: &str) -> RelataResult<Option<Entity>> {
        self.repository(entity_type)?
            .get_by_id(id, SelectParams::new())
    }

    /// Saves an entity through a fresh repository of its type.
    pub fn save_entity(&self, entity: &mut Entity, options: &SaveOptions) -> RelataResult<()> {
        let repository = self.repository(entity.entity_type())?;
        repository.save(entity, options)
    }

    /// Removes an entity through a fresh repository of its type.
    pub fn remove_entity(&self, entity: &mut Entity, options: &HookOptions) -> RelataResult<()> {
        let repository = self.repository(entity.entity_type())?;
        repository.remove(entity, options)
    }
}

struct EntityManagerInner {
    config: RelataConfig,
    metadata: Arc<Metadata>,
    mapper: Mapper,
    entity_factory: Arc<dyn EntityFactory>,
    hooks: DashMap<String, RepositoryHooks>,
    overrides: DashMap<(String, String), RelationOverride>,
}
