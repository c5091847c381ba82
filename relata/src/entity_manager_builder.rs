use crate::config::{MergePolicy, RelataConfig};
use crate::entity::{EntityFactory, Metadata, MetadataEntityFactory};
use crate::entity_manager::EntityManager;
use crate::errors::RelataResult;
use crate::mapper::{Mapper, MemoryMapper};
use crate::repository::{RelationOverride, RepositoryHooks};
use std::sync::Arc;

/// Builder for creating and configuring an [`EntityManager`].
///
/// `EntityManagerBuilder` provides a fluent API for wiring metadata, the mapper, the
/// entity factory, configuration and per-type hooks before the entity manager is built.
/// Registrations are validated against the metadata by [`EntityManagerBuilder::build`].
///
/// # Defaults
///
/// - empty [`Metadata`]
/// - a [`MemoryMapper`] over the same metadata when no mapper is set
/// - a [`MetadataEntityFactory`] when no entity factory is set
/// - [`MergePolicy::Legacy`] and query tracing off
///
/// # Examples
///
/// ```rust,ignore
/// use relata::config::MergePolicy;
/// use relata::entity_manager::EntityManager;
///
/// let entity_manager = EntityManager::builder()
///     .metadata(metadata)
///     .merge_policy(MergePolicy::Symmetric)
///     .repository_hooks("Contact", RepositoryHooks::new(ContactHooks))
///     .build()?;
/// ```
#[derive(Default)]
pub struct EntityManagerBuilder {
    config: RelataConfig,
    metadata: Metadata,
    mapper: Option<Mapper>,
    entity_factory: Option<Arc<dyn EntityFactory>>,
    hooks: Vec<(String, RepositoryHooks)>,
    overrides: Vec<(String, String, RelationOverride)>,
}

impl EntityManagerBuilder {
    /// Creates a new `EntityManagerBuilder` with default configuration.
    pub fn new() -> Self {
        EntityManagerBuilder::default()
    }

    /// Sets the entity metadata. Relation targets are validated on `build`.
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Sets the mapper that executes storage operations.
    pub fn mapper(mut self, mapper: Mapper) -> Self {
        self.mapper = Some(mapper);
        self
    }

    pub fn entity_factory<T: EntityFactory + 'static>(mut self, entity_factory: T) -> Self {
        self.entity_factory = Some(Arc::new(entity_factory));
        self
    }

    /// Sets how accumulated repository state is combined with explicit parameters.
    pub fn merge_policy(self, merge_policy: MergePolicy) -> Self {
        self.config.set_merge_policy(merge_policy);
        self
    }

    /// Logs every effective query specification at debug level when enabled.
    pub fn trace_queries(self, enabled: bool) -> Self {
        self.config.set_trace_queries(enabled);
        self
    }

    /// Registers the lifecycle hooks of `entity_type`.
    pub fn repository_hooks(mut self, entity_type: &str, hooks: RepositoryHooks) -> Self {
        self.hooks.push((entity_type.to_string(), hooks));
        self
    }

    /// Registers the override of one relation of `entity_type`.
    pub fn relation_override(
        mut self,
        entity_type: &str,
        relation: &str,
        relation_override: RelationOverride,
    ) -> Self {
        self.overrides.push((
            entity_type.to_string(),
            relation.to_string(),
            relation_override,
        ));
        self
    }

    /// Builds the entity manager.
    ///
    /// # Errors
    ///
    /// - `MetadataError` if a relation points at an undefined entity type
    /// - `ConfigError` if hooks or overrides name an undefined entity type or relation
    pub fn build(self) -> RelataResult<EntityManager> {
        self.metadata.validate()?;

        let metadata = Arc::new(self.metadata);
        let mapper = self
            .mapper
            .unwrap_or_else(|| Mapper::new(MemoryMapper::new(metadata.clone())));
        let entity_factory = self
            .entity_factory
            .unwrap_or_else(|| Arc::new(MetadataEntityFactory::new(metadata.clone())));

        let entity_manager = EntityManager::new(self.config, metadata, mapper, entity_factory);
        for (entity_type, hooks) in self.hooks {
            entity_manager.register_hooks(&entity_type, hooks)?;
        }
        for (entity_type, relation, relation_override) in self.overrides {
            entity_manager.register_relation_override(&entity_type, &relation, relation_override)?;
        }

        log::debug!(
            "Entity manager built with merge policy {}",
            entity_manager.config().merge_policy()
        );
        Ok(entity_manager)
    }
}
