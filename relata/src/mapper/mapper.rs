use crate::common::Value;
use crate::entity::Entity;
use crate::errors::RelataResult;
use crate::mapper::{CollectionMode, EntityCollection, Related};
use crate::query::SelectParams;
use indexmap::IndexMap;
use std::ops::Deref;
use std::sync::Arc;

/// Extra pivot columns carried by relate and update-relation calls.
pub type RelationData = IndexMap<String, Value>;

/// The storage-execution boundary below the repository.
///
/// # Purpose
/// A mapper turns structured instructions (a [`SelectParams`], an entity, a relation
/// name) into storage operations and returns rows, counts or success flags. The
/// repository never builds query text; everything storage specific happens here.
///
/// # Key Responsibilities
/// - **Reads**: by id, by query specification, by raw query
/// - **Writes**: insert, update, soft delete, hard delete, restore
/// - **Aggregates**: count, max, min, sum
/// - **Relations**: select and count related records, relate and unrelate by entity or
///   id, pivot column updates and reads, mass relate
/// - **Table locks**: exclusive write lock of one table
///
/// # Contract
/// Every call either returns a complete result or fails as a whole; there are no
/// partial results. The `seed` entity passed to reads only carries the entity type.
/// Aggregates return the storage's native value, `Value::Null` when no row matches.
///
/// # Thread Safety
/// Implementers must be `Send + Sync`; one mapper is shared by every repository of an
/// entity manager.
pub trait MapperProvider: Send + Sync {
    /// Loads one record by id, `None` when absent.
    fn select_by_id(
        &self,
        seed: &Entity,
        id: &str,
        params: &SelectParams,
    ) -> RelataResult<Option<Entity>>;

    /// Runs a query specification. Streams when `params` has the `sth` flag.
    fn select(&self, seed: &Entity, params: &SelectParams) -> RelataResult<EntityCollection>;

    /// Runs a raw query. No structural validation happens above the mapper.
    fn select_by_query(
        &self,
        seed: &Entity,
        query: &str,
        mode: CollectionMode,
    ) -> RelataResult<EntityCollection>;

    /// Inserts a new record. Assigns the id when the entity has none.
    fn insert(&self, entity: &mut Entity) -> RelataResult<()>;

    /// Writes the attributes of an existing record.
    fn update(&self, entity: &mut Entity) -> RelataResult<()>;

    /// Soft-deletes a record.
    fn delete(&self, entity: &mut Entity) -> RelataResult<()>;

    /// Hard-deletes a record; with `only_deleted` only a soft-deleted one.
    fn delete_from_db(&self, entity_type: &str, id: &str, only_deleted: bool)
        -> RelataResult<bool>;

    /// Clears the soft-delete flag of a record.
    fn restore_deleted(&self, entity_type: &str, id: &str) -> RelataResult<bool>;

    fn count(&self, seed: &Entity, params: &SelectParams) -> RelataResult<Value>;

    fn max(&self, seed: &Entity, params: &SelectParams, field: &str) -> RelataResult<Value>;

    fn min(&self, seed: &Entity, params: &SelectParams, field: &str) -> RelataResult<Value>;

    fn sum(&self, seed: &Entity, params: &SelectParams, field: &str) -> RelataResult<Value>;

    /// Reads the records related to `entity` through `relation`.
    fn select_related(
        &self,
        entity: &Entity,
        relation: &str,
        params: &SelectParams,
    ) -> RelataResult<Related>;

    fn count_related(
        &self,
        entity: &Entity,
        relation: &str,
        params: &SelectParams,
    ) -> RelataResult<Value>;

    fn relate(
        &self,
        entity: &Entity,
        relation: &str,
        foreign: &Entity,
        data: Option<&RelationData>,
    ) -> RelataResult<bool>;

    fn unrelate(&self, entity: &Entity, relation: &str, foreign: &Entity) -> RelataResult<bool>;

    fn add_relation(
        &self,
        entity: &Entity,
        relation: &str,
        foreign_id: &str,
        data: Option<&RelationData>,
    ) -> RelataResult<bool>;

    fn remove_relation(&self, entity: &Entity, relation: &str, foreign_id: &str)
        -> RelataResult<bool>;

    fn remove_all_relations(&self, entity: &Entity, relation: &str) -> RelataResult<bool>;

    /// Updates pivot columns of one many-to-many link.
    fn update_relation(
        &self,
        entity: &Entity,
        relation: &str,
        foreign_id: &str,
        data: &RelationData,
    ) -> RelataResult<bool>;

    /// Relates every record matching `params` to `entity`.
    fn mass_relate(&self, entity: &Entity, relation: &str, params: &SelectParams)
        -> RelataResult<bool>;

    /// Reads one pivot column of a many-to-many link.
    fn get_relation_column(
        &self,
        entity: &Entity,
        relation: &str,
        foreign_id: &str,
        column: &str,
    ) -> RelataResult<Value>;

    /// Acquires the exclusive write lock of the entity type's table.
    fn lock_table(&self, entity_type: &str) -> RelataResult<()>;

    fn unlock_table(&self, entity_type: &str) -> RelataResult<()>;
}

/// Shared handle to a mapper implementation.
///
/// Cloning is cheap; the provider is shared behind an `Arc`.
#[derive(Clone)]
pub struct Mapper {
    inner: Arc<dyn MapperProvider>,
}

impl Mapper {
    pub fn new<T: MapperProvider + 'static>(inner: T) -> Self {
        Mapper {
            inner: Arc::new(inner),
        }
    }

    /// Wraps an already shared provider, keeping a typed handle usable by the caller.
    pub fn from_arc(inner: Arc<dyn MapperProvider>) -> Self {
        Mapper { inner }
    }
}

impl Deref for Mapper {
    type Target = Arc<dyn MapperProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
