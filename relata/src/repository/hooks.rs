use crate::entity::Entity;
use crate::errors::RelataResult;
use crate::mapper::RelationData;
use crate::query::SelectParams;
use crate::repository::{Foreign, HookOptions, Repository, SaveOptions};
use std::ops::Deref;
use std::sync::Arc;

/// Lifecycle hooks of the repositories of one entity type.
///
/// # Purpose
/// Lets an application attach behavior to saves, removes and relation changes of an
/// entity type, and adjust every query the type's repositories run. Every method has a
/// no-op default; implement only what is needed.
///
/// # Hook points
/// - `before_save` / `after_save`: around the insert or update, unless skipped by
///   [`SaveOptions`]
/// - `before_remove` / `after_remove`: around the soft delete
/// - `before_relate` / `after_relate`, `before_unrelate` / `after_unrelate`: around a
///   relation change; the after hook runs only when the change succeeded
/// - `before_mass_relate` / `after_mass_relate`: around a mass relate
/// - `handle_select_params`: adjusts the parameters of reads of this type, including
///   relation reads that target it, unless the parameters opt out
///
/// # Errors
/// An error returned by a hook aborts the operation and reaches the caller.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; one instance serves every repository of the
/// entity type.
pub trait RepositoryHooksProvider: Send + Sync {
    fn before_save(&self, _entity: &mut Entity, _options: &SaveOptions) -> RelataResult<()> {
        Ok(())
    }

    fn after_save(&self, _entity: &mut Entity, _options: &SaveOptions) -> RelataResult<()> {
        Ok(())
    }

    fn before_remove(&self, _entity: &mut Entity, _options: &HookOptions) -> RelataResult<()> {
        Ok(())
    }

    fn after_remove(&self, _entity: &mut Entity, _options: &HookOptions) -> RelataResult<()> {
        Ok(())
    }

    fn before_relate(
        &self,
        _entity: &Entity,
        _relation: &str,
        _foreign: &Foreign<'_>,
        _data: Option<&RelationData>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        Ok(())
    }

    fn after_relate(
        &self,
        _entity: &Entity,
        _relation: &str,
        _foreign: &Foreign<'_>,
        _data: Option<&RelationData>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        Ok(())
    }

    fn before_unrelate(
        &self,
        _entity: &Entity,
        _relation: &str,
        _foreign: &Foreign<'_>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        Ok(())
    }

    fn after_unrelate(
        &self,
        _entity: &Entity,
        _relation: &str,
        _foreign: &Foreign<'_>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        Ok(())
    }

    fn before_mass_relate(
        &self,
        _entity: &Entity,
        _relation: &str,
        _params: &SelectParams,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        Ok(())
    }

    fn after_mass_relate(
        &self,
        _entity: &Entity,
        _relation: &str,
        _params: &SelectParams,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        Ok(())
    }

    fn handle_select_params(&self, _params: &mut SelectParams) {}
}

/// Shared handle to a [`RepositoryHooksProvider`].
#[derive(Clone)]
pub struct RepositoryHooks {
    inner: Arc<dyn RepositoryHooksProvider>,
}

impl RepositoryHooks {
    pub fn new<T: RepositoryHooksProvider + 'static>(inner: T) -> Self {
        RepositoryHooks {
            inner: Arc::new(inner),
        }
    }

    /// Wraps an already shared provider, e.g. one the caller keeps for assertions.
    pub fn from_arc(inner: Arc<dyn RepositoryHooksProvider>) -> Self {
        RepositoryHooks { inner }
    }
}

impl Deref for RepositoryHooks {
    type Target = Arc<dyn RepositoryHooksProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Behavior specific to one relation of one entity type.
///
/// # Purpose
/// Replaces name-based per-relation hook methods with a registry entry. The generic
/// hooks of [`RepositoryHooksProvider`] always run; the hooks here run in addition when
/// an override is registered for the relation.
///
/// # Capabilities
/// - `before_relate` / `after_relate`, `before_unrelate` / `after_unrelate`: extra hooks
/// - `relate` / `unrelate`: the operation itself. Returning `None` means the override
///   does not define the operation and the generic mapper dispatch runs. Returning
///   `Some` replaces the dispatch entirely.
pub trait RelationOverrideProvider: Send + Sync {
    fn before_relate(
        &self,
        _entity: &Entity,
        _foreign: &Foreign<'_>,
        _data: Option<&RelationData>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        Ok(())
    }

    fn relate(
        &self,
        _repository: &Repository,
        _entity: &Entity,
        _foreign: &Foreign<'_>,
        _data: Option<&RelationData>,
        _options: &HookOptions,
    ) -> Option<RelataResult<bool>> {
        None
    }

    fn after_relate(
        &self,
        _entity: &Entity,
        _foreign: &Foreign<'_>,
        _data: Option<&RelationData>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        Ok(())
    }

    fn before_unrelate(
        &self,
        _entity: &Entity,
        _foreign: &Foreign<'_>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        Ok(())
    }

    fn unrelate(
        &self,
        _repository: &Repository,
        _entity: &Entity,
        _foreign: &Foreign<'_>,
        _options: &HookOptions,
    ) -> Option<RelataResult<bool>> {
        None
    }

    fn after_unrelate(
        &self,
        _entity: &Entity,
        _foreign: &Foreign<'_>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        Ok(())
    }
}

/// Shared handle to a [`RelationOverrideProvider`].
#[derive(Clone)]
pub struct RelationOverride {
    inner: Arc<dyn RelationOverrideProvider>,
}

impl RelationOverride {
    pub fn new<T: RelationOverrideProvider + 'static>(inner: T) -> Self {
        RelationOverride {
            inner: Arc::new(inner),
        }
    }

    pub fn from_arc(inner: Arc<dyn RelationOverrideProvider>) -> Self {
        RelationOverride { inner }
    }
}

impl Deref for RelationOverride {
    type Target = Arc<dyn RelationOverrideProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
