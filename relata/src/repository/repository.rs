use crate::common::{SortOrder, Value};
use crate::entity::Entity;
use crate::entity_manager::EntityManager;
use crate::errors::{ErrorKind, RelataError, RelataResult};
use crate::mapper::{CollectionMode, EntityCollection, Mapper};
use crate::query::{merge_select_params, JoinList, OrderBy, QueryState, SelectParams, WhereClause};
use crate::repository::{HookOptions, RepositoryHooks, SaveOptions, TableLockGuard};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stateful query builder and lifecycle orchestrator bound to one entity type.
///
/// # Purpose
/// A `Repository` accumulates filtering, ordering and pagination state across chained
/// calls, merges it with the explicit parameters of a terminal call into one
/// [`SelectParams`], drives the save and remove lifecycle with hooks, and manages
/// relations. Query execution is delegated to the entity manager's [`Mapper`].
///
/// # Query state
/// Chained calls take `&mut self` and return `&mut Self`. Every terminal read
/// (`find`, `find_one`, `find_by_query`, `count`, `max`, `min`, `sum`, `get_all`)
/// resets the accumulated state when done, whether it succeeded or not.
///
/// # Thread Safety
/// A repository is meant for one call chain at a time; the borrow checker enforces
/// that chained state is never shared. Repositories are cheap: ask the
/// [`EntityManager`] for a fresh one per chain.
///
/// # Examples
///
/// ```rust,ignore
/// use relata::clause;
/// use relata::common::SortOrder;
/// use relata::query::SelectParams;
///
/// let mut accounts = entity_manager.repository("Account")?;
/// let customers = accounts
///     .where_clause(clause! { "type" => "Customer" })
///     .order("name", SortOrder::Ascending)
///     .limit(0, 20)
///     .find(SelectParams::new())?;
/// ```
pub struct Repository {
    entity_type: String,
    entity_manager: EntityManager,
    seed: Entity,
    hooks: Option<RepositoryHooks>,
    state: QueryState,
    table_locked: Arc<AtomicBool>,
}

/// Clears the being-saved flag of an entity when dropped.
struct BeingSaved<'a>(&'a mut Entity);

impl<'a> BeingSaved<'a> {
    fn mark(entity: &'a mut Entity) -> Self {
        entity.set_as_being_saved();
        BeingSaved(entity)
    }
}

impl Deref for BeingSaved<'_> {
    type Target = Entity;

    fn deref(&self) -> &Self::Target {
        self.0
    }
}

impl DerefMut for BeingSaved<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0
    }
}

impl Drop for BeingSaved<'_> {
    fn drop(&mut self) {
        self.0.set_as_not_being_saved();
    }
}

impl Repository {
    pub(crate) fn new(entity_type: &str, entity_manager: EntityManager) -> RelataResult<Self> {
        let seed = entity_manager.entity_factory().create(entity_type)?;
        let hooks = entity_manager.hooks(entity_type);
        Ok(Repository {
            entity_type: entity_type.to_string(),
            entity_manager,
            seed,
            hooks,
            state: QueryState::new(),
            table_locked: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn entity_manager(&self) -> &EntityManager {
        &self.entity_manager
    }

    pub fn mapper(&self) -> &Mapper {
        self.entity_manager.mapper()
    }

    pub(crate) fn hooks(&self) -> Option<&RepositoryHooks> {
        self.hooks.as_ref()
    }

    // ---- accumulated query state ----

    /// Merges a where clause into the accumulated one; keys of `where_clause` win.
    pub fn where_clause(&mut self, where_clause: WhereClause) -> &mut Self {
        self.state.merge_where(where_clause);
        self
    }

    /// Appends a single `key => value` condition as its own group. A null value is
    /// ignored.
    pub fn where_eq<V: Into<Value>>(&mut self, key: &str, value: V) -> &mut Self {
        self.state.push_where(key, value.into());
        self
    }

    /// Merges a having clause into the accumulated one; keys of `having_clause` win.
    pub fn having_clause(&mut self, having_clause: WhereClause) -> &mut Self {
        self.state.merge_having(having_clause);
        self
    }

    pub fn having_eq<V: Into<Value>>(&mut self, key: &str, value: V) -> &mut Self {
        self.state.push_having(key, value.into());
        self
    }

    /// Adds one join or a list of joins, in call order.
    pub fn join<J: Into<JoinList>>(&mut self, joins: J) -> &mut Self {
        self.state.add_joins(joins.into());
        self
    }

    pub fn left_join<J: Into<JoinList>>(&mut self, joins: J) -> &mut Self {
        self.state.add_left_joins(joins.into());
        self
    }

    pub fn order(&mut self, attribute: &str, order: SortOrder) -> &mut Self {
        self.state.set_order(OrderBy::from(attribute), order);
        self
    }

    /// Orders by several attributes, each with its own direction.
    pub fn order_list(&mut self, list: Vec<(&str, SortOrder)>) -> &mut Self {
        self.state.set_order(OrderBy::from(list), SortOrder::Ascending);
        self
    }

    pub fn limit(&mut self, offset: u64, limit: u64) -> &mut Self {
        self.state.set_limit(Some(offset), Some(limit));
        self
    }

    pub fn select(&mut self, attributes: &[&str]) -> &mut Self {
        self.state
            .set_select(attributes.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn group_by(&mut self, attributes: &[&str]) -> &mut Self {
        self.state
            .set_group_by(attributes.iter().map(|a| a.to_string()).collect());
        self
    }

    pub fn distinct(&mut self) -> &mut Self {
        self.state.set_distinct();
        self
    }

    /// Requests a streamed, forward-only collection from the next find.
    pub fn sth(&mut self) -> &mut Self {
        self.state.set_sth();
        self
    }

    /// Clears the accumulated where clause, having clause and list params.
    pub fn reset(&mut self) -> &mut Self {
        self.state.reset();
        self
    }

    pub fn set_list_params(&mut self, params: SelectParams) -> &mut Self {
        self.state.set_list_params(params);
        self
    }

    pub fn list_params(&self) -> &SelectParams {
        self.state.list_params()
    }

    pub fn query_state(&self) -> &QueryState {
        &self.state
    }

    /// The parameters a terminal call with `explicit` would hand to the mapper.
    pub fn get_select_params(&self, explicit: SelectParams) -> SelectParams {
        let params = merge_select_params(
            &self.state,
            explicit,
            self.entity_manager.config().merge_policy(),
        );
        if self.entity_manager.config().trace_queries() {
            log::debug!("Effective select params for {}: {}", self.entity_type, params);
        }
        params
    }

    /// Runs the type's select-params hook unless the params opt out.
    pub(crate) fn handle_select_params(&self, params: &mut SelectParams) {
        if params.is_skip_additional_select_params() {
            return;
        }
        if let Some(hooks) = &self.hooks {
            hooks.handle_select_params(params);
        }
    }

    // ---- lifecycle ----

    /// Creates an empty entity of this type, marked new, with type defaults populated.
    pub fn get_new(&self) -> RelataResult<Entity> {
        let mut entity = self.entity_manager.entity_factory().create(&self.entity_type)?;
        entity.set_is_new(true);
        if let Some(defs) = self.entity_manager.metadata().entity_defs(&self.entity_type) {
            entity.populate_defaults(defs.defaults());
        }
        Ok(entity)
    }

    /// A new entity without an id, the stored one with it.
    pub fn get(&self, id: Option<&str>) -> RelataResult<Option<Entity>> {
        match id {
            None => self.get_new().map(Some),
            Some(id) => self.get_by_id(id, SelectParams::new()),
        }
    }

    /// Loads one entity by id. Not found is `Ok(None)`.
    pub fn get_by_id(&self, id: &str, mut params: SelectParams) -> RelataResult<Option<Entity>> {
        self.handle_select_params(&mut params);
        log::debug!("Loading {} {}", self.entity_type, id);
        self.mapper().select_by_id(&self.seed, id, &params)
    }

    /// Inserts a new entity or updates a stored one, running the save hooks.
    ///
    /// The entity is flagged as being saved for the duration of the call; the flag is
    /// cleared on every exit path, including hook and mapper failures.
    pub fn save(&self, entity: &mut Entity, options: &SaveOptions) -> RelataResult<()> {
        let mut entity = BeingSaved::mark(entity);

        if options.runs_before_save() {
            if let Some(hooks) = &self.hooks {
                hooks.before_save(&mut entity, options)?;
            }
        }

        let result = if entity.is_new() && !entity.is_saved() {
            log::debug!("Inserting {}", self.entity_type);
            self.mapper().insert(&mut entity)
        } else {
            log::debug!("Updating {} {}", self.entity_type, entity.id().unwrap_or("-"));
            self.mapper().update(&mut entity)
        };
        if let Err(err) = result {
            log::error!("Failed to save {}: {}", self.entity_type, err);
            return Err(err);
        }

        entity.set_is_saved(true);

        if options.runs_after_save() {
            if let Some(hooks) = &self.hooks {
                hooks.after_save(&mut entity, options)?;
            }
        }

        if entity.is_new() {
            if !options.is_keep_new() {
                entity.set_is_new(false);
            }
        } else if entity.is_fetched() {
            entity.update_fetched_values();
        }
        Ok(())
    }

    /// Soft-deletes an entity, running the remove hooks.
    pub fn remove(&self, entity: &mut Entity, options: &HookOptions) -> RelataResult<()> {
        if let Some(hooks) = &self.hooks {
            hooks.before_remove(entity, options)?;
        }
        log::debug!("Removing {} {}", self.entity_type, entity.id().unwrap_or("-"));
        if let Err(err) = self.mapper().delete(entity) {
            log::error!("Failed to remove {}: {}", self.entity_type, err);
            return Err(err);
        }
        if let Some(hooks) = &self.hooks {
            hooks.after_remove(entity, options)?;
        }
        Ok(())
    }

    /// Hard-deletes a record by id without hooks; with `only_deleted` only a
    /// soft-deleted one.
    pub fn delete_from_db(&self, id: &str, only_deleted: bool) -> RelataResult<bool> {
        log::debug!("Deleting {} {} from storage", self.entity_type, id);
        self.mapper().delete_from_db(&self.entity_type, id, only_deleted)
    }

    /// Clears the soft-delete flag of a record.
    pub fn restore_deleted(&self, id: &str) -> RelataResult<bool> {
        self.mapper().restore_deleted(&self.entity_type, id)
    }

    // ---- terminal reads ----

    /// Runs the merged query. The accumulated state is reset afterwards.
    pub fn find(&mut self, params: SelectParams) -> RelataResult<EntityCollection> {
        let mut params = self.get_select_params(params);
        self.handle_select_params(&mut params);
        log::debug!("Finding {}", self.entity_type);
        let result = self.mapper().select(&self.seed, &params);
        self.state.reset();
        result
    }

    /// The first entity of the merged query limited to one row, if any.
    pub fn find_one(&mut self, params: SelectParams) -> RelataResult<Option<Entity>> {
        let mut collection = self.limit(0, 1).find(params)?;
        collection.first().transpose()
    }

    /// Runs a raw query. The accumulated state is reset afterwards.
    pub fn find_by_query(
        &mut self,
        query: &str,
        mode: CollectionMode,
    ) -> RelataResult<EntityCollection> {
        log::debug!("Finding {} by raw query", self.entity_type);
        let result = self.mapper().select_by_query(&self.seed, query, mode);
        self.state.reset();
        result
    }

    /// Resets the state and returns every record.
    #[deprecated(note = "use `reset` followed by `find`")]
    pub fn get_all(&mut self) -> RelataResult<EntityCollection> {
        self.state.reset();
        self.find(SelectParams::new())
    }

    /// Number of records matching the merged query.
    pub fn count(&mut self, mut params: SelectParams) -> RelataResult<i64> {
        self.handle_select_params(&mut params);
        let params = self.get_select_params(params);
        let result = self.mapper().count(&self.seed, &params);
        self.state.reset();
        Ok(result?.to_int())
    }

    /// Maximum of `field` over the accumulated query, `Value::Null` when nothing matches.
    pub fn max(&mut self, field: &str) -> RelataResult<Value> {
        let params = self.get_select_params(SelectParams::new());
        let result = self.mapper().max(&self.seed, &params, field);
        self.state.reset();
        result
    }

    pub fn min(&mut self, field: &str) -> RelataResult<Value> {
        let params = self.get_select_params(SelectParams::new());
        let result = self.mapper().min(&self.seed, &params, field);
        self.state.reset();
        result
    }

    pub fn sum(&mut self, field: &str) -> RelataResult<Value> {
        let params = self.get_select_params(SelectParams::new());
        let result = self.mapper().sum(&self.seed, &params, field);
        self.state.reset();
        result
    }

    // ---- table lock ----

    /// Acquires the exclusive write lock of this type's table.
    ///
    /// The lock is not reentrant: a second call while the guard is alive fails with
    /// [`ErrorKind::LockError`].
    pub fn lock_table(&self) -> RelataResult<TableLockGuard> {
        if self
            .table_locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            log::warn!("Table of {} is already locked by this repository", self.entity_type);
            return Err(RelataError::new(
                &format!("Table of {} is already locked", self.entity_type),
                ErrorKind::LockError,
            ));
        }

        log::debug!("Locking table of {}", self.entity_type);
        if let Err(err) = self.mapper().lock_table(&self.entity_type) {
            self.table_locked.store(false, Ordering::Release);
            log::error!("Failed to lock table of {}: {}", self.entity_type, err);
            return Err(err);
        }
        Ok(TableLockGuard::new(
            self.mapper().clone(),
            &self.entity_type,
            self.table_locked.clone(),
        ))
    }

    pub fn is_table_locked(&self) -> bool {
        self.table_locked.load(Ordering::Acquire)
    }
}
