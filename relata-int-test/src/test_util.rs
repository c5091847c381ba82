use parking_lot::Mutex;
use relata::common::Value;
use relata::config::MergePolicy;
use relata::entity::{Entity, EntityDefs, Metadata, RelationDescriptor};
use relata::entity_manager::EntityManager;
use relata::errors::{ErrorKind, RelataError, RelataResult};
use relata::mapper::{Mapper, MemoryMapper, RelationData};
use relata::query::SelectParams;
use relata::repository::{
    Foreign, HookOptions, RelationOverrideProvider, Repository, RepositoryHooks,
    RepositoryHooksProvider, SaveOptions,
};
use std::collections::HashSet;
use std::sync::Arc;

pub const ENTITY_TYPES: [&str; 4] = ["Account", "Contact", "Team", "Note"];

/// Runs a test between a setup and a teardown step.
///
/// The teardown runs even when the test body fails; the first failure is reported.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> RelataResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    B: Fn() -> RelataResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> RelataResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    let result = std::panic::catch_unwind(|| {
        let ctx = before().map_err(|e| format!("Before run failed: {:?}", e))?;
        let test_result = test(ctx.clone());
        let after_result = after(ctx);
        test_result.map_err(|e| format!("Test failed: {:?}", e))?;
        after_result.map_err(|e| format!("After run failed: {:?}", e))
    });

    match result {
        Ok(Ok(())) => {}
        Ok(Err(message)) => panic!("{}", message),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[derive(Clone)]
pub struct TestContext {
    entity_manager: EntityManager,
    mapper: MemoryMapper,
    recorder: HookRecorder,
}

impl TestContext {
    pub fn new(entity_manager: EntityManager, mapper: MemoryMapper, recorder: HookRecorder) -> Self {
        Self {
            entity_manager,
            mapper,
            recorder,
        }
    }

    pub fn em(&self) -> EntityManager {
        self.entity_manager.clone()
    }

    pub fn mapper(&self) -> MemoryMapper {
        self.mapper.clone()
    }

    pub fn recorder(&self) -> HookRecorder {
        self.recorder.clone()
    }

    pub fn repository(&self, entity_type: &str) -> RelataResult<Repository> {
        self.entity_manager.repository(entity_type)
    }
}

/// Accounts with contacts and notes, contacts in teams, notes attached to any parent.
pub fn test_metadata() -> Metadata {
    Metadata::new()
        .with_entity(
            EntityDefs::new("Account")
                .default_value("type", "Customer")
                .default_value("rating", 0)
                .relation(RelationDescriptor::has_many("contacts", "Contact", "accountId"))
                .relation(RelationDescriptor::has_many("notes", "Note", "parentId")),
        )
        .with_entity(
            EntityDefs::new("Contact")
                .relation(RelationDescriptor::belongs_to("account", "Account"))
                .relation(
                    RelationDescriptor::many_many("teams", "Team", "team_contact", "contactId", "teamId")
                        .additional_column("role"),
                ),
        )
        .with_entity(
            EntityDefs::new("Team").relation(
                RelationDescriptor::many_many("contacts", "Contact", "team_contact", "teamId", "contactId")
                    .additional_column("role"),
            ),
        )
        .with_entity(
            EntityDefs::new("Note").relation(RelationDescriptor::belongs_to_parent("parent")),
        )
}

pub fn create_test_context() -> RelataResult<TestContext> {
    create_context(MergePolicy::Legacy)
}

pub fn create_symmetric_test_context() -> RelataResult<TestContext> {
    create_context(MergePolicy::Symmetric)
}

fn create_context(merge_policy: MergePolicy) -> RelataResult<TestContext> {
    let mapper = MemoryMapper::new(Arc::new(test_metadata()));
    let recorder = HookRecorder::new();

    let mut builder = EntityManager::builder()
        .metadata(test_metadata())
        .mapper(Mapper::new(mapper.clone()))
        .merge_policy(merge_policy)
        .trace_queries(true);
    for entity_type in ENTITY_TYPES {
        builder = builder.repository_hooks(
            entity_type,
            RepositoryHooks::new(RecordingHooks::new(recorder.clone())),
        );
    }

    Ok(TestContext::new(builder.build()?, mapper, recorder))
}

/// Fails when a test left a table locked.
pub fn cleanup(ctx: TestContext) -> RelataResult<()> {
    for entity_type in ENTITY_TYPES {
        if ctx.mapper().is_table_locked(entity_type) {
            return Err(RelataError::new(
                &format!("Table of {} is still locked", entity_type),
                ErrorKind::LockError,
            ));
        }
    }
    ctx.mapper().clear_journal();
    ctx.recorder().clear();
    Ok(())
}

/// Creates and saves an entity with the given attributes, skipping hooks.
pub fn save_new(ctx: &TestContext, entity_type: &str, attributes: &[(&str, Value)]) -> RelataResult<Entity> {
    let repository = ctx.repository(entity_type)?;
    let mut entity = repository.get_new()?;
    for (name, value) in attributes {
        entity.set(name, value.clone());
    }
    repository.save(&mut entity, &SaveOptions::new().skip_all())?;
    Ok(entity)
}

pub fn save_account(ctx: &TestContext, name: &str, rating: i64) -> RelataResult<Entity> {
    save_new(
        ctx,
        "Account",
        &[("name", Value::from(name)), ("rating", Value::from(rating))],
    )
}

pub fn save_contact(ctx: &TestContext, name: &str) -> RelataResult<Entity> {
    save_new(ctx, "Contact", &[("name", Value::from(name))])
}

pub fn save_team(ctx: &TestContext, name: &str) -> RelataResult<Entity> {
    save_new(ctx, "Team", &[("name", Value::from(name))])
}

pub fn names(entities: &[Entity]) -> Vec<String> {
    entities
        .iter()
        .filter_map(|e| e.get_str("name").map(String::from))
        .collect()
}

/// Shared log of hook invocations with optional injected failures.
#[derive(Clone, Default)]
pub struct HookRecorder {
    events: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashSet<String>>>,
}

impl HookRecorder {
    pub fn new() -> Self {
        HookRecorder::default()
    }

    /// Records `event` and fails if a failure was injected for it.
    pub fn hit(&self, event: &str) -> RelataResult<()> {
        self.events.lock().push(event.to_string());
        if self.failures.lock().remove(event) {
            return Err(RelataError::new(
                &format!("Hook {} failed", event),
                ErrorKind::HookError,
            ));
        }
        Ok(())
    }

    /// Makes the next `hit` of `event` fail.
    pub fn fail_on(&self, event: &str) {
        self.failures.lock().insert(event.to_string());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| e.as_str() == event).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
        self.failures.lock().clear();
    }
}

/// Repository hooks that record every invocation as `<hook>:<entity type>` or
/// `<hook>:<entity type>.<relation>`.
pub struct RecordingHooks {
    recorder: HookRecorder,
    select_filter: Option<(String, Value)>,
}

impl RecordingHooks {
    pub fn new(recorder: HookRecorder) -> Self {
        RecordingHooks {
            recorder,
            select_filter: None,
        }
    }

    /// Adds `key => value` to the where clause of every read of the type.
    pub fn with_select_filter<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.select_filter = Some((key.to_string(), value.into()));
        self
    }
}

impl RepositoryHooksProvider for RecordingHooks {
    fn before_save(&self, entity: &mut Entity, _options: &SaveOptions) -> RelataResult<()> {
        self.recorder
            .hit(&format!("before_save:{}", entity.entity_type()))
    }

    fn after_save(&self, entity: &mut Entity, _options: &SaveOptions) -> RelataResult<()> {
        self.recorder
            .hit(&format!("after_save:{}", entity.entity_type()))
    }

    fn before_remove(&self, entity: &mut Entity, _options: &HookOptions) -> RelataResult<()> {
        self.recorder
            .hit(&format!("before_remove:{}", entity.entity_type()))
    }

    fn after_remove(&self, entity: &mut Entity, _options: &HookOptions) -> RelataResult<()> {
        self.recorder
            .hit(&format!("after_remove:{}", entity.entity_type()))
    }

    fn before_relate(
        &self,
        entity: &Entity,
        relation: &str,
        _foreign: &Foreign<'_>,
        _data: Option<&RelationData>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        self.recorder
            .hit(&format!("before_relate:{}.{}", entity.entity_type(), relation))
    }

    fn after_relate(
        &self,
        entity: &Entity,
        relation: &str,
        _foreign: &Foreign<'_>,
        _data: Option<&RelationData>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        self.recorder
            .hit(&format!("after_relate:{}.{}", entity.entity_type(), relation))
    }

    fn before_unrelate(
        &self,
        entity: &Entity,
        relation: &str,
        _foreign: &Foreign<'_>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        self.recorder
            .hit(&format!("before_unrelate:{}.{}", entity.entity_type(), relation))
    }

    fn after_unrelate(
        &self,
        entity: &Entity,
        relation: &str,
        _foreign: &Foreign<'_>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        self.recorder
            .hit(&format!("after_unrelate:{}.{}", entity.entity_type(), relation))
    }

    fn before_mass_relate(
        &self,
        entity: &Entity,
        relation: &str,
        _params: &SelectParams,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        self.recorder
            .hit(&format!("before_mass_relate:{}.{}", entity.entity_type(), relation))
    }

    fn after_mass_relate(
        &self,
        entity: &Entity,
        relation: &str,
        _params: &SelectParams,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        self.recorder
            .hit(&format!("after_mass_relate:{}.{}", entity.entity_type(), relation))
    }

    fn handle_select_params(&self, params: &mut SelectParams) {
        if let Some((key, value)) = &self.select_filter {
            params.add_where_condition(key, value.clone());
        }
    }
}

/// Relation override recording its hooks as `override.<hook>`; optionally defines the
/// relate and unrelate operations itself.
pub struct RecordingOverride {
    recorder: HookRecorder,
    defines_operations: bool,
}

impl RecordingOverride {
    /// An override with hooks only.
    pub fn hooks_only(recorder: HookRecorder) -> Self {
        RecordingOverride {
            recorder,
            defines_operations: false,
        }
    }

    /// An override whose relate and unrelate succeed without touching the mapper.
    pub fn with_operations(recorder: HookRecorder) -> Self {
        RecordingOverride {
            recorder,
            defines_operations: true,
        }
    }
}

impl RelationOverrideProvider for RecordingOverride {
    fn before_relate(
        &self,
        _entity: &Entity,
        _foreign: &Foreign<'_>,
        _data: Option<&RelationData>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        self.recorder.hit("override.before_relate")
    }

    fn relate(
        &self,
        _repository: &Repository,
        _entity: &Entity,
        _foreign: &Foreign<'_>,
        _data: Option<&RelationData>,
        _options: &HookOptions,
    ) -> Option<RelataResult<bool>> {
        if !self.defines_operations {
            return None;
        }
        Some(self.recorder.hit("override.relate").map(|_| true))
    }

    fn after_relate(
        &self,
        _entity: &Entity,
        _foreign: &Foreign<'_>,
        _data: Option<&RelationData>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        self.recorder.hit("override.after_relate")
    }

    fn before_unrelate(
        &self,
        _entity: &Entity,
        _foreign: &Foreign<'_>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        self.recorder.hit("override.before_unrelate")
    }

    fn unrelate(
        &self,
        _repository: &Repository,
        _entity: &Entity,
        _foreign: &Foreign<'_>,
        _options: &HookOptions,
    ) -> Option<RelataResult<bool>> {
        if !self.defines_operations {
            return None;
        }
        Some(self.recorder.hit("override.unrelate").map(|_| true))
    }

    fn after_unrelate(
        &self,
        _entity: &Entity,
        _foreign: &Foreign<'_>,
        _options: &HookOptions,
    ) -> RelataResult<()> {
        self.recorder.hit("override.after_unrelate")
    }
}
