use crate::common::{Value, DELETED, ID};
use crate::entity::{Entity, Metadata, RelationDescriptor, RelationKind};
use crate::errors::{ErrorKind, RelataError, RelataResult};
use crate::mapper::memory::matcher::{distinct, matches, project, sort_rows, Row};
use crate::mapper::memory::{MapperCall, MapperOperation};
use crate::mapper::{
    CollectionMode, EntityCollection, MapperProvider, Related, RelationData,
};
use crate::query::SelectParams;
use dashmap::{DashMap, DashSet};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// In-memory implementation of the mapper boundary.
///
/// # Purpose
/// `MemoryMapper` keeps rows per entity type and pivot rows per pivot table in memory
/// and evaluates [`SelectParams`] against them. It is the default mapper of an entity
/// manager built without one, and the collaborator the test suites assert against.
///
/// # Characteristics
/// - **Thread-Safe**: tables sit behind `parking_lot` locks; clones share state
/// - **Soft delete**: `delete` sets the `deleted` attribute; reads skip deleted rows
/// - **Identity**: `insert` assigns a UUID when the entity has no id; a duplicate id
///   is a storage error
/// - **Where evaluation**: equality, membership for arrays, `!=`, `>`, `>=`, `<`, `<=`
///   and `*` (like) key suffixes, `OR`/`AND`/`NOT` and nested groups
/// - **Reads**: projection, ordering, distinct, offset and limit; joins and having
///   clauses are recorded but not evaluated
/// - **Relations**: belongs-to and belongs-to-parent through the local key,
///   has-many through the foreign key on the target, many-to-many through pivot rows
///   carrying the declared additional columns
/// - **Journal**: every call is recorded as a [`MapperCall`]
/// - **Failure injection**: [`MemoryMapper::fail_next`] makes the next call of one
///   operation fail with a storage error
/// - **Raw queries**: results are registered up front with
///   [`MemoryMapper::register_query`]
#[derive(Clone)]
pub struct MemoryMapper {
    inner: Arc<MemoryMapperInner>,
}

struct MemoryMapperInner {
    metadata: Arc<Metadata>,
    tables: RwLock<IndexMap<String, IndexMap<String, Row>>>,
    pivots: RwLock<IndexMap<String, Vec<Row>>>,
    journal: RwLock<Vec<MapperCall>>,
    failures: DashSet<MapperOperation>,
    locked_tables: DashSet<String>,
    queries: DashMap<String, Vec<Entity>>,
}

impl MemoryMapper {
    pub fn new(metadata: Arc<Metadata>) -> Self {
        MemoryMapper {
            inner: Arc::new(MemoryMapperInner {
                metadata,
                tables: RwLock::new(IndexMap::new()),
                pivots: RwLock::new(IndexMap::new()),
                journal: RwLock::new(Vec::new()),
                failures: DashSet::new(),
                locked_tables: DashSet::new(),
                queries: DashMap::new(),
            }),
        }
    }

    /// Every call recorded so far, oldest first.
    pub fn journal(&self) -> Vec<MapperCall> {
        self.inner.journal.read().clone()
    }

    /// Recorded calls of one operation.
    pub fn calls(&self, operation: MapperOperation) -> Vec<MapperCall> {
        self.inner
            .journal
            .read()
            .iter()
            .filter(|call| call.operation == operation)
            .cloned()
            .collect()
    }

    pub fn call_count(&self, operation: MapperOperation) -> usize {
        self.inner
            .journal
            .read()
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Recorded calls that change stored rows or links.
    pub fn write_count(&self) -> usize {
        self.inner
            .journal
            .read()
            .iter()
            .filter(|call| call.operation.is_write())
            .count()
    }

    pub fn clear_journal(&self) {
        self.inner.journal.write().clear();
    }

    /// Makes the next call of `operation` fail with a storage error.
    pub fn fail_next(&self, operation: MapperOperation) {
        self.inner.failures.insert(operation);
    }

    /// Registers the result of a raw query.
    pub fn register_query(&self, query: &str, entities: Vec<Entity>) {
        self.inner.queries.insert(query.to_string(), entities);
    }

    pub fn is_table_locked(&self, entity_type: &str) -> bool {
        self.inner.locked_tables.contains(entity_type)
    }

    /// Reads a stored row, soft-deleted or not, bypassing the journal.
    pub fn stored(&self, entity_type: &str, id: &str) -> Option<Entity> {
        self.inner
            .tables
            .read()
            .get(entity_type)
            .and_then(|table| table.get(id))
            .map(|row| Entity::fetched(entity_type, row.clone()))
    }

    /// Number of stored rows of a type, soft-deleted ones included.
    pub fn row_count(&self, entity_type: &str) -> usize {
        self.inner
            .tables
            .read()
            .get(entity_type)
            .map(|table| table.len())
            .unwrap_or(0)
    }

    /// Rows of a pivot table.
    pub fn pivot_rows(&self, pivot_table: &str) -> Vec<IndexMap<String, Value>> {
        self.inner
            .pivots
            .read()
            .get(pivot_table)
            .cloned()
            .unwrap_or_default()
    }

    fn record(&self, call: MapperCall) -> RelataResult<()> {
        let operation = call.operation;
        self.inner.journal.write().push(call);
        if self.inner.failures.remove(&operation).is_some() {
            log::error!("Injected failure for mapper operation {}", operation);
            return Err(RelataError::new(
                &format!("Mapper operation {} failed", operation),
                ErrorKind::StorageError,
            ));
        }
        Ok(())
    }

    fn descriptor(&self, entity_type: &str, relation: &str) -> RelataResult<RelationDescriptor> {
        self.inner
            .metadata
            .relation(entity_type, relation)
            .cloned()
            .ok_or_else(|| {
                RelataError::new(
                    &format!("Relation {}.{} is not defined", entity_type, relation),
                    ErrorKind::InvalidRelation,
                )
            })
    }

    fn target_type(descriptor: &RelationDescriptor) -> RelataResult<&str> {
        descriptor.entity().ok_or_else(|| {
            RelataError::new(
                &format!("Relation {} has no fixed target type", descriptor.name()),
                ErrorKind::InvalidRelation,
            )
        })
    }

    /// Live rows of a type matching the where clause.
    fn filtered_rows(
        &self,
        entity_type: &str,
        params: &SelectParams,
        extra: impl Fn(&Row) -> bool,
    ) -> Vec<Row> {
        let tables = self.inner.tables.read();
        let table = match tables.get(entity_type) {
            Some(table) => table,
            None => return Vec::new(),
        };
        table
            .values()
            .filter(|row| !is_deleted(row))
            .filter(|row| match params.get_where_clause() {
                Some(where_clause) => matches(row, where_clause),
                None => true,
            })
            .filter(|row| extra(*row))
            .cloned()
            .collect()
    }

    /// Filtered rows with ordering, projection, distinct and pagination applied.
    fn query_rows(
        &self,
        entity_type: &str,
        params: &SelectParams,
        extra: impl Fn(&Row) -> bool,
    ) -> Vec<Row> {
        let mut rows = self.filtered_rows(entity_type, params, extra);
        sort_rows(&mut rows, params.get_order_by(), params.get_order());

        let mut rows = rows
            .iter()
            .map(|row| project(row, params.get_select()))
            .collect::<Vec<_>>();
        if params.is_distinct() {
            rows = distinct(rows);
        }

        let offset = params.get_offset().unwrap_or(0) as usize;
        let rows = rows.into_iter().skip(offset);
        match params.get_limit() {
            Some(limit) => rows.take(limit as usize).collect(),
            None => rows.collect(),
        }
    }

    fn to_collection(entity_type: &str, rows: Vec<Row>, streamed: bool) -> EntityCollection {
        let entity_type = entity_type.to_string();
        if streamed {
            let iter = rows
                .into_iter()
                .map(move |row| Ok(Entity::fetched(&entity_type, row)));
            EntityCollection::streamed(Box::new(iter))
        } else {
            EntityCollection::materialized(
                rows.into_iter()
                    .map(|row| Entity::fetched(&entity_type, row))
                    .collect(),
            )
        }
    }

    fn update_row(&self, entity_type: &str, id: &str, apply: impl FnOnce(&mut Row)) -> bool {
        let mut tables = self.inner.tables.write();
        match tables.get_mut(entity_type).and_then(|table| table.get_mut(id)) {
            Some(row) if !is_deleted(row) => {
                apply(row);
                true
            }
            _ => false,
        }
    }

    fn row_exists(&self, entity_type: &str, id: &str) -> bool {
        self.inner
            .tables
            .read()
            .get(entity_type)
            .and_then(|table| table.get(id))
            .map(|row| !is_deleted(row))
            .unwrap_or(false)
    }

    /// Value of a local attribute, from the entity or else from its stored row.
    fn local_value(&self, entity: &Entity, attribute: &str) -> Value {
        let value = entity.get(attribute);
        if value != Value::Null {
            return value;
        }
        match entity.id() {
            Some(id) => self
                .inner
                .tables
                .read()
                .get(entity.entity_type())
                .and_then(|table| table.get(id))
                .and_then(|row| row.get(attribute).cloned())
                .unwrap_or_default(),
            None => Value::Null,
        }
    }

    fn link(
        &self,
        entity: &Entity,
        descriptor: &RelationDescriptor,
        foreign_id: &str,
        foreign_type: Option<&str>,
        data: Option<&RelationData>,
    ) -> RelataResult<bool> {
        let id = match entity.id() {
            Some(id) => id,
            None => return Ok(false),
        };

        match descriptor.kind() {
            RelationKind::BelongsTo => {
                let target = Self::target_type(descriptor)?;
                if !self.row_exists(target, foreign_id) {
                    return Ok(false);
                }
                let key = descriptor.key().unwrap_or_default().to_string();
                Ok(self.update_row(entity.entity_type(), id, |row| {
                    row.insert(key, Value::from(foreign_id));
                }))
            }
            RelationKind::BelongsToParent => {
                let foreign_type = match foreign_type {
                    Some(foreign_type) => foreign_type,
                    None => return Ok(false),
                };
                if !self.row_exists(foreign_type, foreign_id) {
                    return Ok(false);
                }
                let key = descriptor.key().unwrap_or_default().to_string();
                let type_key = descriptor.type_key().unwrap_or_default().to_string();
                Ok(self.update_row(entity.entity_type(), id, |row| {
                    row.insert(key, Value::from(foreign_id));
                    row.insert(type_key, Value::from(foreign_type));
                }))
            }
            RelationKind::HasMany => {
                let target = Self::target_type(descriptor)?;
                let foreign_key = descriptor.foreign_key().unwrap_or_default().to_string();
                Ok(self.update_row(target, foreign_id, |row| {
                    row.insert(foreign_key, Value::from(id));
                }))
            }
            RelationKind::ManyMany => {
                let target = Self::target_type(descriptor)?;
                if !self.row_exists(target, foreign_id) {
                    return Ok(false);
                }
                let pivot = match descriptor.pivot() {
                    Some(pivot) => pivot,
                    None => return Ok(false),
                };
                let columns = pivot_columns(descriptor, data);

                let mut pivots = self.inner.pivots.write();
                let rows = pivots.entry(pivot.table.clone()).or_default();
                match rows
                    .iter()
                    .position(|row| is_pivot_of(row, &pivot.local_key, id, &pivot.foreign_key, foreign_id))
                {
                    Some(index) => rows[index].extend(columns),
                    None => {
                        let mut row = Row::new();
                        row.insert(ID.to_string(), Value::from(uuid::Uuid::new_v4().to_string()));
                        row.insert(pivot.local_key.clone(), Value::from(id));
                        row.insert(pivot.foreign_key.clone(), Value::from(foreign_id));
                        row.extend(columns);
                        rows.push(row);
                    }
                }
                Ok(true)
            }
        }
    }

    fn unlink(
        &self,
        entity: &Entity,
        descriptor: &RelationDescriptor,
        foreign_id: Option<&str>,
    ) -> RelataResult<bool> {
        let id = match entity.id() {
            Some(id) => id,
            None => return Ok(false),
        };

        match descriptor.kind() {
            RelationKind::BelongsTo | RelationKind::BelongsToParent => {
                let key = descriptor.key().unwrap_or_default().to_string();
                let type_key = descriptor.type_key().map(String::from);
                if let Some(foreign_id) = foreign_id {
                    if self.local_value(entity, &key).as_str() != Some(foreign_id) {
                        return Ok(false);
                    }
                }
                Ok(self.update_row(entity.entity_type(), id, |row| {
                    row.insert(key, Value::Null);
                    if let Some(type_key) = type_key {
                        row.insert(type_key, Value::Null);
                    }
                }))
            }
            RelationKind::HasMany => {
                let target = Self::target_type(descriptor)?;
                let foreign_key = descriptor.foreign_key().unwrap_or_default();
                let mut tables = self.inner.tables.write();
                let table = match tables.get_mut(target) {
                    Some(table) => table,
                    None => return Ok(false),
                };
                let mut changed = false;
                for (row_id, row) in table.iter_mut() {
                    let pointing = row.get(foreign_key).and_then(|v| v.as_str()) == Some(id);
                    let selected = foreign_id.map(|f| f == row_id.as_str()).unwrap_or(true);
                    if pointing && selected {
                        row.insert(foreign_key.to_string(), Value::Null);
                        changed = true;
                    }
                }
                Ok(changed || foreign_id.is_none())
            }
            RelationKind::ManyMany => {
                let pivot = match descriptor.pivot() {
                    Some(pivot) => pivot,
                    None => return Ok(false),
                };
                let mut pivots = self.inner.pivots.write();
                let rows = pivots.entry(pivot.table.clone()).or_default();
                let before = rows.len();
                rows.retain(|row| match foreign_id {
                    Some(foreign_id) => {
                        !is_pivot_of(row, &pivot.local_key, id, &pivot.foreign_key, foreign_id)
                    }
                    None => row.get(&pivot.local_key).and_then(|v| v.as_str()) != Some(id),
                });
                Ok(rows.len() < before || foreign_id.is_none())
            }
        }
    }

    /// Target type and id of a to-one relation, if set.
    fn to_one_target(
        &self,
        entity: &Entity,
        descriptor: &RelationDescriptor,
    ) -> RelataResult<Option<(String, String)>> {
        let key = descriptor.key().unwrap_or_default();
        let foreign_id = match self.local_value(entity, key) {
            Value::String(foreign_id) if !foreign_id.is_empty() => foreign_id,
            _ => return Ok(None),
        };
        let target = match descriptor.kind() {
            RelationKind::BelongsToParent => {
                match self.local_value(entity, descriptor.type_key().unwrap_or_default()) {
                    Value::String(target) if !target.is_empty() => target,
                    _ => return Ok(None),
                }
            }
            _ => Self::target_type(descriptor)?.to_string(),
        };
        Ok(Some((target, foreign_id)))
    }

    /// Ids of the records linked to `entity` through a to-many relation.
    fn to_many_filter(
        &self,
        entity: &Entity,
        descriptor: &RelationDescriptor,
    ) -> RelataResult<(String, Box<dyn Fn(&Row) -> bool>)> {
        let target = Self::target_type(descriptor)?.to_string();
        let id = entity.id().unwrap_or_default().to_string();

        match descriptor.kind() {
            RelationKind::HasMany => {
                let foreign_key = descriptor.foreign_key().unwrap_or_default().to_string();
                Ok((
                    target,
                    Box::new(move |row: &Row| {
                        row.get(&foreign_key).and_then(|v| v.as_str()) == Some(id.as_str())
                    }),
                ))
            }
            RelationKind::ManyMany => {
                let linked = match descriptor.pivot() {
                    Some(pivot) => self
                        .pivot_rows(&pivot.table)
                        .iter()
                        .filter(|row| row.get(&pivot.local_key).and_then(|v| v.as_str()) == Some(id.as_str()))
                        .filter_map(|row| row.get(&pivot.foreign_key).and_then(|v| v.as_str()).map(String::from))
                        .collect::<Vec<_>>(),
                    None => Vec::new(),
                };
                Ok((
                    target,
                    Box::new(move |row: &Row| match row.get(ID).and_then(|v| v.as_str()) {
                        Some(row_id) => linked.iter().any(|l| l == row_id),
                        None => false,
                    }),
                ))
            }
            kind => Err(RelataError::new(
                &format!("Relation {} of kind {} is not to-many", descriptor.name(), kind),
                ErrorKind::InvalidRelation,
            )),
        }
    }

    fn aggregate(
        &self,
        seed: &Entity,
        params: &SelectParams,
        field: &str,
        pick: impl Fn(&Value, &Value) -> bool,
    ) -> Value {
        self.filtered_rows(seed.entity_type(), params, |_| true)
            .iter()
            .filter_map(|row| row.get(field).filter(|v| !v.is_null()).cloned())
            .fold(Value::Null, |best, value| {
                if best.is_null() || pick(&value, &best) {
                    value
                } else {
                    best
                }
            })
    }
}

fn is_deleted(row: &Row) -> bool {
    matches!(row.get(DELETED), Some(Value::Bool(true)))
}

fn is_pivot_of(row: &Row, local_key: &str, id: &str, foreign_key: &str, foreign_id: &str) -> bool {
    row.get(local_key).and_then(|v| v.as_str()) == Some(id)
        && row.get(foreign_key).and_then(|v| v.as_str()) == Some(foreign_id)
}

/// Relate data restricted to the additional columns the relation declares.
fn pivot_columns(descriptor: &RelationDescriptor, data: Option<&RelationData>) -> Row {
    match data {
        Some(data) => data
            .iter()
            .filter(|(column, _)| descriptor.additional_columns().contains(column))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect(),
        None => Row::new(),
    }
}

impl MapperProvider for MemoryMapper {
    fn select_by_id(
        &self,
        seed: &Entity,
        id: &str,
        params: &SelectParams,
    ) -> RelataResult<Option<Entity>> {
        self.record(
            MapperCall::new(MapperOperation::SelectById, seed.entity_type())
                .foreign_id(id)
                .params(params),
        )?;
        let rows = self.query_rows(seed.entity_type(), params, |row| {
            row.get(ID).and_then(|v| v.as_str()) == Some(id)
        });
        Ok(rows
            .into_iter()
            .next()
            .map(|row| Entity::fetched(seed.entity_type(), row)))
    }

    fn select(&self, seed: &Entity, params: &SelectParams) -> RelataResult<EntityCollection> {
        self.record(MapperCall::new(MapperOperation::Select, seed.entity_type()).params(params))?;
        let rows = self.query_rows(seed.entity_type(), params, |_| true);
        Ok(Self::to_collection(seed.entity_type(), rows, params.is_sth()))
    }

    fn select_by_query(
        &self,
        seed: &Entity,
        query: &str,
        mode: CollectionMode,
    ) -> RelataResult<EntityCollection> {
        self.record(MapperCall::new(MapperOperation::SelectByQuery, seed.entity_type()))?;
        let entities = self
            .inner
            .queries
            .get(query)
            .map(|entry| entry.value().clone())
            .unwrap_or_default();
        Ok(match mode {
            CollectionMode::Materialized => EntityCollection::materialized(entities),
            CollectionMode::Streamed => {
                EntityCollection::streamed(Box::new(entities.into_iter().map(Ok)))
            }
        })
    }

    fn insert(&self, entity: &mut Entity) -> RelataResult<()> {
        self.record(MapperCall::new(MapperOperation::Insert, entity.entity_type()))?;
        if !entity.has_id() {
            entity.set_id(&uuid::Uuid::new_v4().to_string());
        }
        let id = entity.id().unwrap_or_default().to_string();

        let mut tables = self.inner.tables.write();
        let table = tables.entry(entity.entity_type().to_string()).or_default();
        if table.contains_key(&id) {
            log::error!("Duplicate id {} for entity type {}", id, entity.entity_type());
            return Err(RelataError::new(
                &format!("Duplicate id {} for entity type {}", id, entity.entity_type()),
                ErrorKind::StorageError,
            ));
        }
        table.insert(id, entity.attributes().clone());
        Ok(())
    }

    fn update(&self, entity: &mut Entity) -> RelataResult<()> {
        let call = MapperCall::new(MapperOperation::Update, entity.entity_type());
        let call = match entity.id() {
            Some(id) => call.foreign_id(id),
            None => call,
        };
        self.record(call)?;

        let id = entity.id().unwrap_or_default().to_string();
        let mut tables = self.inner.tables.write();
        match tables
            .get_mut(entity.entity_type())
            .and_then(|table| table.get_mut(&id))
        {
            Some(row) => {
                row.extend(entity.attributes().clone());
                Ok(())
            }
            None => Err(RelataError::new(
                &format!("No {} record with id {}", entity.entity_type(), id),
                ErrorKind::StorageError,
            )),
        }
    }

    fn delete(&self, entity: &mut Entity) -> RelataResult<()> {
        self.record(MapperCall::new(MapperOperation::Delete, entity.entity_type()))?;
        let id = entity.id().unwrap_or_default().to_string();
        if self.update_row(entity.entity_type(), &id, |row| {
            row.insert(DELETED.to_string(), Value::Bool(true));
        }) {
            entity.set(DELETED, true);
            Ok(())
        } else {
            Err(RelataError::new(
                &format!("No {} record with id {}", entity.entity_type(), id),
                ErrorKind::StorageError,
            ))
        }
    }

    fn delete_from_db(
        &self,
        entity_type: &str,
        id: &str,
        only_deleted: bool,
    ) -> RelataResult<bool> {
        self.record(MapperCall::new(MapperOperation::DeleteFromDb, entity_type).foreign_id(id))?;
        let mut tables = self.inner.tables.write();
        let table = match tables.get_mut(entity_type) {
            Some(table) => table,
            None => return Ok(false),
        };
        match table.get(id) {
            Some(row) if !only_deleted || is_deleted(row) => {
                table.shift_remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn restore_deleted(&self, entity_type: &str, id: &str) -> RelataResult<bool> {
        self.record(MapperCall::new(MapperOperation::RestoreDeleted, entity_type).foreign_id(id))?;
        let mut tables = self.inner.tables.write();
        match tables.get_mut(entity_type).and_then(|table| table.get_mut(id)) {
            Some(row) if is_deleted(row) => {
                row.insert(DELETED.to_string(), Value::Bool(false));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn count(&self, seed: &Entity, params: &SelectParams) -> RelataResult<Value> {
        self.record(MapperCall::new(MapperOperation::Count, seed.entity_type()).params(params))?;
        let rows = self.filtered_rows(seed.entity_type(), params, |_| true);
        Ok(Value::Int(rows.len() as i64))
    }

    fn max(&self, seed: &Entity, params: &SelectParams, field: &str) -> RelataResult<Value> {
        self.record(MapperCall::new(MapperOperation::Max, seed.entity_type()).params(params))?;
        Ok(self.aggregate(seed, params, field, |value, best| {
            value.compare(best) == std::cmp::Ordering::Greater
        }))
    }

    fn min(&self, seed: &Entity, params: &SelectParams, field: &str) -> RelataResult<Value> {
        self.record(MapperCall::new(MapperOperation::Min, seed.entity_type()).params(params))?;
        Ok(self.aggregate(seed, params, field, |value, best| {
            value.compare(best) == std::cmp::Ordering::Less
        }))
    }

    fn sum(&self, seed: &Entity, params: &SelectParams, field: &str) -> RelataResult<Value> {
        self.record(MapperCall::new(MapperOperation::Sum, seed.entity_type()).params(params))?;
        let values = self
            .filtered_rows(seed.entity_type(), params, |_| true)
            .iter()
            .filter_map(|row| row.get(field).filter(|v| v.is_number()).cloned())
            .collect::<Vec<_>>();

        if values.is_empty() {
            return Ok(Value::Null);
        }
        if values.iter().all(|v| matches!(v, Value::Int(_))) {
            Ok(Value::Int(values.iter().filter_map(|v| v.as_i64()).sum()))
        } else {
            Ok(Value::Float(values.iter().filter_map(|v| v.as_f64()).sum()))
        }
    }

    fn select_related(
        &self,
        entity: &Entity,
        relation: &str,
        params: &SelectParams,
    ) -> RelataResult<Related> {
        self.record(
            MapperCall::new(MapperOperation::SelectRelated, entity.entity_type())
                .relation(relation)
                .params(params),
        )?;
        let descriptor = self.descriptor(entity.entity_type(), relation)?;

        match descriptor.kind() {
            RelationKind::BelongsTo | RelationKind::BelongsToParent => {
                let (target, foreign_id) = match self.to_one_target(entity, &descriptor)? {
                    Some(target) => target,
                    None => return Ok(Related::One(None)),
                };
                let rows = self.query_rows(&target, params, |row| {
                    row.get(ID).and_then(|v| v.as_str()) == Some(foreign_id.as_str())
                });
                Ok(Related::One(
                    rows.into_iter()
                        .next()
                        .map(|row| Entity::fetched(&target, row)),
                ))
            }
            RelationKind::HasMany | RelationKind::ManyMany => {
                let (target, filter) = self.to_many_filter(entity, &descriptor)?;
                let rows = self.query_rows(&target, params, filter);
                Ok(Related::Many(Self::to_collection(&target, rows, params.is_sth())))
            }
        }
    }

    fn count_related(
        &self,
        entity: &Entity,
        relation: &str,
        params: &SelectParams,
    ) -> RelataResult<Value> {
        self.record(
            MapperCall::new(MapperOperation::CountRelated, entity.entity_type())
                .relation(relation)
                .params(params),
        )?;
        let descriptor = self.descriptor(entity.entity_type(), relation)?;

        let count = match descriptor.kind() {
            RelationKind::BelongsTo | RelationKind::BelongsToParent => {
                match self.to_one_target(entity, &descriptor)? {
                    Some((target, foreign_id)) => self
                        .filtered_rows(&target, params, |row| {
                            row.get(ID).and_then(|v| v.as_str()) == Some(foreign_id.as_str())
                        })
                        .len(),
                    None => 0,
                }
            }
            RelationKind::HasMany | RelationKind::ManyMany => {
                let (target, filter) = self.to_many_filter(entity, &descriptor)?;
                self.filtered_rows(&target, params, filter).len()
            }
        };
        Ok(Value::Int(count as i64))
    }

    fn relate(
        &self,
        entity: &Entity,
        relation: &str,
        foreign: &Entity,
        data: Option<&RelationData>,
    ) -> RelataResult<bool> {
        let foreign_id = foreign.id().unwrap_or_default();
        self.record(
            MapperCall::new(MapperOperation::Relate, entity.entity_type())
                .relation(relation)
                .foreign_id(foreign_id),
        )?;
        if foreign_id.is_empty() {
            return Ok(false);
        }
        let descriptor = self.descriptor(entity.entity_type(), relation)?;
        self.link(entity, &descriptor, foreign_id, Some(foreign.entity_type()), data)
    }

    fn unrelate(&self, entity: &Entity, relation: &str, foreign: &Entity) -> RelataResult<bool> {
        let foreign_id = foreign.id().unwrap_or_default();
        self.record(
            MapperCall::new(MapperOperation::Unrelate, entity.entity_type())
                .relation(relation)
                .foreign_id(foreign_id),
        )?;
        if foreign_id.is_empty() {
            return Ok(false);
        }
        let descriptor = self.descriptor(entity.entity_type(), relation)?;
        self.unlink(entity, &descriptor, Some(foreign_id))
    }

    fn add_relation(
        &self,
        entity: &Entity,
        relation: &str,
        foreign_id: &str,
        data: Option<&RelationData>,
    ) -> RelataResult<bool> {
        self.record(
            MapperCall::new(MapperOperation::AddRelation, entity.entity_type())
                .relation(relation)
                .foreign_id(foreign_id),
        )?;
        let descriptor = self.descriptor(entity.entity_type(), relation)?;
        self.link(entity, &descriptor, foreign_id, None, data)
    }

    fn remove_relation(
        &self,
        entity: &Entity,
        relation: &str,
        foreign_id: &str,
    ) -> RelataResult<bool> {
        self.record(
            MapperCall::new(MapperOperation::RemoveRelation, entity.entity_type())
                .relation(relation)
                .foreign_id(foreign_id),
        )?;
        let descriptor = self.descriptor(entity.entity_type(), relation)?;
        self.unlink(entity, &descriptor, Some(foreign_id))
    }

    fn remove_all_relations(&self, entity: &Entity, relation: &str) -> RelataResult<bool> {
        self.record(
            MapperCall::new(MapperOperation::RemoveAllRelations, entity.entity_type())
                .relation(relation),
        )?;
        let descriptor = self.descriptor(entity.entity_type(), relation)?;
        self.unlink(entity, &descriptor, None)
    }

    fn update_relation(
        &self,
        entity: &Entity,
        relation: &str,
        foreign_id: &str,
        data: &RelationData,
    ) -> RelataResult<bool> {
        self.record(
            MapperCall::new(MapperOperation::UpdateRelation, entity.entity_type())
                .relation(relation)
                .foreign_id(foreign_id),
        )?;
        let descriptor = self.descriptor(entity.entity_type(), relation)?;
        let (pivot, id) = match (descriptor.pivot(), entity.id()) {
            (Some(pivot), Some(id)) => (pivot, id),
            _ => return Ok(false),
        };
        let columns = pivot_columns(&descriptor, Some(data));

        let mut pivots = self.inner.pivots.write();
        let row = pivots.get_mut(&pivot.table).and_then(|rows| {
            rows.iter_mut()
                .find(|row| is_pivot_of(row, &pivot.local_key, id, &pivot.foreign_key, foreign_id))
        });
        match row {
            Some(row) => {
                row.extend(columns);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn mass_relate(
        &self,
        entity: &Entity,
        relation: &str,
        params: &SelectParams,
    ) -> RelataResult<bool> {
        self.record(
            MapperCall::new(MapperOperation::MassRelate, entity.entity_type())
                .relation(relation)
                .params(params),
        )?;
        let descriptor = self.descriptor(entity.entity_type(), relation)?;
        let target = Self::target_type(&descriptor)?.to_string();

        let foreign_ids = self
            .query_rows(&target, params, |_| true)
            .iter()
            .filter_map(|row| row.get(ID).and_then(|v| v.as_str()).map(String::from))
            .collect::<Vec<_>>();
        for foreign_id in foreign_ids {
            self.link(entity, &descriptor, &foreign_id, Some(&target), None)?;
        }
        Ok(true)
    }

    fn get_relation_column(
        &self,
        entity: &Entity,
        relation: &str,
        foreign_id: &str,
        column: &str,
    ) -> RelataResult<Value> {
        self.record(
            MapperCall::new(MapperOperation::GetRelationColumn, entity.entity_type())
                .relation(relation)
                .foreign_id(foreign_id),
        )?;
        let descriptor = self.descriptor(entity.entity_type(), relation)?;
        let (pivot, id) = match (descriptor.pivot(), entity.id()) {
            (Some(pivot), Some(id)) => (pivot, id),
            _ => return Ok(Value::Null),
        };
        let rows = self.pivot_rows(&pivot.table);
        let value = rows
            .iter()
            .find(|row| is_pivot_of(row, &pivot.local_key, id, &pivot.foreign_key, foreign_id))
            .and_then(|row| row.get(column).cloned())
            .unwrap_or_default();
        Ok(value)
    }

    fn lock_table(&self, entity_type: &str) -> RelataResult<()> {
        self.record(MapperCall::new(MapperOperation::LockTable, entity_type))?;
        if !self.inner.locked_tables.insert(entity_type.to_string()) {
            return Err(RelataError::new(
                &format!("Table of {} is already locked", entity_type),
                ErrorKind::LockError,
            ));
        }
        Ok(())
    }

    fn unlock_table(&self, entity_type: &str) -> RelataResult<()> {
        self.record(MapperCall::new(MapperOperation::UnlockTable, entity_type))?;
        if self.inner.locked_tables.remove(entity_type).is_none() {
            return Err(RelataError::new(
                &format!("Table of {} is not locked", entity_type),
                ErrorKind::LockError,
            ));
        }
        Ok(())
    }
}
