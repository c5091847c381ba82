use crate::common::{Value, DELETED, ID};
use indexmap::IndexMap;

/// A typed, identified record.
///
/// # Purpose
/// Holds the attributes of one record of a named entity type together with the
/// lifecycle flags the repository drives during save and remove.
///
/// # Characteristics
/// - **Ordered attributes**: Attribute order is the order of first assignment
/// - **Dirty tracking**: `fetched_values` snapshots the attributes as last read from
///   or written to storage; `is_attribute_changed` compares against it
/// - **Owned by the caller**: repositories borrow entities for the duration of a call
///   and never keep them
///
/// # Lifecycle flags
/// - `is_new`: created by `get_new` and not yet inserted (or inserted with `keep_new`)
/// - `is_saved`: at least one save completed
/// - `is_fetched`: hydrated from storage
/// - `is_being_saved`: a save is in progress
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    entity_type: String,
    attributes: IndexMap<String, Value>,
    fetched_values: IndexMap<String, Value>,
    is_new: bool,
    is_saved: bool,
    is_fetched: bool,
    is_being_saved: bool,
}

impl Entity {
    /// Creates an empty entity of the given type with all flags cleared.
    pub fn new(entity_type: &str) -> Self {
        Entity {
            entity_type: entity_type.to_string(),
            attributes: IndexMap::new(),
            fetched_values: IndexMap::new(),
            is_new: false,
            is_saved: false,
            is_fetched: false,
            is_being_saved: false,
        }
    }

    /// Creates an entity that mirrors a stored row: `is_fetched` is set and the
    /// dirty-tracking snapshot equals the given attributes.
    pub fn fetched(entity_type: &str, attributes: IndexMap<String, Value>) -> Self {
        let mut entity = Entity::new(entity_type);
        entity.attributes = attributes;
        entity.set_as_fetched();
        entity
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the identity, if the entity has a non-empty string `id`.
    pub fn id(&self) -> Option<&str> {
        match self.attributes.get(ID) {
            Some(Value::String(id)) if !id.is_empty() => Some(id.as_str()),
            _ => None,
        }
    }

    pub fn has_id(&self) -> bool {
        self.id().is_some()
    }

    pub fn set_id(&mut self, id: &str) {
        self.set(ID, id);
    }

    /// Returns the attribute value, `Value::Null` when unset.
    pub fn get(&self, name: &str) -> Value {
        self.attributes.get(name).cloned().unwrap_or_default()
    }

    /// Returns the attribute as a non-empty string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        match self.attributes.get(name) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn set<V: Into<Value>>(&mut self, name: &str, value: V) {
        self.attributes.insert(name.to_string(), value.into());
    }

    pub fn has(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    pub fn clear(&mut self, name: &str) {
        self.attributes.shift_remove(name);
    }

    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.attributes
    }

    pub fn is_deleted(&self) -> bool {
        matches!(self.attributes.get(DELETED), Some(Value::Bool(true)))
    }

    /// Assigns each default whose attribute is not set yet.
    pub fn populate_defaults(&mut self, defaults: &IndexMap<String, Value>) {
        for (name, value) in defaults {
            if !self.attributes.contains_key(name) {
                self.attributes.insert(name.clone(), value.clone());
            }
        }
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn set_is_new(&mut self, is_new: bool) {
        self.is_new = is_new;
    }

    pub fn is_saved(&self) -> bool {
        self.is_saved
    }

    pub fn set_is_saved(&mut self, is_saved: bool) {
        self.is_saved = is_saved;
    }

    pub fn is_fetched(&self) -> bool {
        self.is_fetched
    }

    /// Marks the entity as hydrated from storage and snapshots its attributes.
    pub fn set_as_fetched(&mut self) {
        self.is_fetched = true;
        self.is_new = false;
        self.update_fetched_values();
    }

    pub fn is_being_saved(&self) -> bool {
        self.is_being_saved
    }

    pub fn set_as_being_saved(&mut self) {
        self.is_being_saved = true;
    }

    pub fn set_as_not_being_saved(&mut self) {
        self.is_being_saved = false;
    }

    /// Refreshes the dirty-tracking snapshot from the current attributes.
    pub fn update_fetched_values(&mut self) {
        self.fetched_values = self.attributes.clone();
    }

    pub fn fetched_value(&self, name: &str) -> Option<&Value> {
        self.fetched_values.get(name)
    }

    /// `true` when the attribute differs from the last snapshot.
    pub fn is_attribute_changed(&self, name: &str) -> bool {
        self.attributes.get(name) != self.fetched_values.get(name)
    }
}
