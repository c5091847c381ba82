use crate::common::{foreign_id_attribute, foreign_type_attribute, Value};
use crate::errors::{ErrorKind, RelataError, RelataResult};
use indexmap::IndexMap;
use std::fmt::{Display, Formatter};

/// The kind of a named relationship between two entity types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RelationKind {
    /// Many-to-one through a local foreign key (`<relation>Id`).
    BelongsTo,
    /// Polymorphic many-to-one: the target type is stored per record in `<relation>Type`.
    BelongsToParent,
    /// One-to-many through a foreign key on the target type.
    HasMany,
    /// Many-to-many through a pivot table, optionally carrying extra columns.
    ManyMany,
}

impl Display for RelationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationKind::BelongsTo => write!(f, "belongsTo"),
            RelationKind::BelongsToParent => write!(f, "belongsToParent"),
            RelationKind::HasMany => write!(f, "hasMany"),
            RelationKind::ManyMany => write!(f, "manyMany"),
        }
    }
}

/// Metadata describing one named relationship of an entity type.
///
/// # Fields
/// - `name`: relation name as used by the repository API (`teams`, `account`)
/// - `kind`: see [`RelationKind`]
/// - `entity`: fixed target entity type; `None` for belongs-to-parent
/// - `key`: local attribute holding the foreign id (belongs-to, belongs-to-parent)
/// - `type_key`: local attribute holding the target type (belongs-to-parent)
/// - `foreign_key`: attribute on the target type pointing back (has-many)
/// - `pivot`: pivot table name with its local and foreign key columns (many-many)
/// - `additional_columns`: extra pivot columns accepted from relate data
#[derive(Debug, Clone, PartialEq)]
pub struct RelationDescriptor {
    name: String,
    kind: RelationKind,
    entity: Option<String>,
    key: Option<String>,
    type_key: Option<String>,
    foreign_key: Option<String>,
    pivot: Option<PivotDescriptor>,
    additional_columns: Vec<String>,
}

/// Pivot table of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotDescriptor {
    pub table: String,
    pub local_key: String,
    pub foreign_key: String,
}

impl RelationDescriptor {
    pub fn belongs_to(name: &str, entity: &str) -> Self {
        RelationDescriptor {
            name: name.to_string(),
            kind: RelationKind::BelongsTo,
            entity: Some(entity.to_string()),
            key: Some(foreign_id_attribute(name)),
            type_key: None,
            foreign_key: None,
            pivot: None,
            additional_columns: Vec::new(),
        }
    }

    pub fn belongs_to_parent(name: &str) -> Self {
        RelationDescriptor {
            name: name.to_string(),
            kind: RelationKind::BelongsToParent,
            entity: None,
            key: Some(foreign_id_attribute(name)),
            type_key: Some(foreign_type_attribute(name)),
            foreign_key: None,
            pivot: None,
            additional_columns: Vec::new(),
        }
    }

    pub fn has_many(name: &str, entity: &str, foreign_key: &str) -> Self {
        RelationDescriptor {
            name: name.to_string(),
            kind: RelationKind::HasMany,
            entity: Some(entity.to_string()),
            key: None,
            type_key: None,
            foreign_key: Some(foreign_key.to_string()),
            pivot: None,
            additional_columns: Vec::new(),
        }
    }

    pub fn many_many(
        name: &str,
        entity: &str,
        pivot_table: &str,
        local_key: &str,
        foreign_key: &str,
    ) -> Self {
        RelationDescriptor {
            name: name.to_string(),
            kind: RelationKind::ManyMany,
            entity: Some(entity.to_string()),
            key: None,
            type_key: None,
            foreign_key: None,
            pivot: Some(PivotDescriptor {
                table: pivot_table.to_string(),
                local_key: local_key.to_string(),
                foreign_key: foreign_key.to_string(),
            }),
            additional_columns: Vec::new(),
        }
    }

    /// Adds a pivot column that relate/update data may carry.
    pub fn additional_column(mut self, column: &str) -> Self {
        self.additional_columns.push(column.to_string());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn type_key(&self) -> Option<&str> {
        self.type_key.as_deref()
    }

    pub fn foreign_key(&self) -> Option<&str> {
        self.foreign_key.as_deref()
    }

    pub fn pivot(&self) -> Option<&PivotDescriptor> {
        self.pivot.as_ref()
    }

    pub fn additional_columns(&self) -> &[String] {
        &self.additional_columns
    }
}

/// Definition of one entity type: attribute defaults and relations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EntityDefs {
    entity_type: String,
    defaults: IndexMap<String, Value>,
    relations: IndexMap<String, RelationDescriptor>,
}

impl EntityDefs {
    pub fn new(entity_type: &str) -> Self {
        EntityDefs {
            entity_type: entity_type.to_string(),
            defaults: IndexMap::new(),
            relations: IndexMap::new(),
        }
    }

    /// Declares the value `get_new` assigns to an attribute.
    pub fn default_value<V: Into<Value>>(mut self, attribute: &str, value: V) -> Self {
        self.defaults.insert(attribute.to_string(), value.into());
        self
    }

    pub fn relation(mut self, descriptor: RelationDescriptor) -> Self {
        self.relations
            .insert(descriptor.name().to_string(), descriptor);
        self
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn defaults(&self) -> &IndexMap<String, Value> {
        &self.defaults
    }

    pub fn relations(&self) -> &IndexMap<String, RelationDescriptor> {
        &self.relations
    }

    pub fn get_relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.get(name)
    }
}

/// Immutable registry of entity type definitions.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Metadata {
    defs: IndexMap<String, EntityDefs>,
}

impl Metadata {
    pub fn new() -> Self {
        Metadata::default()
    }

    /// Adds an entity type. Relations pointing at types registered later are fine;
    /// call [`Metadata::validate`] once everything is in.
    pub fn with_entity(mut self, defs: EntityDefs) -> Self {
        self.defs.insert(defs.entity_type().to_string(), defs);
        self
    }

    pub fn has_entity(&self, entity_type: &str) -> bool {
        self.defs.contains_key(entity_type)
    }

    pub fn entity_defs(&self, entity_type: &str) -> Option<&EntityDefs> {
        self.defs.get(entity_type)
    }

    pub fn relation(&self, entity_type: &str, relation_name: &str) -> Option<&RelationDescriptor> {
        self.defs
            .get(entity_type)
            .and_then(|defs| defs.get_relation(relation_name))
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(|k| k.as_str())
    }

    /// Checks that every fixed relation target is a registered entity type.
    pub fn validate(&self) -> RelataResult<()> {
        for defs in self.defs.values() {
            for descriptor in defs.relations().values() {
                if let Some(target) = descriptor.entity() {
                    if !self.has_entity(target) {
                        log::error!(
                            "Relation {}.{} points at unknown entity type {}",
                            defs.entity_type(),
                            descriptor.name(),
                            target
                        );
                        return Err(RelataError::new(
                            &format!(
                                "Relation {}.{} points at unknown entity type {}",
                                defs.entity_type(),
                                descriptor.name(),
                                target
                            ),
                            ErrorKind::MetadataError,
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}
