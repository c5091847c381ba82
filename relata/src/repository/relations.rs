use crate::common::{Value, ID};
use crate::entity::{Entity, RelationDescriptor, RelationKind};
use crate::errors::{ErrorKind, RelataError, RelataResult};
use crate::mapper::{Related, RelationData};
use crate::query::{SelectParams, WhereClause};
use crate::repository::{Foreign, HookOptions, Repository};

// Relation operations. Caller misuse (unknown relation, entity without id, unsupported
// foreign reference) is answered with false / none / zero and a warning; only storage,
// hook and metadata failures become errors.
impl Repository {
    /// Records related to `entity` through `relation`.
    ///
    /// Returns `Ok(None)` when the entity has no id or the relation is unknown. The
    /// select-params hook of the *target* type is applied to `params`.
    pub fn find_related(
        &self,
        entity: &Entity,
        relation: &str,
        params: SelectParams,
    ) -> RelataResult<Option<Related>> {
        if !entity.has_id() {
            return Ok(None);
        }
        let descriptor = match self.relation_descriptor(entity, relation) {
            Some(descriptor) => descriptor,
            None => return Ok(None),
        };
        let params = self.target_params(entity, &descriptor, params)?;

        log::debug!("Finding records related to {} through {}", entity.entity_type(), relation);
        self.mapper()
            .select_related(entity, relation, &params)
            .map(Some)
    }

    /// Number of records related to `entity` through `relation`; 0 without an id.
    pub fn count_related(
        &self,
        entity: &Entity,
        relation: &str,
        params: SelectParams,
    ) -> RelataResult<i64> {
        if !entity.has_id() {
            return Ok(0);
        }
        let descriptor = match self.relation_descriptor(entity, relation) {
            Some(descriptor) => descriptor,
            None => return Ok(0),
        };
        let params = self.target_params(entity, &descriptor, params)?;

        let count = self.mapper().count_related(entity, relation, &params)?;
        Ok(count.to_int())
    }

    /// Whether `foreign` is currently related to `entity`.
    ///
    /// For a belongs-to relation the local key is loaded when the entity does not carry
    /// a non-empty value for it, and the foreign record must still exist. Other kinds count the related
    /// records with the foreign id.
    pub fn is_related<'f, F: Into<Foreign<'f>>>(
        &self,
        entity: &Entity,
        relation: &str,
        foreign: F,
    ) -> RelataResult<bool> {
        let foreign = foreign.into();
        let id = match entity.id() {
            Some(id) => id,
            None => return Ok(false),
        };
        let foreign_id = match foreign {
            Foreign::All => {
                log::warn!("Unsupported foreign reference {} for is_related", foreign);
                return Ok(false);
            }
            _ => match foreign.id() {
                Some(foreign_id) => foreign_id,
                None => return Ok(false),
            },
        };
        let descriptor = match self.relation_descriptor(entity, relation) {
            Some(descriptor) => descriptor,
            None => return Ok(false),
        };

        if descriptor.kind() == RelationKind::BelongsTo {
            let key = match descriptor.key() {
                Some(key) => key,
                None => return Ok(false),
            };

            let local_id = match entity.get_str(key) {
                Some(local_id) if !local_id.is_empty() => Some(local_id.to_string()),
                _ => {
                    let mut own = self.entity_manager().repository(entity.entity_type())?;
                    own.select(&[key])
                        .where_eq(ID, id)
                        .find_one(SelectParams::new())?
                        .and_then(|e| e.get_str(key).map(str::to_string))
                }
            };
            let local_id = match local_id {
                Some(local_id) => local_id,
                None => return Ok(false),
            };
            if local_id != foreign_id {
                return Ok(false);
            }

            let target = match descriptor.entity() {
                Some(target) => target,
                None => return Ok(false),
            };
            let mut foreign_repository = self.entity_manager().repository(target)?;
            let found = foreign_repository
                .select(&[ID])
                .where_eq(ID, foreign_id)
                .find_one(SelectParams::new())?;
            return Ok(found.map_or(false, |e| e.id() == Some(local_id.as_str())));
        }

        let params = SelectParams::new().where_clause(WhereClause::new().condition(ID, foreign_id));
        Ok(self.count_related(entity, relation, params)? > 0)
    }

    /// Links `foreign` to `entity` through `relation`.
    ///
    /// The generic before-relate hook always runs, followed by the relation override's
    /// hook when one is registered. An override that defines the operation replaces the
    /// mapper dispatch; otherwise an entity goes to the mapper's `relate` and an id to
    /// `add_relation`. After hooks run only when the result is `true`.
    ///
    /// `data` carries pivot columns as a `Value::Map`; `Value::Null` means none.
    pub fn relate<'f, F: Into<Foreign<'f>>>(
        &self,
        entity: &Entity,
        relation: &str,
        foreign: F,
        data: Value,
        options: &HookOptions,
    ) -> RelataResult<bool> {
        let foreign = foreign.into();
        if !entity.has_id() {
            log::warn!("Cannot relate {} through {} without an id", entity.entity_type(), relation);
            return Ok(false);
        }
        if self.relation_descriptor(entity, relation).is_none() {
            return Ok(false);
        }
        if foreign == Foreign::All {
            log::warn!("Unsupported foreign reference {} for relate", foreign);
            return Ok(false);
        }
        let data = normalize_relation_data(data)?;
        let data = data.as_ref();
        let relation_override = self
            .entity_manager()
            .relation_override(entity.entity_type(), relation);

        if let Some(hooks) = self.hooks() {
            hooks.before_relate(entity, relation, &foreign, data, options)?;
        }
        if let Some(relation_override) = &relation_override {
            relation_override.before_relate(entity, &foreign, data, options)?;
        }

        let overridden = relation_override
            .as_ref()
            .and_then(|o| o.relate(self, entity, &foreign, data, options));
        let result = match overridden {
            Some(result) => result?,
            None => match foreign {
                Foreign::Identified(foreign_entity) => {
                    self.mapper().relate(entity, relation, foreign_entity, data)?
                }
                Foreign::Reference(foreign_id) if !foreign_id.is_empty() => {
                    self.mapper().add_relation(entity, relation, foreign_id, data)?
                }
                _ => false,
            },
        };

        if result {
            if let Some(hooks) = self.hooks() {
                hooks.after_relate(entity, relation, &foreign, data, options)?;
            }
            if let Some(relation_override) = &relation_override {
                relation_override.after_relate(entity, &foreign, data, options)?;
            }
        }
        Ok(result)
    }

    /// Removes the link between `entity` and `foreign`; [`Foreign::All`] removes every
    /// link of the relation. Hooks and override dispatch mirror [`Repository::relate`].
    pub fn unrelate<'f, F: Into<Foreign<'f>>>(
        &self,
        entity: &Entity,
        relation: &str,
        foreign: F,
        options: &HookOptions,
    ) -> RelataResult<bool> {
        let foreign = foreign.into();
        if !entity.has_id() {
            log::warn!("Cannot unrelate {} through {} without an id", entity.entity_type(), relation);
            return Ok(false);
        }
        if self.relation_descriptor(entity, relation).is_none() {
            return Ok(false);
        }
        let relation_override = self
            .entity_manager()
            .relation_override(entity.entity_type(), relation);

        if let Some(hooks) = self.hooks() {
            hooks.before_unrelate(entity, relation, &foreign, options)?;
        }
        if let Some(relation_override) = &relation_override {
            relation_override.before_unrelate(entity, &foreign, options)?;
        }

        let overridden = relation_override
            .as_ref()
            .and_then(|o| o.unrelate(self, entity, &foreign, options));
        let result = match overridden {
            Some(result) => result?,
            None => match foreign {
                Foreign::Identified(foreign_entity) => {
                    self.mapper().unrelate(entity, relation, foreign_entity)?
                }
                Foreign::Reference(foreign_id) if !foreign_id.is_empty() => {
                    self.mapper().remove_relation(entity, relation, foreign_id)?
                }
                Foreign::All => self.mapper().remove_all_relations(entity, relation)?,
                _ => {
                    log::warn!("Unsupported foreign reference for unrelate through {}", relation);
                    false
                }
            },
        };

        if result {
            if let Some(hooks) = self.hooks() {
                hooks.after_unrelate(entity, relation, &foreign, options)?;
            }
            if let Some(relation_override) = &relation_override {
                relation_override.after_unrelate(entity, &foreign, options)?;
            }
        }
        Ok(result)
    }

    /// Updates the pivot columns of the link to `foreign`. No hooks run.
    pub fn update_relation<'f, F: Into<Foreign<'f>>>(
        &self,
        entity: &Entity,
        relation: &str,
        foreign: F,
        data: Value,
    ) -> RelataResult<bool> {
        let foreign = foreign.into();
        if !entity.has_id() {
            return Ok(false);
        }
        if self.relation_descriptor(entity, relation).is_none() {
            return Ok(false);
        }
        let foreign_id = match (foreign, foreign.id()) {
            (Foreign::All, _) | (_, None) => {
                log::warn!("Unsupported foreign reference {} for update_relation", foreign);
                return Ok(false);
            }
            (_, Some(foreign_id)) => foreign_id,
        };
        let data = normalize_relation_data(data)?.unwrap_or_default();
        self.mapper()
            .update_relation(entity, relation, foreign_id, &data)
    }

    /// Relates every record matching `params` to `entity`, between the mass-relate
    /// hooks.
    pub fn mass_relate(
        &self,
        entity: &Entity,
        relation: &str,
        params: SelectParams,
        options: &HookOptions,
    ) -> RelataResult<bool> {
        if !entity.has_id() {
            return Ok(false);
        }
        if self.relation_descriptor(entity, relation).is_none() {
            return Ok(false);
        }

        if let Some(hooks) = self.hooks() {
            hooks.before_mass_relate(entity, relation, &params, options)?;
        }
        let result = self.mapper().mass_relate(entity, relation, &params)?;
        if let Some(hooks) = self.hooks() {
            hooks.after_mass_relate(entity, relation, &params, options)?;
        }
        Ok(result)
    }

    /// Reads one pivot column of the link to `foreign_id`. No hooks run.
    pub fn get_relation_column(
        &self,
        entity: &Entity,
        relation: &str,
        foreign_id: &str,
        column: &str,
    ) -> RelataResult<Value> {
        if self.relation_descriptor(entity, relation).is_none() {
            return Ok(Value::Null);
        }
        self.mapper()
            .get_relation_column(entity, relation, foreign_id, column)
    }

    fn relation_descriptor(&self, entity: &Entity, relation: &str) -> Option<RelationDescriptor> {
        let descriptor = self
            .entity_manager()
            .metadata()
            .relation(entity.entity_type(), relation)
            .cloned();
        if descriptor.is_none() {
            log::warn!("Unknown relation {} of {}", relation, entity.entity_type());
        }
        descriptor
    }

    /// Applies the target type's select-params hook. When the entity does not carry the
    /// target type of a polymorphic relation the hook is skipped and the mapper resolves
    /// the type from storage.
    fn target_params(
        &self,
        entity: &Entity,
        descriptor: &RelationDescriptor,
        mut params: SelectParams,
    ) -> RelataResult<SelectParams> {
        let target_type = match descriptor.kind() {
            RelationKind::BelongsToParent => descriptor
                .type_key()
                .and_then(|type_key| entity.get_str(type_key))
                .map(str::to_string),
            _ => descriptor.entity().map(str::to_string),
        };
        let target_type = match target_type {
            Some(target_type) => target_type,
            None => {
                log::debug!(
                    "Target type of relation {} of {} is not loaded",
                    descriptor.name(),
                    entity.entity_type()
                );
                return Ok(params);
            }
        };

        let target = self.entity_manager().repository(&target_type)?;
        target.handle_select_params(&mut params);
        Ok(params)
    }
}

fn normalize_relation_data(data: Value) -> RelataResult<Option<RelationData>> {
    match data {
        Value::Null => Ok(None),
        Value::Map(map) => Ok(Some(map)),
        other => {
            log::error!("Relation data must be a map, found {}", other);
            Err(RelataError::new(
                "Relation data must be a map of column values",
                ErrorKind::InvalidDataType,
            ))
        }
    }
}
