use crate::query::SelectParams;
use std::fmt::{Display, Formatter};

/// Operations of the mapper boundary, as recorded by the in-memory mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapperOperation {
    SelectById,
    Select,
    SelectByQuery,
    Insert,
    Update,
    Delete,
    DeleteFromDb,
    RestoreDeleted,
    Count,
    Max,
    Min,
    Sum,
    SelectRelated,
    CountRelated,
    Relate,
    Unrelate,
    AddRelation,
    RemoveRelation,
    RemoveAllRelations,
    UpdateRelation,
    MassRelate,
    GetRelationColumn,
    LockTable,
    UnlockTable,
}

impl MapperOperation {
    /// `true` for operations that change stored rows or links.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            MapperOperation::Insert
                | MapperOperation::Update
                | MapperOperation::Delete
                | MapperOperation::DeleteFromDb
                | MapperOperation::RestoreDeleted
                | MapperOperation::Relate
                | MapperOperation::Unrelate
                | MapperOperation::AddRelation
                | MapperOperation::RemoveRelation
                | MapperOperation::RemoveAllRelations
                | MapperOperation::UpdateRelation
                | MapperOperation::MassRelate
        )
    }
}

impl Display for MapperOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// One recorded mapper call.
#[derive(Debug, Clone, PartialEq)]
pub struct MapperCall {
    pub operation: MapperOperation,
    pub entity_type: String,
    pub relation: Option<String>,
    pub foreign_id: Option<String>,
    pub params: Option<SelectParams>,
}

impl MapperCall {
    pub(crate) fn new(operation: MapperOperation, entity_type: &str) -> Self {
        MapperCall {
            operation,
            entity_type: entity_type.to_string(),
            relation: None,
            foreign_id: None,
            params: None,
        }
    }

    pub(crate) fn relation(mut self, relation: &str) -> Self {
        self.relation = Some(relation.to_string());
        self
    }

    pub(crate) fn foreign_id(mut self, foreign_id: &str) -> Self {
        self.foreign_id = Some(foreign_id.to_string());
        self
    }

    pub(crate) fn params(mut self, params: &SelectParams) -> Self {
        self.params = Some(params.clone());
        self
    }
}
