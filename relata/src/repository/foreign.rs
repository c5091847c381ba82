use crate::entity::Entity;
use std::fmt::{Display, Formatter};

/// The foreign side of a relation call.
///
/// - `Identified`: a loaded entity; relate/unrelate go through the mapper's entity form
/// - `Reference`: a bare id; relate/unrelate go through the mapper's id form
/// - `All`: every linked record; only meaningful for unrelate
///
/// ```rust,ignore
/// repository.relate(&contact, "teams", &team, None, &HookOptions::new())?;
/// repository.relate(&contact, "teams", "t1", None, &HookOptions::new())?;
/// repository.unrelate(&contact, "teams", Foreign::All, &HookOptions::new())?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Foreign<'a> {
    Identified(&'a Entity),
    Reference(&'a str),
    All,
}

impl<'a> Foreign<'a> {
    /// The foreign id, if this names exactly one non-empty record.
    pub fn id(&self) -> Option<&'a str> {
        match *self {
            Foreign::Identified(entity) => entity.id(),
            Foreign::Reference(id) if !id.is_empty() => Some(id),
            _ => None,
        }
    }
}

impl<'a> From<&'a Entity> for Foreign<'a> {
    fn from(entity: &'a Entity) -> Self {
        Foreign::Identified(entity)
    }
}

impl<'a> From<&'a mut Entity> for Foreign<'a> {
    fn from(entity: &'a mut Entity) -> Self {
        Foreign::Identified(entity)
    }
}

impl<'a> From<&'a str> for Foreign<'a> {
    fn from(id: &'a str) -> Self {
        Foreign::Reference(id)
    }
}

impl<'a> From<&'a String> for Foreign<'a> {
    fn from(id: &'a String) -> Self {
        Foreign::Reference(id.as_str())
    }
}

impl Display for Foreign<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Foreign::Identified(entity) => {
                write!(f, "{}({})", entity.entity_type(), entity.id().unwrap_or("-"))
            }
            Foreign::Reference(id) => write!(f, "{}", id),
            Foreign::All => write!(f, "*"),
        }
    }
}
