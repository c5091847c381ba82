use std::fmt::{Display, Formatter};

/// Specifies the direction for ordering query results.
///
/// Used by the repository `order` builder call and by `SelectParams::order`.
/// Parsing accepts the `ASC`/`DESC` spellings used in stored order definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortOrder {
    /// Sort in ascending order (smallest to largest, A-Z, oldest to newest)
    #[default]
    Ascending,
    /// Sort in descending order (largest to smallest, Z-A, newest to oldest)
    Descending,
}

impl SortOrder {
    /// Parses `ASC`/`DESC` (case-insensitive). Anything else is `None`.
    pub fn parse(value: &str) -> Option<SortOrder> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(SortOrder::Ascending),
            "DESC" => Some(SortOrder::Descending),
            _ => None,
        }
    }

    /// `true` selects descending order, like the boolean form of the order call.
    pub fn from_descending(descending: bool) -> SortOrder {
        if descending {
            SortOrder::Descending
        } else {
            SortOrder::Ascending
        }
    }
}

impl Display for SortOrder {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SortOrder::Ascending => write!(f, "ASC"),
            SortOrder::Descending => write!(f, "DESC"),
        }
    }
}
