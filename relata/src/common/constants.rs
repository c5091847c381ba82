// attribute constants
pub const ID: &str = "id";
pub const DELETED: &str = "deleted";
pub const FOREIGN_ID_SUFFIX: &str = "Id";
pub const FOREIGN_TYPE_SUFFIX: &str = "Type";

// logical where-clause operators
pub const OR: &str = "OR";
pub const AND: &str = "AND";
pub const NOT: &str = "NOT";

/// Attribute holding the foreign key of a belongs-to relation, e.g. `accountId`.
pub fn foreign_id_attribute(relation_name: &str) -> String {
    format!("{}{}", relation_name, FOREIGN_ID_SUFFIX)
}

/// Attribute holding the target type of a belongs-to-parent relation, e.g. `parentType`.
pub fn foreign_type_attribute(relation_name: &str) -> String {
    format!("{}{}", relation_name, FOREIGN_TYPE_SUFFIX)
}
