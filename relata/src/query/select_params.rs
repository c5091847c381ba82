use crate::common::SortOrder;
use crate::query::WhereClause;
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// A join of a relation, optionally aliased and with extra join conditions.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct JoinSpec {
    relation: String,
    alias: Option<String>,
    conditions: Option<WhereClause>,
}

impl JoinSpec {
    pub fn new(relation: &str) -> Self {
        JoinSpec {
            relation: relation.to_string(),
            alias: None,
            conditions: None,
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn conditions(mut self, conditions: WhereClause) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn get_alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn get_conditions(&self) -> Option<&WhereClause> {
        self.conditions.as_ref()
    }
}

impl From<&str> for JoinSpec {
    fn from(relation: &str) -> Self {
        JoinSpec::new(relation)
    }
}

impl From<String> for JoinSpec {
    fn from(relation: String) -> Self {
        JoinSpec::new(&relation)
    }
}

impl From<(&str, &str)> for JoinSpec {
    fn from((relation, alias): (&str, &str)) -> Self {
        JoinSpec::new(relation).alias(alias)
    }
}

impl From<(&str, &str, WhereClause)> for JoinSpec {
    fn from((relation, alias, conditions): (&str, &str, WhereClause)) -> Self {
        JoinSpec::new(relation).alias(alias).conditions(conditions)
    }
}

impl Display for JoinSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.relation)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {}", alias)?;
        }
        if let Some(conditions) = &self.conditions {
            write!(f, " ON {}", conditions)?;
        }
        Ok(())
    }
}

/// One join spec or a sequence of them, flattened in order when accumulated.
///
/// ```rust,ignore
/// repository.join("teams");
/// repository.join(vec!["teams", "account"]);
/// repository.join(JoinSpec::new("teams").alias("t"));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JoinList(Vec<JoinSpec>);

impl JoinList {
    pub fn into_vec(self) -> Vec<JoinSpec> {
        self.0
    }
}

impl From<&str> for JoinList {
    fn from(relation: &str) -> Self {
        JoinList(vec![JoinSpec::new(relation)])
    }
}

impl From<JoinSpec> for JoinList {
    fn from(spec: JoinSpec) -> Self {
        JoinList(vec![spec])
    }
}

impl<T: Into<JoinSpec>> From<Vec<T>> for JoinList {
    fn from(specs: Vec<T>) -> Self {
        JoinList(specs.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<JoinSpec>, const N: usize> From<[T; N]> for JoinList {
    fn from(specs: [T; N]) -> Self {
        JoinList(specs.into_iter().map(Into::into).collect())
    }
}

/// Sort key(s) of a query.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum OrderBy {
    /// One attribute; the direction comes from `SelectParams::order`.
    Attribute(String),
    /// Attribute and direction pairs, applied in order.
    List(Vec<(String, SortOrder)>),
}

impl From<&str> for OrderBy {
    fn from(attribute: &str) -> Self {
        OrderBy::Attribute(attribute.to_string())
    }
}

impl From<Vec<(&str, SortOrder)>> for OrderBy {
    fn from(list: Vec<(&str, SortOrder)>) -> Self {
        OrderBy::List(
            list.into_iter()
                .map(|(attribute, order)| (attribute.to_string(), order))
                .collect(),
        )
    }
}

impl Display for OrderBy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderBy::Attribute(attribute) => write!(f, "{}", attribute),
            OrderBy::List(list) => write!(
                f,
                "{}",
                list.iter()
                    .map(|(attribute, order)| format!("{} {}", attribute, order))
                    .join(", ")
            ),
        }
    }
}

/// Storage-agnostic specification of one query.
///
/// # Purpose
/// `SelectParams` is the contract between the repository and the mapper: where and
/// having trees, joins, projection, grouping, ordering, pagination and flags. It is
/// meaningful only relative to one entity type and carries nothing storage specific.
///
/// # Fields
/// - `where_clause` / `having_clause`: `None` means not supplied, which matters when
///   merging with accumulated repository state
/// - `joins` / `left_joins`: ordered join specs
/// - `select`: projected attributes, empty selects everything
/// - `group_by`: grouping attributes
/// - `order_by` / `order`: sort key(s) and direction
/// - `offset` / `limit`: pagination
/// - `distinct`: drop duplicate rows
/// - `sth`: deliver a streamed, forward-only collection
/// - `skip_additional_select_params`: bypass the repository's select-params hook
///
/// # Examples
///
/// ```rust,ignore
/// use relata::clause;
/// use relata::query::SelectParams;
/// use relata::common::SortOrder;
///
/// let params = SelectParams::new()
///     .where_clause(clause! { "type" => "Customer" })
///     .order_by("name", SortOrder::Descending)
///     .limit(0, 20);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SelectParams {
    pub(crate) where_clause: Option<WhereClause>,
    pub(crate) having_clause: Option<WhereClause>,
    pub(crate) joins: Vec<JoinSpec>,
    pub(crate) left_joins: Vec<JoinSpec>,
    pub(crate) select: Vec<String>,
    pub(crate) group_by: Vec<String>,
    pub(crate) order_by: Option<OrderBy>,
    pub(crate) order: Option<SortOrder>,
    pub(crate) offset: Option<u64>,
    pub(crate) limit: Option<u64>,
    pub(crate) distinct: Option<bool>,
    pub(crate) sth: Option<bool>,
    pub(crate) skip_additional_select_params: Option<bool>,
}

/// Creates `SelectParams` filtered by a where clause.
pub fn where_by(where_clause: WhereClause) -> SelectParams {
    SelectParams::new().where_clause(where_clause)
}

/// Creates `SelectParams` ordered by one attribute.
pub fn order_by(attribute: &str, order: SortOrder) -> SelectParams {
    SelectParams::new().order_by(attribute, order)
}

/// Creates `SelectParams` limited to one page.
pub fn limit_to(offset: u64, limit: u64) -> SelectParams {
    SelectParams::new().limit(offset, limit)
}

impl SelectParams {
    pub fn new() -> Self {
        SelectParams::default()
    }

    pub fn where_clause(mut self, where_clause: WhereClause) -> Self {
        self.where_clause = Some(where_clause);
        self
    }

    pub fn having_clause(mut self, having_clause: WhereClause) -> Self {
        self.having_clause = Some(having_clause);
        self
    }

    pub fn join<J: Into<JoinSpec>>(mut self, join: J) -> Self {
        self.joins.push(join.into());
        self
    }

    pub fn left_join<J: Into<JoinSpec>>(mut self, join: J) -> Self {
        self.left_joins.push(join.into());
        self
    }

    pub fn select(mut self, attributes: &[&str]) -> Self {
        self.select = attributes.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn group_by(mut self, attributes: &[&str]) -> Self {
        self.group_by = attributes.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn order_by(mut self, attribute: &str, order: SortOrder) -> Self {
        self.order_by = Some(OrderBy::Attribute(attribute.to_string()));
        self.order = Some(order);
        self
    }

    /// Orders by several attributes, each with its own direction.
    pub fn order_by_list(mut self, list: Vec<(&str, SortOrder)>) -> Self {
        self.order_by = Some(OrderBy::from(list));
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn limit(mut self, offset: u64, limit: u64) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }

    pub fn distinct(self) -> Self {
        self.with_distinct(true)
    }

    /// Sets the distinct flag. An explicit `false` overrides an accumulated `distinct()`.
    pub fn with_distinct(mut self, distinct: bool) -> Self {
        self.distinct = Some(distinct);
        self
    }

    pub fn sth(self) -> Self {
        self.with_sth(true)
    }

    pub fn with_sth(mut self, sth: bool) -> Self {
        self.sth = Some(sth);
        self
    }

    pub fn skip_additional_select_params(self) -> Self {
        self.with_skip_additional_select_params(true)
    }

    pub fn with_skip_additional_select_params(mut self, skip: bool) -> Self {
        self.skip_additional_select_params = Some(skip);
        self
    }

    pub fn get_where_clause(&self) -> Option<&WhereClause> {
        self.where_clause.as_ref()
    }

    pub fn get_having_clause(&self) -> Option<&WhereClause> {
        self.having_clause.as_ref()
    }

    pub fn get_joins(&self) -> &[JoinSpec] {
        &self.joins
    }

    pub fn get_left_joins(&self) -> &[JoinSpec] {
        &self.left_joins
    }

    pub fn get_select(&self) -> &[String] {
        &self.select
    }

    pub fn get_group_by(&self) -> &[String] {
        &self.group_by
    }

    pub fn get_order_by(&self) -> Option<&OrderBy> {
        self.order_by.as_ref()
    }

    pub fn get_order(&self) -> Option<SortOrder> {
        self.order
    }

    pub fn get_offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct.unwrap_or(false)
    }

    pub fn is_sth(&self) -> bool {
        self.sth.unwrap_or(false)
    }

    pub fn is_skip_additional_select_params(&self) -> bool {
        self.skip_additional_select_params.unwrap_or(false)
    }

    /// Appends a condition to the where clause, creating it when absent.
    ///
    /// Used by select-params hooks to narrow a query in place.
    pub fn add_where_condition<V: Into<crate::common::Value>>(&mut self, key: &str, value: V) {
        let clause = self.where_clause.take().unwrap_or_default();
        self.where_clause = Some(clause.condition(key, value));
    }

    /// Sets the projection in place.
    pub fn set_select(&mut self, attributes: Vec<String>) {
        self.select = attributes;
    }

    /// `true` when nothing is set.
    pub fn is_empty(&self) -> bool {
        *self == SelectParams::default()
    }
}

impl Display for SelectParams {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::new();
        if let Some(where_clause) = &self.where_clause {
            parts.push(format!("where: {}", where_clause));
        }
        if let Some(having_clause) = &self.having_clause {
            parts.push(format!("having: {}", having_clause));
        }
        if !self.joins.is_empty() {
            parts.push(format!("joins: [{}]", self.joins.iter().join(", ")));
        }
        if !self.left_joins.is_empty() {
            parts.push(format!("leftJoins: [{}]", self.left_joins.iter().join(", ")));
        }
        if !self.select.is_empty() {
            parts.push(format!("select: [{}]", self.select.iter().join(", ")));
        }
        if !self.group_by.is_empty() {
            parts.push(format!("groupBy: [{}]", self.group_by.iter().join(", ")));
        }
        if let Some(order_by) = &self.order_by {
            parts.push(format!("orderBy: {}", order_by));
        }
        if let Some(order) = &self.order {
            parts.push(format!("order: {}", order));
        }
        if let Some(offset) = self.offset {
            parts.push(format!("offset: {}", offset));
        }
        if let Some(limit) = self.limit {
            parts.push(format!("limit: {}", limit));
        }
        if self.is_distinct() {
            parts.push("distinct".to_string());
        }
        if self.is_sth() {
            parts.push("sth".to_string());
        }
        write!(f, "{{{}}}", parts.join("; "))
    }
}
