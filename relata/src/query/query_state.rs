use crate::common::{SortOrder, Value};
use crate::query::{JoinList, OrderBy, SelectParams, WhereClause};

/// Query state accumulated by chained repository calls.
///
/// # Purpose
/// Holds the where clause, the having clause and the list params (joins, projection,
/// grouping, ordering, pagination and flags) built up between two terminal operations.
/// Every terminal operation of the repository calls [`QueryState::reset`] when done.
///
/// # Characteristics
/// - **Merging where/having**: a supplied clause is unioned by key with the accumulated
///   one, supplied keys taking precedence
/// - **Appending conditions**: a single `key => value` is appended as its own group
/// - **Flattening joins**: joins and left joins are appended in call order
/// - **Overwriting the rest**: order, limit, select, group by and flags replace the
///   previous value outright
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryState {
    where_clause: WhereClause,
    having_clause: WhereClause,
    list_params: SelectParams,
}

impl QueryState {
    pub fn new() -> Self {
        QueryState::default()
    }

    /// Unions `supplied` into the where clause; supplied keys win.
    pub fn merge_where(&mut self, supplied: WhereClause) {
        let existing = std::mem::take(&mut self.where_clause);
        self.where_clause = existing.union(supplied);
    }

    /// Appends `key => value` as a nested group. A null value is ignored.
    pub fn push_where(&mut self, key: &str, value: Value) {
        if value.is_null() {
            return;
        }
        let existing = std::mem::take(&mut self.where_clause);
        self.where_clause = existing.group(WhereClause::new().condition(key, value));
    }

    /// Unions `supplied` into the having clause; supplied keys win.
    pub fn merge_having(&mut self, supplied: WhereClause) {
        let existing = std::mem::take(&mut self.having_clause);
        self.having_clause = existing.union(supplied);
    }

    /// Appends `key => value` as a nested having group. A null value is ignored.
    pub fn push_having(&mut self, key: &str, value: Value) {
        if value.is_null() {
            return;
        }
        let existing = std::mem::take(&mut self.having_clause);
        self.having_clause = existing.group(WhereClause::new().condition(key, value));
    }

    pub fn add_joins(&mut self, joins: JoinList) {
        self.list_params.joins.extend(joins.into_vec());
    }

    pub fn add_left_joins(&mut self, joins: JoinList) {
        self.list_params.left_joins.extend(joins.into_vec());
    }

    pub fn set_order(&mut self, order_by: OrderBy, order: SortOrder) {
        self.list_params.order_by = Some(order_by);
        self.list_params.order = Some(order);
    }

    pub fn set_limit(&mut self, offset: Option<u64>, limit: Option<u64>) {
        self.list_params.offset = offset;
        self.list_params.limit = limit;
    }

    pub fn set_select(&mut self, attributes: Vec<String>) {
        self.list_params.select = attributes;
    }

    pub fn set_group_by(&mut self, attributes: Vec<String>) {
        self.list_params.group_by = attributes;
    }

    pub fn set_distinct(&mut self) {
        self.list_params.distinct = Some(true);
    }

    pub fn set_sth(&mut self) {
        self.list_params.sth = Some(true);
    }

    /// Replaces the list params wholesale. Where and having clauses on the supplied
    /// value are discarded; they are accumulated separately.
    pub fn set_list_params(&mut self, mut params: SelectParams) {
        params.where_clause = None;
        params.having_clause = None;
        self.list_params = params;
    }

    pub fn where_clause(&self) -> &WhereClause {
        &self.where_clause
    }

    pub fn having_clause(&self) -> &WhereClause {
        &self.having_clause
    }

    pub fn list_params(&self) -> &SelectParams {
        &self.list_params
    }

    /// Clears all three parts.
    pub fn reset(&mut self) {
        self.where_clause = WhereClause::new();
        self.having_clause = WhereClause::new();
        self.list_params = SelectParams::new();
    }

    pub fn is_empty(&self) -> bool {
        self.where_clause.is_empty() && self.having_clause.is_empty() && self.list_params.is_empty()
    }
}
