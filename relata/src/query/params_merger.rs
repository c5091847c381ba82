use crate::config::MergePolicy;
use crate::query::{JoinSpec, OrderBy, QueryState, SelectParams, WhereClause};

/// Combines accumulated query state with explicit per-call parameters.
///
/// The state is not modified; the terminal operation resets it after execution.
///
/// # Rules
/// 1. **Where**: a supplied explicit clause is kept and the accumulated clause, when
///    non-empty, is appended to it as one nested group. Without an explicit clause the
///    accumulated clause is used as is.
/// 2. **Having**: under [`MergePolicy::Legacy`] the accumulated clause is appended only
///    when the explicit clause is non-empty, otherwise the explicit value is used and
///    the accumulated clause is dropped. Under [`MergePolicy::Symmetric`] it follows
///    rule 1.
/// 3. **Joins and left joins**: under `Legacy` accumulated joins are appended only when
///    both lists are non-empty, otherwise the explicit list is used. Under `Symmetric`
///    they are always appended after the explicit ones.
/// 4. **Everything else**: explicit values win. List values are merged position by
///    position: explicit entries replace accumulated entries at the same index, extra
///    accumulated entries are kept. A flag set on the explicit side, `false` included,
///    wins over the accumulated one.
pub fn merge_select_params(
    state: &QueryState,
    explicit: SelectParams,
    policy: MergePolicy,
) -> SelectParams {
    let accumulated = state.list_params();

    let where_clause = merge_where(explicit.where_clause, state.where_clause());
    let having_clause = match policy {
        MergePolicy::Legacy => merge_having_legacy(explicit.having_clause, state.having_clause()),
        MergePolicy::Symmetric => merge_where(explicit.having_clause, state.having_clause()),
    };
    let joins = merge_joins(explicit.joins, accumulated.get_joins(), policy);
    let left_joins = merge_joins(explicit.left_joins, accumulated.get_left_joins(), policy);

    SelectParams {
        where_clause,
        having_clause,
        joins,
        left_joins,
        select: replace_by_index(explicit.select, accumulated.get_select()),
        group_by: replace_by_index(explicit.group_by, accumulated.get_group_by()),
        order_by: merge_order_by(explicit.order_by, accumulated.get_order_by()),
        order: explicit.order.or(accumulated.get_order()),
        offset: explicit.offset.or(accumulated.get_offset()),
        limit: explicit.limit.or(accumulated.get_limit()),
        distinct: explicit.distinct.or(accumulated.distinct),
        sth: explicit.sth.or(accumulated.sth),
        skip_additional_select_params: explicit
            .skip_additional_select_params
            .or(accumulated.skip_additional_select_params),
    }
}

fn merge_where(explicit: Option<WhereClause>, accumulated: &WhereClause) -> Option<WhereClause> {
    match explicit {
        Some(explicit) if accumulated.is_empty() => Some(explicit),
        Some(explicit) => Some(explicit.group(accumulated.clone())),
        None if accumulated.is_empty() => None,
        None => Some(accumulated.clone()),
    }
}

fn merge_having_legacy(
    explicit: Option<WhereClause>,
    accumulated: &WhereClause,
) -> Option<WhereClause> {
    match explicit {
        Some(explicit) if !explicit.is_empty() && !accumulated.is_empty() => {
            Some(explicit.group(accumulated.clone()))
        }
        explicit => explicit,
    }
}

fn merge_joins(
    mut explicit: Vec<JoinSpec>,
    accumulated: &[JoinSpec],
    policy: MergePolicy,
) -> Vec<JoinSpec> {
    let append = match policy {
        MergePolicy::Legacy => !explicit.is_empty() && !accumulated.is_empty(),
        MergePolicy::Symmetric => !accumulated.is_empty(),
    };
    if append {
        explicit.extend(accumulated.iter().cloned());
    }
    explicit
}

fn replace_by_index<T: Clone>(explicit: Vec<T>, accumulated: &[T]) -> Vec<T> {
    if explicit.len() >= accumulated.len() {
        return explicit;
    }
    let mut merged = explicit;
    merged.extend(accumulated[merged.len()..].iter().cloned());
    merged
}

fn merge_order_by(explicit: Option<OrderBy>, accumulated: Option<&OrderBy>) -> Option<OrderBy> {
    match (explicit, accumulated) {
        (Some(OrderBy::List(explicit)), Some(OrderBy::List(accumulated))) => {
            Some(OrderBy::List(replace_by_index(explicit, accumulated)))
        }
        (Some(explicit), _) => Some(explicit),
        (None, accumulated) => accumulated.cloned(),
    }
}
