use crate::common::{SortOrder, Value};
use crate::query::{Clause, LogicalOperator, OrderBy, WhereClause};
use indexmap::IndexMap;
use std::cmp::Ordering;

pub(crate) type Row = IndexMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Equal,
    NotEqual,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Like,
}

/// Splits a condition key into attribute and comparison, e.g. `amount>=`.
fn parse_key(key: &str) -> (&str, Comparison) {
    const SUFFIXES: [(&str, Comparison); 7] = [
        ("!=", Comparison::NotEqual),
        (">=", Comparison::GreaterOrEqual),
        ("<=", Comparison::LessOrEqual),
        (">", Comparison::Greater),
        ("<", Comparison::Less),
        ("*", Comparison::Like),
        ("=", Comparison::Equal),
    ];
    for (suffix, comparison) in SUFFIXES {
        if let Some(attribute) = key.strip_suffix(suffix) {
            return (attribute, comparison);
        }
    }
    (key, Comparison::Equal)
}

/// `true` when the row satisfies every member of the clause.
pub(crate) fn matches(row: &Row, clause: &WhereClause) -> bool {
    clause.iter().all(|c| matches_clause(row, c))
}

fn matches_clause(row: &Row, clause: &Clause) -> bool {
    match clause {
        Clause::Condition { key, value } => matches_condition(row, key, value),
        Clause::Logical { operator, clause } => match operator {
            LogicalOperator::Or => clause.is_empty() || clause.iter().any(|c| matches_clause(row, c)),
            LogicalOperator::And => matches(row, clause),
            LogicalOperator::Not => !matches(row, clause),
        },
        Clause::Group(clause) => matches(row, clause),
    }
}

fn matches_condition(row: &Row, key: &str, expected: &Value) -> bool {
    let (attribute, comparison) = parse_key(key);
    let actual = row.get(attribute).unwrap_or(&Value::Null);

    match comparison {
        Comparison::Equal => equals(actual, expected),
        Comparison::NotEqual => !equals(actual, expected),
        Comparison::Like => match (actual, expected) {
            (Value::String(text), Value::String(pattern)) => like(text, pattern),
            _ => false,
        },
        ordering => {
            if actual.is_null() || expected.is_null() {
                return false;
            }
            let result = actual.compare(expected);
            match ordering {
                Comparison::Greater => result == Ordering::Greater,
                Comparison::GreaterOrEqual => result != Ordering::Less,
                Comparison::Less => result == Ordering::Less,
                Comparison::LessOrEqual => result != Ordering::Greater,
                _ => false,
            }
        }
    }
}

/// Equality with list membership for array values and null matching only null.
fn equals(actual: &Value, expected: &Value) -> bool {
    match expected {
        Value::Array(candidates) => candidates.iter().any(|c| actual.loosely_equals(c)),
        Value::Null => actual.is_null(),
        _ => actual.loosely_equals(expected),
    }
}

/// SQL `LIKE` with `%` for any run of characters and `_` for exactly one.
fn like(text: &str, pattern: &str) -> bool {
    let text = text.chars().collect::<Vec<_>>();
    let pattern = pattern.chars().collect::<Vec<_>>();

    let (mut t, mut p) = (0usize, 0usize);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, matched)) = backtrack {
            p = star + 1;
            t = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

/// Sorts rows in place by the given order spec.
pub(crate) fn sort_rows(rows: &mut [Row], order_by: Option<&OrderBy>, order: Option<SortOrder>) {
    let keys = match order_by {
        Some(OrderBy::Attribute(attribute)) => vec![(attribute.clone(), order.unwrap_or_default())],
        Some(OrderBy::List(list)) => list.clone(),
        None => return,
    };

    rows.sort_by(|a, b| {
        for (attribute, direction) in &keys {
            let left = a.get(attribute).unwrap_or(&Value::Null);
            let right = b.get(attribute).unwrap_or(&Value::Null);
            let ordering = match direction {
                SortOrder::Ascending => left.compare(right),
                SortOrder::Descending => right.compare(left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

/// Keeps only the selected attributes, in selection order. An empty selection keeps all.
pub(crate) fn project(row: &Row, select: &[String]) -> Row {
    if select.is_empty() {
        return row.clone();
    }
    select
        .iter()
        .filter_map(|attribute| row.get(attribute).map(|v| (attribute.clone(), v.clone())))
        .collect()
}

/// Drops rows equal to an earlier row, keeping the first occurrence.
pub(crate) fn distinct(rows: Vec<Row>) -> Vec<Row> {
    let mut unique: Vec<Row> = Vec::with_capacity(rows.len());
    for row in rows {
        if !unique.contains(&row) {
            unique.push(row);
        }
    }
    unique
}
