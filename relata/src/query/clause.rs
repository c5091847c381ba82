use crate::common::{Value, AND, NOT, OR};
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// Boolean operator of a nested logical group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogicalOperator {
    Or,
    And,
    Not,
}

impl LogicalOperator {
    /// The key under which the group sits in its parent clause.
    pub fn key(&self) -> &'static str {
        match self {
            LogicalOperator::Or => OR,
            LogicalOperator::And => AND,
            LogicalOperator::Not => NOT,
        }
    }
}

/// One member of a where or having clause.
///
/// A condition key may carry an operator suffix understood by the mapper
/// (`amount>=`, `status!=`, `name*`); an array value means membership.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Clause {
    /// `key => value`
    Condition { key: String, value: Value },
    /// `OR => [...]`, `AND => [...]`, `NOT => [...]`
    Logical {
        operator: LogicalOperator,
        clause: WhereClause,
    },
    /// Anonymous nested group, a conjunction of its members.
    Group(WhereClause),
}

impl Clause {
    /// The key of the member, `None` for anonymous groups.
    pub fn key(&self) -> Option<&str> {
        match self {
            Clause::Condition { key, .. } => Some(key.as_str()),
            Clause::Logical { operator, .. } => Some(operator.key()),
            Clause::Group(_) => None,
        }
    }
}

impl Display for Clause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Clause::Condition { key, value } => write!(f, "{}: {}", key, value),
            Clause::Logical { operator, clause } => write!(f, "{}: {}", operator.key(), clause),
            Clause::Group(clause) => write!(f, "{}", clause),
        }
    }
}

/// An ordered conjunction of conditions and nested groups.
///
/// # Purpose
/// `WhereClause` is the structured form of both the where and the having part of a
/// query. It never becomes query text here; the mapper decides how to evaluate it.
///
/// # Characteristics
/// - **Ordered**: members keep their insertion order
/// - **Nestable**: groups and logical groups hold further clauses
/// - **Keyed union**: [`WhereClause::union`] replaces members by key, leaving
///   anonymous groups alone
///
/// # Usage
/// ```rust,ignore
/// use relata::clause;
/// use relata::query::WhereClause;
///
/// let simple = clause! { "type" => "Customer", "amount>=" => 100 };
/// let nested = WhereClause::new()
///     .condition("deleted", false)
///     .or(clause! { "status" => "New", "assignedUserId" => "u1" });
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WhereClause(Vec<Clause>);

impl WhereClause {
    pub fn new() -> Self {
        WhereClause(Vec::new())
    }

    /// Adds a `key => value` condition.
    pub fn condition<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.0.push(Clause::Condition {
            key: key.to_string(),
            value: value.into(),
        });
        self
    }

    /// Adds a disjunction of the members of `clause`.
    pub fn or(mut self, clause: WhereClause) -> Self {
        self.0.push(Clause::Logical {
            operator: LogicalOperator::Or,
            clause,
        });
        self
    }

    /// Adds an explicit conjunction of the members of `clause`.
    pub fn and(mut self, clause: WhereClause) -> Self {
        self.0.push(Clause::Logical {
            operator: LogicalOperator::And,
            clause,
        });
        self
    }

    /// Adds a negated conjunction of the members of `clause`.
    pub fn not(mut self, clause: WhereClause) -> Self {
        self.0.push(Clause::Logical {
            operator: LogicalOperator::Not,
            clause,
        });
        self
    }

    /// Adds `clause` as an anonymous nested group.
    pub fn group(mut self, clause: WhereClause) -> Self {
        self.0.push(Clause::Group(clause));
        self
    }

    pub fn push(&mut self, clause: Clause) {
        self.0.push(clause);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Clause> {
        self.0.iter()
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.0
    }

    /// Keyed union with `supplied` taking precedence.
    ///
    /// The result holds every member of `supplied` in order, followed by the members
    /// of `self` whose key does not appear in `supplied`. Anonymous groups of `self`
    /// have no key and are always kept.
    pub fn union(self, supplied: WhereClause) -> WhereClause {
        let supplied_keys = supplied
            .iter()
            .filter_map(|c| c.key().map(|k| k.to_string()))
            .collect::<Vec<_>>();

        let mut merged = supplied.0;
        merged.extend(self.0.into_iter().filter(|c| match c.key() {
            Some(key) => !supplied_keys.iter().any(|k| k == key),
            None => true,
        }));
        WhereClause(merged)
    }
}

impl IntoIterator for WhereClause {
    type Item = Clause;
    type IntoIter = std::vec::IntoIter<Clause>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a WhereClause {
    type Item = &'a Clause;
    type IntoIter = std::slice::Iter<'a, Clause>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl From<Vec<Clause>> for WhereClause {
    fn from(clauses: Vec<Clause>) -> Self {
        WhereClause(clauses)
    }
}

impl FromIterator<Clause> for WhereClause {
    fn from_iter<T: IntoIterator<Item = Clause>>(iter: T) -> Self {
        WhereClause(iter.into_iter().collect())
    }
}

impl Display for WhereClause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}

/// Builds a [`WhereClause`] of plain conditions.
///
/// ```rust,ignore
/// let where_clause = clause! { "type" => "Customer", "amount>=" => 100 };
/// ```
#[macro_export]
macro_rules! clause {
    () => {
        $crate::query::WhereClause::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        $crate::query::WhereClause::new()$(.condition($key, $value))+
    };
}
