//! Configuration of an entity manager and the repositories it hands out.

use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

/// How accumulated repository state is combined with explicit per-call parameters.
///
/// The where clause is always combined: explicit groups first, the accumulated clause
/// appended as one nested group. The policies differ for the having clause and joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MergePolicy {
    /// Accumulated having is combined only when the explicit having clause is non-empty,
    /// otherwise it is dropped. Accumulated joins are appended only when the explicit
    /// join list is non-empty as well, otherwise they are dropped.
    #[default]
    Legacy,
    /// Accumulated having and joins are always combined with the explicit ones, the
    /// same way the where clause is.
    Symmetric,
}

impl Display for MergePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            MergePolicy::Legacy => write!(f, "legacy"),
            MergePolicy::Symmetric => write!(f, "symmetric"),
        }
    }
}

/// Shared configuration of an entity manager.
///
/// Cloning is cheap; all clones observe the same settings.
///
/// # Examples
///
/// ```rust,ignore
/// use relata::config::{MergePolicy, RelataConfig};
///
/// let config = RelataConfig::new();
/// config.set_merge_policy(MergePolicy::Symmetric);
/// config.set_trace_queries(true);
/// ```
#[derive(Clone, Default)]
pub struct RelataConfig {
    inner: Arc<RelataConfigInner>,
}

impl RelataConfig {
    pub fn new() -> Self {
        RelataConfig {
            inner: Arc::new(RelataConfigInner::default()),
        }
    }
}

impl Deref for RelataConfig {
    type Target = RelataConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl std::fmt::Debug for RelataConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelataConfig")
            .field("merge_policy", &self.merge_policy())
            .field("trace_queries", &self.trace_queries())
            .finish()
    }
}

#[derive(Default)]
pub struct RelataConfigInner {
    merge_policy: RwLock<MergePolicy>,
    trace_queries: AtomicBool,
}

impl RelataConfigInner {
    pub fn merge_policy(&self) -> MergePolicy {
        *self.merge_policy.read()
    }

    pub fn set_merge_policy(&self, policy: MergePolicy) {
        *self.merge_policy.write() = policy;
    }

    /// When enabled every effective SelectParams handed to the mapper is logged
    /// at debug level.
    pub fn trace_queries(&self) -> bool {
        self.trace_queries.load(Ordering::Relaxed)
    }

    pub fn set_trace_queries(&self, enabled: bool) {
        self.trace_queries.store(enabled, Ordering::Relaxed);
    }
}
