use crate::errors::RelataResult;
use crate::mapper::Mapper;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exclusive write lock of one entity type's table.
///
/// Returned by `Repository::lock_table`. The lock is released by [`TableLockGuard::unlock`]
/// or, at the latest, when the guard is dropped, including on early returns and
/// panics. A release failure in `drop` is logged; use `unlock` to observe it.
#[must_use = "the table is unlocked as soon as the guard is dropped"]
pub struct TableLockGuard {
    mapper: Mapper,
    entity_type: String,
    locked: Arc<AtomicBool>,
    released: bool,
}

impl TableLockGuard {
    pub(crate) fn new(mapper: Mapper, entity_type: &str, locked: Arc<AtomicBool>) -> Self {
        TableLockGuard {
            mapper,
            entity_type: entity_type.to_string(),
            locked,
            released: false,
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Releases the lock now.
    pub fn unlock(mut self) -> RelataResult<()> {
        self.release()
    }

    fn release(&mut self) -> RelataResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.locked.store(false, Ordering::Release);
        log::debug!("Unlocking table of {}", self.entity_type);
        self.mapper.unlock_table(&self.entity_type)
    }
}

impl Drop for TableLockGuard {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            log::error!(
                "Failed to unlock table of {}: {}",
                self.entity_type,
                err
            );
        }
    }
}
