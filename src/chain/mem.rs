//! In-memory chain
//!
//! A chain with no backing store. Lock and hold operations only update
//! counters, which makes it usable for replaying recorded replica state
//! (see the `check` command) and for exercising cluster lifecycles.

use std::sync::atomic::{AtomicU32, Ordering};

use super::{BlockRef, Chain, LockMode, NodeError};

/// Chain held entirely in memory
#[derive(Debug, Default)]
pub struct MemChain {
    bref: BlockRef,
    error: Option<NodeError>,
    pfs_boundary: bool,
    container: Option<bool>,
    shared_locks: AtomicU32,
    exclusive_locks: AtomicU32,
    lock_calls: AtomicU32,
    holds: AtomicU32,
}

impl MemChain {
    /// Create a chain with the given metadata.
    pub fn new(bref: BlockRef) -> Self {
        Self {
            bref,
            ..Self::default()
        }
    }

    /// Record a load error on the chain.
    pub fn with_error(mut self, error: NodeError) -> Self {
        self.error = Some(error);
        self
    }

    /// Mark the chain as a mount boundary.
    pub fn with_pfs_boundary(mut self) -> Self {
        self.pfs_boundary = true;
        self
    }

    /// Override the container classification derived from the kind.
    pub fn with_container(mut self, container: bool) -> Self {
        self.container = Some(container);
        self
    }

    /// Number of locks currently held (shared + exclusive).
    pub fn lock_count(&self) -> u32 {
        self.shared_locks.load(Ordering::Acquire) + self.exclusive_locks.load(Ordering::Acquire)
    }

    /// Number of exclusive locks currently held.
    pub fn exclusive_count(&self) -> u32 {
        self.exclusive_locks.load(Ordering::Acquire)
    }

    /// Total number of `lock` calls ever made.
    pub fn lock_calls(&self) -> u32 {
        self.lock_calls.load(Ordering::Acquire)
    }

    /// Number of pins currently held.
    pub fn hold_count(&self) -> u32 {
        self.holds.load(Ordering::Acquire)
    }
}

impl Chain for MemChain {
    fn bref(&self) -> BlockRef {
        self.bref
    }

    fn error(&self) -> Option<NodeError> {
        self.error
    }

    fn is_pfs_boundary(&self) -> bool {
        self.pfs_boundary
    }

    fn is_container(&self) -> bool {
        self.container.unwrap_or_else(|| self.bref.kind.is_container())
    }

    fn lock(&self, mode: LockMode) {
        self.lock_calls.fetch_add(1, Ordering::AcqRel);
        match mode {
            LockMode::Shared => self.shared_locks.fetch_add(1, Ordering::AcqRel),
            LockMode::Exclusive => self.exclusive_locks.fetch_add(1, Ordering::AcqRel),
        };
    }

    fn unlock(&self) {
        // Exclusive locks are released first; a chain is never locked
        // both ways by the same owner.
        let released = self
            .exclusive_locks
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .or_else(|_| {
                self.shared_locks
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            });
        assert!(released.is_ok(), "unlock of an unlocked chain");
    }

    fn hold(&self) {
        self.holds.fetch_add(1, Ordering::AcqRel);
    }

    fn unhold(&self) {
        let released = self
            .holds
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        assert!(released.is_ok(), "unhold of an unheld chain");
    }

    fn rehold(&self) {
        self.holds.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::NodeKind;

    fn chain() -> MemChain {
        MemChain::new(BlockRef::new(NodeKind::Inode, 1, 1))
    }

    #[test]
    fn test_lock_unlock_counts() {
        let c = chain();
        c.lock(LockMode::Shared);
        c.lock(LockMode::Exclusive);
        assert_eq!(c.lock_count(), 2);
        assert_eq!(c.exclusive_count(), 1);

        c.unlock();
        assert_eq!(c.exclusive_count(), 0);
        c.unlock();
        assert_eq!(c.lock_count(), 0);
        assert_eq!(c.lock_calls(), 2);
    }

    #[test]
    #[should_panic(expected = "unlock of an unlocked chain")]
    fn test_unlock_without_lock_panics() {
        chain().unlock();
    }

    #[test]
    fn test_hold_is_nestable() {
        let c = chain();
        c.hold();
        c.hold();
        c.unhold();
        assert_eq!(c.hold_count(), 1);
        c.unhold();
        c.rehold();
        assert_eq!(c.hold_count(), 1);
    }

    #[test]
    fn test_container_override() {
        assert!(!chain().is_container());
        assert!(chain().with_container(true).is_container());
    }
}
