//! Cluster lifecycle
//!
//! A cluster is the set of replica slots representing one logical object
//! across every configured replica. This module owns its lifecycle:
//! - reference counting (`add_ref` / `drop_ref`)
//! - lock state (`lock` / `unlock`), a strict two-state machine
//! - nestable pins (`hold` / `unhold` / `rehold`)
//! - construction, template copies and slot replacement
//!
//! Misuse of the lifecycle (double lock, unlock while unlocked, locking
//! a template, using a released cluster) is a programming error and
//! panics. Resolution results are only meaningful while locked and after
//! `check` ran for the current key.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::errors::ClusterError;
use super::slot::{ReplicaSlot, SlotFlags};
use super::status::ClusterFlags;
use crate::chain::{Chain, LockMode};
use crate::observability::{log_event_with_fields, Event};
use crate::pfs::PfsDescriptor;

/// Lock state of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    /// No node locks held by the cluster
    Unlocked,
    /// Every populated node locked in the given mode
    Locked(LockMode),
}

/// How a cluster came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Origin {
    /// Built from populator results
    Populated,
    /// Wraps a single locked node, quorum trivially satisfied
    Degenerate,
    /// Embedded in a parent object, must be copied before use
    Template,
}

/// What `copy` carries over
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMode {
    /// Share every node reference, focus and resolution state
    WithNodes,
    /// Same slot count, every slot pending
    Empty,
}

#[derive(Debug)]
pub(crate) struct ClusterCore<C> {
    pub(crate) origin: Origin,
    pub(crate) state: LockState,
    pub(crate) released: bool,
    pub(crate) slots: Vec<ReplicaSlot<C>>,
    pub(crate) focus: Option<usize>,
    pub(crate) error: Option<ClusterError>,
    pub(crate) flags: ClusterFlags,
    pub(crate) holds: u32,
}

impl<C: Chain> ClusterCore<C> {
    fn new(origin: Origin, slots: Vec<ReplicaSlot<C>>) -> Self {
        Self {
            origin,
            state: LockState::Unlocked,
            released: false,
            slots,
            focus: None,
            error: None,
            flags: ClusterFlags::empty(),
            holds: 0,
        }
    }

    fn nodes(&self) -> impl Iterator<Item = &Arc<C>> + '_ {
        self.slots.iter().filter_map(|s| s.node.as_ref())
    }

    fn assert_live(&self) {
        assert!(!self.released, "use of a released cluster");
    }

    pub(crate) fn assert_locked(&self) {
        self.assert_live();
        assert!(
            matches!(self.state, LockState::Locked(_)),
            "cluster must be locked"
        );
    }

    fn invalidate_resolution(&mut self) {
        self.focus = None;
        self.error = None;
    }

    /// Install `slot` at `index`, moving the cluster's locks and pins
    /// from the node it replaces onto the incoming one.
    fn install(&mut self, index: usize, slot: ReplicaSlot<C>) {
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, ReplicaSlot::pending);
        }

        if let Some(node) = &slot.node {
            if let LockState::Locked(mode) = self.state {
                node.lock(mode);
            }
            for _ in 0..self.holds {
                node.hold();
            }
        }

        let old = std::mem::replace(&mut self.slots[index], slot);
        if let Some(node) = &old.node {
            if matches!(self.state, LockState::Locked(_)) {
                node.unlock();
            }
            for _ in 0..self.holds {
                node.unhold();
            }
        }
    }
}

/// Replica set of one logical object
#[derive(Debug)]
pub struct Cluster<C: Chain> {
    refs: AtomicU32,
    descriptor: Arc<PfsDescriptor>,
    core: Mutex<ClusterCore<C>>,
}

impl<C: Chain> Cluster<C> {
    /// Build an unlocked, unresolved cluster from populator results.
    ///
    /// The caller holds the single initial reference.
    ///
    /// # Panics
    ///
    /// Panics if there are more slots than the descriptor configures.
    pub fn new(descriptor: Arc<PfsDescriptor>, slots: Vec<ReplicaSlot<C>>) -> Self {
        Self::with_origin(descriptor, slots, Origin::Populated)
    }

    /// Build a template cluster. Templates are never locked in place;
    /// `copy` them first.
    pub fn template(descriptor: Arc<PfsDescriptor>, slots: Vec<ReplicaSlot<C>>) -> Self {
        Self::with_origin(descriptor, slots, Origin::Template)
    }

    /// Wrap a single node that the caller already locked (in `mode`) and
    /// referenced. Lock and reference transfer to the cluster.
    ///
    /// The result is locked, focused on slot 0 and already satisfies a
    /// single-master quorum.
    pub fn from_chain(node: Arc<C>, mode: LockMode) -> Self {
        let mut slot = ReplicaSlot::present(node);
        slot.mark_focus_eligible();

        let mut core = ClusterCore::new(Origin::Degenerate, vec![slot]);
        core.state = LockState::Locked(mode);
        core.focus = Some(0);
        core.flags = degenerate_flags();

        Self {
            refs: AtomicU32::new(1),
            descriptor: Arc::new(PfsDescriptor::single_master()),
            core: Mutex::new(core),
        }
    }

    fn with_origin(
        descriptor: Arc<PfsDescriptor>,
        slots: Vec<ReplicaSlot<C>>,
        origin: Origin,
    ) -> Self {
        assert!(
            slots.len() <= descriptor.len(),
            "cluster has {} slots but the PFS configures {}",
            slots.len(),
            descriptor.len()
        );

        Self {
            refs: AtomicU32::new(1),
            descriptor,
            core: Mutex::new(ClusterCore::new(origin, slots)),
        }
    }

    pub(crate) fn core(&self) -> MutexGuard<'_, ClusterCore<C>> {
        // A panic while the core was held was an invariant violation;
        // the state it left behind is still the best description we have.
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Descriptor of the PFS this cluster belongs to.
    pub fn descriptor(&self) -> &Arc<PfsDescriptor> {
        &self.descriptor
    }

    // ---------------------------------------------------------------
    // Reference counting
    // ---------------------------------------------------------------

    /// Add a reference. Safe from any thread.
    pub fn add_ref(&self) {
        self.refs.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop a reference. Safe from any thread.
    ///
    /// On the last reference every node reference is released and the
    /// cluster becomes unusable. Returns true if this was the last one.
    pub fn drop_ref(&self) -> bool {
        let prev = match self
            .refs
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |r| r.checked_sub(1))
        {
            Ok(prev) => prev,
            Err(_) => panic!("cluster reference count underflow"),
        };

        if prev == 1 {
            self.release();
            true
        } else {
            false
        }
    }

    /// Current reference count.
    pub fn refs(&self) -> u32 {
        self.refs.load(Ordering::Acquire)
    }

    fn release(&self) {
        let mut core = self.core();

        if let LockState::Locked(mode) = core.state {
            for node in core.nodes() {
                node.unlock();
            }
            let nchains = core.slots.len().to_string();
            log_event_with_fields(
                Event::ReleasedLocked,
                &[("mode", mode.as_str()), ("nchains", nchains.as_str())],
            );
            core.state = LockState::Unlocked;
        }

        for _ in 0..core.holds {
            for node in core.nodes() {
                node.unhold();
            }
        }
        core.holds = 0;

        core.invalidate_resolution();
        for slot in core.slots.iter_mut() {
            slot.node = None;
        }
        core.released = true;
    }

    /// True once the last reference was dropped.
    pub fn is_released(&self) -> bool {
        self.core().released
    }

    // ---------------------------------------------------------------
    // Locking
    // ---------------------------------------------------------------

    /// Lock every populated node in `mode`.
    ///
    /// Does not resolve the cluster; call `check` afterwards.
    ///
    /// # Panics
    ///
    /// Panics if the cluster is already locked, is a template, or was
    /// released.
    pub fn lock(&self, mode: LockMode) {
        let mut core = self.core();
        core.assert_live();
        assert!(
            core.origin != Origin::Template,
            "template clusters must be copied before locking"
        );
        assert!(
            core.state == LockState::Unlocked,
            "cluster is already locked"
        );

        for node in core.nodes() {
            node.lock(mode);
        }
        core.state = LockState::Locked(mode);
    }

    /// Unlock every populated node.
    ///
    /// Reference count, focus and flags are left untouched but are stale
    /// until the next `check`.
    ///
    /// # Panics
    ///
    /// Panics if the cluster is not locked.
    pub fn unlock(&self) {
        let mut core = self.core();
        core.assert_live();
        assert!(
            matches!(core.state, LockState::Locked(_)),
            "cluster is not locked"
        );

        for node in core.nodes() {
            node.unlock();
        }
        core.state = LockState::Unlocked;
    }

    /// Current lock state.
    pub fn lock_state(&self) -> LockState {
        self.core().state
    }

    /// True while locked.
    pub fn is_locked(&self) -> bool {
        matches!(self.core().state, LockState::Locked(_))
    }

    // ---------------------------------------------------------------
    // Pins
    // ---------------------------------------------------------------

    /// Pin every populated node. Nestable, independent of the lock.
    pub fn hold(&self) {
        let mut core = self.core();
        core.assert_live();
        for node in core.nodes() {
            node.hold();
        }
        core.holds += 1;
    }

    /// Release one pin taken by `hold` or `rehold`.
    ///
    /// # Panics
    ///
    /// Panics if the cluster holds no pin.
    pub fn unhold(&self) {
        let mut core = self.core();
        core.assert_live();
        assert!(core.holds > 0, "cluster is not held");
        for node in core.nodes() {
            node.unhold();
        }
        core.holds -= 1;
    }

    /// Re-pin every populated node after an `unhold`.
    pub fn rehold(&self) {
        let mut core = self.core();
        core.assert_live();
        for node in core.nodes() {
            node.rehold();
        }
        core.holds += 1;
    }

    /// Number of pins held.
    pub fn hold_count(&self) -> u32 {
        self.core().holds
    }

    // ---------------------------------------------------------------
    // Slot management
    // ---------------------------------------------------------------

    /// Record a late populator result for slot `index`.
    ///
    /// If the cluster is locked the incoming node is locked in the same
    /// mode and the node it replaces is unlocked. Resolution results
    /// become stale; run `check` again.
    pub fn populate(&self, index: usize, slot: ReplicaSlot<C>) {
        let mut core = self.core();
        core.assert_live();
        assert!(
            index < self.descriptor.len(),
            "slot {} beyond the {} configured",
            index,
            self.descriptor.len()
        );

        core.install(index, slot);
        core.invalidate_resolution();
    }

    /// Copy this cluster into a fresh, unlocked cluster with one
    /// reference. Templates become ordinary clusters.
    pub fn copy(&self, mode: CopyMode) -> Self {
        let core = self.core();
        core.assert_live();

        let origin = match core.origin {
            Origin::Template => Origin::Populated,
            other => other,
        };

        let copied = match mode {
            CopyMode::WithNodes => {
                let mut copied = ClusterCore::new(origin, core.slots.clone());
                copied.focus = core.focus;
                copied.error = core.error;
                copied.flags = core.flags;
                copied
            }
            CopyMode::Empty => {
                let slots = (0..core.slots.len()).map(|_| ReplicaSlot::pending()).collect();
                ClusterCore::new(origin, slots)
            }
        };

        Self {
            refs: AtomicU32::new(1),
            descriptor: Arc::clone(&self.descriptor),
            core: Mutex::new(copied),
        }
    }

    /// Replace this locked cluster's slots with those of `src`.
    ///
    /// Incoming nodes are locked in this cluster's mode, replaced nodes
    /// are unlocked, surplus slots are unlocked and released. Focus is
    /// cleared.
    ///
    /// # Panics
    ///
    /// Panics unless this cluster is locked with exactly one reference.
    pub fn replace_locked(&self, src: &Cluster<C>) {
        assert!(!std::ptr::eq(self, src), "cluster replaced with itself");
        assert_eq!(self.refs(), 1, "replace_locked requires a single reference");

        let mut dst = self.core();
        dst.assert_locked();
        let src = src.core();
        src.assert_live();
        assert!(
            src.slots.len() <= self.descriptor.len(),
            "source has more slots than the PFS configures"
        );

        for (index, slot) in src.slots.iter().enumerate() {
            dst.install(index, slot.clone());
        }
        while dst.slots.len() > src.slots.len() {
            let last = dst.slots.len() - 1;
            dst.install(last, ReplicaSlot::pending());
            dst.slots.truncate(last);
        }

        dst.invalidate_resolution();
    }

    /// True if any populated node's logical size differs from `bytes`.
    pub fn need_resize(&self, bytes: u64) -> bool {
        self.core().nodes().any(|n| n.bref().size != bytes)
    }

    // ---------------------------------------------------------------
    // Resolution results
    // ---------------------------------------------------------------

    /// Number of slots.
    pub fn nchains(&self) -> usize {
        self.core().slots.len()
    }

    /// Index of the focus slot.
    pub fn focus_index(&self) -> Option<usize> {
        self.core().focus
    }

    /// Node of the focus slot.
    pub fn focus(&self) -> Option<Arc<C>> {
        let core = self.core();
        core.focus
            .and_then(|i| core.slots.get(i))
            .and_then(|s| s.node.clone())
    }

    /// Aggregate error of the last `check`.
    pub fn error(&self) -> Option<ClusterError> {
        self.core().error
    }

    /// Cluster status flags of the last `check`.
    pub fn flags(&self) -> ClusterFlags {
        self.core().flags
    }

    /// Resolver flags of slot `index`.
    pub fn slot_flags(&self, index: usize) -> Option<SlotFlags> {
        self.core().slots.get(index).map(|s| s.flags())
    }

    /// Populator error of slot `index`.
    pub fn slot_error(&self, index: usize) -> Option<crate::chain::NodeError> {
        self.core().slots.get(index).and_then(|s| s.error())
    }
}

/// Flags of a cluster that trivially satisfies a single-master quorum.
pub(crate) fn degenerate_flags() -> ClusterFlags {
    ClusterFlags::WR_HARD
        | ClusterFlags::RD_HARD
        | ClusterFlags::M_SYNCED
        | ClusterFlags::S_SYNCED
        | ClusterFlags::NO_SOFT
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{BlockRef, MemChain, NodeKind};
    use crate::pfs::PfsRole;
    use uuid::Uuid;

    fn descriptor(n: usize) -> Arc<PfsDescriptor> {
        Arc::new(PfsDescriptor::new(Uuid::new_v4(), vec![PfsRole::Master; n], None).unwrap())
    }

    fn chain(tid: u64) -> Arc<MemChain> {
        Arc::new(MemChain::new(BlockRef::new(NodeKind::Inode, 1, tid)))
    }

    #[test]
    fn test_lock_unlock_cycles_node_locks() {
        let a = chain(1);
        let b = chain(1);
        let cluster = Cluster::new(
            descriptor(3),
            vec![
                ReplicaSlot::present(Arc::clone(&a)),
                ReplicaSlot::pending(),
                ReplicaSlot::present(Arc::clone(&b)),
            ],
        );

        for _ in 0..3 {
            cluster.lock(LockMode::Shared);
            assert!(cluster.is_locked());
            assert_eq!(a.lock_count(), 1);
            assert_eq!(b.lock_count(), 1);

            cluster.unlock();
            assert!(!cluster.is_locked());
            assert_eq!(a.lock_count(), 0);
        }
        assert_eq!(a.lock_calls(), 3);
    }

    #[test]
    #[should_panic(expected = "cluster is already locked")]
    fn test_double_lock_panics() {
        let cluster = Cluster::new(descriptor(1), vec![ReplicaSlot::present(chain(1))]);
        cluster.lock(LockMode::Shared);
        cluster.lock(LockMode::Shared);
    }

    #[test]
    #[should_panic(expected = "cluster is not locked")]
    fn test_unlock_while_unlocked_panics() {
        let cluster = Cluster::new(descriptor(1), vec![ReplicaSlot::present(chain(1))]);
        cluster.unlock();
    }

    #[test]
    #[should_panic(expected = "template clusters must be copied")]
    fn test_template_cannot_be_locked() {
        let cluster = Cluster::template(descriptor(1), vec![ReplicaSlot::present(chain(1))]);
        cluster.lock(LockMode::Exclusive);
    }

    #[test]
    fn test_template_copy_is_lockable() {
        let node = chain(1);
        let template = Cluster::template(descriptor(1), vec![ReplicaSlot::present(Arc::clone(&node))]);

        let copy = template.copy(CopyMode::WithNodes);
        assert_eq!(Arc::strong_count(&node), 3);
        copy.lock(LockMode::Exclusive);
        assert_eq!(node.exclusive_count(), 1);
        copy.unlock();
    }

    #[test]
    fn test_empty_copy_keeps_slot_count() {
        let cluster = Cluster::new(
            descriptor(2),
            vec![ReplicaSlot::present(chain(1)), ReplicaSlot::present(chain(1))],
        );
        let copy = cluster.copy(CopyMode::Empty);
        assert_eq!(copy.nchains(), 2);
        assert!(copy.focus().is_none());
        assert_eq!(copy.refs(), 1);
    }

    #[test]
    fn test_final_drop_releases_nodes_once() {
        let node = chain(1);
        let cluster = Cluster::new(descriptor(1), vec![ReplicaSlot::present(Arc::clone(&node))]);
        assert_eq!(Arc::strong_count(&node), 2);

        cluster.add_ref();
        cluster.add_ref();
        assert!(!cluster.drop_ref());
        assert!(!cluster.drop_ref());
        assert_eq!(Arc::strong_count(&node), 2);

        assert!(cluster.drop_ref());
        assert_eq!(Arc::strong_count(&node), 1);
        assert!(cluster.is_released());
    }

    #[test]
    #[should_panic(expected = "reference count underflow")]
    fn test_drop_without_ref_panics() {
        let cluster = Cluster::new(descriptor(1), vec![ReplicaSlot::<MemChain>::pending()]);
        cluster.drop_ref();
        cluster.drop_ref();
    }

    #[test]
    fn test_release_while_locked_unlocks_nodes() {
        let node = chain(1);
        let cluster = Cluster::new(descriptor(1), vec![ReplicaSlot::present(Arc::clone(&node))]);
        cluster.lock(LockMode::Shared);
        cluster.hold();

        assert!(cluster.drop_ref());
        assert_eq!(node.lock_count(), 0);
        assert_eq!(node.hold_count(), 0);
    }

    #[test]
    #[should_panic(expected = "use of a released cluster")]
    fn test_lock_after_release_panics() {
        let cluster = Cluster::new(descriptor(1), vec![ReplicaSlot::present(chain(1))]);
        cluster.drop_ref();
        cluster.lock(LockMode::Shared);
    }

    #[test]
    fn test_hold_is_independent_of_lock() {
        let node = chain(1);
        let cluster = Cluster::new(descriptor(1), vec![ReplicaSlot::present(Arc::clone(&node))]);

        cluster.hold();
        cluster.hold();
        assert_eq!(node.hold_count(), 2);
        assert!(!cluster.is_locked());

        cluster.unhold();
        cluster.unhold();
        cluster.rehold();
        assert_eq!(node.hold_count(), 1);
        assert_eq!(cluster.hold_count(), 1);
    }

    #[test]
    fn test_populate_while_locked_moves_lock() {
        let old = chain(1);
        let new = chain(2);
        let cluster = Cluster::new(descriptor(2), vec![ReplicaSlot::present(Arc::clone(&old))]);
        cluster.lock(LockMode::Exclusive);

        cluster.populate(0, ReplicaSlot::present(Arc::clone(&new)));
        assert_eq!(old.lock_count(), 0);
        assert_eq!(new.exclusive_count(), 1);

        cluster.populate(1, ReplicaSlot::absent());
        assert_eq!(cluster.nchains(), 2);
        cluster.unlock();
        assert_eq!(new.lock_count(), 0);
    }

    #[test]
    fn test_replace_locked() {
        let a = chain(1);
        let b = chain(1);
        let c = chain(2);

        let dst = Cluster::new(
            descriptor(2),
            vec![ReplicaSlot::present(Arc::clone(&a)), ReplicaSlot::present(Arc::clone(&b))],
        );
        dst.lock(LockMode::Shared);

        let src = Cluster::new(descriptor(2), vec![ReplicaSlot::present(Arc::clone(&c))]);
        dst.replace_locked(&src);

        assert_eq!(dst.nchains(), 1);
        assert_eq!(a.lock_count(), 0);
        assert_eq!(b.lock_count(), 0);
        assert_eq!(c.lock_count(), 1);
        assert_eq!(Arc::strong_count(&b), 1);
        assert!(dst.focus_index().is_none());

        dst.unlock();
        assert_eq!(c.lock_count(), 0);
    }

    #[test]
    fn test_need_resize() {
        let small = Arc::new(MemChain::new(BlockRef::new(NodeKind::Data, 0, 1).with_size(1024)));
        let large = Arc::new(MemChain::new(BlockRef::new(NodeKind::Data, 0, 1).with_size(4096)));

        let cluster = Cluster::new(descriptor(2), vec![ReplicaSlot::present(small)]);
        assert!(!cluster.need_resize(1024));
        assert!(cluster.need_resize(4096));

        cluster.populate(1, ReplicaSlot::present(large));
        assert!(cluster.need_resize(1024));
    }

    #[test]
    fn test_from_chain_takes_over_lock() {
        let node = chain(9);
        node.lock(LockMode::Exclusive);

        let cluster = Cluster::from_chain(Arc::clone(&node), LockMode::Exclusive);
        assert!(cluster.is_locked());
        assert_eq!(cluster.focus_index(), Some(0));
        assert!(cluster.slot_flags(0).unwrap().focus_eligible());
        assert_eq!(cluster.flags(), degenerate_flags());

        cluster.unlock();
        assert_eq!(node.lock_count(), 0);
    }

    #[test]
    fn test_refs_are_thread_safe() {
        use std::thread;

        let node = chain(1);
        let cluster = Arc::new(Cluster::new(
            descriptor(1),
            vec![ReplicaSlot::present(Arc::clone(&node))],
        ));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&cluster);
                thread::spawn(move || {
                    for _ in 0..50 {
                        c.add_ref();
                        assert!(!c.drop_ref());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cluster.refs(), 1);
        assert_eq!(Arc::strong_count(&node), 2);
    }
}
