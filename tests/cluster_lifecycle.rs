//! Cluster Lifecycle Tests
//!
//! Reference, lock and pin discipline:
//! - lock/unlock is a strict two-state machine
//! - the last reference releases every node exactly once
//! - templates are copied before use

use std::sync::Arc;
use std::thread;

use pfscluster::chain::{BlockRef, LockMode, MemChain, NodeKind};
use pfscluster::cluster::{CheckOptions, Cluster, CopyMode, LockState, ReplicaSlot};
use pfscluster::pfs::{PfsConfig, PfsDescriptor, PfsRole};
use uuid::Uuid;

fn descriptor(n: usize) -> Arc<PfsDescriptor> {
    Arc::new(PfsDescriptor::new(Uuid::new_v4(), vec![PfsRole::Master; n], None).unwrap())
}

fn nodes(n: usize) -> Vec<Arc<MemChain>> {
    (0..n)
        .map(|_| Arc::new(MemChain::new(BlockRef::new(NodeKind::Inode, 7, 1))))
        .collect()
}

fn slots(nodes: &[Arc<MemChain>]) -> Vec<ReplicaSlot<MemChain>> {
    nodes.iter().map(|n| ReplicaSlot::present(Arc::clone(n))).collect()
}

// =============================================================================
// Lock State Tests
// =============================================================================

/// Lock then unlock leaves every node unlocked.
#[test]
fn test_lock_round_trip() {
    let nodes = nodes(3);
    let cluster = Cluster::new(descriptor(3), slots(&nodes));

    cluster.lock(LockMode::Exclusive);
    assert_eq!(cluster.lock_state(), LockState::Locked(LockMode::Exclusive));
    assert!(nodes.iter().all(|n| n.exclusive_count() == 1));

    cluster.unlock();
    assert_eq!(cluster.lock_state(), LockState::Unlocked);
    assert!(nodes.iter().all(|n| n.lock_count() == 0));
}

/// Results survive unlock but another check is needed after relocking.
#[test]
fn test_relock_and_recheck() {
    let nodes = nodes(3);
    let cluster = Cluster::new(descriptor(3), slots(&nodes));

    cluster.lock(LockMode::Shared);
    cluster.check(7, CheckOptions::live()).unwrap();
    cluster.unlock();
    assert_eq!(cluster.focus_index(), Some(0));

    cluster.lock(LockMode::Shared);
    cluster.check(7, CheckOptions::live()).unwrap();
    assert_eq!(cluster.focus_index(), Some(0));
    cluster.unlock();
}

/// Locking twice is a programming error.
#[test]
#[should_panic(expected = "cluster is already locked")]
fn test_double_lock() {
    let cluster = Cluster::new(descriptor(1), slots(&nodes(1)));
    cluster.lock(LockMode::Shared);
    cluster.lock(LockMode::Exclusive);
}

// =============================================================================
// Reference Tests
// =============================================================================

/// Concurrent ref/drop pairs leave the count unchanged.
#[test]
fn test_concurrent_refs() {
    let nodes = nodes(2);
    let cluster = Arc::new(Cluster::new(descriptor(2), slots(&nodes)));

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let cluster = Arc::clone(&cluster);
            thread::spawn(move || {
                for _ in 0..100 {
                    cluster.add_ref();
                    cluster.drop_ref();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    assert_eq!(cluster.refs(), 1);
    assert!(cluster.drop_ref());
    assert!(nodes.iter().all(|n| Arc::strong_count(n) == 1));
}

/// Dropping the last reference while locked unlocks every node.
#[test]
fn test_release_locked_cluster() {
    let nodes = nodes(2);
    let cluster = Cluster::new(descriptor(2), slots(&nodes));
    cluster.lock(LockMode::Shared);

    assert!(cluster.drop_ref());
    assert!(cluster.is_released());
    assert!(nodes.iter().all(|n| n.lock_count() == 0));
    assert!(cluster.focus().is_none());
}

// =============================================================================
// Template Tests
// =============================================================================

/// Copies of a template share nodes but lock independently.
#[test]
fn test_template_copies() {
    let nodes = nodes(2);
    let template = Cluster::template(descriptor(2), slots(&nodes));

    let first = template.copy(CopyMode::WithNodes);
    let second = template.copy(CopyMode::WithNodes);
    first.lock(LockMode::Shared);
    second.lock(LockMode::Shared);
    assert!(nodes.iter().all(|n| n.lock_count() == 2));

    first.unlock();
    second.unlock();
    first.drop_ref();
    second.drop_ref();
    assert!(nodes.iter().all(|n| Arc::strong_count(n) == 2));
}

/// An empty copy can be populated slot by slot.
#[test]
fn test_empty_copy_populated() {
    let nodes = nodes(2);
    let template = Cluster::template(descriptor(2), slots(&nodes));
    let cluster = template.copy(CopyMode::Empty);

    cluster.lock(LockMode::Shared);
    cluster.populate(0, ReplicaSlot::present(Arc::clone(&nodes[0])));
    cluster.populate(1, ReplicaSlot::present(Arc::clone(&nodes[1])));
    assert!(nodes.iter().all(|n| n.lock_count() == 1));

    cluster.check(7, CheckOptions::live()).unwrap();
    cluster.unlock();
}

// =============================================================================
// Replacement Tests
// =============================================================================

/// replace_locked swaps node locks over to the source's nodes.
#[test]
fn test_replace_locked_swaps_locks() {
    let old = nodes(2);
    let new = nodes(2);
    let dst = Cluster::new(descriptor(2), slots(&old));
    let src = Cluster::new(descriptor(2), slots(&new));

    dst.lock(LockMode::Exclusive);
    dst.replace_locked(&src);

    assert!(old.iter().all(|n| n.lock_count() == 0));
    assert!(new.iter().all(|n| n.exclusive_count() == 1));

    dst.check(7, CheckOptions::live()).unwrap();
    assert!(Arc::ptr_eq(&dst.focus().unwrap(), &new[0]));
    dst.unlock();
}

// =============================================================================
// Configuration Tests
// =============================================================================

/// A loaded configuration drives the quorum size.
#[test]
fn test_config_file_to_cluster() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "roles": ["master", "master", "slave", "soft_slave"], "master_count": 4 }}"#
    )
    .unwrap();

    let config = PfsConfig::load(file.path()).unwrap();
    let descriptor = Arc::new(config.to_descriptor().unwrap());
    assert_eq!(descriptor.quorum(), 3);

    let nodes = nodes(4);
    let cluster = Cluster::new(descriptor, slots(&nodes));
    cluster.lock(LockMode::Shared);
    assert!(cluster.check(7, CheckOptions::live()).is_err());
    cluster.unlock();
}
