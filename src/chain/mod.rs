//! Chain layer interface
//!
//! A chain is one replica's in-memory view of a logical object. The
//! cluster layer never loads, encodes or traverses chains itself; it only
//! consumes what the chain layer exposes here:
//! - logical metadata (`BlockRef`) and a per-node error
//! - per-node lock and hold operations
//!
//! References map onto `Arc`: cloning an `Arc<C>` is a chain ref,
//! dropping it is a chain drop.

mod bref;
mod errors;
mod mem;

pub use bref::{BlockRef, NodeKind, OFF_MASK_RADIX};
pub use errors::NodeError;
pub use mem::MemChain;

/// Lock mode requested from the chain layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared (read) lock
    Shared,
    /// Exclusive (modify) lock
    Exclusive,
}

impl LockMode {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LockMode::Shared => "shared",
            LockMode::Exclusive => "exclusive",
        }
    }
}

/// One replica's representation of a logical object.
///
/// Implementations own their locking discipline; `lock` may block the
/// calling thread.
pub trait Chain: Send + Sync {
    /// Logical metadata of this node.
    fn bref(&self) -> BlockRef;

    /// Error recorded while this node was loaded, if any.
    fn error(&self) -> Option<NodeError> {
        None
    }

    /// True when the node sits at a replica-set mount boundary.
    ///
    /// Metadata at a boundary is not comparable across replicas.
    fn is_pfs_boundary(&self) -> bool {
        false
    }

    /// True when the node's payload holds further block references.
    fn is_container(&self) -> bool {
        self.bref().kind.is_container()
    }

    /// Acquire the node lock.
    fn lock(&self, mode: LockMode);

    /// Release the node lock.
    fn unlock(&self);

    /// Pin the node without locking it.
    fn hold(&self);

    /// Release a pin taken by `hold` or `rehold`.
    fn unhold(&self);

    /// Re-pin a node after `unhold`.
    fn rehold(&self);
}
