//! Focus projection
//!
//! Callers that only need "the" node's metadata read it through the
//! cluster instead of picking a replica themselves.

use super::cluster::Cluster;
use crate::chain::{BlockRef, Chain, NodeKind};

impl<C: Chain> Cluster<C> {
    /// Kind of the focus node, or `NodeKind::Empty` when the last check
    /// failed or selected no focus.
    ///
    /// # Panics
    ///
    /// Panics unless the cluster is locked.
    pub fn kind(&self) -> NodeKind {
        self.focus_bref().map_or(NodeKind::Empty, |b| b.kind)
    }

    /// Block reference of the focus node with the physical offset bits
    /// cleared (only the radix remains), or an empty block reference.
    ///
    /// # Panics
    ///
    /// Panics unless the cluster is locked.
    pub fn bref(&self) -> BlockRef {
        self.focus_bref()
            .map(|b| b.scrubbed())
            .unwrap_or_default()
    }

    fn focus_bref(&self) -> Option<BlockRef> {
        let core = self.core();
        core.assert_locked();

        if core.error.is_some() {
            return None;
        }
        core.focus
            .and_then(|i| core.slots.get(i))
            .and_then(|s| s.node.as_ref())
            .map(|n| n.bref())
    }
}
