//! Replica slots
//!
//! One slot per configured replica. The populator fills each slot with
//! the node it fetched, a per-slot error, or nothing at all; the quorum
//! resolver then sets the validity flags.

use std::sync::Arc;

use crate::chain::{Chain, NodeError};

/// Per-slot status flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SlotFlags {
    focus_eligible: bool,
    invalid: bool,
    absent: bool,
}

impl SlotFlags {
    /// Slot agrees with the quorum and may serve as focus.
    pub fn focus_eligible(&self) -> bool {
        self.focus_eligible
    }

    /// Slot is stale or structurally inconsistent.
    pub fn invalid(&self) -> bool {
        self.invalid
    }

    /// The node confirmed the object does not exist.
    pub fn deliberately_absent(&self) -> bool {
        self.absent
    }
}

/// State of one replica inside a cluster
#[derive(Debug)]
pub struct ReplicaSlot<C> {
    pub(crate) node: Option<Arc<C>>,
    pub(crate) error: Option<NodeError>,
    pub(crate) flags: SlotFlags,
}

impl<C> Clone for ReplicaSlot<C> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            error: self.error,
            flags: self.flags,
        }
    }
}

impl<C: Chain> ReplicaSlot<C> {
    /// Slot holding a fetched node.
    pub fn present(node: Arc<C>) -> Self {
        Self {
            node: Some(node),
            error: None,
            flags: SlotFlags::default(),
        }
    }

    /// Slot whose node has not reported yet.
    pub fn pending() -> Self {
        Self {
            node: None,
            error: None,
            flags: SlotFlags::default(),
        }
    }

    /// Slot whose node confirmed the object does not exist.
    pub fn absent() -> Self {
        Self {
            node: None,
            error: None,
            flags: SlotFlags {
                absent: true,
                ..SlotFlags::default()
            },
        }
    }

    /// Slot whose fetch failed, with or without a partial node.
    pub fn failed(node: Option<Arc<C>>, error: NodeError) -> Self {
        Self {
            node,
            error: Some(error),
            flags: SlotFlags::default(),
        }
    }

    /// Node held by this slot.
    pub fn node(&self) -> Option<&Arc<C>> {
        self.node.as_ref()
    }

    /// Per-slot error recorded by the populator.
    pub fn error(&self) -> Option<NodeError> {
        self.error
    }

    /// Slot error, or failing that the node's own error.
    pub fn effective_error(&self) -> Option<NodeError> {
        self.error
            .or_else(|| self.node.as_ref().and_then(|n| n.error()))
    }

    /// Resolver flags.
    pub fn flags(&self) -> SlotFlags {
        self.flags
    }

    /// No result has arrived for this slot yet.
    pub fn is_pending(&self) -> bool {
        self.node.is_none() && self.error.is_none() && !self.flags.absent
    }

    pub(crate) fn reset_resolution(&mut self) {
        self.flags.invalid = true;
        self.flags.focus_eligible = false;
    }

    pub(crate) fn mark_valid(&mut self) {
        self.flags.invalid = false;
    }

    pub(crate) fn mark_invalid(&mut self) {
        self.flags.invalid = true;
    }

    pub(crate) fn mark_focus_eligible(&mut self) {
        self.flags.focus_eligible = true;
    }
}
