//! Replica snapshots
//!
//! A JSON document recording what the populator saw for every slot of
//! one cluster:
//!
//! ```json
//! {
//!   "slots": [
//!     { "state": "present", "bref": { "kind": "inode", "key": 4096, "modify_tid": 100 } },
//!     { "state": "failed", "error": "io" },
//!     { "state": "absent" },
//!     { "state": "pending" }
//!   ]
//! }
//! ```
//!
//! Present slots become `MemChain` nodes.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::chain::{BlockRef, MemChain, NodeError};
use crate::cluster::ReplicaSlot;
use crate::pfs::PfsDescriptor;

/// Recorded populator result for one slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SlotRecord {
    /// Node fetched
    Present {
        #[serde(default)]
        bref: BlockRef,
        /// Error recorded on the node itself
        #[serde(default)]
        node_error: Option<NodeError>,
        #[serde(default)]
        pfs_boundary: bool,
    },
    /// No result yet
    Pending,
    /// Node confirmed the object does not exist
    Absent,
    /// Fetch failed, possibly leaving a partial node
    Failed {
        error: NodeError,
        #[serde(default)]
        bref: Option<BlockRef>,
    },
}

impl SlotRecord {
    fn to_slot(&self) -> ReplicaSlot<MemChain> {
        match self {
            SlotRecord::Present {
                bref,
                node_error,
                pfs_boundary,
            } => {
                let mut chain = MemChain::new(*bref);
                if let Some(err) = node_error {
                    chain = chain.with_error(*err);
                }
                if *pfs_boundary {
                    chain = chain.with_pfs_boundary();
                }
                ReplicaSlot::present(Arc::new(chain))
            }
            SlotRecord::Pending => ReplicaSlot::pending(),
            SlotRecord::Absent => ReplicaSlot::absent(),
            SlotRecord::Failed { error, bref } => {
                ReplicaSlot::failed(bref.map(|b| Arc::new(MemChain::new(b))), *error)
            }
        }
    }
}

/// Recorded state of every slot of one cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub slots: Vec<SlotRecord>,
}

impl Snapshot {
    /// Load a snapshot file.
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::snapshot_error(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse a snapshot document.
    pub fn from_json(content: &str) -> CliResult<Self> {
        let snapshot: Snapshot = serde_json::from_str(content)?;
        if snapshot.slots.is_empty() {
            return Err(CliError::snapshot_error("Snapshot lists no slots"));
        }
        Ok(snapshot)
    }

    /// Build cluster slots, checking the snapshot fits the descriptor.
    pub fn to_slots(&self, descriptor: &PfsDescriptor) -> CliResult<Vec<ReplicaSlot<MemChain>>> {
        if self.slots.len() > descriptor.len() {
            return Err(CliError::snapshot_error(format!(
                "Snapshot has {} slots but the PFS configures {}",
                self.slots.len(),
                descriptor.len()
            )));
        }
        Ok(self.slots.iter().map(SlotRecord::to_slot).collect())
    }
}
