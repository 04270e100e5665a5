//! Per-slot replica roles
//!
//! A role is configured at the mount level for each slot index, never
//! inferred from the data a node returns.

use serde::{Deserialize, Serialize};

/// Participation class of one replica
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PfsRole {
    /// Votes in the quorum, may serve reads and writes
    Master,

    /// Follows the masters, may serve reads once in sync
    Slave,

    /// Single directly-mounted replica, authoritative for reads and writes
    SoftMaster,

    /// Single directly-mounted replica, authoritative for reads
    SoftSlave,

    /// Super-root topology on a single device
    ///
    /// Counts as a master and is always its own focus.
    SuperRoot,
}

impl PfsRole {
    /// True for roles that vote in the quorum.
    pub fn is_master(&self) -> bool {
        matches!(self, PfsRole::Master | PfsRole::SuperRoot)
    }

    /// True for soft roles.
    pub fn is_soft(&self) -> bool {
        matches!(self, PfsRole::SoftMaster | PfsRole::SoftSlave)
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PfsRole::Master => "master",
            PfsRole::Slave => "slave",
            PfsRole::SoftMaster => "soft_master",
            PfsRole::SoftSlave => "soft_slave",
            PfsRole::SuperRoot => "super_root",
        }
    }
}
