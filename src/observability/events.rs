//! Observable cluster events
//!
//! Events are explicit and typed.

use std::fmt;

use super::logger::Severity;

/// Observable events of the cluster layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// PFS configuration loaded
    PfsConfigLoaded,

    // Quorum resolution
    /// Masters disagree on the version of an existing key
    NoQuorum,
    /// Quorum reached but every agreeing node failed
    AllAgreedErrored,
    /// A same-version replica differs structurally from the focus
    FocusMismatch,

    // Lifecycle
    /// Last reference dropped while nodes were still locked
    ReleasedLocked,

    // CLI
    /// Snapshot replayed through the resolver
    SnapshotChecked,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::PfsConfigLoaded => "PFS_CONFIG_LOADED",
            Event::NoQuorum => "CLUSTER_NO_QUORUM",
            Event::AllAgreedErrored => "CLUSTER_ALL_AGREED_ERRORED",
            Event::FocusMismatch => "CLUSTER_FOCUS_MISMATCH",
            Event::ReleasedLocked => "CLUSTER_RELEASED_LOCKED",
            Event::SnapshotChecked => "SNAPSHOT_CHECKED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::PfsConfigLoaded | Event::SnapshotChecked => Severity::Info,
            Event::NoQuorum
            | Event::AllAgreedErrored
            | Event::FocusMismatch
            | Event::ReleasedLocked => Severity::Warn,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
