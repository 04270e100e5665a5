//! Cluster resolution outcomes
//!
//! Every non-success outcome of the quorum resolver. None of these are
//! invariant violations: misuse of the lifecycle (double lock, unlock
//! while unlocked, locking a template) panics instead.
//!
//! The resolver never retries. It classifies already-completed attempts
//! so the caller can decide between retry, skip, repair and give up.

use thiserror::Error;

use crate::chain::NodeError;

/// Result type for cluster resolution
pub type ClusterResult<T> = Result<T, ClusterError>;

/// Non-success outcome of a quorum check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// Quorum confirms there are no more entries
    #[error("quorum agrees the scan has ended")]
    EndOfScanAgreed,

    /// Quorum confirms the key does not exist; skip it
    #[error("quorum agrees the key is absent")]
    KeyInvalidAgreed,

    /// Masters disagree on the version of an existing key
    #[error("no quorum possible, masters disagree")]
    NoQuorumPossible,

    /// Not enough results yet; retry without advancing
    #[error("quorum pending on outstanding masters")]
    QuorumPending,

    /// Quorum reached but every agreeing node failed
    #[error("quorum reached but every agreeing node failed")]
    AllAgreedButErrored,

    /// Error of the node quorum settled on, passed through verbatim
    #[error("node error: {0}")]
    Node(#[from] NodeError),
}

impl ClusterError {
    /// Stable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            ClusterError::EndOfScanAgreed => "CLUSTER_END_OF_SCAN",
            ClusterError::KeyInvalidAgreed => "CLUSTER_KEY_INVALID",
            ClusterError::NoQuorumPossible => "CLUSTER_NO_QUORUM",
            ClusterError::QuorumPending => "CLUSTER_QUORUM_PENDING",
            ClusterError::AllAgreedButErrored => "CLUSTER_ALL_AGREED_ERRORED",
            ClusterError::Node(e) => e.code(),
        }
    }

    /// Retrying the same key later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClusterError::QuorumPending)
    }

    /// Operator or resynchronization action is required.
    pub fn needs_repair(&self) -> bool {
        matches!(
            self,
            ClusterError::NoQuorumPossible | ClusterError::AllAgreedButErrored
        )
    }

    /// The caller should move past this key (or stop scanning).
    pub fn is_terminal_scan(&self) -> bool {
        matches!(
            self,
            ClusterError::EndOfScanAgreed | ClusterError::KeyInvalidAgreed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_disjoint() {
        let all = [
            ClusterError::EndOfScanAgreed,
            ClusterError::KeyInvalidAgreed,
            ClusterError::NoQuorumPossible,
            ClusterError::QuorumPending,
            ClusterError::AllAgreedButErrored,
            ClusterError::Node(NodeError::Io),
        ];

        for err in all {
            let classes = [err.is_retryable(), err.needs_repair(), err.is_terminal_scan()];
            assert!(classes.iter().filter(|c| **c).count() <= 1, "{:?}", err);
        }
    }

    #[test]
    fn test_node_error_passes_through() {
        let err: ClusterError = NodeError::Check.into();
        assert_eq!(err, ClusterError::Node(NodeError::Check));
        assert_eq!(err.code(), "NODE_CHECK");
        assert!(err.to_string().contains("check code mismatch"));
    }

    #[test]
    fn test_codes() {
        assert_eq!(ClusterError::QuorumPending.code(), "CLUSTER_QUORUM_PENDING");
        assert_eq!(ClusterError::NoQuorumPossible.code(), "CLUSTER_NO_QUORUM");
    }
}
