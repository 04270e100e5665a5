//! Per-node error codes
//!
//! These are produced by the chain layer while fetching a node and are
//! carried verbatim through the cluster layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error reported for a single node of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeError {
    /// Device I/O failed
    #[error("I/O error")]
    Io,

    /// Data check (CRC/hash) failed
    #[error("check code mismatch")]
    Check,

    /// Node could not be fully loaded
    #[error("incomplete node")]
    Incomplete,

    /// Recursion depth exceeded while resolving the node
    #[error("depth exceeded")]
    Depth,

    /// Block reference is malformed
    #[error("bad block reference")]
    BadBlockRef,

    /// Backing device is out of space
    #[error("no space")]
    NoSpace,

    /// Target does not exist on this node
    #[error("not found")]
    NotFound,

    /// Transient condition, retry later
    #[error("resource temporarily unavailable")]
    Again,
}

impl NodeError {
    /// Stable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            NodeError::Io => "NODE_IO",
            NodeError::Check => "NODE_CHECK",
            NodeError::Incomplete => "NODE_INCOMPLETE",
            NodeError::Depth => "NODE_DEPTH",
            NodeError::BadBlockRef => "NODE_BAD_BREF",
            NodeError::NoSpace => "NODE_NO_SPACE",
            NodeError::NotFound => "NODE_NOT_FOUND",
            NodeError::Again => "NODE_AGAIN",
        }
    }
}
