//! Cluster layer
//!
//! Groups the per-replica nodes of one logical object and decides which
//! of them to trust.
//!
//! - `Cluster`: lifecycle (references, locks, pins, slot replacement)
//! - `check`: quorum resolution and focus selection
//! - `ClusterFlags`: availability and synchronization status
//! - `ClusterError`: outcomes the caller must act on
//!
//! # Usage
//!
//! ```ignore
//! cluster.lock(LockMode::Shared);
//! match cluster.check(key, CheckOptions::live()) {
//!     Ok(()) => read(cluster.focus()),
//!     Err(e) if e.is_retryable() => retry_later(),
//!     Err(e) if e.is_terminal_scan() => skip(),
//!     Err(e) => report(e),
//! }
//! cluster.unlock();
//! ```

mod check;
#[allow(clippy::module_inception)]
mod cluster;
mod errors;
mod projection;
mod slot;
mod status;

pub use check::CheckOptions;
pub use cluster::{Cluster, CopyMode, LockState};
pub use errors::{ClusterError, ClusterResult};
pub use slot::{ReplicaSlot, SlotFlags};
pub use status::ClusterFlags;
