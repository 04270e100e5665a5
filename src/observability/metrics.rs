//! Quorum resolution counters
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for check outcomes of every cluster of one PFS
///
/// Relaxed ordering: counters are observed, never synchronized on.
#[derive(Debug, Default)]
pub struct ClusterMetrics {
    checks: AtomicU64,
    resolved: AtomicU64,
    end_of_scan: AtomicU64,
    key_invalid: AtomicU64,
    no_quorum: AtomicU64,
    pending: AtomicU64,
    all_agreed_errored: AtomicU64,
    node_errors: AtomicU64,
    focus_mismatches: AtomicU64,
}

impl ClusterMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one resolver run
    pub fn increment_checks(&self) {
        self.checks.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a run that selected a healthy focus
    pub fn increment_resolved(&self) {
        self.resolved.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an agreed end of scan
    pub fn increment_end_of_scan(&self) {
        self.end_of_scan.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an agreed missing key
    pub fn increment_key_invalid(&self) {
        self.key_invalid.fetch_add(1, Ordering::Relaxed);
    }

    /// Count an unresolvable disagreement
    pub fn increment_no_quorum(&self) {
        self.no_quorum.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a run waiting on pending masters
    pub fn increment_pending(&self) {
        self.pending.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a quorum made only of failed nodes
    pub fn increment_all_agreed_errored(&self) {
        self.all_agreed_errored.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a node error passed through to the caller
    pub fn increment_node_errors(&self) {
        self.node_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one replica invalidated by cross-validation
    pub fn increment_focus_mismatches(&self) {
        self.focus_mismatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            checks: self.checks.load(Ordering::Relaxed),
            resolved: self.resolved.load(Ordering::Relaxed),
            end_of_scan: self.end_of_scan.load(Ordering::Relaxed),
            key_invalid: self.key_invalid.load(Ordering::Relaxed),
            no_quorum: self.no_quorum.load(Ordering::Relaxed),
            pending: self.pending.load(Ordering::Relaxed),
            all_agreed_errored: self.all_agreed_errored.load(Ordering::Relaxed),
            node_errors: self.node_errors.load(Ordering::Relaxed),
            focus_mismatches: self.focus_mismatches.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub checks: u64,
    pub resolved: u64,
    pub end_of_scan: u64,
    pub key_invalid: u64,
    pub no_quorum: u64,
    pub pending: u64,
    pub all_agreed_errored: u64,
    pub node_errors: u64,
    pub focus_mismatches: u64,
}
