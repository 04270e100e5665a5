//! pfscluster - quorum resolution for replicated filesystem nodes
//!
//! A logical filesystem object may live on several replicas at once.
//! This crate groups the per-replica nodes into a cluster, decides which
//! replicas agree on the current version, and picks one to serve reads
//! and writes.
//!
//! - `chain`: the per-replica node interface the cluster layer consumes
//! - `pfs`: replica roles and mount-level configuration
//! - `cluster`: lifecycle, quorum resolution, status flags
//! - `observability`: structured logging and outcome counters
//! - `cli`: replay recorded replica state from the command line

pub mod chain;
pub mod cli;
pub mod cluster;
pub mod observability;
pub mod pfs;
