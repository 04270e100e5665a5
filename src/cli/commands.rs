//! CLI command implementations
//!
//! `check` builds a cluster from a PFS configuration and a replica
//! snapshot, then walks it through the same lifecycle a filesystem
//! operation would: lock, check, read the focus, unlock, drop.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::chain::{LockMode, MemChain};
use crate::cluster::{CheckOptions, Cluster, ClusterResult};
use crate::observability::{log_event_with_fields, Event};
use crate::pfs::PfsConfig;

use super::args::Command;
use super::errors::CliResult;
use super::io::write_response;
use super::snapshot::Snapshot;

/// Inputs of one `check` invocation
#[derive(Debug, Clone, Copy)]
pub struct CheckRequest<'a> {
    pub config: &'a Path,
    pub snapshot: &'a Path,
    pub key: u64,
    pub options: CheckOptions,
}

/// Main CLI entry point
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Check {
            config,
            snapshot,
            key,
            absence,
        } => {
            let options = if absence {
                CheckOptions::absence()
            } else {
                CheckOptions::live()
            };
            let verdict = check(CheckRequest {
                config: &config,
                snapshot: &snapshot,
                key,
                options,
            })?;
            write_response(verdict)
        }
    }
}

/// Resolve one key against a recorded snapshot and describe the result.
///
/// Resolution failures are part of the verdict; only unreadable or
/// inconsistent inputs are errors.
pub fn check(request: CheckRequest<'_>) -> CliResult<Value> {
    let config = PfsConfig::load(request.config)?;
    let descriptor = Arc::new(config.to_descriptor()?);
    let snapshot = Snapshot::load(request.snapshot)?;
    let slots = snapshot.to_slots(&descriptor)?;

    let cluster = Cluster::new(Arc::clone(&descriptor), slots);
    cluster.lock(LockMode::Shared);
    let result = cluster.check(request.key, request.options);
    let verdict = verdict(&cluster, request.key, request.options, result);
    cluster.unlock();
    cluster.drop_ref();

    let key_hex = format!("{:#x}", request.key);
    log_event_with_fields(
        Event::SnapshotChecked,
        &[("key", key_hex.as_str()), ("outcome", outcome(result))],
    );

    Ok(verdict)
}

fn outcome(result: ClusterResult<()>) -> &'static str {
    match result {
        Ok(()) => "CLUSTER_RESOLVED",
        Err(e) => e.code(),
    }
}

fn verdict(
    cluster: &Cluster<MemChain>,
    key: u64,
    options: CheckOptions,
    result: ClusterResult<()>,
) -> Value {
    let roles = cluster.descriptor().roles();
    let slots: Vec<Value> = (0..cluster.nchains())
        .filter_map(|i| cluster.slot_flags(i).map(|flags| (i, flags)))
        .map(|(i, flags)| {
            json!({
                "index": i,
                "role": roles[i].as_str(),
                "invalid": flags.invalid(),
                "focus_eligible": flags.focus_eligible(),
                "error": cluster.slot_error(i).map(|e| e.code()),
            })
        })
        .collect();

    let bref = cluster.bref();
    json!({
        "key": format!("{:#x}", key),
        "absence": options.is_absence(),
        "outcome": outcome(result),
        "retryable": result.err().map_or(false, |e| e.is_retryable()),
        "needs_repair": result.err().map_or(false, |e| e.needs_repair()),
        "focus": cluster.focus_index(),
        "kind": cluster.kind().as_str(),
        "modify_tid": bref.modify_tid,
        "flags": cluster.flags().bits(),
        "status": cluster.flags().describe(),
        "slots": slots,
    })
}
