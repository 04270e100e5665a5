//! Quorum resolution
//!
//! `check` decides, for one key, which replicas agree on the current
//! version, which one serves as focus, and what the caller should do
//! when no agreement is possible.
//!
//! # Algorithm
//!
//! 1. Census: tally configured masters and slaves, record soft-role
//!    availability, let a populated super-root take the focus.
//! 2. Quorum search: collect one vote per healthy master and repeatedly
//!    try the highest version below the last rejected one until a
//!    quorum agrees or the votes run out.
//! 3. Mark winners, pick the first healthy winning master as focus.
//! 4. Cross-validate every other valid replica against the focus.
//! 5. Derive cluster status flags.
//!
//! Resolution never performs I/O and never retries; pending results are
//! reported as `QuorumPending` and the caller re-runs `check` later.

use super::cluster::{degenerate_flags, Cluster, ClusterCore, Origin};
use super::errors::{ClusterError, ClusterResult};
use super::status::ClusterFlags;
use crate::chain::{BlockRef, Chain, NodeKind};
use crate::observability::{log_event_with_fields, ClusterMetrics, Event};
use crate::pfs::{PfsDescriptor, PfsRole};

/// Resolver options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CheckOptions {
    absence: bool,
}

impl CheckOptions {
    /// Resolve a live key. Absent replicas do not vote.
    pub fn live() -> Self {
        Self { absence: false }
    }

    /// Resolve a scan position. Only replicas that confirmed the object
    /// does not exist vote; present nodes neither vote nor count as
    /// pending.
    pub fn absence() -> Self {
        Self { absence: true }
    }

    /// True when deliberately absent replicas vote.
    pub fn is_absence(&self) -> bool {
        self.absence
    }
}

/// One master's vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Vote {
    Absent,
    Version(u64),
}

#[derive(Debug, Default)]
struct Census {
    total_masters: usize,
    total_slaves: usize,
    flags: ClusterFlags,
}

impl Census {
    /// Census flags plus the "nothing configured" markers.
    fn base_flags(&self) -> ClusterFlags {
        let mut flags = self.flags;
        if self.total_slaves == 0 {
            flags |= ClusterFlags::NO_SOFT;
        }
        if self.total_masters == 0 {
            flags |= ClusterFlags::NO_HARD;
        }
        flags
    }
}

#[derive(Debug, Default)]
struct Ballot {
    winner: Option<Vote>,
    agreeing: usize,
    pending: usize,
    key_matching: usize,
}

/// Fields two replicas of the same object must agree on
#[derive(Debug, PartialEq, Eq)]
struct Fingerprint {
    kind: NodeKind,
    key: u64,
    key_bits: u8,
    modify_tid: u64,
    size: u64,
    container: bool,
}

impl Fingerprint {
    fn of<C: Chain>(node: &C) -> Self {
        let BlockRef {
            kind,
            key,
            key_bits,
            modify_tid,
            size,
            ..
        } = node.bref();

        Self {
            kind,
            key,
            key_bits,
            modify_tid,
            size,
            container: node.is_container(),
        }
    }

    /// Name of the first field that differs.
    fn mismatch(&self, other: &Self) -> Option<&'static str> {
        if self.kind != other.kind {
            Some("kind")
        } else if self.key != other.key {
            Some("key")
        } else if self.key_bits != other.key_bits {
            Some("key_bits")
        } else if self.modify_tid != other.modify_tid {
            Some("modify_tid")
        } else if self.size != other.size {
            Some("size")
        } else if self.container != other.container {
            Some("container")
        } else {
            None
        }
    }
}

impl<C: Chain> Cluster<C> {
    /// Resolve the locked cluster against `key`.
    ///
    /// On success a focus is selected and `Ok(())` is returned. Otherwise
    /// the outcome is both returned and stored as the cluster error.
    /// Per-slot flags, focus and status flags are rewritten on every
    /// call.
    ///
    /// # Panics
    ///
    /// Panics unless the cluster is locked.
    pub fn check(&self, key: u64, options: CheckOptions) -> ClusterResult<()> {
        let mut core = self.core();
        core.assert_locked();

        let result = match core.origin {
            Origin::Degenerate => resolve_degenerate(&mut core, options),
            _ => resolve(&mut core, self.descriptor(), key, options),
        };
        core.error = result.err();

        record(self.descriptor().metrics(), result);
        result
    }
}

fn record(metrics: &ClusterMetrics, result: ClusterResult<()>) {
    metrics.increment_checks();
    match result {
        Ok(()) => metrics.increment_resolved(),
        Err(ClusterError::EndOfScanAgreed) => metrics.increment_end_of_scan(),
        Err(ClusterError::KeyInvalidAgreed) => metrics.increment_key_invalid(),
        Err(ClusterError::NoQuorumPossible) => metrics.increment_no_quorum(),
        Err(ClusterError::QuorumPending) => metrics.increment_pending(),
        Err(ClusterError::AllAgreedButErrored) => metrics.increment_all_agreed_errored(),
        Err(ClusterError::Node(_)) => metrics.increment_node_errors(),
    }
}

/// A cluster wrapping one locked node agrees with itself for any key.
fn resolve_degenerate<C: Chain>(
    core: &mut ClusterCore<C>,
    options: CheckOptions,
) -> ClusterResult<()> {
    core.focus = None;
    core.flags = degenerate_flags();

    let slot = &mut core.slots[0];
    slot.reset_resolution();

    if slot.node.is_some() {
        slot.mark_valid();
        slot.mark_focus_eligible();
        core.focus = Some(0);
    }

    match slot.effective_error() {
        Some(err) => Err(ClusterError::Node(err)),
        None if core.focus.is_some() => Ok(()),
        None if slot.flags().deliberately_absent() && options.is_absence() => {
            Err(ClusterError::EndOfScanAgreed)
        }
        None if slot.flags().deliberately_absent() => Err(ClusterError::KeyInvalidAgreed),
        None => Err(ClusterError::QuorumPending),
    }
}

fn resolve<C: Chain>(
    core: &mut ClusterCore<C>,
    descriptor: &PfsDescriptor,
    key: u64,
    options: CheckOptions,
) -> ClusterResult<()> {
    core.focus = None;
    core.error = None;
    for slot in core.slots.iter_mut() {
        slot.reset_resolution();
    }

    let census = census(core, descriptor);
    let quorum = descriptor.quorum();
    let ballot = search(core, descriptor, key, options);

    let winner = match ballot.winner {
        Some(winner) => winner,
        None => {
            core.flags = census.base_flags();
            return Err(no_winner(&ballot, quorum, key));
        }
    };

    let tid = match winner {
        Vote::Absent => {
            core.flags = census.base_flags();
            return Err(ClusterError::EndOfScanAgreed);
        }
        Vote::Version(tid) => tid,
    };

    let mut flags = census.base_flags();
    let (synced_masters, synced_slaves) = mark_winners(core, descriptor, key, tid, &mut flags);

    if core.focus.is_none() {
        let key_hex = format!("{:#x}", key);
        let tid = tid.to_string();
        log_event_with_fields(
            Event::AllAgreedErrored,
            &[("key", key_hex.as_str()), ("modify_tid", tid.as_str())],
        );
        core.error = Some(ClusterError::AllAgreedButErrored);
    }

    cross_validate(core, descriptor.metrics());

    if synced_masters == census.total_masters {
        flags |= ClusterFlags::M_SYNCED;
    }
    if synced_slaves == census.total_slaves {
        flags |= ClusterFlags::S_SYNCED;
    }
    core.flags = flags;

    match core.error {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn census<C: Chain>(core: &mut ClusterCore<C>, descriptor: &PfsDescriptor) -> Census {
    let mut census = Census::default();

    for (index, slot) in core.slots.iter().enumerate() {
        match descriptor.role(index) {
            PfsRole::Master => census.total_masters += 1,
            PfsRole::Slave => census.total_slaves += 1,
            PfsRole::SoftMaster => census.flags |= ClusterFlags::WR_SOFT | ClusterFlags::RD_SOFT,
            PfsRole::SoftSlave => census.flags |= ClusterFlags::RD_SOFT,
            PfsRole::SuperRoot => {
                census.total_masters += 1;
                if core.focus.is_none() && slot.error.is_none() {
                    if let Some(node) = &slot.node {
                        census.flags |= ClusterFlags::WR_HARD | ClusterFlags::RD_HARD;
                        core.focus = Some(index);
                        core.error = node.error().map(ClusterError::Node);
                    }
                }
            }
        }
    }

    census
}

fn search<C: Chain>(
    core: &ClusterCore<C>,
    descriptor: &PfsDescriptor,
    key: u64,
    options: CheckOptions,
) -> Ballot {
    let mut ballot = Ballot::default();
    let mut votes = Vec::with_capacity(core.slots.len());

    for (index, slot) in core.slots.iter().enumerate() {
        if !descriptor.role(index).is_master() || slot.error.is_some() {
            continue;
        }
        // In absence mode only confirmed-absent replicas vote; a present
        // node is neither a vote nor pending.
        match &slot.node {
            Some(node) if !options.is_absence() => {
                let bref = node.bref();
                if bref.key == key {
                    ballot.key_matching += 1;
                    votes.push(Vote::Version(bref.modify_tid));
                }
            }
            Some(_) => {}
            None if slot.flags().deliberately_absent() => {
                if options.is_absence() {
                    ballot.key_matching += 1;
                    votes.push(Vote::Absent);
                }
            }
            None => ballot.pending += 1,
        }
    }

    let quorum = descriptor.quorum();
    let mut bound: Option<Vote> = None;

    while let Some(candidate) = votes
        .iter()
        .copied()
        .filter(|v| bound.map_or(true, |b| *v < b))
        .max()
    {
        let count = votes.iter().filter(|v| **v == candidate).count();
        ballot.agreeing = ballot.agreeing.max(count);
        if count >= quorum {
            ballot.winner = Some(candidate);
            break;
        }
        bound = Some(candidate);
    }

    ballot
}

fn no_winner(ballot: &Ballot, quorum: usize, key: u64) -> ClusterError {
    if ballot.agreeing + ballot.pending >= quorum {
        return ClusterError::QuorumPending;
    }
    if ballot.key_matching < quorum {
        return ClusterError::KeyInvalidAgreed;
    }

    let key_hex = format!("{:#x}", key);
    let quorum = quorum.to_string();
    let agreeing = ballot.agreeing.to_string();
    let matching = ballot.key_matching.to_string();
    log_event_with_fields(
        Event::NoQuorum,
        &[
            ("key", key_hex.as_str()),
            ("quorum", quorum.as_str()),
            ("agreeing", agreeing.as_str()),
            ("key_matching", matching.as_str()),
        ],
    );
    ClusterError::NoQuorumPossible
}

/// Mark slots agreeing with the winning version and choose the focus.
///
/// Returns the number of agreeing masters and slaves.
fn mark_winners<C: Chain>(
    core: &mut ClusterCore<C>,
    descriptor: &PfsDescriptor,
    key: u64,
    tid: u64,
    flags: &mut ClusterFlags,
) -> (usize, usize) {
    let mut synced_masters = 0;
    let mut synced_slaves = 0;
    let mut error_taken = false;

    for (index, slot) in core.slots.iter_mut().enumerate() {
        let agrees = slot
            .node
            .as_ref()
            .map(|n| n.bref())
            .map_or(false, |b| b.key == key && b.modify_tid == tid);

        // Soft replicas are marked valid whatever the vote.
        match descriptor.role(index) {
            PfsRole::SoftMaster => {
                slot.mark_valid();
                slot.mark_focus_eligible();
                continue;
            }
            PfsRole::SoftSlave => {
                slot.mark_valid();
                continue;
            }
            PfsRole::Master | PfsRole::SuperRoot if agrees => {
                slot.mark_valid();
                slot.mark_focus_eligible();
                *flags |= ClusterFlags::WR_HARD | ClusterFlags::RD_HARD;
                synced_masters += 1;
            }
            PfsRole::Slave if agrees => {
                slot.mark_valid();
                *flags |= ClusterFlags::RD_HARD;
                synced_slaves += 1;
            }
            _ => continue,
        }

        if core.focus.is_some() {
            continue;
        }

        let err = slot.effective_error();
        if err.is_none() && descriptor.role(index).is_master() {
            core.focus = Some(index);
            core.error = None;
        } else if err.is_some() && !error_taken {
            core.error = err.map(ClusterError::Node);
            error_taken = true;
        }
    }

    (synced_masters, synced_slaves)
}

/// Invalidate replicas whose metadata disagrees with the focus.
fn cross_validate<C: Chain>(core: &mut ClusterCore<C>, metrics: &ClusterMetrics) {
    let Some(focus) = core.focus else {
        return;
    };
    let Some(focus_node) = core.slots[focus].node.clone() else {
        return;
    };
    if focus_node.is_pfs_boundary() {
        return;
    }

    let reference = Fingerprint::of(&*focus_node);

    for (index, slot) in core.slots.iter_mut().enumerate() {
        if index == focus || slot.flags().invalid() {
            continue;
        }
        let Some(node) = &slot.node else {
            continue;
        };

        if let Some(field) = reference.mismatch(&Fingerprint::of(&**node)) {
            slot.mark_invalid();
            metrics.increment_focus_mismatches();

            let slot_index = index.to_string();
            let focus_index = focus.to_string();
            log_event_with_fields(
                Event::FocusMismatch,
                &[
                    ("slot", slot_index.as_str()),
                    ("focus", focus_index.as_str()),
                    ("field", field),
                ],
            );
        }
    }
}
