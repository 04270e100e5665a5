//! Cluster-wide availability and synchronization flags
//!
//! Computed by the quorum resolver and consumed by the resynchronization
//! layer to decide what, if anything, needs repair.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitset of cluster status flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClusterFlags(u32);

impl ClusterFlags {
    /// Quorum of masters available for writes
    pub const WR_HARD: Self = Self(0x0100);
    /// Quorum of masters (or an in-sync slave) available for reads
    pub const RD_HARD: Self = Self(0x0200);
    /// No masters configured
    pub const NO_HARD: Self = Self(0x0800);
    /// Soft master available for writes
    pub const WR_SOFT: Self = Self(0x1000);
    /// Soft master or slave available for reads
    pub const RD_SOFT: Self = Self(0x2000);
    /// No slaves configured
    pub const NO_SOFT: Self = Self(0x8000);
    /// Every configured master agrees with the quorum
    pub const M_SYNCED: Self = Self(0x0001_0000);
    /// Every configured slave agrees with the quorum
    pub const S_SYNCED: Self = Self(0x0002_0000);

    /// No flags set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// True if every flag in `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Set the flags in `other`.
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// True if no flag is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Human-readable summary, as the resynchronization layer reports it.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();

        if self.contains(Self::M_SYNCED) {
            parts.push("masters-all-good");
        }
        if self.contains(Self::S_SYNCED) {
            parts.push("slaves-all-good");
        }

        if self.contains(Self::WR_HARD) {
            parts.push("quorum/rw");
        } else if self.contains(Self::RD_HARD) {
            parts.push("quorum/ro");
        } else if self.contains(Self::NO_HARD) {
            parts.push("no-masters-configured");
        }

        if self.contains(Self::WR_SOFT) {
            parts.push("soft/rw");
        } else if self.contains(Self::RD_SOFT) {
            parts.push("soft/ro");
        }

        if self.contains(Self::NO_SOFT) {
            parts.push("no-slaves-configured");
        }

        parts.join(" ")
    }
}

impl BitOr for ClusterFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ClusterFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for ClusterFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}
