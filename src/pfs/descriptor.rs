//! Node descriptor for one mounted PFS
//!
//! Holds the role of every slot index and the configured master count.
//! The master count is the configured total, which may exceed the
//! number of slots present in any one cluster instance.

use std::sync::Arc;

use uuid::Uuid;

use super::errors::{PfsError, PfsResult};
use super::role::PfsRole;
use crate::observability::ClusterMetrics;

/// Maximum number of replicas in one cluster.
pub const MAX_CLUSTER: usize = 8;

/// Immutable mount-level description of a replica set
#[derive(Debug, Clone)]
pub struct PfsDescriptor {
    cluster_id: Uuid,
    roles: Vec<PfsRole>,
    master_count: usize,
    metrics: Arc<ClusterMetrics>,
}

impl PfsDescriptor {
    /// Create a descriptor.
    ///
    /// `master_count` defaults to the number of voting roles listed.
    pub fn new(
        cluster_id: Uuid,
        roles: Vec<PfsRole>,
        master_count: Option<usize>,
    ) -> PfsResult<Self> {
        if roles.is_empty() {
            return Err(PfsError::NoRoles);
        }
        if roles.len() > MAX_CLUSTER {
            return Err(PfsError::TooManyRoles {
                count: roles.len(),
                max: MAX_CLUSTER,
            });
        }

        let listed = roles.iter().filter(|r| r.is_master()).count();
        let master_count = master_count.unwrap_or(listed);
        if master_count < listed {
            return Err(PfsError::MasterCountTooLow {
                configured: master_count,
                listed,
            });
        }

        Ok(Self {
            cluster_id,
            roles,
            master_count,
            metrics: Arc::new(ClusterMetrics::new()),
        })
    }

    /// Descriptor for a lone master, used by degenerate clusters.
    pub fn single_master() -> Self {
        Self {
            cluster_id: Uuid::new_v4(),
            roles: vec![PfsRole::Master],
            master_count: 1,
            metrics: Arc::new(ClusterMetrics::new()),
        }
    }

    /// Cluster identifier shared by all replicas of this PFS.
    pub fn cluster_id(&self) -> Uuid {
        self.cluster_id
    }

    /// Role of the given slot index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is beyond the configured slots. Clusters are
    /// never built with more slots than their descriptor lists.
    #[inline]
    pub fn role(&self, index: usize) -> PfsRole {
        self.roles[index]
    }

    /// All configured roles in slot order.
    pub fn roles(&self) -> &[PfsRole] {
        &self.roles
    }

    /// Number of configured slots.
    pub fn len(&self) -> usize {
        self.roles.len()
    }

    /// True if no slots are configured (never the case once validated).
    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }

    /// Configured master count.
    pub fn master_count(&self) -> usize {
        self.master_count
    }

    /// Number of agreeing masters required to accept a version.
    pub fn quorum(&self) -> usize {
        self.master_count / 2 + 1
    }

    /// Check outcome counters shared by every cluster of this PFS.
    pub fn metrics(&self) -> &ClusterMetrics {
        &self.metrics
    }
}
