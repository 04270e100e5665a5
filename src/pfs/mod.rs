//! PFS (mount-level) configuration
//!
//! Supplies the cluster layer with:
//! - the role of every slot index
//! - the configured master count that sizes the quorum
//!
//! Roles are configured externally, never inferred from replica data.

mod config;
mod descriptor;
mod errors;
mod role;

pub use config::PfsConfig;
pub use descriptor::{PfsDescriptor, MAX_CLUSTER};
pub use errors::{PfsError, PfsResult};
pub use role::PfsRole;
