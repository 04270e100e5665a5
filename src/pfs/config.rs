//! PFS configuration file
//!
//! A JSON document describing the replica set of one mount:
//!
//! ```json
//! {
//!   "cluster_id": "3f0c6f5e-8f43-4a55-9d1b-6c0c1b1b2f10",
//!   "roles": ["master", "master", "slave"],
//!   "master_count": 3
//! }
//! ```
//!
//! `cluster_id` and `master_count` are optional. Loaded once at mount
//! time, immutable afterwards.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::descriptor::PfsDescriptor;
use super::errors::PfsResult;
use super::role::PfsRole;
use crate::observability::{log_event_with_fields, Event};

/// On-disk PFS configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PfsConfig {
    /// Cluster identifier (generated if absent)
    #[serde(default)]
    pub cluster_id: Option<Uuid>,

    /// Role of each slot, in slot order
    pub roles: Vec<PfsRole>,

    /// Configured master count (defaults to the masters listed)
    #[serde(default)]
    pub master_count: Option<usize>,
}

impl PfsConfig {
    /// Load and validate a configuration file.
    pub fn load(path: &Path) -> PfsResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_json(&content)?;

        let path_str = path.display().to_string();
        let roles = config.roles.len().to_string();
        log_event_with_fields(
            Event::PfsConfigLoaded,
            &[("path", path_str.as_str()), ("roles", roles.as_str())],
        );

        Ok(config)
    }

    /// Parse and validate a configuration document.
    pub fn from_json(content: &str) -> PfsResult<Self> {
        let config: PfsConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate by building the descriptor it describes.
    pub fn validate(&self) -> PfsResult<()> {
        self.to_descriptor().map(|_| ())
    }

    /// Build the immutable descriptor.
    pub fn to_descriptor(&self) -> PfsResult<PfsDescriptor> {
        PfsDescriptor::new(
            self.cluster_id.unwrap_or_else(Uuid::new_v4),
            self.roles.clone(),
            self.master_count,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pfs::PfsError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_minimal_config() {
        let config = PfsConfig::from_json(r#"{"roles": ["master", "master", "slave"]}"#).unwrap();
        assert_eq!(config.roles.len(), 3);
        assert!(config.cluster_id.is_none());

        let d = config.to_descriptor().unwrap();
        assert_eq!(d.master_count(), 2);
        assert_eq!(d.role(2), PfsRole::Slave);
    }

    #[test]
    fn test_parse_full_config() {
        let id = Uuid::new_v4();
        let json = format!(
            r#"{{"cluster_id": "{}", "roles": ["super_root"], "master_count": 1}}"#,
            id
        );
        let config = PfsConfig::from_json(&json).unwrap();
        assert_eq!(config.to_descriptor().unwrap().cluster_id(), id);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let err = PfsConfig::from_json(r#"{"roles": ["witness"]}"#).unwrap_err();
        assert!(matches!(err, PfsError::Parse(_)));
    }

    #[test]
    fn test_validation_runs_on_parse() {
        let err = PfsConfig::from_json(r#"{"roles": ["master", "master"], "master_count": 1}"#)
            .unwrap_err();
        assert_eq!(err.code(), "PFS_CONFIG_MASTER_COUNT");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"roles": ["master", "soft_slave"]}}"#).unwrap();

        let config = PfsConfig::load(file.path()).unwrap();
        assert_eq!(config.roles, vec![PfsRole::Master, PfsRole::SoftSlave]);
    }

    #[test]
    fn test_load_missing_file() {
        let err = PfsConfig::load(Path::new("/nonexistent/pfs.json")).unwrap_err();
        assert!(matches!(err, PfsError::Io(_)));
    }
}
