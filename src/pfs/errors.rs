//! PFS configuration errors

use thiserror::Error;

/// Result type for PFS configuration
pub type PfsResult<T> = Result<T, PfsError>;

/// Errors raised while loading or validating a PFS configuration
#[derive(Debug, Error)]
pub enum PfsError {
    /// Configuration file could not be read
    #[error("failed to read PFS config: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is not valid JSON for the expected shape
    #[error("invalid PFS config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// No slots configured
    #[error("PFS config lists no roles")]
    NoRoles,

    /// More slots than a cluster can hold
    #[error("PFS config lists {count} roles, at most {max} allowed")]
    TooManyRoles { count: usize, max: usize },

    /// Configured master count is below the masters actually listed
    #[error("master_count {configured} is below the {listed} master slots listed")]
    MasterCountTooLow { configured: usize, listed: usize },
}

impl PfsError {
    /// Stable error code string.
    pub fn code(&self) -> &'static str {
        match self {
            PfsError::Io(_) => "PFS_CONFIG_IO",
            PfsError::Parse(_) => "PFS_CONFIG_PARSE",
            PfsError::NoRoles => "PFS_CONFIG_NO_ROLES",
            PfsError::TooManyRoles { .. } => "PFS_CONFIG_TOO_MANY_ROLES",
            PfsError::MasterCountTooLow { .. } => "PFS_CONFIG_MASTER_COUNT",
        }
    }
}
