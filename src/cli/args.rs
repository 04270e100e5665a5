//! CLI argument definitions using clap
//!
//! Commands:
//! - pfscluster check --config <path> --snapshot <path> --key <key> [--absence]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pfscluster - quorum resolution over replicated filesystem nodes
#[derive(Parser, Debug)]
#[command(name = "pfscluster")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve one key against a recorded replica snapshot
    Check {
        /// Path to the PFS configuration file
        #[arg(long, default_value = "./pfs.json")]
        config: PathBuf,

        /// Path to the replica snapshot
        #[arg(long)]
        snapshot: PathBuf,

        /// Key to resolve (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = parse_key)]
        key: u64,

        /// Let deliberately absent replicas vote (scan mode)
        #[arg(long)]
        absence: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}

/// Parse a key given in decimal or `0x` hex.
pub fn parse_key(s: &str) -> Result<u64, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse::<u64>(),
    };
    parsed.map_err(|e| format!("invalid key '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key("4096"), Ok(4096));
        assert_eq!(parse_key("0x1000"), Ok(4096));
        assert_eq!(parse_key("0XfF"), Ok(255));
        assert!(parse_key("0xzz").is_err());
        assert!(parse_key("").is_err());
    }

    #[test]
    fn test_parse_check_command() {
        let cli = Cli::try_parse_from([
            "pfscluster",
            "check",
            "--snapshot",
            "slots.json",
            "--key",
            "0x10",
            "--absence",
        ])
        .unwrap();

        match cli.command {
            Command::Check {
                config,
                snapshot,
                key,
                absence,
            } => {
                assert_eq!(config, PathBuf::from("./pfs.json"));
                assert_eq!(snapshot, PathBuf::from("slots.json"));
                assert_eq!(key, 0x10);
                assert!(absence);
            }
        }
    }
}
