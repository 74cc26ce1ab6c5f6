//! Command-line options

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Format of diagnostic events on standard error
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Options of the bridge process
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    #[arg(short, long, help = "Only log errors")]
    pub quiet: bool,

    #[arg(short, long, action = clap::ArgAction::Count, help = "Increase verbosity (-v for debug, -vv for trace and engine output)")]
    pub verbose: u8,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, help = "Format of diagnostic events")]
    pub log_format: LogFormat,

    #[arg(long, value_name = "DIR", help = "Path of Building checkout (overrides POB_PATH)")]
    pub pob_path: Option<PathBuf>,

    #[arg(long, value_name = "DIR", help = "Builds directory (overrides POB_BUILDS_PATH)")]
    pub builds_path: Option<PathBuf>,

    #[arg(long, value_name = "FILE", help = "Configuration file (overrides POB_BRIDGE_CONFIG)")]
    pub config: Option<PathBuf>,
}

impl GlobalOpts {
    /// Get the effective verbosity level
    /// - 0: warn
    /// - 1: debug (-v)
    /// - 2: trace (-vv)
    pub fn verbosity_level(&self) -> u8 {
        if self.quiet {
            0
        } else {
            self.verbose
        }
    }
}
