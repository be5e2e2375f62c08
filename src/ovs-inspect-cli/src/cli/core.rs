//! Core CLI definitions

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

use super::containers::ContainerCommand;
use super::daemon::DaemonCommand;

#[derive(Parser)]
#[command(name = "ovs-inspect")]
#[command(
    about = "Walk Open vSwitch daemon state in a live process or core dump",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub target: TargetArgs,

    /// More log output on stderr (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where to read target memory from, and how to interpret it
#[derive(Args, Debug, Default, Clone)]
pub struct TargetArgs {
    /// Attach to this process ID
    #[arg(long, global = true)]
    pub pid: Option<u32>,

    /// Attach to the first process with this name (uses configured default,
    /// then ovs-vswitchd)
    #[arg(long, global = true)]
    pub process: Option<String>,

    /// Read from a memory dump file instead of a live process
    #[arg(long, short = 'd', global = true)]
    pub dump: Option<PathBuf>,

    /// Path to maps file for dump (optional, defaults to <dump>.maps)
    #[arg(long, global = true)]
    pub maps: Option<PathBuf>,

    /// Layout file for the target build (YAML, JSON or TOML)
    #[arg(long, short = 'l', global = true, env = "OVS_INSPECT_LAYOUT")]
    pub layout: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Configure default settings
    #[command(visible_alias = "c")]
    Configure {
        /// Set default layout file
        #[arg(long)]
        layout: Option<PathBuf>,

        /// Set default process name
        #[arg(long)]
        process: Option<String>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },

    /// Show info about the attached process or dump
    #[command(visible_alias = "i")]
    Info,

    /// Read raw memory as a hex dump
    #[command(visible_alias = "r")]
    Read {
        /// Address (hex or decimal) or symbol name
        address: String,

        /// Number of bytes to read
        #[arg(short, long, default_value = "64")]
        size: usize,
    },

    #[command(flatten)]
    Container(ContainerCommand),

    #[command(flatten)]
    Daemon(DaemonCommand),
}

/// Parse a hex (`0x`) or decimal length argument
pub(crate) fn parse_len(s: &str) -> Result<u64, String> {
    ovs_inspect::parse_number(s).ok_or_else(|| format!("'{}' is not a number", s))
}
