//! CLI argument definitions for ovs-inspect
//!
//! This module contains all clap-derived structs and enums for CLI parsing.

mod containers;
mod core;
mod daemon;

pub use containers::ContainerCommand;
pub use core::{Cli, Commands, TargetArgs};
pub use daemon::DaemonCommand;
