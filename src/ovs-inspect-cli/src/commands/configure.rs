//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting up ovs-inspect defaults.

use crate::config::Config;
use anyhow::Result;
use std::io::Write;
use std::path::PathBuf;

/// Handle the configure command
pub fn handle(layout: Option<PathBuf>, process: Option<String>, show: bool) -> Result<()> {
    let path = Config::config_path()?;
    let mut config = Config::load_from(&path)?;
    let mut out = std::io::stdout().lock();

    if show {
        return show_config(&mut out, &config, Some(&path));
    }

    if layout.is_none() && process.is_none() {
        return show_usage(&mut out);
    }

    apply(&mut config, layout, process);
    config.save_to(&path)?;
    show_config(&mut out, &config, Some(&path))
}

fn apply(config: &mut Config, layout: Option<PathBuf>, process: Option<String>) {
    if let Some(layout) = layout {
        config.layout = Some(std::fs::canonicalize(&layout).unwrap_or(layout));
    }
    if let Some(process) = process {
        config.process = Some(process);
    }
}

/// Display current configuration
fn show_config(out: &mut dyn Write, config: &Config, path: Option<&PathBuf>) -> Result<()> {
    match &config.layout {
        Some(layout) => writeln!(out, "Layout: {}", layout.display())?,
        None => writeln!(out, "No layout configured (built-in container types only)")?,
    }
    match &config.process {
        Some(process) => writeln!(out, "Process: {}", process)?,
        None => writeln!(out, "Process: {} (default)", ovs_inspect::DEFAULT_PROCESS_NAME)?,
    }
    if let Some(path) = path {
        writeln!(out, "Config file: {}", path.display())?;
    }
    Ok(())
}

/// Show usage help for the configure command
fn show_usage(out: &mut dyn Write) -> Result<()> {
    writeln!(out, "Usage: ovs-inspect configure --layout FILE [--process NAME]")?;
    writeln!(out, "   or: ovs-inspect configure --show")?;
    writeln!(out)?;
    writeln!(out, "Note: the layout file describes the daemon's structs and globals")?;
    writeln!(out, "      for one build and is merged over the built-in container types.")?;
    Ok(())
}
