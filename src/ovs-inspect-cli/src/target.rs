//! Opening the inspection target
//!
//! A target is a memory source (live process or dump) paired with the
//! layout describing it.

use anyhow::{Context, Result};
use ovs_inspect::{
    parse_number, DumpFile, Inspector, Layout, LiveProcess, MemorySource, Oracle, TypedAddress,
    DEFAULT_PROCESS_NAME,
};
use tracing::{debug, warn};

use crate::cli::TargetArgs;
use crate::config::Config;

pub type Target = Inspector<Box<dyn MemorySource>>;

/// An opened target plus a human readable description of its source
pub struct Session {
    pub oracle: Target,
    pub summary: String,
}

/// Open the memory source and layout selected on the command line
pub fn open(args: &TargetArgs, config: &Config) -> Result<Session> {
    let (source, summary): (Box<dyn MemorySource>, String) = if let Some(dump_path) = &args.dump {
        let dump = if let Some(maps_path) = &args.maps {
            DumpFile::open_with_maps(dump_path, maps_path)
                .context("Failed to open dump file with maps")?
        } else {
            DumpFile::open(dump_path).context("Failed to open dump file")?
        };
        let summary = format!(
            "Dump: {}\nMemory Regions: {}",
            dump.path.display(),
            dump.regions().len()
        );
        (Box::new(dump), summary)
    } else {
        let process = match args.pid {
            Some(pid) => LiveProcess::attach(pid)?,
            None => {
                let name = args
                    .process
                    .as_deref()
                    .or(config.process.as_deref())
                    .unwrap_or(DEFAULT_PROCESS_NAME);
                LiveProcess::attach_by_name(name)
                    .with_context(|| format!("Failed to attach to {}", name))?
            }
        };
        let summary = process.info();
        (Box::new(process), summary)
    };

    let oracle = with_layout(args, config, source)?;
    Ok(Session { oracle, summary })
}

fn with_layout(
    args: &TargetArgs,
    config: &Config,
    source: Box<dyn MemorySource>,
) -> Result<Target> {
    match args.layout.as_ref().or(config.layout.as_ref()) {
        Some(path) => {
            debug!(layout = %path.display(), "loading layout");
            Inspector::with_layout_file(path, source)
                .with_context(|| format!("Failed to load layout {}", path.display()))
        }
        None => {
            warn!("no layout file given, only the built-in container types are known");
            Ok(Inspector::new(Layout::builtin()?, source))
        }
    }
}

/// Parse an address argument: a hex/decimal literal or a global symbol
/// (optionally written `&name`)
pub fn resolve_address(oracle: &dyn Oracle, text: &str) -> Result<u64> {
    let text = text.trim();
    if let Some(address) = parse_number(text) {
        return Ok(address);
    }
    let name = text.trim_start_matches('&');
    let symbol = oracle
        .resolve_symbol(name)
        .with_context(|| format!("'{}' is neither an address nor a known symbol", text))?;
    Ok(symbol.address)
}

/// A global variable, typed by its layout entry
pub fn global(oracle: &dyn Oracle, name: &str) -> Result<TypedAddress> {
    let symbol = oracle.resolve_symbol(name)?;
    Ok(TypedAddress::new(symbol.address, symbol.type_name))
}
