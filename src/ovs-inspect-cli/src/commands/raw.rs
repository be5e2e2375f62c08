//! Target summary and raw memory command handlers

use anyhow::Result;
use ovs_inspect::{MemorySource, Oracle};
use std::io::Write;

use crate::target::{resolve_address, Session};

/// Handle the Info command
pub fn info(session: &Session, out: &mut dyn Write) -> Result<()> {
    let oracle = &session.oracle;
    let layout = oracle.layout();

    writeln!(out, "{}", session.summary)?;
    writeln!(out, "Live: {}", oracle.source().is_live())?;
    writeln!(out)?;
    writeln!(
        out,
        "Layout: pointer size {}, cache line {} ({} slots per cmap bucket)",
        layout.pointer_size(),
        layout.cache_line_size(),
        ovs_inspect::walk::slots_per_bucket(layout.pointer_size(), layout.cache_line_size())
    )?;
    writeln!(
        out,
        "  {} types, {} symbols, {} enums",
        layout.types.len(),
        layout.symbols.len(),
        layout.enums.len()
    )?;
    if let Some(module) = &layout.module {
        match oracle.source().module_base(module) {
            Some(base) => writeln!(out, "  Symbols relative to {} at {:#x}", module, base)?,
            None => writeln!(out, "  Symbols relative to {} (not mapped!)", module)?,
        }
    }
    Ok(())
}

/// Handle the Read command
///
/// Reads bytes from memory and displays them as a hex dump.
pub fn read(oracle: &dyn Oracle, out: &mut dyn Write, address: &str, size: usize) -> Result<()> {
    let addr = resolve_address(oracle, address)?;
    let data = oracle.read_bytes(addr, size)?;

    writeln!(out, "Reading {} bytes at {:#x}:", size, addr)?;
    hexdump(out, addr, &data)
}

fn hexdump(out: &mut dyn Write, addr: u64, data: &[u8]) -> Result<()> {
    for (i, chunk) in data.chunks(16).enumerate() {
        write!(out, "{:08x}  ", addr + i as u64 * 16)?;
        for j in 0..16 {
            match chunk.get(j) {
                Some(byte) => write!(out, "{:02x} ", byte)?,
                None => write!(out, "   ")?,
            }
            if j == 7 {
                write!(out, " ")?;
            }
        }
        write!(out, " |")?;
        for byte in chunk {
            let c = *byte as char;
            if c.is_ascii_graphic() || c == ' ' {
                write!(out, "{}", c)?;
            } else {
                write!(out, ".")?;
            }
        }
        writeln!(out, "|")?;
    }
    Ok(())
}
