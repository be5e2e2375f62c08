//! Upcall handler state: udpifs, their ukey maps and revalidators

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use ovs_inspect::{
    cmap_count, member_of, names::N_UMAPS, CmapIter, ListIter, Oracle, Projection, TypedAddress,
};
use std::io::Write;

use super::render;
use crate::target::{global, resolve_address};

/// Every udpif on `all_udpifs`, with its datapath name
fn all_udpifs(oracle: &dyn Oracle) -> Result<Vec<(String, TypedAddress)>> {
    let head = global(oracle, "all_udpifs")?;
    let projection = Projection::container_of("struct udpif", "list_node");

    let mut udpifs = Vec::new();
    for udpif in ListIter::new(oracle, head.address(), projection) {
        let udpif = udpif?;
        let name = udpif.deref(oracle, "dpif")?.string(oracle, "full_name")?;
        udpifs.push((name, udpif));
    }
    Ok(udpifs)
}

/// The `index`th `struct umap` of `udpif.ukeys` and the address of its cmap
fn umap(oracle: &dyn Oracle, udpif: &TypedAddress, index: usize) -> Result<(TypedAddress, u64)> {
    let ukeys = udpif.pointer(oracle, "ukeys")?;
    let stride = oracle.resolve_type("struct umap")?.size;
    let address = ukeys.wrapping_add(stride.wrapping_mul(index as u64));
    let cmap = member_of(address, oracle, "struct umap", "cmap")?;
    Ok((TypedAddress::new(address, "struct umap"), cmap))
}

fn umap_progress(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(N_UMAPS as u64).with_message(message);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner} {msg} [{bar:30}] {pos}/{len}")
    {
        pb.set_style(style);
    }
    pb
}

/// Total ukeys over all umaps of `udpif`
fn count_ukeys(oracle: &dyn Oracle, udpif: &TypedAddress) -> Result<u64> {
    let pb = umap_progress("Counting all ukeys");
    let mut count = 0;
    for index in 0..N_UMAPS {
        let (_, cmap) = umap(oracle, udpif, index)?;
        count += cmap_count(oracle, cmap)?;
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(count)
}

/// List all udpifs, or dump the ukeys of the one named (or at the address)
/// `target`
pub fn keys(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    target: Option<&str>,
    short: bool,
    no_count: bool,
) -> Result<()> {
    let udpifs = all_udpifs(oracle)?;

    let Some(target) = target else {
        for (name, udpif) in &udpifs {
            let total = if no_count {
                "<not counted!>".to_string()
            } else {
                count_ukeys(oracle, udpif)?.to_string()
            };
            writeln!(out, "{}: name = {}, total keys = {}", udpif, name, total)?;
        }
        return Ok(());
    };

    let udpif = match udpifs.into_iter().find(|(name, _)| name == target) {
        Some((_, udpif)) => udpif,
        None => {
            let address = resolve_address(oracle, target).context("Can't find provided udpif")?;
            TypedAddress::new(address, "struct udpif")
        }
    };
    dump_ukeys(oracle, out, &udpif, short)
}

fn dump_ukeys(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    udpif: &TypedAddress,
    short: bool,
) -> Result<()> {
    let pb = umap_progress("Walking ukeys");
    for index in 0..N_UMAPS {
        pb.inc(1);
        let (umap, cmap) = umap(oracle, udpif, index)?;
        if cmap_count(oracle, cmap)? == 0 {
            continue;
        }
        pb.suspend(|| -> Result<()> {
            writeln!(out, "{}:", umap)?;
            let projection = Projection::container_of("struct udpif_key", "cmap_node");
            for ukey in CmapIter::new(oracle, cmap, projection) {
                show_ukey(oracle, out, &ukey?, short)?;
            }
            Ok(())
        })?;
    }
    pb.finish_and_clear();
    Ok(())
}

fn show_ukey(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    ukey: &TypedAddress,
    short: bool,
) -> Result<()> {
    let base = format!("  {}: ", ukey);
    if short {
        writeln!(out, "{}", base)?;
        return Ok(());
    }

    writeln!(
        out,
        "{}key_len = {}, mask_len = {}",
        base,
        render::field(oracle, ukey, "key_len")?,
        render::field(oracle, ukey, "mask_len")?
    )?;

    let pad = " ".repeat(base.len());
    if ukey.uint(oracle, "ufid_present")? != 0 {
        let mut words = [0u32; 4];
        for (i, word) in words.iter_mut().enumerate() {
            *word = ukey.uint(oracle, &format!("ufid.u32[{}]", i))? as u32;
        }
        writeln!(out, "{}ufid = {}", pad, format_ufid(words))?;
    }

    writeln!(
        out,
        "{}hash = 0x{:8x}, pmd_id = {}",
        pad,
        ukey.uint(oracle, "hash")?,
        render::field(oracle, ukey, "pmd_id")?
    )?;

    let state = ukey.uint(oracle, "state")?;
    let state = oracle
        .enum_name("ukey_state", state)
        .unwrap_or_else(|| state.to_string());
    writeln!(out, "{}state = {}", pad, state)?;

    writeln!(
        out,
        "{}n_packets = {}, n_bytes = {}",
        pad,
        render::field(oracle, ukey, "stats.n_packets")?,
        render::field(oracle, ukey, "stats.n_bytes")?
    )?;
    writeln!(
        out,
        "{}used = {}, tcp_flags = 0x{:04x}",
        pad,
        render::field(oracle, ukey, "stats.used")?,
        ukey.uint(oracle, "stats.tcp_flags")?
    )?;
    Ok(())
}

/// A ufid as the UUID the datapath prints, most significant word first
fn format_ufid(words: [u32; 4]) -> String {
    let hex = format!(
        "{:08x}{:08x}{:08x}{:08x}",
        words[3], words[2], words[1], words[0]
    );
    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// Show flow counts and per-revalidator key counts for every udpif
pub fn upcall(oracle: &dyn Oracle, out: &mut dyn Write, dbg: bool) -> Result<()> {
    let enable_ufid = global(oracle, "enable_ufid")?;
    let enable_ufid = oracle.read_uint(enable_ufid.address(), 1)? != 0;

    for (name, udpif) in all_udpifs(oracle)? {
        let dbg_str = if dbg { format!(", ({})", udpif) } else { String::new() };
        writeln!(out, "{}{}:", name, dbg_str)?;

        writeln!(
            out,
            "  flows         : (current {}) (avg {}) (max {}) (limit {})",
            render::field(oracle, &udpif, "n_flows")?,
            render::field(oracle, &udpif, "avg_n_flows")?,
            render::field(oracle, &udpif, "max_n_flows")?,
            render::field(oracle, &udpif, "flow_limit")?
        )?;
        writeln!(
            out,
            "  dump duration : {}ms",
            render::field(oracle, &udpif, "dump_duration")?
        )?;
        let backer_ufid = udpif.deref(oracle, "backer")?.uint(oracle, "rt_support.ufid")? != 0;
        writeln!(out, "  ufid enabled  : {}\n", enable_ufid && backer_ufid)?;

        let n_revalidators = udpif.uint(oracle, "n_revalidators")? as usize;
        let revalidators = udpif.pointer(oracle, "revalidators")?;
        let stride = oracle.resolve_type("struct revalidator")?.size;

        for i in 0..n_revalidators {
            let revalidator = TypedAddress::new(
                revalidators.wrapping_add(stride.wrapping_mul(i as u64)),
                "struct revalidator",
            );

            // Revalidator i owns umaps i, i + n, i + 2n, ...
            let mut count = 0;
            for index in (i..N_UMAPS).step_by(n_revalidators) {
                let (_, cmap) = umap(oracle, &udpif, index)?;
                count += cmap_count(oracle, cmap)?;
            }

            let dbg_str = if dbg { format!(", ({})", revalidator) } else { String::new() };
            writeln!(
                out,
                "  {}: (keys {}){}",
                render::field(oracle, &revalidator, "id")?,
                count,
                dbg_str
            )?;
        }
        writeln!(out)?;
    }
    Ok(())
}
