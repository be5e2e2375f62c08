//! MAC learning table (FDB) display

use anyhow::{Context, Result};
use ovs_inspect::{container_of, HmapIter, ListIter, Oracle, Projection, TypedAddress};
use std::collections::BTreeMap;
use std::io::Write;
use tracing::debug;

use super::render;
use crate::target::global;

/// Show a summary of every bridge's MAC table, or the entries of one
pub fn fdb(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    bridge: Option<&str>,
    dbg: bool,
    hash: bool,
) -> Result<()> {
    let by_name = ofprotos_by_name(oracle)?;

    let Some(bridge) = bridge else {
        let width = by_name.keys().map(String::len).max().unwrap_or(0);
        for (name, ofproto) in &by_name {
            let ml = ofproto.pointer(oracle, "ml")?;
            writeln!(out, "{:<width$}: (struct mac_learning *) {:#x}", name, ml, width = width)?;
            show_summary(oracle, out, ml, 4, false)?;
        }
        return Ok(());
    };

    let ofproto = by_name
        .get(bridge)
        .with_context(|| format!("Can't find bridge '{}'", bridge))?;
    let ml = ofproto.pointer(oracle, "ml")?;
    show_summary(oracle, out, ml, 0, dbg)?;
    show_entries(oracle, out, ml, hash, dbg)
}

fn ofprotos_by_name(oracle: &dyn Oracle) -> Result<BTreeMap<String, TypedAddress>> {
    let all = global(oracle, "all_ofproto_dpifs_by_name")?;
    let projection =
        Projection::container_of("struct ofproto_dpif", "all_ofproto_dpifs_by_name_node");

    let mut by_name = BTreeMap::new();
    for ofproto in HmapIter::new(oracle, all.address(), projection) {
        let ofproto = ofproto?;
        by_name.insert(ofproto.string(oracle, "up.name")?, ofproto);
    }
    Ok(by_name)
}

fn show_summary(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    ml: u64,
    indent: usize,
    dbg: bool,
) -> Result<()> {
    if ml == 0 {
        return Ok(());
    }
    let ml = TypedAddress::new(ml, "struct mac_learning");
    let pad = " ".repeat(indent);

    if dbg {
        writeln!(out, "[{}]", ml)?;
    }

    const ROWS: [(&str, &str); 12] = [
        ("table.n         ", "table.n"),
        ("secret          ", "secret"),
        ("idle_time       ", "idle_time"),
        ("max_entries     ", "max_entries"),
        ("ref_count       ", "ref_cnt.count"),
        ("need_revalidate ", "need_revalidate"),
        ("ports_by_ptr.n  ", "ports_by_ptr.n"),
        ("ports_by_usage.n", "ports_by_usage.n"),
        ("total_learned   ", "total_learned"),
        ("total_expired   ", "total_expired"),
        ("total_evicted   ", "total_evicted"),
        ("total_moved     ", "total_moved"),
    ];
    for (label, path) in ROWS {
        let value = if path == "secret" {
            format!("0x{:x}", ml.uint(oracle, path)?)
        } else {
            render::field(oracle, &ml, path)?
        };
        writeln!(out, "{}{}: {}", pad, label, value)?;
    }
    Ok(())
}

fn show_entries(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    ml: u64,
    hash: bool,
    dbg: bool,
) -> Result<()> {
    if ml == 0 {
        return Ok(());
    }
    let ml = TypedAddress::new(ml, "struct mac_learning");

    writeln!(out, "\nFDB \"{}\" table:", if hash { "hash" } else { "lrus" })?;
    writeln!(out, "port               VLAN  MAC                Age out @")?;
    writeln!(out, "-----------------  ----  -----------------  ---------")?;

    let entries: Box<dyn Iterator<Item = ovs_inspect::Result<TypedAddress>>> = if hash {
        Box::new(HmapIter::new(
            oracle,
            ml.field_address(oracle, "table")?,
            Projection::container_of("struct mac_entry", "hmap_node"),
        ))
    } else {
        Box::new(ListIter::new(
            oracle,
            ml.field_address(oracle, "lrus")?,
            Projection::container_of("struct mac_entry", "lru_node"),
        ))
    };

    let mut total = 0;
    for entry in entries {
        show_entry(oracle, out, &entry?, dbg)?;
        total += 1;
    }
    writeln!(out, "\nTotal MAC entries: {}", total)?;

    let run_time = oracle
        .resolve_symbol("coverage_run_time")
        .and_then(|symbol| oracle.read_int(symbol.address, 8));
    match run_time {
        Ok(msec) => {
            let now = msec as f64 / 1000.0;
            writeln!(
                out,
                "\nCurrent time is between {} and {} seconds.\n",
                now - 5.0,
                now
            )?;
        }
        Err(e) => debug!(error = %e, "no run time available"),
    }
    Ok(())
}

fn show_entry(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    entry: &TypedAddress,
    dbg: bool,
) -> Result<()> {
    let (port_name, port_no) = port_name_num(oracle, entry)?;
    let mac = oracle.read_bytes(entry.field_address(oracle, "mac.ea")?, 6)?;
    let mac: Vec<String> = mac.iter().map(|b| format!("{:02x}", b)).collect();

    let mut line = format!(
        "{:16.16}  {:>4}  {}  {:>9}",
        format!("{}[{}]", port_no, port_name),
        entry.uint(oracle, "vlan")?,
        mac.join(":"),
        entry.int(oracle, "expires")?
    );
    if dbg {
        line.push_str(&format!(" [{}]", entry));
    }
    writeln!(out, "{}", line)?;
    Ok(())
}

/// Bundle name and OpenFlow port number of the port a MAC was learned on
fn port_name_num(oracle: &dyn Oracle, entry: &TypedAddress) -> Result<(String, String)> {
    let mlport = entry.deref(oracle, "mlport")?;
    if mlport.is_null() {
        return Ok(("-".to_string(), "?".to_string()));
    }

    let bundle = TypedAddress::new(mlport.pointer(oracle, "port")?, "struct ofbundle");
    let name = bundle.string(oracle, "name")?;
    let first = bundle.pointer(oracle, "ports.next")?;
    let ofport = container_of(first, oracle, "struct ofport_dpif", "bundle_node")?;
    let port_no = ofport.uint(oracle, "up.ofp_port")?;
    Ok((name, ofp_port_name(port_no)))
}

/// Reserved OpenFlow port numbers print by name
fn ofp_port_name(port: u64) -> String {
    match port {
        0xfff7 => "UNSET".to_string(),
        0xfff8 => "IN_PORT".to_string(),
        0xfff9 => "TABLE".to_string(),
        0xfffa => "NORMAL".to_string(),
        0xfffb => "FLOOD".to_string(),
        0xfffc => "ALL".to_string(),
        0xfffd => "CONTROLLER".to_string(),
        0xfffe => "LOCAL".to_string(),
        0xffff => "NONE".to_string(),
        n => n.to_string(),
    }
}
