//! Userspace datapath (`dp_netdev`) and datapath provider listing

use anyhow::Result;
use ovs_inspect::{CmapIter, HmapIter, Oracle, Projection, ShashIter, TypedAddress};
use std::io::Write;

use super::render;
use crate::target::{global, resolve_address};

/// List `dp_netdevs`, optionally with each datapath's ports
pub fn dp_netdevs(oracle: &dyn Oracle, out: &mut dyn Write, ports: bool) -> Result<()> {
    let dp_netdevs = global(oracle, "dp_netdevs")?;

    for entry in ShashIter::new(oracle, dp_netdevs.address(), Some("struct dp_netdev"))? {
        let dp = entry?.data;
        writeln!(
            out,
            "{}: name = {}, class = (struct dpif_class *) {:#x}",
            dp,
            dp.string(oracle, "name")?,
            dp.pointer(oracle, "class")?
        )?;

        if ports {
            for port in port_iter(oracle, &dp)? {
                show_port(oracle, out, &port?, 4)?;
            }
        }
    }
    Ok(())
}

/// List the ports of the `dp_netdev` at `address`
pub fn dp_netdev_ports(oracle: &dyn Oracle, out: &mut dyn Write, address: &str) -> Result<()> {
    let dp = TypedAddress::new(resolve_address(oracle, address)?, "struct dp_netdev");
    for port in port_iter(oracle, &dp)? {
        show_port(oracle, out, &port?, 0)?;
    }
    Ok(())
}

/// List the PMD threads of the `dp_netdev` at `address`
pub fn poll_threads(oracle: &dyn Oracle, out: &mut dyn Write, address: &str) -> Result<()> {
    let dp = TypedAddress::new(resolve_address(oracle, address)?, "struct dp_netdev");
    let threads = dp.field_address(oracle, "poll_threads")?;
    let projection = Projection::container_of("struct dp_netdev_pmd_thread", "node");

    for pmd in CmapIter::new(oracle, threads, projection) {
        let pmd = pmd?;
        writeln!(
            out,
            "{}: core_id = {}, numa_id {}",
            pmd,
            render::field(oracle, &pmd, "core_id")?,
            render::field(oracle, &pmd, "numa_id")?
        )?;
    }
    Ok(())
}

/// List registered datapath classes (`dpif_classes`)
pub fn providers(oracle: &dyn Oracle, out: &mut dyn Write) -> Result<()> {
    let classes = global(oracle, "dpif_classes")?;

    for entry in ShashIter::new(oracle, classes.address(), Some("struct registered_dpif_class"))? {
        let registered = entry?.data;
        let class = registered.deref(oracle, "dpif_class")?;
        writeln!(
            out,
            "{}: (struct dpif_class *) {:#x} = {{type = {}, ...}}, refcount = {}",
            registered,
            class.address(),
            class.string(oracle, "type")?,
            render::field(oracle, &registered, "refcount")?
        )?;
    }
    Ok(())
}

fn port_iter<'a>(oracle: &'a dyn Oracle, dp: &TypedAddress) -> Result<HmapIter<'a>> {
    let ports = dp.field_address(oracle, "ports")?;
    Ok(HmapIter::new(
        oracle,
        ports,
        Projection::container_of("struct dp_netdev_port", "node"),
    ))
}

fn show_port(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    port: &TypedAddress,
    indent: usize,
) -> Result<()> {
    let pad = " ".repeat(indent);
    writeln!(out, "{}{}:", pad, port)?;
    writeln!(
        out,
        "{}    port_no = {}, n_rxq = {}, type = {}",
        pad,
        render::field(oracle, port, "port_no")?,
        render::field(oracle, port, "n_rxq")?,
        port.string(oracle, "type")?
    )?;

    let netdev = port.deref(oracle, "netdev")?;
    writeln!(
        out,
        "{}    netdev = {}: name = {}, n_txq/rxq = {}/{}",
        pad,
        netdev,
        netdev.string(oracle, "name")?,
        render::field(oracle, &netdev, "n_txq")?,
        render::field(oracle, &netdev, "n_rxq")?
    )?;
    Ok(())
}
