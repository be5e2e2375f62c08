//! Bridge, port and interface listing

use anyhow::Result;
use ovs_inspect::{HmapIter, ListIter, Oracle, Projection, ShashIter, TypedAddress};
use std::io::Write;

use super::render;
use crate::target::{global, resolve_address};

/// List `all_bridges`, optionally with their ports and wanted ports
pub fn bridges(oracle: &dyn Oracle, out: &mut dyn Write, ports: bool, wanted: bool) -> Result<()> {
    let all_bridges = global(oracle, "all_bridges")?;
    let projection = Projection::container_of("struct bridge", "node");

    for bridge in HmapIter::new(oracle, all_bridges.address(), projection) {
        let bridge = bridge?;
        writeln!(
            out,
            "{}: name = {}, type = {}",
            bridge,
            bridge.string(oracle, "name")?,
            bridge.string(oracle, "type")?
        )?;

        if ports {
            for port in bridge_port_iter(oracle, &bridge)? {
                show_port(oracle, out, &port?, 4)?;
            }
        }

        if wanted {
            let wanted_ports = bridge.field_address(oracle, "wanted_ports")?;
            for entry in ShashIter::new(oracle, wanted_ports, Some("struct ovsrec_port"))? {
                let port = entry?.data;
                writeln!(out, "    {}: name = {}", port, port.string(oracle, "name")?)?;
            }
        }
    }
    Ok(())
}

/// List the ports of the bridge at `address`
pub fn bridge_ports(oracle: &dyn Oracle, out: &mut dyn Write, address: &str) -> Result<()> {
    let bridge = TypedAddress::new(resolve_address(oracle, address)?, "struct bridge");
    for port in bridge_port_iter(oracle, &bridge)? {
        show_port(oracle, out, &port?, 0)?;
    }
    Ok(())
}

fn bridge_port_iter<'a>(oracle: &'a dyn Oracle, bridge: &TypedAddress) -> Result<HmapIter<'a>> {
    let ports = bridge.field_address(oracle, "ports")?;
    Ok(HmapIter::new(
        oracle,
        ports,
        Projection::container_of("struct port", "hmap_node"),
    ))
}

fn show_port(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    port: &TypedAddress,
    indent: usize,
) -> Result<()> {
    let pad = " ".repeat(indent);
    writeln!(
        out,
        "{}{}: name = {}, bridge = (struct bridge *) {:#x}",
        pad,
        port,
        port.string(oracle, "name")?,
        port.pointer(oracle, "bridge")?
    )?;

    let ifaces = port.field_address(oracle, "ifaces")?;
    let projection = Projection::container_of("struct iface", "port_elem");
    for iface in ListIter::new(oracle, ifaces, projection) {
        let iface = iface?;
        writeln!(
            out,
            "{}    {}: name = {}, ofp_port = {}, netdev = (struct netdev *) {:#x}",
            pad,
            iface,
            iface.string(oracle, "name")?,
            render::field(oracle, &iface, "ofp_port")?,
            iface.pointer(oracle, "netdev")?
        )?;
    }
    Ok(())
}
