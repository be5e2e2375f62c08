//! Generic container walk commands
//!
//! Each command walks one container and prints every element as a typed
//! address, optionally followed by the full record.

use anyhow::Result;
use ovs_inspect::{
    names::{NLATTR, OFPACT},
    AttrIter, CmapIter, HmapIter, ListIter, Oracle, Projection, SimapIter, SmapIter,
    TypedAddress,
};
use std::collections::BTreeMap;
use std::io::Write;

use super::render;
use crate::target::resolve_address;

fn projection(type_name: Option<&str>, member: Option<&str>) -> Projection {
    match (type_name, member) {
        (Some(type_name), Some(member)) => Projection::container_of(type_name, member),
        _ => Projection::Node,
    }
}

fn show_element(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    element: &TypedAddress,
    dump: bool,
) -> Result<()> {
    if dump {
        writeln!(out, "{} =", element)?;
        writeln!(
            out,
            "  {}\n",
            render::record(oracle, element.address(), element.type_name())?
        )?;
    } else {
        writeln!(out, "{}", element)?;
    }
    Ok(())
}

pub fn hmap(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    address: &str,
    type_name: &str,
    member: &str,
    dump: bool,
) -> Result<()> {
    let map = resolve_address(oracle, address)?;
    for element in HmapIter::new(oracle, map, Projection::container_of(type_name, member)) {
        show_element(oracle, out, &element?, dump)?;
    }
    Ok(())
}

pub fn cmap(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    address: &str,
    type_name: Option<&str>,
    member: Option<&str>,
    dump: bool,
) -> Result<()> {
    let map = resolve_address(oracle, address)?;
    for element in CmapIter::new(oracle, map, projection(type_name, member)) {
        show_element(oracle, out, &element?, dump)?;
    }
    Ok(())
}

pub fn list(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    address: &str,
    type_name: Option<&str>,
    member: Option<&str>,
    dump: bool,
) -> Result<()> {
    let head = resolve_address(oracle, address)?;
    for element in ListIter::new(oracle, head, projection(type_name, member)) {
        show_element(oracle, out, &element?, dump)?;
    }
    Ok(())
}

/// Print `name: value / 0xvalue`, sorted by name
pub fn simap(oracle: &dyn Oracle, out: &mut dyn Write, address: &str) -> Result<()> {
    let simap = resolve_address(oracle, address)?;
    let entries = SimapIter::new(oracle, simap)?.collect::<ovs_inspect::Result<BTreeMap<_, _>>>()?;
    let width = entries.keys().map(String::len).max().unwrap_or(0);
    for (name, value) in &entries {
        writeln!(out, "{:<width$}: {} / 0x{:x}", name, value, value, width = width)?;
    }
    Ok(())
}

/// Print `key: value`, sorted by key
pub fn smap(oracle: &dyn Oracle, out: &mut dyn Write, address: &str) -> Result<()> {
    let smap = resolve_address(oracle, address)?;
    let entries = SmapIter::new(oracle, smap)?.collect::<ovs_inspect::Result<BTreeMap<_, _>>>()?;
    let width = entries.keys().map(String::len).max().unwrap_or(0);
    for (key, value) in &entries {
        writeln!(out, "{:<width$}: {}", key, value, width = width)?;
    }
    Ok(())
}

pub fn nla(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    address: &str,
    len: u64,
    dump: bool,
    enum_name: Option<&str>,
) -> Result<()> {
    let base = resolve_address(oracle, address)?;
    for attr in AttrIter::netlink(oracle, base, len) {
        let attr = attr?;
        let header = render::record(oracle, attr.address(), NLATTR)?;
        let name = match enum_name {
            Some(e) => {
                let ty = attr.netlink_type() as u64;
                let name = oracle.enum_name(e, ty).unwrap_or_else(|| ty.to_string());
                format!("[{}]", name)
            }
            None => String::new(),
        };
        write!(
            out,
            "{}:{} {}, nl_attr_get() = {:#x}",
            attr.header,
            name,
            header,
            attr.payload_address()
        )?;
        if dump {
            let payload = attr.payload(oracle)?;
            let bytes: Vec<String> = payload.chunks(1).map(hex::encode).collect();
            write!(out, ": {}", bytes.join(" "))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn ofpacts(oracle: &dyn Oracle, out: &mut dyn Write, address: &str, len: u64) -> Result<()> {
    let base = resolve_address(oracle, address)?;
    for action in AttrIter::ofpacts(oracle, base, len) {
        let action = action?;
        let record = render::record(oracle, action.address(), OFPACT)?;
        match oracle.enum_name("ofpact_type", action.tag) {
            Some(name) => writeln!(out, "{}: [{}] {}", action.header, name, record)?,
            None => writeln!(out, "{}: {}", action.header, record)?,
        }
    }
    Ok(())
}
