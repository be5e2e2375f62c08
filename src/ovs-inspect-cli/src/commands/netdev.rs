//! Netdev and netdev provider listing

use anyhow::Result;
use ovs_inspect::{container_of, CmapIter, Oracle, Projection, ShashIter, TypedAddress};
use std::io::Write;
use tracing::debug;

use super::render;
use crate::target::global;

/// List `netdev_shash`
pub fn netdevs(oracle: &dyn Oracle, out: &mut dyn Write) -> Result<()> {
    let netdev_shash = global(oracle, "netdev_shash")?;

    for entry in ShashIter::new(oracle, netdev_shash.address(), Some("struct netdev"))? {
        let netdev = entry?.data;
        writeln!(
            out,
            "{}: name = {:15}, auto_classified = {}, netdev_class = {:#x}",
            netdev,
            netdev.string(oracle, "name")?,
            render::field(oracle, &netdev, "auto_classified")?,
            netdev.pointer(oracle, "netdev_class")?
        )?;
    }
    Ok(())
}

/// List `netdev_classes`, showing the vport wrapper of tunnel classes
pub fn providers(oracle: &dyn Oracle, out: &mut dyn Write) -> Result<()> {
    let classes = global(oracle, "netdev_classes")?;
    let vport_construct = match oracle.resolve_symbol("netdev_vport_construct") {
        Ok(symbol) => Some(symbol.address),
        Err(e) => {
            debug!(error = %e, "vport classes will not be recognised");
            None
        }
    };
    let projection = Projection::container_of("struct netdev_registered_class", "cmap_node");

    for registered in CmapIter::new(oracle, classes.address(), projection) {
        let registered = registered?;
        writeln!(
            out,
            "{}: refcnt = {},",
            registered,
            render::field(oracle, &registered, "refcnt")?
        )?;

        let class = registered.deref(oracle, "class")?;
        writeln!(
            out,
            "    (struct netdev_class *) {:#x} = {{type = {}, is_pmd = {}, ...}}, ",
            class.address(),
            class.string(oracle, "type")?,
            render::field(oracle, &class, "is_pmd")?
        )?;

        if let Some(construct) = vport_construct {
            if class.pointer(oracle, "construct")? == construct {
                show_vport(oracle, out, &class)?;
            }
        }
    }
    Ok(())
}

fn show_vport(oracle: &dyn Oracle, out: &mut dyn Write, class: &TypedAddress) -> Result<()> {
    let vport = container_of(class.address(), oracle, "struct vport_class", "netdev_class")?;
    let dpif_port = match vport.string(oracle, "dpif_port")? {
        port if port.is_empty() => "\"\"".to_string(),
        port => port,
    };
    writeln!(
        out,
        "    (struct vport_class *) {:#x} = {{ dpif_port = {}, ... }}",
        vport.address(),
        dpif_port
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::{Fixture, NETDEV_CLASSES, NETDEV_SHASH, NETDEV_VPORT_CONSTRUCT};

    #[test]
    fn test_netdevs() {
        let mut fx = Fixture::new();
        let netdev = fx.alloc(0x20);
        let name = fx.string("br-int");
        fx.write_u64(netdev, name);
        fx.write_u64(netdev + 8, 0x5555_5540_9000);
        fx.write_u8(netdev + 16, 1);
        fx.string_map(NETDEV_SHASH, &[("br-int", netdev)]);

        let text = fx.run(|oracle, out| netdevs(oracle, out));
        assert_eq!(
            text,
            format!(
                "(struct netdev *) {:#x}: name = br-int         , auto_classified = true, netdev_class = 0x555555409000\n",
                netdev
            )
        );
    }

    #[test]
    fn test_providers_with_vport() {
        let mut fx = Fixture::new();

        let system = fx.alloc(0x100);
        let ty = fx.string("system");
        fx.write_u64(system, ty);
        let registered_system = fx.alloc(0x18);
        fx.write_u64(registered_system + 8, system);
        fx.write_u32(registered_system + 16, 1);

        let vport = fx.alloc(0x110);
        let geneve = vport + 0x10;
        let ty = fx.string("geneve");
        fx.write_u64(geneve, ty);
        fx.write_u64(geneve + 0x40, NETDEV_VPORT_CONSTRUCT);
        let dpif_port = fx.string("genev_sys");
        fx.write_u64(vport, dpif_port);
        let registered_geneve = fx.alloc(0x18);
        fx.write_u64(registered_geneve + 8, geneve);
        fx.write_u32(registered_geneve + 16, 2);

        fx.cmap(NETDEV_CLASSES, &[registered_system, registered_geneve]);

        let text = fx.run(|oracle, out| providers(oracle, out));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(
            lines[0],
            format!(
                "(struct netdev_registered_class *) {:#x}: refcnt = {{count = 1}},",
                registered_system
            )
        );
        assert_eq!(
            lines[1],
            format!(
                "    (struct netdev_class *) {:#x} = {{type = system, is_pmd = false, ...}}, ",
                system
            )
        );
        assert!(lines[3].contains("{type = geneve, is_pmd = false, ...}"));
        assert_eq!(
            lines[4],
            format!("    (struct vport_class *) {:#x} = {{ dpif_port = genev_sys, ... }}", vport)
        );
    }
}
