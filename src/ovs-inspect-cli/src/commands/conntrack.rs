//! Userspace conntrack connection listing

use anyhow::Result;
use ovs_inspect::{container_of, member_of, CmapIter, Oracle, Projection, TypedAddress};
use std::io::Write;

use super::render;
use crate::target::resolve_address;

/// List the connections of the `struct conntrack` at `address`
///
/// Each connection is linked into `conns` through one of its two key
/// nodes; the node's `dir` says which one, and so where the `struct conn`
/// starts.
pub fn conns(oracle: &dyn Oracle, out: &mut dyn Write, address: &str, short: bool) -> Result<()> {
    let conntrack = resolve_address(oracle, address)?;
    let map = member_of(conntrack, oracle, "struct conntrack", "conns")?;
    let projection = Projection::container_of("struct conn_key_node", "cm_node");

    for key_node in CmapIter::new(oracle, map, projection) {
        let key_node = key_node?;
        let dir = key_node.uint(oracle, "dir")?;
        let member = format!("key_node[{}]", dir);
        let conn = container_of(key_node.address(), oracle, "struct conn", &member)?;
        show_conn(oracle, out, &conn, dir, short)?;
    }
    Ok(())
}

fn show_conn(
    oracle: &dyn Oracle,
    out: &mut dyn Write,
    conn: &TypedAddress,
    dir: u64,
    short: bool,
) -> Result<()> {
    if short {
        writeln!(out, "{}", conn)?;
        return Ok(());
    }
    let key =
        |field: &str| render::field(oracle, conn, &format!("key_node[{}].key.{}", dir, field));
    writeln!(
        out,
        "{}: expiration = {}, mark = {}, dl_type = {}, zone = {}, nw_proto = {}",
        conn,
        render::field(oracle, conn, "expiration")?,
        render::field(oracle, conn, "mark")?,
        key("dl_type")?,
        key("zone")?,
        key("nw_proto")?
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testutil::Fixture;

    /// A conntrack holding two connections, one linked through each
    /// direction's key node
    fn conntrack(fx: &mut Fixture) -> (String, u64, u64) {
        let ct = fx.alloc(0x20);

        let a = fx.alloc(0x48);
        fx.write_u32(a + 8, 0);
        fx.write_u16(a + 16, 0x0800);
        fx.write_u16(a + 18, 3);
        fx.write_u8(a + 20, 6);
        fx.write_u32(a + 48, 0x10);
        fx.write_u64(a + 56, 1500);

        let b = fx.alloc(0x48);
        fx.write_u32(b + 24 + 8, 1);
        fx.write_u16(b + 24 + 16, 0x86dd);
        fx.write_u16(b + 24 + 18, 7);
        fx.write_u8(b + 24 + 20, 17);
        fx.write_u64(b + 56, 2000);

        fx.cmap(ct + 8, &[a, b + 24]);
        (format!("{:#x}", ct), a, b)
    }

    #[test]
    fn test_conns_full() {
        let mut fx = Fixture::new();
        let (ct, a, b) = conntrack(&mut fx);
        let text = fx.run(|oracle, out| conns(oracle, out, &ct, false));
        assert_eq!(
            text,
            format!(
                "(struct conn *) {:#x}: expiration = 1500, mark = 16, dl_type = 2048, zone = 3, nw_proto = 6\n\
                 (struct conn *) {:#x}: expiration = 2000, mark = 0, dl_type = 34525, zone = 7, nw_proto = 17\n",
                a, b
            )
        );
    }

    #[test]
    fn test_conns_short() {
        let mut fx = Fixture::new();
        let (ct, a, b) = conntrack(&mut fx);
        let text = fx.run(|oracle, out| conns(oracle, out, &ct, true));
        assert_eq!(text, format!("(struct conn *) {:#x}\n(struct conn *) {:#x}\n", a, b));
    }

    #[test]
    fn test_conns_empty() {
        let mut fx = Fixture::new();
        let ct = fx.alloc(0x20);
        fx.cmap(ct + 8, &[]);
        let address = ct.to_string();
        assert_eq!(fx.run(|oracle, out| conns(oracle, out, &address, false)), "");
    }
}
