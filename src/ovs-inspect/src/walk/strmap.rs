//! String-keyed maps: `shash`, `simap` and `smap`
//!
//! All three are an `hmap` of nodes that embed their `hmap_node` as `node`;
//! these walkers are the hmap walker plus a couple of field reads.

use super::{HmapIter, Projection};
use crate::error::Result;
use crate::names::{SHASH, SHASH_NODE, SIMAP, SIMAP_NODE, SMAP, SMAP_NODE};
use crate::oracle::Oracle;
use crate::resolve::member_of;
use crate::typed::TypedAddress;

use std::sync::Arc;

fn node_iter<'a>(
    oracle: &'a dyn Oracle,
    container: u64,
    container_type: &str,
    node_type: &str,
) -> Result<HmapIter<'a>> {
    let map = member_of(container, oracle, container_type, "map")?;
    Ok(HmapIter::new(
        oracle,
        map,
        Projection::container_of(node_type, "node"),
    ))
}

/// One `shash` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShashEntry {
    pub node: TypedAddress,
    pub name: String,
    /// The `data` pointer, typed as requested (or `void`)
    pub data: TypedAddress,
}

pub struct ShashIter<'a> {
    oracle: &'a dyn Oracle,
    nodes: HmapIter<'a>,
    data_type: Arc<str>,
    done: bool,
}

impl<'a> ShashIter<'a> {
    pub fn new(oracle: &'a dyn Oracle, shash: u64, data_type: Option<&str>) -> Result<Self> {
        Ok(Self {
            oracle,
            nodes: node_iter(oracle, shash, SHASH, SHASH_NODE)?,
            data_type: data_type.unwrap_or("void").into(),
            done: false,
        })
    }

    fn entry(&self, node: TypedAddress) -> Result<ShashEntry> {
        let name = node.string(self.oracle, "name")?;
        let data = node.pointer(self.oracle, "data")?;
        Ok(ShashEntry {
            node,
            name,
            data: TypedAddress::new(data, self.data_type.clone()),
        })
    }
}

impl Iterator for ShashIter<'_> {
    type Item = Result<ShashEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.nodes.next()?.and_then(|node| self.entry(node));
        self.done = item.is_err();
        Some(item)
    }
}

/// `simap` entries as `(name, value)`
pub struct SimapIter<'a> {
    oracle: &'a dyn Oracle,
    nodes: HmapIter<'a>,
    done: bool,
}

impl<'a> SimapIter<'a> {
    pub fn new(oracle: &'a dyn Oracle, simap: u64) -> Result<Self> {
        Ok(Self {
            oracle,
            nodes: node_iter(oracle, simap, SIMAP, SIMAP_NODE)?,
            done: false,
        })
    }
}

impl Iterator for SimapIter<'_> {
    type Item = Result<(String, u64)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let oracle = self.oracle;
        let item = self.nodes.next()?.and_then(|node| {
            Ok((node.string(oracle, "name")?, node.uint(oracle, "data")?))
        });
        self.done = item.is_err();
        Some(item)
    }
}

/// `smap` entries as `(key, value)`
pub struct SmapIter<'a> {
    oracle: &'a dyn Oracle,
    nodes: HmapIter<'a>,
    done: bool,
}

impl<'a> SmapIter<'a> {
    pub fn new(oracle: &'a dyn Oracle, smap: u64) -> Result<Self> {
        Ok(Self {
            oracle,
            nodes: node_iter(oracle, smap, SMAP, SMAP_NODE)?,
            done: false,
        })
    }
}

impl Iterator for SmapIter<'_> {
    type Item = Result<(String, String)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let oracle = self.oracle;
        let item = self.nodes.next()?.and_then(|node| {
            Ok((node.string(oracle, "key")?, node.string(oracle, "value")?))
        });
        self.done = item.is_err();
        Some(item)
    }
}
