//! Concurrent hash map (`struct cmap`) walker

use super::{field_ptr, field_uint, Projection};
use crate::error::Result;
use crate::names::{CMAP, CMAP_BUCKET, CMAP_HASH_SIZE, CMAP_IMPL, CMAP_NODE};
use crate::oracle::Oracle;
use crate::typed::TypedAddress;

use tracing::{debug, trace};

/// Node slots per bucket: one cache line holds a 4-byte counter plus K
/// (hash, pointer) pairs.
pub fn slots_per_bucket(pointer_size: usize, cache_line_size: usize) -> usize {
    cache_line_size.saturating_sub(4) / (CMAP_HASH_SIZE + pointer_size)
}

/// Element count of the `cmap` at `cmap`, without walking it
pub fn cmap_count(oracle: &dyn Oracle, cmap: u64) -> Result<u64> {
    let imp = field_ptr(oracle, CMAP, cmap, "impl.p")?;
    if imp == 0 {
        return Ok(0);
    }
    field_uint(oracle, CMAP_IMPL, imp, "n")
}

/// Iterates every node of a `cmap`: each slot's chain, slot by slot, bucket
/// by bucket
///
/// `impl.p` and the element count are re-read on every step, so a map that
/// was swapped for an empty one mid-walk ends the walk.
pub struct CmapIter<'a> {
    oracle: &'a dyn Oracle,
    cmap: u64,
    projection: Projection,
    node: u64,
    bucket: u64,
    slot: usize,
    done: bool,
}

impl<'a> CmapIter<'a> {
    pub fn new(oracle: &'a dyn Oracle, cmap: u64, projection: Projection) -> Self {
        Self {
            oracle,
            cmap,
            projection,
            node: 0,
            bucket: 0,
            slot: 0,
            done: false,
        }
    }

    fn step(&mut self) -> Result<Option<u64>> {
        let oracle = self.oracle;

        let imp = field_ptr(oracle, CMAP, self.cmap, "impl.p")?;
        if imp == 0 {
            debug!(cmap = format_args!("{:#x}", self.cmap), "cmap has no impl");
            return Ok(None);
        }
        let n = field_uint(oracle, CMAP_IMPL, imp, "n")?;
        if n == 0 {
            debug!(cmap = format_args!("{:#x}", self.cmap), "cmap is empty");
            return Ok(None);
        }
        let mask = field_uint(oracle, CMAP_IMPL, imp, "mask")?;

        if self.node != 0 {
            self.node = field_ptr(oracle, CMAP_NODE, self.node, "next.p")?;
            if self.node != 0 {
                trace!(node = format_args!("{:#x}", self.node), "cmap chain");
                return Ok(Some(self.node));
            }
        }

        let buckets = oracle.field(CMAP_IMPL, "buckets")?.offset;
        let bucket_size = oracle.resolve_type(CMAP_BUCKET)?.size;
        let node_size = oracle.resolve_type(CMAP_NODE)?.size;
        let nodes = oracle.field(CMAP_BUCKET, "nodes")?.offset;
        let next = oracle.field(CMAP_NODE, "next.p")?.offset;
        let slots = slots_per_bucket(oracle.pointer_size(), oracle.cache_line_size());

        while self.bucket <= mask {
            let bucket = imp
                .wrapping_add(buckets)
                .wrapping_add(self.bucket.wrapping_mul(bucket_size));
            while self.slot < slots {
                let slot_address = bucket
                    .wrapping_add(nodes)
                    .wrapping_add(self.slot as u64 * node_size)
                    .wrapping_add(next);
                self.slot += 1;
                let node = oracle.read_ptr(slot_address)?;
                if node != 0 {
                    trace!(bucket = self.bucket, slot = self.slot - 1, "cmap slot");
                    self.node = node;
                    return Ok(Some(node));
                }
            }
            self.slot = 0;
            self.bucket += 1;
        }

        debug!(cmap = format_args!("{:#x}", self.cmap), "cmap walk complete");
        Ok(None)
    }
}

impl Iterator for CmapIter<'_> {
    type Item = Result<TypedAddress>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self
            .step()
            .and_then(|node| {
                node.map(|n| self.projection.apply(self.oracle, n, CMAP_NODE))
                    .transpose()
            })
            .transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}
