//! Chained hash map (`struct hmap`) walker

use super::{field_int, field_ptr, field_uint, Projection};
use crate::error::Result;
use crate::names::{HMAP, HMAP_NODE};
use crate::oracle::Oracle;
use crate::typed::TypedAddress;

use tracing::{debug, trace};

/// Element count of the `hmap` at `map` (may be negative if corrupt)
pub fn hmap_count(oracle: &dyn Oracle, map: u64) -> Result<i64> {
    field_int(oracle, HMAP, map, "n")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    Start,
    Node(u64),
    Done,
}

/// Iterates the nodes of an `hmap` bucket by bucket, following each chain
///
/// Buckets are visited in index order and each chain in link order. The
/// element count is re-read on every step; a map whose count has dropped
/// to zero (or below) ends the walk.
pub struct HmapIter<'a> {
    oracle: &'a dyn Oracle,
    map: u64,
    projection: Projection,
    cursor: Cursor,
}

impl<'a> HmapIter<'a> {
    pub fn new(oracle: &'a dyn Oracle, map: u64, projection: Projection) -> Self {
        Self {
            oracle,
            map,
            projection,
            cursor: Cursor::Start,
        }
    }

    fn step(&mut self) -> Result<Option<u64>> {
        let oracle = self.oracle;

        let n = field_int(oracle, HMAP, self.map, "n")?;
        if n <= 0 {
            debug!(map = format_args!("{:#x}", self.map), n, "hmap is empty");
            return Ok(None);
        }
        let mask = field_uint(oracle, HMAP, self.map, "mask")?;

        let first_bucket = match self.cursor {
            Cursor::Done => return Ok(None),
            Cursor::Start => 0,
            Cursor::Node(node) => {
                let next = field_ptr(oracle, HMAP_NODE, node, "next")?;
                if next != 0 {
                    trace!(node = format_args!("{:#x}", next), "hmap chain");
                    self.cursor = Cursor::Node(next);
                    return Ok(Some(next));
                }
                let hash = field_uint(oracle, HMAP_NODE, node, "hash")?;
                match (hash & mask).checked_add(1) {
                    Some(bucket) => bucket,
                    None => return Ok(None),
                }
            }
        };

        let buckets = field_ptr(oracle, HMAP, self.map, "buckets")?;
        let stride = oracle.pointer_size() as u64;
        let mut bucket = first_bucket;
        while bucket <= mask {
            let node = oracle.read_ptr(buckets.wrapping_add(bucket.wrapping_mul(stride)))?;
            if node != 0 {
                trace!(bucket, node = format_args!("{:#x}", node), "hmap bucket");
                self.cursor = Cursor::Node(node);
                return Ok(Some(node));
            }
            bucket += 1;
        }

        debug!(map = format_args!("{:#x}", self.map), "hmap walk complete");
        Ok(None)
    }
}

impl Iterator for HmapIter<'_> {
    type Item = Result<TypedAddress>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor == Cursor::Done {
            return None;
        }
        let item = self
            .step()
            .and_then(|node| {
                node.map(|n| self.projection.apply(self.oracle, n, HMAP_NODE))
                    .transpose()
            })
            .transpose();
        if !matches!(item, Some(Ok(_))) {
            self.cursor = Cursor::Done;
        }
        item
    }
}
