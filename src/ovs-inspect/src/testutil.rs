//! Fixture builder for walker tests
//!
//! Lays out OVS containers in a `MockMemorySource` using the offsets of the
//! built-in x86_64 layout.

use crate::layout::Layout;
use crate::oracle::Inspector;
use crate::source::MockMemorySource;
use crate::walk::round_up;

pub(crate) const BASE: u64 = 0x7f00_0000_0000;

pub(crate) struct Heap {
    pub mem: MockMemorySource,
    next: u64,
}

impl Heap {
    pub fn new(size: usize) -> Self {
        Self {
            mem: MockMemorySource::zeroed(BASE, size),
            next: BASE,
        }
    }

    /// Cache-line aligned bump allocation
    pub fn alloc(&mut self, size: u64) -> u64 {
        let address = round_up(self.next, 64);
        self.next = address + size;
        address
    }

    pub fn string(&mut self, s: &str) -> u64 {
        let address = self.alloc(s.len() as u64 + 1);
        self.mem.write_cstring(address, s);
        address
    }

    /// Build a `struct hmap` from `(hmap_node address, hash)` pairs
    ///
    /// Nodes sharing a bucket are chained in the order given.
    pub fn hmap(&mut self, mask: u64, nodes: &[(u64, u64)]) -> u64 {
        let map = self.alloc(32);
        let buckets = self.alloc((mask + 1) * 8);
        self.fill_hmap(map, buckets, mask, nodes);
        map
    }

    /// Fill in a `struct hmap` living at `map` (e.g. embedded in a shash)
    pub fn fill_hmap(&mut self, map: u64, buckets: u64, mask: u64, nodes: &[(u64, u64)]) {
        let mut tails: Vec<Option<u64>> = vec![None; (mask + 1) as usize];
        for &(node, hash) in nodes {
            self.mem.write_u64(node, hash);
            self.mem.write_u64(node + 8, 0);
            let bucket = (hash & mask) as usize;
            match tails[bucket] {
                Some(tail) => self.mem.write_u64(tail + 8, node),
                None => self.mem.write_u64(buckets + bucket as u64 * 8, node),
            }
            tails[bucket] = Some(node);
        }
        self.mem.write_u64(map, buckets);
        self.mem.write_u64(map + 16, mask);
        self.mem.write_u64(map + 24, nodes.len() as u64);
    }

    /// Build a `struct cmap` from `(bucket, slot, chain)` placements
    pub fn cmap(&mut self, mask: u32, placements: &[(u64, u64, Vec<u64>)]) -> u64 {
        let cmap = self.alloc(8);
        let imp = self.alloc(64 + (mask as u64 + 1) * 64);
        let mut n = 0u32;
        for (bucket, slot, chain) in placements {
            let slot_address = imp + 64 + bucket * 64 + 24 + slot * 8;
            let mut link = slot_address;
            for &node in chain {
                self.mem.write_u64(link, node);
                self.mem.write_u64(node, 0);
                link = node;
                n += 1;
            }
        }
        self.mem.write_u32(imp, n);
        self.mem.write_u32(imp + 12, mask);
        self.mem.write_u64(cmap, imp);
        cmap
    }

    /// Build a circular `struct ovs_list` through `nodes`, returning the sentinel
    pub fn list(&mut self, nodes: &[u64]) -> u64 {
        let sentinel = self.alloc(16);
        let mut all = vec![sentinel];
        all.extend_from_slice(nodes);
        for (i, &node) in all.iter().enumerate() {
            let prev = all[(i + all.len() - 1) % all.len()];
            let next = all[(i + 1) % all.len()];
            self.mem.write_u64(node, prev);
            self.mem.write_u64(node + 8, next);
        }
        sentinel
    }

    pub fn inspector(self) -> Inspector<MockMemorySource> {
        self.inspector_with(Layout::builtin().unwrap())
    }

    pub fn inspector_with(self, layout: Layout) -> Inspector<MockMemorySource> {
        Inspector::new(layout, self.mem)
    }
}
