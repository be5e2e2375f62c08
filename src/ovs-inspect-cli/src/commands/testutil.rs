//! Synthetic ovs-vswitchd memory images for command tests
//!
//! The image is one contiguous region starting at the example layout's
//! globals. It is written out as a raw dump plus `.maps` file and opened
//! through `DumpFile`, the same path the CLI takes for `--dump`.

use std::path::PathBuf;

use ovs_inspect::{DumpFile, Inspector, MemorySource};
use tempfile::TempDir;

use crate::target::Target;

/// Start of the image; the example layout's globals live in the first page
pub const GLOBALS: u64 = 0x5555_5560_0000;
const IMAGE_SIZE: usize = 0x20000;

pub const ALL_BRIDGES: u64 = GLOBALS;
pub const DP_NETDEVS: u64 = GLOBALS + 0x40;
pub const DPIF_CLASSES: u64 = GLOBALS + 0x80;
pub const NETDEV_SHASH: u64 = GLOBALS + 0xc0;
pub const NETDEV_CLASSES: u64 = GLOBALS + 0x100;
pub const ALL_UDPIFS: u64 = GLOBALS + 0x140;
pub const ENABLE_UFID: u64 = GLOBALS + 0x180;
pub const ALL_OFPROTO_DPIFS: u64 = GLOBALS + 0x1c0;
pub const COVERAGE_RUN_TIME: u64 = GLOBALS + 0x200;
pub const NETDEV_VPORT_CONSTRUCT: u64 = 0x5555_5540_0000;

const EXAMPLE_LAYOUT: &str = include_str!("../../layouts/ovs-vswitchd-example.yaml");


pub struct Fixture {
    dir: TempDir,
    mem: Vec<u8>,
    next: u64,
}

impl Fixture {
    /// An image with every global list/map initialised empty
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vswitchd.yaml"), EXAMPLE_LAYOUT).unwrap();
        let mut fixture = Self {
            dir,
            mem: vec![0; IMAGE_SIZE],
            next: GLOBALS + 0x1000,
        };
        for map in [ALL_BRIDGES, DP_NETDEVS, DPIF_CLASSES, NETDEV_SHASH, ALL_OFPROTO_DPIFS] {
            fixture.hmap(map, 0, &[]);
        }
        fixture.cmap(NETDEV_CLASSES, &[]);
        fixture.list(ALL_UDPIFS, &[]);
        fixture
    }

    fn offset(&self, address: u64) -> usize {
        assert!(address >= GLOBALS, "{:#x} is below the image", address);
        (address - GLOBALS) as usize
    }

    pub fn write_bytes(&mut self, address: u64, bytes: &[u8]) {
        let at = self.offset(address);
        self.mem[at..at + bytes.len()].copy_from_slice(bytes);
    }

    pub fn write_u8(&mut self, address: u64, value: u8) {
        self.write_bytes(address, &[value]);
    }

    pub fn write_u16(&mut self, address: u64, value: u16) {
        self.write_bytes(address, &value.to_le_bytes());
    }

    pub fn write_u32(&mut self, address: u64, value: u32) {
        self.write_bytes(address, &value.to_le_bytes());
    }

    pub fn write_u64(&mut self, address: u64, value: u64) {
        self.write_bytes(address, &value.to_le_bytes());
    }

    /// Zeroed, 64-byte aligned allocation
    pub fn alloc(&mut self, size: u64) -> u64 {
        let address = self.next;
        self.next = (self.next + size.max(1) + 63) & !63;
        assert!(self.offset(self.next) <= IMAGE_SIZE, "fixture image is full");
        address
    }

    pub fn string(&mut self, s: &str) -> u64 {
        let address = self.alloc(s.len() as u64 + 1);
        self.write_bytes(address, s.as_bytes());
        address
    }

    /// Fill the `struct hmap` at `map`; nodes are chained in the order given
    pub fn hmap(&mut self, map: u64, mask: u64, nodes: &[(u64, u64)]) {
        let buckets = self.alloc((mask + 1) * 8);
        let mut tails = vec![0u64; (mask + 1) as usize];
        for &(node, hash) in nodes {
            self.write_u64(node, hash);
            self.write_u64(node + 8, 0);
            let bucket = (hash & mask) as usize;
            if tails[bucket] == 0 {
                self.write_u64(buckets + bucket as u64 * 8, node);
            } else {
                self.write_u64(tails[bucket] + 8, node);
            }
            tails[bucket] = node;
        }
        self.write_u64(map, buckets);
        self.write_u64(map + 16, mask);
        self.write_u64(map + 24, nodes.len() as u64);
    }

    /// Fill the `struct cmap` at `map` with one bucket holding up to five
    /// nodes, one per slot
    pub fn cmap(&mut self, map: u64, nodes: &[u64]) {
        assert!(nodes.len() <= 5);
        let cmap_impl = self.alloc(64 + 64);
        let bucket = cmap_impl + 64;
        for (slot, &node) in nodes.iter().enumerate() {
            let slot = slot as u64;
            self.write_u32(bucket + 4 + slot * 4, slot as u32);
            self.write_u64(bucket + 24 + slot * 8, node);
            self.write_u64(node, 0);
        }
        self.write_u32(cmap_impl, nodes.len() as u32);
        self.write_u32(cmap_impl + 12, 0);
        self.write_u64(map, cmap_impl);
    }

    /// Link `nodes` into the circular list headed by `head`
    pub fn list(&mut self, head: u64, nodes: &[u64]) {
        let mut prev = head;
        for &node in nodes {
            self.write_u64(prev + 8, node);
            self.write_u64(node, prev);
            prev = node;
        }
        self.write_u64(prev + 8, head);
        self.write_u64(head, prev);
    }

    /// Fill the `struct shash` (or `simap`/`smap`) at `map`; `second` is
    /// written raw into the node's data/value slot
    pub fn string_map(&mut self, map: u64, entries: &[(&str, u64)]) {
        let mut nodes = Vec::new();
        for (i, &(name, second)) in entries.iter().enumerate() {
            let node = self.alloc(32);
            let name = self.string(name);
            self.write_u64(node + 16, name);
            self.write_u64(node + 24, second);
            nodes.push((node, i as u64));
        }
        self.hmap(map, 0, &nodes);
    }

    pub fn layout_path(&self) -> PathBuf {
        self.dir.path().join("vswitchd.yaml")
    }

    /// Write the image out as `vswitchd.core` with its `vswitchd.maps`
    pub fn dump_path(&self) -> PathBuf {
        let dump = self.dir.path().join("vswitchd.core");
        std::fs::write(&dump, &self.mem).unwrap();
        std::fs::write(
            self.dir.path().join("vswitchd.maps"),
            format!("0x{:x} 0x{:x} {} 0x0\n", GLOBALS, GLOBALS + IMAGE_SIZE as u64, IMAGE_SIZE),
        )
        .unwrap();
        dump
    }

    pub fn oracle(&self) -> Target {
        let source: Box<dyn MemorySource> = Box::new(DumpFile::open(self.dump_path()).unwrap());
        Inspector::with_layout_file(self.layout_path(), source).unwrap()
    }

    /// Run a command against the image and capture what it prints
    pub fn run<F>(&self, command: F) -> String
    where
        F: FnOnce(&Target, &mut Vec<u8>) -> anyhow::Result<()>,
    {
        let oracle = self.oracle();
        let mut out = Vec::new();
        command(&oracle, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }
}
