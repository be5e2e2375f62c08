//! Mock Memory Source
//!
//! A contiguous buffer standing in for target memory, used to build
//! container fixtures in tests.

use super::{MemoryRegion, MemorySource};
use crate::error::{Error, Result};
use byteorder::{ByteOrder, LE};

/// A mock memory source for testing walkers against hand-built layouts
pub struct MockMemorySource {
    /// Raw memory data (contiguous, starting at base_address)
    pub data: Vec<u8>,
    /// Base virtual address for the data
    pub base_address: u64,
    /// Memory regions (for region-based operations)
    pub regions: Vec<MemoryRegion>,
}

impl MockMemorySource {
    /// Create a new mock with data at given base address
    pub fn new(data: Vec<u8>, base_address: u64) -> Self {
        let end = base_address + data.len() as u64;
        Self {
            data,
            base_address,
            regions: vec![MemoryRegion {
                start: base_address,
                end,
                perms: "rw-p".to_string(),
                offset: 0,
                path: None,
            }],
        }
    }

    /// Create a zero-filled mock of `size` bytes
    pub fn zeroed(base_address: u64, size: usize) -> Self {
        Self::new(vec![0; size], base_address)
    }

    /// Create with explicit regions
    pub fn with_regions(data: Vec<u8>, base_address: u64, regions: Vec<MemoryRegion>) -> Self {
        Self {
            data,
            base_address,
            regions,
        }
    }

    fn slice_mut(&mut self, address: u64, len: usize) -> &mut [u8] {
        let offset = (address - self.base_address) as usize;
        &mut self.data[offset..offset + len]
    }

    pub fn write_bytes(&mut self, address: u64, bytes: &[u8]) {
        self.slice_mut(address, bytes.len()).copy_from_slice(bytes);
    }

    pub fn write_u16(&mut self, address: u64, value: u16) {
        LE::write_u16(self.slice_mut(address, 2), value);
    }

    pub fn write_u32(&mut self, address: u64, value: u32) {
        LE::write_u32(self.slice_mut(address, 4), value);
    }

    pub fn write_u64(&mut self, address: u64, value: u64) {
        LE::write_u64(self.slice_mut(address, 8), value);
    }

    /// Write a NUL-terminated string
    pub fn write_cstring(&mut self, address: u64, value: &str) {
        self.write_bytes(address, value.as_bytes());
        self.write_bytes(address + value.len() as u64, &[0]);
    }
}

impl MemorySource for MockMemorySource {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        if address < self.base_address {
            return Err(Error::unreadable(
                address,
                size,
                format!("below base {:#x}", self.base_address),
            ));
        }

        let offset = (address - self.base_address) as usize;
        if offset + size > self.data.len() {
            return Err(Error::unreadable(
                address,
                size,
                format!("exceeds data size {}", self.data.len()),
            ));
        }

        Ok(self.data[offset..offset + size].to_vec())
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn is_live(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_source_read_bytes() {
        let source = MockMemorySource::new(vec![0x41, 0x42, 0x43, 0x44], 0x1000);

        assert_eq!(source.read_bytes(0x1000, 4).unwrap(), vec![0x41, 0x42, 0x43, 0x44]);
        assert_eq!(source.read_bytes(0x1001, 2).unwrap(), vec![0x42, 0x43]);
    }

    #[test]
    fn test_mock_source_little_endian() {
        let mut source = MockMemorySource::zeroed(0x1000, 16);
        source.write_u64(0x1000, 0x0807060504030201);
        source.write_u16(0x1008, 0xbeef);

        assert_eq!(source.read_u64(0x1000).unwrap(), 0x0807060504030201);
        assert_eq!(source.read_u32(0x1000).unwrap(), 0x04030201);
        assert_eq!(source.read_u16(0x1008).unwrap(), 0xbeef);
        assert_eq!(source.data[8], 0xef);
    }

    #[test]
    fn test_mock_source_read_cstring() {
        let mut source = MockMemorySource::zeroed(0x1000, 32);
        source.write_cstring(0x1000, "br0");
        source.write_cstring(0x1010, "system");

        assert_eq!(source.read_cstring(0x1000, 10).unwrap(), "br0");
        assert_eq!(source.read_cstring(0x1010, 10).unwrap(), "system");
    }

    #[test]
    fn test_mock_source_read_out_of_bounds() {
        let source = MockMemorySource::new(vec![0x41, 0x42, 0x43, 0x44], 0x1000);

        assert!(matches!(
            source.read_bytes(0x1002, 10),
            Err(Error::UnreadableMemory { address: 0x1002, len: 10, .. })
        ));
        assert!(source.read_bytes(0x500, 4).is_err());
    }

    #[test]
    fn test_mock_source_module_base() {
        let regions = vec![
            MemoryRegion {
                start: 0x5000,
                end: 0x6000,
                perms: "r-xp".to_string(),
                offset: 0x1000,
                path: Some("/usr/sbin/ovs-vswitchd".to_string()),
            },
            MemoryRegion {
                start: 0x4000,
                end: 0x5000,
                perms: "r--p".to_string(),
                offset: 0,
                path: Some("/usr/sbin/ovs-vswitchd".to_string()),
            },
            MemoryRegion {
                start: 0x1000,
                end: 0x2000,
                perms: "r--p".to_string(),
                offset: 0,
                path: Some("/usr/lib/libc.so.6".to_string()),
            },
        ];
        let source = MockMemorySource::with_regions(vec![0; 16], 0x1000, regions);

        assert_eq!(source.module_base("ovs-vswitchd"), Some(0x4000));
        assert_eq!(source.module_base("ovs-dpctl"), None);
        assert!(source.is_readable(0x5800));
        assert!(!source.is_readable(0x9000));
    }
}
