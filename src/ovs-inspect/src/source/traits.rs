//! Memory Source Trait
//!
//! Core abstraction for reading target memory from various sources.

use super::MemoryRegion;
use crate::error::Result;
use byteorder::{ByteOrder, LE};

/// Trait for reading memory from various sources (live process, dump file, etc.)
///
/// Sources are read-only; nothing here can write into the target.
pub trait MemorySource: Send + Sync {
    /// Read bytes from a virtual address
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Get the list of memory regions
    fn regions(&self) -> &[MemoryRegion];

    /// Check if this is a live source (the target may change between reads)
    fn is_live(&self) -> bool;

    /// Re-read the region list. Returns `true` when the set of mapped
    /// objects changed, which means cached type layouts may be stale.
    fn refresh(&mut self) -> Result<bool> {
        Ok(false)
    }

    /// Read a u16 from memory
    fn read_u16(&self, address: u64) -> Result<u16> {
        let bytes = self.read_bytes(address, 2)?;
        Ok(LE::read_u16(&bytes))
    }

    /// Read a u32 from memory
    fn read_u32(&self, address: u64) -> Result<u32> {
        let bytes = self.read_bytes(address, 4)?;
        Ok(LE::read_u32(&bytes))
    }

    /// Read a u64 from memory
    fn read_u64(&self, address: u64) -> Result<u64> {
        let bytes = self.read_bytes(address, 8)?;
        Ok(LE::read_u64(&bytes))
    }

    /// Read a null-terminated string from memory
    fn read_cstring(&self, address: u64, max_len: usize) -> Result<String> {
        let bytes = self.read_bytes(address, max_len)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).to_string())
    }

    /// Find a region containing the given address
    fn find_region(&self, address: u64) -> Option<&MemoryRegion> {
        self.regions()
            .iter()
            .find(|r| address >= r.start && address < r.end)
    }

    /// Check if an address is readable
    fn is_readable(&self, address: u64) -> bool {
        self.find_region(address)
            .map(|r| r.is_readable())
            .unwrap_or(false)
    }

    /// Lowest mapping whose file name is `module` (e.g. `ovs-vswitchd`)
    fn module_base(&self, module: &str) -> Option<u64> {
        self.regions()
            .iter()
            .filter(|r| r.file_name() == Some(module))
            .map(|r| r.start)
            .min()
    }
}

impl<T: MemorySource + ?Sized> MemorySource for Box<T> {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }

    fn regions(&self) -> &[MemoryRegion] {
        (**self).regions()
    }

    fn is_live(&self) -> bool {
        (**self).is_live()
    }

    fn refresh(&mut self) -> Result<bool> {
        (**self).refresh()
    }
}
