//! Memory Region Types
//!
//! Data structures for representing memory regions from /proc/pid/maps.

use std::path::Path;

/// A memory region from /proc/pid/maps
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryRegion {
    pub start: u64,
    pub end: u64,
    pub perms: String,
    pub offset: u64,
    pub path: Option<String>,
}

impl MemoryRegion {
    pub fn size(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_readable(&self) -> bool {
        self.perms.starts_with('r')
    }

    pub fn is_writable(&self) -> bool {
        self.perms.chars().nth(1) == Some('w')
    }

    pub fn is_executable(&self) -> bool {
        self.perms.chars().nth(2) == Some('x')
    }

    /// File name component of the backing path, if any
    pub fn file_name(&self) -> Option<&str> {
        let path = self.path.as_deref()?;
        Path::new(path).file_name().and_then(|n| n.to_str())
    }

    /// Parse one line of /proc/pid/maps
    ///
    /// `55d0c8a00000-55d0c8b1f000 r-xp 00021000 fd:01 1835203 /usr/sbin/ovs-vswitchd`
    pub fn parse_maps_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let (start, end) = parts.first()?.split_once('-')?;
        let start = u64::from_str_radix(start, 16).ok()?;
        let end = u64::from_str_radix(end, 16).ok()?;
        let perms = parts.get(1).unwrap_or(&"").to_string();
        let offset = parts
            .get(2)
            .and_then(|s| u64::from_str_radix(s, 16).ok())
            .unwrap_or(0);
        let path = parts.get(5).map(|s| s.to_string());

        Some(MemoryRegion {
            start,
            end,
            perms,
            offset,
            path,
        })
    }
}

/// Parse a full /proc/pid/maps listing, skipping malformed lines
pub fn parse_maps(contents: &str) -> Vec<MemoryRegion> {
    contents
        .lines()
        .filter_map(MemoryRegion::parse_maps_line)
        .collect()
}
