//! Dump File Memory Source
//!
//! Memory source implementation for reading from core dumps of ovs-vswitchd.
//! ELF cores (`gcore`, kernel core files) are parsed directly; any other file
//! is treated as a raw dump described by an accompanying maps file.

use super::region::parse_maps;
use super::{MemoryRegion, MemorySource};
use crate::error::{Error, Result};

use byteorder::{ByteOrder, LE};
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Memory dump file source
pub struct DumpFile {
    /// Memory-mapped dump file
    mmap: Mmap,
    /// Virtual address regions parsed from the dump or its maps file
    regions: Vec<MemoryRegion>,
    /// Path to the dump file
    pub path: PathBuf,
}

impl DumpFile {
    const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
    const ELFCLASS64: u8 = 2;
    const ELFDATA2LSB: u8 = 1;
    const ET_CORE: u16 = 4;
    const PT_LOAD: u32 = 1;
    const PT_NOTE: u32 = 4;
    const NT_FILE: u32 = 0x4649_4c45;

    /// Open a memory dump file
    ///
    /// Supports:
    /// - 64-bit little-endian ELF core files, auto-detected by magic
    /// - Raw dumps with a `<dump>.maps` file next to them
    /// - Raw dumps without maps, where file offset == virtual address
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mmap = map_file(&path)?;

        info!(path = %path.display(), size_mb = mmap.len() / 1_000_000, "opened dump file");

        if mmap.len() >= 4 && mmap[0..4] == Self::ELF_MAGIC {
            debug!("detected ELF core file");
            let regions = Self::parse_elf_core(&mmap)?;
            return Ok(DumpFile {
                mmap,
                regions,
                path,
            });
        }

        let maps_path = path.with_extension("maps");
        let regions = if maps_path.exists() {
            Self::parse_maps_file(&maps_path)?
        } else {
            vec![MemoryRegion {
                start: 0,
                end: mmap.len() as u64,
                perms: "r--p".to_string(),
                offset: 0,
                path: None,
            }]
        };

        Ok(DumpFile {
            mmap,
            regions,
            path,
        })
    }

    /// Open a raw dump with an explicit maps file
    pub fn open_with_maps<P: AsRef<Path>, Q: AsRef<Path>>(
        dump_path: P,
        maps_path: Q,
    ) -> Result<Self> {
        let path = dump_path.as_ref().to_path_buf();
        let mmap = map_file(&path)?;
        let regions = Self::parse_maps_file(maps_path.as_ref())?;

        info!(
            path = %path.display(),
            size_mb = mmap.len() / 1_000_000,
            regions = regions.len(),
            "opened dump file with maps"
        );

        Ok(DumpFile {
            mmap,
            regions,
            path,
        })
    }

    /// Parse the program headers (and NT_FILE note) of an ELF core
    fn parse_elf_core(data: &[u8]) -> Result<Vec<MemoryRegion>> {
        if data.len() < 0x40 {
            return Err(Error::Layout("ELF header truncated".to_string()));
        }
        if data[4] != Self::ELFCLASS64 || data[5] != Self::ELFDATA2LSB {
            return Err(Error::Layout(
                "only 64-bit little-endian core files are supported".to_string(),
            ));
        }
        let e_type = LE::read_u16(&data[0x10..0x12]);
        if e_type != Self::ET_CORE {
            return Err(Error::Layout(format!("ELF type {} is not a core file", e_type)));
        }

        let phoff = LE::read_u64(&data[0x20..0x28]);
        let phentsize = u64::from(LE::read_u16(&data[0x36..0x38]));
        let phnum = u64::from(LE::read_u16(&data[0x38..0x3a]));

        let mut regions = Vec::new();
        let mut files = Vec::new();

        for index in 0..phnum {
            let Some(ph) = program_header(data, phoff, phentsize, index) else {
                debug!(index, phoff, "program header outside the file, stopping");
                break;
            };
            let p_type = LE::read_u32(&ph[0..4]);
            let p_flags = LE::read_u32(&ph[4..8]);
            let p_offset = LE::read_u64(&ph[0x08..0x10]);
            let p_vaddr = LE::read_u64(&ph[0x10..0x18]);
            let p_filesz = LE::read_u64(&ph[0x20..0x28]);

            match p_type {
                Self::PT_LOAD if p_filesz > 0 => {
                    let Some(end) = p_vaddr.checked_add(p_filesz) else {
                        debug!(index, vaddr = p_vaddr, size = p_filesz, "segment wraps, skipped");
                        continue;
                    };
                    regions.push(MemoryRegion {
                        start: p_vaddr,
                        end,
                        perms: elf_perms(p_flags),
                        offset: p_offset,
                        path: None,
                    });
                }
                Self::PT_NOTE => {
                    let start = usize::try_from(p_offset).unwrap_or(usize::MAX);
                    let end = usize::try_from(p_filesz)
                        .map_or(usize::MAX, |size| start.saturating_add(size))
                        .min(data.len());
                    if start < end {
                        files.extend(parse_nt_file(&data[start..end]));
                    }
                }
                _ => {}
            }
        }

        for region in &mut regions {
            region.path = files
                .iter()
                .find(|(start, end, _)| region.start >= *start && region.start < *end)
                .map(|(_, _, name)| name.clone());
        }

        debug!(segments = regions.len(), files = files.len(), "parsed ELF core");
        Ok(regions)
    }

    /// Parse a maps file (supports both /proc/pid/maps and a plain
    /// `0xSTART 0xEND SIZE FILE_OFFSET` listing)
    fn parse_maps_file(path: &Path) -> Result<Vec<MemoryRegion>> {
        let contents = std::fs::read_to_string(path)?;
        let mut regions = Vec::new();

        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts[0].starts_with("0x") {
                if parts.len() < 4 {
                    continue;
                }
                let hex = |s: &str| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok();
                if let (Some(start), Some(end), Some(offset)) =
                    (hex(parts[0]), hex(parts[1]), hex(parts[3]))
                {
                    regions.push(MemoryRegion {
                        start,
                        end,
                        perms: "rw-p".to_string(),
                        offset,
                        path: None,
                    });
                }
            } else {
                regions.extend(parse_maps(line));
            }
        }

        Ok(regions)
    }

    /// Convert virtual address to file offset, checking the whole read
    /// stays inside one region and inside the file
    fn va_to_offset(&self, va: u64, size: usize) -> Option<usize> {
        let region = self.find_region(va)?;
        if va.checked_add(size as u64)? > region.end {
            return None;
        }
        let offset = usize::try_from(region.offset.checked_add(va - region.start)?).ok()?;
        (offset.checked_add(size)? <= self.mmap.len()).then_some(offset)
    }
}

impl MemorySource for DumpFile {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let offset = self
            .va_to_offset(address, size)
            .ok_or_else(|| Error::unreadable(address, size, "not contained in the dump"))?;

        Ok(self.mmap[offset..offset + size].to_vec())
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    fn is_live(&self) -> bool {
        false
    }
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path)?;
    // SAFETY: the dump is opened read-only and is not expected to change
    // while it is being inspected.
    let mmap = unsafe { Mmap::map(&file) }?;
    Ok(mmap)
}

fn elf_perms(flags: u32) -> String {
    let r = if flags & 4 != 0 { 'r' } else { '-' };
    let w = if flags & 2 != 0 { 'w' } else { '-' };
    let x = if flags & 1 != 0 { 'x' } else { '-' };
    format!("{}{}{}p", r, w, x)
}

/// The 0x38-byte program header `index`, if it lies inside `data`
fn program_header(data: &[u8], phoff: u64, phentsize: u64, index: u64) -> Option<&[u8]> {
    let start = index.checked_mul(phentsize)?.checked_add(phoff)?;
    let start = usize::try_from(start).ok()?;
    data.get(start..start.checked_add(0x38)?)
}

fn align4(n: usize) -> Option<usize> {
    Some(n.checked_add(3)? & !3)
}

/// Extract `(start, end, path)` triples from the NT_FILE note of a core
fn parse_nt_file(notes: &[u8]) -> Vec<(u64, u64, String)> {
    let mut pos = 0;
    while pos + 12 <= notes.len() {
        let namesz = LE::read_u32(&notes[pos..pos + 4]) as usize;
        let descsz = LE::read_u32(&notes[pos + 4..pos + 8]) as usize;
        let n_type = LE::read_u32(&notes[pos + 8..pos + 12]);
        let Some(desc_start) = align4(namesz).and_then(|n| (pos + 12).checked_add(n)) else {
            break;
        };
        let Some(desc_end) = desc_start.checked_add(descsz).filter(|&end| end <= notes.len()) else {
            break;
        };
        if n_type == DumpFile::NT_FILE {
            return parse_nt_file_desc(&notes[desc_start..desc_end]);
        }
        match align4(descsz).and_then(|n| desc_start.checked_add(n)) {
            Some(next) => pos = next,
            None => break,
        }
    }
    Vec::new()
}

fn parse_nt_file_desc(desc: &[u8]) -> Vec<(u64, u64, String)> {
    if desc.len() < 16 {
        return Vec::new();
    }
    let count = LE::read_u64(&desc[0..8]) as usize;
    let table_end = 16 + count.saturating_mul(24);
    if table_end > desc.len() {
        return Vec::new();
    }

    let mut names = desc[table_end..].split(|&b| b == 0);
    (0..count)
        .filter_map(|i| {
            let entry = 16 + i * 24;
            let start = LE::read_u64(&desc[entry..entry + 8]);
            let end = LE::read_u64(&desc[entry + 8..entry + 16]);
            let name = names.next()?;
            Some((start, end, String::from_utf8_lossy(name).to_string()))
        })
        .collect()
}
