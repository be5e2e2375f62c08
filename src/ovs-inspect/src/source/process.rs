//! Live Process Memory Source
//!
//! Memory source implementation for reading from a running ovs-vswitchd.

use super::region::parse_maps;
use super::{MemoryRegion, MemorySource};
use crate::error::{Error, Result};

use process_memory::{CopyAddress, ProcessHandle, TryIntoProcessHandle};
use std::collections::BTreeSet;
use std::path::PathBuf;
use sysinfo::System;
use tracing::{debug, info};

/// Default daemon name to look for when no PID is given
pub const DEFAULT_PROCESS_NAME: &str = "ovs-vswitchd";

/// An attached (read-only) target process
pub struct LiveProcess {
    pub pid: u32,
    pub handle: ProcessHandle,
    pub exe_path: PathBuf,
    pub maps: Vec<MemoryRegion>,
}

// SAFETY: the handle is a plain PID on Linux and may be used from any thread.
unsafe impl Send for LiveProcess {}
unsafe impl Sync for LiveProcess {}

impl MemorySource for LiveProcess {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        let mut buffer = vec![0u8; size];
        self.handle
            .copy_address(address as usize, &mut buffer)
            .map_err(|e| Error::unreadable(address, size, e.to_string()))?;
        Ok(buffer)
    }

    fn regions(&self) -> &[MemoryRegion] {
        &self.maps
    }

    fn is_live(&self) -> bool {
        true
    }

    fn refresh(&mut self) -> Result<bool> {
        let maps = read_maps(self.pid)?;
        let changed = mapped_objects(&maps) != mapped_objects(&self.maps);
        if changed {
            info!(pid = self.pid, "mapped objects changed");
        }
        self.maps = maps;
        Ok(changed)
    }
}

impl LiveProcess {
    /// Attach to a process by PID
    pub fn attach(pid: u32) -> Result<Self> {
        let handle = (pid as process_memory::Pid)
            .try_into_process_handle()
            .map_err(|e| Error::Attach {
                pid,
                reason: format!("{} (try running with sudo)", e),
            })?;

        let maps = read_maps(pid)?;

        let exe_path = std::fs::read_link(format!("/proc/{}/exe", pid))
            .unwrap_or_else(|_| PathBuf::from("unknown"));

        debug!(pid, regions = maps.len(), exe = %exe_path.display(), "attached");

        Ok(LiveProcess {
            pid,
            handle,
            exe_path,
            maps,
        })
    }

    /// Attach to the first process whose name matches `name`
    pub fn attach_by_name(name: &str) -> Result<Self> {
        let pid = find_process(name)?;
        Self::attach(pid)
    }

    /// Get process info summary
    pub fn info(&self) -> String {
        let file_backed = mapped_objects(&self.maps).len();
        format!(
            "PID: {}\nExecutable: {}\nMemory Regions: {} ({} mapped objects)",
            self.pid,
            self.exe_path.display(),
            self.maps.len(),
            file_backed
        )
    }
}

/// Find a running process by name, preferring the main thread group
pub fn find_process(name: &str) -> Result<u32> {
    let mut system = System::new_all();
    system.refresh_all();

    let mut candidates: Vec<u32> = system
        .processes()
        .values()
        .filter(|p| p.name().to_string_lossy() == name)
        .map(|p| {
            let pid = p.pid().as_u32();
            get_tgid(pid).unwrap_or(pid)
        })
        .collect();

    candidates.sort_unstable();
    candidates.dedup();

    match candidates.first() {
        Some(&pid) => {
            if candidates.len() > 1 {
                info!(name, ?candidates, "several matching processes, using the first");
            }
            Ok(pid)
        }
        None => Err(Error::ProcessNotFound(format!(
            "no process named '{}' is running",
            name
        ))),
    }
}

/// Get the thread group ID (main process) for a given PID/TID
pub fn get_tgid(pid: u32) -> Option<u32> {
    let status = std::fs::read_to_string(format!("/proc/{}/status", pid)).ok()?;
    status
        .lines()
        .find(|line| line.starts_with("Tgid:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|tgid| tgid.parse().ok())
}

fn read_maps(pid: u32) -> Result<Vec<MemoryRegion>> {
    let contents = std::fs::read_to_string(format!("/proc/{}/maps", pid))?;
    Ok(parse_maps(&contents))
}

/// Paths of every file-backed mapping
fn mapped_objects(maps: &[MemoryRegion]) -> BTreeSet<&str> {
    maps.iter()
        .filter_map(|r| r.path.as_deref())
        .filter(|p| p.starts_with('/'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapped_objects_ignores_anonymous_and_pseudo() {
        let maps = parse_maps(
            "1000-2000 r-xp 00000000 fd:01 1 /usr/sbin/ovs-vswitchd\n\
             2000-3000 rw-p 00001000 fd:01 1 /usr/sbin/ovs-vswitchd\n\
             3000-4000 rw-p 00000000 00:00 0\n\
             4000-5000 rw-p 00000000 00:00 0 [heap]\n\
             5000-6000 r-xp 00000000 fd:01 2 /usr/lib/libofproto.so\n",
        );
        let objects = mapped_objects(&maps);
        assert_eq!(objects.len(), 2);
        assert!(objects.contains("/usr/lib/libofproto.so"));
    }

    #[test]
    fn test_get_tgid_of_self() {
        let pid = std::process::id();
        assert_eq!(get_tgid(pid), Some(pid));
    }

    #[test]
    fn test_find_missing_process() {
        assert!(matches!(
            find_process("no-such-daemon-here"),
            Err(Error::ProcessNotFound(_))
        ));
    }
}
