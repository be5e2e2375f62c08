//! Memory Source Abstraction
//!
//! Core abstractions for reading target memory from various sources:
//! - Live process attachment via `LiveProcess`
//! - Core dump files via `DumpFile` (ELF cores and raw dumps with maps)
//! - Mock sources for testing

mod dump;
#[cfg(test)]
mod mock;
mod process;
mod region;
mod traits;

pub use dump::DumpFile;
#[cfg(test)]
pub use mock::MockMemorySource;
pub use process::{find_process, get_tgid, LiveProcess, DEFAULT_PROCESS_NAME};
pub use region::{parse_maps, MemoryRegion};
pub use traits::MemorySource;
