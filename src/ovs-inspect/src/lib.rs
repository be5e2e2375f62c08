//! # ovs-inspect
//!
//! Read-only inspection of Open vSwitch daemon state from outside the
//! process.
//!
//! This library provides:
//! - Memory sources for a live `ovs-vswitchd` or a core dump of one
//! - Layout files describing the target's types and global symbols
//! - An `Oracle` combining the two, with cached field lookups
//! - Lazy walkers for the daemon's containers: `hmap`, `cmap`, `ovs_list`,
//!   `shash`/`simap`/`smap`, netlink attributes and `ofpact` streams
//!
//! ## Example
//!
//! ```no_run
//! use ovs_inspect::{HmapIter, Inspector, LiveProcess, Oracle, Projection};
//!
//! # fn main() -> Result<(), ovs_inspect::Error> {
//! let process = LiveProcess::attach_by_name("ovs-vswitchd")?;
//! let oracle = Inspector::with_layout_file("vswitchd-layout.yaml", process)?;
//!
//! let bridges = oracle.resolve_symbol("all_bridges")?;
//! let projection = Projection::container_of("struct bridge", "node");
//! for bridge in HmapIter::new(&oracle, bridges.address, projection) {
//!     let bridge = bridge?;
//!     println!("{} {}", bridge, bridge.string(&oracle, "name")?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod layout;
pub mod names;
pub mod oracle;
pub mod resolve;
pub mod source;
pub mod typed;
pub mod walk;

#[cfg(test)]
mod testutil;

#[doc(inline)]
pub use cache::TypeCache;
#[doc(inline)]
pub use error::{Error, Result};
#[doc(inline)]
pub use layout::{parse_number, FieldDescriptor, FieldType, Layout, Symbol, TypeDescriptor};
#[doc(inline)]
pub use oracle::{FieldLocation, Inspector, Oracle, Value};
#[doc(inline)]
pub use resolve::{container_of, member_of, offset_of};
#[doc(inline)]
pub use source::{DumpFile, LiveProcess, MemoryRegion, MemorySource, DEFAULT_PROCESS_NAME};
#[doc(inline)]
pub use typed::TypedAddress;
#[doc(inline)]
pub use walk::{
    cmap_count, hmap_count, AttrFormat, AttrIter, AttrRecord, CmapIter, HmapIter, ListIter,
    Projection, ShashEntry, ShashIter, SimapIter, SmapIter,
};
