//! Container walkers
//!
//! Each walker is a lazy, single-pass cursor over one OVS container layout.
//! Every `next()` reads just enough of the target to find the next element;
//! nothing is prefetched and nothing is cached between steps except the
//! type metadata kept by the oracle.
//!
//! Walkers yield `Result` items. An oracle failure is yielded once and the
//! walker is finished afterwards. A structurally empty container, or a
//! stream whose next record is malformed, simply ends the sequence.
//!
//! There is no cycle guard: against a target being mutated concurrently a
//! walk may not terminate, so consumers should be prepared to stop early.

mod attrs;
mod cmap;
mod hmap;
mod list;
mod strmap;

pub use attrs::{round_up, AttrFormat, AttrIter, AttrRecord, NETLINK, OFPACT};
pub use cmap::{cmap_count, slots_per_bucket, CmapIter};
pub use hmap::{hmap_count, HmapIter};
pub use list::ListIter;
pub use strmap::{ShashEntry, ShashIter, SimapIter, SmapIter};

use crate::error::Result;
use crate::oracle::Oracle;
use crate::resolve::container_of;
use crate::typed::TypedAddress;

/// What a walker yields for each link node it visits
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Projection {
    /// The link node itself
    #[default]
    Node,
    /// The record embedding the link node as `member`
    ContainerOf { type_name: String, member: String },
}

impl Projection {
    pub fn container_of(type_name: impl Into<String>, member: impl Into<String>) -> Self {
        Projection::ContainerOf {
            type_name: type_name.into(),
            member: member.into(),
        }
    }

    pub(crate) fn apply(
        &self,
        oracle: &dyn Oracle,
        node: u64,
        node_type: &str,
    ) -> Result<TypedAddress> {
        match self {
            Projection::Node => Ok(TypedAddress::new(node, node_type)),
            Projection::ContainerOf { type_name, member } => {
                container_of(node, oracle, type_name, member)
            }
        }
    }
}

fn field_uint(oracle: &dyn Oracle, type_name: &str, address: u64, path: &str) -> Result<u64> {
    let location = oracle.field(type_name, path)?;
    oracle.read_uint(address.wrapping_add(location.offset), location.size as usize)
}

fn field_int(oracle: &dyn Oracle, type_name: &str, address: u64, path: &str) -> Result<i64> {
    let location = oracle.field(type_name, path)?;
    oracle.read_int(address.wrapping_add(location.offset), location.size as usize)
}

fn field_ptr(oracle: &dyn Oracle, type_name: &str, address: u64, path: &str) -> Result<u64> {
    let location = oracle.field(type_name, path)?;
    oracle.read_ptr(address.wrapping_add(location.offset))
}
