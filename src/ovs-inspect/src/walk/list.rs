//! Intrusive circular list (`struct ovs_list`) walker

use super::{field_ptr, Projection};
use crate::error::Result;
use crate::names::OVS_LIST;
use crate::oracle::Oracle;
use crate::typed::TypedAddress;

use tracing::debug;

/// Iterates the elements of an `ovs_list`, starting after the sentinel
///
/// Ends when `next` comes back to the sentinel. A NULL `next` also ends the
/// walk: that is a list head which was zeroed but never initialized.
pub struct ListIter<'a> {
    oracle: &'a dyn Oracle,
    sentinel: u64,
    projection: Projection,
    current: u64,
    done: bool,
}

impl<'a> ListIter<'a> {
    pub fn new(oracle: &'a dyn Oracle, sentinel: u64, projection: Projection) -> Self {
        Self {
            oracle,
            sentinel,
            projection,
            current: sentinel,
            done: false,
        }
    }

    fn step(&mut self) -> Result<Option<u64>> {
        let next = field_ptr(self.oracle, OVS_LIST, self.current, "next")?;
        if next == self.sentinel || next == 0 {
            debug!(
                sentinel = format_args!("{:#x}", self.sentinel),
                uninitialized = next == 0,
                "list walk complete"
            );
            return Ok(None);
        }
        self.current = next;
        Ok(Some(next))
    }
}

impl Iterator for ListIter<'_> {
    type Item = Result<TypedAddress>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self
            .step()
            .and_then(|node| {
                node.map(|n| self.projection.apply(self.oracle, n, OVS_LIST))
                    .transpose()
            })
            .transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}
