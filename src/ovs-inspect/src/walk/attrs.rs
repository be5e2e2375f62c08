//! Length-prefixed attribute stream walkers
//!
//! Netlink attributes (`struct nlattr`, 4-byte aligned) and OpenFlow action
//! records (`struct ofpact`, 8-byte aligned) share one layout: a header
//! carrying the record length (header included) and a type tag, then the
//! payload, then padding up to the alignment.

use super::field_uint;
use crate::error::Result;
use crate::names::{self, NLATTR, NLA_F_NESTED, NLA_TYPE_MASK};
use crate::oracle::Oracle;
use crate::typed::TypedAddress;

use tracing::{debug, trace};

/// Round `value` up to a multiple of `align`
pub fn round_up(value: u64, align: u64) -> u64 {
    if align == 0 {
        return value;
    }
    value.div_ceil(align).saturating_mul(align)
}

/// Header layout of one attribute stream flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttrFormat {
    pub header_type: &'static str,
    pub len_field: &'static str,
    pub tag_field: &'static str,
    pub align: u64,
}

pub const NETLINK: AttrFormat = AttrFormat {
    header_type: NLATTR,
    len_field: "nla_len",
    tag_field: "nla_type",
    align: 4,
};

pub const OFPACT: AttrFormat = AttrFormat {
    header_type: names::OFPACT,
    len_field: "len",
    tag_field: "type",
    align: 8,
};

/// One record of an attribute stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrRecord {
    pub header: TypedAddress,
    /// Header plus payload, excluding padding
    pub len: u64,
    pub tag: u64,
    pub header_size: u64,
}

impl AttrRecord {
    pub fn address(&self) -> u64 {
        self.header.address()
    }

    pub fn payload_len(&self) -> u64 {
        self.len.saturating_sub(self.header_size)
    }

    pub fn payload_address(&self) -> u64 {
        self.address().wrapping_add(self.header_size)
    }

    /// Read the payload bytes
    pub fn payload(&self, oracle: &dyn Oracle) -> Result<Vec<u8>> {
        oracle.read_bytes(self.payload_address(), self.payload_len() as usize)
    }

    /// Netlink type with the nested/byte-order flag bits cleared
    pub fn netlink_type(&self) -> u16 {
        (self.tag as u16) & NLA_TYPE_MASK
    }

    pub fn is_nested(&self) -> bool {
        (self.tag as u16) & NLA_F_NESTED != 0
    }
}

/// Iterates the records of an attribute stream of `total_len` bytes
///
/// The walk stops at the first record that does not fit: fewer bytes left
/// than a header, a length shorter than a header, or a length running past
/// the end of the buffer. Trailing bytes after the last record are left
/// unconsumed and reported by `remaining()`.
pub struct AttrIter<'a> {
    oracle: &'a dyn Oracle,
    format: AttrFormat,
    cursor: u64,
    remaining: u64,
    done: bool,
}

impl<'a> AttrIter<'a> {
    pub fn new(oracle: &'a dyn Oracle, base: u64, total_len: u64, format: AttrFormat) -> Self {
        Self {
            oracle,
            format,
            cursor: base,
            remaining: total_len,
            done: false,
        }
    }

    pub fn netlink(oracle: &'a dyn Oracle, base: u64, total_len: u64) -> Self {
        Self::new(oracle, base, total_len, NETLINK)
    }

    pub fn ofpacts(oracle: &'a dyn Oracle, base: u64, total_len: u64) -> Self {
        Self::new(oracle, base, total_len, OFPACT)
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    fn step(&mut self) -> Result<Option<AttrRecord>> {
        let oracle = self.oracle;
        let format = self.format;

        let header_size = oracle.resolve_type(format.header_type)?.size;
        if self.remaining < header_size {
            if self.remaining > 0 {
                debug!(remaining = self.remaining, "trailing bytes after last attribute");
            }
            return Ok(None);
        }

        let len = field_uint(oracle, format.header_type, self.cursor, format.len_field)?;
        if len < header_size || len > self.remaining {
            debug!(
                address = format_args!("{:#x}", self.cursor),
                len,
                remaining = self.remaining,
                "malformed attribute, stopping"
            );
            return Ok(None);
        }
        let tag = field_uint(oracle, format.header_type, self.cursor, format.tag_field)?;

        let record = AttrRecord {
            header: TypedAddress::new(self.cursor, format.header_type),
            len,
            tag,
            header_size,
        };
        trace!(address = format_args!("{:#x}", self.cursor), len, tag, "attribute");

        let advance = round_up(len, format.align);
        self.cursor = self.cursor.wrapping_add(advance);
        self.remaining = self.remaining.saturating_sub(advance);
        Ok(Some(record))
    }
}

impl Iterator for AttrIter<'_> {
    type Item = Result<AttrRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.step().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}
