//! Embedded-node address arithmetic
//!
//! OVS containers link records through embedded nodes. Getting from a node
//! back to its record is `container_of`; the reverse is `member_of`. Neither
//! touches target memory, so the pointer passed in is never dereferenced and
//! the arithmetic wraps instead of failing.

use crate::error::Result;
use crate::oracle::Oracle;
use crate::typed::TypedAddress;

/// Byte offset of `field` (a path) within `type_name`
pub fn offset_of(oracle: &dyn Oracle, type_name: &str, field: &str) -> Result<u64> {
    TypedAddress::new(0, type_name).field_address(oracle, field)
}

/// The `type_name` record whose `field` lives at `pointer`
pub fn container_of(
    pointer: u64,
    oracle: &dyn Oracle,
    type_name: &str,
    field: &str,
) -> Result<TypedAddress> {
    let offset = offset_of(oracle, type_name, field)?;
    Ok(TypedAddress::new(pointer.wrapping_sub(offset), type_name))
}

/// Address of `field` inside the `type_name` record at `record`
pub fn member_of(record: u64, oracle: &dyn Oracle, type_name: &str, field: &str) -> Result<u64> {
    let offset = offset_of(oracle, type_name, field)?;
    Ok(record.wrapping_add(offset))
}
