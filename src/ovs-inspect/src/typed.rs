//! Typed addresses
//!
//! A `TypedAddress` is a raw target address paired with the name of the
//! type stored there. It never owns target memory; every accessor goes back
//! through the oracle.

use crate::error::{Error, Result};
use crate::oracle::{Oracle, Value};

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypedAddress {
    address: u64,
    type_name: Arc<str>,
}

impl TypedAddress {
    pub fn new(address: u64, type_name: impl Into<Arc<str>>) -> Self {
        Self {
            address,
            type_name: type_name.into(),
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn is_null(&self) -> bool {
        self.address == 0
    }

    /// View the same address as another type
    ///
    /// Fails when the new type is larger than the current one, since the
    /// extra bytes were never part of this object.
    pub fn reinterpret(&self, oracle: &dyn Oracle, type_name: &str) -> Result<TypedAddress> {
        let from = oracle.resolve_type(&self.type_name)?;
        let to = oracle.resolve_type(type_name)?;
        if to.size > from.size {
            return Err(Error::InvalidCast {
                from: from.name.clone(),
                from_size: from.size,
                to: to.name.clone(),
                to_size: to.size,
            });
        }
        Ok(TypedAddress::new(self.address, type_name))
    }

    /// Address of the field at `path`
    pub fn field_address(&self, oracle: &dyn Oracle, path: &str) -> Result<u64> {
        let location = oracle.field(&self.type_name, path)?;
        Ok(self.address.wrapping_add(location.offset))
    }

    pub fn value(&self, oracle: &dyn Oracle, path: &str) -> Result<Value> {
        let ty = oracle.resolve_type(&self.type_name)?;
        oracle.read_value(self.address, &ty, path)
    }

    pub fn uint(&self, oracle: &dyn Oracle, path: &str) -> Result<u64> {
        self.value(oracle, path)?
            .as_u64()
            .ok_or_else(|| self.not_scalar(path))
    }

    pub fn int(&self, oracle: &dyn Oracle, path: &str) -> Result<i64> {
        self.value(oracle, path)?
            .as_i64()
            .ok_or_else(|| self.not_scalar(path))
    }

    /// Raw pointer value of a pointer (or `char *`) field
    pub fn pointer(&self, oracle: &dyn Oracle, path: &str) -> Result<u64> {
        let address = self.field_address(oracle, path)?;
        oracle.read_ptr(address)
    }

    /// String contents of a `char *` or `char[N]` field; NULL reads as ""
    pub fn string(&self, oracle: &dyn Oracle, path: &str) -> Result<String> {
        match self.value(oracle, path)? {
            Value::Str(s) => Ok(s),
            Value::Address(0) => Ok(String::new()),
            _ => Err(self.not_scalar(path)),
        }
    }

    /// The embedded member at `path`, typed by its declared type
    pub fn member(&self, oracle: &dyn Oracle, path: &str) -> Result<TypedAddress> {
        let location = oracle.field(&self.type_name, path)?;
        Ok(TypedAddress::new(
            self.address.wrapping_add(location.offset),
            location.ty.type_name(),
        ))
    }

    /// Follow the pointer field at `path`; untyped pointers give `void`
    pub fn deref(&self, oracle: &dyn Oracle, path: &str) -> Result<TypedAddress> {
        let location = oracle.field(&self.type_name, path)?;
        let target = match &location.ty {
            crate::layout::FieldType::Pointer { target: Some(t) } => t.clone(),
            _ => "void".to_string(),
        };
        let pointer = oracle.read_ptr(self.address.wrapping_add(location.offset))?;
        Ok(TypedAddress::new(pointer, target))
    }

    fn not_scalar(&self, path: &str) -> Error {
        Error::NotScalar {
            type_name: self.type_name.to_string(),
            field: path.to_string(),
        }
    }
}

impl fmt::Display for TypedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} *) {:#x}", self.type_name, self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::oracle::Inspector;
    use crate::source::MockMemorySource;

    const BASE: u64 = 0x20000;

    fn oracle() -> Inspector<MockMemorySource> {
        let mut mem = MockMemorySource::zeroed(BASE, 0x100);
        // struct smap_node at BASE
        mem.write_u64(BASE, 7);
        mem.write_u64(BASE + 8, BASE + 0x40);
        mem.write_u64(BASE + 16, BASE + 0x80);
        mem.write_cstring(BASE + 0x80, "other_config");
        Inspector::new(Layout::builtin().unwrap(), mem)
    }

    #[test]
    fn test_typed_accessors() {
        let oracle = oracle();
        let node = TypedAddress::new(BASE, "struct smap_node");

        assert!(!node.is_null());
        assert_eq!(node.uint(&oracle, "node.hash").unwrap(), 7);
        assert_eq!(node.pointer(&oracle, "node.next").unwrap(), BASE + 0x40);
        assert_eq!(node.pointer(&oracle, "key").unwrap(), BASE + 0x80);
        assert_eq!(node.string(&oracle, "key").unwrap(), "other_config");
        assert_eq!(node.string(&oracle, "value").unwrap(), "");
        assert!(matches!(node.string(&oracle, "node.hash"), Err(Error::NotScalar { .. })));
    }

    #[test]
    fn test_member_and_deref() {
        let oracle = oracle();
        let node = TypedAddress::new(BASE, "struct smap_node");

        let hmap_node = node.member(&oracle, "node").unwrap();
        assert_eq!(hmap_node, TypedAddress::new(BASE, "struct hmap_node"));

        let next = hmap_node.deref(&oracle, "next").unwrap();
        assert_eq!(next.address(), BASE + 0x40);
        assert_eq!(next.type_name(), "struct hmap_node");
    }

    #[test]
    fn test_reinterpret_size_check() {
        let oracle = oracle();
        let node = TypedAddress::new(BASE, "struct smap_node");

        let as_hmap_node = node.reinterpret(&oracle, "struct hmap_node").unwrap();
        assert_eq!(as_hmap_node.address(), BASE);

        assert!(matches!(
            as_hmap_node.reinterpret(&oracle, "struct smap_node"),
            Err(Error::InvalidCast { from_size: 16, to_size: 32, .. })
        ));
        assert!(matches!(
            node.reinterpret(&oracle, "struct nope"),
            Err(Error::UnknownType(_))
        ));
    }

    #[test]
    fn test_display() {
        let t = TypedAddress::new(0x7f00_1234, "struct cmap_node");
        assert_eq!(t.to_string(), "(struct cmap_node *) 0x7f001234");
        assert!(TypedAddress::new(0, "struct ovs_list").is_null());
    }
}
