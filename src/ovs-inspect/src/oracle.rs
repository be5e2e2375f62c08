//! The type/memory oracle
//!
//! Everything the walkers know about the target comes through the `Oracle`
//! trait: type sizes, field offsets, symbol addresses and raw bytes. The
//! provided methods build typed reads on top of those primitives, with field
//! lookups memoized in the oracle's `TypeCache`.
//!
//! `Inspector` is the concrete oracle: a `Layout` paired with a
//! `MemorySource`.

use crate::cache::TypeCache;
use crate::error::{Error, Result};
use crate::layout::{FieldType, Layout, Symbol, TypeDescriptor};
use crate::names::MAX_STRING_LEN;
use crate::source::MemorySource;

use byteorder::{ByteOrder, LE};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A scalar read from the target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Address(u64),
    Str(String),
}

impl Value {
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::UInt(v) | Value::Address(v) => Some(*v),
            Value::Int(v) => Some(*v as u64),
            Value::Str(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::UInt(v) | Value::Address(v) => Some(*v as i64),
            Value::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Address(v) => write!(f, "{:#x}", v),
            Value::Str(s) => write!(f, "{:?}", s),
        }
    }
}

/// Where a (possibly nested) field lives inside its containing type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLocation {
    pub offset: u64,
    pub ty: FieldType,
    pub size: u64,
}

pub trait Oracle {
    /// Look up a type by name (`struct hmap`, `struct cmap_node`, ...)
    fn resolve_type(&self, name: &str) -> Result<Arc<TypeDescriptor>>;

    /// Look up a global variable, relocated to its runtime address
    fn resolve_symbol(&self, name: &str) -> Result<Symbol>;

    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>>;

    fn pointer_size(&self) -> usize;

    fn cache_line_size(&self) -> usize;

    fn cache(&self) -> &TypeCache;

    /// Name of the enumerator of `enum_name` with value `value`, if known
    fn enum_name(&self, _enum_name: &str, _value: u64) -> Option<String> {
        None
    }

    fn size_of(&self, ty: &FieldType) -> Result<u64> {
        Ok(match ty {
            FieldType::Int { size, .. } => *size as u64,
            FieldType::Bool => 1,
            FieldType::Pointer { .. } | FieldType::CString => self.pointer_size() as u64,
            FieldType::CharArray(n) => *n as u64,
            FieldType::Aggregate(name) => self.resolve_type(name)?.size,
            FieldType::Array { element, count } => match count {
                Some(n) => self
                    .size_of(element)?
                    .checked_mul(*n as u64)
                    .ok_or_else(|| Error::Layout(format!("size of {} overflows", ty)))?,
                None => 0,
            },
        })
    }

    /// Resolve a field path such as `key_node[1].key.zone` within `type_name`
    fn field(&self, type_name: &str, path: &str) -> Result<FieldLocation> {
        if let Some(location) = self.cache().get_field(type_name, path) {
            return Ok(location);
        }
        let location = resolve_path(self, type_name, path)?;
        self.cache().insert_field(type_name, path, location.clone());
        Ok(location)
    }

    /// Read the scalar at `path` of the `ty` record at `address`
    fn read_value(&self, address: u64, ty: &TypeDescriptor, path: &str) -> Result<Value> {
        let location = self.field(&ty.name, path)?;
        if !location.ty.is_scalar() {
            return Err(Error::NotScalar {
                type_name: ty.name.clone(),
                field: path.to_string(),
            });
        }
        self.read_scalar(address.wrapping_add(location.offset), &location.ty)
    }

    /// Read one scalar of type `ty` at `address`
    fn read_scalar(&self, address: u64, ty: &FieldType) -> Result<Value> {
        match ty {
            FieldType::Int { size, signed: true } => {
                Ok(Value::Int(self.read_int(address, *size as usize)?))
            }
            FieldType::Int { size, signed: false } => {
                Ok(Value::UInt(self.read_uint(address, *size as usize)?))
            }
            FieldType::Bool => Ok(Value::UInt((self.read_uint(address, 1)? != 0) as u64)),
            FieldType::Pointer { .. } => Ok(Value::Address(self.read_ptr(address)?)),
            FieldType::CString => {
                let ptr = self.read_ptr(address)?;
                if ptr == 0 {
                    Ok(Value::Address(0))
                } else {
                    Ok(Value::Str(self.read_cstring(ptr, MAX_STRING_LEN)?))
                }
            }
            FieldType::CharArray(n) => {
                let bytes = self.read_bytes(address, *n)?;
                let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
                Ok(Value::Str(String::from_utf8_lossy(&bytes[..end]).into_owned()))
            }
            FieldType::Aggregate(_) | FieldType::Array { .. } => Err(Error::NotScalar {
                type_name: ty.to_string(),
                field: String::new(),
            }),
        }
    }

    /// Little-endian unsigned integer of 1, 2, 4 or 8 bytes
    fn read_uint(&self, address: u64, size: usize) -> Result<u64> {
        if !matches!(size, 1 | 2 | 4 | 8) {
            return Err(Error::InvalidFieldType(format!("{}-byte integer", size)));
        }
        let bytes = self.read_bytes(address, size)?;
        Ok(LE::read_uint(&bytes, size))
    }

    /// Little-endian signed integer of 1, 2, 4 or 8 bytes
    fn read_int(&self, address: u64, size: usize) -> Result<i64> {
        if !matches!(size, 1 | 2 | 4 | 8) {
            return Err(Error::InvalidFieldType(format!("{}-byte integer", size)));
        }
        let bytes = self.read_bytes(address, size)?;
        Ok(LE::read_int(&bytes, size))
    }

    fn read_ptr(&self, address: u64) -> Result<u64> {
        self.read_uint(address, self.pointer_size())
    }

    /// Read a NUL-terminated string of at most `max_len` bytes
    ///
    /// Reads in small aligned chunks so a string ending just before an
    /// unmapped page is still readable.
    fn read_cstring(&self, address: u64, max_len: usize) -> Result<String> {
        const CHUNK: u64 = 32;

        let mut out = Vec::new();
        let mut cursor = address;
        while out.len() < max_len {
            let to_boundary = (CHUNK - cursor % CHUNK) as usize;
            let len = to_boundary.min(max_len - out.len());
            let chunk = self.read_bytes(cursor, len)?;
            if let Some(end) = chunk.iter().position(|&b| b == 0) {
                out.extend_from_slice(&chunk[..end]);
                break;
            }
            out.extend_from_slice(&chunk);
            cursor = cursor.wrapping_add(len as u64);
        }
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// Split one path segment into its name and array indices: `nodes[2]`
fn parse_segment<'a>(type_name: &str, segment: &'a str) -> Result<(&'a str, Vec<usize>)> {
    let bad = || Error::unknown_field(type_name, segment);

    let (name, mut rest) = match segment.find('[') {
        Some(i) => (&segment[..i], &segment[i..]),
        None => (segment, ""),
    };
    if name.is_empty() {
        return Err(bad());
    }

    let mut indices = Vec::new();
    while !rest.is_empty() {
        let close = rest.find(']').ok_or_else(bad)?;
        if !rest.starts_with('[') {
            return Err(bad());
        }
        indices.push(rest[1..close].trim().parse::<usize>().map_err(|_| bad())?);
        rest = &rest[close + 1..];
    }
    Ok((name, indices))
}

fn resolve_path<O: Oracle + ?Sized>(
    oracle: &O,
    type_name: &str,
    path: &str,
) -> Result<FieldLocation> {
    let mut current = type_name.to_string();
    let mut offset = 0u64;
    let mut ty: Option<FieldType> = None;

    for segment in path.split('.') {
        if let Some(previous) = ty.take() {
            current = match previous {
                FieldType::Aggregate(name) => name,
                _ => return Err(Error::unknown_field(&current, segment)),
            };
        }

        let (name, indices) = parse_segment(&current, segment)?;
        let descriptor = oracle.resolve_type(&current)?;
        let field = descriptor.field(name)?;
        let overflow = || Error::unknown_field(&current, segment);
        offset = offset.checked_add(field.offset).ok_or_else(overflow)?;
        let mut field_ty = field.ty.clone();

        for index in indices {
            field_ty = match field_ty {
                FieldType::Array { element, count } => {
                    if count.is_some_and(|n| index >= n) {
                        return Err(Error::unknown_field(&current, segment));
                    }
                    offset = oracle
                        .size_of(&element)?
                        .checked_mul(index as u64)
                        .and_then(|delta| offset.checked_add(delta))
                        .ok_or_else(overflow)?;
                    *element
                }
                FieldType::CharArray(n) if index < n => {
                    offset = offset.checked_add(index as u64).ok_or_else(overflow)?;
                    FieldType::Int { size: 1, signed: false }
                }
                _ => return Err(Error::unknown_field(&current, segment)),
            };
        }
        ty = Some(field_ty);
    }

    let ty = ty.ok_or_else(|| Error::unknown_field(type_name, path))?;
    let size = oracle.size_of(&ty)?;
    Ok(FieldLocation { offset, ty, size })
}

/// Oracle backed by a layout and a memory source
pub struct Inspector<S> {
    layout: Layout,
    layout_path: Option<PathBuf>,
    source: S,
    cache: TypeCache,
}

impl<S: MemorySource> Inspector<S> {
    pub fn new(layout: Layout, source: S) -> Self {
        Self {
            layout,
            layout_path: None,
            source,
            cache: TypeCache::new(),
        }
    }

    /// Built-in layout overlaid with the layout file at `path`
    pub fn with_layout_file<P: AsRef<Path>>(path: P, source: S) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let layout = load_overlay(&path)?;
        Ok(Self {
            layout,
            layout_path: Some(path),
            source,
            cache: TypeCache::new(),
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Swap in a new layout, dropping everything cached from the old one
    pub fn reload_layout(&mut self, layout: Layout) {
        self.layout = layout;
        self.cache.invalidate();
    }

    /// Re-read the source's mappings; when loaded objects changed, reload
    /// the layout file and invalidate the type cache.
    pub fn refresh(&mut self) -> Result<bool> {
        if !self.source.refresh()? {
            return Ok(false);
        }
        if let Some(path) = &self.layout_path {
            self.layout = load_overlay(path)?;
            info!(path = %path.display(), "layout reloaded");
        }
        self.cache.invalidate();
        Ok(true)
    }
}

fn load_overlay(path: &Path) -> Result<Layout> {
    let mut layout = Layout::builtin()?;
    layout.merge(Layout::from_path(path)?);
    debug!(
        path = %path.display(),
        types = layout.types.len(),
        symbols = layout.symbols.len(),
        "layout loaded"
    );
    Ok(layout)
}

impl<S: MemorySource> Oracle for Inspector<S> {
    fn resolve_type(&self, name: &str) -> Result<Arc<TypeDescriptor>> {
        if let Some(descriptor) = self.cache.get_type(name) {
            return Ok(descriptor);
        }
        let descriptor = self
            .layout
            .types
            .get(name)
            .cloned()
            .map(Arc::new)
            .ok_or_else(|| Error::UnknownType(name.to_string()))?;
        self.cache.insert_type(descriptor.clone());
        Ok(descriptor)
    }

    fn resolve_symbol(&self, name: &str) -> Result<Symbol> {
        let entry = self
            .layout
            .symbols
            .get(name)
            .ok_or_else(|| Error::UnknownSymbol(name.to_string()))?;

        let base = match &self.layout.module {
            Some(module) => self.source.module_base(module).ok_or_else(|| {
                Error::Layout(format!("module '{}' is not mapped in the target", module))
            })?,
            None => 0,
        };

        Ok(Symbol {
            name: name.to_string(),
            address: base.wrapping_add(entry.address),
            type_name: entry.type_name.clone(),
        })
    }

    fn read_bytes(&self, address: u64, len: usize) -> Result<Vec<u8>> {
        self.source.read_bytes(address, len)
    }

    fn pointer_size(&self) -> usize {
        self.layout.pointer_size()
    }

    fn cache_line_size(&self) -> usize {
        self.layout.cache_line_size()
    }

    fn cache(&self) -> &TypeCache {
        &self.cache
    }

    fn enum_name(&self, enum_name: &str, value: u64) -> Option<String> {
        self.layout.enum_name(enum_name, value).map(str::to_string)
    }
}
