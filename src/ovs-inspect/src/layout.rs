//! Layout files: the target's type and symbol metadata
//!
//! A layout describes structs the way the target binary was compiled: their
//! sizes, field offsets and field types, plus the addresses of a few global
//! symbols. Layouts are usually generated from the binary's debug info once
//! per build and loaded from YAML, JSON or TOML.

use crate::error::{Error, Result};

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Built-in layout for the container types of a 64-bit x86 build
const BUILTIN_LAYOUT: &str = include_str!("../layouts/ovs-x86_64.yaml");

/// The type of a single struct field
///
/// Written in layout files with a compact grammar:
///
/// | text | meaning |
/// |---|---|
/// | `u8` .. `u64`, `i8` .. `i64` | little-endian integer |
/// | `bool` | one-byte boolean |
/// | `ptr`, `ptr<struct foo>` | pointer, optionally to a known type |
/// | `cstr` | `char *` pointing at a NUL-terminated string |
/// | `char[16]` | inline character array |
/// | `struct foo` | embedded aggregate |
/// | `T[4]`, `T[]` | fixed or flexible array of `T` |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldType {
    Int { size: u8, signed: bool },
    Bool,
    Pointer { target: Option<String> },
    CString,
    CharArray(usize),
    Aggregate(String),
    Array {
        element: Box<FieldType>,
        count: Option<usize>,
    },
}

impl FieldType {
    /// Whether a value of this type can be read as a single `Value`
    pub fn is_scalar(&self) -> bool {
        !matches!(self, FieldType::Aggregate(_) | FieldType::Array { .. })
    }

    /// Name used when this field is viewed as a `TypedAddress`
    pub fn type_name(&self) -> String {
        match self {
            FieldType::Aggregate(name) => name.clone(),
            other => other.to_string(),
        }
    }
}

impl FromStr for FieldType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidFieldType(s.to_string()));
        }

        if let Some(body) = s.strip_suffix(']') {
            let open = body
                .rfind('[')
                .ok_or_else(|| Error::InvalidFieldType(s.to_string()))?;
            let element = body[..open].trim();
            let count = body[open + 1..].trim();
            let count = if count.is_empty() {
                None
            } else {
                Some(
                    count
                        .parse::<usize>()
                        .map_err(|_| Error::InvalidFieldType(s.to_string()))?,
                )
            };

            if element == "char" {
                return count
                    .map(FieldType::CharArray)
                    .ok_or_else(|| Error::InvalidFieldType(s.to_string()));
            }
            return Ok(FieldType::Array {
                element: Box::new(element.parse()?),
                count,
            });
        }

        if let Some(inner) = s.strip_prefix("ptr<") {
            let target = inner
                .strip_suffix('>')
                .ok_or_else(|| Error::InvalidFieldType(s.to_string()))?
                .trim();
            if target.is_empty() {
                return Err(Error::InvalidFieldType(s.to_string()));
            }
            return Ok(FieldType::Pointer {
                target: Some(target.to_string()),
            });
        }

        let ty = match s {
            "u8" => FieldType::Int { size: 1, signed: false },
            "u16" => FieldType::Int { size: 2, signed: false },
            "u32" => FieldType::Int { size: 4, signed: false },
            "u64" => FieldType::Int { size: 8, signed: false },
            "i8" => FieldType::Int { size: 1, signed: true },
            "i16" => FieldType::Int { size: 2, signed: true },
            "i32" => FieldType::Int { size: 4, signed: true },
            "i64" => FieldType::Int { size: 8, signed: true },
            "bool" => FieldType::Bool,
            "ptr" => FieldType::Pointer { target: None },
            "cstr" => FieldType::CString,
            name => FieldType::Aggregate(name.to_string()),
        };
        Ok(ty)
    }
}

impl TryFrom<String> for FieldType {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Int { size, signed } => {
                write!(f, "{}{}", if *signed { 'i' } else { 'u' }, *size as u32 * 8)
            }
            FieldType::Bool => write!(f, "bool"),
            FieldType::Pointer { target: None } => write!(f, "ptr"),
            FieldType::Pointer { target: Some(t) } => write!(f, "ptr<{}>", t),
            FieldType::CString => write!(f, "cstr"),
            FieldType::CharArray(n) => write!(f, "char[{}]", n),
            FieldType::Aggregate(name) => write!(f, "{}", name),
            FieldType::Array { element, count } => match count {
                Some(n) => write!(f, "{}[{}]", element, n),
                None => write!(f, "{}[]", element),
            },
        }
    }
}

/// One field of a struct
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    #[serde(deserialize_with = "hex_or_int")]
    pub offset: u64,
    #[serde(rename = "type")]
    pub ty: FieldType,
}

/// Size and field offsets of one target type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Filled from the layout's map key when loading
    #[serde(default, skip_serializing)]
    pub name: String,
    #[serde(deserialize_with = "hex_or_int")]
    pub size: u64,
    #[serde(default)]
    pub fields: BTreeMap<String, FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn field(&self, name: &str) -> Result<&FieldDescriptor> {
        self.fields
            .get(name)
            .ok_or_else(|| Error::unknown_field(&self.name, name))
    }

    pub fn field_offset(&self, name: &str) -> Result<u64> {
        self.field(name).map(|f| f.offset)
    }
}

/// A global variable of the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolEntry {
    #[serde(deserialize_with = "hex_or_int")]
    pub address: u64,
    #[serde(rename = "type")]
    pub type_name: String,
}

/// A resolved (relocated) symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u64,
    pub type_name: String,
}

/// Type and symbol metadata for one build of the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    /// Unset means 8; see `pointer_size()`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer_size: Option<usize>,
    /// Unset means 64; see `cache_line_size()`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_line_size: Option<usize>,
    /// When set, symbol addresses are relative to this module's load base
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub types: BTreeMap<String, TypeDescriptor>,
    #[serde(default)]
    pub symbols: BTreeMap<String, SymbolEntry>,
    /// `enum name -> (enumerator -> value)`
    #[serde(default)]
    pub enums: BTreeMap<String, BTreeMap<String, u64>>,
}

const DEFAULT_POINTER_SIZE: usize = 8;
const DEFAULT_CACHE_LINE_SIZE: usize = 64;

/// Accept `64`, `"64"` or `"0x40"`
fn hex_or_int<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(n) => Ok(n),
        Raw::Str(s) => parse_number(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("'{}' is not a number", s))
        }),
    }
}

/// Parse a hex (`0x`-prefixed) or decimal number
pub fn parse_number(s: &str) -> Option<u64> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

impl Layout {
    /// The built-in layout covering the generic container types
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_LAYOUT)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str::<Layout>(text)?.finish()
    }

    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str::<Layout>(text)?.finish()
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str::<Layout>(text)?.finish()
    }

    /// Load a layout file, picking the format from its extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            Some("json") => Self::from_json(&text),
            Some("toml") => Self::from_toml(&text),
            other => Err(Error::Layout(format!(
                "unsupported layout file extension {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }

    pub fn pointer_size(&self) -> usize {
        self.pointer_size.unwrap_or(DEFAULT_POINTER_SIZE)
    }

    pub fn cache_line_size(&self) -> usize {
        self.cache_line_size.unwrap_or(DEFAULT_CACHE_LINE_SIZE)
    }

    /// Overlay another layout on this one; entries in `other` win, and
    /// sizes `other` leaves unset are kept
    pub fn merge(&mut self, other: Layout) {
        self.pointer_size = other.pointer_size.or(self.pointer_size);
        self.cache_line_size = other.cache_line_size.or(self.cache_line_size);
        if other.module.is_some() {
            self.module = other.module;
        }
        self.types.extend(other.types);
        self.symbols.extend(other.symbols);
        self.enums.extend(other.enums);
    }

    /// Name the enumerator of `enum_name` whose value is `value`
    pub fn enum_name(&self, enum_name: &str, value: u64) -> Option<&str> {
        self.enums
            .get(enum_name)?
            .iter()
            .find(|(_, v)| **v == value)
            .map(|(name, _)| name.as_str())
    }

    fn finish(mut self) -> Result<Self> {
        let pointer_size = self.pointer_size();
        if pointer_size != 4 && pointer_size != 8 {
            return Err(Error::Layout(format!(
                "pointer_size must be 4 or 8, got {}",
                pointer_size
            )));
        }
        if self.cache_line_size() == 0 {
            return Err(Error::Layout("cache_line_size must not be zero".to_string()));
        }
        for (name, ty) in self.types.iter_mut() {
            ty.name = name.clone();
            for (field_name, field) in &ty.fields {
                if field.offset > ty.size {
                    return Err(Error::Layout(format!(
                        "field '{}' of '{}' starts at {} past the type size {}",
                        field_name, name, field.offset, ty.size
                    )));
                }
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar_field_types() {
        assert_eq!("u16".parse::<FieldType>().unwrap(), FieldType::Int { size: 2, signed: false });
        assert_eq!("i64".parse::<FieldType>().unwrap(), FieldType::Int { size: 8, signed: true });
        assert_eq!("bool".parse::<FieldType>().unwrap(), FieldType::Bool);
        assert_eq!("cstr".parse::<FieldType>().unwrap(), FieldType::CString);
        assert_eq!("ptr".parse::<FieldType>().unwrap(), FieldType::Pointer { target: None });
    }

    #[test]
    fn test_parse_compound_field_types() {
        assert_eq!(
            "ptr<struct hmap_node>".parse::<FieldType>().unwrap(),
            FieldType::Pointer {
                target: Some("struct hmap_node".to_string())
            }
        );
        assert_eq!("char[16]".parse::<FieldType>().unwrap(), FieldType::CharArray(16));
        assert_eq!(
            "struct cmap_node[5]".parse::<FieldType>().unwrap(),
            FieldType::Array {
                element: Box::new(FieldType::Aggregate("struct cmap_node".to_string())),
                count: Some(5),
            }
        );
        assert_eq!(
            "u32[]".parse::<FieldType>().unwrap(),
            FieldType::Array {
                element: Box::new(FieldType::Int { size: 4, signed: false }),
                count: None,
            }
        );
    }

    #[test]
    fn test_parse_invalid_field_types() {
        assert!("".parse::<FieldType>().is_err());
        assert!("u8[x]".parse::<FieldType>().is_err());
        assert!("char[]".parse::<FieldType>().is_err());
        assert!("ptr<>".parse::<FieldType>().is_err());
        assert!("ptr<struct foo".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_field_type_display_matches_grammar() {
        for text in [
            "u8",
            "i32",
            "ptr",
            "ptr<struct bridge>",
            "cstr",
            "char[8]",
            "struct hmap",
            "u32[5]",
            "struct cmap_bucket[]",
        ] {
            assert_eq!(text.parse::<FieldType>().unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_builtin_layout_loads() {
        let layout = Layout::builtin().unwrap();
        assert_eq!(layout.pointer_size(), 8);
        assert_eq!(layout.cache_line_size(), 64);

        let hmap = &layout.types["struct hmap"];
        assert_eq!(hmap.name, "struct hmap");
        assert_eq!(hmap.size, 32);
        assert_eq!(hmap.field_offset("mask").unwrap(), 16);
        assert!(matches!(
            hmap.field_offset("count"),
            Err(Error::UnknownField { .. })
        ));

        assert_eq!(layout.types["struct cmap_bucket"].size, 64);
        assert_eq!(layout.types["struct nlattr"].size, 4);
    }

    #[test]
    fn test_json_and_toml_layouts() {
        let json = r#"{
            "pointer_size": 4,
            "types": { "struct pair": { "size": 8, "fields": {
                "a": { "offset": 0, "type": "u32" },
                "b": { "offset": "0x4", "type": "ptr<struct pair>" } } } },
            "symbols": { "head": { "address": "0x1000", "type": "struct pair" } },
            "enums": { "color": { "RED": 1, "BLUE": 2 } }
        }"#;
        let layout = Layout::from_json(json).unwrap();
        assert_eq!(layout.pointer_size(), 4);
        assert_eq!(layout.types["struct pair"].field_offset("b").unwrap(), 4);
        assert_eq!(layout.symbols["head"].address, 0x1000);
        assert_eq!(layout.enum_name("color", 2), Some("BLUE"));
        assert_eq!(layout.enum_name("color", 3), None);

        let toml_text = r#"
            module = "ovs-vswitchd"
            [types."struct pair"]
            size = 16
            [types."struct pair".fields]
            a = { offset = 0, type = "u64" }
            [symbols.head]
            address = "0x2a0"
            type = "struct pair"
        "#;
        let layout = Layout::from_toml(toml_text).unwrap();
        assert_eq!(layout.module.as_deref(), Some("ovs-vswitchd"));
        assert_eq!(layout.symbols["head"].address, 0x2a0);
    }

    #[test]
    fn test_layout_validation() {
        assert!(matches!(
            Layout::from_yaml("pointer_size: 2\n"),
            Err(Error::Layout(_))
        ));
        let bad_offset =
            "types:\n  struct x:\n    size: 4\n    fields:\n      a: { offset: 8, type: u32 }\n";
        assert!(matches!(Layout::from_yaml(bad_offset), Err(Error::Layout(_))));
        assert!(matches!(
            Layout::from_yaml(
                "types:\n  struct x:\n    size: 4\n    fields:\n      a: { offset: 0, type: \"u8[q]\" }\n"
            ),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn test_layout_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("layout.yaml");
        std::fs::write(
            &yaml,
            "symbols:\n  all_bridges: { address: 4096, type: struct hmap }\n",
        )
        .unwrap();
        assert_eq!(Layout::from_path(&yaml).unwrap().symbols["all_bridges"].address, 4096);

        let txt = dir.path().join("layout.txt");
        std::fs::write(&txt, "").unwrap();
        assert!(matches!(Layout::from_path(&txt), Err(Error::Layout(_))));
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = Layout::builtin().unwrap();
        let extra = Layout::from_yaml(
            "module: ovs-vswitchd\ntypes:\n  struct bridge:\n    size: 8\n    fields:\n      name: { offset: 0, type: cstr }\n",
        )
        .unwrap();
        base.merge(extra);
        assert!(base.types.contains_key("struct bridge"));
        assert!(base.types.contains_key("struct hmap"));
        assert_eq!(base.module.as_deref(), Some("ovs-vswitchd"));
    }

    #[test]
    fn test_merge_keeps_sizes_the_overlay_leaves_unset() {
        let mut base = Layout::from_yaml("pointer_size: 4\ncache_line_size: 32\n").unwrap();
        base.merge(Layout::from_yaml("module: ovs-vswitchd\n").unwrap());
        assert_eq!(base.pointer_size(), 4);
        assert_eq!(base.cache_line_size(), 32);

        base.merge(Layout::from_yaml("cache_line_size: 128\n").unwrap());
        assert_eq!(base.pointer_size(), 4);
        assert_eq!(base.cache_line_size(), 128);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0x10"), Some(16));
        assert_eq!(parse_number("0X1f"), Some(31));
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("all_bridges"), None);
    }
}
