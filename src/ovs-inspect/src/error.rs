//! Error types shared by the oracle, the memory sources and the walkers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot resolve type '{0}'")]
    UnknownType(String),

    #[error("cannot find symbol '{0}', is this an Open vSwitch process?")]
    UnknownSymbol(String),

    #[error("type '{type_name}' has no field '{field}'")]
    UnknownField { type_name: String, field: String },

    #[error("cannot read {len} bytes at {address:#x}: {reason}")]
    UnreadableMemory {
        address: u64,
        len: usize,
        reason: String,
    },

    #[error("field '{field}' of '{type_name}' is not a scalar")]
    NotScalar { type_name: String, field: String },

    #[error("cannot reinterpret '{from}' ({from_size} bytes) as '{to}' ({to_size} bytes)")]
    InvalidCast {
        from: String,
        from_size: u64,
        to: String,
        to_size: u64,
    },

    #[error("invalid field type '{0}'")]
    InvalidFieldType(String),

    #[error("invalid layout: {0}")]
    Layout(String),

    #[error("process not found: {0}")]
    ProcessNotFound(String),

    #[error("failed to attach to process {pid}: {reason}")]
    Attach { pid: u32, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML layout: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse JSON layout: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to parse TOML layout: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn unreadable(address: u64, len: usize, reason: impl Into<String>) -> Self {
        Error::UnreadableMemory {
            address,
            len,
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_field(type_name: &str, field: &str) -> Self {
        Error::UnknownField {
            type_name: type_name.to_string(),
            field: field.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
