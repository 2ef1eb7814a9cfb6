//! Error types for periscope

use crate::Address;
use thiserror::Error;

/// Main error type for the workspace.
///
/// Remote read failures are fatal for the operation that hit them; everything
/// else is recoverable and consumers are expected to treat it as "this
/// reading is currently unavailable" and retry on their next poll.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("remote read of {len} bytes at {addr} failed")]
    RemoteRead { addr: Address, len: usize },

    #[error("class not found: {0}")]
    ClassNotFound(String),

    #[error("field not found: {0}")]
    FieldNotFound(String),

    #[error("unsupported type tag {0:#04x}")]
    UnsupportedType(u8),

    #[error("field {0} is not static")]
    NotStatic(String),

    #[error("field {0} is a special static (offset -1), unsupported")]
    SpecialStatic(String),

    #[error("no vtable for class {class} in domain {domain_id}")]
    VTableUnavailable { class: String, domain_id: i32 },

    #[error("index {index} out of bounds (len {len})")]
    OutOfBounds { index: i64, len: u32 },

    #[error("decode error: {0}")]
    Decode(String),
}

/// Result type alias using our Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn remote_read(addr: Address, len: usize) -> Self {
        Self::RemoteRead { addr, len }
    }

    pub fn class_not_found(name: impl Into<String>) -> Self {
        Self::ClassNotFound(name.into())
    }

    pub fn field_not_found(name: impl Into<String>) -> Self {
        Self::FieldNotFound(name.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Whether the error is a remote I/O failure, i.e. the target process is
    /// gone or the address is unmapped. These abort the whole operation;
    /// everything else is a per-field condition the caller may skip.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Io(_) | Self::RemoteRead { .. })
    }
}
