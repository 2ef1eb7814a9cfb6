//! `System.Nullable<T>` for scalar payloads
//!
//! The field offsets reported for Nullable do not match its in-memory
//! layout on the supported runtime; reading through them yields garbage. The
//! actual layout is the payload at the struct base with the has-value byte
//! directly after it, so this decoder reads bytes at fixed positions and
//! skips the field table entirely.

use crate::object::ObjectHandle;
use periscope_core::Result;
use periscope_memory::{ProcessMemory, Scalar};

#[derive(Debug, Clone, Copy)]
pub struct Nullable<T: Scalar> {
    value: T,
    has_value: bool,
}

impl<T: Scalar> Nullable<T> {
    /// Read a nullable whose payload starts at the handle's address (an
    /// inline value-type handle, as produced for generic value-type fields).
    pub fn read<M: ProcessMemory>(mem: &M, obj: &ObjectHandle) -> Result<Self> {
        let value = mem.read_scalar::<T>(obj.addr())?;
        let has_value = mem.read_scalar::<u8>(obj.addr() + T::SIZE as u64)? != 0;
        Ok(Self { value, has_value })
    }

    pub fn has_value(&self) -> bool {
        self.has_value
    }

    /// The payload bytes, meaningful only when `has_value`.
    pub fn value(&self) -> T {
        self.value
    }

    pub fn get(&self) -> Option<T> {
        if self.has_value {
            Some(self.value)
        } else {
            None
        }
    }
}
