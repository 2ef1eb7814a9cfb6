//! Buffer-backed process memory
//!
//! [`SnapshotMemory`] serves reads from a contiguous byte buffer captured at
//! a known base address. It backs two uses: decoding a module snapshot taken
//! from a live process, and building synthetic address spaces in tests.

use crate::{ProcessMemory, Scalar};
use periscope_core::{Address, Error, Result};
use tracing::debug;

/// A contiguous region of target memory held locally.
#[derive(Debug, Clone)]
pub struct SnapshotMemory {
    base: Address,
    data: Vec<u8>,
}

impl SnapshotMemory {
    /// Wrap an already-captured buffer that was read from `base`.
    pub fn new(base: Address, data: Vec<u8>) -> Self {
        debug!(%base, len = data.len(), "snapshot region attached");
        Self { base, data }
    }

    /// An all-zero region of `len` bytes starting at `base`.
    pub fn zeroed(base: Address, len: usize) -> Self {
        Self {
            base,
            data: vec![0; len],
        }
    }

    pub fn base(&self) -> Address {
        self.base
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn offset_of(&self, addr: Address, len: usize) -> Result<usize> {
        let start = addr
            .as_u64()
            .checked_sub(self.base.as_u64())
            .ok_or_else(|| Error::remote_read(addr, len))? as usize;
        let end = start
            .checked_add(len)
            .ok_or_else(|| Error::remote_read(addr, len))?;
        if end > self.data.len() {
            return Err(Error::remote_read(addr, len));
        }
        Ok(start)
    }

    /// Overwrite bytes inside the region. Panics if the range is outside the
    /// region; snapshot construction is a local, caller-controlled affair.
    pub fn write_bytes(&mut self, addr: Address, bytes: &[u8]) {
        let start = self
            .offset_of(addr, bytes.len())
            .expect("write outside snapshot region");
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Write one little-endian scalar into the region.
    pub fn write_scalar<T: Scalar>(&mut self, addr: Address, value: T) {
        let mut buf = [0u8; 8];
        value.to_le_bytes(&mut buf[..T::SIZE]);
        let bytes = buf[..T::SIZE].to_vec();
        self.write_bytes(addr, &bytes);
    }

    /// Write a NUL-terminated C string into the region.
    pub fn write_cstring(&mut self, addr: Address, s: &str) {
        let mut bytes = s.as_bytes().to_vec();
        bytes.push(0);
        self.write_bytes(addr, &bytes);
    }
}

impl ProcessMemory for SnapshotMemory {
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>> {
        let start = self.offset_of(addr, len)?;
        Ok(self.data[start..start + len].to_vec())
    }
}
