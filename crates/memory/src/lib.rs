//! Remote process memory access primitives
//!
//! Everything the engine reads from the target process goes through the
//! [`ProcessMemory`] trait: raw bytes, little-endian scalars, and
//! NUL-terminated C strings. A live-process implementation lives with the
//! platform glue; this crate ships [`SnapshotMemory`], which serves captured
//! memory regions and doubles as the fixture backend for tests.

pub mod snapshot;

pub use snapshot::SnapshotMemory;

use byteorder::{ByteOrder, LittleEndian};
use periscope_core::{Address, Error, Result};

/// Longest C string we are willing to chase before declaring it malformed.
const MAX_CSTRING_LEN: usize = 512;

/// A little-endian scalar that can be read from (or written into) raw bytes.
pub trait Scalar: Sized + Copy {
    const SIZE: usize;

    fn from_le_bytes(bytes: &[u8]) -> Self;
    fn to_le_bytes(self, out: &mut [u8]);
}

macro_rules! impl_scalar {
    ($ty:ty, $size:expr, $read:path, $write:path) => {
        impl Scalar for $ty {
            const SIZE: usize = $size;

            fn from_le_bytes(bytes: &[u8]) -> Self {
                $read(bytes)
            }

            fn to_le_bytes(self, out: &mut [u8]) {
                $write(out, self)
            }
        }
    };
}

impl Scalar for u8 {
    const SIZE: usize = 1;

    fn from_le_bytes(bytes: &[u8]) -> Self {
        bytes[0]
    }

    fn to_le_bytes(self, out: &mut [u8]) {
        out[0] = self;
    }
}

impl Scalar for i8 {
    const SIZE: usize = 1;

    fn from_le_bytes(bytes: &[u8]) -> Self {
        bytes[0] as i8
    }

    fn to_le_bytes(self, out: &mut [u8]) {
        out[0] = self as u8;
    }
}

impl_scalar!(u16, 2, LittleEndian::read_u16, LittleEndian::write_u16);
impl_scalar!(i16, 2, LittleEndian::read_i16, LittleEndian::write_i16);
impl_scalar!(u32, 4, LittleEndian::read_u32, LittleEndian::write_u32);
impl_scalar!(i32, 4, LittleEndian::read_i32, LittleEndian::write_i32);
impl_scalar!(u64, 8, LittleEndian::read_u64, LittleEndian::write_u64);
impl_scalar!(i64, 8, LittleEndian::read_i64, LittleEndian::write_i64);
impl_scalar!(f32, 4, LittleEndian::read_f32, LittleEndian::write_f32);
impl_scalar!(f64, 8, LittleEndian::read_f64, LittleEndian::write_f64);

/// Byte-level access to a foreign address space.
///
/// A failed read means the process is gone or the address is unmapped; it is
/// surfaced as [`Error::RemoteRead`] and callers treat it as fatal for the
/// operation in progress.
pub trait ProcessMemory {
    /// Read `len` raw bytes starting at `addr`.
    fn read_bytes(&self, addr: Address, len: usize) -> Result<Vec<u8>>;

    /// Read one little-endian scalar at `addr`.
    fn read_scalar<T: Scalar>(&self, addr: Address) -> Result<T> {
        let bytes = self.read_bytes(addr, T::SIZE)?;
        Ok(T::from_le_bytes(&bytes))
    }

    /// Read a pointer of the given width and widen it to an [`Address`].
    fn read_ptr(&self, addr: Address, ptr_size: usize) -> Result<Address> {
        match ptr_size {
            4 => Ok(Address::from(self.read_scalar::<u32>(addr)?)),
            8 => Ok(Address::from(self.read_scalar::<u64>(addr)?)),
            other => Err(Error::decode(format!("unsupported pointer size {other}"))),
        }
    }

    /// Read a NUL-terminated C string at `addr`.
    ///
    /// Reads one byte at a time so a short string near the end of a mapped
    /// region never triggers an over-read into unmapped memory.
    fn read_cstring(&self, addr: Address) -> Result<String> {
        let mut out = Vec::new();
        for i in 0..MAX_CSTRING_LEN {
            let b = self.read_scalar::<u8>(addr + i as u64)?;
            if b == 0 {
                return Ok(String::from_utf8_lossy(&out).into_owned());
            }
            out.push(b);
        }
        Err(Error::decode(format!(
            "no NUL terminator within {MAX_CSTRING_LEN} bytes at {addr}"
        )))
    }

    /// Read a C string behind one extra pointer hop.
    fn read_cstring_indirect(&self, addr: Address, ptr_size: usize) -> Result<String> {
        let ptr = self.read_ptr(addr, ptr_size)?;
        self.read_cstring(ptr)
    }
}
