//! `System.String` decoding
//!
//! A managed string stores its length as a field and its UTF-16 code units
//! inline, starting at the first-char field. The character buffer is read in
//! one shot from the *address* of that field, which is why decoded values
//! carry their source address.

use crate::catalog::ImageCatalog;
use crate::object::ObjectHandle;
use periscope_core::{Error, Result};
use periscope_memory::ProcessMemory;

const LENGTH_FIELD: &str = "m_stringLength";
const FIRST_CHAR_FIELD: &str = "m_firstChar";

/// Decode a `System.String` object to UTF-8.
pub fn decode_string<M: ProcessMemory>(
    catalog: &mut ImageCatalog,
    mem: &M,
    obj: &ObjectHandle,
) -> Result<String> {
    let len = obj
        .get(catalog, mem, LENGTH_FIELD)?
        .as_i32()
        .ok_or_else(|| Error::decode("string length field is not Int4"))?;
    if len < 0 {
        return Err(Error::decode(format!("negative string length {len}")));
    }
    if len == 0 {
        return Ok(String::new());
    }

    let first_char = obj.get(catalog, mem, FIRST_CHAR_FIELD)?;
    let bytes = mem.read_bytes(first_char.addr(), len as usize * 2)?;
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16(&units).map_err(|_| Error::decode("managed string is not valid UTF-16"))
}
