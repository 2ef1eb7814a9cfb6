//! Decoded runtime values
//!
//! A field read produces a [`DecodedValue`]: one of a closed set of host
//! representations, together with the remote address the bytes came from.
//! The address matters to callers that index into the value afterwards (the
//! UTF-16 string decoder starts from the *address* of the first-char field,
//! not its value).

use crate::object::ObjectHandle;
use periscope_core::Address;

/// Closed union of everything a field decode can produce.
#[derive(Debug, Clone)]
pub enum Value {
    Object(ObjectHandle),
    /// A managed string, already transcoded to UTF-8.
    Str(String),
    /// A single UTF-16 code unit (`System.Char`).
    Char(u16),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Raw bytes of an inline value-type payload.
    Bytes(Vec<u8>),
    Null,
}

/// A [`Value`] plus the remote address it was decoded from.
#[derive(Debug, Clone)]
pub struct DecodedValue {
    addr: Address,
    value: Value,
}

impl DecodedValue {
    pub fn new(addr: Address, value: Value) -> Self {
        Self { addr, value }
    }

    pub fn null() -> Self {
        Self {
            addr: Address::NULL,
            value: Value::Null,
        }
    }

    /// Address the value was read from (the element/field slot, after any
    /// pointer indirection).
    pub fn addr(&self) -> Address {
        self.addr
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, Value::Null)
    }

    pub fn as_object(&self) -> Option<&ObjectHandle> {
        match &self.value {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn into_object(self) -> Option<ObjectHandle> {
        match self.value {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_char(&self) -> Option<u16> {
        match self.value {
            Value::Char(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self.value {
            Value::I32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self.value {
            Value::U32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self.value {
            Value::I64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.value {
            Value::U64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self.value {
            Value::F32(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self.value {
            Value::F64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self.value {
            Value::U8(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_u8().map(|v| v != 0)
    }

    /// Widen any signed or unsigned integer variant that fits into `i64`.
    pub fn to_i64(&self) -> Option<i64> {
        match self.value {
            Value::I8(v) => Some(v as i64),
            Value::I16(v) => Some(v as i64),
            Value::I32(v) => Some(v as i64),
            Value::I64(v) => Some(v),
            Value::U8(v) => Some(v as i64),
            Value::U16(v) => Some(v as i64),
            Value::U32(v) => Some(v as i64),
            _ => None,
        }
    }
}
