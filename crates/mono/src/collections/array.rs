//! Managed array views
//!
//! [`ArrayView`] reads single-dimension, zero-based managed arrays
//! (`T[]` / `MonoArray`): length prefix in the header, elements packed after
//! it. Value-type elements are stored inline at the class's unboxed size;
//! reference elements are stored as pointers.

use crate::catalog::{ClassId, ImageCatalog, TypeId};
use crate::collections::decode_string;
use crate::object::ObjectHandle;
use periscope_core::{Address, Error, Result};
use periscope_memory::{ProcessMemory, Scalar};
use std::marker::PhantomData;

/// Extraction of one element (or slot) of a known class at a known address.
///
/// Implementations decide how the slot is read from how the element class is
/// stored: inline payload for value types, pointer for references.
pub trait Decode: Sized {
    fn decode<M: ProcessMemory>(
        catalog: &mut ImageCatalog,
        mem: &M,
        element_class: ClassId,
        addr: Address,
        domain_id: i32,
    ) -> Result<Self>;
}

macro_rules! impl_decode_scalar {
    ($($t:ty),*) => {
        $(
            impl Decode for $t {
                fn decode<M: ProcessMemory>(
                    catalog: &mut ImageCatalog,
                    mem: &M,
                    element_class: ClassId,
                    addr: Address,
                    _domain_id: i32,
                ) -> Result<Self> {
                    let class = catalog.class(element_class);
                    if !class.is_value_type() {
                        return Err(Error::decode(format!(
                            "reference element {} read as scalar",
                            class.full_name()
                        )));
                    }
                    if class.value_size() as usize != <$t as Scalar>::SIZE {
                        return Err(Error::decode(format!(
                            "element {} is {} bytes, host scalar wants {}",
                            class.full_name(),
                            class.value_size(),
                            <$t as Scalar>::SIZE
                        )));
                    }
                    mem.read_scalar(addr)
                }
            }
        )*
    };
}

impl_decode_scalar!(u8, i8, u16, i16, u32, i32, u64, i64, f32, f64);

impl Decode for ObjectHandle {
    fn decode<M: ProcessMemory>(
        catalog: &mut ImageCatalog,
        mem: &M,
        element_class: ClassId,
        addr: Address,
        domain_id: i32,
    ) -> Result<Self> {
        if catalog.class(element_class).is_value_type() {
            return Ok(ObjectHandle::with_class(element_class, addr, domain_id));
        }
        let target = mem.read_ptr(addr, catalog.layout().pointer_size)?;
        if target.is_null() {
            return Err(Error::decode("null object in non-optional slot"));
        }
        ObjectHandle::from_address(catalog, mem, target, domain_id)
    }
}

impl Decode for Option<ObjectHandle> {
    fn decode<M: ProcessMemory>(
        catalog: &mut ImageCatalog,
        mem: &M,
        element_class: ClassId,
        addr: Address,
        domain_id: i32,
    ) -> Result<Self> {
        if catalog.class(element_class).is_value_type() {
            return Ok(Some(ObjectHandle::with_class(element_class, addr, domain_id)));
        }
        let target = mem.read_ptr(addr, catalog.layout().pointer_size)?;
        if target.is_null() {
            return Ok(None);
        }
        Ok(Some(ObjectHandle::from_address(
            catalog, mem, target, domain_id,
        )?))
    }
}

impl Decode for String {
    fn decode<M: ProcessMemory>(
        catalog: &mut ImageCatalog,
        mem: &M,
        _element_class: ClassId,
        addr: Address,
        domain_id: i32,
    ) -> Result<Self> {
        let target = mem.read_ptr(addr, catalog.layout().pointer_size)?;
        if target.is_null() {
            return Err(Error::decode("null string in non-optional slot"));
        }
        let obj = ObjectHandle::from_address(catalog, mem, target, domain_id)?;
        decode_string(catalog, mem, &obj)
    }
}

impl Decode for Option<String> {
    fn decode<M: ProcessMemory>(
        catalog: &mut ImageCatalog,
        mem: &M,
        _element_class: ClassId,
        addr: Address,
        domain_id: i32,
    ) -> Result<Self> {
        let target = mem.read_ptr(addr, catalog.layout().pointer_size)?;
        if target.is_null() {
            return Ok(None);
        }
        let obj = ObjectHandle::from_address(catalog, mem, target, domain_id)?;
        Ok(Some(decode_string(catalog, mem, &obj)?))
    }
}

/// A typed view over one managed array object.
#[derive(Debug, Clone, Copy)]
pub struct ArrayView<T> {
    obj: ObjectHandle,
    element_class: ClassId,
    length: u32,
    stride: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Decode> ArrayView<T> {
    /// View `obj` as an array whose declared field type is `declared` (an
    /// SzArray type record; that is where the element class comes from).
    pub fn new<M: ProcessMemory>(
        catalog: &mut ImageCatalog,
        mem: &M,
        obj: ObjectHandle,
        declared: TypeId,
    ) -> Result<Self> {
        let element_class = catalog
            .type_entry(declared)
            .element_class()
            .ok_or_else(|| Error::decode("declared type is not a single-dimension array"))?;
        let lay = *catalog.layout();
        let length = mem.read_scalar::<u32>(obj.addr() + lay.array_length)?;
        let class = catalog.class(element_class);
        let stride = if class.is_value_type() {
            class.value_size() as u64
        } else {
            lay.pointer_size as u64
        };
        Ok(Self {
            obj,
            element_class,
            length,
            stride,
            _marker: PhantomData,
        })
    }

    pub fn len(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn element_class(&self) -> ClassId {
        self.element_class
    }

    /// Decode the element at `index`. Indices outside `0..len` fail with
    /// [`Error::OutOfBounds`]; remote lengths are never trusted as a license
    /// to read past the header's claim.
    pub fn get<M: ProcessMemory>(
        &self,
        catalog: &mut ImageCatalog,
        mem: &M,
        index: i64,
    ) -> Result<T> {
        if index < 0 || index >= self.length as i64 {
            return Err(Error::OutOfBounds {
                index,
                len: self.length,
            });
        }
        let lay = *catalog.layout();
        let addr = self.obj.addr() + lay.array_data + index as u64 * self.stride;
        T::decode(catalog, mem, self.element_class, addr, self.obj.domain_id())
    }
}
