//! `System.Collections.Generic.List<T>` views
//!
//! A list is a backing array plus a logical size; the array is usually
//! longer than the list. The view honors `_size`, not the array length.

use crate::catalog::ImageCatalog;
use crate::collections::array::{ArrayView, Decode};
use crate::object::ObjectHandle;
use periscope_core::{Error, Result};
use periscope_memory::ProcessMemory;

const ITEMS_FIELD: &str = "_items";
const SIZE_FIELD: &str = "_size";

#[derive(Debug, Clone, Copy)]
pub struct ListView<T> {
    items: ArrayView<T>,
    size: i32,
}

impl<T: Decode> ListView<T> {
    pub fn new<M: ProcessMemory>(
        catalog: &mut ImageCatalog,
        mem: &M,
        obj: ObjectHandle,
    ) -> Result<Self> {
        let size = obj
            .get(catalog, mem, SIZE_FIELD)?
            .as_i32()
            .ok_or_else(|| Error::decode("list _size is not Int4"))?;
        let declared = obj
            .field_type(catalog, ITEMS_FIELD)
            .ok_or_else(|| Error::field_not_found(ITEMS_FIELD))?;
        let items_obj = obj
            .get(catalog, mem, ITEMS_FIELD)?
            .into_object()
            .ok_or_else(|| Error::decode("list _items is not an array object"))?;
        let items = ArrayView::new(catalog, mem, items_obj, declared)?;
        Ok(Self { items, size })
    }

    pub fn len(&self) -> i32 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size <= 0
    }

    pub fn get<M: ProcessMemory>(
        &self,
        catalog: &mut ImageCatalog,
        mem: &M,
        index: i64,
    ) -> Result<T> {
        if index < 0 || index >= self.size as i64 {
            return Err(Error::OutOfBounds {
                index,
                len: self.size.max(0) as u32,
            });
        }
        self.items.get(catalog, mem, index)
    }

    /// Decode the whole list front to back.
    pub fn to_vec<M: ProcessMemory>(
        &self,
        catalog: &mut ImageCatalog,
        mem: &M,
    ) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(self.size.max(0) as usize);
        for i in 0..self.size as i64 {
            out.push(self.items.get(catalog, mem, i)?);
        }
        Ok(out)
    }
}
