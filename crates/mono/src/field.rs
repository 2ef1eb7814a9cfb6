//! Field decoding
//!
//! Turns one [`FieldRef`] plus an optional instance into a [`DecodedValue`].
//! This is the single place that knows which type tags read through a
//! pointer, which read inline, and how each tag's bytes become a host value.

use crate::catalog::{ClassId, ImageCatalog};
use crate::class::FieldRef;
use crate::collections::decode_string;
use crate::layout::TypeTag;
use crate::object::ObjectHandle;
use crate::value::{DecodedValue, Value};
use periscope_core::{Error, Result};
use periscope_memory::ProcessMemory;

impl ImageCatalog {
    /// Decode one field.
    ///
    /// With an instance, the slot sits at `instance + offset`. Without one,
    /// the field must be static: the slot is found through the class's vtable
    /// in `domain_id`, in the static block appended past the method table.
    ///
    /// Reference-tagged slots hold a pointer that is followed first; a zero
    /// pointer decodes to [`Value::Null`] rather than an error.
    pub fn field_value<M: ProcessMemory>(
        &mut self,
        mem: &M,
        field: &FieldRef,
        instance: Option<&ObjectHandle>,
        domain_id: i32,
    ) -> Result<DecodedValue> {
        let ftype = self.type_entry(field.type_id).clone();
        let lay = *self.layout();

        let slot = match instance {
            Some(obj) => obj.addr().offset(field.offset as i64),
            None => {
                if !ftype.is_static() {
                    return Err(Error::NotStatic(field.name.clone()));
                }
                if field.offset < 0 {
                    return Err(Error::SpecialStatic(field.name.clone()));
                }
                let unavailable = |catalog: &ImageCatalog| Error::VTableUnavailable {
                    class: catalog.class(field.class).full_name(),
                    domain_id,
                };
                let vtable = self
                    .load_vtable(mem, field.class, domain_id)?
                    .ok_or_else(|| unavailable(self))?;
                let base = vtable
                    .static_storage(mem, &lay)?
                    .ok_or_else(|| unavailable(self))?;
                base.offset(field.offset as i64)
            }
        };

        let tag = TypeTag::from_raw(ftype.raw_tag).ok_or(Error::UnsupportedType(ftype.raw_tag))?;

        // Reference tags always read through the slot pointer. A generic
        // instantiation does too, unless the container is a value type, in
        // which case the payload sits inline and the vtable-pointer trick for
        // recovering the class cannot work; the declared container is the
        // class.
        let (indirect, class_hint): (bool, Option<ClassId>) = match tag {
            TypeTag::Class | TypeTag::SzArray | TypeTag::String => (true, None),
            TypeTag::GenericInst => match ftype.generic_container() {
                Some(container) if self.class(container).is_value_type() => {
                    (false, Some(container))
                }
                _ => (true, None),
            },
            _ => (ftype.by_ref(), None),
        };

        let addr = if indirect {
            let target = mem.read_ptr(slot, lay.pointer_size)?;
            if target.is_null() {
                return Ok(DecodedValue::null());
            }
            target
        } else {
            slot
        };

        let value = match tag {
            TypeTag::Class | TypeTag::SzArray => {
                Value::Object(ObjectHandle::from_address(self, mem, addr, domain_id)?)
            }
            TypeTag::GenericInst => match class_hint {
                Some(class) => Value::Object(ObjectHandle::with_class(class, addr, domain_id)),
                None => Value::Object(ObjectHandle::from_address(self, mem, addr, domain_id)?),
            },
            TypeTag::String => {
                let obj = ObjectHandle::from_address(self, mem, addr, domain_id)?;
                Value::Str(decode_string(self, mem, &obj)?)
            }
            TypeTag::ValueType => {
                let class = ftype
                    .class()
                    .ok_or_else(|| Error::decode("value type without class"))?;
                let size = self.class(class).value_size() as usize;
                Value::Bytes(mem.read_bytes(addr, size)?)
            }
            TypeTag::Bool | TypeTag::U1 => Value::U8(mem.read_scalar(addr)?),
            TypeTag::I1 => Value::I8(mem.read_scalar(addr)?),
            TypeTag::Char => Value::Char(mem.read_scalar(addr)?),
            TypeTag::I2 => Value::I16(mem.read_scalar(addr)?),
            TypeTag::U2 => Value::U16(mem.read_scalar(addr)?),
            TypeTag::I4 => Value::I32(mem.read_scalar(addr)?),
            TypeTag::U4 => Value::U32(mem.read_scalar(addr)?),
            TypeTag::I8 => Value::I64(mem.read_scalar(addr)?),
            TypeTag::U8 => Value::U64(mem.read_scalar(addr)?),
            TypeTag::R4 => Value::F32(mem.read_scalar(addr)?),
            TypeTag::R8 => Value::F64(mem.read_scalar(addr)?),
            TypeTag::Void
            | TypeTag::Ptr
            | TypeTag::Array
            | TypeTag::NativeInt
            | TypeTag::NativeUint => return Err(Error::UnsupportedType(ftype.raw_tag)),
        };
        Ok(DecodedValue::new(addr, value))
    }
}
