//! Live object handles
//!
//! An [`ObjectHandle`] pairs a remote object address with the catalog class
//! decoded for it and the domain it lives in. Handles are plain `Copy` data;
//! all reads go back through the catalog and a [`ProcessMemory`].

use crate::catalog::{ClassId, ImageCatalog, TypeId};
use crate::value::DecodedValue;
use periscope_core::{Address, Error, Result};
use periscope_memory::ProcessMemory;

#[derive(Debug, Clone, Copy)]
pub struct ObjectHandle {
    addr: Address,
    class: ClassId,
    domain_id: i32,
}

impl ObjectHandle {
    /// Handle with a caller-supplied class, for objects whose header cannot
    /// be consulted (inline value-type payloads have no header).
    pub fn with_class(class: ClassId, addr: Address, domain_id: i32) -> Self {
        Self {
            addr,
            class,
            domain_id,
        }
    }

    /// Resolve the object's class from the vtable pointer in its header.
    pub fn from_address<M: ProcessMemory>(
        catalog: &mut ImageCatalog,
        mem: &M,
        addr: Address,
        domain_id: i32,
    ) -> Result<Self> {
        let vtable_ptr = mem.read_ptr(addr, catalog.layout().pointer_size)?;
        let class = catalog.class_from_vtable(mem, vtable_ptr)?;
        Ok(Self {
            addr,
            class,
            domain_id,
        })
    }

    pub fn addr(&self) -> Address {
        self.addr
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn domain_id(&self) -> i32 {
        self.domain_id
    }

    /// Decode a field declared on this object's own class.
    pub fn get<M: ProcessMemory>(
        &self,
        catalog: &mut ImageCatalog,
        mem: &M,
        field: &str,
    ) -> Result<DecodedValue> {
        let class = catalog.class(self.class);
        let field_ref = class.field(field).ok_or_else(|| {
            Error::field_not_found(format!("{}.{}", class.full_name(), field))
        })?;
        catalog.field_value(mem, &field_ref, Some(self), self.domain_id)
    }

    /// Decode a field declared on a named ancestor of this object's class.
    pub fn super_get<M: ProcessMemory>(
        &self,
        catalog: &mut ImageCatalog,
        mem: &M,
        ancestor: &str,
        field: &str,
    ) -> Result<DecodedValue> {
        let super_id = catalog
            .class(self.class)
            .super_class(ancestor)
            .ok_or_else(|| Error::class_not_found(ancestor))?;
        let super_class = catalog.class(super_id);
        let field_ref = super_class.field(field).ok_or_else(|| {
            Error::field_not_found(format!("{}.{}", super_class.full_name(), field))
        })?;
        catalog.field_value(mem, &field_ref, Some(self), self.domain_id)
    }

    /// Declared type of one of this object's fields, if present.
    pub fn field_type(&self, catalog: &ImageCatalog, field: &str) -> Option<TypeId> {
        catalog
            .class(self.class)
            .field(field)
            .map(|f| f.type_id)
    }
}
