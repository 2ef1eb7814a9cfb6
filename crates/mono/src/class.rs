//! Decoded class metadata
//!
//! A [`ClassEntry`] is the engine's picture of one remote `MonoClass`: name,
//! field table, flags, sizes, supertype chain, and the per-domain vtable
//! cache. Entries are owned by the catalog's arena and referenced by
//! [`ClassId`]; they are parsed once and never re-read.

use crate::catalog::{ClassId, TypeId};
use crate::layout::{class_flags, ClassKind, MonoLayout, OBJECT_HEADER_SIZE};
use indexmap::IndexMap;
use periscope_core::{Address, Result};
use periscope_memory::ProcessMemory;
use std::collections::HashMap;

/// One class of the remote image.
#[derive(Debug)]
pub struct ClassEntry {
    pub(crate) id: ClassId,
    pub(crate) addr: Address,
    pub(crate) name: String,
    pub(crate) namespace: String,
    pub(crate) kind: Option<ClassKind>,
    pub(crate) flags: u32,
    pub(crate) instance_size: i32,
    pub(crate) static_size: i32,
    pub(crate) element_class: Option<ClassId>,
    /// Supertype chain indexed by short class name. Two ancestors sharing a
    /// short name across namespaces collide here; the deeper one wins.
    pub(crate) supertypes: IndexMap<String, ClassId>,
    pub(crate) fields: Vec<FieldEntry>,
    pub(crate) vtables: HashMap<i32, VTableEntry>,
}

impl ClassEntry {
    pub(crate) fn stub(id: ClassId, addr: Address) -> Self {
        Self {
            id,
            addr,
            name: String::new(),
            namespace: String::new(),
            kind: None,
            flags: 0,
            instance_size: 0,
            static_size: 0,
            element_class: None,
            supertypes: IndexMap::new(),
            fields: Vec::new(),
            vtables: HashMap::new(),
        }
    }

    pub fn id(&self) -> ClassId {
        self.id
    }

    pub fn addr(&self) -> Address {
        self.addr
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Namespace-qualified name, `Namespace.Name` or just `Name`.
    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    pub fn kind(&self) -> Option<ClassKind> {
        self.kind
    }

    pub fn is_value_type(&self) -> bool {
        self.flags & class_flags::VALUE_TYPE != 0
    }

    pub fn is_enum(&self) -> bool {
        self.flags & class_flags::ENUM_TYPE != 0
    }

    pub fn instance_size(&self) -> i32 {
        self.instance_size
    }

    /// Size of the static-field storage block.
    pub fn static_size(&self) -> i32 {
        self.static_size
    }

    /// Unboxed payload size of a value type: the instance size minus the
    /// object header a boxed copy would carry.
    pub fn value_size(&self) -> u32 {
        (self.instance_size as i64 - OBJECT_HEADER_SIZE as i64).max(0) as u32
    }

    /// Element class for array classes and enum basetypes.
    pub fn element_class(&self) -> Option<ClassId> {
        self.element_class
    }

    /// Look up a field declared on this class. Inherited fields are not
    /// searched; fetch them through [`ClassEntry::super_class`] explicitly,
    /// matching .NET field-hiding semantics.
    pub fn field(&self, name: &str) -> Option<FieldRef> {
        self.fields.iter().find(|f| f.name == name).map(|f| FieldRef {
            class: self.id,
            name: f.name.clone(),
            type_id: f.type_id,
            offset: f.offset,
        })
    }

    pub fn fields(&self) -> impl Iterator<Item = &FieldEntry> {
        self.fields.iter()
    }

    /// Resolve an ancestor by short name.
    pub fn super_class(&self, name: &str) -> Option<ClassId> {
        self.supertypes.get(name).copied()
    }

    pub fn supertypes(&self) -> &IndexMap<String, ClassId> {
        &self.supertypes
    }
}

/// One field of a class, as parsed from its `MonoClassField` record.
#[derive(Debug)]
pub struct FieldEntry {
    pub(crate) addr: Address,
    pub(crate) name: String,
    pub(crate) type_id: TypeId,
    /// Offset from the object start (instance) or static block start
    /// (static). `-1` marks a special static the engine does not support.
    pub(crate) offset: i32,
}

impl FieldEntry {
    pub fn addr(&self) -> Address {
        self.addr
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn offset(&self) -> i32 {
        self.offset
    }
}

/// A detached handle to one field, cheap to pass into the decode engine
/// without keeping the catalog borrowed.
#[derive(Debug, Clone)]
pub struct FieldRef {
    pub class: ClassId,
    pub name: String,
    pub type_id: TypeId,
    pub offset: i32,
}

/// Per-(class, domain) vtable binding.
///
/// Resolved once through the class's runtime-info record and cached on the
/// class; static-storage addresses are stable for a domain's lifetime so the
/// cache is never invalidated.
#[derive(Debug, Clone, Copy)]
pub struct VTableEntry {
    pub(crate) addr: Address,
    pub(crate) domain_id: i32,
    pub(crate) vtable_size: i32,
    pub(crate) has_static_fields: bool,
}

impl VTableEntry {
    pub fn addr(&self) -> Address {
        self.addr
    }

    pub fn domain_id(&self) -> i32 {
        self.domain_id
    }

    pub fn has_static_fields(&self) -> bool {
        self.has_static_fields
    }

    /// Base address of this class's static storage in this domain.
    ///
    /// The runtime appends the static-data pointer one slot past the method
    /// table, i.e. `vtable_size` pointers after the slot array starts. That
    /// trailing slot is not a declared field of `MonoVTable`.
    pub fn static_storage<M: ProcessMemory>(
        &self,
        mem: &M,
        layout: &MonoLayout,
    ) -> Result<Option<Address>> {
        if !self.has_static_fields {
            return Ok(None);
        }
        let slot = self.addr
            + layout.vtable_table
            + self.vtable_size as u64 * layout.pointer_size as u64;
        let ptr = mem.read_ptr(slot, layout.pointer_size)?;
        Ok(if ptr.is_null() { None } else { Some(ptr) })
    }
}
