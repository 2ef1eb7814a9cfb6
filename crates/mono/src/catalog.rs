//! Image catalog
//!
//! [`ImageCatalog`] reconstructs the type system of one remote Mono image by
//! walking the image's internal class-cache hash table and parsing every
//! `MonoClass` and `MonoType` record it reaches. Parsed records live in two
//! arenas and are referenced by [`ClassId`] / [`TypeId`] handles, so the
//! cyclic remote type graph maps onto plain owned data.
//!
//! Registration is two-phase: a class (or type) address is entered into the
//! address map *before* its body is parsed, so self-referential and mutually
//! recursive definitions terminate instead of recursing forever.

use crate::class::{ClassEntry, FieldEntry, VTableEntry};
use crate::layout::{
    ClassKind, MonoLayout, TypeTag, GENERIC_INST_ARGC_MASK, TYPE_BYREF_BIT,
    VTABLE_STATIC_FIELDS_BIT,
};
use crate::value::DecodedValue;
use indexmap::IndexMap;
use periscope_core::{Address, Error, Result};
use periscope_memory::ProcessMemory;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};

/// Arena handle for a class parsed by a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub(crate) u32);

/// Arena handle for a type record parsed by a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeId(pub(crate) u32);

impl ClassId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl TypeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// What a type record's data word resolved to, by tag.
#[derive(Debug, Clone)]
pub(crate) enum TypePayload {
    /// Tag carries no pointer the engine follows.
    None,
    /// Class or ValueType: the named class.
    Class(ClassId),
    /// Ptr: the pointee type.
    Inner(TypeId),
    /// SzArray: the element class.
    Element(ClassId),
    /// GenericInst: instantiated container plus argument types.
    Generic { container: ClassId, args: Vec<TypeId> },
}

/// One parsed `MonoType` record.
#[derive(Debug, Clone)]
pub struct TypeEntry {
    pub(crate) addr: Address,
    pub(crate) raw_tag: u8,
    pub(crate) attrs: u16,
    pub(crate) by_ref: bool,
    pub(crate) payload: TypePayload,
}

impl TypeEntry {
    fn stub(addr: Address) -> Self {
        Self {
            addr,
            raw_tag: 0,
            attrs: 0,
            by_ref: false,
            payload: TypePayload::None,
        }
    }

    pub fn addr(&self) -> Address {
        self.addr
    }

    pub fn tag(&self) -> Option<TypeTag> {
        TypeTag::from_raw(self.raw_tag)
    }

    pub fn raw_tag(&self) -> u8 {
        self.raw_tag
    }

    pub fn attrs(&self) -> u16 {
        self.attrs
    }

    pub fn is_static(&self) -> bool {
        self.attrs & crate::layout::field_attributes::STATIC != 0
    }

    pub fn is_literal(&self) -> bool {
        self.attrs & crate::layout::field_attributes::LITERAL != 0
    }

    pub fn by_ref(&self) -> bool {
        self.by_ref
    }

    /// The class behind a Class/ValueType tag.
    pub fn class(&self) -> Option<ClassId> {
        match self.payload {
            TypePayload::Class(c) => Some(c),
            _ => None,
        }
    }

    /// The element class behind an SzArray tag.
    pub fn element_class(&self) -> Option<ClassId> {
        match self.payload {
            TypePayload::Element(c) => Some(c),
            _ => None,
        }
    }

    /// The pointee type behind a Ptr tag.
    pub fn inner(&self) -> Option<TypeId> {
        match self.payload {
            TypePayload::Inner(t) => Some(t),
            _ => None,
        }
    }

    /// Container class of a GenericInst tag.
    pub fn generic_container(&self) -> Option<ClassId> {
        match self.payload {
            TypePayload::Generic { container, .. } => Some(container),
            _ => None,
        }
    }

    /// Argument types of a GenericInst tag.
    pub fn generic_args(&self) -> Option<&[TypeId]> {
        match &self.payload {
            TypePayload::Generic { args, .. } => Some(args),
            _ => None,
        }
    }
}

/// The reconstructed type system of one remote Mono image.
pub struct ImageCatalog {
    image: Address,
    layout: MonoLayout,
    classes: Vec<ClassEntry>,
    class_by_addr: HashMap<Address, ClassId>,
    /// Fully-qualified name index, in registration order. Generic
    /// instantiations are excluded; dozens share one definition name.
    class_by_name: IndexMap<String, ClassId>,
    types: Vec<TypeEntry>,
    type_by_addr: HashMap<Address, TypeId>,
}

impl ImageCatalog {
    pub fn new(image: Address, layout: MonoLayout) -> Self {
        Self {
            image,
            layout,
            classes: Vec::new(),
            class_by_addr: HashMap::new(),
            class_by_name: IndexMap::new(),
            types: Vec::new(),
            type_by_addr: HashMap::new(),
        }
    }

    pub fn image(&self) -> Address {
        self.image
    }

    pub fn layout(&self) -> &MonoLayout {
        &self.layout
    }

    pub fn class(&self, id: ClassId) -> &ClassEntry {
        &self.classes[id.index()]
    }

    pub fn type_entry(&self, id: TypeId) -> &TypeEntry {
        &self.types[id.index()]
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Look up a class by namespace-qualified name.
    pub fn class_by_name(&self, full_name: &str) -> Option<ClassId> {
        self.class_by_name.get(full_name).copied()
    }

    /// Iterate classes in arena order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassEntry> {
        self.classes.iter()
    }

    fn ptr<M: ProcessMemory>(&self, mem: &M, addr: Address) -> Result<Address> {
        mem.read_ptr(addr, self.layout.pointer_size)
    }

    /// Walk the image's class-cache hash table and load every class in it,
    /// including everything reachable from their field types. Returns the
    /// number of classes newly added to the catalog.
    pub fn scan<M: ProcessMemory>(&mut self, mem: &M) -> Result<usize> {
        let lay = self.layout;
        let table = self.image + lay.image_class_cache;
        let bucket_count = mem.read_scalar::<i32>(table + lay.hash_table_size)?;
        let buckets = self.ptr(mem, table + lay.hash_table_buckets)?;
        debug!(
            image = %self.image,
            buckets = bucket_count,
            "scanning image class cache"
        );

        let before = self.classes.len();
        for i in 0..bucket_count.max(0) as u64 {
            let mut node = self.ptr(mem, buckets + i * lay.pointer_size as u64)?;
            // Nodes are MonoClassDef records chained through their
            // next-class-cache field.
            while !node.is_null() {
                self.load_class(mem, node)?;
                node = self.ptr(mem, node + lay.class_def_next_cache)?;
            }
        }

        let added = self.classes.len() - before;
        info!(
            image = %self.image,
            classes = added,
            total = self.classes.len(),
            "image scan complete"
        );
        Ok(added)
    }

    /// Load the class record at `addr`, parsing it and everything it
    /// references on first sight. Idempotent per address.
    pub fn load_class<M: ProcessMemory>(&mut self, mem: &M, addr: Address) -> Result<ClassId> {
        if let Some(&id) = self.class_by_addr.get(&addr) {
            return Ok(id);
        }

        // Register before parsing so cyclic references resolve to this id.
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(ClassEntry::stub(id, addr));
        self.class_by_addr.insert(addr, id);

        let lay = self.layout;
        let name = mem.read_cstring_indirect(addr + lay.class_name, lay.pointer_size)?;
        let namespace = mem.read_cstring_indirect(addr + lay.class_namespace, lay.pointer_size)?;
        let kind_raw = mem.read_scalar::<u8>(addr + lay.class_kind)?;
        let kind = ClassKind::from_raw(kind_raw);
        if kind.is_none() {
            warn!(class = %name, raw = kind_raw, "unrecognized class kind");
        }
        let flags = mem.read_scalar::<u32>(addr + lay.class_flags)?;
        let instance_size = mem.read_scalar::<i32>(addr + lay.class_instance_size)?;
        let static_size = mem.read_scalar::<i32>(addr + lay.class_sizes)?;

        let elem_ptr = self.ptr(mem, addr + lay.class_element_class)?;
        let element_class = if elem_ptr.is_null() {
            None
        } else if elem_ptr == addr {
            // Primitive classes are their own element class.
            Some(id)
        } else {
            Some(self.load_class(mem, elem_ptr)?)
        };

        let idepth = mem.read_scalar::<u16>(addr + lay.class_idepth)?;
        let supers_ptr = self.ptr(mem, addr + lay.class_supertypes)?;
        let mut supertypes = IndexMap::new();
        if !supers_ptr.is_null() {
            for i in 0..idepth as u64 {
                let super_ptr = self.ptr(mem, supers_ptr + i * lay.pointer_size as u64)?;
                if super_ptr.is_null() {
                    continue;
                }
                let super_id = self.load_class(mem, super_ptr)?;
                let super_name = self.classes[super_id.index()].name.clone();
                supertypes.insert(super_name, super_id);
            }
        }

        let field_count = self.field_count(mem, addr, kind)?;
        let fields_ptr = self.ptr(mem, addr + lay.class_fields)?;
        let mut fields = Vec::with_capacity(field_count as usize);
        if !fields_ptr.is_null() {
            for i in 0..field_count as u64 {
                let field_addr = fields_ptr + i * lay.field_stride;
                let type_ptr = self.ptr(mem, field_addr + lay.field_type)?;
                if type_ptr.is_null() {
                    warn!(class = %name, index = i, "field with null type, skipping");
                    continue;
                }
                let type_id = self.load_type(mem, type_ptr)?;
                let field_name =
                    mem.read_cstring_indirect(field_addr + lay.field_name, lay.pointer_size)?;
                let offset = mem.read_scalar::<i32>(field_addr + lay.field_offset)?;
                fields.push(FieldEntry {
                    addr: field_addr,
                    name: field_name,
                    type_id,
                    offset,
                });
            }
        }

        debug!(class = %name, %addr, fields = fields.len(), "loaded class");

        let entry = &mut self.classes[id.index()];
        entry.name = name;
        entry.namespace = namespace;
        entry.kind = kind;
        entry.flags = flags;
        entry.instance_size = instance_size;
        entry.static_size = static_size;
        entry.element_class = element_class;
        entry.supertypes = supertypes;
        entry.fields = fields;

        if kind != Some(ClassKind::GenericInstance) {
            let full_name = self.classes[id.index()].full_name();
            self.class_by_name.insert(full_name, id);
        }
        Ok(id)
    }

    /// Declared-field count of the class at `addr`. Only definition records
    /// store it; generic instantiations borrow it from their definition, and
    /// the remaining kinds declare no fields of their own.
    fn field_count<M: ProcessMemory>(
        &self,
        mem: &M,
        addr: Address,
        kind: Option<ClassKind>,
    ) -> Result<i32> {
        let lay = self.layout;
        match kind {
            Some(ClassKind::Def) | Some(ClassKind::GenericTypeDefinition) => {
                let count = mem.read_scalar::<i32>(addr + lay.class_def_field_count)?;
                Ok(count.max(0))
            }
            Some(ClassKind::GenericInstance) => {
                let generic = self.ptr(mem, addr + lay.class_ginst_generic)?;
                if generic.is_null() {
                    return Ok(0);
                }
                let container = self.ptr(mem, generic + lay.generic_class_container)?;
                if container.is_null() {
                    return Ok(0);
                }
                let container_kind = mem.read_scalar::<u8>(container + lay.class_kind)?;
                self.field_count(mem, container, ClassKind::from_raw(container_kind))
            }
            _ => Ok(0),
        }
    }

    /// Load the type record at `addr`. Idempotent per address.
    pub fn load_type<M: ProcessMemory>(&mut self, mem: &M, addr: Address) -> Result<TypeId> {
        if let Some(&id) = self.type_by_addr.get(&addr) {
            return Ok(id);
        }

        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeEntry::stub(addr));
        self.type_by_addr.insert(addr, id);

        let lay = self.layout;
        let data = Address::from(mem.read_scalar::<u32>(addr + lay.type_data)?);
        let attrs = mem.read_scalar::<u16>(addr + lay.type_attrs)?;
        let raw_tag = mem.read_scalar::<u8>(addr + lay.type_tag)?;
        let flags = mem.read_scalar::<u8>(addr + lay.type_flags)?;
        let by_ref = flags & TYPE_BYREF_BIT != 0;

        let payload = match TypeTag::from_raw(raw_tag) {
            _ if data.is_null() => TypePayload::None,
            Some(TypeTag::Class) | Some(TypeTag::ValueType) => {
                TypePayload::Class(self.load_class(mem, data)?)
            }
            Some(TypeTag::Ptr) => TypePayload::Inner(self.load_type(mem, data)?),
            Some(TypeTag::SzArray) => {
                let elem = self.ptr(mem, data + lay.array_type_element)?;
                if elem.is_null() {
                    TypePayload::None
                } else {
                    TypePayload::Element(self.load_class(mem, elem)?)
                }
            }
            Some(TypeTag::GenericInst) => {
                let container_ptr = self.ptr(mem, data + lay.generic_class_container)?;
                let container = self.load_class(mem, container_ptr)?;
                let inst = self.ptr(mem, data + lay.generic_class_inst)?;
                let mut args = Vec::new();
                if !inst.is_null() {
                    // The count shares its word with unrelated flag bits.
                    let argc =
                        mem.read_scalar::<u32>(inst + lay.generic_inst_argc)?
                            & GENERIC_INST_ARGC_MASK;
                    args.reserve(argc as usize);
                    for i in 0..argc as u64 {
                        let arg_ptr = self
                            .ptr(mem, inst + lay.generic_inst_argv + i * lay.pointer_size as u64)?;
                        args.push(self.load_type(mem, arg_ptr)?);
                    }
                }
                TypePayload::Generic { container, args }
            }
            _ => TypePayload::None,
        };

        let entry = &mut self.types[id.index()];
        entry.raw_tag = raw_tag;
        entry.attrs = attrs;
        entry.by_ref = by_ref;
        entry.payload = payload;
        Ok(id)
    }

    /// Human-readable rendering of a type, composed recursively. Diagnostics
    /// only; never used as a lookup key.
    pub fn type_name(&self, id: TypeId) -> String {
        let entry = &self.types[id.index()];
        let base = TypeTag::from_raw(entry.raw_tag)
            .map(|tag| tag.as_str())
            .unwrap_or("Unknown");
        match &entry.payload {
            TypePayload::None => base.to_string(),
            TypePayload::Class(c) | TypePayload::Element(c) => {
                format!("{}<{}>", base, self.class(*c).full_name())
            }
            TypePayload::Inner(t) => format!("{}<{}>", base, self.type_name(*t)),
            TypePayload::Generic { container, args } => {
                let args = args
                    .iter()
                    .map(|a| self.type_name(*a))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("{}<{}<{}>>", base, self.class(*container).full_name(), args)
            }
        }
    }

    /// Resolve (and cache) the vtable binding a class in one domain. `None`
    /// means the runtime has not instantiated the class there yet.
    pub fn load_vtable<M: ProcessMemory>(
        &mut self,
        mem: &M,
        class: ClassId,
        domain_id: i32,
    ) -> Result<Option<VTableEntry>> {
        if let Some(vt) = self.classes[class.index()].vtables.get(&domain_id) {
            return Ok(Some(*vt));
        }

        let lay = self.layout;
        let class_addr = self.classes[class.index()].addr;
        let runtime_info = self.ptr(mem, class_addr + lay.class_runtime_info)?;
        if runtime_info.is_null() {
            return Ok(None);
        }
        let max_domain = mem.read_scalar::<u16>(runtime_info + lay.runtime_info_max_domain)?;
        if domain_id < 0 || domain_id as u32 > max_domain as u32 {
            return Ok(None);
        }
        let slot = runtime_info
            + lay.runtime_info_vtables
            + domain_id as u64 * lay.pointer_size as u64;
        let vtable_ptr = self.ptr(mem, slot)?;
        if vtable_ptr.is_null() {
            return Ok(None);
        }

        let flags = mem.read_scalar::<u8>(vtable_ptr + lay.vtable_flags)?;
        let vtable_size = mem.read_scalar::<i32>(class_addr + lay.class_vtable_size)?;
        let entry = VTableEntry {
            addr: vtable_ptr,
            domain_id,
            vtable_size,
            has_static_fields: flags & VTABLE_STATIC_FIELDS_BIT != 0,
        };
        debug!(
            class = %self.classes[class.index()].name,
            domain_id,
            vtable = %vtable_ptr,
            statics = entry.has_static_fields,
            "resolved vtable"
        );
        self.classes[class.index()].vtables.insert(domain_id, entry);
        Ok(Some(entry))
    }

    /// Recover the class of a live object from the vtable pointer in its
    /// header.
    pub fn class_from_vtable<M: ProcessMemory>(
        &mut self,
        mem: &M,
        vtable_ptr: Address,
    ) -> Result<ClassId> {
        let class_ptr = self.ptr(mem, vtable_ptr + self.layout.vtable_class)?;
        self.load_class(mem, class_ptr)
    }

    /// Decode a static field of a named class, the usual entry point for
    /// reading runtime singletons.
    pub fn static_field_value<M: ProcessMemory>(
        &mut self,
        mem: &M,
        class_name: &str,
        field_name: &str,
        domain_id: i32,
    ) -> Result<DecodedValue> {
        let class = self
            .class_by_name(class_name)
            .ok_or_else(|| Error::class_not_found(class_name))?;
        let field = self
            .class(class)
            .field(field_name)
            .ok_or_else(|| Error::field_not_found(format!("{class_name}.{field_name}")))?;
        self.field_value(mem, &field, None, domain_id)
    }
}

impl fmt::Display for ImageCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "MONO IMAGE {} ({} classes)",
            self.image,
            self.class_by_name.len()
        )?;
        for (name, &id) in &self.class_by_name {
            writeln!(f, "##### {name} #####")?;
            for field in self.class(id).fields() {
                let entry = self.type_entry(field.type_id());
                write!(
                    f,
                    "  {}: {} @ {}",
                    field.name(),
                    self.type_name(field.type_id()),
                    field.offset()
                )?;
                if entry.is_static() {
                    write!(f, " | Static")?;
                }
                if entry.is_literal() {
                    write!(f, " | Literal")?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
