//! Synthetic Mono image fixtures
//!
//! Builds a coherent 32-bit address space inside a [`SnapshotMemory`]: class
//! records, type records, field tables, the image class-cache hash table,
//! vtables, and live objects, all at the offsets of [`MonoLayout::x86`].

// Each test binary uses a different slice of the fixture API.
#![allow(dead_code)]

use periscope_core::Address;
use periscope_memory::SnapshotMemory;
use periscope_mono::layout::class_flags;
use periscope_mono::{ImageCatalog, MonoLayout};

pub const IMAGE_BASE: u64 = 0x0010_0000;
const REGION_LEN: usize = 0x0008_0000;

/// Raw class-kind bytes.
pub mod kind {
    pub const DEF: u8 = 1;
    pub const GENERIC_TYPE_DEF: u8 = 2;
    pub const GENERIC_INSTANCE: u8 = 3;
}

/// Raw type tags.
pub mod tag {
    pub const BOOL: u8 = 0x02;
    pub const CHAR: u8 = 0x03;
    pub const I1: u8 = 0x04;
    pub const U1: u8 = 0x05;
    pub const I2: u8 = 0x06;
    pub const U2: u8 = 0x07;
    pub const I4: u8 = 0x08;
    pub const U4: u8 = 0x09;
    pub const I8: u8 = 0x0a;
    pub const U8: u8 = 0x0b;
    pub const R4: u8 = 0x0c;
    pub const R8: u8 = 0x0d;
    pub const STRING: u8 = 0x0e;
    pub const VALUETYPE: u8 = 0x11;
    pub const CLASS: u8 = 0x12;
    pub const GENERIC_INST: u8 = 0x15;
    pub const NATIVE_INT: u8 = 0x18;
    pub const SZARRAY: u8 = 0x1d;
}

/// Static bit of the field attrs halfword.
pub const STATIC: u16 = 0x0010;

pub struct Fixture {
    pub mem: SnapshotMemory,
    pub layout: MonoLayout,
    next: u64,
    string_class: Option<Address>,
    string_vtable: Option<Address>,
    array_vtable: Option<Address>,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            mem: SnapshotMemory::zeroed(Address::new(IMAGE_BASE), REGION_LEN),
            layout: MonoLayout::x86(),
            next: IMAGE_BASE + 0x1000,
            string_class: None,
            string_vtable: None,
            array_vtable: None,
        }
    }

    pub fn image(&self) -> Address {
        Address::new(IMAGE_BASE)
    }

    pub fn catalog(&self) -> ImageCatalog {
        ImageCatalog::new(self.image(), self.layout)
    }

    /// Bump-allocate a block, 8-aligned.
    pub fn alloc(&mut self, size: u64) -> Address {
        let addr = self.next;
        self.next = (addr + size + 7) & !7;
        assert!(
            self.next <= IMAGE_BASE + REGION_LEN as u64,
            "fixture region exhausted"
        );
        Address::new(addr)
    }

    pub fn cstring(&mut self, s: &str) -> Address {
        let addr = self.alloc(s.len() as u64 + 1);
        self.mem.write_cstring(addr, s);
        addr
    }

    /// Write a 32-bit pointer slot.
    pub fn write_ptr(&mut self, at: Address, to: Address) {
        self.mem.write_scalar::<u32>(at, to.as_u64() as u32);
    }

    /// Lay down a MonoClass record. Field table, supertypes, statics and
    /// vtables are attached separately.
    pub fn class(
        &mut self,
        namespace: &str,
        name: &str,
        kind_raw: u8,
        flags: u32,
        instance_size: i32,
    ) -> Address {
        let class = self.alloc(176);
        let name_ptr = self.cstring(name);
        let ns_ptr = self.cstring(namespace);
        let lay = self.layout;
        self.write_ptr(class + lay.class_name, name_ptr);
        self.write_ptr(class + lay.class_namespace, ns_ptr);
        self.mem.write_scalar::<u8>(class + lay.class_kind, kind_raw);
        self.mem.write_scalar::<u32>(class + lay.class_flags, flags);
        self.mem
            .write_scalar::<i32>(class + lay.class_instance_size, instance_size);
        class
    }

    /// A `System.<name>` value-type class whose unboxed payload is `payload`
    /// bytes.
    pub fn value_class(&mut self, name: &str, payload: i32) -> Address {
        self.class(
            "System",
            name,
            kind::DEF,
            class_flags::VALUE_TYPE,
            8 + payload,
        )
    }

    pub fn set_static_size(&mut self, class: Address, size: i32) {
        self.mem
            .write_scalar::<i32>(class + self.layout.class_sizes, size);
    }

    /// Attach a field table, including the definition field count.
    pub fn set_fields(&mut self, class: Address, fields: &[(&str, Address, i32)]) {
        self.set_fields_raw(class, fields);
        self.mem.write_scalar::<i32>(
            class + self.layout.class_def_field_count,
            fields.len() as i32,
        );
    }

    /// Attach a field table without touching the definition field count
    /// (generic instantiations carry the table but not the count).
    pub fn set_fields_raw(&mut self, class: Address, fields: &[(&str, Address, i32)]) {
        let lay = self.layout;
        let table = self.alloc(lay.field_stride * fields.len().max(1) as u64);
        for (i, (name, field_type, offset)) in fields.iter().enumerate() {
            let record = table + i as u64 * lay.field_stride;
            let name_ptr = self.cstring(name);
            self.write_ptr(record + lay.field_type, *field_type);
            self.write_ptr(record + lay.field_name, name_ptr);
            self.mem
                .write_scalar::<i32>(record + lay.field_offset, *offset);
        }
        self.write_ptr(class + lay.class_fields, table);
    }

    pub fn set_supertypes(&mut self, class: Address, supers: &[Address]) {
        let lay = self.layout;
        let table = self.alloc(4 * supers.len().max(1) as u64);
        for (i, s) in supers.iter().enumerate() {
            self.write_ptr(table + i as u64 * 4, *s);
        }
        self.mem
            .write_scalar::<u16>(class + lay.class_idepth, supers.len() as u16);
        self.write_ptr(class + lay.class_supertypes, table);
    }

    /// Point a generic-instance class at its generic definition.
    pub fn link_generic_def(&mut self, ginst_class: Address, definition: Address) {
        let generic = self.alloc(8);
        self.write_ptr(generic, definition);
        self.write_ptr(ginst_class + self.layout.class_ginst_generic, generic);
    }

    /// A MonoType record with no data pointer.
    pub fn prim_type(&mut self, tag_raw: u8, attrs: u16) -> Address {
        let lay = self.layout;
        let t = self.alloc(8);
        self.mem.write_scalar::<u16>(t + lay.type_attrs, attrs);
        self.mem.write_scalar::<u8>(t + lay.type_tag, tag_raw);
        t
    }

    /// A MonoType record whose data pointer names a class (Class/ValueType).
    pub fn class_type(&mut self, tag_raw: u8, class: Address, attrs: u16) -> Address {
        let t = self.prim_type(tag_raw, attrs);
        self.write_ptr(t + self.layout.type_data, class);
        t
    }

    /// An SzArray type of the given element class.
    pub fn szarray_type(&mut self, element_class: Address, attrs: u16) -> Address {
        let array_type = self.alloc(8);
        self.write_ptr(array_type + self.layout.array_type_element, element_class);
        let t = self.prim_type(tag::SZARRAY, attrs);
        self.write_ptr(t + self.layout.type_data, array_type);
        t
    }

    /// A GenericInst type. `noise` is OR-ed into the argument-count word to
    /// simulate the flag bits that share it.
    pub fn generic_type(
        &mut self,
        container: Address,
        args: &[Address],
        attrs: u16,
        noise: u32,
    ) -> Address {
        let lay = self.layout;
        let inst = self.alloc(lay.generic_inst_argv + 4 * args.len() as u64);
        self.mem
            .write_scalar::<u32>(inst + lay.generic_inst_argc, args.len() as u32 | noise);
        for (i, arg) in args.iter().enumerate() {
            self.write_ptr(inst + lay.generic_inst_argv + i as u64 * 4, *arg);
        }
        let generic = self.alloc(8);
        self.write_ptr(generic + lay.generic_class_container, container);
        self.write_ptr(generic + lay.generic_class_inst, inst);
        let t = self.prim_type(tag::GENERIC_INST, attrs);
        self.write_ptr(t + lay.type_data, generic);
        t
    }

    pub fn set_by_ref(&mut self, type_record: Address) {
        self.mem
            .write_scalar::<u8>(type_record + self.layout.type_flags, 0b10);
    }

    /// Install the image class-cache hash table: one chain of class records
    /// per bucket, linked through their next-class-cache field.
    pub fn install_class_cache(&mut self, chains: &[&[Address]]) {
        let lay = self.layout;
        let table = self.image() + lay.image_class_cache;
        self.mem
            .write_scalar::<i32>(table + lay.hash_table_size, chains.len() as i32);
        let buckets = self.alloc(4 * chains.len().max(1) as u64);
        self.write_ptr(table + lay.hash_table_buckets, buckets);
        for (i, chain) in chains.iter().enumerate() {
            if let Some(first) = chain.first() {
                self.write_ptr(buckets + i as u64 * 4, *first);
            }
            for pair in chain.windows(2) {
                self.write_ptr(pair[0] + lay.class_def_next_cache, pair[1]);
            }
        }
    }

    /// Instantiate a vtable for `class` in `domain_id`, wiring up the
    /// runtime-info record. With `static_size`, a static block of that many
    /// bytes is allocated and linked past the method table.
    pub fn vtable(
        &mut self,
        class: Address,
        domain_id: i32,
        vtable_size: i32,
        static_size: Option<u64>,
    ) -> (Address, Option<Address>) {
        let lay = self.layout;
        self.mem
            .write_scalar::<i32>(class + lay.class_vtable_size, vtable_size);
        let vt = self.alloc(lay.vtable_table + vtable_size as u64 * 4 + 8);
        self.write_ptr(vt + lay.vtable_class, class);
        let static_base = static_size.map(|size| {
            self.mem.write_scalar::<u8>(vt + lay.vtable_flags, 0b100);
            let block = self.alloc(size);
            self.write_ptr(vt + lay.vtable_table + vtable_size as u64 * 4, block);
            block
        });

        let ri = self.alloc(lay.runtime_info_vtables + 4 * (domain_id as u64 + 1));
        self.mem
            .write_scalar::<u16>(ri + lay.runtime_info_max_domain, domain_id as u16);
        self.write_ptr(ri + lay.runtime_info_vtables + domain_id as u64 * 4, vt);
        self.write_ptr(class + lay.class_runtime_info, ri);
        (vt, static_base)
    }

    /// A vtable good only for object headers (class recovery), not bound to
    /// any domain.
    pub fn bare_vtable(&mut self, class: Address) -> Address {
        let vt = self.alloc(48);
        self.write_ptr(vt + self.layout.vtable_class, class);
        vt
    }

    /// An object with the given header vtable.
    pub fn object(&mut self, vtable: Address, size: u64) -> Address {
        let obj = self.alloc(size.max(8));
        self.write_ptr(obj, vtable);
        obj
    }

    /// The fixture's `System.String` class, created on first use.
    pub fn string_class(&mut self) -> Address {
        if let Some(class) = self.string_class {
            return class;
        }
        let length_type = self.prim_type(tag::I4, 0);
        let char_type = self.prim_type(tag::CHAR, 0);
        let class = self.class("System", "String", kind::DEF, 0, 20);
        self.set_fields(
            class,
            &[
                ("m_stringLength", length_type, 8),
                ("m_firstChar", char_type, 12),
            ],
        );
        let vt = self.bare_vtable(class);
        self.string_class = Some(class);
        self.string_vtable = Some(vt);
        class
    }

    /// A managed string object: header, length at +8, UTF-16 units at +12.
    pub fn new_string(&mut self, s: &str) -> Address {
        self.string_class();
        let vt = self.string_vtable.unwrap();
        let units: Vec<u16> = s.encode_utf16().collect();
        let obj = self.alloc(12 + units.len() as u64 * 2 + 2);
        self.write_ptr(obj, vt);
        self.mem.write_scalar::<i32>(obj + 8, units.len() as i32);
        for (i, unit) in units.iter().enumerate() {
            self.mem.write_scalar::<u16>(obj + 12 + i as u64 * 2, *unit);
        }
        obj
    }

    /// A managed array object: header, length at the layout's length offset,
    /// `data_len` zeroed element bytes after the header. Elements are written
    /// by the caller at [`Fixture::array_slot`] addresses.
    pub fn array_object(&mut self, length: u32, data_len: u64) -> Address {
        let vt = match self.array_vtable {
            Some(vt) => vt,
            None => {
                let class = self.class("System", "Array", kind::DEF, 0, 16);
                let vt = self.bare_vtable(class);
                self.array_vtable = Some(vt);
                vt
            }
        };
        let lay = self.layout;
        let obj = self.alloc(lay.array_data + data_len);
        self.write_ptr(obj, vt);
        self.mem.write_scalar::<u32>(obj + lay.array_length, length);
        obj
    }

    /// Address of element `index` in an array object, given its stride.
    pub fn array_slot(&self, array: Address, stride: u64, index: u64) -> Address {
        array + self.layout.array_data + index * stride
    }
}
