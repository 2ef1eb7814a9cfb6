//! Mono runtime struct layout
//!
//! Every offset the engine uses to pick apart a remote `MonoClass`,
//! `MonoType`, `MonoClassField`, `MonoVTable` or the image class-cache hash
//! table lives here, in one table. The values were recovered by hand from a
//! specific 32-bit Mono build embedded in Unity-era game clients; porting to
//! another build means producing another table, nothing else. The table is
//! serde-enabled so an alternate layout can come from configuration.

use serde::{Deserialize, Serialize};

/// Size of the object header (`MonoObject`: vtable pointer + sync block) on
/// the supported 32-bit targets. A boxed value type's payload starts after it.
pub const OBJECT_HEADER_SIZE: u64 = 8;

/// The generic-argument count occupies the low 22 bits of the
/// `MonoGenericInst` bitfield; the rest are unrelated flags.
pub const GENERIC_INST_ARGC_MASK: u32 = 0x003F_FFFF;

/// Bit in the vtable flags byte set when the runtime appended a static-field
/// data pointer after the method slot table.
pub const VTABLE_STATIC_FIELDS_BIT: u8 = 0b100;

/// Bit in the `MonoType` flags byte marking a by-reference type.
pub const TYPE_BYREF_BIT: u8 = 0b10;

/// Offsets into the remote runtime structures, all relative to the start of
/// the owning struct. One table per supported Mono build.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MonoLayout {
    /// Pointer width of the target process, in bytes.
    pub pointer_size: usize,

    // MonoImage
    pub image_class_cache: u64,

    // MonoInternalHashTable (the image's class cache)
    pub hash_table_size: u64,
    pub hash_table_buckets: u64,

    // MonoClass
    pub class_element_class: u64,
    pub class_supertypes: u64,
    pub class_idepth: u64,
    pub class_instance_size: u64,
    pub class_flags: u64,
    pub class_kind: u64,
    pub class_parent: u64,
    pub class_name: u64,
    pub class_namespace: u64,
    pub class_vtable_size: u64,
    pub class_sizes: u64,
    pub class_fields: u64,
    pub class_runtime_info: u64,

    // MonoClassDef trailing struct (kind Def / GenericTypeDefinition only)
    pub class_def_field_count: u64,
    pub class_def_next_cache: u64,

    // MonoClassGenericInst trailing struct (kind GenericInstance only)
    pub class_ginst_generic: u64,

    // MonoClassField
    pub field_stride: u64,
    pub field_type: u64,
    pub field_name: u64,
    pub field_offset: u64,

    // MonoType
    pub type_data: u64,
    pub type_attrs: u64,
    pub type_tag: u64,
    pub type_flags: u64,

    // MonoGenericClass / MonoGenericInst
    pub generic_class_container: u64,
    pub generic_class_inst: u64,
    pub generic_inst_argc: u64,
    pub generic_inst_argv: u64,

    // MonoArrayType
    pub array_type_element: u64,

    // MonoClassRuntimeInfo
    pub runtime_info_max_domain: u64,
    pub runtime_info_vtables: u64,

    // MonoVTable
    pub vtable_class: u64,
    pub vtable_flags: u64,
    pub vtable_table: u64,

    // MonoArray (instances)
    pub array_length: u64,
    pub array_data: u64,
}

impl MonoLayout {
    /// Layout of the 32-bit Mono runtime this engine was validated against.
    pub const fn x86() -> Self {
        Self {
            pointer_size: 4,

            image_class_cache: 852,

            hash_table_size: 12,
            hash_table_buckets: 20,

            class_element_class: 0,
            class_supertypes: 8,
            class_idepth: 12,
            class_instance_size: 16,
            class_flags: 20,
            class_kind: 24,
            class_parent: 28,
            class_name: 44,
            class_namespace: 48,
            class_vtable_size: 56,
            class_sizes: 92,
            class_fields: 96,
            class_runtime_info: 132,

            class_def_field_count: 164,
            class_def_next_cache: 168,

            class_ginst_generic: 148,

            field_stride: 16,
            field_type: 0,
            field_name: 4,
            field_offset: 12,

            type_data: 0,
            type_attrs: 4,
            type_tag: 6,
            type_flags: 7,

            generic_class_container: 0,
            generic_class_inst: 4,
            generic_inst_argc: 4,
            generic_inst_argv: 8,

            array_type_element: 0,

            runtime_info_max_domain: 0,
            runtime_info_vtables: 4,

            vtable_class: 0,
            vtable_flags: 28,
            vtable_table: 40,

            array_length: 12,
            array_data: 16,
        }
    }
}

impl Default for MonoLayout {
    fn default() -> Self {
        Self::x86()
    }
}

/// The runtime's type tags (`MONO_TYPE_*`) the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Void,
    Bool,
    Char,
    I1,
    U1,
    I2,
    U2,
    I4,
    U4,
    I8,
    U8,
    R4,
    R8,
    String,
    Ptr,
    ValueType,
    Class,
    Array,
    GenericInst,
    NativeInt,
    NativeUint,
    SzArray,
}

impl TypeTag {
    pub fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0x01 => Self::Void,
            0x02 => Self::Bool,
            0x03 => Self::Char,
            0x04 => Self::I1,
            0x05 => Self::U1,
            0x06 => Self::I2,
            0x07 => Self::U2,
            0x08 => Self::I4,
            0x09 => Self::U4,
            0x0a => Self::I8,
            0x0b => Self::U8,
            0x0c => Self::R4,
            0x0d => Self::R8,
            0x0e => Self::String,
            0x0f => Self::Ptr,
            0x11 => Self::ValueType,
            0x12 => Self::Class,
            0x14 => Self::Array,
            0x15 => Self::GenericInst,
            0x18 => Self::NativeInt,
            0x19 => Self::NativeUint,
            0x1d => Self::SzArray,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Void => "Void",
            Self::Bool => "Bool",
            Self::Char => "Char",
            Self::I1 => "Int1",
            Self::U1 => "Uint1",
            Self::I2 => "Int2",
            Self::U2 => "Uint2",
            Self::I4 => "Int4",
            Self::U4 => "Uint4",
            Self::I8 => "Int8",
            Self::U8 => "Uint8",
            Self::R4 => "Float",
            Self::R8 => "Double",
            Self::String => "String",
            Self::Ptr => "Ptr",
            Self::ValueType => "Value",
            Self::Class => "Class",
            Self::Array => "Array",
            Self::GenericInst => "Generic",
            Self::NativeInt => "Int",
            Self::NativeUint => "Uint",
            Self::SzArray => "SzArray",
        }
    }
}

/// What kind of `MonoClass` record a class address points at; drives how the
/// field count is recovered (it is not stored uniformly).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Def,
    GenericTypeDefinition,
    GenericInstance,
    GenericParam,
    Array,
    Pointer,
}

impl ClassKind {
    /// The kind lives in the low 3 bits of the class-kind byte.
    pub fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw & 0x7 {
            1 => Self::Def,
            2 => Self::GenericTypeDefinition,
            3 => Self::GenericInstance,
            4 => Self::GenericParam,
            5 => Self::Array,
            6 => Self::Pointer,
            _ => return None,
        })
    }
}

/// Field attribute bits carried in the `MonoType` attrs halfword.
pub mod field_attributes {
    pub const PRIVATE: u16 = 0x0001;
    pub const PUBLIC: u16 = 0x0006;
    pub const STATIC: u16 = 0x0010;
    pub const LITERAL: u16 = 0x0040;
}

/// Bits of the MonoClass flags word the engine consumes.
pub mod class_flags {
    pub const VALUE_TYPE: u32 = 1 << 2;
    pub const ENUM_TYPE: u32 = 1 << 3;
}
