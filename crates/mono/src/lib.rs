//! Mono runtime type-system reconstruction
//!
//! This crate rebuilds the managed type system of a live Mono-embedding
//! process from raw memory reads: walk an image's class cache, parse class
//! and type records into an owned catalog, then decode field values and the
//! common BCL containers out of live objects.
//!
//! The usual flow:
//!
//! 1. [`ImageCatalog::new`] with the image base and a [`MonoLayout`].
//! 2. [`ImageCatalog::scan`] to pull in every cached class.
//! 3. [`ImageCatalog::static_field_value`] (or [`ObjectHandle::get`]) to
//!    walk from a static root into live game state.

pub mod catalog;
pub mod class;
pub mod collections;
pub mod field;
pub mod layout;
pub mod object;
pub mod value;

pub use catalog::{ClassId, ImageCatalog, TypeEntry, TypeId};
pub use class::{ClassEntry, FieldEntry, FieldRef, VTableEntry};
pub use collections::{decode_string, ArrayView, Decode, ListView, MapView, Nullable};
pub use layout::{ClassKind, MonoLayout, TypeTag};
pub use object::ObjectHandle;
pub use value::{DecodedValue, Value};
