//! `System.Collections.Generic.Dictionary<K, V>` views
//!
//! Mono's dictionary keeps three parallel arrays: link slots (hash code and
//! chain index), key slots, and value slots. `touchedSlots` bounds the slots
//! ever used; a slot currently holds an entry only when the high bit of its
//! stored hash code is set. The view walks the touched prefix once and
//! materializes the occupied entries.

use crate::catalog::{ClassId, ImageCatalog};
use crate::collections::array::{ArrayView, Decode};
use crate::object::ObjectHandle;
use periscope_core::{Address, Error, Result};
use periscope_memory::ProcessMemory;
use std::collections::HashMap;
use std::hash::Hash;

const TOUCHED_SLOTS_FIELD: &str = "touchedSlots";
const LINK_SLOTS_FIELD: &str = "linkSlots";
const KEY_SLOTS_FIELD: &str = "keySlots";
const VALUE_SLOTS_FIELD: &str = "valueSlots";

/// High bit of a link slot's hash code: slot currently holds an entry.
const HASH_OCCUPIED_BIT: u32 = 0x8000_0000;

/// The hash-code word of one `Link` struct in the linkSlots array. The chain
/// index that follows it is only needed for insertion, not for enumeration.
struct LinkSlot {
    hash_code: u32,
}

impl Decode for LinkSlot {
    fn decode<M: ProcessMemory>(
        catalog: &mut ImageCatalog,
        mem: &M,
        element_class: ClassId,
        addr: Address,
        _domain_id: i32,
    ) -> Result<Self> {
        if !catalog.class(element_class).is_value_type() {
            return Err(Error::decode("dictionary link slots must be value typed"));
        }
        Ok(Self {
            hash_code: mem.read_scalar(addr)?,
        })
    }
}

impl LinkSlot {
    fn occupied(&self) -> bool {
        self.hash_code & HASH_OCCUPIED_BIT != 0
    }
}

/// An eagerly materialized dictionary.
#[derive(Debug, Clone)]
pub struct MapView<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Decode + Eq + Hash, V: Decode> MapView<K, V> {
    pub fn new<M: ProcessMemory>(
        catalog: &mut ImageCatalog,
        mem: &M,
        obj: ObjectHandle,
    ) -> Result<Self> {
        let touched = obj
            .get(catalog, mem, TOUCHED_SLOTS_FIELD)?
            .as_i32()
            .ok_or_else(|| Error::decode("dictionary touchedSlots is not Int4"))?;
        let links = Self::slot_array::<LinkSlot, M>(catalog, mem, &obj, LINK_SLOTS_FIELD)?;
        let keys = Self::slot_array::<K, M>(catalog, mem, &obj, KEY_SLOTS_FIELD)?;
        let values = Self::slot_array::<V, M>(catalog, mem, &obj, VALUE_SLOTS_FIELD)?;

        let mut entries = HashMap::new();
        for i in 0..touched.max(0) as i64 {
            let link = links.get(catalog, mem, i)?;
            if !link.occupied() {
                continue;
            }
            let key = keys.get(catalog, mem, i)?;
            let value = values.get(catalog, mem, i)?;
            entries.insert(key, value);
        }
        Ok(Self { entries })
    }

    fn slot_array<T: Decode, M: ProcessMemory>(
        catalog: &mut ImageCatalog,
        mem: &M,
        obj: &ObjectHandle,
        field: &str,
    ) -> Result<ArrayView<T>> {
        let declared = obj
            .field_type(catalog, field)
            .ok_or_else(|| Error::field_not_found(field))?;
        let array_obj = obj
            .get(catalog, mem, field)?
            .into_object()
            .ok_or_else(|| Error::decode(format!("dictionary {field} is not an array object")))?;
        ArrayView::new(catalog, mem, array_obj, declared)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }

    pub fn into_map(self) -> HashMap<K, V> {
        self.entries
    }
}
