//! Decoders for the BCL container shapes game state lives in
//!
//! Arrays, `List<T>`, `Dictionary<K, V>`, `Nullable<T>` and `System.String`
//! each get a typed view. The views decode elements through the [`Decode`]
//! trait, which picks inline or pointer reads from the element class.

pub mod array;
pub mod list;
pub mod map;
pub mod nullable;
pub mod string;

pub use array::{ArrayView, Decode};
pub use list::ListView;
pub use map::MapView;
pub use nullable::Nullable;
pub use string::decode_string;
