//! Core types and errors for periscope
//!
//! This crate provides the foundational types used by every other crate in
//! the workspace.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::Address;
