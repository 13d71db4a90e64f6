//! Common types shared by every LA-core component.
//!
//! This module provides the building blocks the rest of the crate agrees on:
//! 1. **Address Types:** Strong types for virtual and physical addresses.
//! 2. **Element Data:** Element placement, datatypes and decoded element values.
//! 3. **Error Handling:** The fault taxonomy reported to the host and configuration errors.

/// Address type definitions (physical and virtual addresses).
pub mod addr;

/// Element placement, datatype and value definitions.
pub mod data;

/// Fault and configuration error definitions.
pub mod error;

pub use addr::{PhysAddr, VirtAddr};
pub use data::{Datatype, Direction, Location, Value};
pub use error::{AccessReason, ConfigError, Fault, Translation};
