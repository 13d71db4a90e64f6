//! LA-core coprocessor timing model.
//!
//! This crate models the linear-algebra coprocessor attached to one hardware
//! thread of a host CPU:
//! 1. **Core:** Dispatcher, Configuration / Data Compute / Transfer units and the vector register file.
//! 2. **Memory:** Banked scratchpad, Request Tracker, Read/Write Pipes and a Cache+TLB collaborator.
//! 3. **SoC:** The default L1 + TLB collaborator and the main memory behind it.
//! 4. **Simulation:** Deterministic event queue, JSON programs and a host-side driver.

/// Common types (addresses, element data, faults).
pub mod common;
/// Coprocessor configuration (defaults, enums, per-component config structures).
pub mod config;
/// The coprocessor (dispatcher, execution units, memory unit, storage units).
pub mod core;
/// Event queue, programs and the simulator driver.
pub mod sim;
/// Cache+TLB collaborator and main memory.
pub mod soc;
/// Event counters and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or load from JSON.
pub use crate::config::Config;
/// The coprocessor of one hardware thread.
pub use crate::core::LaCore;
/// Host-side driver running programs on a `LaCore`.
pub use crate::sim::Simulator;
