//! Simulation context, event queue and program driver.
//!
//! This module provides:
//! 1. **Event queue:** A deterministic min-heap of future memory responses.
//! 2. **Context:** The explicitly owned clock and event queue threaded through every component.
//! 3. **Simulator:** Drives one `LaCore` through a host program.
//! 4. **Program:** JSON-loadable programs with scratchpad/memory preloads.

/// Event queue and simulation context.
pub mod event;

/// JSON program description.
pub mod program;

/// Host-side driver that submits, ticks and polls.
pub mod simulator;

pub use event::{Cycle, EventQueue, SimContext};
pub use program::{Dump, Preload, Program};
pub use simulator::{DEFAULT_MAX_CYCLES, RunReport, SimError, Simulator};
