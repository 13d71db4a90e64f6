//! LA-core coprocessor.
//!
//! This module contains the coprocessor of one hardware thread:
//! 1. **Architecture:** Instructions, vector registers and the status register.
//! 2. **Dispatcher:** The one-instruction-in-flight state machine.
//! 3. **Execution units:** Configuration, Data Compute and Transfer units.
//! 4. **Memory unit:** Request Tracker and Read/Write Pipes.
//! 5. **Storage units:** Scratchpad, L1 tag model and MMU.

/// Architectural state (instructions, vector registers, status register).
pub mod arch;

/// Instruction dispatcher.
pub mod dispatch;

/// Execution units.
pub mod exec;

/// `LaCore` definition, host interface and per-cycle loop.
pub mod lacore;

/// Request Tracker and Read/Write Pipes.
pub mod mem_unit;

/// Storage and translation units.
pub mod units;

pub use self::dispatch::{DispatchState, Dispatcher, Outcome, Poll, SubmitResult};
pub use self::exec::Output;
pub use self::lacore::{CoreSnapshot, LaCore};
