//! Architectural state of the coprocessor.
//!
//! This module contains what the host can name and observe:
//! 1. **Instructions:** Decoded CONFIG / DATA_OP / XFER_OP instructions.
//! 2. **Vector registers:** The descriptors built by the Configuration Unit.
//! 3. **Status register:** Sticky fault flags and the retired-instruction count.

/// Decoded coprocessor instructions.
pub mod insn;

/// Status control register.
pub mod status;

/// Vector descriptors and the vector register file.
pub mod vreg;

pub use insn::{
    ConfigKind, ConfigOp, DataOp, Form, InstKind, Instruction, ReduceOp, Reduction, XferOp,
};
pub use status::StatusReg;
pub use vreg::{ALIAS_SCAN_LIMIT, RegisterFile, VectorDescriptor};
