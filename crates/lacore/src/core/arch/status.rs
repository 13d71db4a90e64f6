//! Status control register.
//!
//! Low 32 bits hold one sticky flag per fault kind (see `Fault::status_bit`);
//! the high 32 bits count retired instructions, wrapping.

use serde::Serialize;

use crate::common::Fault;

/// Status register of one hardware thread's coprocessor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StatusReg {
    flags: u32,
    retired: u32,
}

impl StatusReg {
    /// Creates a cleared status register.
    pub const fn new() -> Self {
        Self {
            flags: 0,
            retired: 0,
        }
    }

    /// Raw register value as read by `XferOp::ReadStatus`.
    pub const fn value(&self) -> u64 {
        ((self.retired as u64) << 32) | self.flags as u64
    }

    /// Sticky fault flags.
    pub const fn flags(&self) -> u32 {
        self.flags
    }

    /// Instructions retired since reset, modulo 2^32.
    pub const fn retired(&self) -> u32 {
        self.retired
    }

    /// Records the outcome of a retired instruction.
    pub fn record<T>(&mut self, result: &Result<T, Fault>) {
        self.retired = self.retired.wrapping_add(1);
        if let Err(fault) = result {
            self.flags |= fault.status_bit() as u32;
        }
    }

    /// Clears the sticky fault flags; the retired count is kept.
    pub const fn clear_flags(&mut self) {
        self.flags = 0;
    }
}
