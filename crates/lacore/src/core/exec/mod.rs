//! Execution units.
//!
//! This module holds the three units the dispatcher routes to:
//! 1. **Configuration Unit:** Synchronous register-file updates.
//! 2. **Data Compute Unit:** Elementwise arithmetic and reductions.
//! 3. **Transfer Unit:** Copies and status access.
//!
//! The data and transfer units come in an atomic and a timing variant. The
//! variant is picked once from `core.exec_mode` when the core is built; the
//! dispatcher only sees [`DataUnit`] and [`XferUnit`].

/// Element arithmetic and latencies.
pub mod arith;
/// Configuration Unit.
pub mod cfg_unit;
/// Atomic Data Compute Unit.
pub mod data_atomic;
/// Timing Data Compute Unit.
pub mod data_timing;
/// Operand resolution and validation.
pub mod operands;
/// Transfer Unit, both variants.
pub mod xfer_unit;

use serde::Serialize;

use crate::common::{Fault, Value};
use crate::config::{DatapathConfig, ExecMode};
use crate::core::arch::{DataOp, RegisterFile, StatusReg, XferOp};
use crate::core::mem_unit::{MemPorts, Pipes};
use crate::sim::Cycle;

pub use cfg_unit::ConfigUnit;
pub use data_atomic::AtomicDataUnit;
pub use data_timing::TimingDataUnit;
pub use xfer_unit::{AtomicXferUnit, TimingXferUnit};

/// Value an instruction returns to the host.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Output {
    /// Nothing beyond completion.
    None,
    /// A scalar result written to a register destination.
    Scalar(Value),
    /// The status register value.
    Status(u64),
}

/// Progress report of a unit.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    /// Still working.
    Running,
    /// Done; the outcome may be reported from cycle `ready_at` on.
    Finished {
        /// Outcome of the instruction.
        result: Result<Output, Fault>,
        /// First cycle the dispatcher may complete the instruction.
        ready_at: Cycle,
    },
}

impl Step {
    /// A step that finished at `now`.
    pub const fn at(result: Result<Output, Fault>, now: Cycle) -> Self {
        Self::Finished {
            result,
            ready_at: now,
        }
    }
}

/// Everything a unit may touch during one call.
#[derive(Debug)]
pub struct ExecEnv<'a> {
    /// Memory path.
    pub ports: MemPorts<'a>,
    /// Read and write pipes.
    pub pipes: &'a mut Pipes,
    /// Vector register file.
    pub regs: &'a mut RegisterFile,
    /// Status register.
    pub status: &'a mut StatusReg,
    /// Datapath latencies and precision rules.
    pub datapath: &'a DatapathConfig,
}

impl ExecEnv<'_> {
    /// Current cycle.
    pub const fn now(&self) -> Cycle {
        self.ports.now()
    }
}

/// Data Compute Unit in its configured variant.
#[derive(Debug)]
pub enum DataUnit {
    /// Synchronous variant.
    Atomic(AtomicDataUnit),
    /// Per-element pipelined variant.
    Timing(TimingDataUnit),
}

impl DataUnit {
    /// Builds the variant selected by `mode`.
    pub fn new(mode: ExecMode) -> Self {
        match mode {
            ExecMode::Atomic => Self::Atomic(AtomicDataUnit),
            ExecMode::Timing => Self::Timing(TimingDataUnit::default()),
        }
    }

    /// Starts executing `op`.
    pub fn start(&mut self, op: &DataOp, env: &mut ExecEnv<'_>) -> Step {
        match self {
            Self::Atomic(_) => AtomicDataUnit::execute(op, env),
            Self::Timing(u) => u.start(op, env),
        }
    }

    /// Advances the operation by one cycle.
    ///
    /// # Errors
    ///
    /// Fatal faults only.
    pub fn tick(&mut self, env: &mut ExecEnv<'_>) -> Result<Step, Fault> {
        match self {
            Self::Atomic(_) => Ok(Step::Running),
            Self::Timing(u) => u.tick(env),
        }
    }

    /// Drops the current operation without completing it.
    pub fn abort(&mut self) {
        if let Self::Timing(u) = self {
            u.abort();
        }
    }
}

/// Transfer Unit in its configured variant.
#[derive(Debug)]
pub enum XferUnit {
    /// Synchronous variant.
    Atomic(AtomicXferUnit),
    /// Pipe-driven variant.
    Timing(TimingXferUnit),
}

impl XferUnit {
    /// Builds the variant selected by `mode`.
    pub fn new(mode: ExecMode) -> Self {
        match mode {
            ExecMode::Atomic => Self::Atomic(AtomicXferUnit),
            ExecMode::Timing => Self::Timing(TimingXferUnit::default()),
        }
    }

    /// Starts executing `op`.
    pub fn start(&mut self, op: &XferOp, env: &mut ExecEnv<'_>) -> Step {
        match op {
            XferOp::ReadStatus => Step::at(Ok(Output::Status(env.status.value())), env.now()),
            XferOp::ClearStatus => {
                env.status.clear_flags();
                Step::at(Ok(Output::None), env.now())
            }
            XferOp::Copy { src, dst } => match self {
                Self::Atomic(_) => AtomicXferUnit::execute(*src, *dst, env),
                Self::Timing(u) => u.start(*src, *dst, env),
            },
        }
    }

    /// Advances the copy by one cycle.
    ///
    /// # Errors
    ///
    /// Fatal faults only.
    pub fn tick(&mut self, env: &mut ExecEnv<'_>) -> Result<Step, Fault> {
        match self {
            Self::Atomic(_) => Ok(Step::Running),
            Self::Timing(u) => u.tick(env),
        }
    }

    /// Drops the current copy without completing it.
    pub fn abort(&mut self) {
        if let Self::Timing(u) = self {
            u.abort();
        }
    }
}
