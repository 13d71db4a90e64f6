//! Simulator: drives one `LaCore` the way a host thread would.
//!
//! The host submits one instruction at a time, ticks the core until the
//! dispatcher reports the outcome and only then moves to the next
//! instruction, so program order is preserved without any speculation.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::common::{AccessReason, ConfigError, Fault, Location, Value};
use crate::config::Config;
use crate::core::arch::Instruction;
use crate::core::{LaCore, Outcome, Poll, SubmitResult};
use crate::sim::Cycle;
use crate::sim::program::{Dump, Preload, Program};

/// Cycle limit used when the caller does not pick one.
pub const DEFAULT_MAX_CYCLES: Cycle = 10_000_000;

/// Why a simulation run stopped early.
#[derive(Debug, Error)]
pub enum SimError {
    /// The core hit an internal protocol violation, or storage setup faulted.
    #[error(transparent)]
    Fault(#[from] Fault),

    /// An instruction did not complete within the cycle limit.
    #[error("instruction did not complete within {0} cycles")]
    Timeout(Cycle),

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything a program run produced.
#[derive(Clone, Debug, Default, Serialize)]
pub struct RunReport {
    /// One outcome per instruction, in program order.
    pub outcomes: Vec<Outcome>,
    /// Values of each requested dump range.
    pub dumps: Vec<Vec<Value>>,
    /// Cycle the last instruction completed.
    pub cycles: Cycle,
}

/// Host-side driver of one coprocessor.
#[derive(Debug)]
pub struct Simulator {
    /// The coprocessor being driven.
    pub core: LaCore,
    /// Cycles one instruction may take before the run is abandoned.
    pub max_cycles: Cycle,
}

impl Simulator {
    /// Builds a simulator around a fresh core.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::Config`] if the configuration does not validate.
    pub fn new(config: &Config) -> Result<Self, SimError> {
        Ok(Self::with_core(LaCore::new(config)?))
    }

    /// Wraps an already built core.
    pub const fn with_core(core: LaCore) -> Self {
        Self {
            core,
            max_cycles: DEFAULT_MAX_CYCLES,
        }
    }

    /// Writes a preload into its storage, untimed.
    ///
    /// # Errors
    ///
    /// Access or translation faults of the target range.
    pub fn preload(&mut self, preload: &Preload) -> Result<(), SimError> {
        let bytes = preload.bytes();
        match preload.location {
            Location::Scratchpad => self.core.scratchpad.poke(preload.addr, &bytes)?,
            Location::Memory => self.core.write_memory(preload.addr, &bytes)?,
            Location::Register => {
                return Err(Fault::config("cannot preload a register location").into());
            }
        }
        debug!(location = ?preload.location, addr = preload.addr, bytes = bytes.len(), "preloaded");
        Ok(())
    }

    /// Reads a dump range back, untimed.
    ///
    /// # Errors
    ///
    /// Access or translation faults of the range. A range longer than the
    /// storage it names is refused before any buffer is allocated.
    pub fn dump(&mut self, dump: &Dump) -> Result<Vec<Value>, SimError> {
        let width = dump.datatype.width();
        let limit = match dump.location {
            Location::Scratchpad => self.core.scratchpad.capacity(),
            Location::Memory => self.core.config.memory.ram_size,
            Location::Register => {
                return Err(Fault::config("cannot dump a register location").into());
            }
        };
        let len = dump
            .count
            .checked_mul(width)
            .filter(|len| *len <= limit)
            .ok_or(Fault::Access {
                addr: dump.addr,
                len: dump.count.saturating_mul(width),
                reason: AccessReason::OutOfRange,
            })?;
        let mut buf = vec![0u8; len as usize];
        match dump.location {
            Location::Scratchpad => self.core.scratchpad.peek(dump.addr, &mut buf)?,
            Location::Memory => self.core.read_memory(dump.addr, &mut buf)?,
            Location::Register => {}
        }
        Ok(buf
            .chunks_exact(width as usize)
            .filter_map(|raw| Value::decode(dump.datatype, raw))
            .collect())
    }

    /// Submits one instruction and ticks until its outcome is reported.
    ///
    /// A faulting instruction is not an error here; its fault is the outcome.
    ///
    /// # Errors
    ///
    /// [`SimError::Fault`] for fatal faults, [`SimError::Timeout`] if the
    /// instruction takes more than `max_cycles`.
    pub fn run_instruction(&mut self, insn: Instruction) -> Result<Outcome, SimError> {
        let start = self.core.now();
        while self.core.submit(insn.clone()) == SubmitResult::Stall {
            self.tick_bounded(start)?;
        }
        loop {
            self.tick_bounded(start)?;
            if let Poll::Done(outcome) = self.core.poll_completion() {
                return Ok(outcome);
            }
        }
    }

    fn tick_bounded(&mut self, start: Cycle) -> Result<(), SimError> {
        if self.core.now() - start >= self.max_cycles {
            return Err(SimError::Timeout(self.max_cycles));
        }
        self.core.tick()?;
        Ok(())
    }

    /// Preloads storage, runs every instruction in order and reads the dumps.
    ///
    /// # Errors
    ///
    /// As [`Simulator::preload`], [`Simulator::run_instruction`] and [`Simulator::dump`].
    pub fn run_program(&mut self, program: &Program) -> Result<RunReport, SimError> {
        for preload in &program.preload {
            self.preload(preload)?;
        }
        let mut report = RunReport::default();
        for insn in &program.instructions {
            report.outcomes.push(self.run_instruction(insn.clone())?);
        }
        for dump in &program.dump {
            report.dumps.push(self.dump(dump)?);
        }
        report.cycles = self.core.now();
        info!(
            instructions = report.outcomes.len(),
            cycles = report.cycles,
            "program finished"
        );
        Ok(report)
    }
}
