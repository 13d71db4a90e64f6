//! LA-core Definition and Host Interface.
//!
//! `LaCore` is the coprocessor of one hardware thread. It owns every piece of
//! its state:
//! 1. **Architectural state:** Vector register file and status register.
//! 2. **Memory path:** Scratchpad, Cache+TLB collaborator, Request Tracker and pipes.
//! 3. **Control:** Dispatcher and the atomic or timing execution units.
//! 4. **Time:** The simulation context (clock and event queue).
//!
//! The host drives it through [`LaCore::submit`], [`LaCore::tick`] and
//! [`LaCore::poll_completion`].

/// Per-cycle execution.
pub mod execution;

use serde::Serialize;
use tracing::{debug, info};

use crate::common::{ConfigError, Fault, VirtAddr};
use crate::config::{Config, DrainPolicy};
use crate::core::arch::{Instruction, RegisterFile, StatusReg, VectorDescriptor};
use crate::core::dispatch::{DispatchState, Dispatcher, Poll, SubmitResult};
use crate::core::exec::{DataUnit, XferUnit};
use crate::core::mem_unit::{OutstandingRequest, Pipes, RequestTracker};
use crate::core::units::scratchpad::Scratchpad;
use crate::sim::{Cycle, SimContext};
use crate::soc::{CacheTlb, L1CacheTlb};
use crate::stats::LaStats;

/// Checkpointable view of the core's state.
#[derive(Clone, Debug, Serialize)]
pub struct CoreSnapshot {
    /// Current cycle.
    pub cycle: Cycle,
    /// Every vector register, configured or not.
    pub registers: Vec<Option<VectorDescriptor>>,
    /// Status register.
    pub status: StatusReg,
    /// Dispatcher state.
    pub state: DispatchState,
    /// The instruction in flight.
    pub instruction: Option<Instruction>,
    /// Memory requests in flight.
    pub outstanding: Vec<OutstandingRequest>,
}

/// The coprocessor of one hardware thread.
#[derive(Debug)]
pub struct LaCore {
    /// Construction-time parameters.
    pub config: Config,
    /// Clock and event queue.
    ctx: SimContext,
    /// Banked scratchpad.
    pub scratchpad: Scratchpad,
    /// Cache+TLB collaborator.
    cache: Box<dyn CacheTlb>,
    /// Outstanding memory requests.
    tracker: RequestTracker,
    /// Read and write pipes.
    pipes: Pipes,
    /// Vector register file.
    pub regs: RegisterFile,
    /// Status register.
    pub status: StatusReg,
    dispatcher: Dispatcher,
    data_unit: DataUnit,
    xfer_unit: XferUnit,
    /// Event counters.
    pub stats: LaStats,
}

impl LaCore {
    /// Builds a core with the default [`L1CacheTlb`] collaborator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        Self::with_cache_tlb(config, Box::new(L1CacheTlb::new(config)))
    }

    /// Builds a core around a caller-supplied Cache+TLB collaborator.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the configuration does not validate.
    pub fn with_cache_tlb(config: &Config, cache: Box<dyn CacheTlb>) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            mode = ?config.core.exec_mode,
            channels = config.mem_unit.channels,
            banks = config.scratchpad.banks,
            "LA-core configured"
        );
        Ok(Self {
            config: config.clone(),
            ctx: SimContext::new(),
            scratchpad: Scratchpad::new(&config.scratchpad),
            cache,
            tracker: RequestTracker::new(config.mem_unit.channels, config.mem_unit.channel_capacity),
            pipes: Pipes::new(&config.mem_unit),
            regs: RegisterFile::new(config.core.registers),
            status: StatusReg::new(),
            dispatcher: Dispatcher::new(),
            data_unit: DataUnit::new(config.core.exec_mode),
            xfer_unit: XferUnit::new(config.core.exec_mode),
            stats: LaStats::default(),
        })
    }

    /// Current cycle.
    pub const fn now(&self) -> Cycle {
        self.ctx.now()
    }

    /// The Cache+TLB collaborator.
    pub fn cache(&self) -> &dyn CacheTlb {
        self.cache.as_ref()
    }

    /// Request Tracker, for inspection.
    pub const fn tracker(&self) -> &RequestTracker {
        &self.tracker
    }

    /// Dispatcher state.
    pub const fn dispatch_state(&self) -> DispatchState {
        self.dispatcher.state()
    }

    /// Offers an instruction to the dispatcher.
    pub fn submit(&mut self, insn: Instruction) -> SubmitResult {
        self.dispatcher.submit(insn, self.ctx.now())
    }

    /// Collects the outcome of the in-flight instruction, once.
    pub fn poll_completion(&mut self) -> Poll {
        self.dispatcher.poll_completion()
    }

    /// Stops accepting instructions.
    ///
    /// Under [`DrainPolicy::Discard`] the tracker drops every outstanding
    /// request and an instruction still executing completes with
    /// [`Fault::Drained`]; one whose result is already computed keeps it.
    /// Under [`DrainPolicy::Wait`] in-flight work finishes normally.
    pub fn drain(&mut self) {
        self.dispatcher.drain();
        if self.config.core.drain_policy == DrainPolicy::Discard
            && self.dispatcher.is_busy()
            && !self.dispatcher.has_result()
        {
            let dropped = self.tracker.discard_all();
            self.pipes.abandon_all();
            self.data_unit.abort();
            self.xfer_unit.abort();
            let aborted = self
                .dispatcher
                .abort(Fault::Drained, self.ctx.now(), &mut self.status);
            if let Some(kind) = aborted {
                self.stats.record_outcome(kind, &Err(Fault::Drained));
            }
            self.stats.requests_discarded += dropped as u64;
            debug!(dropped, "drain discarded in-flight work");
        }
    }

    /// Returns `true` once drained, nothing executes and no request is outstanding.
    pub fn is_drained(&self) -> bool {
        !self.dispatcher.is_accepting() && !self.dispatcher.is_busy() && self.tracker.is_empty()
    }

    /// Accepts instructions again after a drain.
    pub const fn resume(&mut self) {
        self.dispatcher.resume();
    }

    /// Captures registers, dispatcher state and outstanding requests.
    pub fn snapshot(&self) -> CoreSnapshot {
        CoreSnapshot {
            cycle: self.ctx.now(),
            registers: self.regs.snapshot(),
            status: self.status,
            state: self.dispatcher.state(),
            instruction: self.dispatcher.current().cloned(),
            outstanding: self.tracker.snapshot(),
        }
    }

    /// Writes bytes into main memory at a virtual address, untimed.
    ///
    /// # Errors
    ///
    /// Translation or access faults.
    pub fn write_memory(&mut self, vaddr: u64, data: &[u8]) -> Result<(), Fault> {
        self.cache.functional_write(VirtAddr::new(vaddr), data)
    }

    /// Reads bytes from main memory at a virtual address, untimed.
    ///
    /// # Errors
    ///
    /// Translation or access faults.
    pub fn read_memory(&mut self, vaddr: u64, buf: &mut [u8]) -> Result<(), Fault> {
        self.cache.functional_read(VirtAddr::new(vaddr), buf)
    }
}
