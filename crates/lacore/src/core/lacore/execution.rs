//! Per-cycle Execution.
//!
//! One call to [`LaCore::tick`] advances the coprocessor by one cycle:
//! 1. **Responses:** Memory responses due this cycle complete their tracker
//!    entries and are handed to the owning pipe.
//! 2. **Dispatch:** A newly dispatched instruction starts on its unit; a unit
//!    already working on one advances by a cycle.
//! 3. **Retire:** A finished instruction whose result is due moves to
//!    `Completing` and is recorded in the status register.
//! 4. **Issue:** Every pipe issues what its channel can take.

use tracing::{error, trace};

use super::LaCore;
use crate::common::Fault;
use crate::core::arch::{InstKind, Instruction};
use crate::core::exec::{ConfigUnit, ExecEnv, Output, Step};
use crate::core::mem_unit::{MemEvent, MemPorts};
use crate::sim::Cycle;

impl LaCore {
    /// Advances the coprocessor by one cycle.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Protocol`] when an internal invariant is violated
    /// (a response for an unknown request, a channel overflow). The core is
    /// not usable afterwards.
    pub fn tick(&mut self) -> Result<(), Fault> {
        let now = self.ctx.advance();
        self.stats.cycles += 1;

        while let Some(MemEvent::Response { id, result }) = self.ctx.events.pop_due(now) {
            trace!(%id, now, ok = result.is_ok(), "memory response");
            if let Some(done) = self.tracker.complete(id, result)? {
                self.pipes.route(done)?;
            }
        }

        let Self {
            ctx,
            scratchpad,
            cache,
            tracker,
            pipes,
            regs,
            status,
            stats,
            config,
            dispatcher,
            data_unit,
            xfer_unit,
        } = self;
        let mut env = ExecEnv {
            ports: MemPorts {
                ctx,
                scratchpad,
                cache: cache.as_mut(),
                tracker,
                stats,
            },
            pipes,
            regs,
            status,
            datapath: &config.datapath,
        };

        let step = if let Some(insn) = dispatcher.begin() {
            Some(match &insn {
                Instruction::Config(op) => {
                    Step::at(ConfigUnit::execute(op, env.regs).map(|()| Output::None), now)
                }
                Instruction::Data(op) => data_unit.start(op, &mut env),
                Instruction::Xfer(op) => xfer_unit.start(op, &mut env),
            })
        } else if dispatcher.awaiting_unit() {
            match dispatcher.current().map(Instruction::kind) {
                Some(InstKind::DataOp) => Some(data_unit.tick(&mut env)?),
                Some(InstKind::XferOp) => Some(xfer_unit.tick(&mut env)?),
                Some(InstKind::Config) | None => None,
            }
        } else {
            None
        };

        if let Some(Step::Finished { result, ready_at }) = step {
            if let Err(fault) = &result
                && fault.is_fatal()
            {
                error!(%fault, now, "fatal fault in execution unit");
                return Err(fault.clone());
            }
            dispatcher.finish(result, ready_at);
        }
        if let Some((kind, result)) = dispatcher.retire(now, env.status) {
            env.ports.stats.record_outcome(kind, result);
        }

        env.pipes.tick(&mut env.ports)
    }

    /// Ticks until the in-flight instruction completes or `limit` cycles pass.
    ///
    /// # Returns
    ///
    /// The number of cycles ticked.
    ///
    /// # Errors
    ///
    /// Fatal faults from [`LaCore::tick`].
    pub fn run_until_idle(&mut self, limit: Cycle) -> Result<Cycle, Fault> {
        let mut ticked = 0;
        while self.dispatcher.is_busy() && ticked < limit {
            self.tick()?;
            ticked += 1;
        }
        Ok(ticked)
    }
}
