//! Transfer Unit.
//!
//! Copies a vector between the scratchpad and main memory, or between a
//! scalar (held in a register or stored once) and either of them. There is no arithmetic; elements
//! are converted when source and destination precisions differ. Source and
//! destination are checked for overlap before anything is issued.

use tracing::{debug, warn};

use crate::common::{Fault, Value};
use crate::core::arch::{InstKind, VectorDescriptor};
use crate::core::exec::operands::{Operand, XferPlan, latch, read_element, write_element};
use crate::core::exec::{ExecEnv, Output, Step};

/// The atomic variant of the Transfer Unit.
#[derive(Debug, Default)]
pub struct AtomicXferUnit;

impl AtomicXferUnit {
    /// Copies register `src` to register `dst` in one call.
    pub fn execute(src: usize, dst: usize, env: &mut ExecEnv<'_>) -> Step {
        let now = env.now();
        let plan = match XferPlan::build(src, dst, env.regs, env.datapath) {
            Ok(plan) => plan,
            Err(fault) => {
                warn!(%fault, "transfer rejected");
                return Step::at(Err(fault), now);
            }
        };
        let mut latency = 0;
        let mut scalar = None;
        let result = Self::run(&plan, env, &mut latency, &mut scalar)
            .and_then(|()| store_scalar(env, dst, scalar));
        debug!(count = plan.count, latency, "atomic transfer done");
        Step::Finished {
            result,
            ready_at: now + latency,
        }
    }

    fn run(
        plan: &XferPlan,
        env: &mut ExecEnv<'_>,
        latency: &mut u64,
        scalar: &mut Option<Value>,
    ) -> Result<(), Fault> {
        let mut mem = env.ports.atomic();
        let (src, cycles) = latch(&mut mem, plan.src, plan.dst.datatype)?;
        *latency += cycles;
        for i in 0..plan.count {
            let (v, cycles) = read_element(&mut mem, &src, i, plan.dst.datatype)?;
            *latency += cycles;
            if plan.dst.is_register() {
                *scalar = Some(v);
            } else {
                *latency += write_element(&mut mem, &plan.dst, i, v)?;
            }
            mem.stats.elements_transferred += 1;
        }
        Ok(())
    }
}

fn store_scalar(env: &mut ExecEnv<'_>, dst: usize, scalar: Option<Value>) -> Result<Output, Fault> {
    match scalar {
        Some(v) => {
            env.regs.set(dst, VectorDescriptor::scalar(v))?;
            Ok(Output::Scalar(v))
        }
        None => Ok(Output::None),
    }
}

#[derive(Debug)]
struct CopyJob {
    plan: XferPlan,
    dst_reg: usize,
    broadcast: Option<Value>,
    repeat: bool,
    moved: u64,
    scalar: Option<Value>,
    fault: Option<Fault>,
}

/// The timing variant of the Transfer Unit.
///
/// Read pipe 0 streams the source; elements go to the write pipe in the
/// cycle they are delivered.
#[derive(Debug, Default)]
pub struct TimingXferUnit {
    copy: Option<CopyJob>,
}

impl TimingXferUnit {
    /// Validates the copy and starts its streams.
    pub fn start(&mut self, src: usize, dst: usize, env: &mut ExecEnv<'_>) -> Step {
        let now = env.now();
        let plan = match XferPlan::build(src, dst, env.regs, env.datapath) {
            Ok(plan) => plan,
            Err(fault) => {
                warn!(%fault, "transfer rejected");
                return Step::at(Err(fault), now);
            }
        };
        let broadcast = match plan.src {
            Operand::Broadcast(v) => Some(v.convert(plan.dst.datatype)),
            Operand::Stream(desc) | Operand::Fetch(desc) => {
                let Some(reader) = env.pipes.readers.first_mut() else {
                    return Step::at(Err(Fault::config("no read pipe configured")), now);
                };
                let count = if desc.broadcast { 1 } else { plan.count };
                reader.start_reading(&desc, count, InstKind::XferOp);
                None
            }
        };
        let repeat = matches!(plan.src, Operand::Fetch(_));
        if !plan.dst.is_register() {
            env.pipes
                .writer
                .start_writing(&plan.dst, plan.count, InstKind::XferOp);
        }
        debug!(count = plan.count, src = ?plan.src, dst = plan.dst.base, "transfer start");
        self.copy = Some(CopyJob {
            plan,
            dst_reg: dst,
            broadcast,
            repeat,
            moved: 0,
            scalar: None,
            fault: None,
        });
        Step::Running
    }

    /// Moves delivered elements to the writer.
    ///
    /// # Errors
    ///
    /// Fatal faults only.
    pub fn tick(&mut self, env: &mut ExecEnv<'_>) -> Result<Step, Fault> {
        let Some(copy) = self.copy.as_mut() else {
            return Err(Fault::protocol("transfer unit ticked without an operation"));
        };
        match copy.step(env) {
            Some(result) => {
                self.copy = None;
                Ok(Step::at(result, env.now()))
            }
            None => Ok(Step::Running),
        }
    }

    /// Drops the current copy.
    pub fn abort(&mut self) {
        self.copy = None;
    }
}

impl CopyJob {
    fn step(&mut self, env: &mut ExecEnv<'_>) -> Option<Result<Output, Fault>> {
        let dst = self.plan.dst;
        if self.fault.is_none() {
            let read_fault = if self.broadcast.is_some() {
                None
            } else {
                env.pipes.readers.first().and_then(|r| r.fault()).cloned()
            };
            let write_fault = if dst.is_register() {
                None
            } else {
                env.pipes.writer.fault().cloned()
            };
            if let Some(fault) = read_fault.or(write_fault) {
                warn!(%fault, moved = self.moved, "transfer aborting");
                env.pipes.cancel_all();
                self.fault = Some(fault);
            }
        }
        if let Some(fault) = &self.fault {
            return env.pipes.is_quiescent().then(|| Err(fault.clone()));
        }

        while self.moved < self.plan.count {
            let v = match self.broadcast {
                Some(v) => v,
                None => match env.pipes.readers.first_mut().and_then(|r| r.pop()) {
                    Some(v) => {
                        let v = v.convert(dst.datatype);
                        if self.repeat {
                            self.broadcast = Some(v);
                        }
                        v
                    }
                    None => break,
                },
            };
            if dst.is_register() {
                self.scalar = Some(v);
            } else {
                env.pipes.writer.push(v);
            }
            self.moved += 1;
            env.ports.stats.elements_transferred += 1;
        }

        if self.moved < self.plan.count {
            return None;
        }
        if dst.is_register() {
            debug!("transfer done");
            return Some(store_scalar(env, self.dst_reg, self.scalar));
        }
        env.pipes.writer.is_done().then(|| {
            debug!(count = self.plan.count, "transfer done");
            Ok(Output::None)
        })
    }
}
