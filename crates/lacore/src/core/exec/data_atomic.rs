//! Atomic Data Compute Unit.
//!
//! Runs a whole DATA_OP inside one call. Every element access is an atomic
//! access; the instruction's latency is the sum of those access latencies
//! plus one trip through the arithmetic datapath (and the reduction tree).
//! On a fault the elements already written stay written.

use tracing::{debug, warn};

use crate::common::{Fault, Value};
use crate::core::arch::{DataOp, VectorDescriptor};
use crate::core::exec::arith;
use crate::core::exec::operands::{DataPlan, Reducer, latch, read_element, write_element};
use crate::core::exec::{ExecEnv, Output, Step};

/// The atomic variant of the Data Compute Unit.
#[derive(Debug, Default)]
pub struct AtomicDataUnit;

impl AtomicDataUnit {
    /// Executes `op` to completion.
    pub fn execute(op: &DataOp, env: &mut ExecEnv<'_>) -> Step {
        let now = env.now();
        let plan = match DataPlan::build(op, env.regs, env.datapath) {
            Ok(plan) => plan,
            Err(fault) => {
                warn!(%fault, "data op rejected");
                return Step::at(Err(fault), now);
            }
        };
        let mut latency = arith::vector_latency(&plan.op, plan.precision, env.datapath);
        if plan.op.reduce.is_some() {
            latency += arith::reduce_latency(plan.precision, env.datapath);
        }
        let result = Self::run(&plan, env, &mut latency);
        if let Ok(Output::Scalar(v)) = result {
            let stored = env.regs.set(plan.op.dst, VectorDescriptor::scalar(v));
            if let Err(fault) = stored {
                return Step::at(Err(fault), now + latency);
            }
        }
        debug!(count = plan.count, latency, "atomic data op done");
        Step::Finished {
            result,
            ready_at: now + latency,
        }
    }

    fn run(plan: &DataPlan, env: &mut ExecEnv<'_>, latency: &mut u64) -> Result<Output, Fault> {
        let mut mem = env.ports.atomic();
        let mut reducer = plan
            .op
            .reduce
            .map(|r| Reducer::new(r.op, plan.segment_len()));
        let mut scalar = None;
        let mut written = 0u64;

        let mut sources = plan.sources;
        for src in sources.iter_mut().flatten() {
            let (operand, cycles) = latch(&mut mem, *src, plan.precision)?;
            *latency += cycles;
            *src = operand;
        }

        for i in 0..plan.count {
            let mut vals: [Option<Value>; 3] = [None; 3];
            for (slot, src) in sources.iter().enumerate() {
                if let Some(src) = src {
                    let (v, cycles) = read_element(&mut mem, src, i, plan.precision)?;
                    *latency += cycles;
                    vals[slot] = Some(v);
                }
            }
            let Some(a) = vals[0] else {
                return Err(Fault::protocol("data op without a first operand"));
            };
            let v = arith::eval(&plan.op, a, vals[1], vals[2]);
            mem.stats.elements_computed += 1;

            let out = match reducer.as_mut() {
                Some(r) => r.push(v),
                None => Some(v),
            };
            if let Some(out) = out {
                if plan.dst.is_register() {
                    scalar = Some(out);
                } else {
                    *latency += write_element(&mut mem, &plan.dst, written, out)?;
                }
                written += 1;
            }
        }
        Ok(scalar.map_or(Output::None, Output::Scalar))
    }
}
