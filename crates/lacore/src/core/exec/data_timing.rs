//! Timing Data Compute Unit.
//!
//! Source elements arrive from the read pipes in descriptor order. Every
//! cycle the unit runs three steps, oldest work first:
//! 1. **Reduce retire:** Batches whose reduction latency elapsed are folded
//!    into the accumulator in element order.
//! 2. **Vector retire:** Batches whose arithmetic latency elapsed move on to
//!    the reduction stage, or out to the write pipe.
//! 3. **Gather:** Up to `lanes` elements whose operands have all arrived enter
//!    the arithmetic stage as one batch.
//!
//! Batches retire strictly in order, so results (and reduction order) never
//! depend on when individual memory responses came back.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::common::{Fault, Value};
use crate::core::arch::{DataOp, InstKind, VectorDescriptor};
use crate::core::exec::arith;
use crate::core::exec::operands::{DataPlan, Operand, Reducer};
use crate::core::exec::{ExecEnv, Output, Step};
use crate::core::mem_unit::{Pipes, WritePipe};
use crate::sim::Cycle;

/// Where one operand's elements come from.
#[derive(Clone, Copy, Debug)]
enum Input {
    Broadcast(Value),
    Pipe(usize),
    /// A stored scalar still on its way; becomes a broadcast on arrival.
    Latch(usize),
}

#[derive(Debug)]
struct Batch {
    ready_at: Cycle,
    values: Vec<Value>,
}

#[derive(Debug)]
struct Job {
    plan: DataPlan,
    inputs: [Option<Input>; 3],
    lanes: usize,
    vec_latency: u64,
    red_latency: u64,
    gathered: u64,
    vector_stage: VecDeque<Batch>,
    reduce_stage: VecDeque<Batch>,
    reducer: Option<Reducer>,
    scalar: Option<Value>,
    fault: Option<Fault>,
}

/// The timing variant of the Data Compute Unit.
#[derive(Debug, Default)]
pub struct TimingDataUnit {
    job: Option<Job>,
}

impl TimingDataUnit {
    /// Validates `op` and starts its operand streams.
    pub fn start(&mut self, op: &DataOp, env: &mut ExecEnv<'_>) -> Step {
        let now = env.now();
        let plan = match DataPlan::build(op, env.regs, env.datapath) {
            Ok(plan) => plan,
            Err(fault) => {
                warn!(%fault, "data op rejected");
                return Step::at(Err(fault), now);
            }
        };

        let streams = plan
            .sources
            .iter()
            .flatten()
            .filter(|s| s.stored().is_some())
            .count();
        if streams > env.pipes.readers.len() {
            return Step::at(
                Err(Fault::config(format!(
                    "operation streams {streams} operands but only {} read pipes exist",
                    env.pipes.readers.len()
                ))),
                now,
            );
        }

        let mut inputs = [None; 3];
        let mut next_pipe = 0;
        for (slot, src) in plan.sources.iter().enumerate() {
            inputs[slot] = match src {
                None => None,
                Some(Operand::Broadcast(v)) => Some(Input::Broadcast(v.convert(plan.precision))),
                Some(Operand::Stream(desc)) => {
                    let pipe = next_pipe;
                    next_pipe += 1;
                    if let Some(reader) = env.pipes.readers.get_mut(pipe) {
                        reader.start_reading(desc, plan.count, InstKind::DataOp);
                    }
                    Some(Input::Pipe(pipe))
                }
                Some(Operand::Fetch(desc)) => {
                    let pipe = next_pipe;
                    next_pipe += 1;
                    if let Some(reader) = env.pipes.readers.get_mut(pipe) {
                        reader.start_reading(desc, 1, InstKind::DataOp);
                    }
                    Some(Input::Latch(pipe))
                }
            };
        }
        if !plan.dst.is_register() {
            env.pipes
                .writer
                .start_writing(&plan.dst, plan.outputs, InstKind::DataOp);
        }

        let lanes = arith::lanes(env.datapath, plan.precision);
        let vec_latency = arith::vector_latency(&plan.op, plan.precision, env.datapath);
        let red_latency = arith::reduce_latency(plan.precision, env.datapath);
        let reducer = plan
            .op
            .reduce
            .map(|r| Reducer::new(r.op, plan.segment_len()));
        debug!(
            count = plan.count,
            lanes, vec_latency, red_latency, "data op start"
        );
        self.job = Some(Job {
            plan,
            inputs,
            lanes,
            vec_latency,
            red_latency,
            gathered: 0,
            vector_stage: VecDeque::new(),
            reduce_stage: VecDeque::new(),
            reducer,
            scalar: None,
            fault: None,
        });
        Step::Running
    }

    /// Advances the datapath by one cycle.
    ///
    /// # Errors
    ///
    /// Fatal faults only.
    pub fn tick(&mut self, env: &mut ExecEnv<'_>) -> Result<Step, Fault> {
        let Some(job) = self.job.as_mut() else {
            return Err(Fault::protocol("data unit ticked without an operation"));
        };
        match job.step(env)? {
            Some(result) => {
                self.job = None;
                Ok(Step::at(result, env.now()))
            }
            None => Ok(Step::Running),
        }
    }

    /// Drops the current operation.
    pub fn abort(&mut self) {
        self.job = None;
    }
}

fn emit(dst: &VectorDescriptor, scalar: &mut Option<Value>, writer: &mut WritePipe, v: Value) {
    if dst.is_register() {
        *scalar = Some(v);
    } else {
        writer.push(v);
    }
}

impl Job {
    fn pipe_fault(&self, pipes: &Pipes) -> Option<Fault> {
        let read = self.inputs.iter().flatten().find_map(|input| match input {
            Input::Pipe(i) | Input::Latch(i) => {
                pipes.readers.get(*i).and_then(|r| r.fault()).cloned()
            }
            Input::Broadcast(_) => None,
        });
        read.or_else(|| {
            if self.plan.dst.is_register() {
                None
            } else {
                pipes.writer.fault().cloned()
            }
        })
    }

    fn operands_ready(&self, pipes: &Pipes) -> bool {
        self.inputs.iter().flatten().all(|input| match input {
            Input::Broadcast(_) => true,
            Input::Pipe(i) => pipes.readers.get(*i).is_some_and(|r| r.ready()),
            Input::Latch(_) => false,
        })
    }

    fn resolve_latches(&mut self, pipes: &mut Pipes) {
        for input in self.inputs.iter_mut().flatten() {
            if let Input::Latch(i) = *input
                && let Some(v) = pipes.readers.get_mut(i).and_then(|r| r.pop())
            {
                *input = Input::Broadcast(v.convert(self.plan.precision));
            }
        }
    }

    /// Runs one cycle; returns the outcome once the operation has finished.
    fn step(&mut self, env: &mut ExecEnv<'_>) -> Result<Option<Result<Output, Fault>>, Fault> {
        let now = env.now();

        if self.fault.is_none()
            && let Some(fault) = self.pipe_fault(env.pipes)
        {
            warn!(%fault, gathered = self.gathered, "data op aborting");
            env.pipes.cancel_all();
            self.fault = Some(fault);
        }
        if let Some(fault) = &self.fault {
            return Ok(env.pipes.is_quiescent().then(|| Err(fault.clone())));
        }

        let dst = self.plan.dst;
        while self.reduce_stage.front().is_some_and(|b| b.ready_at <= now) {
            let Some(batch) = self.reduce_stage.pop_front() else {
                break;
            };
            if let Some(reducer) = self.reducer.as_mut() {
                for v in batch.values {
                    if let Some(out) = reducer.push(v) {
                        emit(&dst, &mut self.scalar, &mut env.pipes.writer, out);
                    }
                }
            }
        }

        while self.vector_stage.front().is_some_and(|b| b.ready_at <= now) {
            let Some(batch) = self.vector_stage.pop_front() else {
                break;
            };
            if self.reducer.is_some() {
                self.reduce_stage.push_back(Batch {
                    ready_at: now + self.red_latency,
                    values: batch.values,
                });
            } else {
                for v in batch.values {
                    emit(&dst, &mut self.scalar, &mut env.pipes.writer, v);
                }
            }
        }

        self.resolve_latches(env.pipes);
        let mut values = Vec::with_capacity(self.lanes);
        while values.len() < self.lanes
            && self.gathered < self.plan.count
            && self.operands_ready(env.pipes)
        {
            let mut vals: [Option<Value>; 3] = [None; 3];
            for (slot, input) in self.inputs.iter().enumerate() {
                vals[slot] = match input {
                    None => None,
                    Some(Input::Broadcast(v)) => Some(*v),
                    Some(Input::Latch(_)) => None,
                    Some(Input::Pipe(i)) => env
                        .pipes
                        .readers
                        .get_mut(*i)
                        .and_then(|r| r.pop())
                        .map(|v| v.convert(self.plan.precision)),
                };
            }
            let Some(a) = vals[0] else {
                return Err(Fault::protocol("data op without a first operand"));
            };
            values.push(arith::eval(&self.plan.op, a, vals[1], vals[2]));
            self.gathered += 1;
        }
        if !values.is_empty() {
            env.ports.stats.elements_computed += values.len() as u64;
            self.vector_stage.push_back(Batch {
                ready_at: now + self.vec_latency,
                values,
            });
        }

        let drained = self.gathered == self.plan.count
            && self.vector_stage.is_empty()
            && self.reduce_stage.is_empty();
        if !drained {
            return Ok(None);
        }
        if dst.is_register() {
            let Some(v) = self.scalar else {
                return Err(Fault::protocol("reduction finished without a result"));
            };
            let stored = env.regs.set(self.plan.op.dst, VectorDescriptor::scalar(v));
            debug!(value = ?v, "data op done");
            return Ok(Some(stored.map(|()| Output::Scalar(v))));
        }
        if env.pipes.writer.is_done() {
            debug!(count = self.plan.count, "data op done");
            return Ok(Some(Ok(Output::None)));
        }
        Ok(None)
    }
}
