//! Instruction Dispatcher.
//!
//! One coprocessor instruction is in flight per hardware thread. The
//! dispatcher walks it through four states:
//!
//! ```text
//! Idle --submit--> Dispatched(kind) --unit start--> Executing(kind)
//!      <--poll--   Completing(kind) <--unit done--
//! ```
//!
//! A fault during `Executing` reaches `Completing` like a success, with the
//! fault as the outcome. The host sees each outcome exactly once through
//! [`Dispatcher::poll_completion`], which also returns the dispatcher to `Idle`.

use serde::Serialize;
use tracing::debug;

use crate::common::Fault;
use crate::core::arch::{InstKind, Instruction, StatusReg};
use crate::core::exec::Output;
use crate::sim::Cycle;

/// Dispatcher state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum DispatchState {
    /// Ready for the next instruction.
    #[default]
    Idle,
    /// Accepted; the unit starts it on the next tick.
    Dispatched(InstKind),
    /// The unit is working on it.
    Executing(InstKind),
    /// Finished; the outcome waits for the host.
    Completing(InstKind),
}

/// Answer to [`Dispatcher::submit`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitResult {
    /// The instruction was taken.
    Accepted,
    /// Busy or draining; submit again later.
    Stall,
}

/// Answer to [`Dispatcher::poll_completion`].
#[derive(Clone, Debug, PartialEq)]
pub enum Poll {
    /// Nothing finished yet.
    Pending,
    /// The in-flight instruction finished.
    Done(Outcome),
}

/// The reported result of one instruction.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Outcome {
    /// Instruction class.
    pub kind: InstKind,
    /// Success value or fault.
    pub result: Result<Output, Fault>,
    /// Cycle the instruction was accepted.
    pub issued_at: Cycle,
    /// Cycle it reached `Completing`.
    pub completed_at: Cycle,
}

/// Routes instructions to units and tracks the one in flight.
#[derive(Debug)]
pub struct Dispatcher {
    state: DispatchState,
    current: Option<Instruction>,
    issued_at: Cycle,
    finished: Option<(Result<Output, Fault>, Cycle)>,
    outcome: Option<Outcome>,
    accepting: bool,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Creates an idle dispatcher that accepts instructions.
    pub const fn new() -> Self {
        Self {
            state: DispatchState::Idle,
            current: None,
            issued_at: 0,
            finished: None,
            outcome: None,
            accepting: true,
        }
    }

    /// Current state.
    pub const fn state(&self) -> DispatchState {
        self.state
    }

    /// The instruction in flight, if any.
    pub const fn current(&self) -> Option<&Instruction> {
        self.current.as_ref()
    }

    /// Returns `false` while drained.
    pub const fn is_accepting(&self) -> bool {
        self.accepting
    }

    /// Returns `true` in `Dispatched` or `Executing`.
    pub const fn is_busy(&self) -> bool {
        matches!(
            self.state,
            DispatchState::Dispatched(_) | DispatchState::Executing(_)
        )
    }

    /// Offers an instruction at cycle `now`.
    pub fn submit(&mut self, insn: Instruction, now: Cycle) -> SubmitResult {
        if !self.accepting || self.state != DispatchState::Idle {
            return SubmitResult::Stall;
        }
        let kind = insn.kind();
        debug!(%kind, now, "dispatched");
        self.state = DispatchState::Dispatched(kind);
        self.current = Some(insn);
        self.issued_at = now;
        self.finished = None;
        SubmitResult::Accepted
    }

    /// Moves a dispatched instruction to `Executing` and returns it for the unit.
    pub(crate) fn begin(&mut self) -> Option<Instruction> {
        let DispatchState::Dispatched(kind) = self.state else {
            return None;
        };
        debug!(%kind, "executing");
        self.state = DispatchState::Executing(kind);
        self.current.clone()
    }

    /// Returns `true` while the unit has not reported a result.
    pub(crate) const fn awaiting_unit(&self) -> bool {
        matches!(self.state, DispatchState::Executing(_)) && self.finished.is_none()
    }

    /// Returns `true` once the unit has reported a result not yet retired.
    pub(crate) const fn has_result(&self) -> bool {
        self.finished.is_some()
    }

    /// Records the unit's result, reportable from cycle `ready_at`.
    pub(crate) fn finish(&mut self, result: Result<Output, Fault>, ready_at: Cycle) {
        if matches!(self.state, DispatchState::Executing(_)) && self.finished.is_none() {
            self.finished = Some((result, ready_at));
        }
    }

    /// Moves a finished instruction to `Completing` once its result is due.
    ///
    /// # Returns
    ///
    /// The kind and result of the retired instruction.
    pub(crate) fn retire(
        &mut self,
        now: Cycle,
        status: &mut StatusReg,
    ) -> Option<(InstKind, &Result<Output, Fault>)> {
        let DispatchState::Executing(kind) = self.state else {
            return None;
        };
        if self.finished.as_ref().is_none_or(|(_, at)| *at > now) {
            return None;
        }
        let (result, _) = self.finished.take()?;
        status.record(&result);
        debug!(%kind, now, ok = result.is_ok(), "completing");
        self.state = DispatchState::Completing(kind);
        let outcome = self.outcome.insert(Outcome {
            kind,
            result,
            issued_at: self.issued_at,
            completed_at: now,
        });
        Some((kind, &outcome.result))
    }

    /// Forces the in-flight instruction to complete with `fault` at `now`.
    ///
    /// # Returns
    ///
    /// The kind of the aborted instruction, or `None` if nothing was in flight.
    pub(crate) fn abort(&mut self, fault: Fault, now: Cycle, status: &mut StatusReg) -> Option<InstKind> {
        let kind = match self.state {
            DispatchState::Dispatched(kind) | DispatchState::Executing(kind) => kind,
            DispatchState::Idle | DispatchState::Completing(_) => return None,
        };
        debug!(%kind, %fault, "aborting in-flight instruction");
        self.state = DispatchState::Executing(kind);
        self.finished = Some((Err(fault), now));
        self.retire(now, status).map(|(kind, _)| kind)
    }

    /// Hands the finished outcome to the host and returns to `Idle`.
    pub fn poll_completion(&mut self) -> Poll {
        if !matches!(self.state, DispatchState::Completing(_)) {
            return Poll::Pending;
        }
        self.state = DispatchState::Idle;
        self.current = None;
        self.outcome.take().map_or(Poll::Pending, Poll::Done)
    }

    /// Stops accepting instructions.
    pub const fn drain(&mut self) {
        self.accepting = false;
    }

    /// Accepts instructions again.
    pub const fn resume(&mut self) {
        self.accepting = true;
    }
}
