//! Deterministic discrete-event queue.
//!
//! Events are ordered by the cycle they are due and, within a cycle, by the
//! order they were scheduled. Two runs that schedule the same events in the
//! same order therefore observe them in the same order.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::core::mem_unit::MemEvent;

/// Simulated time in core clock cycles.
pub type Cycle = u64;

#[derive(Debug)]
struct Scheduled<E> {
    at: Cycle,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Scheduled<E> {
    // Reversed so the max-heap pops the earliest (cycle, seq) first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap of events keyed by `(cycle, schedule order)`.
#[derive(Debug)]
pub struct EventQueue<E> {
    heap: BinaryHeap<Scheduled<E>>,
    next_seq: u64,
}

impl<E> Default for EventQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> EventQueue<E> {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedules `event` to fire at cycle `at`.
    pub fn schedule(&mut self, at: Cycle, event: E) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Scheduled { at, seq, event });
    }

    /// Pops the earliest event due at or before `now`.
    pub fn pop_due(&mut self, now: Cycle) -> Option<E> {
        if self.heap.peek()?.at > now {
            return None;
        }
        self.heap.pop().map(|s| s.event)
    }

    /// Cycle of the earliest pending event.
    pub fn next_time(&self) -> Option<Cycle> {
        self.heap.peek().map(|s| s.at)
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Returns `true` if no event is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// The clock and event queue of one hardware thread's coprocessor.
///
/// Owned by `LaCore` and lent to components for the duration of a call;
/// nothing in the crate reaches it through global state.
#[derive(Debug, Default)]
pub struct SimContext {
    now: Cycle,
    /// Pending memory responses.
    pub events: EventQueue<MemEvent>,
}

impl SimContext {
    /// Creates a context at cycle 0 with no pending events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current cycle.
    pub const fn now(&self) -> Cycle {
        self.now
    }

    /// Advances the clock by one cycle and returns the new time.
    pub const fn advance(&mut self) -> Cycle {
        self.now += 1;
        self.now
    }

    /// Schedules `event` at an absolute cycle.
    ///
    /// Events in the past are delivered on the next tick.
    pub fn schedule_at(&mut self, at: Cycle, event: MemEvent) {
        self.events.schedule(at.max(self.now + 1), event);
    }
}
