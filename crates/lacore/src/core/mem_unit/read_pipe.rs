//! Read Pipe.
//!
//! Streams the elements of one source operand into a unit. Requests go out
//! in element order, at most `channel capacity` at a time; responses may come
//! back in any order and are buffered until every earlier element has been
//! handed over. The consumer pulls elements with [`ReadPipe::pop`], so
//! delivery order is always descriptor order.
//!
//! A fault on element `i` stops issuing. Elements before `i` are still
//! delivered; the fault becomes visible once they have been consumed and no
//! request of the stream is in flight.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::common::{Direction, Fault, Value};
use crate::core::arch::{InstKind, VectorDescriptor};
use crate::core::mem_unit::plan::group_at;
use crate::core::mem_unit::ports::{Issue, MemPorts};
use crate::core::mem_unit::tracker::{Continuation, RequestSpec};

#[derive(Debug)]
struct ReadStream {
    desc: VectorDescriptor,
    owner: InstKind,
    total: u64,
    next_issue: u64,
    next_deliver: u64,
    arrived: BTreeMap<u64, Value>,
    inflight: usize,
    fault: Option<(u64, Fault)>,
    cancelled: bool,
}

/// One read pipe bound to one channel.
#[derive(Debug)]
pub struct ReadPipe {
    index: usize,
    channel: usize,
    coalesce: bool,
    stream: Option<ReadStream>,
}

impl ReadPipe {
    /// Creates an idle pipe.
    pub const fn new(index: usize, channel: usize, coalesce: bool) -> Self {
        Self {
            index,
            channel,
            coalesce,
            stream: None,
        }
    }

    /// Channel this pipe issues on.
    pub const fn channel(&self) -> usize {
        self.channel
    }

    /// Starts streaming `count` elements of `desc` for `owner`.
    ///
    /// The descriptor is copied, so later register updates do not affect the
    /// stream. Register-located operands never reach a pipe.
    pub fn start_reading(&mut self, desc: &VectorDescriptor, count: u64, owner: InstKind) {
        debug!(pipe = self.index, base = desc.base, count, "read stream start");
        self.stream = Some(ReadStream {
            desc: *desc,
            owner,
            total: count,
            next_issue: 0,
            next_deliver: 0,
            arrived: BTreeMap::new(),
            inflight: 0,
            fault: None,
            cancelled: false,
        });
    }

    /// Issues as many element requests as the channel allows.
    ///
    /// # Errors
    ///
    /// Only fatal faults are returned; element faults are kept in the stream.
    pub fn tick(&mut self, ports: &mut MemPorts<'_>) -> Result<(), Fault> {
        let Some(s) = self.stream.as_mut() else {
            return Ok(());
        };
        if s.cancelled || s.fault.is_some() {
            return Ok(());
        }
        let line = self
            .coalesce
            .then(|| ports.line_bytes(s.desc.location));

        while s.next_issue < s.total && ports.tracker.available(self.channel) > 0 {
            let group = match group_at(&s.desc, s.next_issue, s.total - s.next_issue, line) {
                Ok(g) => g,
                Err(fault) => {
                    warn!(pipe = self.index, index = s.next_issue, %fault, "read stream fault");
                    s.fault = Some((s.next_issue, fault));
                    break;
                }
            };
            let spec = RequestSpec {
                direction: Direction::Read,
                location: s.desc.location,
                addr: group.addr,
                len: group.len,
                owner: s.owner,
                continuation: Continuation::ReadElements {
                    pipe: self.index,
                    first: group.first,
                    count: group.count,
                },
            };
            match ports.issue(self.channel, spec, &[]) {
                Ok(Issue::Sent(_)) => {
                    s.inflight += 1;
                    s.next_issue += u64::from(group.count);
                }
                Ok(Issue::Retry) => break,
                Err(fault) if fault.is_fatal() => return Err(fault),
                Err(fault) => {
                    warn!(pipe = self.index, index = s.next_issue, %fault, "read stream fault");
                    s.fault = Some((s.next_issue, fault));
                    break;
                }
            }
        }
        Ok(())
    }

    /// Accepts the response to a request of this pipe.
    pub fn on_response(&mut self, first: u64, count: u32, result: Result<Vec<u8>, Fault>) {
        let Some(s) = self.stream.as_mut() else {
            return;
        };
        s.inflight = s.inflight.saturating_sub(1);
        if s.cancelled {
            return;
        }
        let bytes = match result {
            Ok(bytes) => bytes,
            Err(fault) => {
                if s.fault.as_ref().is_none_or(|(at, _)| first < *at) {
                    s.fault = Some((first, fault));
                }
                return;
            }
        };
        let width = s.desc.width as usize;
        for (k, chunk) in bytes.chunks_exact(width).take(count as usize).enumerate() {
            if let Some(v) = Value::decode(s.desc.datatype, chunk) {
                let _ = s.arrived.insert(first + k as u64, v);
            }
        }
    }

    /// Returns `true` if the next element in order can be popped.
    pub fn ready(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| {
            !s.cancelled
                && s.next_deliver < s.total
                && s.arrived.contains_key(&s.next_deliver)
        })
    }

    /// Takes the next element in descriptor order, if it has arrived.
    pub fn pop(&mut self) -> Option<Value> {
        if !self.ready() {
            return None;
        }
        let s = self.stream.as_mut()?;
        let v = s.arrived.remove(&s.next_deliver)?;
        s.next_deliver += 1;
        Some(v)
    }

    /// Elements delivered so far.
    pub fn delivered(&self) -> u64 {
        self.stream.as_ref().map_or(0, |s| s.next_deliver)
    }

    /// The stream's fault, once every earlier element was delivered and no
    /// request is in flight.
    pub fn fault(&self) -> Option<&Fault> {
        let s = self.stream.as_ref()?;
        match &s.fault {
            Some((at, fault)) if *at == s.next_deliver && s.inflight == 0 => Some(fault),
            _ => None,
        }
    }

    /// Returns `true` once every element was delivered (or the pipe is idle).
    pub fn is_done(&self) -> bool {
        self.stream
            .as_ref()
            .is_none_or(|s| s.next_deliver >= s.total)
    }

    /// Requests of the current stream still in flight.
    pub fn inflight(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.inflight)
    }

    /// Stops issuing and drops buffered elements. In-flight responses are
    /// still accepted and ignored.
    pub fn cancel(&mut self) {
        if let Some(s) = self.stream.as_mut() {
            s.cancelled = true;
            s.arrived.clear();
        }
    }

    /// Forgets the stream entirely, including in-flight accounting.
    ///
    /// Only valid once the tracker no longer holds this pipe's requests.
    pub fn abandon(&mut self) {
        self.stream = None;
    }
}
