//! Write Pipe.
//!
//! The unit pushes result elements in descriptor order; the pipe encodes
//! them and issues write requests as channel slots free up. The stream is
//! done when every element has been acknowledged.

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::common::{Direction, Fault, Value};
use crate::core::arch::{InstKind, VectorDescriptor};
use crate::core::mem_unit::plan::group_at;
use crate::core::mem_unit::ports::{Issue, MemPorts};
use crate::core::mem_unit::tracker::{Continuation, RequestSpec};

#[derive(Debug)]
struct WriteStream {
    desc: VectorDescriptor,
    owner: InstKind,
    total: u64,
    staged: VecDeque<Value>,
    next_issue: u64,
    acked: u64,
    inflight: usize,
    fault: Option<Fault>,
    cancelled: bool,
}

/// The write pipe bound to one channel.
#[derive(Debug)]
pub struct WritePipe {
    channel: usize,
    coalesce: bool,
    stream: Option<WriteStream>,
}

impl WritePipe {
    /// Creates an idle pipe.
    pub const fn new(channel: usize, coalesce: bool) -> Self {
        Self {
            channel,
            coalesce,
            stream: None,
        }
    }

    /// Channel this pipe issues on.
    pub const fn channel(&self) -> usize {
        self.channel
    }

    /// Starts a stream of `count` elements into `desc` for `owner`.
    pub fn start_writing(&mut self, desc: &VectorDescriptor, count: u64, owner: InstKind) {
        debug!(base = desc.base, count, "write stream start");
        self.stream = Some(WriteStream {
            desc: *desc,
            owner,
            total: count,
            staged: VecDeque::new(),
            next_issue: 0,
            acked: 0,
            inflight: 0,
            fault: None,
            cancelled: false,
        });
    }

    /// Queues the next element. Values must already be in the destination
    /// datatype; extra elements beyond the stream length are dropped.
    pub fn push(&mut self, value: Value) {
        if let Some(s) = self.stream.as_mut() {
            let queued = s.next_issue + s.staged.len() as u64;
            if !s.cancelled && s.fault.is_none() && queued < s.total {
                s.staged.push_back(value);
            }
        }
    }

    /// Issues staged elements while the channel has room.
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

        while !s.staged.is_empty() && ports.tracker.available(self.channel) > 0 {
            let group = match group_at(&s.desc, s.next_issue, s.staged.len() as u64, line) {
                Ok(g) => g,
                Err(fault) => {
                    warn!(index = s.next_issue, %fault, "write stream fault");
                    s.staged.clear();
                    s.fault = Some(fault);
                    break;
                }
            };
            let mut data = Vec::with_capacity(group.len as usize);
            for v in s.staged.iter().take(group.count as usize) {
                v.encode_into(&mut data);
            }
            let spec = RequestSpec {
                direction: Direction::Write,
                location: s.desc.location,
                addr: group.addr,
                len: group.len,
                owner: s.owner,
                continuation: Continuation::WriteElements {
                    first: group.first,
                    count: group.count,
                },
            };
            match ports.issue(self.channel, spec, &data) {
                Ok(Issue::Sent(_)) => {
                    let _ = s.staged.drain(..group.count as usize);
                    s.inflight += 1;
                    s.next_issue += u64::from(group.count);
                }
                Ok(Issue::Retry) => break,
                Err(fault) if fault.is_fatal() => return Err(fault),
                Err(fault) => {
                    warn!(index = s.next_issue, %fault, "write stream fault");
                    s.staged.clear();
                    s.fault = Some(fault);
                    break;
                }
            }
        }
        Ok(())
    }

    /// Accepts the acknowledgement of a write request of this pipe.
    pub fn on_ack(&mut self, count: u32, result: Result<Vec<u8>, Fault>) {
        let Some(s) = self.stream.as_mut() else {
            return;
        };
        s.inflight = s.inflight.saturating_sub(1);
        match result {
            Ok(_) => s.acked += u64::from(count),
            Err(fault) => {
                if s.fault.is_none() && !s.cancelled {
                    s.fault = Some(fault);
                }
            }
        }
    }

    /// Elements acknowledged so far.
    pub fn acked(&self) -> u64 {
        self.stream.as_ref().map_or(0, |s| s.acked)
    }

    /// The stream's fault, once no request is in flight.
    pub fn fault(&self) -> Option<&Fault> {
        self.stream
            .as_ref()
            .filter(|s| s.inflight == 0)
            .and_then(|s| s.fault.as_ref())
    }

    /// Returns `true` once every element was acknowledged (or the pipe is idle).
    pub fn is_done(&self) -> bool {
        self.stream.as_ref().is_none_or(|s| s.acked >= s.total)
    }

    /// Requests of the current stream still in flight.
    pub fn inflight(&self) -> usize {
        self.stream.as_ref().map_or(0, |s| s.inflight)
    }

    /// Stops issuing and drops staged elements.
    pub fn cancel(&mut self) {
        if let Some(s) = self.stream.as_mut() {
            s.cancelled = true;
            s.staged.clear();
        }
    }

    /// Forgets the stream entirely, including in-flight accounting.
    pub fn abandon(&mut self) {
        self.stream = None;
    }
}
