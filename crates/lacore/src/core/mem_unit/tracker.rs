//! Request Tracker.
//!
//! Central bookkeeping for memory requests in flight. Each channel hands out
//! its own request ids and holds at most `capacity` outstanding entries. An
//! entry owns its [`Continuation`]; completing the request removes the entry
//! and hands the continuation back to the caller exactly once.
//!
//! Ids are a per-channel sequence number that only grows, so an id is never
//! reused while its request is alive.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::trace;

use crate::common::{Direction, Fault, Location};
use crate::core::arch::InstKind;
use crate::sim::Cycle;

/// Identifier of one memory request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ReqId {
    /// Channel the request was issued on.
    pub channel: usize,
    /// Per-channel sequence number.
    pub seq: u64,
}

impl fmt::Display for ReqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}#{}", self.channel, self.seq)
    }
}

/// What to do with a request's response.
///
/// Continuations are plain data: the core routes them to the pipe they name
/// when the tracker releases them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Continuation {
    /// Deliver `count` elements starting at element `first` to read pipe `pipe`.
    ReadElements {
        /// Read pipe index.
        pipe: usize,
        /// First element index carried by the request.
        first: u64,
        /// Elements carried by the request.
        count: u32,
    },
    /// Acknowledge `count` elements starting at element `first` to the write pipe.
    WriteElements {
        /// First element index carried by the request.
        first: u64,
        /// Elements carried by the request.
        count: u32,
    },
}

/// Everything the tracker needs to register a request.
#[derive(Clone, Copy, Debug)]
pub struct RequestSpec {
    /// Read or write.
    pub direction: Direction,
    /// Scratchpad or memory.
    pub location: Location,
    /// Scratchpad offset or virtual address.
    pub addr: u64,
    /// Length in bytes.
    pub len: u64,
    /// Unit the request works for.
    pub owner: InstKind,
    /// Where the response goes.
    pub continuation: Continuation,
}

/// One request in flight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutstandingRequest {
    /// Request id.
    pub id: ReqId,
    /// Read or write.
    pub direction: Direction,
    /// Scratchpad or memory.
    pub location: Location,
    /// Scratchpad offset or virtual address.
    pub addr: u64,
    /// Length in bytes.
    pub len: u64,
    /// Bytes transferred so far.
    pub bytes_completed: u64,
    /// Cycle the request was issued.
    pub issued_at: Cycle,
    /// Unit the request works for.
    pub owner: InstKind,
    /// Where the response goes.
    pub continuation: Continuation,
}

/// A request released by [`RequestTracker::complete`].
#[derive(Debug)]
pub struct Completed {
    /// The retired entry, with `bytes_completed` updated.
    pub request: OutstandingRequest,
    /// Data read (empty for writes) or the fault the access ended with.
    pub result: Result<Vec<u8>, Fault>,
}

#[derive(Debug)]
struct Channel {
    capacity: usize,
    next_seq: u64,
    outstanding: BTreeMap<u64, OutstandingRequest>,
    discarded: BTreeSet<u64>,
}

/// Tracks outstanding requests for every channel of one hardware thread.
#[derive(Debug)]
pub struct RequestTracker {
    channels: Vec<Channel>,
}

impl RequestTracker {
    /// Creates a tracker with `channels` channels of `capacity` entries each.
    pub fn new(channels: usize, capacity: usize) -> Self {
        Self {
            channels: (0..channels)
                .map(|_| Channel {
                    capacity,
                    next_seq: 0,
                    outstanding: BTreeMap::new(),
                    discarded: BTreeSet::new(),
                })
                .collect(),
        }
    }

    fn channel(&self, channel: usize) -> Result<&Channel, Fault> {
        self.channels
            .get(channel)
            .ok_or_else(|| Fault::protocol(format!("channel {channel} does not exist")))
    }

    /// Free slots on `channel`; zero for an unknown channel.
    pub fn available(&self, channel: usize) -> usize {
        self.channels
            .get(channel)
            .map_or(0, |c| c.capacity.saturating_sub(c.outstanding.len()))
    }

    /// Requests outstanding on `channel`.
    pub fn outstanding_on(&self, channel: usize) -> usize {
        self.channels.get(channel).map_or(0, |c| c.outstanding.len())
    }

    /// Requests outstanding on all channels.
    pub fn len(&self) -> usize {
        self.channels.iter().map(|c| c.outstanding.len()).sum()
    }

    /// Returns `true` when no request is outstanding anywhere.
    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(|c| c.outstanding.is_empty())
    }

    /// Registers a new request and returns its id. Never blocks.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Protocol`] if the channel does not exist or is
    /// already at its concurrency bound; pipes check
    /// [`RequestTracker::available`] first.
    pub fn issue(
        &mut self,
        channel: usize,
        spec: RequestSpec,
        now: Cycle,
    ) -> Result<ReqId, Fault> {
        let ch = self
            .channels
            .get_mut(channel)
            .ok_or_else(|| Fault::protocol(format!("channel {channel} does not exist")))?;
        if ch.outstanding.len() >= ch.capacity {
            return Err(Fault::protocol(format!(
                "channel {channel} exceeded its bound of {} outstanding requests",
                ch.capacity
            )));
        }
        let id = ReqId {
            channel,
            seq: ch.next_seq,
        };
        ch.next_seq += 1;
        let _ = ch.outstanding.insert(
            id.seq,
            OutstandingRequest {
                id,
                direction: spec.direction,
                location: spec.location,
                addr: spec.addr,
                len: spec.len,
                bytes_completed: 0,
                issued_at: now,
                owner: spec.owner,
                continuation: spec.continuation,
            },
        );
        trace!(%id, addr = spec.addr, len = spec.len, dir = ?spec.direction, "issue");
        Ok(id)
    }

    /// Retires a request and releases its continuation.
    ///
    /// # Returns
    ///
    /// `Some` with the retired entry, or `None` if the id was discarded by a
    /// drain (its late response is dropped).
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Protocol`] if the id is unknown or already completed.
    pub fn complete(
        &mut self,
        id: ReqId,
        result: Result<Vec<u8>, Fault>,
    ) -> Result<Option<Completed>, Fault> {
        let ch = self.channels.get_mut(id.channel).ok_or_else(|| {
            Fault::protocol(format!("completion for {id} on a missing channel"))
        })?;
        if ch.discarded.remove(&id.seq) {
            trace!(%id, "dropping response to discarded request");
            return Ok(None);
        }
        let mut request = ch.outstanding.remove(&id.seq).ok_or_else(|| {
            Fault::protocol(format!("completion for unknown or already completed request {id}"))
        })?;
        if result.is_ok() {
            request.bytes_completed = request.len;
        }
        trace!(%id, "complete");
        Ok(Some(Completed { request, result }))
    }

    /// Drops every outstanding request without releasing its continuation.
    ///
    /// Responses that arrive later for these ids are ignored.
    ///
    /// # Returns
    ///
    /// The number of requests discarded.
    pub fn discard_all(&mut self) -> usize {
        let mut dropped = 0;
        for ch in &mut self.channels {
            let seqs: Vec<u64> = ch.outstanding.keys().copied().collect();
            dropped += seqs.len();
            ch.discarded.extend(seqs);
            ch.outstanding.clear();
        }
        dropped
    }

    /// Copies every outstanding request, ordered by channel then id.
    pub fn snapshot(&self) -> Vec<OutstandingRequest> {
        self.channels
            .iter()
            .flat_map(|c| c.outstanding.values().cloned())
            .collect()
    }

    /// Capacity of `channel`.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Protocol`] if the channel does not exist.
    pub fn capacity(&self, channel: usize) -> Result<usize, Fault> {
        self.channel(channel).map(|c| c.capacity)
    }
}
