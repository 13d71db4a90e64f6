//! Borrowed access to the memory path.
//!
//! Units and pipes never own the scratchpad or the Cache+TLB collaborator.
//! For the duration of one call they borrow them through one of two bundles:
//! 1. **`MemPorts`:** Timing protocol. Accesses register with the Request
//!    Tracker and their responses are scheduled on the event queue.
//! 2. **`AtomicMem`:** Atomic protocol. Accesses return data and latency at once.

use tracing::trace;

use crate::common::{Direction, Fault, Location, VirtAddr};
use crate::core::mem_unit::MemEvent;
use crate::core::mem_unit::tracker::{ReqId, RequestSpec, RequestTracker};
use crate::core::units::scratchpad::{Scratchpad, SpadOp};
use crate::sim::{Cycle, SimContext};
use crate::soc::traits::{AccessMode, CacheResponse, CacheTlb};
use crate::stats::LaStats;

/// Result of trying to issue one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Issue {
    /// Accepted and tracked; the response is scheduled.
    Sent(ReqId),
    /// The collaborator refused this cycle; nothing happened.
    Retry,
}

/// Timing-mode view of the memory path for one cycle.
#[derive(Debug)]
pub struct MemPorts<'a> {
    /// Simulation clock and event queue.
    pub ctx: &'a mut SimContext,
    /// Banked scratchpad.
    pub scratchpad: &'a mut Scratchpad,
    /// Cache+TLB collaborator.
    pub cache: &'a mut dyn CacheTlb,
    /// Outstanding request bookkeeping.
    pub tracker: &'a mut RequestTracker,
    /// Event counters.
    pub stats: &'a mut LaStats,
}

impl MemPorts<'_> {
    /// Current cycle.
    pub const fn now(&self) -> Cycle {
        self.ctx.now()
    }

    /// Reborrows the same path for atomic accesses.
    pub fn atomic(&mut self) -> AtomicMem<'_> {
        AtomicMem {
            scratchpad: &mut *self.scratchpad,
            cache: &mut *self.cache,
            stats: &mut *self.stats,
        }
    }

    /// Line size used to coalesce requests to `location`.
    pub fn line_bytes(&self, location: Location) -> u64 {
        match location {
            Location::Scratchpad => self.scratchpad.line_bytes(),
            Location::Memory => self.cache.line_bytes(),
            Location::Register => 0,
        }
    }

    /// Performs one access and tracks it on `channel`.
    ///
    /// The functional effect happens now; the response carrying read data
    /// is scheduled for the cycle the access completes.
    ///
    /// # Arguments
    ///
    /// * `channel` - Channel of the issuing pipe.
    /// * `spec` - What to access and where the response goes.
    /// * `data` - Bytes to store for writes; ignored for reads.
    ///
    /// # Errors
    ///
    /// Translation and access faults of the access itself, or
    /// [`Fault::Protocol`] if the channel has no free slot.
    pub fn issue(
        &mut self,
        channel: usize,
        spec: RequestSpec,
        data: &[u8],
    ) -> Result<Issue, Fault> {
        if self.tracker.available(channel) == 0 {
            return Err(Fault::protocol(format!(
                "issue on full channel {channel} at {:#x}",
                spec.addr
            )));
        }
        let now = self.now();
        let (done_at, bytes) = match spec.location {
            Location::Scratchpad => {
                let op = match spec.direction {
                    Direction::Read => SpadOp::Read(spec.len),
                    Direction::Write => SpadOp::Write(data),
                };
                let done = self.scratchpad.access_timing(now, spec.addr, op)?;
                self.stats.bank_stall_cycles += done.stall;
                match spec.direction {
                    Direction::Read => self.stats.spad_reads += 1,
                    Direction::Write => self.stats.spad_writes += 1,
                }
                (done.done_at, done.data)
            }
            Location::Memory => {
                let mode = AccessMode::Timing(now);
                let tr = self.cache.translate(
                    VirtAddr::new(spec.addr),
                    spec.len,
                    spec.direction,
                    mode,
                )?;
                let resp = match spec.direction {
                    Direction::Read => self.cache.read(tr.paddr, spec.len, mode)?,
                    Direction::Write => self.cache.write(tr.paddr, data, mode)?,
                };
                match resp {
                    CacheResponse::Retry => {
                        self.stats.retries += 1;
                        trace!(channel, addr = spec.addr, "retry");
                        return Ok(Issue::Retry);
                    }
                    CacheResponse::Done { latency, data } => {
                        match spec.direction {
                            Direction::Read => self.stats.mem_reads += 1,
                            Direction::Write => self.stats.mem_writes += 1,
                        }
                        (now + tr.cycles + latency.max(1), data)
                    }
                }
            }
            Location::Register => {
                return Err(Fault::protocol("register operands have no memory requests"));
            }
        };
        match spec.direction {
            Direction::Read => self.stats.bytes_read += spec.len,
            Direction::Write => self.stats.bytes_written += spec.len,
        }

        let id = self.tracker.issue(channel, spec, now)?;
        self.ctx.schedule_at(
            done_at,
            MemEvent::Response {
                id,
                result: Ok(bytes),
            },
        );
        Ok(Issue::Sent(id))
    }
}

/// Atomic-mode view of the memory path.
#[derive(Debug)]
pub struct AtomicMem<'a> {
    /// Banked scratchpad.
    pub scratchpad: &'a mut Scratchpad,
    /// Cache+TLB collaborator.
    pub cache: &'a mut dyn CacheTlb,
    /// Event counters.
    pub stats: &'a mut LaStats,
}

impl AtomicMem<'_> {
    /// Reads `len` bytes and returns them with the access latency.
    ///
    /// # Errors
    ///
    /// Translation or access faults; [`Fault::Protocol`] for a register
    /// location or a collaborator that refuses an atomic access.
    pub fn read(&mut self, location: Location, addr: u64, len: u64) -> Result<(Vec<u8>, u64), Fault> {
        self.stats.bytes_read += len;
        match location {
            Location::Scratchpad => {
                let mut buf = vec![0u8; len as usize];
                let latency = self.scratchpad.read_atomic(addr, &mut buf)?;
                self.stats.spad_reads += 1;
                Ok((buf, latency))
            }
            Location::Memory => {
                let tr = self.cache.translate(
                    VirtAddr::new(addr),
                    len,
                    Direction::Read,
                    AccessMode::Atomic,
                )?;
                match self.cache.read(tr.paddr, len, AccessMode::Atomic)? {
                    CacheResponse::Done { latency, data } => {
                        self.stats.mem_reads += 1;
                        Ok((data, tr.cycles + latency))
                    }
                    CacheResponse::Retry => Err(refused(addr)),
                }
            }
            Location::Register => Err(Fault::protocol("register operands have no memory requests")),
        }
    }

    /// Writes `data` and returns the access latency.
    ///
    /// # Errors
    ///
    /// As [`AtomicMem::read`].
    pub fn write(&mut self, location: Location, addr: u64, data: &[u8]) -> Result<u64, Fault> {
        self.stats.bytes_written += data.len() as u64;
        match location {
            Location::Scratchpad => {
                let latency = self.scratchpad.write_atomic(addr, data)?;
                self.stats.spad_writes += 1;
                Ok(latency)
            }
            Location::Memory => {
                let tr = self.cache.translate(
                    VirtAddr::new(addr),
                    data.len() as u64,
                    Direction::Write,
                    AccessMode::Atomic,
                )?;
                match self.cache.write(tr.paddr, data, AccessMode::Atomic)? {
                    CacheResponse::Done { latency, .. } => {
                        self.stats.mem_writes += 1;
                        Ok(tr.cycles + latency)
                    }
                    CacheResponse::Retry => Err(refused(addr)),
                }
            }
            Location::Register => Err(Fault::protocol("register operands have no memory requests")),
        }
    }
}

fn refused(addr: u64) -> Fault {
    Fault::protocol(format!("atomic access at {addr:#x} was refused"))
}
