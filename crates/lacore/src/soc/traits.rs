//! The Cache+TLB collaborator contract.
//!
//! The coprocessor does not own its L1 or TLB; it reaches main memory through
//! an implementor of [`CacheTlb`]. Two protocols mirror the scratchpad's:
//! 1. **Atomic:** The call returns the data and the latency the access would take.
//! 2. **Timing:** The call may refuse with [`CacheResponse::Retry`] when the
//!    collaborator cannot take the request this cycle; the caller retries later.
//!
//! Functional effects happen during the call in both modes. Reads return the
//! bytes, writes store them.

use std::fmt;

use crate::common::{Direction, Fault, PhysAddr, Translation, VirtAddr};
use crate::sim::Cycle;

/// Which protocol an access uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessMode {
    /// Immediate access; never refused.
    Atomic,
    /// Request issued at the given cycle; may be refused.
    Timing(Cycle),
}

/// Answer to an access request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheResponse {
    /// The access was performed and completes `latency` cycles after issue.
    Done {
        /// Cycles until the response.
        latency: u64,
        /// Bytes read (empty for writes).
        data: Vec<u8>,
    },
    /// The collaborator is busy; nothing was performed.
    Retry,
}

/// Event counters reported by a collaborator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheTlbCounters {
    /// L1 hits.
    pub hits: u64,
    /// L1 misses.
    pub misses: u64,
    /// Dirty lines written back.
    pub writebacks: u64,
    /// Timing requests refused.
    pub retries: u64,
    /// TLB hits.
    pub tlb_hits: u64,
    /// TLB misses.
    pub tlb_misses: u64,
}

/// Address translation plus L1 access, as seen from the coprocessor.
pub trait CacheTlb: fmt::Debug {
    /// Translates a virtual address for an access of `len` bytes.
    ///
    /// # Errors
    ///
    /// [`Fault::Translation`] for unmapped pages; [`Fault::Access`] if the
    /// range crosses a page boundary.
    fn translate(
        &mut self,
        vaddr: VirtAddr,
        len: u64,
        direction: Direction,
        mode: AccessMode,
    ) -> Result<Translation, Fault>;

    /// Reads `len` bytes at a physical address.
    ///
    /// # Errors
    ///
    /// [`Fault::Access`] if the range lies outside main memory.
    fn read(&mut self, paddr: PhysAddr, len: u64, mode: AccessMode)
    -> Result<CacheResponse, Fault>;

    /// Writes `data` at a physical address.
    ///
    /// # Errors
    ///
    /// [`Fault::Access`] if the range lies outside main memory.
    fn write(
        &mut self,
        paddr: PhysAddr,
        data: &[u8],
        mode: AccessMode,
    ) -> Result<CacheResponse, Fault>;

    /// Reads through translation with no timing side effects.
    ///
    /// # Errors
    ///
    /// Translation or access faults as for a timed access.
    fn functional_read(&mut self, vaddr: VirtAddr, buf: &mut [u8]) -> Result<(), Fault>;

    /// Writes through translation with no timing side effects.
    ///
    /// # Errors
    ///
    /// Translation or access faults as for a timed access.
    fn functional_write(&mut self, vaddr: VirtAddr, data: &[u8]) -> Result<(), Fault>;

    /// Line size used when grouping element requests.
    fn line_bytes(&self) -> u64;

    /// Event counters.
    fn counters(&self) -> CacheTlbCounters;
}
