//! Banked on-chip scratchpad.
//!
//! The scratchpad's byte address space is interleaved across `B` banks at a
//! fixed stripe granularity:
//!
//! ```text
//! stripe = addr / stripe_bytes
//! bank   = stripe % B
//! offset = (stripe / B) * stripe_bytes + addr % stripe_bytes
//! ```
//!
//! Each bank is its own byte array. An access is split at stripe boundaries
//! into per-bank pieces. In timing mode every bank keeps the cycle it is busy
//! until; a piece starts when its bank is free, so accesses to the same bank
//! serialize while accesses to different banks overlap.

use tracing::trace;

use crate::common::{AccessReason, Fault};
use crate::config::ScratchpadConfig;
use crate::sim::Cycle;

/// Bank and in-bank offset of one scratchpad byte address.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BankSlot {
    /// Bank index.
    pub bank: usize,
    /// Byte offset inside the bank.
    pub offset: usize,
}

/// What a timing access did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpadCompletion {
    /// Cycle at which the last bank piece finishes.
    pub done_at: Cycle,
    /// Cycles the access waited for busy banks.
    pub stall: u64,
    /// Bytes read (empty for writes).
    pub data: Vec<u8>,
}

/// A scratchpad access request.
#[derive(Clone, Copy, Debug)]
pub enum SpadOp<'a> {
    /// Read `len` bytes.
    Read(u64),
    /// Write these bytes.
    Write(&'a [u8]),
}

impl SpadOp<'_> {
    const fn len(&self) -> u64 {
        match self {
            Self::Read(len) => *len,
            Self::Write(data) => data.len() as u64,
        }
    }
}

/// Banked scratchpad memory.
#[derive(Debug)]
pub struct Scratchpad {
    banks: Vec<Box<[u8]>>,
    busy_until: Vec<Cycle>,
    stripe: u64,
    capacity: u64,
    latency: u64,
    line_bytes: u64,
}

impl Scratchpad {
    /// Creates a zero-filled scratchpad.
    ///
    /// # Arguments
    ///
    /// * `config` - A validated scratchpad configuration; capacity is a
    ///   multiple of `banks * stripe_bytes`.
    pub fn new(config: &ScratchpadConfig) -> Self {
        let banks = config.banks.max(1);
        let bank_bytes = (config.capacity / banks as u64) as usize;
        Self {
            banks: (0..banks)
                .map(|_| vec![0u8; bank_bytes].into_boxed_slice())
                .collect(),
            busy_until: vec![0; banks],
            stripe: config.stripe_bytes.max(1),
            capacity: bank_bytes as u64 * banks as u64,
            latency: config.latency.max(1),
            line_bytes: config.line_bytes,
        }
    }

    /// Capacity in bytes.
    pub const fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of banks.
    pub fn bank_count(&self) -> usize {
        self.banks.len()
    }

    /// Per-access latency in cycles.
    pub const fn latency(&self) -> u64 {
        self.latency
    }

    /// Line size used when grouping element requests.
    pub const fn line_bytes(&self) -> u64 {
        self.line_bytes
    }

    /// Cycle until which `bank` is occupied, if the bank exists.
    pub fn busy_until(&self, bank: usize) -> Option<Cycle> {
        self.busy_until.get(bank).copied()
    }

    /// Maps a byte address to its bank and in-bank offset.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Access`] if `addr` is not below the capacity.
    pub fn decompose(&self, addr: u64) -> Result<BankSlot, Fault> {
        if addr >= self.capacity {
            return Err(out_of_range(addr, 1));
        }
        let stripe = addr / self.stripe;
        let banks = self.banks.len() as u64;
        Ok(BankSlot {
            bank: (stripe % banks) as usize,
            offset: ((stripe / banks) * self.stripe + addr % self.stripe) as usize,
        })
    }

    fn check_range(&self, addr: u64, len: u64) -> Result<(), Fault> {
        match addr.checked_add(len) {
            Some(end) if end <= self.capacity => Ok(()),
            _ => Err(out_of_range(addr, len)),
        }
    }

    /// Splits `[addr, addr + len)` into `(slot, position in request, piece length)`.
    ///
    /// The range must already be checked.
    fn pieces(&self, addr: u64, len: u64) -> Result<Vec<(BankSlot, usize, usize)>, Fault> {
        let mut out = Vec::new();
        let mut pos = 0u64;
        while pos < len {
            let a = addr + pos;
            let slot = self.decompose(a)?;
            let n = (self.stripe - a % self.stripe).min(len - pos);
            out.push((slot, pos as usize, n as usize));
            pos += n;
        }
        Ok(out)
    }

    fn copy_out(&self, addr: u64, buf: &mut [u8]) -> Result<(), Fault> {
        self.check_range(addr, buf.len() as u64)?;
        for (slot, pos, n) in self.pieces(addr, buf.len() as u64)? {
            let bank = &self.banks[slot.bank];
            buf[pos..pos + n].copy_from_slice(&bank[slot.offset..slot.offset + n]);
        }
        Ok(())
    }

    fn copy_in(&mut self, addr: u64, data: &[u8]) -> Result<(), Fault> {
        self.check_range(addr, data.len() as u64)?;
        for (slot, pos, n) in self.pieces(addr, data.len() as u64)? {
            let bank = &mut self.banks[slot.bank];
            bank[slot.offset..slot.offset + n].copy_from_slice(&data[pos..pos + n]);
        }
        Ok(())
    }

    /// Atomic-mode read: fills `buf` and returns the access latency.
    ///
    /// Bank pieces of one access run in parallel, so the latency is the
    /// per-access latency whatever the number of banks touched.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Access`] if the range exceeds the capacity.
    pub fn read_atomic(&self, addr: u64, buf: &mut [u8]) -> Result<u64, Fault> {
        self.copy_out(addr, buf)?;
        Ok(self.latency)
    }

    /// Atomic-mode write: stores `data` and returns the access latency.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Access`] if the range exceeds the capacity; nothing
    /// is written in that case.
    pub fn write_atomic(&mut self, addr: u64, data: &[u8]) -> Result<u64, Fault> {
        self.copy_in(addr, data)?;
        Ok(self.latency)
    }

    /// Timing-mode access issued at cycle `now`.
    ///
    /// The functional effect is applied immediately, in issue order. Each bank
    /// the access touches is reserved from `max(now, busy_until)` for one
    /// latency; the access completes when its last piece does.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Access`] if the range exceeds the capacity; no bank
    /// is reserved and nothing is written in that case.
    pub fn access_timing(
        &mut self,
        now: Cycle,
        addr: u64,
        op: SpadOp<'_>,
    ) -> Result<SpadCompletion, Fault> {
        let len = op.len();
        self.check_range(addr, len)?;

        let data = match op {
            SpadOp::Read(len) => {
                let mut buf = vec![0u8; len as usize];
                self.copy_out(addr, &mut buf)?;
                buf
            }
            SpadOp::Write(bytes) => {
                self.copy_in(addr, bytes)?;
                Vec::new()
            }
        };

        let mut touched = vec![false; self.banks.len()];
        for (slot, _, _) in self.pieces(addr, len)? {
            touched[slot.bank] = true;
        }

        let mut done_at = now + self.latency;
        let mut stall = 0;
        for (bank, _) in touched.iter().enumerate().filter(|(_, t)| **t) {
            let start = now.max(self.busy_until[bank]);
            let end = start + self.latency;
            self.busy_until[bank] = end;
            stall = stall.max(start - now);
            done_at = done_at.max(end);
        }

        trace!(addr, len, done_at, stall, "scratchpad access");
        Ok(SpadCompletion {
            done_at,
            stall,
            data,
        })
    }

    /// Reads without timing or bank reservation (host inspection).
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Access`] if the range exceeds the capacity.
    pub fn peek(&self, addr: u64, buf: &mut [u8]) -> Result<(), Fault> {
        self.copy_out(addr, buf)
    }

    /// Writes without timing or bank reservation (host preload).
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Access`] if the range exceeds the capacity.
    pub fn poke(&mut self, addr: u64, data: &[u8]) -> Result<(), Fault> {
        self.copy_in(addr, data)
    }
}

const fn out_of_range(addr: u64, len: u64) -> Fault {
    Fault::Access {
        addr,
        len,
        reason: AccessReason::OutOfRange,
    }
}
