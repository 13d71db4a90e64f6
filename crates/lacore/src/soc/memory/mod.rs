//! Physical main memory.
//!
//! Backing store for the Cache+TLB path. Pages are allocated on first write,
//! so a large configured size costs nothing until it is touched; unwritten
//! bytes read as zero.

/// Memory controller latency models.
pub mod controller;

use std::collections::HashMap;

use crate::common::{AccessReason, Fault};

const CHUNK: u64 = 4096;

/// Sparse physical memory.
#[derive(Debug)]
pub struct MainMemory {
    size: u64,
    chunks: HashMap<u64, Box<[u8]>>,
}

impl MainMemory {
    /// Creates an all-zero memory of `size` bytes.
    pub fn new(size: u64) -> Self {
        Self {
            size,
            chunks: HashMap::new(),
        }
    }

    /// Size in bytes.
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Checks that `[paddr, paddr + len)` lies inside memory.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Access`] if it does not.
    pub fn check_range(&self, paddr: u64, len: u64) -> Result<(), Fault> {
        match paddr.checked_add(len) {
            Some(end) if end <= self.size => Ok(()),
            _ => Err(Fault::Access {
                addr: paddr,
                len,
                reason: AccessReason::OutOfRange,
            }),
        }
    }

    /// Copies `buf.len()` bytes starting at `paddr` into `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Access`] if the range exceeds the memory size.
    pub fn read(&self, paddr: u64, buf: &mut [u8]) -> Result<(), Fault> {
        self.check_range(paddr, buf.len() as u64)?;
        let mut pos = 0usize;
        while pos < buf.len() {
            let addr = paddr + pos as u64;
            let (chunk, off) = (addr / CHUNK, (addr % CHUNK) as usize);
            let n = (CHUNK as usize - off).min(buf.len() - pos);
            match self.chunks.get(&chunk) {
                Some(bytes) => buf[pos..pos + n].copy_from_slice(&bytes[off..off + n]),
                None => buf[pos..pos + n].fill(0),
            }
            pos += n;
        }
        Ok(())
    }

    /// Stores `data` starting at `paddr`.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Access`] if the range exceeds the memory size;
    /// nothing is written in that case.
    pub fn write(&mut self, paddr: u64, data: &[u8]) -> Result<(), Fault> {
        self.check_range(paddr, data.len() as u64)?;
        let mut pos = 0usize;
        while pos < data.len() {
            let addr = paddr + pos as u64;
            let (chunk, off) = (addr / CHUNK, (addr % CHUNK) as usize);
            let n = (CHUNK as usize - off).min(data.len() - pos);
            let bytes = self
                .chunks
                .entry(chunk)
                .or_insert_with(|| vec![0u8; CHUNK as usize].into_boxed_slice());
            bytes[off..off + n].copy_from_slice(&data[pos..pos + n]);
            pos += n;
        }
        Ok(())
    }
}
