//! Default Cache+TLB collaborator.
//!
//! `L1CacheTlb` combines the pieces the coprocessor expects behind the
//! [`CacheTlb`] contract:
//! 1. **Translation:** [`Mmu`] with a TLB and an identity or explicit page map.
//! 2. **L1:** [`L1Tags`], banked and multi-ported; an over-subscribed bank answers `Retry`.
//! 3. **Memory:** [`MainMemory`] for data and a [`MemoryController`] for miss latency.
//!
//! A timing translation is only charged to the TLB once the access that
//! follows it is admitted; a refused access leaves the TLB and its counters
//! as they were.

use tracing::trace;

use crate::common::{AccessReason, Direction, Fault, PhysAddr, Translation, VirtAddr};
use crate::config::Config;
use crate::core::units::cache::L1Tags;
use crate::core::units::mmu::Mmu;
use crate::soc::memory::MainMemory;
use crate::soc::memory::controller::MemoryController;
use crate::soc::traits::{AccessMode, CacheResponse, CacheTlb, CacheTlbCounters};

/// Banked L1 with TLB in front of sparse main memory.
#[derive(Debug)]
pub struct L1CacheTlb {
    mmu: Mmu,
    tags: L1Tags,
    controller: MemoryController,
    memory: MainMemory,
    counters: CacheTlbCounters,
    pending: Option<VirtAddr>,
}

impl L1CacheTlb {
    /// Builds the collaborator from the cache, TLB and memory sections of `config`.
    pub fn new(config: &Config) -> Self {
        Self {
            mmu: Mmu::new(&config.tlb),
            tags: L1Tags::new(&config.cache),
            controller: MemoryController::from_config(&config.memory),
            memory: MainMemory::new(config.memory.ram_size),
            counters: CacheTlbCounters::default(),
            pending: None,
        }
    }

    /// Main memory, for host-side inspection.
    pub const fn memory(&self) -> &MainMemory {
        &self.memory
    }

    /// Main memory, for host-side preloading.
    pub const fn memory_mut(&mut self) -> &mut MainMemory {
        &mut self.memory
    }

    /// Charges the tag lookups of `[paddr, paddr + len)` and returns the latency.
    fn timed_lookup(&mut self, paddr: u64, len: u64, is_write: bool) -> u64 {
        let line = self.tags.line_bytes() as u64;
        let first = paddr / line;
        let last = (paddr + len.max(1) - 1) / line;
        let mut latency = self.tags.latency();
        for l in first..=last {
            let line_addr = l * line;
            let lookup = self.tags.lookup(line_addr, is_write);
            let mut cost = self.tags.latency();
            if lookup.hit {
                self.counters.hits += 1;
            } else {
                self.counters.misses += 1;
                cost += self.controller.access_latency(line_addr);
            }
            if lookup.writeback {
                self.counters.writebacks += 1;
                cost += self.controller.access_latency(line_addr);
            }
            latency = latency.max(cost);
        }
        latency
    }

    fn charged_translate(&mut self, vaddr: VirtAddr) -> Result<Translation, Fault> {
        let before = self.mmu.counters();
        let result = self.mmu.translate(vaddr);
        let after = self.mmu.counters();
        self.counters.tlb_hits += after.hits - before.hits;
        self.counters.tlb_misses += after.misses - before.misses;
        result
    }

    /// Charges the held timing translation if its access was admitted.
    fn settle(&mut self, admitted: bool) {
        if let Some(vaddr) = self.pending.take()
            && admitted
        {
            let _ = self.charged_translate(vaddr);
        }
    }

    /// Claims an L1 port in timing mode; `false` means retry.
    fn admit(&mut self, paddr: u64, mode: AccessMode) -> bool {
        match mode {
            AccessMode::Atomic => true,
            AccessMode::Timing(now) => {
                let bank = self.tags.bank_of(paddr);
                let ok = self.tags.claim_port(now, bank);
                if !ok {
                    self.counters.retries += 1;
                    trace!(paddr, bank, now, "l1 bank busy, retry");
                }
                ok
            }
        }
    }
}

impl CacheTlb for L1CacheTlb {
    fn translate(
        &mut self,
        vaddr: VirtAddr,
        len: u64,
        _direction: Direction,
        mode: AccessMode,
    ) -> Result<Translation, Fault> {
        self.pending = None;
        let (_, offset) = vaddr.split(self.mmu.page_size());
        if offset + len > self.mmu.page_size() {
            return Err(Fault::Access {
                addr: vaddr.val(),
                len,
                reason: AccessReason::PageCrossing,
            });
        }
        match mode {
            AccessMode::Atomic => self.charged_translate(vaddr),
            AccessMode::Timing(_) => match self.mmu.peek(vaddr) {
                Ok(tr) => {
                    self.pending = Some(vaddr);
                    Ok(tr)
                }
                Err(_) => self.charged_translate(vaddr),
            },
        }
    }

    fn read(
        &mut self,
        paddr: PhysAddr,
        len: u64,
        mode: AccessMode,
    ) -> Result<CacheResponse, Fault> {
        let mut data = vec![0u8; len as usize];
        self.memory.read(paddr.val(), &mut data)?;
        let admitted = self.admit(paddr.val(), mode);
        self.settle(admitted);
        if !admitted {
            return Ok(CacheResponse::Retry);
        }
        let latency = self.timed_lookup(paddr.val(), len, false);
        Ok(CacheResponse::Done { latency, data })
    }

    fn write(
        &mut self,
        paddr: PhysAddr,
        data: &[u8],
        mode: AccessMode,
    ) -> Result<CacheResponse, Fault> {
        self.memory.check_range(paddr.val(), data.len() as u64)?;
        let admitted = self.admit(paddr.val(), mode);
        self.settle(admitted);
        if !admitted {
            return Ok(CacheResponse::Retry);
        }
        self.memory.write(paddr.val(), data)?;
        let latency = self.timed_lookup(paddr.val(), data.len() as u64, true);
        Ok(CacheResponse::Done {
            latency,
            data: Vec::new(),
        })
    }

    fn functional_read(&mut self, vaddr: VirtAddr, buf: &mut [u8]) -> Result<(), Fault> {
        let page = self.mmu.page_size();
        let mut pos = 0usize;
        while pos < buf.len() {
            let va = VirtAddr::new(vaddr.val() + pos as u64);
            let (_, offset) = va.split(page);
            let n = ((page - offset) as usize).min(buf.len() - pos);
            let pa = self.mmu.probe(va)?;
            self.memory.read(pa.val(), &mut buf[pos..pos + n])?;
            pos += n;
        }
        Ok(())
    }

    fn functional_write(&mut self, vaddr: VirtAddr, data: &[u8]) -> Result<(), Fault> {
        let page = self.mmu.page_size();
        let mut pos = 0usize;
        while pos < data.len() {
            let va = VirtAddr::new(vaddr.val() + pos as u64);
            let (_, offset) = va.split(page);
            let n = ((page - offset) as usize).min(data.len() - pos);
            let pa = self.mmu.probe(va)?;
            self.memory.write(pa.val(), &data[pos..pos + n])?;
            pos += n;
        }
        Ok(())
    }

    fn line_bytes(&self) -> u64 {
        self.tags.line_bytes() as u64
    }

    fn counters(&self) -> CacheTlbCounters {
        self.counters
    }
}
