//! Address translation for main memory operands.
//!
//! The MMU pairs a [`Tlb`] with a page map. The page map is either the
//! identity (no mappings configured) or an explicit list of regions; a page
//! outside every region does not translate.

/// Translation Lookaside Buffer (TLB) for caching virtual-to-physical page mappings.
pub mod tlb;

use tracing::trace;

use crate::common::{Fault, PhysAddr, Translation, VirtAddr};
use crate::config::{PageMapping, TlbConfig};

use self::tlb::Tlb;

/// Hit/miss counters of the MMU.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MmuCounters {
    /// Translations served by the TLB.
    pub hits: u64,
    /// Translations that walked the page map.
    pub misses: u64,
    /// Translations that failed.
    pub faults: u64,
}

/// Memory Management Unit for coprocessor main-memory accesses.
#[derive(Debug)]
pub struct Mmu {
    tlb: Tlb,
    mappings: Vec<PageMapping>,
    page_size: u64,
    latency: u64,
    walk_latency: u64,
    counters: MmuCounters,
}

impl Mmu {
    /// Creates an MMU from a validated TLB configuration.
    pub fn new(config: &TlbConfig) -> Self {
        Self {
            tlb: Tlb::new(config.entries),
            mappings: config.mappings.clone(),
            page_size: config.page_size,
            latency: config.latency,
            walk_latency: config.walk_latency,
            counters: MmuCounters::default(),
        }
    }

    /// Page size in bytes.
    pub const fn page_size(&self) -> u64 {
        self.page_size
    }

    /// Hit/miss counters.
    pub const fn counters(&self) -> MmuCounters {
        self.counters
    }

    /// Invalidates cached translations.
    pub fn flush(&mut self) {
        self.tlb.flush();
    }

    fn walk(&self, vpn: u64) -> Option<u64> {
        if self.mappings.is_empty() {
            return Some(vpn);
        }
        let vaddr = vpn * self.page_size;
        self.mappings
            .iter()
            .find(|m| vaddr >= m.vbase && vaddr - m.vbase < m.size)
            .map(|m| (m.pbase + (vaddr - m.vbase)) / self.page_size)
    }

    /// Translates a virtual address.
    ///
    /// # Returns
    ///
    /// The physical address and the cycles spent: the TLB latency on a hit,
    /// plus the walk latency on a miss.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Translation`] if the page is not mapped.
    pub fn translate(&mut self, vaddr: VirtAddr) -> Result<Translation, Fault> {
        let (vpn, offset) = vaddr.split(self.page_size);
        if let Some(ppn) = self.tlb.lookup(vpn) {
            self.counters.hits += 1;
            return Ok(Translation::new(
                PhysAddr::new(ppn * self.page_size + offset),
                self.latency,
            ));
        }

        let Some(ppn) = self.walk(vpn) else {
            self.counters.faults += 1;
            return Err(Fault::Translation { addr: vaddr.val() });
        };
        self.counters.misses += 1;
        self.tlb.insert(vpn, ppn);
        trace!(vpn, ppn, "tlb fill");
        Ok(Translation::new(
            PhysAddr::new(ppn * self.page_size + offset),
            self.latency + self.walk_latency,
        ))
    }

    /// The translation [`Mmu::translate`] would return, without filling the
    /// TLB or counting.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Translation`] if the page is not mapped.
    pub fn peek(&self, vaddr: VirtAddr) -> Result<Translation, Fault> {
        let (vpn, offset) = vaddr.split(self.page_size);
        let (ppn, cycles) = match self.tlb.lookup(vpn) {
            Some(ppn) => (ppn, self.latency),
            None => (
                self.walk(vpn)
                    .ok_or(Fault::Translation { addr: vaddr.val() })?,
                self.latency + self.walk_latency,
            ),
        };
        Ok(Translation::new(
            PhysAddr::new(ppn * self.page_size + offset),
            cycles,
        ))
    }

    /// Translates without touching the TLB or counters (functional accesses).
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Translation`] if the page is not mapped.
    pub fn probe(&self, vaddr: VirtAddr) -> Result<PhysAddr, Fault> {
        let (vpn, offset) = vaddr.split(self.page_size);
        self.walk(vpn)
            .map(|ppn| PhysAddr::new(ppn * self.page_size + offset))
            .ok_or(Fault::Translation { addr: vaddr.val() })
    }
}
