//! Translation Lookaside Buffer (TLB).
//!
//! A direct-mapped cache of virtual-to-physical page mappings, indexed by the
//! low bits of the virtual page number.

/// A single entry in the TLB.
#[derive(Clone, Copy, Debug, Default)]
struct TlbEntry {
    vpn: u64,
    ppn: u64,
    valid: bool,
}

/// Translation Lookaside Buffer structure.
#[derive(Debug)]
pub struct Tlb {
    entries: Vec<TlbEntry>,
    mask: usize,
}

impl Tlb {
    /// Creates a new TLB with the specified size.
    ///
    /// # Arguments
    ///
    /// * `size` - Number of entries (rounded up to the next power of two, at least 1).
    pub fn new(size: usize) -> Self {
        let size = size.max(1).next_power_of_two();
        Self {
            entries: vec![TlbEntry::default(); size],
            mask: size - 1,
        }
    }

    /// Looks up a VPN, returning the cached PPN on a hit.
    pub fn lookup(&self, vpn: u64) -> Option<u64> {
        self.entries
            .get((vpn as usize) & self.mask)
            .filter(|e| e.valid && e.vpn == vpn)
            .map(|e| e.ppn)
    }

    /// Installs a mapping, replacing whatever shared its slot.
    pub fn insert(&mut self, vpn: u64, ppn: u64) {
        if let Some(slot) = self.entries.get_mut((vpn as usize) & self.mask) {
            *slot = TlbEntry {
                vpn,
                ppn,
                valid: true,
            };
        }
    }

    /// Invalidates every entry.
    pub fn flush(&mut self) {
        for e in &mut self.entries {
            e.valid = false;
        }
    }
}
