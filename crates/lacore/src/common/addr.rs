//! Physical and Virtual Address types.
//!
//! Vector descriptors hold virtual addresses when they point at main memory;
//! the Cache+TLB path turns them into physical addresses before the access.
//! Keeping the two apart at the type level stops a translated address from
//! being translated twice, or an untranslated one from reaching the cache.

use serde::Serialize;

/// A virtual address as seen by the coprocessor's vector descriptors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct VirtAddr(pub u64);

/// A physical address produced by translation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct PhysAddr(pub u64);

impl VirtAddr {
    /// Creates a new virtual address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(&self) -> u64 {
        self.0
    }

    /// Splits the address into a virtual page number and page offset.
    ///
    /// # Arguments
    ///
    /// * `page_size` - Page size in bytes; must be a power of two.
    ///
    /// # Returns
    ///
    /// `(vpn, offset)` for the page containing this address.
    pub const fn split(&self, page_size: u64) -> (u64, u64) {
        (self.0 / page_size, self.0 & (page_size - 1))
    }
}

impl PhysAddr {
    /// Creates a new physical address from a raw 64-bit value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw 64-bit address value.
    #[inline(always)]
    pub const fn val(&self) -> u64 {
        self.0
    }
}
