//! Components outside the coprocessor proper.
//!
//! This module organizes what the coprocessor reaches through a contract
//! rather than owning: the Cache+TLB collaborator trait, its default L1
//! implementation and the main memory behind it.

/// Default banked L1 + TLB collaborator.
pub mod cache_tlb;

/// Main memory and its latency models.
pub mod memory;

/// The Cache+TLB collaborator contract.
pub mod traits;

pub use cache_tlb::L1CacheTlb;
pub use memory::MainMemory;
pub use traits::{AccessMode, CacheResponse, CacheTlb, CacheTlbCounters};
