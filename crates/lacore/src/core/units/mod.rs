//! Storage and translation units.
//!
//! This module contains the leaf components of the memory path: the banked
//! scratchpad owned by the coprocessor, and the L1 tag model and MMU used by
//! the default Cache+TLB collaborator.

/// Banked set-associative L1 tag model.
pub mod cache;

/// Address translation (TLB and page map).
pub mod mmu;

/// Banked on-chip scratchpad.
pub mod scratchpad;
