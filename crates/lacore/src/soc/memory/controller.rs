//! Main memory latency models.
//!
//! This module provides:
//! 1. **Simple:** Fixed latency per access (no row-buffer modeling).
//! 2. **Dram:** Row-buffer-aware latency (CAS, RAS, precharge) for DRAM-style timing.

use crate::config::{MemoryConfig, MemoryController as ControllerKind};

/// Bytes covered by one DRAM row.
const ROW_BYTES: u64 = 2048;

/// Latency model of the memory behind the L1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MemoryController {
    /// Every access takes the same number of cycles.
    Simple {
        /// Cycles per access.
        latency: u64,
    },
    /// DRAM with a single open row.
    Dram {
        /// Row currently held in the row buffer.
        open_row: Option<u64>,
        /// Column access strobe latency.
        t_cas: u64,
        /// Row access strobe latency.
        t_ras: u64,
        /// Precharge latency.
        t_pre: u64,
    },
}

impl MemoryController {
    /// Builds the controller selected by `config.controller`.
    pub const fn from_config(config: &MemoryConfig) -> Self {
        match config.controller {
            ControllerKind::Simple => Self::Simple {
                latency: config.latency,
            },
            ControllerKind::Dram => Self::Dram {
                open_row: None,
                t_cas: config.t_cas,
                t_ras: config.t_ras,
                t_pre: config.t_pre,
            },
        }
    }

    /// Returns the number of cycles an access to `paddr` takes, updating row state.
    ///
    /// A DRAM row hit costs CAS; opening a row on an idle bank costs RAS + CAS;
    /// a row conflict adds precharge.
    pub const fn access_latency(&mut self, paddr: u64) -> u64 {
        match self {
            Self::Simple { latency } => *latency,
            Self::Dram {
                open_row,
                t_cas,
                t_ras,
                t_pre,
            } => {
                let row = paddr / ROW_BYTES;
                let latency = match *open_row {
                    Some(open) if open == row => *t_cas,
                    Some(_) => *t_pre + *t_ras + *t_cas,
                    None => *t_ras + *t_cas,
                };
                *open_row = Some(row);
                latency
            }
        }
    }
}
