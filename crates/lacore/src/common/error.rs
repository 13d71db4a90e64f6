//! Fault taxonomy and configuration errors.
//!
//! This module defines how things go wrong inside the coprocessor:
//! 1. **Faults:** Reported to the host as the outcome of an instruction.
//! 2. **Access reasons:** Why an address range was rejected.
//! 3. **Configuration errors:** Construction-time validation failures.
//! 4. **Translation results:** The outcome of a successful address translation.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use super::addr::PhysAddr;

/// Why an access was rejected with [`Fault::Access`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AccessReason {
    /// The range extends past the end of the addressed storage.
    OutOfRange,
    /// The range crosses a page boundary in main memory.
    PageCrossing,
    /// The address or length does not fit the element stream (negative address, overflow).
    BadAddress,
}

impl fmt::Display for AccessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "out of range"),
            Self::PageCrossing => write!(f, "crosses a page boundary"),
            Self::BadAddress => write!(f, "address overflow"),
        }
    }
}

/// Faults an instruction can complete with.
///
/// Every variant except [`Fault::Protocol`] is an architectural outcome the
/// host may react to. A protocol fault is an internal invariant violation and
/// stops the simulation.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize)]
pub enum Fault {
    /// Invalid shape or datatype; the instruction did not execute.
    #[error("configuration fault: {0}")]
    Configuration(String),

    /// Address translation failed for a main memory access.
    #[error("translation fault at {addr:#x}")]
    Translation {
        /// Faulting virtual address.
        addr: u64,
    },

    /// Out-of-range or otherwise unserviceable access.
    #[error("access fault at {addr:#x} (+{len} bytes): {reason}")]
    Access {
        /// First byte of the rejected range.
        addr: u64,
        /// Length of the rejected range in bytes.
        len: u64,
        /// Why the range was rejected.
        reason: AccessReason,
    },

    /// Source and destination of a transfer overlap.
    #[error("alias fault: source at {src:#x} overlaps destination at {dst:#x}")]
    Alias {
        /// Base address of the source vector.
        src: u64,
        /// Base address of the destination vector.
        dst: u64,
    },

    /// Channel bound exceeded or a request id completed twice.
    #[error("protocol fault: {0}")]
    Protocol(String),

    /// The instruction's outstanding requests were discarded by a drain.
    #[error("instruction aborted by drain")]
    Drained,
}

impl Fault {
    /// Returns `true` for faults that must stop the simulation.
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Sticky status bit recorded for this fault kind.
    pub const fn status_bit(&self) -> u64 {
        match self {
            Self::Configuration(_) => 1 << 0,
            Self::Translation { .. } => 1 << 1,
            Self::Access { .. } => 1 << 2,
            Self::Alias { .. } => 1 << 3,
            Self::Protocol(_) => 1 << 4,
            Self::Drained => 1 << 5,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub(crate) fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

/// Errors raised while building or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field holds a value the model cannot be built with.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Human-readable description of the constraint.
        reason: String,
    },

    /// The configuration text is not valid JSON for [`crate::config::Config`].
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// A successful address translation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Translation {
    /// The translated physical address.
    pub paddr: PhysAddr,
    /// Number of cycles consumed by the translation.
    pub cycles: u64,
}

impl Translation {
    /// Creates a translation result.
    ///
    /// # Arguments
    ///
    /// * `paddr` - The translated physical address.
    /// * `cycles` - Number of cycles consumed by the translation.
    #[inline]
    pub const fn new(paddr: PhysAddr, cycles: u64) -> Self {
        Self { paddr, cycles }
    }
}
