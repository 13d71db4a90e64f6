//! Element placement and value types.
//!
//! These types describe what a vector element is and where it lives:
//! 1. **Direction:** Whether a memory request reads or writes.
//! 2. **Location:** Scratchpad, main memory (through the Cache+TLB path) or a scalar register.
//! 3. **Datatype / Value:** Single or double precision elements and their decoded values.

use serde::{Deserialize, Serialize};

/// Direction of a memory request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Data flows from storage to a unit.
    Read,
    /// Data flows from a unit to storage.
    Write,
}

/// Storage location of a vector operand.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    /// The banked on-chip scratchpad; addresses are scratchpad offsets.
    #[default]
    Scratchpad,
    /// Main memory reached through the Cache+TLB path; addresses are virtual.
    Memory,
    /// A scalar held directly in the vector register.
    ///
    /// As a source it is broadcast to every element; as a destination it
    /// receives a single scalar result.
    Register,
}

/// Element datatype.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Datatype {
    /// IEEE-754 binary32.
    Single,
    /// IEEE-754 binary64.
    #[default]
    Double,
}

impl Datatype {
    /// Element width in bytes.
    pub const fn width(self) -> u64 {
        match self {
            Self::Single => 4,
            Self::Double => 8,
        }
    }

    /// Returns the datatype whose element width is `width` bytes, if any.
    pub const fn from_width(width: u64) -> Option<Self> {
        match width {
            4 => Some(Self::Single),
            8 => Some(Self::Double),
            _ => None,
        }
    }
}

/// A decoded element value.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// Single precision element.
    F32(f32),
    /// Double precision element.
    F64(f64),
}

impl Value {
    /// Decodes a little-endian element of the given datatype.
    ///
    /// # Arguments
    ///
    /// * `datatype` - Element datatype.
    /// * `bytes` - Exactly `datatype.width()` bytes.
    ///
    /// # Returns
    ///
    /// The decoded value, or `None` if `bytes` has the wrong length.
    pub fn decode(datatype: Datatype, bytes: &[u8]) -> Option<Self> {
        match datatype {
            Datatype::Single => {
                let raw: [u8; 4] = bytes.try_into().ok()?;
                Some(Self::F32(f32::from_le_bytes(raw)))
            }
            Datatype::Double => {
                let raw: [u8; 8] = bytes.try_into().ok()?;
                Some(Self::F64(f64::from_le_bytes(raw)))
            }
        }
    }

    /// Appends the little-endian encoding of this value to `out`.
    pub fn encode_into(self, out: &mut Vec<u8>) {
        match self {
            Self::F32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Self::F64(v) => out.extend_from_slice(&v.to_le_bytes()),
        }
    }

    /// Returns the little-endian encoding of this value.
    pub fn to_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8);
        self.encode_into(&mut out);
        out
    }

    /// Datatype of this value.
    pub const fn datatype(self) -> Datatype {
        match self {
            Self::F32(_) => Datatype::Single,
            Self::F64(_) => Datatype::Double,
        }
    }

    /// Widens the value to `f64`.
    pub fn as_f64(self) -> f64 {
        match self {
            Self::F32(v) => f64::from(v),
            Self::F64(v) => v,
        }
    }

    /// Converts the value to `to`, rounding to nearest when narrowing.
    ///
    /// Converting to the value's own datatype returns it unchanged, bit for bit.
    pub fn convert(self, to: Datatype) -> Self {
        match (self, to) {
            (Self::F32(v), Datatype::Double) => Self::F64(f64::from(v)),
            (Self::F64(v), Datatype::Single) => Self::F32(v as f32),
            (same, _) => same,
        }
    }
}
