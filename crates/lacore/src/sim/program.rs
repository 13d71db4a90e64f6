//! JSON program description.
//!
//! A program is what a host thread would issue to its coprocessor, plus the
//! data it expects to find in storage beforehand and the ranges it wants to
//! inspect afterwards:
//!
//! ```json
//! {
//!   "preload": [{ "location": "scratchpad", "addr": 0, "datatype": "double", "values": [1, 2, 3, 4] }],
//!   "instructions": [{ "xfer": "read_status" }],
//!   "dump": [{ "location": "memory", "addr": 4096, "datatype": "double", "count": 4 }]
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::common::{ConfigError, Datatype, Location, Value};
use crate::core::arch::Instruction;

/// Elements written into storage before the first instruction.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct Preload {
    /// Scratchpad or main memory.
    pub location: Location,
    /// Address of the first element.
    pub addr: u64,
    /// Element encoding.
    #[serde(default)]
    pub datatype: Datatype,
    /// Element values, written contiguously.
    pub values: Vec<f64>,
}

impl Preload {
    /// Little-endian bytes of every value in `datatype`.
    pub fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.values.len() * self.datatype.width() as usize);
        for v in &self.values {
            Value::F64(*v).convert(self.datatype).encode_into(&mut out);
        }
        out
    }
}

/// A contiguous range read back after the run.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Dump {
    /// Scratchpad or main memory.
    pub location: Location,
    /// Address of the first element.
    pub addr: u64,
    /// Element encoding.
    #[serde(default)]
    pub datatype: Datatype,
    /// Number of elements.
    pub count: u64,
}

/// A host program: preloads, instructions in program order and dumps.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Program {
    /// Storage contents before the run.
    #[serde(default)]
    pub preload: Vec<Preload>,
    /// Instructions in program order.
    #[serde(default)]
    pub instructions: Vec<Instruction>,
    /// Ranges to read back after the run.
    #[serde(default)]
    pub dump: Vec<Dump>,
}

impl Program {
    /// Parses a program from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads and parses a JSON program file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Program::from_json`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }
}
