//! Decoded coprocessor instructions.
//!
//! The host pipeline decodes instruction bytes and resolves its own integer
//! registers; what reaches the dispatcher is one of the immutable values
//! below. All of them deserialize from JSON so programs can be written by hand.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::common::{Datatype, Location, Value};

/// A decoded coprocessor instruction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    /// Update vector register state.
    Config(ConfigOp),
    /// Elementwise arithmetic and reductions.
    Data(DataOp),
    /// Data movement and status access.
    Xfer(XferOp),
}

impl Instruction {
    /// Classifies the instruction for dispatch.
    pub const fn kind(&self) -> InstKind {
        match self {
            Self::Config(_) => InstKind::Config,
            Self::Data(_) => InstKind::DataOp,
            Self::Xfer(_) => InstKind::XferOp,
        }
    }
}

/// Instruction class; selects the executing unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstKind {
    /// Configuration Unit.
    Config,
    /// Data Compute Unit.
    DataOp,
    /// Transfer Unit.
    XferOp,
}

impl fmt::Display for InstKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config => write!(f, "CONFIG"),
            Self::DataOp => write!(f, "DATA_OP"),
            Self::XferOp => write!(f, "XFER_OP"),
        }
    }
}

/// A CONFIG instruction: update register `dst`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfigOp {
    /// Target vector register.
    pub dst: usize,
    /// Which fields to set.
    pub kind: ConfigKind,
}

/// Fields a CONFIG instruction sets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
    /// Set the whole descriptor as a flat vector.
    Vector {
        /// Storage location (scratchpad or memory).
        location: Location,
        /// Address of element 0.
        base: u64,
        /// Element datatype.
        datatype: Datatype,
        /// Byte distance between elements.
        stride: i64,
        /// Element count.
        count: u64,
    },
    /// Move an already configured vector to a new base address.
    Address {
        /// New address of element 0.
        base: u64,
    },
    /// Reshape an already configured vector, keeping its base and datatype.
    Layout {
        /// Storage location (scratchpad or memory).
        location: Location,
        /// Byte distance between elements.
        stride: i64,
        /// Element count.
        count: u64,
    },
    /// Split an already configured vector into rows.
    Matrix {
        /// Elements per row.
        row_len: u64,
        /// Byte offset added at every row boundary.
        skip: i64,
    },
    /// Point at one stored element that is read once and repeated.
    ScalarAt {
        /// Storage location (scratchpad or memory).
        location: Location,
        /// Address of the element.
        base: u64,
        /// Element datatype.
        datatype: Datatype,
    },
    /// Hold a scalar directly in the register.
    Scalar {
        /// The scalar; its variant fixes the datatype.
        value: Value,
    },
}

/// Arrangement of the two arithmetic operators of a DATA_OP.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Form {
    /// `d = (a ×/÷ b) ± c`
    #[default]
    MulAdd,
    /// `d = (a ± b) ×/÷ c`
    AddMul,
}

/// Reduction operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReduceOp {
    /// Sum, starting from zero.
    Sum,
    /// Minimum, starting from the first element.
    Min,
    /// Maximum, starting from the first element.
    Max,
}

/// Reduction applied to the elementwise results.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reduction {
    /// Operator.
    pub op: ReduceOp,
    /// Reduce every `segment` consecutive results into one output element.
    /// `None` reduces the whole stream to a single value.
    #[serde(default)]
    pub segment: Option<u64>,
}

/// A DATA_OP instruction.
///
/// A missing `b` or `c` operand takes the identity of its operator, so
/// `a` alone copies with conversion, `a, b` is a single add/mul/div and
/// `a, b, c` is the fused form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataOp {
    /// Destination register.
    pub dst: usize,
    /// First source register.
    pub a: usize,
    /// Optional second source register.
    #[serde(default)]
    pub b: Option<usize>,
    /// Optional third source register.
    #[serde(default)]
    pub c: Option<usize>,
    /// Operator arrangement.
    #[serde(default)]
    pub form: Form,
    /// Use subtraction instead of addition.
    #[serde(default)]
    pub subtract: bool,
    /// Use division instead of multiplication.
    #[serde(default)]
    pub divide: bool,
    /// Optional reduction of the elementwise results.
    #[serde(default)]
    pub reduce: Option<Reduction>,
}

impl DataOp {
    /// An elementwise `dst = a + b`.
    pub const fn add(dst: usize, a: usize, b: usize) -> Self {
        Self {
            dst,
            a,
            b: Some(b),
            c: None,
            form: Form::AddMul,
            subtract: false,
            divide: false,
            reduce: None,
        }
    }

    /// An elementwise `dst = a * b`.
    pub const fn mul(dst: usize, a: usize, b: usize) -> Self {
        Self {
            dst,
            a,
            b: Some(b),
            c: None,
            form: Form::MulAdd,
            subtract: false,
            divide: false,
            reduce: None,
        }
    }

    /// A whole-vector reduction of `a` into `dst`.
    pub const fn reduce(dst: usize, a: usize, op: ReduceOp) -> Self {
        Self {
            dst,
            a,
            b: None,
            c: None,
            form: Form::MulAdd,
            subtract: false,
            divide: false,
            reduce: Some(Reduction { op, segment: None }),
        }
    }

    /// Source registers in operand order.
    pub fn sources(&self) -> impl Iterator<Item = usize> {
        std::iter::once(self.a).chain(self.b).chain(self.c)
    }
}

/// An XFER_OP instruction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum XferOp {
    /// Copy vector `src` to vector `dst`.
    Copy {
        /// Source register.
        src: usize,
        /// Destination register.
        dst: usize,
    },
    /// Return the status register as the outcome.
    ReadStatus,
    /// Clear the sticky fault flags.
    ClearStatus,
}
