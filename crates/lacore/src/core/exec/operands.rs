//! Operand resolution shared by the atomic and timing units.
//!
//! Both variants of a unit validate an instruction the same way before
//! touching memory. The resulting plan holds copies of the descriptors, so a
//! CONFIG that lands later cannot change an operation in flight.

use crate::common::{Datatype, Fault, Location, Value};
use crate::config::DatapathConfig;
use crate::core::arch::{ALIAS_SCAN_LIMIT, DataOp, ReduceOp, RegisterFile, VectorDescriptor};
use crate::core::mem_unit::AtomicMem;

/// Where a unit takes one source operand from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Operand {
    /// A register scalar repeated for every element.
    Broadcast(Value),
    /// A vector streamed from memory or the scratchpad.
    Stream(VectorDescriptor),
    /// A stored scalar read once, then repeated like a broadcast.
    Fetch(VectorDescriptor),
}

impl Operand {
    fn resolve(desc: &VectorDescriptor) -> Result<Self, Fault> {
        match (desc.location, desc.scalar) {
            (Location::Register, Some(v)) => Ok(Self::Broadcast(v)),
            (Location::Register, None) => Err(Fault::config("register operand holds no scalar")),
            _ if desc.broadcast => Ok(Self::Fetch(*desc)),
            _ => Ok(Self::Stream(*desc)),
        }
    }

    const fn datatype(&self) -> Datatype {
        match self {
            Self::Broadcast(v) => v.datatype(),
            Self::Stream(d) | Self::Fetch(d) => d.datatype,
        }
    }

    /// The stored layout read by this operand, if any.
    pub const fn stored(&self) -> Option<&VectorDescriptor> {
        match self {
            Self::Broadcast(_) => None,
            Self::Stream(d) | Self::Fetch(d) => Some(d),
        }
    }
}

fn check_precision(from: Datatype, to: Datatype, mixed: bool) -> Result<(), Fault> {
    if from == to || mixed {
        Ok(())
    } else {
        Err(Fault::config(format!(
            "{from:?} operand needs conversion to {to:?} but mixed precision is disabled"
        )))
    }
}

/// A validated DATA_OP.
#[derive(Clone, Debug)]
pub struct DataPlan {
    /// The instruction.
    pub op: DataOp,
    /// Destination layout.
    pub dst: VectorDescriptor,
    /// Operands `a`, `b`, `c`.
    pub sources: [Option<Operand>; 3],
    /// Elements computed.
    pub count: u64,
    /// Elements written to the destination.
    pub outputs: u64,
    /// Computation precision (the destination datatype).
    pub precision: Datatype,
}

impl DataPlan {
    /// Resolves and validates `op` against the register file.
    ///
    /// # Errors
    ///
    /// [`Fault::Configuration`] for unconfigured registers, mismatched
    /// counts, a bad segment length or a disallowed precision conversion.
    pub fn build(
        op: &DataOp,
        regs: &RegisterFile,
        config: &DatapathConfig,
    ) -> Result<Self, Fault> {
        let dst = *regs.get(op.dst)?;
        dst.validate()?;
        let mut sources = [None; 3];
        for (slot, idx) in [Some(op.a), op.b, op.c].into_iter().enumerate() {
            if let Some(idx) = idx {
                let desc = regs.get(idx)?;
                desc.validate()?;
                sources[slot] = Some(Operand::resolve(desc)?);
            }
        }

        let first_stream = sources.iter().flatten().find_map(|s| match s {
            Operand::Stream(d) => Some(d.count),
            Operand::Broadcast(_) | Operand::Fetch(_) => None,
        });
        let count = if op.reduce.is_some() {
            first_stream.unwrap_or(1)
        } else {
            dst.count
        };
        for src in sources.iter().flatten() {
            if let Operand::Stream(d) = src
                && d.count != count
            {
                return Err(Fault::config(format!(
                    "source has {} elements, operation needs {count}",
                    d.count
                )));
            }
        }

        let outputs = match op.reduce.map(|r| r.segment) {
            None => count,
            Some(None) => 1,
            Some(Some(seg)) => {
                if seg == 0 || count % seg != 0 {
                    return Err(Fault::config(format!(
                        "segment length {seg} does not divide {count} elements"
                    )));
                }
                count / seg
            }
        };
        if dst.count != outputs {
            return Err(Fault::config(format!(
                "destination has {} elements, operation produces {outputs}",
                dst.count
            )));
        }

        let precision = dst.datatype;
        for src in sources.iter().flatten() {
            check_precision(src.datatype(), precision, config.mixed_precision)?;
        }

        Ok(Self {
            op: op.clone(),
            dst,
            sources,
            count,
            outputs,
            precision,
        })
    }

    /// Elements folded into each output of a reduction.
    pub fn segment_len(&self) -> u64 {
        self.count / self.outputs.max(1)
    }
}

/// A validated XFER_OP copy.
#[derive(Clone, Copy, Debug)]
pub struct XferPlan {
    /// Source operand.
    pub src: Operand,
    /// Destination layout.
    pub dst: VectorDescriptor,
    /// Elements copied.
    pub count: u64,
}

impl XferPlan {
    /// Resolves and validates a copy from register `src` to register `dst`.
    ///
    /// # Errors
    ///
    /// [`Fault::Configuration`] for unconfigured registers, mismatched
    /// counts or a disallowed conversion; [`Fault::Alias`] when source and
    /// destination bytes overlap.
    pub fn build(
        src: usize,
        dst: usize,
        regs: &RegisterFile,
        config: &DatapathConfig,
    ) -> Result<Self, Fault> {
        let src_desc = *regs.get(src)?;
        let dst = *regs.get(dst)?;
        src_desc.validate()?;
        dst.validate()?;
        let src = Operand::resolve(&src_desc)?;
        if let Operand::Stream(s) = src
            && s.count != dst.count
        {
            return Err(Fault::config(format!(
                "copy of {} elements into {}",
                s.count, dst.count
            )));
        }
        check_precision(src.datatype(), dst.datatype, config.mixed_precision)?;
        if let Some(s) = src.stored()
            && aliases(s, &dst)
        {
            return Err(Fault::Alias {
                src: s.base,
                dst: dst.base,
            });
        }
        Ok(Self {
            src,
            dst,
            count: dst.count,
        })
    }
}

/// Returns `true` if any element of `a` overlaps any element of `b` in the
/// same address space.
///
/// Disjoint spans answer in constant time. Otherwise linear layouts are
/// compared lazily in address order; other layouts with more than
/// [`ALIAS_SCAN_LIMIT`] elements between them count as overlapping.
pub fn aliases(a: &VectorDescriptor, b: &VectorDescriptor) -> bool {
    if a.location != b.location || a.is_register() || b.is_register() {
        return false;
    }
    let (Some((lo_a, hi_a)), Some((lo_b, hi_b))) = (a.span(), b.span()) else {
        return false;
    };
    if hi_a <= lo_b || hi_b <= lo_a {
        return false;
    }
    if a.is_linear() && b.is_linear() {
        return overlapping(a.ascending_ranges(), b.ascending_ranges());
    }
    if a.count.saturating_add(b.count) > ALIAS_SCAN_LIMIT {
        return true;
    }
    overlapping(a.byte_ranges().into_iter(), b.byte_ranges().into_iter())
}

/// Sweeps two start-sorted sequences of equal-width ranges for an overlap.
fn overlapping(
    mut a: impl Iterator<Item = (u64, u64)>,
    mut b: impl Iterator<Item = (u64, u64)>,
) -> bool {
    let (mut x, mut y) = (a.next(), b.next());
    while let (Some((sa, ea)), Some((sb, eb))) = (x, y) {
        if ea <= sb {
            x = a.next();
        } else if eb <= sa {
            y = b.next();
        } else {
            return true;
        }
    }
    false
}

/// In-order reduction accumulator with optional segmentation.
#[derive(Clone, Debug)]
pub struct Reducer {
    op: ReduceOp,
    segment: u64,
    acc: Option<Value>,
    seen: u64,
}

impl Reducer {
    /// Creates an accumulator emitting one value every `segment` elements.
    pub const fn new(op: ReduceOp, segment: u64) -> Self {
        Self {
            op,
            segment,
            acc: None,
            seen: 0,
        }
    }

    /// Folds the next element; returns the segment result when it closes.
    pub fn push(&mut self, x: Value) -> Option<Value> {
        let acc = super::arith::fold(self.op, self.acc, x);
        self.seen += 1;
        if self.seen == self.segment {
            self.seen = 0;
            self.acc = None;
            Some(acc)
        } else {
            self.acc = Some(acc);
            None
        }
    }
}

/// Reads element `index` of `operand` atomically, converted to `precision`.
///
/// # Returns
///
/// The value and the access latency (zero for a broadcast).
///
/// # Errors
///
/// Access and translation faults of the read.
pub fn read_element(
    mem: &mut AtomicMem<'_>,
    operand: &Operand,
    index: u64,
    precision: Datatype,
) -> Result<(Value, u64), Fault> {
    match operand {
        Operand::Broadcast(v) => Ok((v.convert(precision), 0)),
        Operand::Stream(desc) | Operand::Fetch(desc) => {
            let index = if desc.broadcast { 0 } else { index };
            let addr = desc.element_addr(index)?;
            let (bytes, latency) = mem.read(desc.location, addr, desc.width)?;
            let v = Value::decode(desc.datatype, &bytes)
                .ok_or_else(|| Fault::protocol(format!("short read at {addr:#x}")))?;
            Ok((v.convert(precision), latency))
        }
    }
}

/// Reads a stored scalar once and turns it into a broadcast.
///
/// # Returns
///
/// The operand to use for every element and the latency of the read.
///
/// # Errors
///
/// Access and translation faults of the read.
pub fn latch(
    mem: &mut AtomicMem<'_>,
    operand: Operand,
    precision: Datatype,
) -> Result<(Operand, u64), Fault> {
    match operand {
        Operand::Fetch(_) => {
            let (v, latency) = read_element(mem, &operand, 0, precision)?;
            Ok((Operand::Broadcast(v), latency))
        }
        other => Ok((other, 0)),
    }
}

/// Writes `value` as element `index` of `dst` atomically.
///
/// # Errors
///
/// Access and translation faults of the write.
pub fn write_element(
    mem: &mut AtomicMem<'_>,
    dst: &VectorDescriptor,
    index: u64,
    value: Value,
) -> Result<u64, Fault> {
    let addr = dst.element_addr(index)?;
    mem.write(dst.location, addr, &value.to_bytes())
}
