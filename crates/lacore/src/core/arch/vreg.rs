//! Vector descriptors and the vector register file.
//!
//! A vector register holds a [`VectorDescriptor`]: where a vector operand lives
//! and how its elements are laid out. Registers start unconfigured; naming an
//! unconfigured register in a DATA_OP or XFER_OP is a configuration fault.

use serde::Serialize;

use crate::common::{AccessReason, Datatype, Fault, Location, Value};

/// Vectors with more elements than this whose spans overlap are not compared
/// element by element unless both are laid out linearly.
pub const ALIAS_SCAN_LIMIT: u64 = 1 << 20;

/// Shape and placement of one vector operand.
///
/// Element `i` occupies `width` bytes at
/// `base + i * stride + (i / row_len) * skip`; a flat vector has no rows.
/// Register descriptors hold a single scalar in `scalar` and have no address.
/// A `broadcast` descriptor names one stored element that is read once and
/// repeated for every element of the operation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VectorDescriptor {
    /// Address of element 0 (scratchpad offset or virtual address).
    pub base: u64,
    /// Storage location.
    pub location: Location,
    /// Element width in bytes; always `datatype.width()`.
    pub width: u64,
    /// Signed distance in bytes between consecutive elements.
    pub stride: i64,
    /// Number of elements.
    pub count: u64,
    /// Element datatype.
    pub datatype: Datatype,
    /// Elements per row of a matrix layout.
    pub row_len: Option<u64>,
    /// Signed byte offset added at every row boundary.
    pub skip: i64,
    /// Stored scalar repeated for every element.
    pub broadcast: bool,
    /// Scalar value of a `Location::Register` descriptor.
    pub scalar: Option<Value>,
}

impl VectorDescriptor {
    /// Creates a memory or scratchpad vector descriptor.
    pub const fn vector(
        location: Location,
        base: u64,
        datatype: Datatype,
        stride: i64,
        count: u64,
    ) -> Self {
        Self {
            base,
            location,
            width: datatype.width(),
            stride,
            count,
            datatype,
            row_len: None,
            skip: 0,
            broadcast: false,
            scalar: None,
        }
    }

    /// Creates a register-located scalar descriptor.
    pub const fn scalar(value: Value) -> Self {
        let datatype = value.datatype();
        Self {
            base: 0,
            location: Location::Register,
            width: datatype.width(),
            stride: 0,
            count: 1,
            datatype,
            row_len: None,
            skip: 0,
            broadcast: false,
            scalar: Some(value),
        }
    }

    /// Creates a scalar stored at `base` in memory or the scratchpad.
    pub const fn scalar_at(location: Location, base: u64, datatype: Datatype) -> Self {
        let mut desc = Self::vector(location, base, datatype, datatype.width() as i64, 1);
        desc.broadcast = true;
        desc
    }

    /// Lays the elements out in rows of `row_len`, adding `skip` bytes at
    /// every row boundary.
    #[must_use]
    pub const fn with_rows(mut self, row_len: u64, skip: i64) -> Self {
        self.row_len = Some(row_len);
        self.skip = skip;
        self
    }

    /// Returns `true` for register-located scalars.
    pub const fn is_register(&self) -> bool {
        matches!(self.location, Location::Register)
    }

    /// Checks the shape fields.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Configuration`] for a zero count, a width that does
    /// not match the datatype, a register descriptor that is not a single
    /// scalar, a zero stride on a multi-element vector, an empty row, or a
    /// stored scalar with more than one element.
    pub fn validate(&self) -> Result<(), Fault> {
        if self.count == 0 {
            return Err(Fault::config("element count must be non-zero"));
        }
        if Datatype::from_width(self.width) != Some(self.datatype) {
            return Err(Fault::config(format!(
                "element width {} does not match {:?}",
                self.width, self.datatype
            )));
        }
        if self.is_register() {
            if self.count != 1 || self.scalar.is_none() {
                return Err(Fault::config("register operand must hold one scalar"));
            }
        } else if self.count > 1 && self.stride == 0 {
            return Err(Fault::config("stride must be non-zero for multi-element vectors"));
        }
        if self.row_len == Some(0) {
            return Err(Fault::config("row length must be non-zero"));
        }
        if self.broadcast && (self.is_register() || self.count != 1) {
            return Err(Fault::config("stored scalar must be a single element"));
        }
        Ok(())
    }

    fn offset(&self, index: u64) -> i128 {
        let rows = self.row_len.map_or(0, |n| index / n.max(1));
        i128::from(index) * i128::from(self.stride) + i128::from(rows) * i128::from(self.skip)
    }

    /// Address of element `index`.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Access`] if the address falls below zero or the
    /// element would extend past the end of the address space.
    pub fn element_addr(&self, index: u64) -> Result<u64, Fault> {
        let addr = i128::from(self.base) + self.offset(index);
        let end = addr + i128::from(self.width);
        if addr < 0 || end > i128::from(u64::MAX) {
            return Err(Fault::Access {
                addr: self.base,
                len: self.width,
                reason: AccessReason::BadAddress,
            });
        }
        Ok(addr as u64)
    }

    /// Returns `true` if elements within a row are packed back to back in
    /// ascending order.
    pub const fn is_contiguous(&self) -> bool {
        self.stride == self.width as i64
    }

    /// Returns `true` if element addresses follow a single progression.
    pub fn is_linear(&self) -> bool {
        self.skip == 0 || self.row_len.is_none_or(|n| n >= self.count)
    }

    /// Elements from `index` to the end of its row, inclusive.
    pub fn row_remaining(&self, index: u64) -> u64 {
        match self.row_len {
            Some(n) if n > 0 && !self.is_linear() => n - index % n,
            _ => self.count.saturating_sub(index),
        }
    }

    /// Indices that hold the lowest and highest element addresses.
    fn extreme_indices(&self) -> [u64; 6] {
        let last = self.count.saturating_sub(1);
        match self.row_len {
            Some(n) if n > 0 && !self.is_linear() => {
                let full = self.count / n;
                let tail = full * n;
                [0, n - 1, (full - 1) * n, tail - 1, tail.min(last), last]
            }
            _ => [0, last, 0, 0, 0, last],
        }
    }

    /// Byte range `[start, end)` covering every representable element.
    ///
    /// Computed from the corner elements of the layout, so it costs the same
    /// for any count. Returns `None` when no element is representable.
    pub fn span(&self) -> Option<(u64, u64)> {
        let offsets = self.extreme_indices().map(|i| self.offset(i));
        let lo = offsets.iter().min().copied().unwrap_or(0) + i128::from(self.base);
        let hi = offsets.iter().max().copied().unwrap_or(0)
            + i128::from(self.base)
            + i128::from(self.width);
        let lo = lo.max(0);
        let hi = hi.min(i128::from(u64::MAX));
        (lo < hi).then_some((lo as u64, hi as u64))
    }

    /// Byte ranges of a linear layout in ascending address order, lazily.
    ///
    /// Elements whose address is unrepresentable are skipped; they fault
    /// when accessed.
    pub fn ascending_ranges(&self) -> impl Iterator<Item = (u64, u64)> {
        let descending = self.offset(1) < self.offset(0);
        let last = self.count.saturating_sub(1);
        (0..self.count)
            .map(move |k| if descending { last - k } else { k })
            .filter_map(|i| self.element_addr(i).ok())
            .map(|a| (a, a + self.width))
    }

    /// Byte ranges `[start, end)` of every element, sorted by start.
    ///
    /// Elements whose address is unrepresentable are skipped; they fault
    /// when accessed.
    pub fn byte_ranges(&self) -> Vec<(u64, u64)> {
        let mut ranges: Vec<(u64, u64)> = (0..self.count)
            .filter_map(|i| self.element_addr(i).ok())
            .map(|a| (a, a + self.width))
            .collect();
        ranges.sort_unstable();
        ranges
    }
}

/// The vector register file of one hardware thread.
#[derive(Clone, Debug)]
pub struct RegisterFile {
    regs: Vec<Option<VectorDescriptor>>,
}

impl RegisterFile {
    /// Creates `count` unconfigured registers.
    pub fn new(count: usize) -> Self {
        Self {
            regs: vec![None; count],
        }
    }

    /// Number of registers.
    pub fn len(&self) -> usize {
        self.regs.len()
    }

    /// Returns `true` if the file has no registers.
    pub fn is_empty(&self) -> bool {
        self.regs.is_empty()
    }

    /// Reads a configured register.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Configuration`] if `idx` is out of range or the
    /// register was never configured.
    pub fn get(&self, idx: usize) -> Result<&VectorDescriptor, Fault> {
        self.regs
            .get(idx)
            .ok_or_else(|| Fault::config(format!("vector register v{idx} does not exist")))?
            .as_ref()
            .ok_or_else(|| Fault::config(format!("vector register v{idx} is not configured")))
    }

    /// Reads a register that may be unconfigured.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Configuration`] if `idx` is out of range.
    pub fn peek(&self, idx: usize) -> Result<Option<&VectorDescriptor>, Fault> {
        self.regs
            .get(idx)
            .map(Option::as_ref)
            .ok_or_else(|| Fault::config(format!("vector register v{idx} does not exist")))
    }

    /// Replaces a register's descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Configuration`] if `idx` is out of range.
    pub fn set(&mut self, idx: usize, desc: VectorDescriptor) -> Result<(), Fault> {
        let slot = self
            .regs
            .get_mut(idx)
            .ok_or_else(|| Fault::config(format!("vector register v{idx} does not exist")))?;
        *slot = Some(desc);
        Ok(())
    }

    /// Copies every register, configured or not, for checkpointing.
    pub fn snapshot(&self) -> Vec<Option<VectorDescriptor>> {
        self.regs.clone()
    }
}
