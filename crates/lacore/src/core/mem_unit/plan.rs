//! Element-to-request grouping.
//!
//! By default every element is its own request. With coalescing enabled, a
//! run of back-to-back ascending elements that stays inside one line and one
//! row becomes a single request.

use crate::common::Fault;
use crate::core::arch::VectorDescriptor;

/// A run of elements served by one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ElementGroup {
    /// Index of the first element.
    pub first: u64,
    /// Number of elements.
    pub count: u32,
    /// Address of the first element.
    pub addr: u64,
    /// Bytes covered.
    pub len: u64,
}

/// Groups elements starting at `first`, taking at most `limit` of them.
///
/// # Arguments
///
/// * `desc` - Operand layout.
/// * `first` - First element index to cover.
/// * `limit` - Upper bound on the group size (at least 1).
/// * `line` - Line size to coalesce within, or `None` for one element per request.
///
/// # Errors
///
/// Returns [`Fault::Access`] if element `first` has no representable address.
pub fn group_at(
    desc: &VectorDescriptor,
    first: u64,
    limit: u64,
    line: Option<u64>,
) -> Result<ElementGroup, Fault> {
    let addr = desc.element_addr(first)?;
    let mut group = ElementGroup {
        first,
        count: 1,
        addr,
        len: desc.width,
    };
    let Some(line) = line.filter(|l| *l > 0) else {
        return Ok(group);
    };
    if !desc.is_contiguous() {
        return Ok(group);
    }

    let line_of = |a: u64| a / line;
    let max = limit
        .min(desc.row_remaining(first))
        .min(u64::from(u32::MAX));
    while u64::from(group.count) < max {
        let next_last = (group.addr + group.len).checked_add(desc.width - 1);
        if next_last.is_none_or(|last| line_of(last) != line_of(addr)) {
            break;
        }
        group.count += 1;
        group.len += desc.width;
    }
    Ok(group)
}
