//! Configuration Unit.
//!
//! Executes CONFIG instructions against the vector register file. There are
//! no memory requests; the new descriptor is validated in full before it
//! replaces the old one, so a faulting CONFIG leaves the register untouched.

use tracing::debug;

use crate::common::{Fault, Location};
use crate::core::arch::{ConfigKind, ConfigOp, RegisterFile, VectorDescriptor};

/// The Configuration Unit.
#[derive(Debug, Default)]
pub struct ConfigUnit;

impl ConfigUnit {
    /// Applies one CONFIG instruction.
    ///
    /// # Errors
    ///
    /// [`Fault::Configuration`] for an out-of-range register, an update of
    /// an unconfigured register, a register location given to a vector kind,
    /// or a descriptor that fails validation.
    pub fn execute(op: &ConfigOp, regs: &mut RegisterFile) -> Result<(), Fault> {
        let desc = match op.kind {
            ConfigKind::Vector {
                location,
                base,
                datatype,
                stride,
                count,
            } => {
                reject_register(location)?;
                VectorDescriptor::vector(location, base, datatype, stride, count)
            }
            ConfigKind::Address { base } => {
                let mut desc = *regs.get(op.dst)?;
                reject_register(desc.location)?;
                desc.base = base;
                desc
            }
            ConfigKind::Layout {
                location,
                stride,
                count,
            } => {
                reject_register(location)?;
                let mut desc = *regs.get(op.dst)?;
                reject_register(desc.location)?;
                desc.location = location;
                desc.stride = stride;
                desc.count = count;
                desc
            }
            ConfigKind::Matrix { row_len, skip } => {
                let desc = *regs.get(op.dst)?;
                reject_register(desc.location)?;
                desc.with_rows(row_len, skip)
            }
            ConfigKind::ScalarAt {
                location,
                base,
                datatype,
            } => {
                reject_register(location)?;
                VectorDescriptor::scalar_at(location, base, datatype)
            }
            ConfigKind::Scalar { value } => VectorDescriptor::scalar(value),
        };
        desc.validate()?;
        regs.set(op.dst, desc)?;
        debug!(reg = op.dst, ?desc, "configured");
        Ok(())
    }
}

fn reject_register(location: Location) -> Result<(), Fault> {
    if location == Location::Register {
        Err(Fault::config(
            "register location holds a scalar; configure it with a scalar",
        ))
    } else {
        Ok(())
    }
}
