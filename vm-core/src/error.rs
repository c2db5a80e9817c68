//! Error taxonomy for the soft-MMU / PMP core.
//!
//! Mirrors the propagation policy of the spec this core implements: most
//! conditions either retry transparently (TLB refill) or become a guest
//! [`crate::Fault`] reported through the host callback surface. What remains
//! here is what genuinely cannot be handled by retrying or raising a guest
//! exception — configuration mistakes and internal invariant violations.

use crate::{AccessType, Fault, GuestAddr};
use thiserror::Error;

/// Top-level error type returned by fallible core operations.
#[derive(Debug, Error)]
pub enum VmError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    #[error("internal invariant violated: {message}")]
    Internal { message: String },
}

/// Errors from the memory subsystem: TLB, soft-MMU engine, and PMP unit.
#[derive(Debug, Error)]
pub enum MemoryError {
    /// A guest access that must be reported to the guest as a fault. This is
    /// the channel the TLB refill / PMP query use to hand a denial back up
    /// to the engine; it is not swallowed anywhere in the core.
    #[error("guest fault: {0:?}")]
    GuestFault(Fault),

    /// `mmu_idx` outside the configured number of TLB columns.
    #[error("mmu index {index} out of range (max {max})")]
    InvalidMmuIndex { index: usize, max: usize },
}

impl MemoryError {
    pub fn page_fault(addr: GuestAddr, access_type: AccessType) -> Self {
        MemoryError::GuestFault(Fault::PageFault { addr, access_type })
    }

    pub fn access_fault(addr: GuestAddr, access_type: AccessType) -> Self {
        MemoryError::GuestFault(Fault::AccessFault { addr, access_type })
    }
}
