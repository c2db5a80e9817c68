//! Shared types for the soft-MMU / PMP core: guest address newtypes, the
//! access-type and fault vocabulary, the layered error taxonomy and the
//! host-callback capability surface consumed by `vm-mem`.

pub mod callbacks;
pub mod error;

pub use callbacks::{HostCallbacks, NoopCallbacks};
pub use error::{CoreError, MemoryError, VmError};

use std::fmt;
use std::ops::{Add, AddAssign, BitAnd, Rem, Shr, Sub};

/// A guest virtual address as seen by translated guest code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GuestAddr(pub u64);

impl GuestAddr {
    pub fn wrapping_add(self, rhs: u64) -> Self {
        GuestAddr(self.0.wrapping_add(rhs))
    }

    pub fn wrapping_sub(self, rhs: u64) -> Self {
        GuestAddr(self.0.wrapping_sub(rhs))
    }
}

impl BitAnd<u64> for GuestAddr {
    type Output = GuestAddr;
    fn bitand(self, rhs: u64) -> GuestAddr {
        GuestAddr(self.0 & rhs)
    }
}

impl BitAnd for &GuestAddr {
    type Output = u64;
    fn bitand(self, rhs: &GuestAddr) -> u64 {
        self.0 & rhs.0
    }
}

impl Rem<u64> for GuestAddr {
    type Output = u64;
    fn rem(self, rhs: u64) -> u64 {
        self.0 % rhs
    }
}

impl Sub for GuestAddr {
    type Output = u64;
    fn sub(self, rhs: GuestAddr) -> u64 {
        self.0 - rhs.0
    }
}

impl Add<u64> for GuestAddr {
    type Output = GuestAddr;
    fn add(self, rhs: u64) -> GuestAddr {
        GuestAddr(self.0 + rhs)
    }
}

impl AddAssign<u64> for GuestAddr {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl Shr<u32> for GuestAddr {
    type Output = u64;
    fn shr(self, rhs: u32) -> u64 {
        self.0 >> rhs
    }
}

impl fmt::LowerHex for GuestAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

/// A guest physical address, produced by translation or used directly when
/// PMP/TLB run in bare (no-paging) mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GuestPhysAddr(pub u64);

impl Add<u64> for GuestPhysAddr {
    type Output = GuestPhysAddr;
    fn add(self, rhs: u64) -> GuestPhysAddr {
        GuestPhysAddr(self.0 + rhs)
    }
}

impl AddAssign<u64> for GuestPhysAddr {
    fn add_assign(&mut self, rhs: u64) {
        self.0 += rhs;
    }
}

impl Shr<u64> for GuestPhysAddr {
    type Output = u64;
    fn shr(self, rhs: u64) -> u64 {
        self.0 >> rhs
    }
}

impl From<GuestAddr> for GuestPhysAddr {
    fn from(a: GuestAddr) -> Self {
        GuestPhysAddr(a.0)
    }
}

impl From<GuestPhysAddr> for GuestAddr {
    fn from(a: GuestPhysAddr) -> Self {
        GuestAddr(a.0)
    }
}

/// A resolved host pointer: `guest_addr + addend`, valid for a raw load/store
/// of up to the TLB entry's page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostAddr(pub u64);

/// The kind of access a guest memory operation represents. Drives PMP
/// permission masking and TLB column selection (`mmu_idx` picks the
/// privilege/address-space column; `AccessType` picks the field within it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessType {
    Read,
    Write,
    Execute,
}

impl AccessType {
    /// Matches the `access_type` convention of the `tlb_fill` contract:
    /// 0 = read, 1 = write, 2 = code.
    pub fn as_refill_code(self) -> i32 {
        match self {
            AccessType::Read => 0,
            AccessType::Write => 1,
            AccessType::Execute => 2,
        }
    }
}

/// Guest-visible faults the surrounding translator raises in response to a
/// failed refill or a permission violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    PageFault {
        addr: GuestAddr,
        access_type: AccessType,
    },
    AccessFault {
        addr: GuestAddr,
        access_type: AccessType,
    },
    AlignmentFault {
        addr: GuestAddr,
        width: u8,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guest_addr_arithmetic() {
        let a = GuestAddr(0x1000);
        assert_eq!((a + 0x10).0, 0x1010);
        assert_eq!(a & 0xff, GuestAddr(0));
        assert_eq!(a % 0x1000, 0);
    }

    #[test]
    fn guest_addr_wrapping() {
        let a = GuestAddr(u64::MAX);
        assert_eq!(a.wrapping_add(1), GuestAddr(0));
    }

    #[test]
    fn access_type_refill_code() {
        assert_eq!(AccessType::Read.as_refill_code(), 0);
        assert_eq!(AccessType::Write.as_refill_code(), 1);
        assert_eq!(AccessType::Execute.as_refill_code(), 2);
    }

    #[test]
    fn guest_phys_addr_conversion() {
        let va = GuestAddr(0x4000);
        let pa: GuestPhysAddr = va.into();
        assert_eq!(pa, GuestPhysAddr(0x4000));
        let back: GuestAddr = pa.into();
        assert_eq!(back, va);
    }

    mod address_proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn guest_phys_addr_roundtrip_is_lossless(raw in any::<u64>()) {
                let va = GuestAddr(raw);
                let pa: GuestPhysAddr = va.into();
                let back: GuestAddr = pa.into();
                prop_assert_eq!(back, va);
            }

            #[test]
            fn wrapping_add_matches_u64_wrapping_add(base in any::<u64>(), delta in any::<u64>()) {
                let a = GuestAddr(base).wrapping_add(delta);
                prop_assert_eq!(a.0, base.wrapping_add(delta));
            }
        }
    }
}
