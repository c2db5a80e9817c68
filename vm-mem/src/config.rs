//! Startup configuration for a [`crate::SoftMmu`].
//!
//! The source selects most of this at compile time (`TARGET_WORDS_BIGENDIAN`,
//! `ALIGNED_ONLY`, `TARGET_RISCV32`/`TARGET_RISCV64`, `DEBUG_PMP`) via
//! preprocessor macros, one binary per guest target. A library that embeds
//! several guest configurations in one process needs these as runtime
//! values instead; this struct collects them in one place with the
//! guest's defaults (little-endian, unaligned accesses permitted, RV64,
//! priv-architecture >= 1.11) so an embedder only overrides what differs.

use crate::softmmu::Endian;
use crate::pmp::GuestWordWidth;
use crate::DEFAULT_MMU_IDX_COUNT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftMmuConfig {
    pub ram_size: usize,
    pub mmu_idx_count: usize,
    pub endian: Endian,
    /// `ALIGNED_ONLY`: traps misaligned same-page RAM accesses instead of
    /// serving them directly.
    pub aligned_only: bool,
}

impl Default for SoftMmuConfig {
    fn default() -> Self {
        SoftMmuConfig {
            ram_size: 0,
            mmu_idx_count: DEFAULT_MMU_IDX_COUNT,
            endian: Endian::Little,
            aligned_only: false,
        }
    }
}

impl SoftMmuConfig {
    pub fn with_ram_size(mut self, ram_size: usize) -> Self {
        self.ram_size = ram_size;
        self
    }

    pub fn with_mmu_idx_count(mut self, count: usize) -> Self {
        self.mmu_idx_count = count;
        self
    }

    pub fn with_endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    pub fn with_aligned_only(mut self, aligned_only: bool) -> Self {
        self.aligned_only = aligned_only;
        self
    }
}

/// Companion configuration for [`crate::pmp::PmpRegisterFile`]: the guest
/// word width (selects `pmpcfg` CSR packing) and whether the priv
/// architecture version makes the NAPOT grain sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PmpConfig {
    pub word: GuestWordWidth,
    pub priv_1_11_or_later: bool,
}

impl Default for PmpConfig {
    fn default() -> Self {
        PmpConfig {
            word: GuestWordWidth::Word64,
            priv_1_11_or_later: true,
        }
    }
}
