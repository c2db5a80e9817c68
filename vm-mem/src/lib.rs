//! Guest-memory access core: a software-managed TLB (component C2), the
//! fast/slow soft-MMU access engine that consumes it (C3), the RISC-V
//! Physical Memory Protection unit consulted by the refill path (C4), the
//! process-wide memory lock serialising accesses across harts (C5), and the
//! x86 port-I/O trampolines (C6).
//!
//! Everything here is generic over `H: HostCallbacks` from `vm-core`; the
//! code generator, block translator, instruction decoders and device bus are
//! external collaborators reached only through that trait.

pub mod config;
pub mod lock;
pub mod pmp;
pub mod portio;
pub mod softmmu;
pub mod tlb;

pub use config::{PmpConfig, SoftMmuConfig};
pub use lock::GlobalMemoryLock;
pub use pmp::{PmpAccess, PmpAddressMode, PmpRegisterFile};
pub use softmmu::{Endian, RefillOutcome, SoftMmu, TlbFiller, Width};
pub use tlb::{TlbEntry, TlbTable};

/// Guest page size in bytes. The spec's non-goals exclude huge pages, so
/// this is the only granularity the TLB and PMP interval math need to know.
pub const PAGE_SHIFT: u32 = 12;
pub const PAGE_SIZE: u64 = 1 << PAGE_SHIFT;
pub const PAGE_MASK: u64 = !(PAGE_SIZE - 1);

/// Default number of TLB columns (mmu indices): distinguishes privilege
/// levels / address spaces. Callers needing more pass a different count to
/// [`SoftMmu::new`].
pub const DEFAULT_MMU_IDX_COUNT: usize = 4;

/// Entries per TLB column. Must be a power of two; the page-slot index is
/// computed by masking, not modulo.
pub const TLB_SIZE: usize = 256;

/// Number of hardware-wired RISC-V PMP entries.
pub const MAX_RISCV_PMPS: usize = 16;

/// `IO_MEM_NOTDIRTY >> IO_MEM_SHIFT`: the one designated region-table index
/// that bypasses the generic bus write in favour of the notdirty hook.
pub const IO_MEM_SHIFT: u32 = 4;
pub const IO_MEM_NB_ENTRIES: usize = 1 << IO_MEM_SHIFT;
pub const IO_MEM_NOTDIRTY_INDEX: u64 = 1;
