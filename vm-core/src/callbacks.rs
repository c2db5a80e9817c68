//! Host-callback surface (component C1): the narrow set of capabilities the
//! core consumes from its embedder — bus I/O, logging, abort, tracing hooks.
//!
//! The original source declares these as weak-symbol externs with a default
//! implementation supplied by the library itself, so an embedder can
//! override only the ones it cares about. The idiomatic replacement is an
//! explicit capability trait with default method bodies: [`HostCallbacks`]
//! mirrors every declared hook, and [`NoopCallbacks`] reproduces the default
//! weak-symbol bodies (`abort` aborts the process, `log` goes through the
//! `log` crate, everything else no-ops or returns zero).

use crate::GuestAddr;

/// Distinguishes the kind of memory operation reported through
/// [`HostCallbacks::on_memory_access`], matching the trace categories of the
/// access engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAccessKind {
    IoRead,
    IoWrite,
    Read,
    Write,
    InsnFetch,
}

/// Capabilities a host embedder provides to the soft-MMU core. All methods
/// have a default implementation so an embedder implements only what it
/// needs; `vm-mem` is generic over any `impl HostCallbacks`.
pub trait HostCallbacks: Send + Sync {
    /// Bus read of `1 << width_shift` bytes at a resolved physical address.
    fn read_byte(&self, _addr: u64) -> u64 {
        0
    }
    fn read_word(&self, _addr: u64) -> u64 {
        0
    }
    fn read_double_word(&self, _addr: u64) -> u64 {
        0
    }
    fn read_quad_word(&self, _addr: u64) -> u64 {
        0
    }

    fn write_byte(&self, _addr: u64, _value: u64) {}
    fn write_word(&self, _addr: u64, _value: u64) {}
    fn write_double_word(&self, _addr: u64, _value: u64) {}
    fn write_quad_word(&self, _addr: u64, _value: u64) {}

    /// Writeback for an I/O slot tagged "not dirty": bypasses the generic
    /// bus write entirely.
    fn notdirty_write(&self, _addr: u64, _value: u64, _width: u8) {}

    /// Marks translated blocks covering `addr..addr+len` as needing
    /// re-translation. Called after every RAM store; the block cache and
    /// its dirty-set live entirely on the embedder's side.
    fn mark_dirty(&self, _addr: u64, _len: u8) {}

    /// Guest-fatal condition the core cannot recover from on its own.
    fn abort(&self, message: &str) -> ! {
        eprintln!("vm-mem: abort: {message}");
        std::process::abort();
    }

    fn log(&self, level: log::Level, message: &str) {
        log::log!(level, "{message}");
    }

    /// Host-provided scratch allocation. Folds the source's separate
    /// `malloc`/`realloc`/`free` triplet into Rust ownership: the returned
    /// buffer is freed automatically when dropped.
    fn host_alloc(&self, size: usize) -> Vec<u8> {
        vec![0u8; size]
    }

    fn host_realloc(&self, mut buf: Vec<u8>, new_size: usize) -> Vec<u8> {
        buf.resize(new_size, 0);
        buf
    }

    fn get_cpu_index(&self) -> i32 {
        0
    }

    fn guest_offset_to_host_ptr(&self, _offset: u64) -> Option<u64> {
        None
    }

    fn host_ptr_to_guest_offset(&self, _ptr: u64) -> u64 {
        0
    }

    /// Reports an access-fault or page-fault raised by the refill path or a
    /// PMP denial, for the embedder to turn into a guest trap.
    fn mmu_fault_external_handler(&self, _addr: GuestAddr, _access_type: i32, _window_index: i32) {}

    fn invalidate_tb_in_other_cpus(&self, _start: u64, _end: u64) {}

    fn update_instruction_counter(&self, _value: i32) {}

    fn get_instruction_count(&self) -> u64 {
        0
    }

    fn get_pending_interrupt(&self) -> i32 {
        -1
    }

    fn on_translation_block_find_slow(&self, _pc: u64) {}
    fn on_block_begin(&self, _address: u64, _size: u32) -> u32 {
        0
    }
    fn on_block_finished(&self, _pc: u64, _executed_instructions: u32) {}
    fn on_translation_cache_size_change(&self, _new_size: u64) {}

    fn on_interrupt_begin(&self, _exception_index: u64) {}
    fn on_interrupt_end(&self, _exception_index: u64) {}

    fn profiler_announce_stack_change(
        &self,
        _current_address: u64,
        _return_address: u64,
        _instructions_count: u64,
        _is_frame_add: bool,
    ) {
    }
    fn profiler_announce_context_change(&self, _context_id: u64) {}

    /// Whether [`Self::on_memory_access`] should be called at all; checked
    /// before every trace point so a host that doesn't care pays only a
    /// branch, not a virtual call.
    fn memory_access_tracing_enabled(&self) -> bool {
        false
    }
    fn on_memory_access(&self, _pc: u64, _kind: MemoryAccessKind, _addr: u64) {}

    fn is_in_debug_mode(&self) -> bool {
        false
    }

    /// x86 port-I/O trampolines (component C6).
    fn read_byte_from_port(&self, _port: u16) -> u8 {
        0
    }
    fn read_word_from_port(&self, _port: u16) -> u16 {
        0
    }
    fn read_double_word_from_port(&self, _port: u16) -> u32 {
        0
    }
    fn write_byte_to_port(&self, _port: u16, _value: u8) {}
    fn write_word_to_port(&self, _port: u16, _value: u16) {}
    fn write_double_word_to_port(&self, _port: u16, _value: u32) {}
}

/// All-default implementation, equivalent to never overriding any weak
/// symbol in the source.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCallbacks;

impl HostCallbacks for NoopCallbacks {}
