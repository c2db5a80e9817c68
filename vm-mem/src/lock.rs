//! Component C5: the global memory lock.
//!
//! A single process-wide mutual exclusion token, acquired on entry to every
//! public load/store of the access engine and released on every exit path.
//! It serialises concurrent harts' memory operations for dirty-page
//! tracking and I/O callback atomicity — it is not a substitute for
//! guest-visible memory-ordering semantics, which the architecture
//! front-ends produce via explicit barriers.
//!
//! The source acquires this with an unwinding contract (the refill path can
//! longjmp out mid-access, and the lock must still be released). The
//! `parking_lot::Mutex` guard's `Drop` gives the same guarantee for free
//! under Rust's own unwinding, with no poisoning to thread through callers.

use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// Cheaply cloneable: the engine's public entry points clone the handle
/// before acquiring it, so the returned guard's lifetime is independent of
/// any `&mut self` borrow the rest of the call needs (the access engine
/// recurses into itself for page-spanning loads/stores while the lock is
/// held, which a guard borrowed straight from a struct field would not
/// allow).
#[derive(Clone)]
pub struct GlobalMemoryLock {
    inner: Arc<Mutex<()>>,
}

impl GlobalMemoryLock {
    pub fn new() -> Self {
        GlobalMemoryLock {
            inner: Arc::new(Mutex::new(())),
        }
    }

    /// Acquire the lock for the duration of one guest memory access. The
    /// returned guard releases it on drop, including during a panic unwind.
    pub fn acquire(&self) -> MutexGuard<'_, ()> {
        self.inner.lock()
    }
}

impl Default for GlobalMemoryLock {
    fn default() -> Self {
        Self::new()
    }
}
