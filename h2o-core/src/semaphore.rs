//! Counting semaphore for OS threads.
//!
//! Unlike a `MutexGuard`, a permit is not tied to the thread that took it:
//! one thread may `acquire` and another `release`. The admission gate relies
//! on exactly that hand-off.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

/// Counting semaphore built on a mutex-protected counter and a condvar.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

impl Semaphore {
    /// Create a semaphore holding `permits` permits.
    pub const fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    /// Block until a permit is available, then take it.
    pub fn acquire(&self) {
        let mut permits = self.lock();
        while *permits == 0 {
            permits = self
                .available
                .wait(permits)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *permits -= 1;
    }

    /// Take a permit if one is available without blocking.
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.lock();
        if *permits == 0 {
            return false;
        }
        *permits -= 1;
        true
    }

    /// Return one permit, waking one blocked thread if any.
    pub fn release(&self) {
        *self.lock() += 1;
        self.available.notify_one();
    }

    /// Number of permits currently available.
    pub fn available_permits(&self) -> usize {
        *self.lock()
    }

    // The counter is a plain integer, always valid even if a holder panicked.
    fn lock(&self) -> MutexGuard<'_, usize> {
        self.permits.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
