//! Counting semaphore bounding concurrent access to a resource.
//!
//! `acquire` blocks while no permits are available; `release` returns one
//! permit and wakes a waiter. The scoped form hands out an RAII
//! [`SemaphorePermit`] that releases on drop, so a permit cannot leak across
//! an early return or unwind.
//!
//! # Over-release
//!
//! There is no upper-bound enforcement: calling [`Semaphore::release`] more
//! times than permits were acquired raises the permit count past the
//! constructed ceiling. Keeping acquire/release balanced is the caller's
//! responsibility; the semaphore does not correct an imbalance silently.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Error returned when a scoped acquire does not succeed within its bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquireTimeoutError;

impl std::fmt::Display for AcquireTimeoutError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "semaphore acquire timed out")
    }
}

impl std::error::Error for AcquireTimeoutError {}

/// A counting semaphore for limiting concurrent access.
#[derive(Debug)]
pub struct Semaphore {
    permits: Mutex<usize>,
    cvar: Condvar,
}

impl Semaphore {
    /// Creates a semaphore with the given number of initial permits.
    #[must_use]
    pub fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            cvar: Condvar::new(),
        }
    }

    /// Returns the number of currently available permits.
    #[must_use]
    pub fn available_permits(&self) -> usize {
        *self.permits.lock().expect("semaphore lock poisoned")
    }

    /// Acquires one permit without waiting.
    ///
    /// Returns `false` if no permit is available.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let mut permits = self.permits.lock().expect("semaphore lock poisoned");
        if *permits > 0 {
            *permits -= 1;
            true
        } else {
            false
        }
    }

    /// Acquires one permit, blocking while none are available.
    ///
    /// Returns `true` once a permit was taken, `false` if the timeout
    /// elapsed first. `None` blocks indefinitely.
    #[must_use]
    pub fn acquire(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut permits = self.permits.lock().expect("semaphore lock poisoned");

        while *permits == 0 {
            match deadline {
                None => {
                    permits = self.cvar.wait(permits).expect("semaphore lock poisoned");
                }
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        return false;
                    }
                    let (guard, _) = self
                        .cvar
                        .wait_timeout(permits, remaining)
                        .expect("semaphore lock poisoned");
                    permits = guard;
                }
            }
        }
        *permits -= 1;
        true
    }

    /// Releases one permit and wakes a waiter.
    ///
    /// Unbalanced releases raise the permit count past the constructed
    /// ceiling; see the module docs.
    pub fn release(&self) {
        let mut permits = self.permits.lock().expect("semaphore lock poisoned");
        *permits += 1;
        self.cvar.notify_one();
    }

    /// Acquires a permit that is released when the returned guard is
    /// dropped.
    ///
    /// Fails with [`AcquireTimeoutError`] if no permit became available
    /// within the bound.
    pub fn acquire_scoped(
        &self,
        timeout: Option<Duration>,
    ) -> Result<SemaphorePermit<'_>, AcquireTimeoutError> {
        if self.acquire(timeout) {
            Ok(SemaphorePermit { semaphore: self })
        } else {
            Err(AcquireTimeoutError)
        }
    }
}

/// A permit held from a [`Semaphore`]; released back on drop.
#[derive(Debug)]
#[must_use = "permit is released immediately if not held"]
pub struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        self.semaphore.release();
    }
}
