//! One-shot countdown latch.
//!
//! The latch opens permanently once its count reaches zero: all current and
//! future waiters pass immediately from then on. There is no reset; for a
//! reusable rendezvous use [`Barrier`](crate::sync::Barrier).

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// One-shot gate that opens after a fixed number of completion signals.
#[derive(Debug)]
pub struct Latch {
    remaining: Mutex<usize>,
    cvar: Condvar,
}

impl Latch {
    /// Creates a latch that opens after `count` calls to
    /// [`count_down`](Self::count_down).
    ///
    /// A count of 0 constructs an already-open latch.
    #[must_use]
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            cvar: Condvar::new(),
        }
    }

    /// Returns the number of outstanding countdown signals.
    #[must_use]
    pub fn remaining(&self) -> usize {
        *self.remaining.lock().expect("latch lock poisoned")
    }

    /// Records one completion signal.
    ///
    /// Decrements the count while it is above zero; the call that reaches
    /// zero wakes all waiters permanently. Calls on an open latch are no-ops.
    pub fn count_down(&self) {
        let mut remaining = self.remaining.lock().expect("latch lock poisoned");
        if *remaining > 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.cvar.notify_all();
            }
        }
    }

    /// Blocks until the count reaches zero or the timeout elapses.
    ///
    /// Returns `true` once the latch is open, `false` on timeout. `None`
    /// blocks indefinitely. An open latch returns `true` immediately,
    /// forever.
    #[must_use]
    pub fn await_zero(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut remaining = self.remaining.lock().expect("latch lock poisoned");

        while *remaining > 0 {
            match deadline {
                None => {
                    remaining = self.cvar.wait(remaining).expect("latch lock poisoned");
                }
                Some(deadline) => {
                    let left = deadline.saturating_duration_since(Instant::now());
                    if left.is_zero() {
                        return false;
                    }
                    let (guard, _) = self
                        .cvar
                        .wait_timeout(remaining, left)
                        .expect("latch lock poisoned");
                    remaining = guard;
                }
            }
        }
        true
    }
}
