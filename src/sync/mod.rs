//! Blocking synchronization primitives built on raw locks and wait
//! conditions.
//!
//! # Primitives
//!
//! - [`Barrier`]: N-way rendezvous, reusable across rounds
//! - [`Semaphore`]: counting semaphore with an RAII scoped permit
//! - [`Latch`]: one-shot countdown gate
//!
//! Each primitive owns its own mutex/condvar pair and is safe for
//! concurrent use by multiple threads. None of them depend on the worker
//! pool; tasks share them by `Arc`. All waits take an optional timeout;
//! `None` blocks indefinitely, and a timed-out wait is always reported to
//! the caller (boolean result or typed error), never swallowed.
//!
//! The primitives are not reentrant: a thread must not re-enter the same
//! barrier round before the previous round has fully drained, nor await a
//! latch that it alone must count down.

mod barrier;
mod latch;
mod semaphore;

pub use barrier::Barrier;
pub use latch::Latch;
pub use semaphore::{AcquireTimeoutError, Semaphore, SemaphorePermit};
