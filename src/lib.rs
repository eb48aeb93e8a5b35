//! Workloom: a managed worker pool with task lifecycle tracking, plus
//! blocking synchronization primitives built on raw locks and wait
//! conditions.
//!
//! # Overview
//!
//! The crate has two halves:
//!
//! - [`WorkerPool`]: a bounded set of OS worker threads. Submitted units of
//!   work are tracked through an explicit state machine
//!   (`Idle -> Running -> Terminated | Failed`) in a [`TaskRegistry`], and
//!   callers observe progress through read-only [`TaskSnapshot`]s keyed by
//!   [`TaskId`]. A failing task never takes down the pool or its siblings.
//! - [`sync`]: standalone coordination primitives: a cyclic [`Barrier`],
//!   a counting [`Semaphore`] with an RAII scoped permit, and a one-shot
//!   countdown [`Latch`]. Each owns its own mutex/condvar pair and has no
//!   dependency on the pool; tasks may freely share them by `Arc`.
//!
//! # Core Guarantees
//!
//! - **Stable ids**: task ids are assigned sequentially in submission order
//!   and never reused for the pool's lifetime.
//! - **Isolation**: a task that returns an error or panics is recorded as
//!   `Failed` on its own record and logged; sibling tasks and the pool keep
//!   running.
//! - **No busy polling**: every blocking operation (`await_task`,
//!   `Barrier::wait`, `Semaphore::acquire`, `Latch::await_zero`) parks on a
//!   condition variable and is woken on state change, with an optional
//!   caller-supplied timeout.
//! - **Scoped shutdown**: dropping a [`WorkerPool`] drains in-flight work and
//!   joins its workers, so a pool owned by a scope is always cleaned up,
//!   including on unwind.
//!
//! # Example
//!
//! ```
//! use workloom::{PoolOptions, WorkerPool};
//!
//! let pool: WorkerPool<u64> = WorkerPool::with_options(PoolOptions {
//!     workers: Some(2),
//!     ..PoolOptions::default()
//! });
//!
//! let id = pool.submit(|| Ok(41 + 1)).expect("pool accepting work");
//! assert!(pool.await_task(id, None).expect("known id"));
//! let snapshot = pool.get(id).expect("known id");
//! assert_eq!(snapshot.result.as_deref(), Some(&42));
//! pool.shutdown(true);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod pool;
pub mod registry;
pub mod sync;
pub mod test_utils;

pub use error::{PoolError, TaskError};
pub use pool::{PoolOptions, WorkerPool};
pub use registry::{TaskId, TaskRegistry, TaskSnapshot, TaskState};
pub use sync::{AcquireTimeoutError, Barrier, Latch, Semaphore, SemaphorePermit};
