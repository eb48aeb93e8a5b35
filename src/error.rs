//! Error types and error handling strategy for Workloom.
//!
//! Error handling follows these principles:
//!
//! - Errors are explicit and typed (no stringly-typed errors)
//! - A failing task is captured on its own record, never propagated to
//!   sibling tasks or to the pool itself
//! - Timed-out waits report to the caller as a boolean or typed error,
//!   never silently swallowed
//!
//! Pool-level errors live here. Primitive-specific errors live with their
//! primitive (see [`crate::sync::AcquireTimeoutError`]).

use thiserror::Error;

use crate::registry::TaskId;

/// A boxed error produced by a unit of work.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors returned by [`WorkerPool`](crate::WorkerPool) operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The task id was never assigned by this pool.
    #[error("task {0} not found")]
    TaskNotFound(TaskId),

    /// The pool has been shut down and no longer accepts submissions.
    #[error("pool is shut down")]
    Closed,
}

/// The captured failure of a single task.
///
/// Stored on the failing task's record; sibling tasks and the pool are
/// unaffected.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The unit of work returned an error.
    #[error("task returned an error: {0}")]
    Failed(#[source] BoxError),

    /// The unit of work panicked; the payload message is captured.
    #[error("task panicked: {0}")]
    Panicked(String),
}
