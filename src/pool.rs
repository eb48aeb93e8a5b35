//! Worker pool for executing submitted units of work on OS threads.
//!
//! The pool owns a fixed set of named worker threads. Submitted closures are
//! queued on a lock-free queue; idle workers park on a condition variable and
//! are woken on submission, so there is no spin-polling for work.
//!
//! # Task Lifecycle
//!
//! Every submission allocates a sequential [`TaskId`] and an `Idle` record in
//! the pool's [`TaskRegistry`]. Immediately before invocation the record
//! moves to `Running`; on return it settles as `Terminated` with the result,
//! or `Failed` with the captured error or panic. Failures are logged and
//! never affect sibling tasks or the pool itself.
//!
//! # Shutdown
//!
//! [`WorkerPool::shutdown`] stops new submissions. With `wait == true` it
//! drains all queued and in-flight work and joins the workers before
//! returning; with `wait == false` it returns immediately while workers run
//! the remaining work to completion. Running closures are never interrupted.
//! Dropping the pool performs `shutdown(true)`, so a pool owned by a scope is
//! always drained when control leaves the scope, including on unwind.
//!
//! # Example
//!
//! ```
//! use workloom::WorkerPool;
//!
//! let pool: WorkerPool<String> = WorkerPool::new();
//! let id = pool.submit(|| Ok("done".to_string())).unwrap();
//! pool.shutdown(true);
//! assert_eq!(pool.get(id).unwrap().result.as_deref().map(String::as_str), Some("done"));
//! ```

use crossbeam_queue::SegQueue;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::{BoxError, PoolError, TaskError};
use crate::registry::{TaskId, TaskRegistry, TaskSnapshot};

/// A queued unit of work: a parameterless closure capturing whatever state
/// it needs.
type TaskFn<T> = Box<dyn FnOnce() -> Result<T, BoxError> + Send + 'static>;

struct QueuedTask<T> {
    id: TaskId,
    work: TaskFn<T>,
}

/// Configuration options for the worker pool.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Number of worker threads. `None` uses the machine's available
    /// parallelism.
    pub workers: Option<usize>,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            workers: None,
            thread_name_prefix: "workloom".to_string(),
        }
    }
}

impl PoolOptions {
    fn resolved_workers(&self) -> usize {
        match self.workers {
            Some(count) => {
                assert!(count > 0, "worker count must be at least 1");
                count
            }
            None => thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
        }
    }
}

struct PoolInner<T> {
    /// Per-task records; the only pool-internal shared mutable state.
    registry: TaskRegistry<T>,
    /// Work queue.
    queue: SegQueue<QueuedTask<T>>,
    /// Number of queued tasks not yet picked up by a worker.
    pending_count: AtomicUsize,
    /// Shutdown flag; set once, never cleared.
    shutdown: AtomicBool,
    /// Mutex for the worker-parking condition variable.
    park_mutex: Mutex<()>,
    /// Condition variable idle workers park on.
    park_cvar: Condvar,
}

impl<T> PoolInner<T> {
    /// Sets the shutdown flag and wakes every parked worker.
    ///
    /// Flag-set is serialized with `submit`'s closed-check under the park
    /// mutex: a submission that observed the pool open has already pushed
    /// its task by the time the flag becomes visible, so draining workers
    /// cannot miss it.
    fn close(&self) {
        let _guard = self.park_mutex.lock().expect("pool park lock poisoned");
        self.shutdown.store(true, Ordering::Release);
        self.park_cvar.notify_all();
    }
}

/// A bounded pool of worker threads with per-task lifecycle tracking.
///
/// `T` is the output type of submitted units of work. Tasks producing
/// heterogeneous outputs can use an enum or a boxed trait object for `T`.
pub struct WorkerPool<T> {
    inner: Arc<PoolInner<T>>,
    worker_count: usize,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T> std::fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field(
                "pending_tasks",
                &self.inner.pending_count.load(Ordering::Relaxed),
            )
            .field("submitted_tasks", &self.inner.registry.len())
            .field("shutdown", &self.inner.shutdown.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T: Send + Sync + 'static> Default for WorkerPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + Sync + 'static> WorkerPool<T> {
    /// Creates a pool with default options (one worker per available core).
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(PoolOptions::default())
    }

    /// Creates a pool with the given options, spawning all workers eagerly.
    ///
    /// # Panics
    ///
    /// Panics if `options.workers` is `Some(0)`.
    #[must_use]
    pub fn with_options(options: PoolOptions) -> Self {
        let worker_count = options.resolved_workers();

        let inner = Arc::new(PoolInner {
            registry: TaskRegistry::new(),
            queue: SegQueue::new(),
            pending_count: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            park_mutex: Mutex::new(()),
            park_cvar: Condvar::new(),
        });

        let workers = (0..worker_count)
            .map(|slot| {
                let inner = Arc::clone(&inner);
                let name = format!("{}-worker-{slot}", options.thread_name_prefix);
                thread::Builder::new()
                    .name(name)
                    .spawn(move || worker_loop(&inner))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        Self {
            inner,
            worker_count,
            workers: Mutex::new(workers),
        }
    }

    /// Submits a unit of work for asynchronous execution.
    ///
    /// Returns the task's sequential id immediately; never blocks on the
    /// task's completion. Fails with [`PoolError::Closed`] after shutdown.
    pub fn submit<F>(&self, work: F) -> Result<TaskId, PoolError>
    where
        F: FnOnce() -> Result<T, BoxError> + Send + 'static,
    {
        // Closed-check and push are one critical section under the park
        // mutex, serialized against `shutdown` setting the flag: once a
        // submission returns `Ok`, its task is visible to every draining
        // worker.
        let guard = self.inner.park_mutex.lock().expect("pool park lock poisoned");
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(PoolError::Closed);
        }

        let id = self.inner.registry.allocate();
        self.inner.queue.push(QueuedTask {
            id,
            work: Box::new(work),
        });
        self.inner.pending_count.fetch_add(1, Ordering::Relaxed);
        self.inner.park_cvar.notify_one();
        drop(guard);

        tracing::trace!(task = %id, "task submitted");
        Ok(id)
    }

    /// Read-only lookup of one task record.
    pub fn get(&self, id: TaskId) -> Result<TaskSnapshot<T>, PoolError> {
        self.inner.registry.snapshot(id)
    }

    /// Snapshots of all tasks currently `Running`, in no particular order.
    ///
    /// The snapshot may be stale by the time the caller observes it.
    #[must_use]
    pub fn list_running(&self) -> Vec<TaskSnapshot<T>> {
        self.inner.registry.running()
    }

    /// Blocks until the task settles (`Terminated` or `Failed`) or the
    /// timeout elapses.
    ///
    /// Returns `Ok(true)` if the task settled, `Ok(false)` on timeout.
    /// `None` blocks indefinitely. Fails with [`PoolError::TaskNotFound`]
    /// for an id this pool never issued.
    pub fn await_task(&self, id: TaskId, timeout: Option<Duration>) -> Result<bool, PoolError> {
        self.inner.registry.await_settled(id, timeout)
    }

    /// Number of worker threads.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of queued tasks not yet picked up by a worker.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending_count.load(Ordering::Relaxed)
    }

    /// Returns true once [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Stops accepting new submissions.
    ///
    /// With `wait == true`, blocks until all queued and in-flight tasks have
    /// settled and every worker has been joined. With `wait == false`,
    /// returns immediately; workers drain the remaining work and exit on
    /// their own. Running closures are never interrupted. Idempotent.
    pub fn shutdown(&self, wait: bool) {
        self.inner.close();

        if wait {
            self.join_workers();
        }
    }

    fn join_workers(&self) {
        // Held across the joins: a concurrent `shutdown(true)` caller
        // blocks here and returns only once every worker has exited.
        let mut workers = self.workers.lock().expect("pool worker list poisoned");
        for handle in workers.drain(..) {
            // Worker bodies never panic: task panics are caught and settled.
            let _ = handle.join();
        }
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        self.inner.close();
        let workers = self
            .workers
            .get_mut()
            .map(std::mem::take)
            .unwrap_or_default();
        for handle in workers {
            let _ = handle.join();
        }
    }
}

/// The run loop executed by every worker thread.
///
/// Pops tasks until the queue is empty and shutdown has been requested.
/// Parks on the pool condvar while idle; the emptiness re-check under the
/// park mutex pairs with `notify_one` taking the same mutex, so a submission
/// racing a worker going idle cannot lose its wakeup.
fn worker_loop<T>(inner: &PoolInner<T>) {
    loop {
        if let Some(task) = inner.queue.pop() {
            inner.pending_count.fetch_sub(1, Ordering::Relaxed);
            execute_task(inner, task);
            continue;
        }

        if inner.shutdown.load(Ordering::Acquire) {
            // A submission serialized before the flag-set may have pushed
            // between our empty pop and the flag load; re-verify emptiness
            // under the park mutex before exiting.
            let _guard = inner.park_mutex.lock().expect("pool park lock poisoned");
            if !inner.queue.is_empty() {
                continue;
            }
            tracing::debug!("worker exiting after drain");
            break;
        }

        let guard = inner.park_mutex.lock().expect("pool park lock poisoned");
        if !inner.queue.is_empty() || inner.shutdown.load(Ordering::Acquire) {
            continue;
        }
        let _unused = inner
            .park_cvar
            .wait(guard)
            .expect("pool park lock poisoned");
    }
}

fn execute_task<T>(inner: &PoolInner<T>, task: QueuedTask<T>) {
    let id = task.id;
    inner.registry.mark_running(id);
    tracing::trace!(task = %id, "task running");

    let work = task.work;
    match panic::catch_unwind(AssertUnwindSafe(work)) {
        Ok(Ok(value)) => {
            inner.registry.settle(id, Ok(value));
            tracing::trace!(task = %id, "task terminated");
        }
        Ok(Err(error)) => {
            tracing::error!(task = %id, error = %error, "task returned an error");
            inner.registry.settle(id, Err(TaskError::Failed(error)));
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(task = %id, panic = %message, "task panicked");
            inner.registry.settle(id, Err(TaskError::Panicked(message)));
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}
