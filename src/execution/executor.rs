//! Executors offloaded work runs on, and the I/O-side offload predicate.
//!
//! # Responsibilities
//! - `Executor`: accept a task or reject it, never block the submitter
//! - `WorkerExecutor`: dedicated tokio runtime with named worker threads and a bound
//!   on queued + running tasks
//! - `RejectingExecutor`: stands in where nothing is ever offloaded
//! - `IoExecutor`: answers "should this request hop right now" at request time
//!
//! # Design Decisions
//! - Worker threads mark themselves in a thread-local, so `is_worker_thread` is a
//!   plain load and work already on a worker never hops again
//! - Saturation is reported as `ErrorKind::Rejected` at submit time

use std::cell::Cell;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::sync::Semaphore;

use crate::config::ExecutionConfig;
use crate::error::Error;

thread_local! {
    static WORKER_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Whether the calling thread belongs to a [`WorkerExecutor`].
pub fn is_worker_thread() -> bool {
    WORKER_THREAD.with(Cell::get)
}

/// Runs submitted tasks somewhere other than the caller.
pub trait Executor: Send + Sync {
    /// Schedule `task`. Fails with `ErrorKind::Rejected` when the executor cannot
    /// take more work.
    fn execute(&self, task: BoxFuture<'static, ()>) -> Result<(), Error>;
}

impl<E: Executor + ?Sized> Executor for Arc<E> {
    fn execute(&self, task: BoxFuture<'static, ()>) -> Result<(), Error> {
        (**self).execute(task)
    }
}

/// The I/O side's view of offloading.
pub trait IoExecutor: Send + Sync {
    /// Whether work reaching an offload boundary on the current thread should be
    /// moved to the worker executor.
    fn should_offload(&self) -> bool;
}

impl<E: IoExecutor + ?Sized> IoExecutor for Arc<E> {
    fn should_offload(&self) -> bool {
        (**self).should_offload()
    }
}

/// Offloads unless the current thread already is a worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadAwareIoExecutor;

impl IoExecutor for ThreadAwareIoExecutor {
    fn should_offload(&self) -> bool {
        !is_worker_thread()
    }
}

/// Offload predicate backed by a closure. See [`io_executor_fn`].
#[derive(Clone, Copy)]
pub struct FnIoExecutor<F> {
    predicate: F,
}

/// Build an [`IoExecutor`] from a predicate, e.g. one that checks executor load.
pub fn io_executor_fn<F>(predicate: F) -> FnIoExecutor<F>
where
    F: Fn() -> bool + Send + Sync,
{
    FnIoExecutor { predicate }
}

impl<F> IoExecutor for FnIoExecutor<F>
where
    F: Fn() -> bool + Send + Sync,
{
    fn should_offload(&self) -> bool {
        (self.predicate)()
    }
}

/// Executor for pipelines that never offload: every submission is rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct RejectingExecutor;

impl Executor for RejectingExecutor {
    fn execute(&self, _task: BoxFuture<'static, ()>) -> Result<(), Error> {
        Err(Error::rejected("no worker executor configured"))
    }
}

/// Bounded worker pool on its own multi-threaded tokio runtime.
pub struct WorkerExecutor {
    runtime: Option<Runtime>,
    handle: Handle,
    pending: Arc<Semaphore>,
    max_pending_tasks: usize,
}

impl WorkerExecutor {
    pub fn new(config: &ExecutionConfig) -> Result<Self, Error> {
        if config.worker_threads == 0 || config.max_pending_tasks == 0 {
            return Err(Error::illegal_configuration(
                "worker_threads and max_pending_tasks must be greater than 0",
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(config.worker_threads)
            .thread_name(config.worker_thread_name.clone())
            .on_thread_start(|| WORKER_THREAD.with(|flag| flag.set(true)))
            .enable_all()
            .build()
            .map_err(|e| Error::internal(format!("failed to start worker runtime: {e}")))?;

        tracing::info!(
            worker_threads = config.worker_threads,
            thread_name = %config.worker_thread_name,
            max_pending_tasks = config.max_pending_tasks,
            "Worker executor started"
        );

        Ok(Self {
            handle: runtime.handle().clone(),
            runtime: Some(runtime),
            pending: Arc::new(Semaphore::new(config.max_pending_tasks)),
            max_pending_tasks: config.max_pending_tasks,
        })
    }

    /// Tasks currently queued or running.
    pub fn pending_tasks(&self) -> usize {
        self.max_pending_tasks - self.pending.available_permits()
    }

    /// True when the next submission would be rejected.
    pub fn is_saturated(&self) -> bool {
        self.pending.available_permits() == 0
    }
}

impl Executor for WorkerExecutor {
    fn execute(&self, task: BoxFuture<'static, ()>) -> Result<(), Error> {
        let permit = self.pending.clone().try_acquire_owned().map_err(|_| {
            tracing::warn!(max_pending_tasks = self.max_pending_tasks, "Worker executor saturated");
            Error::rejected(format!(
                "worker executor has {} pending tasks",
                self.max_pending_tasks
            ))
        })?;

        self.handle.spawn(async move {
            let _permit = permit;
            task.await;
        });
        Ok(())
    }
}

impl Drop for WorkerExecutor {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for WorkerExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerExecutor")
            .field("pending_tasks", &self.pending_tasks())
            .field("max_pending_tasks", &self.max_pending_tasks)
            .finish()
    }
}
