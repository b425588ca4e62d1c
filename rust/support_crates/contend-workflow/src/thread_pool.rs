//! Fixed-size thread pool implementation for concurrent task execution.
//!
//! All worker threads are spawned when the pool is built and live until the pool
//! is shut down. Work items are executed in a fire-and-forget manner; a task that
//! must report back carries its own result channel.
//!
//! ## Shutdown
//!
//! - [`ThreadPool::shutdown`] is graceful: no new work is accepted, already queued
//!   and running work is allowed to finish, then the threads exit.
//! - [`ThreadPool::shutdown_now`] is forced: no new work is accepted and queued work
//!   that has not started yet is discarded. Work that is already running cannot be
//!   preempted; its thread exits as soon as the work returns.
//!
//! Dropping the last handle to a pool performs a graceful shutdown.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
};

use contend_common::{Result, error::Error};

use crate::task_queue::TaskQueue;

/// A boxed function that can be executed by a worker thread.
type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// A fixed-size thread pool.
///
/// ## Cloning
///
/// `ThreadPool` implements [`Clone`] and all clones share the same underlying
/// threads. Shutting down any clone shuts down the pool for all of them.
///
/// ## Thread Safety
///
/// All methods on `ThreadPool` are thread-safe and can be called concurrently
/// from multiple threads.
#[derive(Clone)]
pub struct ThreadPool(Arc<PoolShared>);

struct PoolShared {
    queue: Arc<TaskQueue<TaskFn>>,
}

impl Drop for PoolShared {
    fn drop(&mut self) {
        self.queue.close();
    }
}

impl ThreadPool {
    /// Starts configuring a pool with exactly `num_threads` worker threads.
    pub fn builder(num_threads: usize) -> ThreadPoolBuilder {
        ThreadPoolBuilder {
            num_threads,
            thread_name: None,
            stack_size: None,
        }
    }

    /// Spawns a task on the thread pool without waiting for the result.
    ///
    /// Fails with `PoolShutdown` if the pool no longer accepts work.
    pub fn spawn_detached<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.0
            .queue
            .push(Box::new(f))
            .map_err(|_| Error::pool_shutdown())
    }

    /// Initiates a graceful shutdown. Idempotent.
    pub fn shutdown(&self) {
        if self.0.queue.close() {
            log::debug!("thread pool shutdown requested");
        }
    }

    /// Initiates a forced shutdown, discarding queued tasks that have not started.
    ///
    /// Returns the number of discarded tasks. Idempotent.
    pub fn shutdown_now(&self) -> usize {
        let discarded = self.0.queue.close_and_drain();
        let count = discarded.len();
        // Dropping a discarded task drops whatever it captured, result slots included.
        drop(discarded);
        if count > 0 {
            log::debug!("thread pool forced shutdown discarded {count} queued tasks");
        }
        count
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) or
    /// [`shutdown_now`](Self::shutdown_now) has been called.
    pub fn is_shutdown(&self) -> bool {
        self.0.queue.is_closed()
    }
}

impl ThreadPool {
    /// Worker thread function that processes tasks from the queue.
    fn thread_fn(queue: Arc<TaskQueue<TaskFn>>) {
        while let Some(task) = queue.pop() {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                log::warn!(
                    "thread pool task panicked: {}",
                    panic_message(payload.as_ref())
                );
            }
        }
    }
}

/// Configuration for a [`ThreadPool`].
pub struct ThreadPoolBuilder {
    num_threads: usize,
    thread_name: Option<Box<dyn Fn(usize) -> String>>,
    stack_size: Option<usize>,
}

impl ThreadPoolBuilder {
    /// Sets a function that names each thread from its 0-based index.
    ///
    /// An empty name leaves the thread unnamed.
    pub fn thread_name(mut self, thread_name: impl Fn(usize) -> String + 'static) -> Self {
        self.thread_name = Some(Box::new(thread_name));
        self
    }

    /// Sets the stack size of every worker thread, in bytes.
    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.stack_size = Some(stack_size);
        self
    }

    /// Spawns all worker threads.
    ///
    /// If any thread fails to spawn, the threads spawned so far are released and
    /// the spawn error is returned.
    pub fn build(self) -> Result<ThreadPool> {
        contend_common::verify_arg!(num_threads, self.num_threads > 0);

        let queue = Arc::new(TaskQueue::<TaskFn>::new());
        for i in 0..self.num_threads {
            let mut builder = thread::Builder::new();
            if let Some(name) = self.thread_name.as_ref().map(|f| f(i)) {
                if !name.is_empty() {
                    builder = builder.name(name);
                }
            }
            if let Some(stack_size) = self.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let spawned = {
                let queue = queue.clone();
                builder.spawn(move || ThreadPool::thread_fn(queue))
            };
            if let Err(e) = spawned {
                queue.close();
                return Err(Error::io(format!("spawn pool thread {i}"), e));
            }
        }

        Ok(ThreadPool(Arc::new(PoolShared { queue })))
    }
}

/// Extracts a printable message from a panic payload.
pub fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
