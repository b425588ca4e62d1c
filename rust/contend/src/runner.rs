//! The public-facing harness: launches N workers on a dedicated pool, holds them
//! at the trigger, releases them together, and collects their outcomes.

use std::{
    sync::{
        Arc, Mutex, OnceLock,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};

use contend_common::{Result, error::Error, verify_arg};
use contend_workflow::{
    slot::{self, SlotReader},
    thread_pool::ThreadPool,
};

use crate::{
    gate::Gate,
    options::{RunnerBuilder, RunnerOptions},
    outcome::{Fault, Outcome},
    work::{Work, WorkResult, WorkShape},
    worker::{Gates, Worker},
};

/// Runs `concurrency` copies of one unit of work, released simultaneously.
///
/// A `Runner` is live from construction: its pool threads exist and every worker
/// is already on its way to the trigger. The lifecycle is:
///
/// 1. [`await_readiness`](Self::await_readiness) (optional) - every worker is parked
/// 2. [`start`](Self::start) - every worker is released at once
/// 3. [`await_completion`](Self::await_completion) or [`results`](Self::results) -
///    every worker finished; the pool is shut down
///
/// [`interrupt`](Self::interrupt) ends the run at any point. Dropping the runner
/// interrupts it. A runner cannot be restarted.
pub struct Runner<T> {
    concurrency: usize,
    shape: WorkShape,
    options: RunnerOptions,
    pool: ThreadPool,
    gates: Arc<Gates>,
    /// One per worker, in submission order.
    handles: Vec<SlotReader<Outcome<T>>>,
    results: OnceLock<Vec<Outcome<T>>>,
    watcher: Mutex<Option<thread::JoinHandle<()>>>,
    interrupted: AtomicBool,
}

impl Runner<()> {
    /// Starts configuring a runner of `concurrency` workers; the value type is
    /// fixed by the work passed to [`RunnerBuilder::build`].
    pub fn builder(concurrency: usize) -> RunnerBuilder {
        RunnerBuilder::new(concurrency)
    }

    /// Launches `concurrency` workers running `action`.
    pub fn for_action<F>(concurrency: usize, action: F) -> Result<Runner<()>>
    where
        F: Fn() -> WorkResult<()> + Send + Sync + 'static,
    {
        RunnerBuilder::new(concurrency).build(Work::action(action))
    }
}

impl<T: Send + 'static> Runner<T> {
    /// Launches `concurrency` workers, each producing one value.
    pub fn for_producer<F>(concurrency: usize, producer: F) -> Result<Runner<T>>
    where
        F: Fn() -> WorkResult<T> + Send + Sync + 'static,
    {
        RunnerBuilder::new(concurrency).build(Work::producer(producer))
    }

    /// Launches `concurrency` workers, each transforming an argument fetched from
    /// `argument_source` at the moment the worker runs.
    pub fn for_transform<A, F, S>(
        concurrency: usize,
        transform: F,
        argument_source: S,
    ) -> Result<Runner<T>>
    where
        F: Fn(A) -> WorkResult<T> + Send + Sync + 'static,
        S: Fn() -> A + Send + Sync + 'static,
    {
        RunnerBuilder::new(concurrency).build(Work::transform(transform, argument_source))
    }

    /// Launches `concurrency` workers, each transforming a clone of `argument`.
    pub fn for_transform_const<A, F>(
        concurrency: usize,
        transform: F,
        argument: A,
    ) -> Result<Runner<T>>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> WorkResult<T> + Send + Sync + 'static,
    {
        RunnerBuilder::new(concurrency).build(Work::transform_const(transform, argument))
    }

    pub(crate) fn launch(
        concurrency: usize,
        options: RunnerOptions,
        work: Work<T>,
    ) -> Result<Runner<T>> {
        verify_arg!(concurrency, concurrency > 0);
        options.validate()?;

        let pool = {
            let prefix = options.thread_name_prefix.clone();
            let mut builder =
                ThreadPool::builder(concurrency).thread_name(move |i| format!("{prefix}-{i}"));
            if let Some(stack_size) = options.stack_size {
                builder = builder.stack_size(stack_size);
            }
            builder.build()?
        };

        let gates = Arc::new(Gates::new(concurrency));
        let mut handles = Vec::with_capacity(concurrency);
        for index in 0..concurrency {
            let (writer, reader) = slot::slot();
            let worker = Worker::new(index, work.clone(), gates.clone(), writer);
            if let Err(e) = pool.spawn_detached(move || worker.run()) {
                gates.interrupt();
                pool.shutdown_now();
                return Err(e);
            }
            handles.push(reader);
        }

        let watcher = {
            let gates = gates.clone();
            let pool = pool.clone();
            thread::Builder::new()
                .name(format!("{}-watcher", options.thread_name_prefix))
                .spawn(move || {
                    if gates.completion.wait() {
                        log::debug!("all workers finished, shutting the pool down");
                    }
                    pool.shutdown();
                })
        };
        let watcher = match watcher {
            Ok(watcher) => watcher,
            Err(e) => {
                gates.interrupt();
                pool.shutdown_now();
                return Err(Error::io("spawn lifecycle watcher", e));
            }
        };

        log::debug!(
            "launched {concurrency} workers ({:?}) on a dedicated pool",
            work.shape()
        );
        Ok(Runner {
            concurrency,
            shape: work.shape(),
            options,
            pool,
            gates,
            handles,
            results: OnceLock::new(),
            watcher: Mutex::new(Some(watcher)),
            interrupted: AtomicBool::new(false),
        })
    }
}

impl<T> Runner<T> {
    /// Blocks until every worker is parked in front of the trigger.
    ///
    /// Returns `false` if the runner was interrupted first.
    pub fn await_readiness(&self) -> bool {
        self.poll_gate(&self.gates.readiness, "ready")
    }

    /// Releases all workers at once.
    ///
    /// Fails with `ProtocolViolation` if the workers were already released, or
    /// if the runner was interrupted.
    pub fn start(&self) -> Result<()> {
        if self.is_interrupted() || self.gates.trigger.is_interrupted() {
            return Err(Error::protocol_violation("start", "runner was interrupted"));
        }
        self.gates.trigger.release()?;
        log::debug!("released {} workers", self.concurrency);
        Ok(())
    }

    /// Blocks until every worker finished and the pool is shut down.
    ///
    /// Returns `false` if the runner was interrupted before all workers finished.
    /// Calling it again after the runner is down returns immediately.
    pub fn await_completion(&self) -> bool {
        let completed = self.poll_gate(&self.gates.completion, "finished");
        if completed {
            self.join_watcher();
        }
        completed
    }

    /// Like [`await_completion`](Self::await_completion), giving up after `timeout`.
    pub fn await_completion_timeout(&self, timeout: Duration) -> bool {
        let completed = self.gates.completion.wait_timeout(timeout);
        if completed {
            self.join_watcher();
        }
        completed
    }

    /// Forcibly ends the run.
    ///
    /// Workers waiting for the trigger are woken up and report
    /// [`Fault::Interrupted`]; interruption points inside running work fire;
    /// every result that was not reported yet is resolved as [`Fault::Cancelled`].
    /// The pool is shut down without waiting for running work.
    ///
    /// Idempotent; has no effect on results that were already reported.
    pub fn interrupt(&self) {
        if self.interrupted.swap(true, Ordering::AcqRel) {
            self.join_watcher();
            return;
        }

        let finished = self.finished_count();
        if finished < self.concurrency {
            log::info!(
                "interrupting runner: {finished} of {} workers finished",
                self.concurrency
            );
        }

        self.gates.interrupt();
        let discarded = self.pool.shutdown_now();
        let cancelled = self.handles.iter().filter(|handle| handle.cancel()).count();
        if discarded > 0 || cancelled > 0 {
            log::debug!("discarded {discarded} queued workers, cancelled {cancelled} results");
        }
        self.join_watcher();
    }

    /// Same as [`interrupt`](Self::interrupt).
    pub fn close(&self) {
        self.interrupt();
    }

    /// Returns one outcome per worker, in submission order.
    ///
    /// Waits for completion first (or for an interruption). The outcomes are
    /// collected once; later calls return the same slice.
    pub fn results(&self) -> &[Outcome<T>] {
        self.results.get_or_init(|| {
            if !self.await_completion() {
                log::debug!("collecting results of an interrupted runner");
            }
            self.handles
                .iter()
                .map(|handle| {
                    handle
                        .take()
                        .unwrap_or_else(|| Outcome::Fault(Fault::Cancelled))
                })
                .collect()
        })
    }

    /// Returns the values of the successful workers, in submission order.
    pub fn result_values(&self) -> Vec<&T> {
        self.results().iter().filter_map(Outcome::value).collect()
    }

    /// Returns the faults of the failed workers, in submission order.
    pub fn result_faults(&self) -> Vec<&Fault> {
        self.results().iter().filter_map(Outcome::fault).collect()
    }

    /// Consumes the runner, returning one outcome per worker in submission order.
    pub fn into_results(mut self) -> Vec<Outcome<T>> {
        self.results();
        self.results.take().unwrap_or_default()
    }

    /// Number of workers that finished, successfully or not.
    pub fn finished_count(&self) -> usize {
        self.concurrency - self.gates.completion.remaining()
    }

    /// Number of workers that reached the trigger.
    pub fn ready_count(&self) -> usize {
        self.concurrency - self.gates.readiness.remaining()
    }

    /// Number of workers past the trigger that have not finished yet.
    ///
    /// **Note**: diagnostic only; the counters are read independently.
    pub fn running_count(&self) -> usize {
        self.ready_count().saturating_sub(self.finished_count())
    }

    /// Returns `true` once the pool is shut down, by completion or interruption.
    pub fn is_down(&self) -> bool {
        self.pool.is_shutdown()
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn work_shape(&self) -> WorkShape {
        self.shape
    }

    fn poll_gate(&self, gate: &Gate, state: &str) -> bool {
        loop {
            if gate.is_open() {
                return true;
            }
            if gate.is_interrupted() {
                return false;
            }
            log::debug!(
                "waiting for {} of {} workers to be {state}",
                gate.remaining(),
                self.concurrency
            );
            if gate.wait_timeout(self.options.poll_interval) {
                return true;
            }
        }
    }

    fn join_watcher(&self) {
        // The lock is held while joining, so every caller returns only after the
        // watcher shut the pool down.
        let mut watcher = self.watcher.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(watcher) = watcher.take() {
            if watcher.join().is_err() {
                log::warn!("lifecycle watcher panicked");
            }
        }
    }
}

impl<T> Drop for Runner<T> {
    fn drop(&mut self) {
        self.interrupt();
    }
}

impl<T> std::fmt::Debug for Runner<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runner")
            .field("concurrency", &self.concurrency)
            .field("shape", &self.shape)
            .field("ready", &self.ready_count())
            .field("finished", &self.finished_count())
            .field("down", &self.is_down())
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}
