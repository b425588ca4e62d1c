use std::time::Duration;

use contend_common::{Result, verify_arg};

use crate::{Runner, work::Work};

/// Tuning knobs of a [`Runner`] that do not affect its semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Length of one wait slice in [`Runner::await_readiness`] and
    /// [`Runner::await_completion`]; progress is logged once per slice.
    pub poll_interval: Duration,
    /// Worker threads are named `{thread_name_prefix}-{index}`, the lifecycle
    /// watcher `{thread_name_prefix}-watcher`.
    pub thread_name_prefix: String,
    /// Stack size of the worker threads, in bytes. `None` keeps the platform default.
    pub stack_size: Option<usize>,
}

impl RunnerOptions {
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
    pub const DEFAULT_THREAD_NAME_PREFIX: &'static str = "contend-worker";

    pub(crate) fn validate(&self) -> Result<()> {
        verify_arg!(poll_interval, !self.poll_interval.is_zero());
        verify_arg!(stack_size, self.stack_size.is_none_or(|size| size > 0));
        Ok(())
    }
}

impl Default for RunnerOptions {
    fn default() -> Self {
        RunnerOptions {
            poll_interval: Self::DEFAULT_POLL_INTERVAL,
            thread_name_prefix: Self::DEFAULT_THREAD_NAME_PREFIX.to_string(),
            stack_size: None,
        }
    }
}

/// Configures and launches a [`Runner`].
///
/// ```
/// use contend::{RunnerBuilder, Work};
/// use std::time::Duration;
///
/// let runner = RunnerBuilder::new(4)
///     .poll_interval(Duration::from_millis(10))
///     .thread_name_prefix("doc")
///     .build(Work::producer(|| Ok(1)))
///     .unwrap();
/// runner.start().unwrap();
/// assert_eq!(runner.result_values(), vec![&1, &1, &1, &1]);
/// ```
#[derive(Debug, Clone)]
pub struct RunnerBuilder {
    concurrency: usize,
    options: RunnerOptions,
}

impl RunnerBuilder {
    /// Starts configuring a runner of `concurrency` workers.
    pub fn new(concurrency: usize) -> RunnerBuilder {
        RunnerBuilder {
            concurrency,
            options: RunnerOptions::default(),
        }
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.options.poll_interval = poll_interval;
        self
    }

    pub fn thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.thread_name_prefix = prefix.into();
        self
    }

    pub fn stack_size(mut self, stack_size: usize) -> Self {
        self.options.stack_size = Some(stack_size);
        self
    }

    /// Replaces all options at once.
    pub fn options(mut self, options: RunnerOptions) -> Self {
        self.options = options;
        self
    }

    /// Validates the configuration and launches the workers.
    ///
    /// Fails with `InvalidConfiguration` (nothing is launched) if the concurrency
    /// is zero or an option is out of range.
    pub fn build<T: Send + 'static>(self, work: Work<T>) -> Result<Runner<T>> {
        Runner::launch(self.concurrency, self.options, work)
    }
}
