//! A barrier-synchronized concurrent task harness.
//!
//! `contend` launches exactly N executions of one unit of work on a dedicated
//! pool of N threads, parks every execution in front of a shared trigger, and
//! releases them all at once. Code that mutates shared state without proper
//! synchronization is thereby exercised under real contention, which makes lost
//! updates and similar races observable in tests.
//!
//! # Key Components
//!
//! - [`Runner`] - launches the workers, releases them, collects their outcomes,
//!   and tears everything down on completion, interruption, or drop
//! - [`Work`] - the unit of work: an action, a producer, or a transform with a
//!   lazily fetched argument
//! - [`Outcome`] / [`Fault`] - what one worker produced or how it failed
//! - [`Gate`] - the counting barrier behind readiness, trigger, and completion
//! - [`interrupt`] - cooperative interruption points for long-running work
//!
//! # Example
//!
//! ```
//! use std::sync::{
//!     Arc,
//!     atomic::{AtomicUsize, Ordering},
//! };
//!
//! let hits = Arc::new(AtomicUsize::new(0));
//! let runner = {
//!     let hits = hits.clone();
//!     contend::Runner::for_action(8, move || {
//!         hits.fetch_add(1, Ordering::SeqCst);
//!         Ok(())
//!     })
//!     .unwrap()
//! };
//!
//! assert!(runner.await_readiness());
//! runner.start().unwrap();
//! assert!(runner.await_completion());
//!
//! assert_eq!(hits.load(Ordering::SeqCst), 8);
//! assert_eq!(runner.finished_count(), 8);
//! assert!(runner.is_down());
//! ```

pub mod gate;
pub mod interrupt;
pub mod options;
pub mod outcome;
pub mod runner;
pub mod work;

mod worker;

pub use contend_common::{
    Result,
    error::{Error, ErrorKind, StdErrorBoxed},
};
pub use gate::Gate;
pub use options::{RunnerBuilder, RunnerOptions};
pub use outcome::{Fault, Outcome};
pub use runner::Runner;
pub use work::{Work, WorkResult, WorkShape};
pub use worker::current_worker_index;
