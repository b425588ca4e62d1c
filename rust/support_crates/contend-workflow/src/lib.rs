//! Thread execution utilities backing the contend harness.
//!
//! # Key Components
//!
//! - [`thread_pool::ThreadPool`] - A fixed-size thread pool whose threads are all
//!   created up front, with graceful ([`shutdown`](thread_pool::ThreadPool::shutdown))
//!   and forced ([`shutdown_now`](thread_pool::ThreadPool::shutdown_now)) teardown
//! - [`slot`] - Single-assignment result slots that a reader can abandon while
//!   they are still empty

pub mod slot;
pub mod thread_pool;

mod task_queue;
