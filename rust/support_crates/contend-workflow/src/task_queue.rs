//! A closable, blocking FIFO queue shared by the producer (the pool handle) and
//! the consumers (the pool threads).
//!
//! Unlike a channel, closing the queue is an explicit operation decoupled from
//! handle lifetimes: a pool can be shut down while clones of its handle are still
//! alive. Closing comes in two flavors:
//!
//! - [`close`](TaskQueue::close): no new items are accepted, queued items are
//!   still handed out, consumers see `None` once the queue runs dry
//! - [`close_and_drain`](TaskQueue::close_and_drain): no new items are accepted
//!   and the queued items are removed and returned to the caller

use std::{
    collections::VecDeque,
    sync::{Condvar, Mutex, MutexGuard},
};

pub(crate) struct TaskQueue<T> {
    state: Mutex<QueueState<T>>,
    available: Condvar,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> TaskQueue<T> {
    pub fn new() -> TaskQueue<T> {
        TaskQueue {
            state: Mutex::new(QueueState {
                items: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Appends an item, waking one waiting consumer.
    ///
    /// Returns `Err(item)` if the queue is closed.
    pub fn push(&self, item: T) -> Result<(), T> {
        let mut state = self.lock();
        if state.closed {
            return Err(item);
        }
        state.items.push_back(item);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Removes the oldest item, blocking while the queue is empty and open.
    ///
    /// Returns `None` once the queue is closed and empty.
    pub fn pop(&self) -> Option<T> {
        let guard = self.lock();
        let mut state = self
            .available
            .wait_while(guard, |state| state.items.is_empty() && !state.closed)
            .unwrap_or_else(|e| e.into_inner());
        state.items.pop_front()
    }

    /// Stops accepting new items. Queued items are still handed out.
    ///
    /// Returns `true` if this call closed the queue.
    pub fn close(&self) -> bool {
        let mut state = self.lock();
        let was_open = !state.closed;
        state.closed = true;
        drop(state);
        self.available.notify_all();
        was_open
    }

    /// Stops accepting new items and removes everything still queued.
    pub fn close_and_drain(&self) -> Vec<T> {
        let mut state = self.lock();
        state.closed = true;
        let drained = state.items.drain(..).collect();
        drop(state);
        self.available.notify_all();
        drained
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
