//! Cooperative interruption points for work running under a [`Runner`](crate::Runner).
//!
//! Threads cannot be preempted, so a forced shutdown reaches the work itself only
//! when the work asks for it. While a worker executes its work, the owning
//! runner's interrupt signal is installed for the current thread; the functions
//! in this module consult it:
//!
//! - [`is_interrupted`] - whether the owning runner has been interrupted
//! - [`check`] - fails with [`Fault::Interrupted`] once interrupted
//! - [`sleep`] - sleeps, waking early with [`Fault::Interrupted`] on interruption
//!
//! Outside of a worker these functions never report an interruption, and
//! [`sleep`] is a plain sleep.
//!
//! A `Fault` returned from work with `?` is reported as-is in the worker's
//! outcome rather than wrapped as [`Fault::Failed`].

use std::{
    cell::RefCell,
    sync::{
        Arc, Condvar, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::outcome::Fault;

thread_local! {
    static CURRENT_SIGNAL: RefCell<Option<Arc<InterruptSignal>>> = const { RefCell::new(None) };
}

/// Returns `true` if the runner owning the current worker has been interrupted.
pub fn is_interrupted() -> bool {
    CURRENT_SIGNAL.with(|current| {
        current
            .borrow()
            .as_ref()
            .is_some_and(|signal| signal.is_raised())
    })
}

/// Fails with [`Fault::Interrupted`] if the runner owning the current worker has
/// been interrupted.
pub fn check() -> Result<(), Fault> {
    if is_interrupted() {
        Err(Fault::Interrupted)
    } else {
        Ok(())
    }
}

/// Sleeps for `duration`, waking early with [`Fault::Interrupted`] if the runner
/// owning the current worker is interrupted.
pub fn sleep(duration: Duration) -> Result<(), Fault> {
    let signal = CURRENT_SIGNAL.with(|current| current.borrow().clone());
    match signal {
        Some(signal) => {
            if signal.sleep(duration) {
                Ok(())
            } else {
                Err(Fault::Interrupted)
            }
        }
        None => {
            std::thread::sleep(duration);
            Ok(())
        }
    }
}

/// A one-way flag that wakes sleepers when raised.
#[derive(Default)]
pub(crate) struct InterruptSignal {
    raised: AtomicBool,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl InterruptSignal {
    pub fn new() -> InterruptSignal {
        Self::default()
    }

    /// Raises the flag. Returns `true` if this call raised it.
    pub fn raise(&self) -> bool {
        let first = !self.raised.swap(true, Ordering::AcqRel);
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.condvar.notify_all();
        first
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// Sleeps for `duration` unless the flag is raised first.
    ///
    /// Returns `true` if the full duration elapsed without the flag being raised.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if self.is_raised() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            guard = self
                .condvar
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
    }

    /// Installs this signal for the current thread until the returned scope is dropped.
    pub fn enter(self: &Arc<Self>) -> InterruptScope {
        let previous = CURRENT_SIGNAL.with(|current| current.replace(Some(self.clone())));
        InterruptScope { previous }
    }
}

/// Restores the previously installed signal when dropped.
pub(crate) struct InterruptScope {
    previous: Option<Arc<InterruptSignal>>,
}

impl Drop for InterruptScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_SIGNAL.with(|current| {
            *current.borrow_mut() = previous;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    use super::*;

    #[test]
    fn test_outside_worker_is_never_interrupted() {
        assert!(!is_interrupted());
        assert!(check().is_ok());
        assert!(sleep(Duration::from_millis(1)).is_ok());
    }

    #[test]
    fn test_scope_installs_and_restores_signal() {
        let signal = Arc::new(InterruptSignal::new());
        signal.raise();
        {
            let _scope = signal.enter();
            assert!(is_interrupted());
            assert!(matches!(check(), Err(Fault::Interrupted)));
        }
        assert!(!is_interrupted());
    }

    #[test]
    fn test_raise_wakes_sleeper() {
        let signal = Arc::new(InterruptSignal::new());
        let sleeper = {
            let signal = signal.clone();
            thread::spawn(move || {
                let _scope = signal.enter();
                let started = Instant::now();
                (sleep(Duration::from_secs(10)), started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        assert!(signal.raise());
        assert!(!signal.raise());
        let (slept, elapsed) = sleeper.join().unwrap();
        assert!(matches!(slept, Err(Fault::Interrupted)));
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn test_sleep_completes_without_raise() {
        let signal = InterruptSignal::new();
        assert!(signal.sleep(Duration::from_millis(5)));
        assert!(!signal.is_raised());
    }
}
