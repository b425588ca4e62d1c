//! Counting gates used to line workers up, release them at once, and observe
//! their completion.
//!
//! A [`Gate`] starts at a fixed capacity. Every party calls [`Gate::arrive`]
//! exactly once; the gate opens when the counter reaches zero and stays open.
//! Waiters block in [`Gate::wait`] until the gate opens or is interrupted.
//! A single-shot gate (capacity 1) is opened by [`Gate::release`], which wakes
//! all waiters with one notification.

use std::{
    sync::{
        Condvar, Mutex, MutexGuard,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use contend_common::{Result, error::Error};

/// A counting barrier that opens once every party has arrived.
pub struct Gate {
    capacity: usize,
    remaining: AtomicUsize,
    interrupted: AtomicBool,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl Gate {
    /// Creates a gate that opens after `capacity` arrivals.
    ///
    /// A gate with zero capacity is open from the start.
    pub fn new(capacity: usize) -> Gate {
        Gate {
            capacity,
            remaining: AtomicUsize::new(capacity),
            interrupted: AtomicBool::new(false),
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Creates a gate opened by a single [`release`](Self::release).
    pub fn single_shot() -> Gate {
        Gate::new(1)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of arrivals still needed to open the gate.
    ///
    /// **Note**: intended for diagnostics; the value may be stale by the time it
    /// is observed.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    pub fn is_open(&self) -> bool {
        self.remaining() == 0
    }

    pub fn is_interrupted(&self) -> bool {
        self.interrupted.load(Ordering::Acquire)
    }

    /// Records one arrival, opening the gate when the last party arrives.
    ///
    /// Fails with `ProtocolViolation` when every arrival has already been recorded;
    /// the counter is left untouched in that case.
    pub fn arrive(&self) -> Result<()> {
        let mut current = self.remaining.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return Err(Error::protocol_violation(
                    "arrive",
                    format!("all {} arrivals already recorded", self.capacity),
                ));
            }
            match self.remaining.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(updated) => current = updated,
            }
        }
        if current == 1 {
            // Notify under the lock so that a waiter that has just checked the
            // counter cannot miss the wakeup.
            let _guard = self.lock();
            self.condvar.notify_all();
        }
        Ok(())
    }

    /// Opens a single-shot gate.
    ///
    /// Fails with `ProtocolViolation` if the gate is not single-shot or was
    /// already released.
    pub fn release(&self) -> Result<()> {
        if self.capacity != 1 {
            return Err(Error::protocol_violation(
                "release",
                format!("gate of capacity {} is not single-shot", self.capacity),
            ));
        }
        self.arrive()
            .map_err(|_| Error::protocol_violation("release", "gate already released"))
    }

    /// Blocks until the gate opens or is interrupted.
    ///
    /// Returns `true` if the gate is open, `false` if the wait ended because the
    /// gate was interrupted.
    pub fn wait(&self) -> bool {
        if self.is_open() {
            return true;
        }
        let guard = self.lock();
        let _guard = self
            .condvar
            .wait_while(guard, |_| self.is_blocking())
            .unwrap_or_else(|e| e.into_inner());
        self.is_open()
    }

    /// Blocks until the gate opens, the gate is interrupted, or `timeout` elapses.
    ///
    /// Returns `true` only if the gate is open.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        if self.is_open() {
            return true;
        }
        let guard = self.lock();
        let _guard = self
            .condvar
            .wait_timeout_while(guard, timeout, |_| self.is_blocking())
            .unwrap_or_else(|e| e.into_inner());
        self.is_open()
    }

    /// Wakes every waiter; waits on a gate that is not open return `false` from
    /// now on. Arrivals are still recorded.
    ///
    /// Returns `true` if this call interrupted the gate.
    pub fn interrupt(&self) -> bool {
        let first = !self.interrupted.swap(true, Ordering::AcqRel);
        let _guard = self.lock();
        self.condvar.notify_all();
        first
    }

    fn is_blocking(&self) -> bool {
        !self.is_open() && !self.is_interrupted()
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("capacity", &self.capacity)
            .field("remaining", &self.remaining())
            .field("interrupted", &self.is_interrupted())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::Arc,
        thread,
        time::{Duration, Instant},
    };

    use super::Gate;

    #[test]
    fn test_arrivals_open_gate() {
        let gate = Gate::new(3);
        assert_eq!(gate.capacity(), 3);
        assert!(!gate.is_open());
        gate.arrive().unwrap();
        gate.arrive().unwrap();
        assert_eq!(gate.remaining(), 1);
        assert!(!gate.wait_timeout(Duration::from_millis(5)));
        gate.arrive().unwrap();
        assert!(gate.is_open());
        assert!(gate.wait());
    }

    #[test]
    fn test_extra_arrival_is_protocol_violation() {
        let gate = Gate::new(1);
        gate.arrive().unwrap();
        let err = gate.arrive().unwrap_err();
        assert!(err.is_protocol_violation());
        assert_eq!(gate.remaining(), 0);
    }

    #[test]
    fn test_zero_capacity_is_open() {
        let gate = Gate::new(0);
        assert!(gate.is_open());
        assert!(gate.wait());
    }

    #[test]
    fn test_release_single_shot() {
        let gate = Gate::single_shot();
        gate.release().unwrap();
        assert!(gate.is_open());
        let err = gate.release().unwrap_err();
        assert!(err.is_protocol_violation());
        assert!(err.to_string().contains("already released"));
        assert_eq!(gate.remaining(), 0);
    }

    #[test]
    fn test_release_requires_single_shot() {
        let gate = Gate::new(2);
        assert!(gate.release().unwrap_err().is_protocol_violation());
        assert_eq!(gate.remaining(), 2);
    }

    #[test]
    fn test_release_wakes_all_waiters() {
        let gate = Arc::new(Gate::single_shot());
        let waiters: Vec<_> = (0..16)
            .map(|_| {
                let gate = gate.clone();
                thread::spawn(move || gate.wait())
            })
            .collect();
        thread::sleep(Duration::from_millis(20));
        gate.release().unwrap();
        for waiter in waiters {
            assert!(waiter.join().unwrap());
        }
    }

    #[test]
    fn test_concurrent_arrivals() {
        let parties = 64;
        let gate = Arc::new(Gate::new(parties));
        let arrivals: Vec<_> = (0..parties)
            .map(|_| {
                let gate = gate.clone();
                thread::spawn(move || gate.arrive())
            })
            .collect();
        assert!(gate.wait());
        for arrival in arrivals {
            arrival.join().unwrap().unwrap();
        }
        assert_eq!(gate.remaining(), 0);
    }

    #[test]
    fn test_interrupt_wakes_waiters() {
        let gate = Arc::new(Gate::new(2));
        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || {
                let started = Instant::now();
                (gate.wait(), started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        assert!(gate.interrupt());
        assert!(!gate.interrupt());
        let (opened, elapsed) = waiter.join().unwrap();
        assert!(!opened);
        assert!(elapsed < Duration::from_secs(5));
        assert!(!gate.wait());
        assert!(!gate.wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn test_open_gate_reports_open_after_interrupt() {
        let gate = Gate::single_shot();
        gate.release().unwrap();
        gate.interrupt();
        assert!(gate.is_interrupted());
        assert!(gate.wait());
    }
}
