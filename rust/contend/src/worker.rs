use std::{
    cell::Cell,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use contend_workflow::{slot::SlotWriter, thread_pool::panic_message};

use crate::{
    gate::Gate,
    interrupt::InterruptSignal,
    outcome::{Fault, Outcome},
    work::Work,
};

thread_local! {
    static CURRENT_INDEX: Cell<Option<usize>> = const { Cell::new(None) };
}

/// Returns the submission index of the worker executing on the current thread,
/// or `None` outside of a worker.
pub fn current_worker_index() -> Option<usize> {
    CURRENT_INDEX.with(Cell::get)
}

/// The synchronization state shared by a runner and all of its workers.
pub(crate) struct Gates {
    /// Opens once every worker is parked in front of the trigger.
    pub readiness: Gate,
    /// Single-shot gate releasing all workers at once.
    pub trigger: Gate,
    /// Opens once every worker has finished, successfully or not.
    pub completion: Gate,
    pub interrupt: Arc<InterruptSignal>,
}

impl Gates {
    pub fn new(concurrency: usize) -> Gates {
        Gates {
            readiness: Gate::new(concurrency),
            trigger: Gate::single_shot(),
            completion: Gate::new(concurrency),
            interrupt: Arc::new(InterruptSignal::new()),
        }
    }

    /// Wakes everything that blocks on behalf of the runner or its workers.
    ///
    /// Returns `true` if this call performed the interruption.
    pub fn interrupt(&self) -> bool {
        let first = self.interrupt.raise();
        self.trigger.interrupt();
        self.readiness.interrupt();
        self.completion.interrupt();
        first
    }
}

/// One schedulable execution of the runner's work.
///
/// Protocol:
/// 1. arrive at the readiness gate;
/// 2. wait for the trigger;
/// 3. execute the work, capturing its value, error, or panic;
/// 4. publish the outcome, then arrive at the completion gate.
///
/// The completion arrival is tied to the worker's lifetime, so it also happens
/// when the worker is discarded without running.
pub(crate) struct Worker<T> {
    index: usize,
    work: Work<T>,
    slot: SlotWriter<Outcome<T>>,
    completion: CompletionGuard,
}

impl<T> Worker<T> {
    pub fn new(
        index: usize,
        work: Work<T>,
        gates: Arc<Gates>,
        slot: SlotWriter<Outcome<T>>,
    ) -> Worker<T> {
        Worker {
            index,
            work,
            slot,
            completion: CompletionGuard { index, gates },
        }
    }

    pub fn run(self) {
        let Worker {
            index,
            work,
            slot,
            completion,
        } = self;
        let gates = &completion.gates;

        if let Err(e) = gates.readiness.arrive() {
            log::warn!("worker {index}: {e}");
        }

        // A release racing with an interruption still counts as interrupted.
        let outcome = if gates.trigger.wait() && !gates.interrupt.is_raised() {
            log::trace!("worker {index} released");
            Self::execute(index, &work, &gates.interrupt)
        } else {
            log::trace!("worker {index} interrupted before release");
            Outcome::Fault(Fault::Interrupted)
        };

        if slot.fill(outcome).is_err() {
            log::trace!("worker {index} finished after its result was cancelled");
        }
        drop(completion);
    }

    fn execute(index: usize, work: &Work<T>, interrupt: &Arc<InterruptSignal>) -> Outcome<T> {
        let _scope = interrupt.enter();
        let _index = IndexScope::enter(index);
        match panic::catch_unwind(AssertUnwindSafe(|| work.execute())) {
            Ok(Ok(value)) => Outcome::Value(value),
            Ok(Err(error)) => Outcome::Fault(Fault::from_error(error)),
            Err(payload) => Outcome::Fault(Fault::Panicked {
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

struct IndexScope(Option<usize>);

impl IndexScope {
    fn enter(index: usize) -> IndexScope {
        IndexScope(CURRENT_INDEX.with(|current| current.replace(Some(index))))
    }
}

impl Drop for IndexScope {
    fn drop(&mut self) {
        CURRENT_INDEX.with(|current| current.set(self.0));
    }
}

struct CompletionGuard {
    index: usize,
    gates: Arc<Gates>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Err(e) = self.gates.completion.arrive() {
            log::warn!("worker {}: {e}", self.index);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        thread,
        time::Duration,
    };

    use contend_workflow::slot::{self, SlotReader};

    use super::*;

    fn spawn_worker<T: Send + 'static>(
        work: Work<T>,
        gates: &Arc<Gates>,
    ) -> (thread::JoinHandle<()>, SlotReader<Outcome<T>>) {
        let (tx, rx) = slot::slot();
        let worker = Worker::new(0, work, gates.clone(), tx);
        (thread::spawn(move || worker.run()), rx)
    }

    #[test]
    fn test_current_worker_index() {
        assert_eq!(current_worker_index(), None);
        let gates = Arc::new(Gates::new(1));
        let (tx, rx) = slot::slot();
        let worker = Worker::new(
            7,
            Work::producer(|| Ok(current_worker_index())),
            gates.clone(),
            tx,
        );
        let thread = thread::spawn(move || {
            worker.run();
            current_worker_index()
        });
        gates.trigger.release().unwrap();
        assert_eq!(thread.join().unwrap(), None);
        assert_eq!(rx.take().unwrap().into_value(), Some(Some(7)));
    }

    #[test]
    fn test_protocol_order() {
        let gates = Arc::new(Gates::new(1));
        let (thread, rx) = spawn_worker(Work::producer(|| Ok(11)), &gates);

        assert!(gates.readiness.wait_timeout(Duration::from_secs(10)));
        assert!(!gates.completion.is_open());

        gates.trigger.release().unwrap();
        thread.join().unwrap();
        assert!(gates.completion.is_open());
        assert_eq!(rx.take().unwrap().into_value(), Some(11));
    }

    #[test]
    fn test_error_and_panic_are_captured() {
        let gates = Arc::new(Gates::new(2));
        let (failing, failed_rx) =
            spawn_worker(Work::<u8>::producer(|| Err("bad input".into())), &gates);
        let (panicking, panicked_rx) =
            spawn_worker(Work::<u8>::producer(|| panic!("exploded")), &gates);
        gates.trigger.release().unwrap();
        failing.join().unwrap();
        panicking.join().unwrap();

        assert!(gates.completion.is_open());
        match failed_rx.take().unwrap() {
            Outcome::Fault(Fault::Failed { source }) => assert_eq!(source.to_string(), "bad input"),
            other => panic!("unexpected outcome {other:?}"),
        }
        match panicked_rx.take().unwrap() {
            Outcome::Fault(Fault::Panicked { message }) => assert_eq!(message, "exploded"),
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_interrupted_before_release() {
        let gates = Arc::new(Gates::new(1));
        let (thread, rx) = spawn_worker(Work::action(|| Ok(())), &gates);
        assert!(gates.readiness.wait_timeout(Duration::from_secs(10)));
        assert!(gates.interrupt());
        thread.join().unwrap();
        assert!(matches!(
            rx.take().unwrap(),
            Outcome::Fault(Fault::Interrupted)
        ));
        assert_eq!(gates.completion.remaining(), 0);
    }

    #[test]
    fn test_release_after_interrupt_skips_work() {
        let calls = Arc::new(AtomicUsize::new(0));
        let gates = Arc::new(Gates::new(1));
        let (thread, rx) = {
            let calls = calls.clone();
            spawn_worker(
                Work::action(move || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
                &gates,
            )
        };
        assert!(gates.readiness.wait_timeout(Duration::from_secs(10)));

        // The trigger opens after the signal went up but before the gates were woken.
        assert!(gates.interrupt.raise());
        gates.trigger.release().unwrap();
        thread.join().unwrap();

        assert!(matches!(
            rx.take().unwrap(),
            Outcome::Fault(Fault::Interrupted)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(gates.completion.is_open());
    }

    #[test]
    fn test_discarded_worker_still_completes() {
        let gates = Arc::new(Gates::new(1));
        let (tx, rx) = slot::slot::<Outcome<()>>();
        let worker = Worker::new(0, Work::action(|| Ok(())), gates.clone(), tx);
        drop(worker);
        assert!(gates.completion.is_open());
        assert!(gates.readiness.remaining() == 1);
        assert!(rx.take().is_none());
    }
}
