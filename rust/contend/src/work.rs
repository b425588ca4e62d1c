//! Caller-supplied units of work.
//!
//! Three shapes are supported, all unified behind one execution closure so the
//! worker protocol exists once:
//!
//! - **action**: no input, no output
//! - **producer**: no input, produces a value
//! - **transform**: takes an argument fetched from an argument source, produces a
//!   value. The source is invoked once per worker, at execution time, so each
//!   worker observes the source's state at the moment it runs.
//!
//! Every shape may fail by returning an error; any error type converts into the
//! boxed error with `?` or `.into()`.

use std::sync::Arc;

use contend_common::error::StdErrorBoxed;

/// The result type returned by work closures.
pub type WorkResult<T> = std::result::Result<T, StdErrorBoxed>;

type WorkFn<T> = dyn Fn() -> WorkResult<T> + Send + Sync;

/// Identifies which of the supported shapes a [`Work`] was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkShape {
    Action,
    Producer,
    Transform,
}

/// A unit of work shared by all workers of a runner.
pub struct Work<T> {
    shape: WorkShape,
    run: Arc<WorkFn<T>>,
}

impl Work<()> {
    /// Work that takes no input and produces no value.
    pub fn action<F>(action: F) -> Work<()>
    where
        F: Fn() -> WorkResult<()> + Send + Sync + 'static,
    {
        Work {
            shape: WorkShape::Action,
            run: Arc::new(action),
        }
    }
}

impl<T> Work<T> {
    /// Work that takes no input and produces a value.
    pub fn producer<F>(producer: F) -> Work<T>
    where
        F: Fn() -> WorkResult<T> + Send + Sync + 'static,
    {
        Work {
            shape: WorkShape::Producer,
            run: Arc::new(producer),
        }
    }

    /// Work that transforms an argument obtained from `argument_source`.
    ///
    /// The source is invoked once per execution, right before the transform.
    pub fn transform<A, F, S>(transform: F, argument_source: S) -> Work<T>
    where
        F: Fn(A) -> WorkResult<T> + Send + Sync + 'static,
        S: Fn() -> A + Send + Sync + 'static,
    {
        Work {
            shape: WorkShape::Transform,
            run: Arc::new(move || transform(argument_source())),
        }
    }

    /// Work that transforms a clone of a constant argument.
    pub fn transform_const<A, F>(transform: F, argument: A) -> Work<T>
    where
        A: Clone + Send + Sync + 'static,
        F: Fn(A) -> WorkResult<T> + Send + Sync + 'static,
    {
        Self::transform(transform, move || argument.clone())
    }

    pub fn shape(&self) -> WorkShape {
        self.shape
    }

    /// Runs the work once on the calling thread.
    pub fn execute(&self) -> WorkResult<T> {
        (self.run)()
    }
}

impl<T> Clone for Work<T> {
    fn clone(&self) -> Self {
        Work {
            shape: self.shape,
            run: self.run.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Work<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Work").field("shape", &self.shape).finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    #[test]
    fn test_shapes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let action = {
            let calls = calls.clone();
            Work::action(move || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        };
        assert_eq!(action.shape(), WorkShape::Action);
        action.execute().unwrap();
        action.clone().execute().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let producer = Work::producer(|| Ok("value"));
        assert_eq!(producer.shape(), WorkShape::Producer);
        assert_eq!(producer.execute().unwrap(), "value");

        let failing: Work<u8> = Work::producer(|| Err("nope".into()));
        assert_eq!(failing.execute().unwrap_err().to_string(), "nope");
    }

    #[test]
    fn test_transform_fetches_argument_per_execution() {
        let source_calls = Arc::new(AtomicUsize::new(0));
        let work = {
            let source_calls = source_calls.clone();
            Work::transform(
                |arg: usize| Ok(arg * 10),
                move || source_calls.fetch_add(1, Ordering::SeqCst),
            )
        };
        assert_eq!(work.shape(), WorkShape::Transform);
        assert_eq!(work.execute().unwrap(), 0);
        assert_eq!(work.execute().unwrap(), 10);
        assert_eq!(work.execute().unwrap(), 20);
        assert_eq!(source_calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_transform_const() {
        let work = Work::transform_const(|s: String| Ok(s.len()), "four".to_string());
        assert_eq!(work.execute().unwrap(), 4);
        assert_eq!(work.execute().unwrap(), 4);
        assert_eq!(format!("{work:?}"), "Work { shape: Transform }");
    }
}
