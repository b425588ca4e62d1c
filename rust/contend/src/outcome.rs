//! Per-worker results: either the produced value or the captured fault.

use contend_common::error::StdErrorBoxed;
use thiserror::Error;

/// A failure captured from one worker.
///
/// Faults are ordinary data: they never propagate out of the runner and are
/// only observed by inspecting the results.
#[derive(Debug, Error)]
pub enum Fault {
    /// The work returned an error.
    #[error("work failed: {source}")]
    Failed { source: StdErrorBoxed },

    /// The work panicked.
    #[error("work panicked: {message}")]
    Panicked { message: String },

    /// The runner was interrupted while the worker waited for the start signal,
    /// or while the work was at an interruption point.
    #[error("worker interrupted")]
    Interrupted,

    /// The worker's result was abandoned by a forced shutdown before it was reported.
    #[error("worker cancelled before reporting a result")]
    Cancelled,
}

impl Fault {
    /// Converts an error returned by the work into a fault.
    ///
    /// An error that already is a `Fault` (for instance one raised by an
    /// interruption point and propagated with `?`) is unwrapped.
    pub fn from_error(error: StdErrorBoxed) -> Fault {
        match error.downcast::<Fault>() {
            Ok(fault) => *fault,
            Err(source) => Fault::Failed { source },
        }
    }

    /// Returns `true` for faults caused by interrupting the runner rather than by
    /// the work itself.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Fault::Interrupted | Fault::Cancelled)
    }
}

/// The outcome of one worker: exactly one of a value or a fault.
#[derive(Debug)]
pub enum Outcome<T> {
    Value(T),
    Fault(Fault),
}

impl<T> Outcome<T> {
    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    pub fn is_fault(&self) -> bool {
        !self.is_value()
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Value(value) => Some(value),
            Outcome::Fault(_) => None,
        }
    }

    pub fn fault(&self) -> Option<&Fault> {
        match self {
            Outcome::Value(_) => None,
            Outcome::Fault(fault) => Some(fault),
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Value(value) => Some(value),
            Outcome::Fault(_) => None,
        }
    }

    pub fn into_result(self) -> Result<T, Fault> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Fault(fault) => Err(fault),
        }
    }

    pub fn as_result(&self) -> Result<&T, &Fault> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Fault(fault) => Err(fault),
        }
    }
}

impl<T> From<Result<T, Fault>> for Outcome<T> {
    fn from(result: Result<T, Fault>) -> Self {
        match result {
            Ok(value) => Outcome::Value(value),
            Err(fault) => Outcome::Fault(fault),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_and_fault_are_complements() {
        let value: Outcome<u32> = Outcome::Value(5);
        assert!(value.is_value());
        assert!(!value.is_fault());
        assert_eq!(value.value(), Some(&5));
        assert!(value.fault().is_none());
        assert_eq!(value.into_result().unwrap(), 5);

        let fault: Outcome<u32> = Outcome::Fault(Fault::Cancelled);
        assert!(fault.is_fault());
        assert!(!fault.is_value());
        assert!(fault.value().is_none());
        assert!(fault.fault().unwrap().is_cancellation());
        assert!(fault.into_value().is_none());
    }

    #[test]
    fn test_from_error_unwraps_faults() {
        let boxed: StdErrorBoxed = Box::new(Fault::Interrupted);
        assert!(matches!(Fault::from_error(boxed), Fault::Interrupted));

        let boxed: StdErrorBoxed = "disk on fire".into();
        let fault = Fault::from_error(boxed);
        assert!(!fault.is_cancellation());
        assert_eq!(fault.to_string(), "work failed: disk on fire");
    }

    #[test]
    fn test_from_result() {
        let outcome: Outcome<&str> = Ok("ok").into();
        assert_eq!(outcome.as_result().ok(), Some(&"ok"));
        let outcome: Outcome<&str> = Err(Fault::Panicked {
            message: "boom".to_string(),
        })
        .into();
        assert_eq!(
            outcome.as_result().unwrap_err().to_string(),
            "work panicked: boom"
        );
    }
}
