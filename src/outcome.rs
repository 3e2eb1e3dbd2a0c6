//! Classification of what a test body or worker thread produced.
//!
//! Tests can end in three ways besides passing: an assertion did not hold
//! (a *failure*), something unexpected went wrong (an *error*), or the worker
//! was asked to stop and bailed out (an [`Interrupted`] signal, which is not
//! recorded at all).
//!
//! The same rules apply to values returned from a test body and to panic
//! payloads, whether they are caught around a single test case or escape a
//! whole worker thread and end up in a [`ThreadedTestGroup`](crate::group::ThreadedTestGroup).

use std::{any::Any, fmt};

use crate::test::BoxError;

/// Signal that a worker is being torn down.
///
/// Returned by [`TestRun::sleep`](crate::run::TestRun::sleep) once the worker's
/// group got interrupted. Propagating it out of a test body (or panicking with
/// it via [`std::panic::panic_any`]) ends the test without recording anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, thiserror::Error)]
#[error("worker interrupted")]
pub struct Interrupted;

/// An expected condition of a test did not hold.
///
/// Return it as an error from a test body, or raise it with
/// [`std::panic::panic_any`] from code that cannot return errors.
/// Panics from the `assert!` family are treated the same way.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct AssertionFailure {
    pub message: String,
}

impl AssertionFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A recordable problem, either a failure or an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    Failure(String),
    Error(String),
}

impl Fault {
    /// Classify a panic payload.
    ///
    /// Returns `None` for an [`Interrupted`] payload.
    pub fn from_panic(payload: Box<dyn Any + Send + 'static>) -> Option<Self> {
        if payload.is::<Interrupted>() {
            return None;
        }

        let payload = match payload.downcast::<AssertionFailure>() {
            Ok(failure) => return Some(Fault::Failure(failure.message)),
            Err(payload) => payload,
        };

        let message = payload_as_string(payload);
        match message.starts_with("assertion") {
            true => Some(Fault::Failure(message)),
            false => Some(Fault::Error(message)),
        }
    }

    /// Classify an error returned from a test body.
    ///
    /// Returns `None` for [`Interrupted`].
    pub fn from_error(err: BoxError) -> Option<Self> {
        if err.is::<Interrupted>() {
            return None;
        }

        match err.downcast::<AssertionFailure>() {
            Ok(failure) => Some(Fault::Failure(failure.message)),
            Err(err) => Some(Fault::Error(err.to_string())),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Fault::Failure(message) | Fault::Error(message) => message,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Fault::Failure(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Fault::Error(_))
    }
}

/// Convert a panic payload into a string.
///
/// This matches the common payload types produced by `panic!` (`&'static str` and `String`).
/// Other payload types are formatted as a generic placeholder.
pub fn payload_as_string(payload: Box<dyn Any + Send + 'static>) -> String {
    payload
        .downcast::<&'static str>()
        .map(|s| s.to_string())
        .or_else(|payload| payload.downcast::<String>().map(|s| *s))
        .unwrap_or_else(|_| String::from("Box<dyn Any>"))
}

/// One failure or error entry in a [`ResultSink`](crate::result::ResultSink).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
    /// Description of the test the entry is attributed to.
    pub test: String,
    pub message: String,
}

impl fmt::Display for TestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.test, self.message)
    }
}
