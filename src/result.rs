//! The shared sink every test reports into.
//!
//! A [`ResultSink`] is a cheap handle. Clones refer to the same counters, so a
//! sink handed to a [`LoadTest`](crate::load::LoadTest) is mutated by all of
//! its virtual users at once. All methods take `&self` and can be called from
//! any thread.
//!
//! Handles can be *gated* (see [`ResultSink::gated`]). Once a [`Gate`] is
//! closed, everything recorded through the gated handle is dropped. This is
//! how an abandoned worker is kept from reporting after the fact.

use std::{
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::outcome::{Fault, TestFailure};

/// Observer of everything recorded into a [`ResultSink`].
///
/// Listeners are called after the sink's own counters were updated and may
/// be called from any worker thread.
pub trait TestListener: Send + Sync {
    fn start_test(&self, test: &str) {
        let _ = test;
    }

    fn end_test(&self, test: &str) {
        let _ = test;
    }

    fn add_failure(&self, failure: &TestFailure) {
        let _ = failure;
    }

    fn add_error(&self, error: &TestFailure) {
        let _ = error;
    }
}

/// A [`TestListener`] mirroring sink events as `tracing` events.
#[derive(Debug, Default, Clone)]
pub struct TracingListener;

impl TestListener for TracingListener {
    fn start_test(&self, test: &str) {
        tracing::trace!(test, "test started");
    }

    fn end_test(&self, test: &str) {
        tracing::trace!(test, "test ended");
    }

    fn add_failure(&self, failure: &TestFailure) {
        tracing::info!(test = %failure.test, message = %failure.message, "test failed");
    }

    fn add_error(&self, error: &TestFailure) {
        tracing::warn!(test = %error.test, message = %error.message, "test errored");
    }
}

#[derive(Debug, Default)]
struct Counts {
    runs: usize,
    failures: Vec<TestFailure>,
    errors: Vec<TestFailure>,
}

#[derive(Default)]
struct Shared {
    counts: Mutex<Counts>,
    stop: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn TestListener>>>,
}

/// Closes a gated [`ResultSink`] handle.
#[derive(Debug, Clone)]
pub struct Gate(Arc<AtomicBool>);

impl Gate {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn close(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Default)]
pub struct ResultSink {
    shared: Arc<Shared>,
    gates: Vec<Gate>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_listener(self, listener: impl TestListener + 'static) -> Self {
        self.add_listener(listener);
        self
    }

    pub fn add_listener(&self, listener: impl TestListener + 'static) {
        self.shared
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(listener));
    }

    /// A handle to the same sink whose records can be switched off.
    ///
    /// Reads and the stop flag are unaffected by the gate.
    pub fn gated(&self) -> (ResultSink, Gate) {
        let gate = Gate::new();
        let mut gates = self.gates.clone();
        gates.push(gate.clone());
        let sink = ResultSink {
            shared: Arc::clone(&self.shared),
            gates,
        };
        (sink, gate)
    }

    fn admits(&self) -> bool {
        self.gates.iter().all(Gate::is_open)
    }

    fn notify(&self, f: impl Fn(&dyn TestListener)) {
        let listeners = self
            .shared
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for listener in listeners.iter() {
            f(listener.as_ref());
        }
    }

    pub fn start_test(&self, test: &str) {
        if !self.admits() {
            return;
        }
        lock(&self.shared.counts).runs += 1;
        self.notify(|listener| listener.start_test(test));
    }

    pub fn end_test(&self, test: &str) {
        if !self.admits() {
            return;
        }
        self.notify(|listener| listener.end_test(test));
    }

    pub fn add_failure(&self, test: &str, message: impl Into<String>) {
        if !self.admits() {
            return;
        }
        let failure = TestFailure {
            test: test.to_string(),
            message: message.into(),
        };
        lock(&self.shared.counts).failures.push(failure.clone());
        self.notify(|listener| listener.add_failure(&failure));
    }

    pub fn add_error(&self, test: &str, message: impl Into<String>) {
        if !self.admits() {
            return;
        }
        let error = TestFailure {
            test: test.to_string(),
            message: message.into(),
        };
        lock(&self.shared.counts).errors.push(error.clone());
        self.notify(|listener| listener.add_error(&error));
    }

    pub fn add_fault(&self, test: &str, fault: Fault) {
        match fault {
            Fault::Failure(message) => self.add_failure(test, message),
            Fault::Error(message) => self.add_error(test, message),
        }
    }

    /// Ask running tests to stop admitting new work.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }

    pub fn should_stop(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    pub fn run_count(&self) -> usize {
        lock(&self.shared.counts).runs
    }

    pub fn failure_count(&self) -> usize {
        lock(&self.shared.counts).failures.len()
    }

    pub fn error_count(&self) -> usize {
        lock(&self.shared.counts).errors.len()
    }

    pub fn failures(&self) -> Vec<TestFailure> {
        lock(&self.shared.counts).failures.clone()
    }

    pub fn errors(&self) -> Vec<TestFailure> {
        lock(&self.shared.counts).errors.clone()
    }

    pub fn was_successful(&self) -> bool {
        let counts = lock(&self.shared.counts);
        counts.failures.is_empty() && counts.errors.is_empty()
    }
}

impl fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts = lock(&self.shared.counts);
        f.debug_struct("ResultSink")
            .field("runs", &counts.runs)
            .field("failures", &counts.failures.len())
            .field("errors", &counts.errors.len())
            .field("stop", &self.should_stop())
            .field("gated", &!self.gates.is_empty())
            .finish()
    }
}
