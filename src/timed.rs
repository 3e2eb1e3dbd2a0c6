//! Enforcing a deadline on a decorated test.
//!
//! A [`TimedTest`] fails when its decorated test takes longer than the
//! allowed maximum. The timeout failure is recorded *in addition* to whatever
//! the decorated test recorded itself.
//!
//! Two modes exist:
//!
//! - **waiting** (default): the decorated test runs to completion on the
//!   calling thread and the elapsed time is checked afterwards. The true
//!   outcome is always observed, but a slow test delays the verdict and a
//!   test that never returns blocks forever.
//! - **non-waiting**: the decorated test races the deadline on a separate
//!   worker. When the deadline passes first, the timeout is recorded and the
//!   worker is abandoned, not cancelled. Whatever it records afterwards is
//!   dropped, so a test that would also have failed on its own is
//!   indistinguishable from one that was merely slow. Panics of the
//!   decorated test are recorded by the race worker itself, so they are
//!   dropped the same way and never reach the enclosing group.

use std::{
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crossbeam_channel::RecvTimeoutError;

use crate::{
    outcome::Fault,
    report::{ElapsedReporter, StdoutReporter},
    run::TestRun,
    test::Test,
};

pub struct TimedTest {
    test: Arc<dyn Test>,
    max_elapsed: Duration,
    wait_for_completion: bool,
    reporter: Option<Arc<dyn ElapsedReporter>>,
    exceeded: AtomicBool,
}

impl TimedTest {
    /// Fail `test` if it runs longer than `max_elapsed`, waiting for it to finish.
    pub fn new(test: impl Test + 'static, max_elapsed: Duration) -> Self {
        Self {
            test: Arc::new(test),
            max_elapsed,
            wait_for_completion: true,
            reporter: Some(Arc::new(StdoutReporter)),
            exceeded: AtomicBool::new(false),
        }
    }

    /// Fail `test` as soon as `max_elapsed` passed, without waiting for it.
    pub fn without_waiting(test: impl Test + 'static, max_elapsed: Duration) -> Self {
        Self {
            wait_for_completion: false,
            ..Self::new(test, max_elapsed)
        }
    }

    /// Do not report elapsed times.
    pub fn with_quiet(self) -> Self {
        Self {
            reporter: None,
            ..self
        }
    }

    pub fn with_reporter(self, reporter: Arc<dyn ElapsedReporter>) -> Self {
        Self {
            reporter: Some(reporter),
            ..self
        }
    }

    pub fn max_elapsed(&self) -> Duration {
        self.max_elapsed
    }

    pub fn waits_for_completion(&self) -> bool {
        self.wait_for_completion
    }

    /// Whether the most recent run exceeded the deadline.
    pub fn out_of_time(&self) -> bool {
        self.exceeded.load(Ordering::SeqCst)
    }

    fn run_until_test_completion(&self, run: &TestRun) {
        let start = Instant::now();
        self.test.run(run);
        let elapsed = start.elapsed();
        self.report_elapsed(elapsed);

        if elapsed > self.max_elapsed {
            self.exceeded.store(true, Ordering::SeqCst);
            self.record_timeout(
                run,
                format!(
                    "Maximum elapsed time exceeded! Expected {}ms, but was {}ms.",
                    self.max_elapsed.as_millis(),
                    elapsed.as_millis()
                ),
            );
        }
    }

    fn run_until_time_expires(&self, run: &TestRun) {
        let (result, gate) = run.result().gated();
        let race = run.with_result(result);
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(0);
        let test = Arc::clone(&self.test);

        let start = Instant::now();
        let spawned = race.spawn(move |run| {
            // Dropped when the worker is done, however it ends.
            let _done = done_tx;
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| test.run(run))) {
                if let Some(fault) = Fault::from_panic(payload) {
                    run.result().add_fault(&test.to_string(), fault);
                }
            }
        });
        if let Err(err) = spawned {
            tracing::error!(%err, "failed to start race worker");
            run.result()
                .add_error(&self.to_string(), format!("failed to start race worker: {err}"));
            return;
        }

        let timed_out = matches!(
            done_rx.recv_timeout(self.max_elapsed),
            Err(RecvTimeoutError::Timeout)
        );
        self.report_elapsed(start.elapsed());

        if timed_out {
            gate.close();
            self.exceeded.store(true, Ordering::SeqCst);
            tracing::debug!(test = %self.test, "abandoning race worker after timeout");
            self.record_timeout(
                run,
                format!(
                    "Maximum elapsed time ({} ms) exceeded!",
                    self.max_elapsed.as_millis()
                ),
            );
        }
    }

    fn record_timeout(&self, run: &TestRun, message: String) {
        let name = self.to_string();
        tracing::debug!(test = %name, %message, "deadline exceeded");
        run.result().add_failure(&name, message);
        run.result().end_test(&name);
    }

    fn report_elapsed(&self, elapsed: Duration) {
        tracing::debug!(test = %self.test, elapsed_ms = elapsed.as_millis() as u64, "timed run finished");
        if let Some(reporter) = &self.reporter {
            reporter.report(&self.to_string(), elapsed);
        }
    }
}

impl fmt::Display for TimedTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.wait_for_completion {
            true => write!(f, "TimedTest (WAITING): {}", self.test),
            false => write!(f, "TimedTest (NON-WAITING): {}", self.test),
        }
    }
}

impl Test for TimedTest {
    fn count_test_cases(&self) -> usize {
        self.test.count_test_cases()
    }

    fn run(&self, run: &TestRun) {
        self.exceeded.store(false, Ordering::SeqCst);
        match self.wait_for_completion {
            true => self.run_until_test_completion(run),
            false => self.run_until_time_expires(run),
        }
    }
}
