//! Simulating concurrent virtual users.
//!
//! A [`LoadTest`] runs its decorated test once per virtual user, each user on
//! its own worker thread, with a [`Timer`] controlling the delay between
//! starting two users. Wrapping a [`TimedTest`](crate::timed::TimedTest) in a
//! `LoadTest` measures response time under load; wrapping a `LoadTest` in a
//! `TimedTest` measures throughput.
//!
//! # Completion
//!
//! An episode (one call to [`run`](Test::run)) is over once its workers are.
//! What counts as "its workers" depends on the atomicity setting:
//!
//! - **non-atomic** (default): only the directly dispatched users are waited
//!   for. Helper threads a test started and did not join may still be running
//!   when `run` returns; they get interrupted during teardown.
//! - **atomic**: every member of the episode's [`ThreadedTestGroup`] is waited
//!   for, including helper threads started through
//!   [`TestRun::spawn`](crate::run::TestRun::spawn). A helper that never
//!   terminates makes the episode hang.

use std::{fmt, sync::Arc};

use crate::{
    barrier::ThreadBarrier,
    error::ConfigError,
    group::ThreadedTestGroup,
    run::TestRun,
    suite::RepeatedTest,
    test::Test,
    threaded::ThreadedTest,
    timer::{ConstantTimer, Timer},
};

pub struct LoadTest {
    test: Arc<dyn Test>,
    users: usize,
    timer: Box<dyn Timer>,
    enforce_atomicity: bool,
}

/// Builder for [`LoadTest`].
///
/// Defaults to one user, one iteration, no delay between users and
/// non-atomic completion.
pub struct LoadTestBuilder {
    test: Arc<dyn Test>,
    users: usize,
    iterations: usize,
    timer: Box<dyn Timer>,
    enforce_atomicity: bool,
}

impl LoadTestBuilder {
    pub fn users(self, users: usize) -> Self {
        Self { users, ..self }
    }

    /// Let every user run the test `iterations` times in a row.
    pub fn iterations(self, iterations: usize) -> Self {
        Self { iterations, ..self }
    }

    pub fn timer(self, timer: impl Timer + 'static) -> Self {
        Self {
            timer: Box::new(timer),
            ..self
        }
    }

    pub fn enforce_atomicity(self, enforce_atomicity: bool) -> Self {
        Self {
            enforce_atomicity,
            ..self
        }
    }

    pub fn build(self) -> Result<LoadTest, ConfigError> {
        if self.users == 0 {
            return Err(ConfigError::NoUsers);
        }

        let test: Arc<dyn Test> = match self.iterations {
            0 => return Err(ConfigError::NoIterations),
            1 => self.test,
            iterations => Arc::new(RepeatedTest::new(self.test, iterations)),
        };

        Ok(LoadTest {
            test,
            users: self.users,
            timer: self.timer,
            enforce_atomicity: self.enforce_atomicity,
        })
    }
}

impl LoadTest {
    pub fn builder(test: impl Test + 'static) -> LoadTestBuilder {
        LoadTestBuilder {
            test: Arc::new(test),
            users: 1,
            iterations: 1,
            timer: Box::new(ConstantTimer::default()),
            enforce_atomicity: false,
        }
    }

    /// `users` concurrent users without delay between them.
    pub fn new(test: impl Test + 'static, users: usize) -> Result<Self, ConfigError> {
        Self::builder(test).users(users).build()
    }

    pub fn with_enforce_atomicity(self, enforce_atomicity: bool) -> Self {
        Self {
            enforce_atomicity,
            ..self
        }
    }

    pub fn users(&self) -> usize {
        self.users
    }

    pub fn enforces_atomicity(&self) -> bool {
        self.enforce_atomicity
    }

    fn wait_for_completion(&self, barrier: &ThreadBarrier, group: &ThreadedTestGroup) {
        match self.enforce_atomicity {
            true => group.wait_for_idle(),
            false => barrier.wait(),
        }
    }
}

impl fmt::Display for LoadTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self.enforce_atomicity {
            true => "ATOMIC",
            false => "NON-ATOMIC",
        };
        write!(f, "LoadTest ({mode}): ThreadedTest: {}", self.test)
    }
}

impl Test for LoadTest {
    fn count_test_cases(&self) -> usize {
        self.test.count_test_cases() * self.users
    }

    fn run(&self, run: &TestRun) {
        let result = run.result();
        let group = ThreadedTestGroup::nested(self.to_string(), result.clone(), run.group());
        let barrier = Arc::new(ThreadBarrier::new(self.users));
        let threaded = ThreadedTest::new(Arc::clone(&self.test), group.clone(), Arc::clone(&barrier));

        tracing::debug!(
            test = %self.test,
            users = self.users,
            atomic = self.enforce_atomicity,
            "starting load episode"
        );

        for user in 0..self.users {
            if result.should_stop() {
                let remaining = self.users - user;
                tracing::debug!(remaining, "stop requested, cancelling remaining users");
                barrier.cancel_threads(remaining);
                break;
            }

            threaded.run(run);
            if run.sleep(self.timer.delay()).is_err() {
                let remaining = self.users - user - 1;
                tracing::debug!(remaining, "interrupted during admission");
                barrier.cancel_threads(remaining);
                break;
            }
        }

        self.wait_for_completion(&barrier, &group);
        tracing::debug!(test = %self.test, "load episode complete");

        group.destroy();
    }
}
