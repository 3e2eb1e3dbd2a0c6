//! Load and timing decorators for existing tests.
//!
//! Wrap any [`Test`] without changing it:
//!
//! - [`LoadTest`] runs it once per virtual user, each user on its own thread,
//!   optionally several iterations per user and staggered by a [`Timer`].
//! - [`TimedTest`] fails it when it takes longer than a deadline.
//! - [`TestFactory`] gives every user its own fixture instance of a
//!   [`TestClass`].
//!
//! Decorators are tests themselves and nest freely. Every run reports into a
//! shared [`ResultSink`] through the explicit per-worker [`TestRun`] context.
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use perfkit::{LoadTest, ResultSink, Test, TestFn, TestRun, TimedTest};
//!
//! let checkout = TestFn::new("checkout", |run: &TestRun| run.sleep(Duration::from_millis(200)));
//! let timed = TimedTest::new(checkout, Duration::from_secs(1));
//! let load = LoadTest::new(timed, 10).expect("at least one user");
//!
//! let result = ResultSink::new();
//! load.run(&TestRun::new(result.clone()));
//! assert!(result.was_successful());
//! ```

pub mod barrier;
pub mod case;
pub mod error;
pub mod factory;
pub mod group;
pub mod load;
pub mod outcome;
pub mod report;
pub mod result;
pub mod run;
pub mod suite;
pub mod threaded;
pub mod timed;
pub mod timer;

pub use case::{TestCase, TestClass, TestMethod};
pub use error::ConfigError;
pub use factory::TestFactory;
pub use load::{LoadTest, LoadTestBuilder};
pub use outcome::{AssertionFailure, Interrupted};
pub use result::ResultSink;
pub use run::TestRun;
pub use suite::{RepeatedTest, TestSuite};
pub use test::{Test, TestFn, TestResult};
pub use timed::TimedTest;
pub use timer::{ConstantTimer, RandomTimer, Timer};

#[cfg(test)]
mod test_support;
