use std::{fmt, panic::panic_any};

use crate::{
    case::{TestClass, TestMethod},
    outcome::AssertionFailure,
    result::ResultSink,
    run::TestRun,
    suite::TestSuite,
    test::{BoxError, Test, TestFn, TestResult},
    test_methods,
};

macro_rules! test {
    (name: $name:expr, func: $func:expr $(,)?) => {
        $crate::test::TestFn::new($name, $func)
    };

    ($func:expr) => {
        $crate::test::TestFn::new(
            concat!(module_path!(), ":", line!(), ":", column!()),
            $func,
        )
    };
}

pub(crate) use test;

/// Run `test` on the calling thread against a fresh sink.
pub fn run_test(test: &(impl Test + ?Sized)) -> ResultSink {
    let result = ResultSink::new();
    test.run(&TestRun::new(result.clone()));
    result
}

pub fn suite_of(n: usize, make: impl Fn() -> TestFn) -> TestSuite {
    (0..n).fold(TestSuite::new("suite"), |suite, _| suite.with_test(make()))
}

/// A test whose `run` panics instead of recording anything.
pub struct Exploding;

impl fmt::Display for Exploding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("exploding")
    }
}

impl Test for Exploding {
    fn count_test_cases(&self) -> usize {
        1
    }

    fn run(&self, _: &TestRun) {
        panic!("exploding")
    }
}

#[derive(Default)]
pub struct Counter;

impl Counter {
    fn test_success(&self, _: &TestRun) {}

    fn test_failure(&self, _: &TestRun) -> TestResult {
        panic_any(AssertionFailure::new("counter is off"))
    }
}

impl TestClass for Counter {
    fn test_methods() -> Vec<TestMethod<Self>> {
        test_methods![Counter: test_success, test_failure]
    }

    fn construct() -> Result<Self, BoxError> {
        Ok(Self)
    }
}
