use std::{borrow::Cow, fmt, sync::Arc};

use crate::{
    case::{TestClass, method_test, warning},
    run::TestRun,
    test::Test,
};

/// An ordered collection of tests run one after another.
pub struct TestSuite {
    name: Cow<'static, str>,
    tests: Vec<Arc<dyn Test>>,
}

impl TestSuite {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
        }
    }

    /// A suite with one test case per test method of `C`.
    ///
    /// Every test case gets its own instance of `C`. A class without test
    /// methods yields a single failing warning test.
    pub fn from_class<C: TestClass>() -> Self {
        let mut suite = Self::new(C::class_name());
        for method in C::test_methods() {
            suite.add_test(method_test(&method));
        }

        if suite.tests.is_empty() {
            suite.add_test(warning(format!("No tests found in {}", C::class_name())));
        }
        suite
    }

    /// A suite holding only the test method `method` of `C`.
    ///
    /// An unknown method yields a single failing warning test.
    pub fn from_method<C: TestClass>(method: &str) -> Self {
        let mut suite = Self::new(C::class_name());
        match C::test_methods().into_iter().find(|m| m.name() == method) {
            Some(method) => suite.add_test(method_test(&method)),
            None => suite.add_test(warning(format!(
                "Method \"{method}\" not found in {}",
                C::class_name()
            ))),
        }
        suite
    }

    pub fn add_test(&mut self, test: Arc<dyn Test>) {
        self.tests.push(test);
    }

    pub fn with_test(mut self, test: impl Test + 'static) -> Self {
        self.add_test(Arc::new(test));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tests(&self) -> &[Arc<dyn Test>] {
        &self.tests
    }

    /// Number of direct children, unlike [`Test::count_test_cases`].
    pub fn test_count(&self) -> usize {
        self.tests.len()
    }
}

impl fmt::Display for TestSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Test for TestSuite {
    fn count_test_cases(&self) -> usize {
        self.tests.iter().map(|test| test.count_test_cases()).sum()
    }

    fn run(&self, run: &TestRun) {
        for test in &self.tests {
            if run.result().should_stop() {
                break;
            }
            test.run(run);
        }
    }
}

/// Runs a test a fixed number of times in a row.
pub struct RepeatedTest {
    test: Arc<dyn Test>,
    times: usize,
}

impl RepeatedTest {
    pub fn new(test: Arc<dyn Test>, times: usize) -> Self {
        Self { test, times }
    }
}

impl fmt::Display for RepeatedTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(repeated)", self.test)
    }
}

impl Test for RepeatedTest {
    fn count_test_cases(&self) -> usize {
        self.test.count_test_cases() * self.times
    }

    fn run(&self, run: &TestRun) {
        for _ in 0..self.times {
            if run.result().should_stop() {
                break;
            }
            self.test.run(run);
        }
    }
}
