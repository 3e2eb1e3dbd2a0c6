//! Per-worker fixture instances.
//!
//! A [`TestCase`](crate::case::TestCase) keeps its fixture state in one
//! instance of its [`TestClass`]. Run the same case from many virtual users
//! and they all share that instance. A [`TestFactory`] avoids this by
//! building a fresh [`TestSuite`] for each worker the first time the worker
//! runs it, and reusing that suite for the worker's later runs.
//!
//! Workers are told apart by [`TestRun::worker`], so the cache survives
//! repeated iterations of one user but never leaks between users. A worker's
//! suite is dropped from the cache when the worker exits, and suites for
//! different workers are built concurrently.

use std::{
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError},
};

use crate::{
    case::TestClass,
    run::{TestRun, WorkerId},
    suite::TestSuite,
    test::Test,
};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Scope {
    AllMethods,
    Method(String),
}

type Suites = Mutex<HashMap<WorkerId, Arc<TestSuite>>>;

fn lock(suites: &Suites) -> MutexGuard<'_, HashMap<WorkerId, Arc<TestSuite>>> {
    suites.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct TestFactory<C> {
    scope: Scope,
    suites: Arc<Suites>,
    representative: OnceLock<TestSuite>,
    class: PhantomData<fn() -> C>,
}

impl<C: TestClass> TestFactory<C> {
    /// A factory for suites holding every test method of `C`.
    pub fn new() -> Self {
        Self::with_scope(Scope::AllMethods)
    }

    /// A factory for suites holding only the test method `method` of `C`.
    ///
    /// An unknown method is not an error here. The built suite then contains
    /// a single failing warning test.
    pub fn for_method(method: impl Into<String>) -> Self {
        Self::with_scope(Scope::Method(method.into()))
    }

    fn with_scope(scope: Scope) -> Self {
        Self {
            scope,
            suites: Arc::default(),
            representative: OnceLock::new(),
            class: PhantomData,
        }
    }

    fn make_suite(&self) -> TestSuite {
        match &self.scope {
            Scope::AllMethods => TestSuite::from_class::<C>(),
            Scope::Method(method) => TestSuite::from_method::<C>(method),
        }
    }

    /// Suite used for counting and describing, never run.
    fn representative(&self) -> &TestSuite {
        self.representative.get_or_init(|| self.make_suite())
    }

    /// The suite belonging to the worker running `run`, built on first use.
    pub fn get_test(&self, run: &TestRun) -> Arc<TestSuite> {
        let worker = run.worker();
        if let Some(suite) = lock(&self.suites).get(&worker) {
            return Arc::clone(suite);
        }

        tracing::trace!(%worker, class = %C::class_name(), "building suite for worker");
        let suite = Arc::new(self.make_suite());

        // A worker runs on one thread, so nobody else inserted for it meanwhile.
        lock(&self.suites).insert(worker, Arc::clone(&suite));
        let suites = Arc::downgrade(&self.suites);
        run.on_worker_exit(move || {
            if let Some(suites) = suites.upgrade() {
                lock(&suites).remove(&worker);
            }
        });
        suite
    }

    /// Number of workers currently holding a suite.
    pub fn worker_count(&self) -> usize {
        lock(&self.suites).len()
    }
}

impl<C: TestClass> Default for TestFactory<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: TestClass> fmt::Display for TestFactory<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TestFactory: {}", self.representative())
    }
}

impl<C: TestClass> Test for TestFactory<C> {
    fn count_test_cases(&self) -> usize {
        self.representative().count_test_cases()
    }

    fn run(&self, run: &TestRun) {
        self.get_test(run).run(run);
    }
}
