use std::{
    sync::{
        Once,
        atomic::{AtomicBool, AtomicI32, Ordering},
    },
    thread,
    time::Duration,
};

use perfkit::{
    AssertionFailure, Interrupted, ResultSink, TestClass, TestMethod, TestRun, TestSuite,
    result::TracingListener,
    test::BoxError,
    test_methods,
};

pub const TOLERANCE: Duration = Duration::from_millis(200);

pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

/// A fresh sink, with sink events mirrored to `tracing`.
///
/// Set `RUST_LOG=perfkit=debug` to see what the decorators are doing.
pub fn result() -> ResultSink {
    static TRACING: Once = Once::new();
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
    ResultSink::new().with_listener(TracingListener)
}

pub fn run(test: &impl perfkit::Test) -> ResultSink {
    let result = result();
    test.run(&TestRun::new(result.clone()));
    result
}

pub fn mock(method: &str) -> TestSuite {
    TestSuite::from_method::<MockTest>(method)
}

pub struct MockTest;

impl MockTest {
    fn test_success(&self, _: &TestRun) {}

    fn test_failure(&self, _: &TestRun) -> Result<(), AssertionFailure> {
        Err(AssertionFailure::new("expected failure"))
    }

    fn test_error(&self, _: &TestRun) {
        panic!("unexpected runtime error");
    }

    fn test_one_second_execution_time(&self, _: &TestRun) {
        thread::sleep(millis(1000));
    }

    fn test_one_second_execution_time_with_failure(
        &self,
        _: &TestRun,
    ) -> Result<(), AssertionFailure> {
        thread::sleep(millis(1000));
        Err(AssertionFailure::new("failed after one second"))
    }

    fn test_infinite_execution_time(&self, run: &TestRun) -> Result<(), Interrupted> {
        loop {
            run.sleep(millis(100))?;
        }
    }

    fn test_long_execution_time(&self, run: &TestRun) -> Result<(), Interrupted> {
        run.sleep(millis(60_000))
    }

    fn test_atomic_2s_response_with_worker_thread(&self, run: &TestRun) -> Result<(), BoxError> {
        run.spawn(|run| {
            let _ = run.sleep(millis(2000));
        })?;
        // Do not wait for the helper.
        run.sleep(millis(1000))?;
        Ok(())
    }

    fn test_non_atomic_2s_response_with_worker_thread(
        &self,
        run: &TestRun,
    ) -> Result<(), BoxError> {
        let helper = run.spawn(|run| {
            let _ = run.sleep(millis(2000));
        })?;
        run.sleep(millis(1000))?;
        helper.join().map_err(|_| "helper thread panicked")?;
        Ok(())
    }

    fn test_rogue_thread(&self, run: &TestRun) -> Result<(), BoxError> {
        run.spawn(|run| while run.sleep(millis(100)).is_ok() {})?;
        Ok(())
    }
}

impl TestClass for MockTest {
    fn test_methods() -> Vec<TestMethod<Self>> {
        test_methods![MockTest:
            test_success,
            test_failure,
            test_error,
            test_one_second_execution_time,
            test_one_second_execution_time_with_failure,
            test_infinite_execution_time,
            test_long_execution_time,
            test_atomic_2s_response_with_worker_thread,
            test_non_atomic_2s_response_with_worker_thread,
            test_rogue_thread,
        ]
    }

    fn construct() -> Result<Self, BoxError> {
        Ok(Self)
    }
}

/// Fixture state that breaks when two users share one instance.
#[derive(Default)]
pub struct MockTestWithState {
    flag: AtomicBool,
    data: AtomicI32,
}

impl MockTestWithState {
    fn test_invariant(&self, _: &TestRun) {
        assert!(self.flag.load(Ordering::SeqCst));
        thread::yield_now();
        thread::sleep(millis(10));
        assert_eq!(self.data.load(Ordering::SeqCst), 1);
    }
}

impl TestClass for MockTestWithState {
    fn test_methods() -> Vec<TestMethod<Self>> {
        test_methods![MockTestWithState: test_invariant]
    }

    fn construct() -> Result<Self, BoxError> {
        Ok(Self::default())
    }

    fn set_up(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.data.store(1, Ordering::SeqCst);
    }

    fn tear_down(&self) {
        self.flag.store(false, Ordering::SeqCst);
        self.data.store(0, Ordering::SeqCst);
    }
}

pub struct MockFactoryTest;

impl MockFactoryTest {
    fn test_success(&self, _: &TestRun) {}

    fn test_failure(&self, _: &TestRun) {
        assert_eq!(1 + 1, 3);
    }
}

impl TestClass for MockFactoryTest {
    fn test_methods() -> Vec<TestMethod<Self>> {
        test_methods![MockFactoryTest: test_success, test_failure]
    }

    fn construct() -> Result<Self, BoxError> {
        Ok(Self)
    }
}

/// A class whose constructor takes a noticeable while.
pub struct MockSlowConstruct;

impl MockSlowConstruct {
    pub const CONSTRUCT_TIME: Duration = Duration::from_millis(200);

    fn test_success(&self, _: &TestRun) {}
}

impl TestClass for MockSlowConstruct {
    fn test_methods() -> Vec<TestMethod<Self>> {
        test_methods![MockSlowConstruct: test_success]
    }

    fn construct() -> Result<Self, BoxError> {
        thread::sleep(Self::CONSTRUCT_TIME);
        Ok(Self)
    }
}
