use std::{sync::Arc, time::Instant};

use perfkit::{
    ConfigError, ConstantTimer, LoadTest, RepeatedTest, Test, TestFactory, TestRun, TestSuite,
    TimedTest,
};
use pretty_assertions::assert_eq;

use crate::mock::{MockSlowConstruct, MockTestWithState, TOLERANCE, millis, mock, run};

fn success_suite() -> TestSuite {
    TestSuite::new("success")
        .with_test(mock("test_success"))
        .with_test(mock("test_success"))
}

fn timed(test: impl Test + 'static, max_ms: u64) -> TimedTest {
    TimedTest::new(test, millis(max_ms) + TOLERANCE).with_quiet()
}

#[test]
fn one_user() {
    let test = LoadTest::new(success_suite(), 1).unwrap();
    assert_eq!(test.count_test_cases(), 2);

    let result = run(&test);
    assert_eq!(result.run_count(), 2);
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.failure_count(), 0);
}

#[test]
fn one_user_rogue_thread() {
    let test = LoadTest::new(mock("test_rogue_thread"), 1).unwrap();
    assert_eq!(test.count_test_cases(), 1);

    let result = run(&test);
    assert_eq!(result.run_count(), 1);
    assert!(result.was_successful());
}

#[test]
fn multi_user() {
    let test = LoadTest::new(success_suite(), 3).unwrap();
    assert_eq!(test.count_test_cases(), 6);

    let result = run(&test);
    assert_eq!(result.run_count(), 6);
    assert!(result.was_successful());
}

#[test]
fn multi_user_with_iterations() {
    let test = LoadTest::builder(success_suite())
        .users(3)
        .iterations(10)
        .build()
        .unwrap();
    assert_eq!(test.count_test_cases(), 60);

    let result = run(&test);
    assert_eq!(result.run_count(), 60);
    assert!(result.was_successful());
}

#[test]
fn multi_user_with_repeated_test() {
    let repeated = RepeatedTest::new(Arc::new(success_suite()), 10);
    let test = LoadTest::new(repeated, 3).unwrap();
    assert_eq!(test.count_test_cases(), 60);

    let result = run(&test);
    assert_eq!(result.run_count(), 60);
    assert!(result.was_successful());
}

#[test]
fn multi_user_with_zero_delay() {
    let test = LoadTest::builder(success_suite())
        .users(3)
        .timer(ConstantTimer::new(0))
        .build()
        .unwrap();
    assert_eq!(test.count_test_cases(), 6);

    let result = run(&test);
    assert_eq!(result.run_count(), 6);
    assert!(result.was_successful());
}

#[test]
fn multi_user_with_failure() {
    let test = LoadTest::new(mock("test_failure"), 3).unwrap();
    assert_eq!(test.count_test_cases(), 3);

    let result = run(&test);
    assert_eq!(result.run_count(), 3);
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.failure_count(), 3);
}

#[test]
fn multi_user_with_error() {
    let test = LoadTest::new(mock("test_error"), 3).unwrap();
    assert_eq!(test.count_test_cases(), 3);

    let result = run(&test);
    assert_eq!(result.run_count(), 3);
    assert_eq!(result.error_count(), 3);
    assert_eq!(result.failure_count(), 0);
}

#[test]
fn multi_user_with_stop() {
    let test = LoadTest::new(mock("test_failure"), 2).unwrap();
    assert_eq!(test.count_test_cases(), 2);

    let result = crate::mock::result();
    result.stop();
    test.run(&TestRun::new(result.clone()));

    assert_eq!(result.run_count(), 0);
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.failure_count(), 0);
}

#[test]
fn non_positive_users() {
    assert_eq!(
        LoadTest::new(success_suite(), 0).err(),
        Some(ConfigError::NoUsers)
    );
}

#[test]
fn atomic_2s_response() {
    let load = LoadTest::new(mock("test_atomic_2s_response_with_worker_thread"), 1).unwrap();
    let test = timed(load, 1000);
    assert_eq!(test.count_test_cases(), 1);

    let result = run(&test);
    assert_eq!(result.run_count(), 1);
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.failure_count(), 0);
}

#[test]
fn atomic_2s_response_enforce_atomicity() {
    let load = LoadTest::new(mock("test_atomic_2s_response_with_worker_thread"), 1)
        .unwrap()
        .with_enforce_atomicity(true);
    let test = timed(load, 1000);
    assert_eq!(test.count_test_cases(), 1);

    let result = run(&test);
    assert_eq!(result.run_count(), 1);
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.failure_count(), 1);
}

#[test]
fn non_atomic_2s_response() {
    let load = LoadTest::new(mock("test_non_atomic_2s_response_with_worker_thread"), 1).unwrap();
    let test = timed(load, 1000);

    let result = run(&test);
    assert_eq!(result.run_count(), 1);
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.failure_count(), 1);
}

#[test]
fn non_atomic_2s_response_enforce_atomicity() {
    let load = LoadTest::new(mock("test_non_atomic_2s_response_with_worker_thread"), 1)
        .unwrap()
        .with_enforce_atomicity(true);
    let test = timed(load, 1000);

    let result = run(&test);
    assert_eq!(result.run_count(), 1);
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.failure_count(), 1);
}

#[test]
fn shared_fixture_state_breaks() {
    let test = LoadTest::builder(TestSuite::from_method::<MockTestWithState>("test_invariant"))
        .users(10)
        .iterations(2)
        .enforce_atomicity(true)
        .build()
        .unwrap();
    assert_eq!(test.count_test_cases(), 20);

    let result = run(&test);
    assert_eq!(result.run_count(), 20);
    assert_eq!(result.error_count(), 0);
    assert!(result.failure_count() > 0);
}

#[test]
fn factory_fixture_state_holds() {
    let test = LoadTest::builder(TestFactory::<MockTestWithState>::new())
        .users(10)
        .iterations(2)
        .enforce_atomicity(true)
        .build()
        .unwrap();
    assert_eq!(test.count_test_cases(), 20);

    let result = run(&test);
    assert_eq!(result.run_count(), 20);
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.failure_count(), 0);
}

#[test]
fn factory_suites_do_not_outlive_their_workers() {
    let factory = Arc::new(TestFactory::<MockTestWithState>::new());

    for atomic in [false, true] {
        let test = LoadTest::builder(Arc::clone(&factory))
            .users(10)
            .enforce_atomicity(atomic)
            .build()
            .unwrap();

        for _ in 0..5 {
            let result = run(&test);
            assert_eq!(result.run_count(), 10);
            assert!(result.was_successful());
            assert_eq!(factory.worker_count(), 0);
        }
    }
}

#[test]
fn factory_suites_are_built_concurrently() {
    let factory = Arc::new(TestFactory::<MockSlowConstruct>::new());
    // Build the representative suite up front, it is not part of the episode.
    assert_eq!(factory.count_test_cases(), 1);

    let test = LoadTest::builder(Arc::clone(&factory))
        .users(5)
        .timer(ConstantTimer::new(0))
        .build()
        .unwrap();

    let now = Instant::now();
    let result = run(&test);
    let elapsed = now.elapsed();

    assert_eq!(result.run_count(), 5);
    assert!(result.was_successful());
    assert!(
        elapsed < MockSlowConstruct::CONSTRUCT_TIME * 2 + TOLERANCE,
        "five users took {elapsed:?}"
    );
}
