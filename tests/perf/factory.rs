use std::{sync::Arc, time::Duration};

use perfkit::{Test, TestFactory, TestRun, TestSuite};
use pretty_assertions::assert_eq;

use crate::mock::{MockFactoryTest, result, run};

fn assert_same_shape(expected: &TestSuite, actual: &TestSuite) {
    assert_eq!(expected.count_test_cases(), actual.count_test_cases());
    assert_eq!(expected.name(), actual.name());
}

/// The suites a factory hands out to two separate worker threads.
fn suites_of_two_workers(factory: TestFactory<MockFactoryTest>) -> (Arc<TestSuite>, Arc<TestSuite>) {
    let factory = Arc::new(factory);
    let run = TestRun::new(result());
    let (tx, rx) = crossbeam_channel::unbounded();

    for _ in 0..2 {
        let factory = Arc::clone(&factory);
        let tx = tx.clone();
        run.spawn(move |run| {
            let _ = tx.send(factory.get_test(run));
        })
        .unwrap();
    }

    let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    (first, second)
}

#[test]
fn all_test_methods() {
    let factory = TestFactory::<MockFactoryTest>::new();
    assert_eq!(factory.count_test_cases(), 2);

    let run_context = TestRun::new(result());
    assert_same_shape(
        &TestSuite::from_class::<MockFactoryTest>(),
        &factory.get_test(&run_context),
    );

    let result = run(&factory);
    assert_eq!(result.run_count(), 2);
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.failure_count(), 1);
}

#[test]
fn all_test_methods_same_suite_for_same_worker() {
    let factory = TestFactory::<MockFactoryTest>::new();
    let run = TestRun::new(result());

    let first = factory.get_test(&run);
    let second = factory.get_test(&run);
    assert!(Arc::ptr_eq(&first, &second));
    assert_same_shape(&TestSuite::from_class::<MockFactoryTest>(), &first);
}

#[test]
fn all_test_methods_different_suite_for_different_workers() {
    let (first, second) = suites_of_two_workers(TestFactory::new());
    assert!(!Arc::ptr_eq(&first, &second));

    let expected = TestSuite::from_class::<MockFactoryTest>();
    assert_same_shape(&expected, &first);
    assert_same_shape(&expected, &second);
}

#[test]
fn one_test_method_success() {
    let factory = TestFactory::<MockFactoryTest>::for_method("test_success");
    assert_eq!(factory.count_test_cases(), 1);

    let result = run(&factory);
    assert_eq!(result.run_count(), 1);
    assert!(result.was_successful());
}

#[test]
fn one_test_method_failure() {
    let factory = TestFactory::<MockFactoryTest>::for_method("test_failure");
    assert_eq!(factory.count_test_cases(), 1);

    let result = run(&factory);
    assert_eq!(result.run_count(), 1);
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.failure_count(), 1);
}

#[test]
fn one_test_method_no_such_method() {
    let factory = TestFactory::<MockFactoryTest>::for_method("test_foo");

    let result = run(&factory);
    assert_eq!(result.run_count(), 1);
    assert_eq!(result.error_count(), 0);
    assert_eq!(result.failure_count(), 1);
    assert_eq!(
        result.failures()[0].message,
        "Method \"test_foo\" not found in MockFactoryTest"
    );
}

#[test]
fn one_test_method_different_suite_for_different_workers() {
    let (first, second) = suites_of_two_workers(TestFactory::for_method("test_success"));
    assert!(!Arc::ptr_eq(&first, &second));

    let expected = TestSuite::from_method::<MockFactoryTest>("test_success");
    assert_same_shape(&expected, &first);
    assert_same_shape(&expected, &second);
}
