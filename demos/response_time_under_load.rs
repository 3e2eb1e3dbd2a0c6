//! Response time of a simulated checkout under ten concurrent users.
//!
//! Run with `RUST_LOG=perfkit=debug cargo run --example response_time_under_load`
//! to see the decorators at work.

use std::{process::ExitCode, time::Duration};

use perfkit::{
    LoadTest, RandomTimer, ResultSink, Test, TestFn, TestRun, TimedTest, result::TracingListener,
};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let checkout = TestFn::new("checkout", |run: &TestRun| run.sleep(Duration::from_millis(1000)));
    let timed = TimedTest::new(checkout, Duration::from_millis(1050));

    let load = match RandomTimer::new(100, 50.0)
        .and_then(|timer| LoadTest::builder(timed).users(10).timer(timer).build())
    {
        Ok(load) => load,
        Err(err) => {
            eprintln!("invalid load test: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = ResultSink::new().with_listener(TracingListener);
    println!("running {} ({} test cases)", load, load.count_test_cases());
    load.run(&TestRun::new(result.clone()));

    println!(
        "runs: {}, failures: {}, errors: {}",
        result.run_count(),
        result.failure_count(),
        result.error_count()
    );
    for failure in result.failures() {
        println!("  {failure}");
    }

    match result.was_successful() {
        true => ExitCode::SUCCESS,
        false => ExitCode::FAILURE,
    }
}
